use murmur_client::{Clock, SystemClock};

use crate::cmd::Context;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::print_names;

pub fn users(ctx: &Context) -> CliResult<i32> {
    let mut client = ctx.request_client()?;
    let reply = client
        .users(&SystemClock.now())
        .map_err(|err| client_error("users query failed", err))?;
    print_names("users", &reply.users().unwrap_or_default(), ctx.format);
    Ok(SUCCESS)
}

pub fn channels(ctx: &Context) -> CliResult<i32> {
    let mut client = ctx.request_client()?;
    let reply = client
        .channels(&SystemClock.now())
        .map_err(|err| client_error("channels query failed", err))?;
    print_names("channels", &reply.channels().unwrap_or_default(), ctx.format);
    Ok(SUCCESS)
}
