use murmur_client::{Clock, MessageRecord, SystemClock};
use tracing::warn;

use crate::cmd::{Context, SendArgs};
use crate::exit::{client_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::print_reply;

/// One-shot send. No login and no subscriber: the request goes straight to
/// the server and the sent message is appended to the local log.
pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let user = args.user.trim();
    if user.is_empty() {
        return Err(CliError::new(USAGE, "a non-empty user name is required"));
    }
    let message = args.message.join(" ");

    let store = ctx.open_store()?;
    let mut client = ctx.request_client()?;
    let at = SystemClock.now();

    let (reply, record) = match (&args.to, &args.channel) {
        (Some(to), _) => (
            client.message(user, to, &message, &at),
            MessageRecord::private_sent(user, to, &message, at),
        ),
        (None, Some(channel)) => (
            client.publish(user, channel, &message, &at),
            MessageRecord::channel_sent(user, channel, &message, at),
        ),
        (None, None) => return Err(CliError::new(USAGE, "either --channel or --to is required")),
    };
    let reply = reply.map_err(|err| client_error("send failed", err))?;

    if let Err(err) = store.append(record) {
        warn!(error = %err, "sent message not persisted");
    }
    print_reply(&reply, ctx.format);

    match reply.status() {
        Some(status) if !status.is_success() => Ok(FAILURE),
        _ => Ok(SUCCESS),
    }
}
