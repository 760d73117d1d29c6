use murmur_client::MessageRecord;

use crate::cmd::{Context, HistoryArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::print_records;

pub fn run(args: HistoryArgs, ctx: &Context) -> CliResult<i32> {
    let store = ctx.open_store()?;
    let records = filter(store.snapshot(), &args);
    print_records(&records, ctx.format);
    Ok(SUCCESS)
}

fn filter(records: Vec<MessageRecord>, args: &HistoryArgs) -> Vec<MessageRecord> {
    let mut matching: Vec<MessageRecord> = records
        .into_iter()
        .filter(|record| {
            args.channel
                .as_deref()
                .is_none_or(|channel| record.channel() == Some(channel))
        })
        .filter(|record| {
            args.user.as_deref().is_none_or(|user| {
                record.sender() == user || record.recipient() == Some(user)
            })
        })
        .collect();

    if let Some(limit) = args.limit {
        let start = matching.len().saturating_sub(limit);
        matching.drain(..start);
    }
    matching
}
