use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use murmur_client::{MessageRecord, Session};
use tracing::info;

use crate::cmd::{Context, ListenArgs};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let store = Arc::new(ctx.open_store()?);
    let received = Arc::new(AtomicUsize::new(0));
    let sink = printing_sink(ctx.format, received.clone());
    let session = Session::start(ctx.client_config(&args.user), store, Arc::new(sink))
        .map_err(|err| client_error("login failed", err))?;
    info!(user = session.user(), topics = ?session.subscriptions(), "listening");

    while running.load(Ordering::SeqCst) {
        if let Some(count) = args.count {
            if received.load(Ordering::SeqCst) >= count {
                break;
            }
        }
        thread::sleep(POLL_INTERVAL);
    }

    info!(
        recorded = received.load(Ordering::SeqCst),
        total = session.store().len(),
        "listen stopped"
    );
    Ok(SUCCESS)
}

fn printing_sink(
    format: OutputFormat,
    received: Arc<AtomicUsize>,
) -> impl Fn(&MessageRecord) + Send + Sync + 'static {
    move |record: &MessageRecord| {
        print_record(record, format);
        received.fetch_add(1, Ordering::SeqCst);
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
