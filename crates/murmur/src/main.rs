mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use murmur_transport::Endpoint;

use crate::cmd::{parse_duration, Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "murmur", version, about = "Chat client for murmur servers")]
struct Cli {
    /// Request/reply endpoint of the chat server.
    #[arg(
        long,
        env = "MURMUR_SERVER",
        default_value = "tcp://server:5555",
        global = true
    )]
    server: Endpoint,

    /// Bus endpoint to subscribe on.
    #[arg(long, env = "MURMUR_BUS", default_value = "tcp://proxy:5558", global = true)]
    bus: Endpoint,

    /// Directory holding messages.json.
    #[arg(long, env = "MURMUR_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Time allowed for each request (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_parser = parse_duration, global = true)]
    request_timeout: Duration,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = Context {
        server: cli.server,
        bus: cli.bus,
        data_dir: cli.data_dir,
        request_timeout: cli.request_timeout,
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
    };

    match cmd::run(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
