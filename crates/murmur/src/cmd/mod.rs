use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use murmur_client::{ClientConfig, MessageStore, RequestClient};
use murmur_transport::Endpoint;

use crate::exit::{client_error, store_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod chat;
pub mod directory;
pub mod history;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive chat session.
    Chat(ChatArgs),
    /// Publish to a channel or message one user, then exit.
    Send(SendArgs),
    /// List users known to the server.
    Users,
    /// List channels known to the server.
    Channels,
    /// Print the local message log.
    History(HistoryArgs),
    /// Subscribe and record messages until interrupted.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub server: Endpoint,
    pub bus: Endpoint,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub format: OutputFormat,
}

impl Context {
    pub fn client_config(&self, user: &str) -> ClientConfig {
        ClientConfig {
            server: self.server.clone(),
            bus: self.bus.clone(),
            data_dir: self.data_dir.clone(),
            request_timeout: Some(self.request_timeout),
            ..ClientConfig::new(user)
        }
    }

    pub fn open_store(&self) -> CliResult<MessageStore> {
        MessageStore::open(&self.data_dir).map_err(|err| store_error("cannot open data dir", err))
    }

    pub fn request_client(&self) -> CliResult<RequestClient> {
        RequestClient::connect(&self.server, Some(self.request_timeout))
            .map_err(|err| client_error("connect failed", err))
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Chat(args) => chat::run(args, ctx),
        Command::Send(args) => send::run(args, ctx),
        Command::Users => directory::users(ctx),
        Command::Channels => directory::channels(ctx),
        Command::History(args) => history::run(args, ctx),
        Command::Listen(args) => listen::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// User name. Prompted for when omitted.
    #[arg(long, short = 'u', env = "MURMUR_USER")]
    pub user: Option<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Sending user.
    #[arg(long, short = 'u', env = "MURMUR_USER")]
    pub user: String,
    /// Channel to publish on.
    #[arg(long, short = 'c', conflicts_with = "to", required_unless_present = "to")]
    pub channel: Option<String>,
    /// Recipient of a private message.
    #[arg(long, short = 't')]
    pub to: Option<String>,
    /// Message text; words are joined with single spaces.
    #[arg(required = true, num_args = 1..)]
    pub message: Vec<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only messages on this channel.
    #[arg(long, short = 'c')]
    pub channel: Option<String>,
    /// Only messages from or to this user.
    #[arg(long, short = 'u')]
    pub user: Option<String>,
    /// Show at most the last N matching messages.
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Identity to log in and receive private messages as.
    #[arg(long, short = 'u', env = "MURMUR_USER")]
    pub user: String,
    /// Exit after recording N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, CliError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }
}
