use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use murmur_client::{ClientError, MessageRecord, Reply, Session};
use tracing::debug;

use crate::cmd::{ChatArgs, Context};
use crate::exit::{client_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::describe;

const DEFAULT_HISTORY: usize = 20;

const HELP: &str = "\
  @user text        private message
  channel text      publish on a channel
  /users            list users
  /channels         list channels
  /create <name>    create and join a channel
  /history [n]      last n messages (default 20)
  /quit             leave";

/// One line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Private { to: &'a str, text: String },
    Publish { channel: &'a str, text: String },
    Users,
    Channels,
    Create(&'a str),
    History(usize),
    Help,
    Quit,
    Empty,
    Invalid(&'static str),
}

pub fn parse_line(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    if let Some(command) = line.strip_prefix('/') {
        let mut words = command.split_whitespace();
        return match (words.next(), words.next()) {
            (Some("users"), None) => Input::Users,
            (Some("channels"), None) => Input::Channels,
            (Some("create"), Some(name)) => Input::Create(name),
            (Some("create"), None) => Input::Invalid("usage: /create <name>"),
            (Some("history"), None) => Input::History(DEFAULT_HISTORY),
            (Some("history"), Some(n)) => match n.parse() {
                Ok(n) => Input::History(n),
                Err(_) => Input::Invalid("usage: /history [n]"),
            },
            (Some("quit" | "exit"), _) => Input::Quit,
            (Some("help"), _) => Input::Help,
            _ => Input::Invalid("unknown command, try /help"),
        };
    }

    let mut words = line.split_whitespace();
    let Some(target) = words.next() else {
        return Input::Empty;
    };
    let text = words.collect::<Vec<_>>().join(" ");

    match target.strip_prefix('@') {
        Some(_) if text.is_empty() => Input::Invalid("usage: @user text"),
        Some("") => Input::Invalid("usage: @user text"),
        Some(to) => Input::Private { to, text },
        None if text.is_empty() => Input::Invalid("usage: channel text"),
        None => Input::Publish {
            channel: target,
            text,
        },
    }
}

pub fn run(args: ChatArgs, ctx: &Context) -> CliResult<i32> {
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut lines = stdin.lock().lines();

    let user = match args.user {
        Some(user) => user,
        None => {
            prompt("name: ");
            match lines.next() {
                Some(line) => line.map_err(|err| io_error("failed to read name", err))?,
                None => String::new(),
            }
        }
    };
    let user = user.trim().to_string();
    if user.is_empty() {
        return Err(CliError::new(USAGE, "a non-empty user name is required"));
    }

    let store = Arc::new(ctx.open_store()?);
    let sink = |record: &MessageRecord| println!("{}", describe(record));
    let mut session = Session::start(ctx.client_config(&user), store, Arc::new(sink))
        .map_err(|err| client_error("login failed", err))?;

    println!("{user} joined: {}", session.subscriptions().join(", "));
    println!("use '@user text' for private messages, 'channel text' for channels, /help for more");

    loop {
        if interactive {
            prompt("> ");
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.map_err(|err| io_error("failed to read input", err))?;

        match parse_line(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{HELP}"),
            Input::Invalid(usage) => println!("{usage}"),
            Input::Private { to, text } => {
                let sent = session.send_private(to, &text);
                report(sent, || format!("🔒 you -> {to}: {text}"));
            }
            Input::Publish { channel, text } => {
                let sent = session.publish(channel, &text);
                report(sent, || format!("#{channel} you: {text}"));
            }
            Input::Users => match session.users() {
                Ok(users) => println!("users: {}", users.join(", ")),
                Err(err) => eprintln!("error: {}", client_error("users failed", err)),
            },
            Input::Channels => match session.channels() {
                Ok(channels) => println!("channels: {}", channels.join(", ")),
                Err(err) => eprintln!("error: {}", client_error("channels failed", err)),
            },
            Input::Create(name) => {
                let created = session.create_channel(name);
                report(created, || format!("created #{name}"));
            }
            Input::History(n) => {
                for record in session.store().recent(n) {
                    println!("{}", describe(&record));
                }
            }
        }
    }

    debug!(%user, "chat session ended");
    Ok(SUCCESS)
}

/// Print the outcome of a request. Failures are shown and the session goes on.
fn report(result: Result<Reply, ClientError>, ok: impl FnOnce() -> String) {
    match result {
        Ok(reply) if reply.status().is_none() || reply.is_success() => println!("{}", ok()),
        Ok(reply) => println!(
            "server answered {}{}",
            reply.status().map(|s| s.to_string()).unwrap_or_default(),
            reply
                .description()
                .map(|d| format!(": {d}"))
                .unwrap_or_default()
        ),
        Err(err) => eprintln!("error: {}", client_error("request failed", err)),
    }
}

fn prompt(text: &str) {
    let mut out = io::stdout();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}
