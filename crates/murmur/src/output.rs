use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use murmur_client::{MessageRecord, RecordKind, Reply, Status};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print a batch of records. Tables get one shared header.
pub fn print_records(records: &[MessageRecord], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if records.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIME", "KIND", "FROM", "TO", "MESSAGE"]);
            for record in records {
                table.add_row(vec![
                    record.timestamp().format("%Y-%m-%d %H:%M:%S").to_string(),
                    record.kind().as_str().to_string(),
                    record.sender().to_string(),
                    destination_label(record),
                    record.body().to_string(),
                ]);
            }
            println!("{table}");
        }
        _ => {
            for record in records {
                print_record(record, format);
            }
        }
    }
}

/// Print one record as it arrives.
pub fn print_record(record: &MessageRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table | OutputFormat::Pretty => println!("{}", describe(record)),
        OutputFormat::Raw => {
            let line = record.raw().unwrap_or_else(|| record.body());
            print_raw(format!("{line}\n").as_bytes());
        }
    }
}

/// Human-readable one-liner for chat output.
pub fn describe(record: &MessageRecord) -> String {
    let time = record.timestamp().format("%H:%M:%S");
    let sender = if record.sender().is_empty() {
        "?"
    } else {
        record.sender()
    };
    match record.kind() {
        RecordKind::PrivateIncoming => format!("[{time}] 🔒 {sender} -> you: {}", record.body()),
        RecordKind::PrivateSent => format!(
            "[{time}] 🔒 you -> {}: {}",
            record.destination(),
            record.body()
        ),
        RecordKind::ChannelIncoming | RecordKind::ChannelSent => format!(
            "[{time}] #{} {sender}: {}",
            record.destination(),
            record.body()
        ),
    }
}

#[derive(Serialize)]
struct NamesOutput<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    names: &'a [String],
}

/// Print a user or channel listing.
pub fn print_names(kind: &str, names: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&NamesOutput { kind, names }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![kind.to_uppercase()]);
            for name in names {
                table.add_row(vec![name.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{kind}: {}", names.join(", ")),
        OutputFormat::Raw => {
            for name in names {
                println!("{name}");
            }
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    service: &'a str,
    status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    data: &'a serde_json::Map<String, serde_json::Value>,
}

/// Print the server's answer to a one-shot request.
pub fn print_reply(reply: &Reply, format: OutputFormat) {
    let status = reply.status();
    match format {
        OutputFormat::Json => print_json(&ReplyOutput {
            service: reply.service().as_str(),
            status,
            description: reply.description(),
            data: reply.data(),
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERVICE", "STATUS", "DESCRIPTION"])
                .add_row(vec![
                    reply.service().to_string(),
                    status_label(status.as_ref()),
                    reply.description().unwrap_or_default().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match reply.description() {
            Some(description) => println!(
                "{}: {} ({description})",
                reply.service(),
                status_label(status.as_ref())
            ),
            None => println!("{}: {}", reply.service(), status_label(status.as_ref())),
        },
        OutputFormat::Raw => println!("{}", serde_json::Value::Object(reply.data().clone())),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn destination_label(record: &MessageRecord) -> String {
    if record.kind().is_private() {
        format!("@{}", record.destination())
    } else {
        format!("#{}", record.destination())
    }
}

fn status_label(status: Option<&Status>) -> String {
    status.map_or_else(|| "-".to_string(), Status::to_string)
}
