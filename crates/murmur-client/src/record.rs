//! Message records stored in the local log.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Timezone-aware creation time of a record.
pub type Timestamp = DateTime<FixedOffset>;

/// What kind of traffic a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Private message delivered to this client.
    PrivateIncoming,
    /// Channel message delivered to this client.
    ChannelIncoming,
    /// Private message sent by this client.
    PrivateSent,
    /// Channel message published by this client.
    ChannelSent,
}

impl RecordKind {
    pub fn is_private(self) -> bool {
        matches!(self, RecordKind::PrivateIncoming | RecordKind::PrivateSent)
    }

    pub fn is_incoming(self) -> bool {
        matches!(self, RecordKind::PrivateIncoming | RecordKind::ChannelIncoming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::PrivateIncoming => "private_incoming",
            RecordKind::ChannelIncoming => "channel_incoming",
            RecordKind::PrivateSent => "private_sent",
            RecordKind::ChannelSent => "channel_sent",
        }
    }
}

/// Where a record was addressed. Private kinds carry a recipient, channel
/// kinds a channel; never both.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    Recipient(String),
    Channel(String),
}

/// Violations of the record invariants, reported when decoding a stored log.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{kind} record requires a recipient and no channel")]
    ExpectedRecipient { kind: &'static str },

    #[error("{kind} record requires a channel and no recipient")]
    ExpectedChannel { kind: &'static str },

    #[error("{kind} record must not carry a raw frame")]
    UnexpectedRaw { kind: &'static str },
}

/// One entry of the message log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RecordRepr", into = "RecordRepr")]
pub struct MessageRecord {
    kind: RecordKind,
    sender: String,
    destination: Destination,
    body: String,
    timestamp: Timestamp,
    raw: Option<String>,
}

impl MessageRecord {
    /// A private message received from the bus.
    pub fn private_incoming(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        body: impl Into<String>,
        timestamp: Timestamp,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            kind: RecordKind::PrivateIncoming,
            sender: sender.into(),
            destination: Destination::Recipient(recipient.into()),
            body: body.into(),
            timestamp,
            raw: Some(raw.into()),
        }
    }

    /// A channel message received from the bus.
    pub fn channel_incoming(
        sender: impl Into<String>,
        channel: impl Into<String>,
        body: impl Into<String>,
        timestamp: Timestamp,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            kind: RecordKind::ChannelIncoming,
            sender: sender.into(),
            destination: Destination::Channel(channel.into()),
            body: body.into(),
            timestamp,
            raw: Some(raw.into()),
        }
    }

    /// A private message this client sent.
    pub fn private_sent(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        body: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            kind: RecordKind::PrivateSent,
            sender: sender.into(),
            destination: Destination::Recipient(recipient.into()),
            body: body.into(),
            timestamp,
            raw: None,
        }
    }

    /// A channel message this client published.
    pub fn channel_sent(
        sender: impl Into<String>,
        channel: impl Into<String>,
        body: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            kind: RecordKind::ChannelSent,
            sender: sender.into(),
            destination: Destination::Channel(channel.into()),
            body: body.into(),
            timestamp,
            raw: None,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Originating user; empty when the frame did not identify one.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> Option<&str> {
        match &self.destination {
            Destination::Recipient(recipient) => Some(recipient),
            Destination::Channel(_) => None,
        }
    }

    pub fn channel(&self) -> Option<&str> {
        match &self.destination {
            Destination::Channel(channel) => Some(channel),
            Destination::Recipient(_) => None,
        }
    }

    /// Recipient or channel, whichever this record is addressed to.
    pub fn destination(&self) -> &str {
        match &self.destination {
            Destination::Recipient(name) | Destination::Channel(name) => name,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The original `topic|payload` text for records built from bus frames.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Timestamp rendered as RFC 3339 with nanoseconds.
    pub fn timestamp_string(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    /// Raise the timestamp to `floor` if it is earlier. Used by the store to
    /// keep timestamps non-decreasing in append order.
    pub(crate) fn clamp_timestamp(&mut self, floor: Timestamp) {
        if self.timestamp < floor {
            self.timestamp = floor;
        }
    }
}

/// Render a timestamp the way the log persists it.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Nanos, false)
}

/// Serialized shape of a record.
#[derive(Serialize, Deserialize)]
struct RecordRepr {
    kind: RecordKind,
    #[serde(default)]
    sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    body: String,
    #[serde(with = "rfc3339_nanos")]
    timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

impl TryFrom<RecordRepr> for MessageRecord {
    type Error = RecordError;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        let kind = repr.kind;
        let destination = match (kind.is_private(), repr.recipient, repr.channel) {
            (true, Some(recipient), None) => Destination::Recipient(recipient),
            (false, None, Some(channel)) => Destination::Channel(channel),
            (true, _, _) => {
                return Err(RecordError::ExpectedRecipient {
                    kind: kind.as_str(),
                })
            }
            (false, _, _) => {
                return Err(RecordError::ExpectedChannel {
                    kind: kind.as_str(),
                })
            }
        };
        if !kind.is_incoming() && repr.raw.is_some() {
            return Err(RecordError::UnexpectedRaw {
                kind: kind.as_str(),
            });
        }

        Ok(Self {
            kind,
            sender: repr.sender,
            destination,
            body: repr.body,
            timestamp: repr.timestamp,
            raw: repr.raw,
        })
    }
}

impl From<MessageRecord> for RecordRepr {
    fn from(record: MessageRecord) -> Self {
        let (recipient, channel) = match record.destination {
            Destination::Recipient(recipient) => (Some(recipient), None),
            Destination::Channel(channel) => (None, Some(channel)),
        };
        Self {
            kind: record.kind,
            sender: record.sender,
            recipient,
            channel,
            body: record.body,
            timestamp: record.timestamp,
            raw: record.raw,
        }
    }
}

mod rfc3339_nanos {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Timestamp;

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let text = String::deserialize(deserializer)?;
        Timestamp::parse_from_rfc3339(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> Timestamp {
        Timestamp::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn channel_record_json_shape() {
        let record = MessageRecord::channel_incoming(
            "bob",
            "general",
            "hello room",
            ts("2026-01-01T10:00:00.5+02:00"),
            "general|bob: hello room",
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "channel_incoming",
                "sender": "bob",
                "channel": "general",
                "body": "hello room",
                "timestamp": "2026-01-01T10:00:00.500000000+02:00",
                "raw": "general|bob: hello room",
            })
        );
    }

    #[test]
    fn sent_record_omits_raw_and_channel() {
        let record =
            MessageRecord::private_sent("alice", "bob", "hi", ts("2026-01-01T10:00:00Z"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["recipient"], "bob");
        assert!(json.get("channel").is_none());
        assert!(json.get("raw").is_none());
        assert_eq!(record.destination(), "bob");
        assert!(record.kind().is_private());
        assert!(!record.kind().is_incoming());
    }

    #[test]
    fn decoding_rejects_both_destinations() {
        let json = r#"{"kind":"private_incoming","sender":"a","recipient":"b","channel":"c",
            "body":"x","timestamp":"2026-01-01T10:00:00Z"}"#;
        let err = serde_json::from_str::<MessageRecord>(json).unwrap_err();
        assert!(err.to_string().contains("requires a recipient"));
    }

    #[test]
    fn decoding_rejects_raw_on_sent_record() {
        let json = r#"{"kind":"channel_sent","sender":"a","channel":"general",
            "body":"x","timestamp":"2026-01-01T10:00:00Z","raw":"general|x"}"#;
        let err = serde_json::from_str::<MessageRecord>(json).unwrap_err();
        assert!(err.to_string().contains("must not carry a raw frame"));
    }

    #[test]
    fn decoding_rejects_naive_timestamp() {
        let json = r#"{"kind":"channel_sent","sender":"a","channel":"general",
            "body":"x","timestamp":"2026-01-01T10:00:00"}"#;
        assert!(serde_json::from_str::<MessageRecord>(json).is_err());
    }

    #[test]
    fn clamp_only_raises() {
        let mut record =
            MessageRecord::channel_sent("a", "general", "x", ts("2026-01-01T10:00:00Z"));
        record.clamp_timestamp(ts("2026-01-01T09:00:00Z"));
        assert_eq!(record.timestamp(), ts("2026-01-01T10:00:00Z"));
        record.clamp_timestamp(ts("2026-01-01T11:00:00Z"));
        assert_eq!(record.timestamp(), ts("2026-01-01T11:00:00Z"));
    }
}
