//! Turns a bus frame's topic and payload into a [`MessageRecord`].
//!
//! A frame whose topic equals our own identity is a private message; any
//! other topic is a channel. Payloads without the expected delimiters are
//! kept whole with an empty sender rather than rejected.

use crate::record::{MessageRecord, Timestamp};

/// Marker placed by the server between sender and text of a private message.
pub const PRIVATE_MARKER: &str = "sent private message:";

/// The same marker as emitted by Portuguese-locale servers.
pub const PRIVATE_MARKER_PT: &str = "enviou mensagem privada:";

/// Decorative glyph servers put in front of the sender of a private message.
pub const PRIVATE_GLYPH: &str = "🔒";

/// Separator between sender and text in channel payloads.
pub const CHANNEL_DELIMITER: char = ':';

/// Locale-dependent markers used by [`parse_frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Private-message markers; whichever occurs earliest in the payload wins.
    pub private_markers: Vec<String>,
    /// Glyph stripped from the front of a private sender.
    pub sender_glyph: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            private_markers: vec![PRIVATE_MARKER.to_string(), PRIVATE_MARKER_PT.to_string()],
            sender_glyph: PRIVATE_GLYPH.to_string(),
        }
    }
}

/// Parse one bus frame addressed to `self_id`.
pub fn parse_frame(
    topic: &str,
    payload: &str,
    self_id: &str,
    timestamp: Timestamp,
    config: &ParserConfig,
) -> MessageRecord {
    let raw = format!("{topic}|{payload}");

    if topic == self_id {
        let (sender, body) = split_private(payload, config);
        return MessageRecord::private_incoming(sender, self_id, body, timestamp, raw);
    }

    let (sender, body) = split_channel(payload);
    MessageRecord::channel_incoming(sender, topic, body, timestamp, raw)
}

fn split_private<'a>(payload: &'a str, config: &ParserConfig) -> (&'a str, &'a str) {
    // Earliest occurrence wins; on a tie the longer marker wins.
    let marker = config
        .private_markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .filter_map(|marker| payload.find(marker.as_str()).map(|idx| (idx, marker.len())))
        .min_by_key(|&(idx, len)| (idx, std::cmp::Reverse(len)));

    match marker {
        Some((idx, len)) => {
            let before = payload[..idx].trim();
            let sender = if config.sender_glyph.is_empty() {
                before
            } else {
                before
                    .strip_prefix(config.sender_glyph.as_str())
                    .unwrap_or(before)
                    .trim()
            };
            (sender, payload[idx + len..].trim())
        }
        None => ("", payload),
    }
}

fn split_channel(payload: &str) -> (&str, &str) {
    match payload.split_once(CHANNEL_DELIMITER) {
        Some((left, body)) => {
            let sender = left.split_whitespace().next().unwrap_or("");
            (sender, body.trim())
        }
        None => ("", payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    fn at() -> Timestamp {
        Timestamp::parse_from_rfc3339("2026-01-01T10:00:00Z").unwrap()
    }

    fn parse(topic: &str, payload: &str) -> MessageRecord {
        parse_frame(topic, payload, "alice", at(), &ParserConfig::default())
    }

    #[test]
    fn private_with_marker() {
        let record = parse("alice", "alice sent private message: hi there");
        assert_eq!(record.kind(), RecordKind::PrivateIncoming);
        assert_eq!(record.sender(), "alice");
        assert_eq!(record.recipient(), Some("alice"));
        assert_eq!(record.channel(), None);
        assert_eq!(record.body(), "hi there");
        assert_eq!(record.raw(), Some("alice|alice sent private message: hi there"));
    }

    #[test]
    fn private_strips_glyph_from_sender() {
        let record = parse("alice", "🔒 bob sent private message: psst");
        assert_eq!(record.sender(), "bob");
        assert_eq!(record.body(), "psst");
    }

    #[test]
    fn private_with_portuguese_marker() {
        let record = parse("alice", "🔒 carla enviou mensagem privada: oi");
        assert_eq!(record.sender(), "carla");
        assert_eq!(record.body(), "oi");
    }

    #[test]
    fn private_without_marker_has_no_sender() {
        let record = parse("alice", "just some words");
        assert_eq!(record.kind(), RecordKind::PrivateIncoming);
        assert_eq!(record.sender(), "");
        assert_eq!(record.body(), "just some words");
    }

    #[test]
    fn private_splits_on_first_marker_only() {
        let record = parse(
            "alice",
            "bob sent private message: I sent private message: twice",
        );
        assert_eq!(record.sender(), "bob");
        assert_eq!(record.body(), "I sent private message: twice");
    }

    #[test]
    fn private_splits_on_earliest_marker_in_payload() {
        let record = parse(
            "alice",
            "bob enviou mensagem privada: a sent private message: b",
        );
        assert_eq!(record.sender(), "bob");
        assert_eq!(record.body(), "a sent private message: b");

        let record = parse(
            "alice",
            "bob sent private message: a enviou mensagem privada: b",
        );
        assert_eq!(record.sender(), "bob");
        assert_eq!(record.body(), "a enviou mensagem privada: b");
    }

    #[test]
    fn private_marker_tie_prefers_longer_marker() {
        let config = ParserConfig {
            private_markers: vec!["says".to_string(), "says privately:".to_string()],
            ..ParserConfig::default()
        };
        let record = parse_frame("alice", "bob says privately: hi", "alice", at(), &config);
        assert_eq!(record.sender(), "bob");
        assert_eq!(record.body(), "hi");
    }

    #[test]
    fn private_empty_body() {
        let record = parse("alice", "bob sent private message:   ");
        assert_eq!(record.sender(), "bob");
        assert_eq!(record.body(), "");
    }

    #[test]
    fn channel_with_sender() {
        let record = parse("general", "bob: hello room");
        assert_eq!(record.kind(), RecordKind::ChannelIncoming);
        assert_eq!(record.sender(), "bob");
        assert_eq!(record.channel(), Some("general"));
        assert_eq!(record.recipient(), None);
        assert_eq!(record.body(), "hello room");
        assert_eq!(record.raw(), Some("general|bob: hello room"));
    }

    #[test]
    fn channel_without_colon() {
        let record = parse("general", "no colon here");
        assert_eq!(record.kind(), RecordKind::ChannelIncoming);
        assert_eq!(record.sender(), "");
        assert_eq!(record.channel(), Some("general"));
        assert_eq!(record.body(), "no colon here");
    }

    #[test]
    fn channel_sender_is_first_token_before_colon() {
        let record = parse("general", "  bob the builder : can we fix it: yes");
        assert_eq!(record.sender(), "bob");
        assert_eq!(record.body(), "can we fix it: yes");
    }

    #[test]
    fn channel_empty_sender_and_body() {
        let record = parse("general", ":");
        assert_eq!(record.sender(), "");
        assert_eq!(record.body(), "");
    }

    #[test]
    fn custom_marker_config() {
        let config = ParserConfig {
            private_markers: vec!["whispers:".to_string()],
            sender_glyph: String::new(),
        };
        let record = parse_frame("alice", "dave whispers: boo", "alice", at(), &config);
        assert_eq!(record.sender(), "dave");
        assert_eq!(record.body(), "boo");
    }
}
