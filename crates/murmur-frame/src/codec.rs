use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::flags;

/// Frame header: magic (2) + length (4) + flags (2) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "MW" (0x4D 0x57).
pub const MAGIC: [u8; 2] = [0x4D, 0x57];

/// Default maximum payload size per part: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// Default maximum number of parts in one multipart message.
pub const DEFAULT_MAX_PARTS: usize = 16;

/// One wire frame (a single part of a message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Flag bits, see [`crate::flags`].
    pub flags: u16,
    /// The part payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(flags: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            flags,
            payload: payload.into(),
        }
    }

    /// Whether more parts of the same message follow this one.
    pub fn has_more(&self) -> bool {
        self.flags & flags::MORE != 0
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬──────────┬─────────────────┐
/// │ Magic (2B)   │ Length    │ Flags    │ Payload          │
/// │ 0x4D 0x57    │ (4B LE)   │ (2B LE)  │ (Length bytes)   │
/// │ "MW"         │           │          │                  │
/// └──────────────┴───────────┴──────────┴─────────────────┘
/// ```
pub fn encode_frame(flags: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if !flags::is_valid(flags) {
        return Err(FrameError::InvalidFlags(flags));
    }
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_u16_le(flags);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let flags = u16::from_le_bytes([src[6], src[7]]);

    if !flags::is_valid(flags) {
        return Err(FrameError::InvalidFlags(flags));
    }

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { flags, payload }))
}

/// A complete message as assembled from one or more frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Application data; one entry per part, in wire order.
    Data(Vec<Bytes>),
    /// Subscription request for a topic prefix.
    Subscribe(Bytes),
    /// Subscription removal for a topic prefix.
    Unsubscribe(Bytes),
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size per part in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
    /// Maximum parts per multipart message. Default: 16.
    pub max_parts: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_parts: DEFAULT_MAX_PARTS,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"general|bob: hi";

        encode_frame(0, payload, &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.flags, 0);
        assert!(!frame.has_more());
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x4D, 0x57, 0x00][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(flags::MORE, b"general", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFF, 0xFF, 0, 0, 0, 0, 0, 0][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn decode_rejects_unknown_flags() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(0);
        buf.put_u16_le(0x8000);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidFlags(0x8000))));
    }

    #[test]
    fn encode_rejects_continued_control_frame() {
        let mut buf = BytesMut::new();
        let result = encode_frame(flags::SUBSCRIBE | flags::MORE, b"general", &mut buf);
        assert!(matches!(result, Err(FrameError::InvalidFlags(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(32 * 1024 * 1024);
        buf.put_u16_le(0);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn two_part_message_on_the_wire() {
        let mut buf = BytesMut::new();
        encode_frame(flags::MORE, b"general", &mut buf).unwrap();
        encode_frame(0, b"bob: hello", &mut buf).unwrap();

        let topic = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(topic.has_more());
        assert_eq!(topic.payload.as_ref(), b"general");

        let payload = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(!payload.has_more());
        assert_eq!(payload.payload.as_ref(), b"bob: hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_payload() {
        let mut buf = BytesMut::new();
        encode_frame(0, b"", &mut buf).unwrap();
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(Frame::new(0, Bytes::from_static(b"test")).wire_size(), HEADER_SIZE + 4);
    }
}
