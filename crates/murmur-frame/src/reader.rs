use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use murmur_transport::Stream;

use crate::codec::{decode_frame, Frame, FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::flags;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames and messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Collects `MORE`-flagged frames until the final part. A control frame
    /// is only accepted as the first frame of a message.
    pub fn read_message(&mut self) -> Result<Message> {
        let first = self.read_frame()?;
        match first.flags {
            flags::SUBSCRIBE => return Ok(Message::Subscribe(first.payload)),
            flags::UNSUBSCRIBE => return Ok(Message::Unsubscribe(first.payload)),
            _ => {}
        }

        let mut more = first.has_more();
        let mut parts = vec![first.payload];
        while more {
            if parts.len() >= self.config.max_parts {
                return Err(FrameError::TooManyParts {
                    max: self.config.max_parts,
                });
            }
            let next = self.read_frame()?;
            if next.flags & (flags::SUBSCRIBE | flags::UNSUBSCRIBE) != 0 {
                return Err(FrameError::InvalidFlags(next.flags));
            }
            more = next.has_more();
            parts.push(next.payload);
        }

        Ok(Message::Data(parts))
    }
}

impl FrameReader<Stream> {
    /// Create a frame reader for a transport [`Stream`] and apply the read
    /// timeout from config.
    pub fn with_config_stream(inner: Stream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(crate::transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
