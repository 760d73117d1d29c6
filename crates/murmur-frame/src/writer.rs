use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use murmur_transport::Stream;

use crate::codec::{encode_frame, FrameConfig, Message};
use crate::error::{FrameError, Result};
use crate::flags;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete messages to any `Write` stream.
///
/// A multipart message is encoded into one buffer and written in a single
/// pass, so parts of two messages never interleave on the same writer.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Send a single-part data message.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.send_parts(&[payload])
    }

    /// Send a multipart data message; every part but the last carries `MORE`.
    pub fn send_parts(&mut self, parts: &[&[u8]]) -> Result<()> {
        if parts.is_empty() {
            return self.send(b"");
        }
        if parts.len() > self.config.max_parts {
            return Err(FrameError::TooManyParts {
                max: self.config.max_parts,
            });
        }

        self.buf.clear();
        let last = parts.len() - 1;
        for (idx, part) in parts.iter().enumerate() {
            self.check_size(part)?;
            let flags = if idx < last { flags::MORE } else { 0 };
            encode_frame(flags, part, &mut self.buf)?;
        }
        self.write_buffered()
    }

    /// Ask the peer to start delivering messages whose topic starts with `topic`.
    pub fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.send_control(flags::SUBSCRIBE, topic.as_bytes())
    }

    /// Write a complete [`Message`].
    pub fn write_message(&mut self, message: &Message) -> Result<()> {
        match message {
            Message::Data(parts) => {
                let parts: Vec<&[u8]> = parts.iter().map(|p| p.as_ref()).collect();
                self.send_parts(&parts)
            }
            Message::Subscribe(topic) => self.send_control(flags::SUBSCRIBE, topic),
            Message::Unsubscribe(topic) => self.send_control(flags::UNSUBSCRIBE, topic),
        }
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn send_control(&mut self, flags: u16, topic: &[u8]) -> Result<()> {
        self.check_size(topic)?;
        self.buf.clear();
        encode_frame(flags, topic, &mut self.buf)?;
        self.write_buffered()
    }

    fn check_size(&self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        Ok(())
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        self.flush()
    }
}

impl FrameWriter<Stream> {
    /// Create a frame writer for a transport [`Stream`] and apply the write
    /// timeout from config.
    pub fn with_config_stream(inner: Stream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(crate::transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
