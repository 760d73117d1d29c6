//! Length-prefixed multipart message framing for murmur.
//!
//! Every part on the wire is framed with:
//! - A 2-byte magic number ("MW") for stream synchronization
//! - A 4-byte little-endian payload length
//! - A 2-byte little-endian flag set (`MORE`, `SUBSCRIBE`, `UNSUBSCRIBE`)
//!
//! Parts flagged `MORE` are glued to the following part, which gives the bus
//! its two framing conventions: a single combined part or a topic part
//! followed by a payload part.

pub mod codec;
pub mod error;
pub mod flags;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, Message, DEFAULT_MAX_PARTS,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

pub(crate) fn transport_to_frame_error(err: murmur_transport::TransportError) -> FrameError {
    match err {
        murmur_transport::TransportError::Io(io)
        | murmur_transport::TransportError::Accept(io) => FrameError::Io(io),
        murmur_transport::TransportError::Bind { source, .. }
        | murmur_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
