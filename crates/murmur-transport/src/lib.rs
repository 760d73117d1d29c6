//! Stream transport for murmur.
//!
//! Provides a unified byte-stream interface over:
//! - TCP (`tcp://host:port`)
//! - Unix domain sockets (`ipc:///path`, Unix only)
//!
//! This is the lowest layer of murmur. Framing and the chat client build on
//! top of the [`Stream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::Listener;
pub use stream::Stream;
