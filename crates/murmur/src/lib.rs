//! Chat client for murmur servers.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix socket endpoints and streams
//! - [`frame`]: length-prefixed multipart framing with subscription control
//! - [`client`]: message log, frame parser, request/reply client and
//!   subscriber loop (behind the `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use murmur_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use murmur_frame::*;
}

/// Re-export client pipeline types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use murmur_client::*;
}
