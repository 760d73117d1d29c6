use std::path::PathBuf;

/// Errors raised by the local message store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The data directory could not be created. Fatal at startup.
    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot could not be written. The record is kept in memory.
    #[error("failed to persist message log to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The log could not be serialized.
    #[error("failed to serialize message log: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error (connect, socket I/O).
    #[error("transport error: {0}")]
    Transport(#[from] murmur_transport::TransportError),

    /// Frame-level error while sending or receiving.
    #[error("frame error: {0}")]
    Frame(#[from] murmur_frame::FrameError),

    /// The reply could not be decoded. `raw` holds the reply text.
    #[error("malformed reply: {source} (raw reply: {raw})")]
    Protocol {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// No usable user identity was supplied.
    #[error("a non-empty user name is required")]
    MissingIdentity,

    /// The subscriber thread could not be started.
    #[error("failed to start subscriber thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl ClientError {
    /// True for send/receive failures on either connection.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Frame(_))
    }

    /// True when the failure was a request/receive timeout.
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::Frame(err) => err.is_timeout(),
            ClientError::Transport(err) => err.io_source().is_some_and(|io| {
                matches!(
                    io.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                )
            }),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
