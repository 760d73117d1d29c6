use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::TransportError;

/// Address of a remote peer.
///
/// Accepted forms:
/// - `tcp://host:port`
/// - `ipc:///absolute/path.sock` (Unix domain socket)
/// - a bare filesystem path, treated like `ipc://`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// TCP `host:port` pair, resolved at connect time.
    Tcp(String),
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl Endpoint {
    /// Build a TCP endpoint from host and port.
    pub fn tcp(host: &str, port: u16) -> Self {
        Endpoint::Tcp(format!("{host}:{port}"))
    }

    /// Build a Unix socket endpoint.
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Endpoint::Unix(path.as_ref().to_path_buf())
    }

    /// Scheme name for diagnostics.
    pub fn scheme(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Unix(_) => "ipc",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Unix(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            endpoint: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Err(invalid("endpoint must not be empty"));
        }

        if let Some(addr) = input.strip_prefix("tcp://") {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| invalid("expected host:port"))?;
            if host.is_empty() {
                return Err(invalid("missing host"));
            }
            // `*` is the bind-all wildcard used by server-side configs.
            let host = if host == "*" { "0.0.0.0" } else { host };
            let port: u16 = port.parse().map_err(|_| invalid("invalid port"))?;
            return Ok(Endpoint::tcp(host, port));
        }

        if let Some(path) = input.strip_prefix("ipc://") {
            if path.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(Endpoint::unix(path));
        }

        if input.contains("://") {
            return Err(invalid("unknown scheme (expected tcp:// or ipc://)"));
        }

        Ok(Endpoint::unix(input))
    }
}
