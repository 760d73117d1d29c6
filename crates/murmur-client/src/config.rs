use std::path::PathBuf;
use std::time::Duration;

use murmur_transport::Endpoint;

use crate::parser::ParserConfig;
use crate::rpc::DEFAULT_REQUEST_TIMEOUT;
use crate::subscriber::RetryPolicy;

/// Default command endpoint of the chat server.
pub const DEFAULT_SERVER_HOST: &str = "server";
pub const DEFAULT_SERVER_PORT: u16 = 5555;

/// Default publish side of the bus proxy.
pub const DEFAULT_BUS_HOST: &str = "proxy";
pub const DEFAULT_BUS_PORT: u16 = 5558;

pub const DEFAULT_DATA_DIR: &str = "data";

/// Channel joined when the server does not report any.
pub const DEFAULT_CHANNEL: &str = "general";

/// Everything a [`Session`](crate::Session) needs to start.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request/reply endpoint.
    pub server: Endpoint,
    /// Bus endpoint to subscribe on.
    pub bus: Endpoint,
    /// Directory holding `messages.json`.
    pub data_dir: PathBuf,
    /// Our identity. Also the topic private messages arrive on.
    pub user: String,
    /// Channels to join when discovery fails or returns no list.
    pub default_channels: Vec<String>,
    /// Read/write timeout for each request. `None` blocks indefinitely.
    pub request_timeout: Option<Duration>,
    pub parser: ParserConfig,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: Endpoint::tcp(DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT),
            bus: Endpoint::tcp(DEFAULT_BUS_HOST, DEFAULT_BUS_PORT),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            user: String::new(),
            default_channels: vec![DEFAULT_CHANNEL.to_string()],
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            parser: ParserConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let config = ClientConfig::new("alice");
        assert_eq!(config.user, "alice");
        assert_eq!(config.server.to_string(), "tcp://server:5555");
        assert_eq!(config.bus.to_string(), "tcp://proxy:5558");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.default_channels, ["general"]);
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.retry.delay(0), Duration::from_millis(500));
    }
}
