//! Request/reply client for the chat server's command endpoint.
//!
//! Every request is one JSON object `{"service": <name>, "data": {...}}`
//! sent as a single-part message; the server answers with exactly one
//! `{"data": {...}}` on the same connection.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use murmur_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, Message};
use murmur_transport::{Endpoint, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::record::{format_timestamp, Timestamp};

/// Default time allowed for one request or reply to cross the wire.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Services understood by the chat server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Login,
    Users,
    Channels,
    /// Create a channel.
    Channel,
    Publish,
    /// Private message to one user.
    Message,
}

impl Service {
    pub const ALL: [Service; 6] = [
        Service::Login,
        Service::Users,
        Service::Channels,
        Service::Channel,
        Service::Publish,
        Service::Message,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Service::Login => "login",
            Service::Users => "users",
            Service::Channels => "channels",
            Service::Channel => "channel",
            Service::Publish => "publish",
            Service::Message => "message",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|service| service.as_str() == s)
            .ok_or_else(|| format!("unknown service: {s}"))
    }
}

/// Normalized reply status.
///
/// Servers answer in more than one language and casing; this folds the
/// known tokens and keeps anything else verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Offline,
    Other(String),
}

impl Status {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "ok" | "success" | "sucesso" | "delivered" => Status::Success,
            "erro" | "error" => Status::Error,
            "offline" => Status::Offline,
            _ => Status::Other(token.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Offline => "offline",
            Status::Other(token) => token,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    service: &'a str,
    data: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct ReplyBody {
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    data: Map<String, Value>,
}

/// One decoded reply, tagged with the service that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    service: Service,
    data: Map<String, Value>,
}

impl Reply {
    pub fn new(service: Service, data: Map<String, Value>) -> Self {
        Self { service, data }
    }

    pub fn service(&self) -> Service {
        self.service
    }

    /// The raw `data` mapping.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Normalized `status`, when the reply carries one.
    pub fn status(&self) -> Option<Status> {
        self.str_field("status").map(Status::parse)
    }

    /// True when the reply carries a success status.
    pub fn is_success(&self) -> bool {
        self.status().is_some_and(|status| status.is_success())
    }

    pub fn description(&self) -> Option<&str> {
        self.str_field("description")
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.str_field("timestamp")
    }

    pub fn users(&self) -> Option<Vec<String>> {
        self.list_field("users")
    }

    /// Channel names. Some servers answer the channel query under `users`,
    /// which is accepted as a fallback.
    pub fn channels(&self) -> Option<Vec<String>> {
        self.list_field("channels")
            .or_else(|| self.list_field("users"))
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    fn list_field(&self, key: &str) -> Option<Vec<String>> {
        let items = self.data.get(key)?.as_array()?;
        Some(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        )
    }
}

struct Connection {
    reader: FrameReader<Stream>,
    writer: FrameWriter<Stream>,
}

impl Connection {
    fn open(stream: Stream, config: &FrameConfig) -> Result<Self> {
        let reader = FrameReader::with_config_stream(stream.try_clone()?, config.clone())?;
        let writer = FrameWriter::with_config_stream(stream, config.clone())?;
        Ok(Self { reader, writer })
    }
}

/// Half-duplex client for the command endpoint.
///
/// `invoke` takes `&mut self`, so only one request is ever outstanding.
/// A transport failure discards the connection; a client created from an
/// endpoint reconnects on the next call.
pub struct RequestClient {
    endpoint: Option<Endpoint>,
    config: FrameConfig,
    conn: Option<Connection>,
}

impl RequestClient {
    /// Connect to `endpoint`, applying `timeout` to every request and reply.
    pub fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<Self> {
        let config = frame_config(timeout);
        let stream = Stream::connect(endpoint)?;
        let conn = Connection::open(stream, &config)?;
        debug!(%endpoint, "request client connected");
        Ok(Self {
            endpoint: Some(endpoint.clone()),
            config,
            conn: Some(conn),
        })
    }

    /// Wrap an already connected stream. Such a client cannot reconnect.
    pub fn from_stream(stream: Stream, timeout: Option<Duration>) -> Result<Self> {
        let config = frame_config(timeout);
        let conn = Connection::open(stream, &config)?;
        Ok(Self {
            endpoint: None,
            config,
            conn: Some(conn),
        })
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Send one request and block until its reply arrives.
    pub fn invoke(&mut self, service: Service, data: Map<String, Value>) -> Result<Reply> {
        let body = serde_json::to_vec(&RequestBody {
            service: service.as_str(),
            data: &data,
        })
        .map_err(ClientError::Encode)?;

        let conn = self.connection()?;
        let exchanged = conn
            .writer
            .send(&body)
            .and_then(|()| conn.reader.read_message());
        let message = match exchanged {
            Ok(message) => message,
            Err(err) => {
                warn!(%service, error = %err, "request failed, dropping connection");
                self.conn = None;
                return Err(err.into());
            }
        };

        let raw = match message {
            Message::Data(parts) => parts.into_iter().next().unwrap_or_default(),
            Message::Subscribe(_) | Message::Unsubscribe(_) => Default::default(),
        };
        let text = String::from_utf8_lossy(&raw);
        let reply: ReplyBody =
            serde_json::from_str(&text).map_err(|source| ClientError::Protocol {
                raw: text.to_string(),
                source,
            })?;

        if let Some(echo) = reply.service.as_deref() {
            if echo != service.as_str() {
                debug!(%service, echo, "reply echoes a different service");
            }
        }
        Ok(Reply::new(service, reply.data))
    }

    pub fn login(&mut self, user: &str, at: &Timestamp) -> Result<Reply> {
        self.invoke(
            Service::Login,
            data(json!({ "user": user, "timestamp": format_timestamp(at) })),
        )
    }

    pub fn users(&mut self, at: &Timestamp) -> Result<Reply> {
        self.invoke(
            Service::Users,
            data(json!({ "timestamp": format_timestamp(at) })),
        )
    }

    pub fn channels(&mut self, at: &Timestamp) -> Result<Reply> {
        self.invoke(
            Service::Channels,
            data(json!({ "timestamp": format_timestamp(at) })),
        )
    }

    pub fn create_channel(&mut self, channel: &str, at: &Timestamp) -> Result<Reply> {
        self.invoke(
            Service::Channel,
            data(json!({ "channel": channel, "timestamp": format_timestamp(at) })),
        )
    }

    pub fn publish(
        &mut self,
        user: &str,
        channel: &str,
        message: &str,
        at: &Timestamp,
    ) -> Result<Reply> {
        self.invoke(
            Service::Publish,
            data(json!({
                "user": user,
                "channel": channel,
                "message": message,
                "timestamp": format_timestamp(at),
            })),
        )
    }

    pub fn message(&mut self, src: &str, dst: &str, message: &str, at: &Timestamp) -> Result<Reply> {
        self.invoke(
            Service::Message,
            data(json!({
                "src": src,
                "dst": dst,
                "message": message,
                "timestamp": format_timestamp(at),
            })),
        )
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let endpoint = self
                    .endpoint
                    .as_ref()
                    .ok_or(ClientError::Frame(FrameError::ConnectionClosed))?;
                debug!(%endpoint, "reconnecting request client");
                Connection::open(Stream::connect(endpoint)?, &self.config)?
            }
        };
        Ok(self.conn.insert(conn))
    }
}

fn frame_config(timeout: Option<Duration>) -> FrameConfig {
    FrameConfig {
        read_timeout: timeout,
        write_timeout: timeout,
        ..FrameConfig::default()
    }
}

fn data(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
