//! Publish/subscribe side of the chat server.
//!
//! A bus message arrives either as one combined part `"<topic>|<payload>"`
//! or as two parts `(topic, payload)`. [`extract`] is the single place that
//! decides between the two, by part count.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use murmur_frame::{FrameConfig, FrameReader, FrameWriter, Message};
use murmur_transport::{Endpoint, Stream};
use tracing::{debug, trace};

use crate::error::Result;

/// Separator between topic and payload in a combined single-part frame.
pub const TOPIC_SEPARATOR: char = '|';

/// Topic and payload of one bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusFrame {
    pub topic: String,
    pub payload: String,
}

/// Extract topic and payload from the parts of one bus message.
///
/// Returns `None` for messages that cannot be interpreted: no parts, a
/// single part without a separator, or non-UTF-8 text.
pub fn extract(parts: &[Bytes]) -> Option<BusFrame> {
    match parts {
        [] => None,
        [combined] => {
            let text = std::str::from_utf8(combined).ok()?;
            let (topic, payload) = text.split_once(TOPIC_SEPARATOR)?;
            Some(BusFrame {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })
        }
        [topic, payload, ..] => Some(BusFrame {
            topic: std::str::from_utf8(topic).ok()?.to_string(),
            payload: std::str::from_utf8(payload).ok()?.to_string(),
        }),
    }
}

/// Anything that yields raw bus messages, one `Vec` of parts per message.
pub trait BusSource: Send {
    /// Block until the next message arrives.
    fn recv(&mut self) -> Result<Vec<Bytes>>;
}

/// Subscribing connection to the bus.
///
/// Connects lazily and sends one subscription per topic. When a receive
/// fails the connection is dropped; the next [`BusSource::recv`] reconnects
/// and subscribes again.
pub struct BusSubscriber {
    endpoint: Endpoint,
    config: FrameConfig,
    reader: Option<FrameReader<Stream>>,
    shared: Arc<Mutex<Subscriptions>>,
}

/// Topic list plus the write half of the live connection, shared with
/// [`SubscriptionHandle`]s so topics can be added while `recv` blocks.
#[derive(Default)]
struct Subscriptions {
    topics: Vec<String>,
    writer: Option<FrameWriter<Stream>>,
}

impl Subscriptions {
    fn add(&mut self, topic: String) -> Result<()> {
        if self.topics.contains(&topic) {
            return Ok(());
        }
        let sent = match self.writer.as_mut() {
            Some(writer) => writer.subscribe(&topic),
            None => Ok(()),
        };
        debug!(%topic, "subscribed");
        self.topics.push(topic);
        if let Err(err) = sent {
            // The reader notices the broken connection and resubscribes.
            self.writer = None;
            return Err(err.into());
        }
        Ok(())
    }
}

impl BusSubscriber {
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_config(endpoint, FrameConfig::default())
    }

    pub fn with_config(endpoint: Endpoint, config: FrameConfig) -> Self {
        Self {
            endpoint,
            config,
            reader: None,
            shared: Arc::default(),
        }
    }

    /// Add a topic. Sent immediately when connected, otherwise on connect.
    pub fn subscribe(&mut self, topic: impl Into<String>) -> Result<()> {
        lock(&self.shared).add(topic.into())
    }

    /// Handle for adding topics from another thread.
    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Topics this subscriber asks for.
    pub fn topics(&self) -> Vec<String> {
        lock(&self.shared).topics.clone()
    }

    /// Connect now instead of on the first receive.
    pub fn connect(&mut self) -> Result<()> {
        self.reader().map(|_| ())
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn reader(&mut self) -> Result<&mut FrameReader<Stream>> {
        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => self.open()?,
        };
        Ok(self.reader.insert(reader))
    }

    fn open(&self) -> Result<FrameReader<Stream>> {
        let stream = Stream::connect(&self.endpoint)?;
        let reader = FrameReader::with_config_stream(stream.try_clone()?, self.config.clone())?;
        let mut writer = FrameWriter::with_config_stream(stream, self.config.clone())?;

        let mut shared = lock(&self.shared);
        for topic in &shared.topics {
            writer.subscribe(topic)?;
        }
        debug!(endpoint = %self.endpoint, topics = shared.topics.len(), "bus connected");
        shared.writer = Some(writer);
        Ok(reader)
    }

    fn disconnect(&mut self) {
        self.reader = None;
        lock(&self.shared).writer = None;
    }
}

impl BusSource for BusSubscriber {
    fn recv(&mut self) -> Result<Vec<Bytes>> {
        loop {
            match self.reader()?.read_message() {
                Ok(Message::Data(parts)) => return Ok(parts),
                Ok(other) => {
                    trace!(?other, "ignoring control message from bus");
                }
                Err(err) => {
                    self.disconnect();
                    return Err(err.into());
                }
            }
        }
    }
}

/// Adds topics to a [`BusSubscriber`] that has moved to another thread.
#[derive(Clone)]
pub struct SubscriptionHandle {
    shared: Arc<Mutex<Subscriptions>>,
}

impl SubscriptionHandle {
    pub fn subscribe(&self, topic: impl Into<String>) -> Result<()> {
        lock(&self.shared).add(topic.into())
    }

    pub fn topics(&self) -> Vec<String> {
        lock(&self.shared).topics.clone()
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("topics", &self.topics())
            .finish()
    }
}

fn lock(shared: &Mutex<Subscriptions>) -> MutexGuard<'_, Subscriptions> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
