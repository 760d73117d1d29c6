//! Login, channel discovery and the foreground half of a chat session.

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::bus::{BusSubscriber, SubscriptionHandle};
use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::record::MessageRecord;
use crate::rpc::{Reply, RequestClient};
use crate::sink::EventSink;
use crate::store::MessageStore;
use crate::subscriber::SubscriberLoop;

/// A logged-in client with its subscriber running in the background.
///
/// Messages sent through the session are appended to the store after the
/// server has answered, whatever the reply status.
pub struct Session {
    user: String,
    client: RequestClient,
    store: Arc<MessageStore>,
    clock: Arc<dyn Clock>,
    login: Reply,
    subscriptions: SubscriptionHandle,
    subscriber: JoinHandle<()>,
}

impl Session {
    /// Log in, discover channels and start the subscriber thread.
    pub fn start(
        config: ClientConfig,
        store: Arc<MessageStore>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        Self::start_with_clock(config, store, sink, Arc::new(SystemClock))
    }

    pub fn start_with_clock(
        config: ClientConfig,
        store: Arc<MessageStore>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let user = config.user.trim().to_string();
        if user.is_empty() {
            return Err(ClientError::MissingIdentity);
        }

        let mut client = RequestClient::connect(&config.server, config.request_timeout)?;
        let login = client.login(&user, &clock.now())?;
        match login.status() {
            Some(status) if status.is_success() => info!(%user, "logged in"),
            status => warn!(
                %user,
                status = status.as_ref().map(|s| s.as_str()).unwrap_or("none"),
                description = login.description().unwrap_or_default(),
                "login not acknowledged, continuing"
            ),
        }

        let channels = discover_channels(&mut client, &config.default_channels, clock.as_ref());

        let mut bus = BusSubscriber::new(config.bus.clone());
        bus.subscribe(user.as_str())?;
        for channel in &channels {
            bus.subscribe(channel.as_str())?;
            info!(%user, %channel, "joined channel");
        }
        let subscriptions = bus.handle();

        let subscriber = SubscriberLoop::new(bus, user.as_str(), Arc::clone(&store))
            .with_sink(sink)
            .with_clock(Arc::clone(&clock))
            .with_parser(config.parser.clone())
            .with_retry(config.retry)
            .spawn()
            .map_err(ClientError::Spawn)?;

        Ok(Self {
            user,
            client,
            store,
            clock,
            login,
            subscriptions,
            subscriber,
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// The reply to our login request.
    pub fn login_reply(&self) -> &Reply {
        &self.login
    }

    /// Topics the subscriber listens on: our identity, then channels.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.topics()
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// True while the subscriber thread is alive.
    pub fn is_listening(&self) -> bool {
        !self.subscriber.is_finished()
    }

    /// Send a private message to `dst`.
    pub fn send_private(&mut self, dst: &str, message: &str) -> Result<Reply> {
        let at = self.clock.now();
        let reply = self.client.message(&self.user, dst, message, &at)?;
        self.record(MessageRecord::private_sent(&self.user, dst, message, at));
        Ok(reply)
    }

    /// Publish `message` on `channel`.
    pub fn publish(&mut self, channel: &str, message: &str) -> Result<Reply> {
        let at = self.clock.now();
        let reply = self.client.publish(&self.user, channel, message, &at)?;
        self.record(MessageRecord::channel_sent(&self.user, channel, message, at));
        Ok(reply)
    }

    /// Users known to the server.
    pub fn users(&mut self) -> Result<Vec<String>> {
        let reply = self.client.users(&self.clock.now())?;
        Ok(reply.users().unwrap_or_default())
    }

    /// Channels known to the server.
    pub fn channels(&mut self) -> Result<Vec<String>> {
        let reply = self.client.channels(&self.clock.now())?;
        Ok(reply.channels().unwrap_or_default())
    }

    /// Create a channel and, once the server accepts it, start listening on it.
    pub fn create_channel(&mut self, channel: &str) -> Result<Reply> {
        let reply = self.client.create_channel(channel, &self.clock.now())?;
        if reply.is_success() {
            if let Err(err) = self.subscriptions.subscribe(channel) {
                // Queued; sent again when the subscriber reconnects.
                warn!(%channel, error = %err, "subscription not delivered yet");
            }
        }
        Ok(reply)
    }

    fn record(&self, record: MessageRecord) {
        if let Err(err) = self.store.append(record) {
            warn!(error = %err, "sent message kept in memory only");
        }
    }
}

/// Ask the server for its channels, falling back to `defaults` when the
/// query fails or the reply carries no list.
fn discover_channels(
    client: &mut RequestClient,
    defaults: &[String],
    clock: &dyn Clock,
) -> Vec<String> {
    match client.channels(&clock.now()) {
        Ok(reply) => match reply.channels() {
            Some(channels) => {
                debug!(count = channels.len(), "channels discovered");
                channels
            }
            None => {
                debug!("channel reply carried no list, using defaults");
                defaults.to_vec()
            }
        },
        Err(err) => {
            warn!(error = %err, "channel discovery failed, using defaults");
            defaults.to_vec()
        }
    }
}
