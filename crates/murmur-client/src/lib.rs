//! Client-side message pipeline for a murmur chat server.
//!
//! The pieces, leaf first:
//! - [`MessageStore`]: append-only log mirrored to `messages.json` with an
//!   atomic temp-file rewrite on every append.
//! - [`parse_frame`]: turns a bus topic and payload into a [`MessageRecord`].
//! - [`RequestClient`]: blocking request/reply calls to the server.
//! - [`SubscriberLoop`]: background thread feeding the store from the bus.
//! - [`Session`]: login, channel discovery and foreground sends.

pub mod bus;
pub mod clock;
pub mod config;
pub mod error;
pub mod parser;
pub mod record;
pub mod rpc;
pub mod session;
pub mod sink;
pub mod store;
pub mod subscriber;

pub use bus::{extract, BusFrame, BusSource, BusSubscriber, SubscriptionHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use error::{ClientError, Result, StoreError};
pub use parser::{parse_frame, ParserConfig};
pub use record::{format_timestamp, MessageRecord, RecordError, RecordKind, Timestamp};
pub use rpc::{Reply, RequestClient, Service, Status};
pub use session::Session;
pub use sink::{EventSink, NullSink};
pub use store::MessageStore;
pub use subscriber::{RetryPolicy, Step, SubscriberLoop};
