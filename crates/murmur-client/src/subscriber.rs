//! Background loop that turns bus traffic into stored records.
//!
//! The loop has no terminal state: receive errors are logged and followed by
//! a backoff sleep, undecodable messages are dropped, and store failures
//! leave the record in memory only.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{trace, warn};

use crate::bus::{self, BusSource};
use crate::clock::{Clock, SystemClock};
use crate::parser::{parse_frame, ParserConfig};
use crate::record::MessageRecord;
use crate::sink::{EventSink, NullSink};
use crate::store::MessageStore;

/// Name of the thread started by [`SubscriberLoop::spawn`].
pub const THREAD_NAME: &str = "murmur-subscriber";

/// Backoff after a failed receive.
///
/// The delay for the n-th consecutive failure is `base * factor^n`, capped at
/// `max`. The default is a fixed 500ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl RetryPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            max: delay,
            factor: 1,
        }
    }

    /// Doubling backoff from `base` up to `max`.
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            factor: 2,
        }
    }

    /// Delay before retrying after `failures` consecutive failures (zero-based).
    pub fn delay(&self, failures: u32) -> Duration {
        self.base
            .saturating_mul(self.factor.saturating_pow(failures))
            .min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_DELAY)
    }
}

/// Outcome of one [`SubscriberLoop::step`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A record was parsed and appended.
    Stored(MessageRecord),
    /// The message could not be interpreted and was dropped.
    Dropped,
    /// Receiving failed; the loop slept for the given delay.
    Backoff(Duration),
}

/// Receive, parse, store, notify. Forever.
pub struct SubscriberLoop<S> {
    source: S,
    self_id: String,
    store: Arc<MessageStore>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    parser: ParserConfig,
    retry: RetryPolicy,
    failures: u32,
}

impl<S: BusSource> SubscriberLoop<S> {
    pub fn new(source: S, self_id: impl Into<String>, store: Arc<MessageStore>) -> Self {
        Self {
            source,
            self_id: self_id.into(),
            store,
            sink: Arc::new(NullSink),
            clock: Arc::new(SystemClock),
            parser: ParserConfig::default(),
            retry: RetryPolicy::default(),
            failures: 0,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_parser(mut self, parser: ParserConfig) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run one iteration: block for a message and handle it.
    pub fn step(&mut self) -> Step {
        let parts = match self.source.recv() {
            Ok(parts) => parts,
            Err(err) => {
                let delay = self.retry.delay(self.failures);
                self.failures = self.failures.saturating_add(1);
                warn!(error = %err, ?delay, "bus receive failed, backing off");
                self.clock.sleep(delay);
                return Step::Backoff(delay);
            }
        };
        self.failures = 0;

        let Some(frame) = bus::extract(&parts) else {
            trace!(parts = parts.len(), "dropping undecodable bus message");
            return Step::Dropped;
        };

        let record = parse_frame(
            &frame.topic,
            &frame.payload,
            &self.self_id,
            self.clock.now(),
            &self.parser,
        );
        if let Err(err) = self.store.append(record.clone()) {
            warn!(error = %err, "message kept in memory only");
        }
        self.sink.on_message(&record);
        Step::Stored(record)
    }

    pub fn run(mut self) -> ! {
        loop {
            self.step();
        }
    }
}

impl<S: BusSource + 'static> SubscriberLoop<S> {
    /// Run the loop on a named background thread.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn::<_, ()>(move || self.run())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use bytes::Bytes;
    use murmur_frame::FrameError;

    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{ClientError, Result};
    use crate::record::{RecordKind, Timestamp};

    struct Scripted(VecDeque<Result<Vec<Bytes>>>);

    impl BusSource for Scripted {
        fn recv(&mut self) -> Result<Vec<Bytes>> {
            self.0
                .pop_front()
                .unwrap_or(Err(ClientError::Frame(FrameError::ConnectionClosed)))
        }
    }

    fn ok(parts: &[&str]) -> Result<Vec<Bytes>> {
        Ok(parts.iter().map(|p| Bytes::from(p.to_string())).collect())
    }

    fn fail() -> Result<Vec<Bytes>> {
        Err(ClientError::Frame(FrameError::ConnectionClosed))
    }

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "murmur-subscriber-{name}-{}-{nanos}",
            std::process::id()
        ))
    }

    fn start() -> Timestamp {
        Timestamp::parse_from_rfc3339("2026-01-01T10:00:00+00:00").unwrap()
    }

    #[test]
    fn retry_policy_delays() {
        let fixed = RetryPolicy::default();
        assert_eq!(fixed.delay(0), Duration::from_millis(500));
        assert_eq!(fixed.delay(10), Duration::from_millis(500));

        let exp = RetryPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(exp.delay(0), Duration::from_millis(100));
        assert_eq!(exp.delay(1), Duration::from_millis(200));
        assert_eq!(exp.delay(3), Duration::from_millis(800));
        assert_eq!(exp.delay(4), Duration::from_secs(1));
        assert_eq!(exp.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn steps_store_both_framings_and_drop_garbage() {
        let dir = temp_dir("framings");
        let store = Arc::new(MessageStore::open(&dir).unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);

        let source = Scripted(VecDeque::from([
            ok(&["general|bob: hello room"]),
            ok(&["alice", "bob sent private message: hi"]),
            ok(&["no separator"]),
            ok(&[]),
        ]));
        let mut sub = SubscriberLoop::new(source, "alice", Arc::clone(&store))
            .with_clock(Arc::new(ManualClock::new(start())))
            .with_sink(Arc::new(move |record: &MessageRecord| {
                sink_seen.lock().unwrap().push(record.body().to_string());
            }));

        let Step::Stored(first) = sub.step() else {
            panic!("expected stored channel message");
        };
        assert_eq!(first.kind(), RecordKind::ChannelIncoming);
        assert_eq!(first.sender(), "bob");

        let Step::Stored(second) = sub.step() else {
            panic!("expected stored private message");
        };
        assert_eq!(second.kind(), RecordKind::PrivateIncoming);
        assert_eq!(second.body(), "hi");

        assert_eq!(sub.step(), Step::Dropped);
        assert_eq!(sub.step(), Step::Dropped);

        assert_eq!(store.len(), 2);
        assert_eq!(*seen.lock().unwrap(), ["hello room", "hi"]);

        let reloaded = MessageStore::open(&dir).unwrap();
        assert_eq!(reloaded.snapshot(), store.snapshot());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn receive_errors_back_off_through_the_clock() {
        let dir = temp_dir("backoff");
        let store = Arc::new(MessageStore::open(&dir).unwrap());
        let clock = Arc::new(ManualClock::new(start()));

        let source = Scripted(VecDeque::from([
            fail(),
            fail(),
            ok(&["general|carol: back"]),
            fail(),
        ]));
        let mut sub = SubscriberLoop::new(source, "alice", Arc::clone(&store))
            .with_clock(clock.clone())
            .with_retry(RetryPolicy::exponential(
                Duration::from_millis(500),
                Duration::from_secs(4),
            ));

        assert_eq!(sub.step(), Step::Backoff(Duration::from_millis(500)));
        assert_eq!(sub.step(), Step::Backoff(Duration::from_secs(1)));
        let Step::Stored(record) = sub.step() else {
            panic!("expected stored record after recovery");
        };
        // Backoff sleeps advanced virtual time before the record was stamped.
        assert_eq!(
            record.timestamp(),
            Timestamp::parse_from_rfc3339("2026-01-01T10:00:01.5+00:00").unwrap()
        );
        // Success resets the policy.
        assert_eq!(sub.step(), Step::Backoff(Duration::from_millis(500)));

        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_millis(500),
            ]
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn clock_stepping_back_is_clamped_in_the_log() {
        let dir = temp_dir("clamp");
        let store = Arc::new(MessageStore::open(&dir).unwrap());
        let clock = Arc::new(ManualClock::new(start()));

        let source = Scripted(VecDeque::from([
            ok(&["general|bob: first"]),
            ok(&["general|bob: second"]),
        ]));
        let mut sub = SubscriberLoop::new(source, "alice", Arc::clone(&store))
            .with_clock(clock.clone());

        assert!(matches!(sub.step(), Step::Stored(_)));
        clock.set(Timestamp::parse_from_rfc3339("2026-01-01T09:00:00+00:00").unwrap());
        let Step::Stored(second) = sub.step() else {
            panic!("expected stored record");
        };
        // The sink sees the clock reading; the log never goes backwards.
        assert_eq!(
            second.timestamp(),
            Timestamp::parse_from_rfc3339("2026-01-01T09:00:00+00:00").unwrap()
        );
        let records = store.snapshot();
        assert_eq!(records[1].timestamp(), start());
        assert_eq!(records[1].body(), "second");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn persist_failure_keeps_loop_going() {
        let dir = temp_dir("persist");
        let store = Arc::new(MessageStore::open(&dir).unwrap());
        // A directory squatting on the temp path makes every write fail.
        std::fs::create_dir(dir.join("messages.json.tmp")).unwrap();

        let source = Scripted(VecDeque::from([ok(&["general|bob: one"]), ok(&["general|bob: two"])]));
        let mut sub = SubscriberLoop::new(source, "alice", Arc::clone(&store))
            .with_clock(Arc::new(ManualClock::new(start())));

        assert!(matches!(sub.step(), Step::Stored(_)));
        assert!(matches!(sub.step(), Step::Stored(_)));
        assert_eq!(store.len(), 2);
        assert!(!store.path().exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn spawned_loop_runs_on_named_thread() {
        struct Once(Option<std::sync::mpsc::Sender<String>>);

        impl BusSource for Once {
            fn recv(&mut self) -> Result<Vec<Bytes>> {
                let name = thread::current().name().unwrap_or_default().to_string();
                if let Some(tx) = self.0.take() {
                    tx.send(name).unwrap();
                }
                Err(ClientError::Frame(FrameError::ConnectionClosed))
            }
        }

        let dir = temp_dir("spawn");
        let store = Arc::new(MessageStore::open(&dir).unwrap());
        let (tx, rx) = std::sync::mpsc::channel();
        let _handle = SubscriberLoop::new(Once(Some(tx)), "alice", store)
            .spawn()
            .unwrap();

        assert_eq!(rx.recv().unwrap(), THREAD_NAME);
        std::fs::remove_dir_all(&dir).ok();
    }
}
