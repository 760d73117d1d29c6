//! Time source abstraction.
//!
//! Record timestamps and subscriber backoff go through [`Clock`] so tests can
//! run the pipeline against virtual time.

use std::sync::Mutex;
use std::time::Duration;

use crate::record::Timestamp;

/// Wall clock plus blocking sleep.
pub trait Clock: Send + Sync {
    /// Current local time with its UTC offset.
    fn now(&self) -> Timestamp;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Local::now().fixed_offset()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock for tests and simulations.
///
/// `sleep` returns immediately, advances virtual time and records the
/// requested duration.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move virtual time forward.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        let next = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta));
        if let Some(next) = next {
            *now = next;
        }
    }

    /// Move virtual time to an arbitrary point, including backwards.
    pub fn set(&self, ts: Timestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = ts;
    }

    /// Every duration passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_records_sleeps_and_advances() {
        let start = Timestamp::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap();
        let clock = ManualClock::new(start);

        clock.sleep(Duration::from_millis(500));
        clock.sleep(Duration::from_secs(1));

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(500), Duration::from_secs(1)]
        );
        assert_eq!(
            clock.now(),
            Timestamp::parse_from_rfc3339("2026-01-01T00:00:01.5Z").unwrap()
        );
    }

    #[test]
    fn system_clock_carries_offset() {
        let now = SystemClock.now();
        let text = crate::record::format_timestamp(&now);
        assert!(Timestamp::parse_from_rfc3339(&text).is_ok());
    }
}
