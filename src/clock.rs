//! Time sources for change-log entries and document update times.
//!
//! All timestamps are milliseconds since the Unix epoch. Production code uses
//! [`SystemClock`]; tests and replay tooling use [`PseudoClock`], which only
//! moves when told to.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Deterministic clock that starts at zero and only moves on request.
#[derive(Debug, Default)]
pub struct PseudoClock {
    time: AtomicI64,
}

impl PseudoClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock already set to `millis`.
    pub fn starting_at(millis: i64) -> Self {
        Self {
            time: AtomicI64::new(millis),
        }
    }

    pub fn reset(&self) {
        self.time.store(0, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.time.store(millis, Ordering::SeqCst);
    }

    /// Advance the clock and return the new absolute time.
    pub fn advance(&self, by: Duration) -> i64 {
        self.time.fetch_add(by.as_millis() as i64, Ordering::SeqCst) + by.as_millis() as i64
    }
}

impl Clock for PseudoClock {
    fn now_millis(&self) -> i64 {
        self.time.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_clock_advances() {
        let clock = PseudoClock::new();
        assert_eq!(clock.now_millis(), 0);

        assert_eq!(clock.advance(Duration::from_millis(5)), 5);
        assert_eq!(clock.advance(Duration::from_secs(1)), 1005);
        assert_eq!(clock.now_millis(), 1005);

        clock.set(42);
        assert_eq!(clock.now_millis(), 42);

        clock.reset();
        assert_eq!(clock.now_millis(), 0);
    }

    #[test]
    fn test_system_clock_is_past_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
