//! Time abstraction for testability
//!
//! Queue timestamps (enqueue time, backoff deadlines, retention cutoffs) are
//! read through [`Clock`] so tests can move time forward without sleeping.
//!
//! ```
//! # #[cfg(feature = "runtime")]
//! # {
//! use std::time::Duration;
//!
//! use repsync_common::testing::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let before = clock.millis_since_epoch();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.millis_since_epoch() - before, 5_000);
//! # }
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync {
    /// Monotonic instant, for measuring durations
    fn now(&self) -> Instant;

    /// Wall-clock time
    fn system_time(&self) -> SystemTime;

    /// Milliseconds since the UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        let millis = self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// Real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same elapsed offset, so a clock handed to a queue can
/// be advanced from the test body.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    base_system_time: SystemTime,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a mock clock anchored at the current real time
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            base_system_time: SystemTime::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Create a mock clock whose wall-clock time starts at `epoch_millis`
    pub fn at_epoch_millis(epoch_millis: u64) -> Self {
        Self {
            start: Instant::now(),
            base_system_time: UNIX_EPOCH + Duration::from_millis(epoch_millis),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Simulate time passing
    pub fn advance(&self, duration: Duration) {
        // Test utility: a poisoned mutex means a test already panicked
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed += duration;
    }

    /// Total simulated time since creation
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().expect("mutex poisoned")
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for testing::time.
    use super::*;

    #[test]
    fn test_system_clock_millis() {
        assert!(SystemClock.millis_since_epoch() > 0);
    }

    #[test]
    fn test_mock_clock_advance_moves_both_clocks() {
        let clock = MockClock::new();
        let start = clock.now();
        let wall = clock.system_time();

        clock.advance(Duration::from_secs(5));

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
        assert_eq!(clock.system_time().duration_since(wall).unwrap(), Duration::from_secs(5));
    }

    #[test]
    fn test_mock_clock_clones_share_offset() {
        let clock = MockClock::at_epoch_millis(1_000);
        let handle = clock.clone();

        handle.advance(Duration::from_millis(250));

        assert_eq!(clock.millis_since_epoch(), 1_250);
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }
}
