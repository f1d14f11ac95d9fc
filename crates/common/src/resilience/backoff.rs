//! Exponential backoff with jitter
//!
//! Delays grow as `base * 2^attempt`, are capped at `max`, and are then
//! spread by a random jitter of `±(delay * jitter_factor) / 2`. The jittered
//! value never exceeds `max`.

use std::time::Duration;

use rand::Rng;

use crate::error::{CommonError, CommonResult};

/// Largest exponent applied before the multiplier saturates
pub const MAX_BACKOFF_EXPONENT: u32 = 20;

/// Exponential backoff calculator
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    /// Create a backoff without validating the inputs
    ///
    /// The jitter factor is clamped into `0.0..=1.0`.
    pub fn new(base: Duration, max: Duration, jitter_factor: f64) -> Self {
        let jitter_factor = if jitter_factor.is_finite() { jitter_factor.clamp(0.0, 1.0) } else { 0.0 };
        Self { base, max, jitter_factor }
    }

    /// Create a backoff, rejecting inconsistent bounds
    pub fn try_new(base: Duration, max: Duration, jitter_factor: f64) -> CommonResult<Self> {
        if base.is_zero() {
            return Err(CommonError::validation("base_delay", "must be greater than zero"));
        }
        if max < base {
            return Err(CommonError::validation("max_delay", "must be at least base_delay"));
        }
        if !(0.0..=1.0).contains(&jitter_factor) {
            return Err(CommonError::validation("jitter_factor", "must be between 0.0 and 1.0"));
        }
        Ok(Self::new(base, max, jitter_factor))
    }

    /// Same backoff without jitter, for deterministic delays
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn jitter_factor(&self) -> f64 {
        self.jitter_factor
    }

    /// Un-jittered delay for a zero-based attempt number
    pub fn exponential_delay(&self, attempt: u32) -> Duration {
        let base_millis = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let max_millis = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);

        let exponent = attempt.min(MAX_BACKOFF_EXPONENT);
        let multiplier = 2_u64.saturating_pow(exponent);

        Duration::from_millis(base_millis.saturating_mul(multiplier).min(max_millis))
    }

    /// Jittered delay for a zero-based attempt number
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.exponential_delay(attempt);
        self.apply_jitter(delay).min(self.max)
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor == 0.0 || delay.is_zero() {
            return delay;
        }

        let delay_millis = delay.as_millis() as f64;
        let jitter_range = delay_millis * self.jitter_factor;
        let jitter = rand::thread_rng().gen_range(-jitter_range / 2.0..=jitter_range / 2.0);

        Duration::from_millis((delay_millis + jitter).max(0.0) as u64)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300), 0.25)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for resilience::backoff.
    use super::*;

    /// Validates `ExponentialBackoff::exponential_delay` doubling and cap.
    ///
    /// Assertions:
    /// - Attempts 0..3 yield 100, 200, 400, 800 ms.
    /// - Large attempts saturate at the configured maximum.
    #[test]
    fn test_exponential_delay_doubles_until_cap() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1), 0.0);

        assert_eq!(backoff.exponential_delay(0), Duration::from_millis(100));
        assert_eq!(backoff.exponential_delay(1), Duration::from_millis(200));
        assert_eq!(backoff.exponential_delay(2), Duration::from_millis(400));
        assert_eq!(backoff.exponential_delay(3), Duration::from_millis(800));
        assert_eq!(backoff.exponential_delay(4), Duration::from_secs(1));
        assert_eq!(backoff.exponential_delay(u32::MAX), Duration::from_secs(1));
    }

    /// Validates jitter stays inside its band and under the cap.
    ///
    /// Assertions:
    /// - Every jittered delay for attempt 2 lies within 400ms ± 12.5%.
    #[test]
    fn test_jitter_bounds() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10), 0.25);

        for _ in 0..200 {
            let delay = backoff.delay_for(2).as_millis();
            assert!((350..=450).contains(&delay), "delay {delay} out of band");
        }
    }

    /// Validates jitter never pushes a capped delay over the maximum.
    ///
    /// Assertions:
    /// - Delays for a saturated attempt never exceed `max`.
    #[test]
    fn test_jitter_respects_max() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(500), 1.0);

        for _ in 0..200 {
            assert!(backoff.delay_for(10) <= Duration::from_millis(500));
        }
    }

    /// Validates `ExponentialBackoff::try_new` input checks.
    ///
    /// Assertions:
    /// - Zero base, inverted bounds and out-of-range jitter are rejected.
    #[test]
    fn test_try_new_validation() {
        assert!(ExponentialBackoff::try_new(Duration::ZERO, Duration::from_secs(1), 0.1).is_err());
        assert!(ExponentialBackoff::try_new(Duration::from_secs(2), Duration::from_secs(1), 0.1).is_err());
        assert!(ExponentialBackoff::try_new(Duration::from_secs(1), Duration::from_secs(2), 1.5).is_err());
        assert!(ExponentialBackoff::try_new(Duration::from_secs(1), Duration::from_secs(2), 0.5).is_ok());
    }
}
