//! Queue configuration

use std::time::Duration;

use repsync_common::duration_millis;
use repsync_common::resilience::ExponentialBackoff;
use serde::{Deserialize, Serialize};

use super::errors::{QueueError, QueueResult};

/// Tuning knobs for [`OfflineQueue`](super::OfflineQueue)
///
/// Durations (de)serialize as whole milliseconds. Missing fields fall back to
/// [`QueueConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Upper bound on concurrently executing operations
    pub max_concurrent_operations: usize,
    /// Gate dispatch on network quality, not only on connectivity
    pub network_aware_processing: bool,
    /// Waiting time after which an operation's priority class is raised
    #[serde(with = "duration_millis")]
    pub priority_boost_threshold: Duration,
    /// Maximum number of stored operations, any status
    pub max_queue_size: usize,
    /// Encode payloads with the gzip codec
    pub compression_enabled: bool,
    pub compression_level: u32,
    /// Batch size at good quality before subtracting in-flight work
    pub base_batch_size: usize,
    /// How long completed operations are kept
    #[serde(with = "duration_millis")]
    pub retention_period: Duration,
    #[serde(with = "duration_millis")]
    pub cleanup_interval: Duration,
    pub default_max_retries: u32,
    #[serde(with = "duration_millis")]
    pub base_retry_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_retry_delay: Duration,
    pub retry_jitter_factor: f64,
    /// Scheduler sleep per quality step (excellent = 1 unit, offline = 10)
    #[serde(with = "duration_millis")]
    pub cycle_interval_unit: Duration,
    pub idle_interval_multiplier: u32,
    #[serde(with = "duration_millis")]
    pub loop_error_base_delay: Duration,
    #[serde(with = "duration_millis")]
    pub loop_error_max_delay: Duration,
    /// Join timeout for the scheduler task on `stop`
    #[serde(with = "duration_millis")]
    pub stop_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: 3,
            network_aware_processing: true,
            priority_boost_threshold: Duration::from_secs(5 * 60),
            max_queue_size: 1000,
            compression_enabled: true,
            compression_level: 6,
            base_batch_size: 5,
            retention_period: Duration::from_secs(24 * 3600),
            cleanup_interval: Duration::from_secs(5 * 60),
            default_max_retries: 3,
            base_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(5 * 60),
            retry_jitter_factor: 0.25,
            cycle_interval_unit: Duration::from_secs(1),
            idle_interval_multiplier: 2,
            loop_error_base_delay: Duration::from_secs(1),
            loop_error_max_delay: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl QueueConfig {
    /// Configuration for tests and hosts that drive cycles by hand: tight
    /// intervals, no retry delay jitter
    pub fn fast() -> Self {
        Self {
            base_retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(100),
            retry_jitter_factor: 0.0,
            cycle_interval_unit: Duration::from_millis(10),
            loop_error_base_delay: Duration::from_millis(10),
            loop_error_max_delay: Duration::from_millis(100),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> QueueResult<()> {
        let invalid = |msg: &str| Err(QueueError::InvalidConfig(msg.to_string()));

        if self.max_concurrent_operations == 0 {
            return invalid("max_concurrent_operations must be greater than 0");
        }
        if self.max_queue_size == 0 {
            return invalid("max_queue_size must be greater than 0");
        }
        if self.base_batch_size == 0 {
            return invalid("base_batch_size must be greater than 0");
        }
        if self.base_retry_delay.is_zero() {
            return invalid("base_retry_delay must be greater than 0");
        }
        if self.max_retry_delay < self.base_retry_delay {
            return invalid("max_retry_delay cannot be shorter than base_retry_delay");
        }
        if !(0.0..=1.0).contains(&self.retry_jitter_factor) {
            return invalid("retry_jitter_factor must be between 0.0 and 1.0");
        }
        if self.cycle_interval_unit.is_zero() {
            return invalid("cycle_interval_unit must be greater than 0");
        }
        if self.idle_interval_multiplier == 0 {
            return invalid("idle_interval_multiplier must be greater than 0");
        }
        if self.loop_error_base_delay.is_zero() || self.loop_error_max_delay < self.loop_error_base_delay {
            return invalid("loop error delays must be positive and ordered");
        }
        if self.cleanup_interval.is_zero() {
            return invalid("cleanup_interval must be greater than 0");
        }
        if self.compression_level > 9 {
            return invalid("compression_level must be between 0 and 9");
        }
        Ok(())
    }

    /// Backoff applied between attempts of a failed operation
    pub fn retry_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.base_retry_delay, self.max_retry_delay, self.retry_jitter_factor)
    }

    /// Randomized backoff after a failed scheduler cycle
    pub fn loop_error_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.loop_error_base_delay, self.loop_error_max_delay, 0.5)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for offline_queue::config.
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_operations, 3);
        assert!(config.network_aware_processing);
        assert_eq!(config.priority_boost_threshold, Duration::from_secs(300));
        assert_eq!(config.max_queue_size, 1000);
        assert!(config.compression_enabled);
        assert!(QueueConfig::fast().validate().is_ok());
    }

    /// Validates `QueueConfig::validate` rejects inconsistent settings.
    ///
    /// Assertions:
    /// - Zero concurrency, inverted retry bounds and an out-of-range jitter
    ///   each yield `InvalidConfig`.
    #[test]
    fn test_validate_rejects_bad_values() {
        let cases = [
            QueueConfig { max_concurrent_operations: 0, ..Default::default() },
            QueueConfig { max_retry_delay: Duration::from_millis(1), ..Default::default() },
            QueueConfig { retry_jitter_factor: 1.5, ..Default::default() },
            QueueConfig { compression_level: 12, ..Default::default() },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(QueueError::InvalidConfig(_))));
        }
    }

    /// Validates partial documents fill in defaults and read millis.
    ///
    /// Assertions:
    /// - `retention_period` of 60000 parses as 60 s.
    /// - Unspecified fields equal the defaults.
    #[test]
    fn test_deserialize_partial_document() {
        let config: QueueConfig =
            serde_json::from_str(r#"{"retention_period": 60000, "max_concurrent_operations": 5}"#).unwrap();
        assert_eq!(config.retention_period, Duration::from_secs(60));
        assert_eq!(config.max_concurrent_operations, 5);
        assert_eq!(config.max_queue_size, 1000);
    }
}
