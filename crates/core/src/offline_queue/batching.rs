//! Network-aware batch sizing, cycle pacing and dispatch gating

use std::time::Duration;

use super::config::QueueConfig;
use super::types::{NetworkQuality, NetworkRequirement, NetworkStatus};

/// Batch and interval policy derived from [`QueueConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub base_batch_size: usize,
    pub max_concurrent: usize,
    pub cycle_interval_unit: Duration,
    pub idle_interval_multiplier: u32,
    pub network_aware: bool,
}

impl BatchPolicy {
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            base_batch_size: config.base_batch_size,
            max_concurrent: config.max_concurrent_operations,
            cycle_interval_unit: config.cycle_interval_unit,
            idle_interval_multiplier: config.idle_interval_multiplier,
            network_aware: config.network_aware_processing,
        }
    }

    /// Operations to dispatch this cycle
    ///
    /// Always at least 1 and at most `max_concurrent`. Offline is exactly 1.
    pub fn batch_size(&self, quality: NetworkQuality, in_flight: usize) -> usize {
        let start = self.base_batch_size.saturating_sub(in_flight).max(1);
        let scaled = match quality {
            NetworkQuality::Excellent => start.saturating_mul(2),
            NetworkQuality::Good => start,
            NetworkQuality::Fair => start * 7 / 10,
            NetworkQuality::Poor => (start * 4 / 10).min(2),
            NetworkQuality::Offline => 1,
        };
        scaled.max(1).min(self.max_concurrent.max(1))
    }

    /// Sleep between cycles; idle cycles sleep longer
    pub fn cycle_interval(&self, quality: NetworkQuality, idle: bool) -> Duration {
        let units = match quality {
            NetworkQuality::Excellent => 1,
            NetworkQuality::Good => 2,
            NetworkQuality::Fair => 3,
            NetworkQuality::Poor => 6,
            NetworkQuality::Offline => 10,
        };
        let interval = self.cycle_interval_unit.saturating_mul(units);
        if idle {
            interval.saturating_mul(self.idle_interval_multiplier)
        } else {
            interval
        }
    }

    /// Whether the network can currently serve `requirement`
    ///
    /// Operations without a requirement run even offline. With network-aware
    /// processing disabled only connectivity is checked.
    pub fn network_allows(
        &self,
        requirement: NetworkRequirement,
        status: NetworkStatus,
        quality: NetworkQuality,
    ) -> bool {
        if requirement == NetworkRequirement::None {
            return true;
        }
        let quality = if status.is_online { quality } else { NetworkQuality::Offline };
        if self.network_aware {
            requirement <= quality.max_requirement()
        } else {
            quality != NetworkQuality::Offline
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for offline_queue::batching.
    use super::*;

    fn policy() -> BatchPolicy {
        BatchPolicy::from_config(&QueueConfig::default())
    }

    const ONLINE: NetworkStatus = NetworkStatus { is_online: true };
    const OFFLINE: NetworkStatus = NetworkStatus { is_online: false };

    /// Validates batch scaling per quality tier.
    ///
    /// Assertions:
    /// - Offline always yields 1.
    /// - Excellent never yields less than good.
    /// - Results stay within `1..=max_concurrent`.
    #[test]
    fn test_batch_size_by_quality() {
        let policy = BatchPolicy { max_concurrent: 20, ..policy() };
        assert_eq!(policy.batch_size(NetworkQuality::Excellent, 0), 10);
        assert_eq!(policy.batch_size(NetworkQuality::Good, 0), 5);
        assert_eq!(policy.batch_size(NetworkQuality::Fair, 0), 3);
        assert_eq!(policy.batch_size(NetworkQuality::Poor, 0), 2);
        assert_eq!(policy.batch_size(NetworkQuality::Offline, 0), 1);

        for in_flight in 0..10 {
            let excellent = policy.batch_size(NetworkQuality::Excellent, in_flight);
            let good = policy.batch_size(NetworkQuality::Good, in_flight);
            assert!(excellent >= good);
            assert_eq!(policy.batch_size(NetworkQuality::Offline, in_flight), 1);
            assert!(policy.batch_size(NetworkQuality::Poor, in_flight) >= 1);
        }
    }

    #[test]
    fn test_batch_size_capped_by_concurrency() {
        assert_eq!(policy().batch_size(NetworkQuality::Excellent, 0), 3);
        assert_eq!(policy().batch_size(NetworkQuality::Good, 4), 1);
    }

    #[test]
    fn test_cycle_interval() {
        let policy = policy();
        assert_eq!(policy.cycle_interval(NetworkQuality::Excellent, false), Duration::from_secs(1));
        assert_eq!(policy.cycle_interval(NetworkQuality::Poor, false), Duration::from_secs(6));
        assert_eq!(policy.cycle_interval(NetworkQuality::Offline, true), Duration::from_secs(20));
    }

    /// Validates the requirement gate with and without network awareness.
    ///
    /// Assertions:
    /// - High requirement is blocked under poor and allowed under good.
    /// - Disconnected status blocks everything but `None`.
    /// - Without awareness, any online quality serves any requirement.
    #[test]
    fn test_network_allows() {
        let aware = policy();
        assert!(!aware.network_allows(NetworkRequirement::High, ONLINE, NetworkQuality::Poor));
        assert!(aware.network_allows(NetworkRequirement::Low, ONLINE, NetworkQuality::Poor));
        assert!(aware.network_allows(NetworkRequirement::High, ONLINE, NetworkQuality::Good));
        assert!(!aware.network_allows(NetworkRequirement::Low, OFFLINE, NetworkQuality::Excellent));
        assert!(aware.network_allows(NetworkRequirement::None, OFFLINE, NetworkQuality::Offline));

        let unaware = BatchPolicy { network_aware: false, ..aware };
        assert!(unaware.network_allows(NetworkRequirement::High, ONLINE, NetworkQuality::Poor));
        assert!(!unaware.network_allows(NetworkRequirement::High, OFFLINE, NetworkQuality::Poor));
    }
}
