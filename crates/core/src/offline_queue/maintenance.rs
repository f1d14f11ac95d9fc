//! Retention cleanup and restart recovery

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::dependency::DependencyTracker;
use super::errors::QueueResult;
use super::ports::PersistentStore;
use super::types::{Operation, OperationStatus};

/// Store housekeeping
#[derive(Debug, Clone)]
pub struct MaintenanceService {
    retention_period: Duration,
}

impl MaintenanceService {
    pub fn new(retention_period: Duration) -> Self {
        Self { retention_period }
    }

    pub fn retention_period(&self) -> Duration {
        self.retention_period
    }

    /// Delete completed operations enqueued longer than the retention period
    /// ago
    ///
    /// Completed operations that other operations still wait for are kept,
    /// so dependents keep seeing them as completed. Failed operations are
    /// never removed here. Returns the removed ids.
    #[instrument(skip(self, store, tracker))]
    pub async fn cleanup_expired(
        &self,
        store: &dyn PersistentStore,
        tracker: &DependencyTracker,
        now_ms: u64,
    ) -> QueueResult<Vec<String>> {
        let retention_ms = u64::try_from(self.retention_period.as_millis()).unwrap_or(u64::MAX);
        let cutoff = now_ms.saturating_sub(retention_ms);

        let expired: Vec<String> = store
            .get_all()
            .await?
            .into_iter()
            .filter(|op| op.status == OperationStatus::Completed && op.created_at <= cutoff)
            .filter(|op| !tracker.has_dependents(&op.id))
            .map(|op| op.id)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if store.delete(&id).await? {
                tracker.release(&id);
                removed.push(id);
            }
        }

        if !removed.is_empty() {
            info!("Cleaned up {} expired operations", removed.len());
        }
        Ok(removed)
    }

    /// Return operations left in `processing` by a previous run to
    /// `pending` and rebuild the dependency relation
    ///
    /// The retry budget is not consumed. Ids in `still_running` belong to
    /// executions of this process that outlived a stop and are left alone.
    /// Returns every stored operation after recovery.
    #[instrument(skip(self, store, tracker, still_running))]
    pub async fn recover(
        &self,
        store: &dyn PersistentStore,
        tracker: &DependencyTracker,
        still_running: &HashSet<String>,
        now_ms: u64,
    ) -> QueueResult<Vec<Operation>> {
        let mut operations = store.get_all().await?;
        let known: HashSet<String> = operations.iter().map(|op| op.id.clone()).collect();

        tracker.clear();
        let mut recovered = 0_usize;

        for op in &mut operations {
            if op.status == OperationStatus::Processing && !still_running.contains(&op.id) {
                let mut reset = op.clone();
                reset.transition(OperationStatus::Pending, now_ms)?;
                reset.processing_started_at = None;
                if store.update_if_status(&op.id, OperationStatus::Processing, &reset).await? {
                    *op = reset;
                    recovered += 1;
                }
            }

            if !op.status.is_terminal() && !op.dependencies.is_empty() {
                for dependency in op.dependencies.iter().filter(|id| !known.contains(*id)) {
                    warn!(operation_id = %op.id, dependency = %dependency, "Dependency record missing; operation stays blocked");
                }
                tracker.register_dependencies(&op.id, op.dependencies.iter().cloned());
            }
        }

        if recovered > 0 {
            info!("Recovered {} interrupted operations", recovered);
        } else {
            debug!(total = operations.len(), "No interrupted operations to recover");
        }
        Ok(operations)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for offline_queue::maintenance.
    use super::*;
    use crate::offline_queue::memory::InMemoryOperationStore;
    use crate::offline_queue::types::{OperationCategory, OperationDescriptor};

    const HOUR: u64 = 3_600_000;

    fn op(id: &str, status: OperationStatus, created_at: u64) -> Operation {
        let mut op = Operation::new(
            id.into(),
            OperationDescriptor::new(OperationCategory::Analytics, "track", b"{}".to_vec()),
            3,
            Vec::new(),
            created_at,
        );
        op.status = status;
        op
    }

    /// Validates retention-based cleanup.
    ///
    /// Assertions:
    /// - Only completed operations past retention are removed, measured from
    ///   enqueue time.
    /// - Failed and pending operations of any age survive.
    /// - A completed blocker with a waiting dependent survives.
    #[tokio::test]
    async fn test_cleanup_expired() -> QueueResult<()> {
        let store = InMemoryOperationStore::new();
        let tracker = DependencyTracker::new();
        let service = MaintenanceService::new(Duration::from_secs(24 * 3600));
        let now = 100 * HOUR;

        store.put(&op("old-done", OperationStatus::Completed, now - 25 * HOUR)).await?;
        store.put(&op("new-done", OperationStatus::Completed, now - HOUR)).await?;
        let mut slow = op("slow-done", OperationStatus::Completed, now - 26 * HOUR);
        slow.updated_at = now - HOUR;
        store.put(&slow).await?;
        store.put(&op("old-failed", OperationStatus::Failed, now - 50 * HOUR)).await?;
        store.put(&op("old-pending", OperationStatus::Pending, now - 50 * HOUR)).await?;
        store.put(&op("blocker", OperationStatus::Completed, now - 30 * HOUR)).await?;
        tracker.register_dependencies("old-pending", ["blocker"]);

        let mut removed = service.cleanup_expired(&store, &tracker, now).await?;
        removed.sort();
        assert_eq!(removed, ["old-done", "slow-done"]);

        let mut remaining: Vec<_> = store.get_all().await?.into_iter().map(|op| op.id).collect();
        remaining.sort();
        assert_eq!(remaining, ["blocker", "new-done", "old-failed", "old-pending"]);
        Ok(())
    }

    /// Validates restart recovery.
    ///
    /// Assertions:
    /// - Processing operations return to pending with retry count intact.
    /// - Dependencies of non-terminal operations are re-registered.
    #[tokio::test]
    async fn test_recover_interrupted() -> QueueResult<()> {
        let store = InMemoryOperationStore::new();
        let tracker = DependencyTracker::new();
        let service = MaintenanceService::new(Duration::from_secs(60));

        let mut interrupted = op("interrupted", OperationStatus::Processing, 10);
        interrupted.retry_count = 2;
        interrupted.processing_started_at = Some(10);
        store.put(&interrupted).await?;

        let mut waiting = op("waiting", OperationStatus::Pending, 10);
        waiting.dependencies = vec!["interrupted".into()];
        store.put(&waiting).await?;

        let operations = service.recover(&store, &tracker, &HashSet::new(), 500).await?;
        assert_eq!(operations.len(), 2);

        let recovered = store.get("interrupted").await?.unwrap();
        assert_eq!(recovered.status, OperationStatus::Pending);
        assert_eq!(recovered.retry_count, 2);
        assert_eq!(recovered.processing_started_at, None);
        assert_eq!(tracker.blocking_ids("waiting"), ["interrupted"]);
        Ok(())
    }
}
