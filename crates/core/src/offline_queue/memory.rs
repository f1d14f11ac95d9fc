//! In-memory adapters for the queue's ports
//!
//! Useful for tests and for hosts without durable storage. Operations kept in
//! [`InMemoryOperationStore`] do not survive a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use repsync_common::error::CommonError;

use super::errors::QueueResult;
use super::ports::{NetworkChangeListener, NetworkMonitor, PersistentStore};
use super::types::{NetworkQuality, NetworkStatus, Operation, OperationStatus};

/// `HashMap`-backed [`PersistentStore`]
#[derive(Debug, Default)]
pub struct InMemoryOperationStore {
    records: RwLock<HashMap<String, Operation>>,
    fail_writes: AtomicBool,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise store-error handling
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> QueueResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CommonError::persistence_op("write", "store unavailable").into());
        }
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for InMemoryOperationStore {
    async fn put(&self, operation: &Operation) -> QueueResult<()> {
        self.check_writable()?;
        let mut records = self.records.write();
        records.insert(operation.id.clone(), operation.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> QueueResult<Option<Operation>> {
        let records = self.records.read();
        Ok(records.get(id).cloned())
    }

    async fn get_all(&self) -> QueueResult<Vec<Operation>> {
        let records = self.records.read();
        Ok(records.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> QueueResult<bool> {
        self.check_writable()?;
        let mut records = self.records.write();
        Ok(records.remove(id).is_some())
    }

    async fn update_if_status(
        &self,
        id: &str,
        expected: OperationStatus,
        operation: &Operation,
    ) -> QueueResult<bool> {
        self.check_writable()?;
        let mut records = self.records.write();
        match records.get_mut(id) {
            Some(current) if current.status == expected => {
                *current = operation.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn count(&self) -> QueueResult<usize> {
        let records = self.records.read();
        Ok(records.len())
    }
}

/// [`NetworkMonitor`] whose state is set by hand
pub struct ManualNetworkMonitor {
    state: Mutex<(NetworkStatus, NetworkQuality)>,
    listeners: Mutex<Vec<NetworkChangeListener>>,
}

impl ManualNetworkMonitor {
    pub fn new(quality: NetworkQuality) -> Self {
        let status = NetworkStatus { is_online: quality != NetworkQuality::Offline };
        Self { state: Mutex::new((status, quality)), listeners: Mutex::new(Vec::new()) }
    }

    /// Change the quality (and derived connectivity) and notify listeners
    pub fn set_quality(&self, quality: NetworkQuality) {
        let status = NetworkStatus { is_online: quality != NetworkQuality::Offline };
        self.update(status, quality);
    }

    /// Toggle connectivity without touching the quality tier
    pub fn set_online(&self, is_online: bool) {
        let quality = self.state.lock().1;
        self.update(NetworkStatus { is_online }, quality);
    }

    fn update(&self, status: NetworkStatus, quality: NetworkQuality) {
        {
            let mut state = self.state.lock();
            if *state == (status, quality) {
                return;
            }
            *state = (status, quality);
        }
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(status, quality);
        }
    }
}

impl Default for ManualNetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkQuality::Good)
    }
}

impl NetworkMonitor for ManualNetworkMonitor {
    fn status(&self) -> NetworkStatus {
        self.state.lock().0
    }

    fn quality(&self) -> NetworkQuality {
        self.state.lock().1
    }

    fn on_change(&self, listener: NetworkChangeListener) {
        self.listeners.lock().push(listener);
    }
}

impl std::fmt::Debug for ManualNetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (status, quality) = *self.state.lock();
        f.debug_struct("ManualNetworkMonitor").field("status", &status).field("quality", &quality).finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for offline_queue::memory.
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use super::*;
    use crate::offline_queue::types::{OperationCategory, OperationDescriptor};

    fn op(id: &str) -> Operation {
        Operation::new(
            id.into(),
            OperationDescriptor::new(OperationCategory::Workout, "create", b"{}".to_vec()),
            3,
            Vec::new(),
            0,
        )
    }

    /// Validates compare-status-and-swap semantics.
    ///
    /// Assertions:
    /// - A matching expected status swaps the record.
    /// - A stale expected status leaves the record untouched.
    /// - Missing ids report `false`.
    #[tokio::test]
    async fn test_update_if_status() -> QueueResult<()> {
        let store = InMemoryOperationStore::new();
        let mut record = op("a");
        store.put(&record).await?;

        record.transition(OperationStatus::Processing, 1)?;
        assert!(store.update_if_status("a", OperationStatus::Pending, &record).await?);
        assert!(!store.update_if_status("a", OperationStatus::Pending, &record).await?);
        assert_eq!(store.get("a").await?.map(|o| o.status), Some(OperationStatus::Processing));
        assert!(!store.update_if_status("missing", OperationStatus::Pending, &record).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_writes() -> QueueResult<()> {
        let store = InMemoryOperationStore::new();
        store.set_fail_writes(true);
        assert!(store.put(&op("a")).await.is_err());
        store.set_fail_writes(false);
        store.put(&op("a")).await?;
        assert!(store.delete("a").await?);
        assert_eq!(store.count().await?, 0);
        Ok(())
    }

    /// Validates listeners fire only on actual changes.
    #[test]
    fn test_manual_monitor_notifies_on_change() {
        let monitor = ManualNetworkMonitor::new(NetworkQuality::Poor);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        monitor.on_change(Arc::new(move |_: NetworkStatus, _: NetworkQuality| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        monitor.set_quality(NetworkQuality::Poor);
        monitor.set_quality(NetworkQuality::Excellent);
        monitor.set_online(false);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!monitor.status().is_online);
        assert_eq!(monitor.quality(), NetworkQuality::Excellent);
    }
}
