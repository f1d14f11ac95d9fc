//! Observer callbacks for operation transitions and metrics snapshots
//!
//! Listeners run synchronously on the thread that caused the event. A
//! panicking listener is logged and skipped; it never takes the scheduler
//! down.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::metrics::MetricsSnapshot;
use super::types::{Operation, OperationCategory, OperationStatus, Priority};

/// A status transition of one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEvent {
    pub operation_id: String,
    pub category: OperationCategory,
    /// `None` when the operation was just enqueued
    pub from: Option<OperationStatus>,
    pub to: OperationStatus,
    pub priority: Priority,
    pub retry_count: u32,
    pub error: Option<String>,
    pub timestamp_ms: u64,
}

impl OperationEvent {
    pub fn new(operation: &Operation, from: Option<OperationStatus>) -> Self {
        Self {
            operation_id: operation.id.clone(),
            category: operation.category,
            from,
            to: operation.status,
            priority: operation.priority,
            retry_count: operation.retry_count,
            error: operation.last_error.clone(),
            timestamp_ms: operation.updated_at,
        }
    }
}

pub type OperationListener = Arc<dyn Fn(&OperationEvent) + Send + Sync>;
pub type MetricsListener = Arc<dyn Fn(&MetricsSnapshot) + Send + Sync>;

#[derive(Default)]
pub struct ListenerRegistry {
    operation: RwLock<Vec<OperationListener>>,
    metrics: RwLock<Vec<MetricsListener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_operation_listener(&self, listener: OperationListener) {
        self.operation.write().push(listener);
    }

    pub fn add_metrics_listener(&self, listener: MetricsListener) {
        self.metrics.write().push(listener);
    }

    pub fn emit_operation(&self, event: &OperationEvent) {
        // Snapshot so listeners may register further listeners
        let listeners = self.operation.read().clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(operation_id = %event.operation_id, to = %event.to, "Operation listener panicked");
            }
        }
    }

    pub fn emit_metrics(&self, snapshot: &MetricsSnapshot) {
        let listeners = self.metrics.read().clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
                warn!("Metrics listener panicked");
            }
        }
    }

    pub fn operation_listener_count(&self) -> usize {
        self.operation.read().len()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("operation", &self.operation.read().len())
            .field("metrics", &self.metrics.read().len())
            .finish()
    }
}
