use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::types::{Operation, OperationStatus};

/// Lock-free queue metrics
///
/// `pending` and `processing` are live gauges driven by transitions; the
/// remaining counters are cumulative for the lifetime of the collector.
/// Recovery seeds `total`, `completed` and `failed` from the stored records
/// so rates survive a restart. Metrics are eventually consistent with the
/// store.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    total: AtomicU64,
    pending: AtomicU64,
    processing: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    processing_time_total_ms: AtomicU64,
    processing_samples: AtomicU64,
    capacity_rejections: AtomicU64,
    cycles: AtomicU64,
    compression_bytes_saved: AtomicU64,
}

/// Point-in-time view of [`MetricsCollector`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Operations ever accepted (enqueued or recovered)
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
    pub average_processing_time_ms: f64,
    /// `completed / (completed + failed)`, 1.0 before any terminal outcome
    pub success_rate: f64,
    /// `completed / (completed + retries + failed)`: share of attempts that
    /// did not waste a round trip, 1.0 before any outcome
    pub network_efficiency: f64,
    pub capacity_rejections: u64,
    pub cycles: u64,
    pub compression_bytes_saved: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a status change; `from == None` means the operation just
    /// entered the queue
    ///
    /// `duration_ms` is the execution time when leaving `processing`.
    pub fn record_transition(
        &self,
        operation: &Operation,
        from: Option<OperationStatus>,
        to: OperationStatus,
        duration_ms: Option<u64>,
    ) {
        trace!(operation_id = %operation.id, category = %operation.category, ?from, %to, "Recording transition");

        match from {
            None => {
                self.total.fetch_add(1, AtomicOrdering::Relaxed);
            }
            Some(OperationStatus::Pending) => decrement(&self.pending),
            Some(OperationStatus::Processing) => decrement(&self.processing),
            Some(OperationStatus::Completed | OperationStatus::Failed) => {}
        }

        match to {
            OperationStatus::Pending => {
                self.pending.fetch_add(1, AtomicOrdering::Relaxed);
                if from == Some(OperationStatus::Processing) {
                    self.retries.fetch_add(1, AtomicOrdering::Relaxed);
                }
            }
            OperationStatus::Processing => {
                self.processing.fetch_add(1, AtomicOrdering::Relaxed);
            }
            OperationStatus::Completed => {
                self.completed.fetch_add(1, AtomicOrdering::Relaxed);
            }
            OperationStatus::Failed => {
                self.failed.fetch_add(1, AtomicOrdering::Relaxed);
            }
        }

        if let Some(ms) = duration_ms {
            self.processing_time_total_ms.fetch_add(ms, AtomicOrdering::Relaxed);
            self.processing_samples.fetch_add(1, AtomicOrdering::Relaxed);
        }
    }

    /// Align with the stored records after recovery
    ///
    /// Gauges are replaced. Cumulative counters only grow, since records
    /// already cleaned up were counted when they finished.
    pub fn observe_store(&self, operations: &[Operation]) {
        let count = |status: OperationStatus| operations.iter().filter(|op| op.status == status).count() as u64;

        self.total.fetch_max(operations.len() as u64, AtomicOrdering::Relaxed);
        self.completed.fetch_max(count(OperationStatus::Completed), AtomicOrdering::Relaxed);
        self.failed.fetch_max(count(OperationStatus::Failed), AtomicOrdering::Relaxed);
        self.pending.store(count(OperationStatus::Pending), AtomicOrdering::Relaxed);
        self.processing.store(count(OperationStatus::Processing), AtomicOrdering::Relaxed);
    }

    pub fn record_capacity_rejection(&self) {
        self.capacity_rejections.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, AtomicOrdering::Relaxed);
    }

    pub fn record_compression_savings(&self, bytes: u64) {
        self.compression_bytes_saved.fetch_add(bytes, AtomicOrdering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let completed = self.completed.load(AtomicOrdering::Relaxed);
        let failed = self.failed.load(AtomicOrdering::Relaxed);
        let retries = self.retries.load(AtomicOrdering::Relaxed);
        let samples = self.processing_samples.load(AtomicOrdering::Relaxed);
        let total_ms = self.processing_time_total_ms.load(AtomicOrdering::Relaxed);

        MetricsSnapshot {
            total: self.total.load(AtomicOrdering::Relaxed),
            pending: self.pending.load(AtomicOrdering::Relaxed),
            processing: self.processing.load(AtomicOrdering::Relaxed),
            completed,
            failed,
            retries,
            average_processing_time_ms: if samples == 0 { 0.0 } else { total_ms as f64 / samples as f64 },
            success_rate: ratio(completed, completed + failed),
            network_efficiency: ratio(completed, completed + retries + failed),
            capacity_rejections: self.capacity_rejections.load(AtomicOrdering::Relaxed),
            cycles: self.cycles.load(AtomicOrdering::Relaxed),
            compression_bytes_saved: self.compression_bytes_saved.load(AtomicOrdering::Relaxed),
        }
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn decrement(gauge: &AtomicU64) {
    // Saturating: recovery may have reset the gauge underneath a transition
    let _ = gauge.fetch_update(AtomicOrdering::Relaxed, AtomicOrdering::Relaxed, |v| Some(v.saturating_sub(1)));
}
