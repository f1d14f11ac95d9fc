//! Scheduling engine
//!
//! One [`Scheduler`] per queue owns the collaborators and all in-process
//! state (in-flight set, permits, dependency relation, metrics). A cycle:
//!
//! 1. persists outcomes whose first write failed, then loads every stored
//!    operation and keeps the ready `pending` ones
//! 2. drops in-flight ones, ones with unmet persisted dependencies and ones
//!    the current network cannot serve
//! 3. re-scores the rest and persists priority raises
//! 4. sorts them into dispatch order
//! 5. sizes the batch from network quality and free permits
//! 6. claims and spawns each chunk, then waits for the chunk to finish
//!
//! The background loop sleeps a quality-dependent interval between cycles.
//! Enqueues, completions with waiting dependents and network changes wake it
//! early.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use repsync_common::testing::Clock;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::batching::BatchPolicy;
use super::codec::PayloadCodec;
use super::config::QueueConfig;
use super::dependency::DependencyTracker;
use super::errors::QueueResult;
use super::listeners::{ListenerRegistry, OperationEvent};
use super::maintenance::MaintenanceService;
use super::metrics::MetricsCollector;
use super::ports::{ExecutionError, NetworkMonitor, PersistentStore};
use super::priority::PriorityScorer;
use super::registry::ExecutorRegistry;
use super::retry::RetryPolicy;
use super::types::{NetworkQuality, Operation, OperationStatus};

/// Summary of one scheduling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Operations that passed every gate this cycle
    pub eligible: usize,
    /// Operations claimed and executed
    pub dispatched: usize,
    /// Completed operations removed by retention cleanup
    pub cleaned: usize,
}

impl CycleReport {
    /// Nothing was eligible; the loop sleeps longer
    pub fn is_idle(&self) -> bool {
        self.eligible == 0
    }
}

pub(crate) struct Scheduler {
    pub(crate) config: QueueConfig,
    pub(crate) store: Arc<dyn PersistentStore>,
    pub(crate) network: Arc<dyn NetworkMonitor>,
    pub(crate) executors: ExecutorRegistry,
    pub(crate) codec: Arc<dyn PayloadCodec>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) scorer: PriorityScorer,
    pub(crate) batch_policy: BatchPolicy,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) tracker: DependencyTracker,
    pub(crate) metrics: MetricsCollector,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) maintenance: MaintenanceService,
    permits: Arc<Semaphore>,
    in_flight: Mutex<HashSet<String>>,
    /// Outcomes computed but not yet persisted, with their execution time
    unsettled: Mutex<HashMap<String, (Operation, u64)>>,
    wake: Notify,
    last_cleanup_ms: AtomicU64,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: QueueConfig,
        store: Arc<dyn PersistentStore>,
        network: Arc<dyn NetworkMonitor>,
        executors: ExecutorRegistry,
        codec: Arc<dyn PayloadCodec>,
        clock: Arc<dyn Clock>,
        retry_policy: RetryPolicy,
    ) -> Self {
        let now_ms = clock.millis_since_epoch();
        Self {
            batch_policy: BatchPolicy::from_config(&config),
            maintenance: MaintenanceService::new(config.retention_period),
            permits: Arc::new(Semaphore::new(config.max_concurrent_operations)),
            config,
            store,
            network,
            executors,
            codec,
            clock,
            scorer: PriorityScorer::new(),
            retry_policy,
            tracker: DependencyTracker::new(),
            metrics: MetricsCollector::new(),
            listeners: ListenerRegistry::new(),
            in_flight: Mutex::new(HashSet::new()),
            unsettled: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            last_cleanup_ms: AtomicU64::new(now_ms),
        }
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.millis_since_epoch()
    }

    /// Wake the loop if it is sleeping, or make its next sleep return
    /// immediately
    pub(crate) fn wake(&self) {
        self.wake.notify_one();
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub(crate) fn in_flight_ids(&self) -> HashSet<String> {
        self.in_flight.lock().clone()
    }

    /// Quality tier to schedule against; a disconnected monitor is offline
    /// whatever tier it last reported
    pub(crate) fn effective_quality(&self) -> NetworkQuality {
        if self.network.status().is_online {
            self.network.quality()
        } else {
            NetworkQuality::Offline
        }
    }

    /// Record a transition in metrics and notify listeners
    pub(crate) fn emit(&self, operation: &Operation, from: Option<OperationStatus>, duration_ms: Option<u64>) {
        self.metrics.record_transition(operation, from, operation.status, duration_ms);
        self.listeners.emit_operation(&OperationEvent::new(operation, from));
    }

    /// Remove retention-expired completed operations
    pub(crate) async fn cleanup(&self) -> QueueResult<usize> {
        let now_ms = self.now_ms();
        let removed = self.maintenance.cleanup_expired(self.store.as_ref(), &self.tracker, now_ms).await?;
        self.last_cleanup_ms.store(now_ms, AtomicOrdering::Relaxed);
        Ok(removed.len())
    }

    async fn cleanup_if_due(&self, now_ms: u64) -> QueueResult<usize> {
        let interval_ms = u64::try_from(self.config.cleanup_interval.as_millis()).unwrap_or(u64::MAX);
        if now_ms.saturating_sub(self.last_cleanup_ms.load(AtomicOrdering::Relaxed)) < interval_ms {
            return Ok(0);
        }
        self.cleanup().await
    }

    /// Reset interrupted operations, rebuild dependencies and align metrics
    pub(crate) async fn recover(&self) -> QueueResult<usize> {
        let mut still_running = self.in_flight_ids();
        still_running.extend(self.unsettled.lock().keys().cloned());
        let operations =
            self.maintenance.recover(self.store.as_ref(), &self.tracker, &still_running, self.now_ms()).await?;
        self.metrics.observe_store(&operations);
        Ok(operations.len())
    }

    /// Register the persisted dependencies of every non-terminal record
    ///
    /// A queue built over a populated store learns the relation here, so
    /// cleanup and completion wake-ups see it without a prior `start`.
    fn track_persisted_dependencies(&self, records: &[Operation]) {
        for op in records.iter().filter(|op| !op.status.is_terminal() && !op.dependencies.is_empty()) {
            self.tracker.register_dependencies(&op.id, op.dependencies.iter().cloned());
        }
    }

    /// Retry persisting outcomes whose write failed after execution
    async fn settle_outcomes(&self) -> QueueResult<()> {
        let outcomes: Vec<(Operation, u64)> = self.unsettled.lock().values().cloned().collect();
        for (operation, duration_ms) in outcomes {
            self.persist_outcome(&operation, duration_ms).await?;
            self.unsettled.lock().remove(&operation.id);
            debug!(operation_id = %operation.id, status = %operation.status, "Persisted deferred outcome");
        }
        Ok(())
    }

    /// One scheduling pass; `cancel` abandons waiting on spawned executions
    /// (they keep running) and skips the remaining chunks
    #[instrument(skip_all)]
    pub(crate) async fn run_cycle(self: &Arc<Self>, cancel: &CancellationToken) -> QueueResult<CycleReport> {
        let now_ms = self.now_ms();
        self.settle_outcomes().await?;

        let mut records = self.store.get_all().await?;
        self.track_persisted_dependencies(&records);
        let mut report = CycleReport { cleaned: self.cleanup_if_due(now_ms).await?, ..CycleReport::default() };
        if report.cleaned > 0 {
            records = self.store.get_all().await?;
        }
        let statuses: HashMap<String, OperationStatus> =
            records.iter().map(|op| (op.id.clone(), op.status)).collect();

        let status = self.network.status();
        let quality = self.effective_quality();
        let in_flight = self.in_flight_ids();

        let mut candidates = Vec::new();
        for mut op in records {
            if !op.is_ready(now_ms) || in_flight.contains(&op.id) {
                continue;
            }
            let dependencies_met =
                op.dependencies.iter().all(|id| statuses.get(id) == Some(&OperationStatus::Completed));
            if !dependencies_met || !self.tracker.are_satisfied_with(&op.id, |id| statuses.get(id).copied()) {
                continue;
            }
            if !self.batch_policy.network_allows(op.network_requirement, status, quality) {
                continue;
            }

            let effective =
                self.scorer.effective_priority(&op, quality, now_ms, self.config.priority_boost_threshold);
            if op.priority < effective {
                let previous = op.priority;
                op.raise_priority(effective);
                if !self.store.update_if_status(&op.id, OperationStatus::Pending, &op).await? {
                    continue;
                }
                debug!(operation_id = %op.id, from = ?previous, to = ?op.priority, "Raised priority");
            }
            candidates.push(op);
        }

        candidates.sort_by(PriorityScorer::dispatch_order);
        report.eligible = candidates.len();

        let batch_size =
            self.batch_policy.batch_size(quality, in_flight.len()).min(self.permits.available_permits());
        candidates.truncate(batch_size);

        for chunk in candidates.chunks(self.config.max_concurrent_operations) {
            let mut handles = Vec::with_capacity(chunk.len());
            for op in chunk {
                let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                    break;
                };
                if let Some(handle) = self.claim(op.clone(), permit).await? {
                    handles.push(handle);
                }
            }
            if handles.is_empty() {
                break;
            }
            report.dispatched += handles.len();

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Cycle interrupted; in-flight executions continue");
                    break;
                }
                results = join_all(handles) => {
                    for result in results {
                        if let Err(e) = result {
                            error!(error = %e, "Execution task failed");
                        }
                    }
                }
            }
        }

        self.metrics.record_cycle();
        self.listeners.emit_metrics(&self.metrics.snapshot());
        debug!(eligible = report.eligible, dispatched = report.dispatched, ?quality, "Cycle finished");
        Ok(report)
    }

    /// Dispatch `operation` outside the loop if dependencies, network and a
    /// free permit allow it; returns whether it was dispatched
    pub(crate) async fn try_dispatch_now(self: &Arc<Self>, operation: &Operation) -> QueueResult<bool> {
        if !self.batch_policy.network_allows(
            operation.network_requirement,
            self.network.status(),
            self.effective_quality(),
        ) {
            return Ok(false);
        }
        if !self.tracker.are_satisfied(&operation.id, self.store.as_ref()).await? {
            return Ok(false);
        }
        let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
            return Ok(false);
        };
        Ok(self.claim(operation.clone(), permit).await?.is_some())
    }

    /// Move a pending operation to `processing` under a held permit and
    /// spawn its execution
    ///
    /// Returns `None` if another dispatcher got there first.
    async fn claim(
        self: &Arc<Self>,
        operation: Operation,
        permit: OwnedSemaphorePermit,
    ) -> QueueResult<Option<JoinHandle<()>>> {
        if !self.in_flight.lock().insert(operation.id.clone()) {
            return Ok(None);
        }

        let now_ms = self.now_ms();
        let mut claimed = operation;
        let claim = match claimed.transition(OperationStatus::Processing, now_ms) {
            Ok(()) => {
                claimed.processing_started_at = Some(now_ms);
                self.store.update_if_status(&claimed.id, OperationStatus::Pending, &claimed).await
            }
            Err(e) => Err(e),
        };

        match claim {
            Ok(true) => {}
            Ok(false) => {
                self.in_flight.lock().remove(&claimed.id);
                return Ok(None);
            }
            Err(e) => {
                self.in_flight.lock().remove(&claimed.id);
                return Err(e);
            }
        }

        debug!(operation_id = %claimed.id, category = %claimed.category, priority = ?claimed.priority, "Dispatching operation");
        self.emit(&claimed, Some(OperationStatus::Pending), None);

        let scheduler = Arc::clone(self);
        Ok(Some(tokio::spawn(async move {
            scheduler.execute(claimed).await;
            drop(permit);
        })))
    }

    async fn execute(&self, operation: Operation) {
        let started = Instant::now();
        let result = match self.decode_payload(&operation) {
            Ok(payload) => self.executors.execute(operation.category, &operation.kind, &payload).await,
            Err(e) => Err(e),
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let id = operation.id.clone();
        match self.apply_outcome(operation, result, duration_ms) {
            Ok(outcome) => {
                if let Err(e) = self.persist_outcome(&outcome, duration_ms).await {
                    warn!(operation_id = %id, error = %e, "Failed to persist execution outcome; retrying next cycle");
                    self.unsettled.lock().insert(id.clone(), (outcome, duration_ms));
                }
            }
            Err(e) => error!(operation_id = %id, error = %e, "Invalid execution outcome"),
        }
        self.in_flight.lock().remove(&id);
    }

    fn decode_payload(&self, operation: &Operation) -> Result<Vec<u8>, ExecutionError> {
        if !operation.encoded {
            return Ok(operation.payload.clone());
        }
        self.codec
            .decode(&operation.payload)
            .map_err(|e| ExecutionError::validation(format!("payload decode failed ({}): {e}", self.codec.name())))
    }

    /// Apply the execution outcome: complete, schedule a retry, or fail
    fn apply_outcome(
        &self,
        mut operation: Operation,
        result: Result<(), ExecutionError>,
        duration_ms: u64,
    ) -> QueueResult<Operation> {
        let now_ms = self.now_ms();
        operation.processing_started_at = None;

        match result {
            Ok(()) => {
                operation.transition(OperationStatus::Completed, now_ms)?;
                operation.next_attempt_at = None;
                operation.last_error = None;
                debug!(operation_id = %operation.id, duration_ms, "Operation completed");
            }
            Err(error) => {
                let decision = self.retry_policy.classify(&error, operation.category, operation.retry_count);
                operation.last_error = Some(error.to_string());

                if decision.should_retry && operation.has_retry_budget() {
                    operation.transition(OperationStatus::Pending, now_ms)?;
                    operation.retry_count += 1;
                    let delay_ms = u64::try_from(decision.retry_delay.as_millis()).unwrap_or(u64::MAX);
                    operation.next_attempt_at = Some(now_ms.saturating_add(delay_ms));
                    warn!(
                        operation_id = %operation.id,
                        retry_count = operation.retry_count,
                        max_retries = operation.max_retries,
                        delay_ms,
                        error = %error,
                        "Operation failed, scheduling retry"
                    );
                } else {
                    operation.transition(OperationStatus::Failed, now_ms)?;
                    operation.next_attempt_at = None;
                    warn!(
                        operation_id = %operation.id,
                        kind = ?decision.kind,
                        retry_count = operation.retry_count,
                        error = %error,
                        "Operation failed permanently"
                    );
                }
            }
        }
        Ok(operation)
    }

    /// Write an outcome over the `processing` record, then notify
    async fn persist_outcome(&self, operation: &Operation, duration_ms: u64) -> QueueResult<()> {
        if !self.store.update_if_status(&operation.id, OperationStatus::Processing, operation).await? {
            warn!(operation_id = %operation.id, "Stored record changed during execution; outcome dropped");
            return Ok(());
        }

        if operation.status.is_terminal() {
            self.tracker.release(&operation.id);
        }
        self.emit(operation, Some(OperationStatus::Processing), Some(duration_ms));

        if operation.status == OperationStatus::Completed && self.tracker.has_dependents(&operation.id) {
            self.wake();
        }
        Ok(())
    }

    /// Background loop; returns when `cancel` fires
    pub(crate) async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let loop_backoff = self.config.loop_error_backoff();
        let mut consecutive_errors = 0_u32;
        info!("Scheduler loop started");

        while !cancel.is_cancelled() {
            let delay = match self.run_cycle(&cancel).await {
                Ok(report) => {
                    consecutive_errors = 0;
                    self.batch_policy.cycle_interval(self.effective_quality(), report.is_idle())
                }
                Err(e) => {
                    let delay = loop_backoff.delay_for(consecutive_errors);
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    error!(error = %e, consecutive_errors, delay_ms = delay.as_millis() as u64, "Scheduler cycle failed");
                    delay
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Scheduler loop stopped");
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight_count())
            .field("unsettled", &self.unsettled.lock().len())
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}
