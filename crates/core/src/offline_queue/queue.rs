//! Public queue facade

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use repsync_common::error::CommonError;
use repsync_common::testing::{Clock, SystemClock};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::codec::{GzipCodec, IdentityCodec, PayloadCodec};
use super::config::QueueConfig;
use super::errors::{QueueError, QueueResult};
use super::listeners::{MetricsListener, OperationEvent};
use super::metrics::MetricsSnapshot;
use super::ports::{NetworkMonitor, OperationExecutor, PersistentStore};
use super::registry::ExecutorRegistry;
use super::retry::{ErrorClassifier, RetryPolicy};
use super::scheduler::{CycleReport, Scheduler};
use super::types::{EnqueueOptions, NetworkQuality, NetworkStatus, Operation, OperationCategory, OperationDescriptor, OperationStatus};

struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Offline operation queue
///
/// Operations are persisted on [`add_operation`](Self::add_operation) and
/// dispatched by a background scheduler once [`start`](Self::start)ed, or by
/// hand through [`run_cycle`](Self::run_cycle). Execution failures never
/// surface as errors here; they end up on the operation (`failed`,
/// `last_error`) and are reported to listeners and metrics.
///
/// ```no_run
/// use std::sync::Arc;
///
/// use repsync_core::offline_queue::{
///     InMemoryOperationStore, ManualNetworkMonitor, OfflineQueue, OperationCategory,
///     OperationDescriptor, EnqueueOptions,
/// };
///
/// # async fn example(executor: Arc<dyn repsync_core::offline_queue::OperationExecutor>) -> repsync_core::offline_queue::QueueResult<()> {
/// let queue = OfflineQueue::builder(
///     Arc::new(InMemoryOperationStore::new()),
///     Arc::new(ManualNetworkMonitor::default()),
/// )
/// .executor(OperationCategory::Workout, executor)
/// .build()?;
///
/// queue.start().await?;
/// let id = queue
///     .add_operation(
///         OperationDescriptor::new(OperationCategory::Workout, "create", br#"{"sets":3}"#.to_vec()),
///         EnqueueOptions::immediate(),
///     )
///     .await?;
/// # let _ = id;
/// queue.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct OfflineQueue {
    scheduler: Arc<Scheduler>,
    handle: AsyncMutex<Option<SchedulerHandle>>,
    enqueue_lock: AsyncMutex<()>,
}

impl OfflineQueue {
    pub fn builder(store: Arc<dyn PersistentStore>, network: Arc<dyn NetworkMonitor>) -> OfflineQueueBuilder {
        OfflineQueueBuilder::new(store, network)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.scheduler.config
    }

    /// Persist a new operation and return its id
    ///
    /// With `options.immediate` the operation is dispatched right away when
    /// its dependencies, the network and a free permit allow it; otherwise
    /// the scheduler is woken. Fails with `CapacityExceeded` when the store
    /// is full even after retention cleanup, and with `UnknownDependency`
    /// when a dependency id is not stored.
    #[instrument(skip(self, descriptor, options), fields(category = %descriptor.category, kind = %descriptor.kind))]
    pub async fn add_operation(&self, descriptor: OperationDescriptor, options: EnqueueOptions) -> QueueResult<String> {
        let scheduler = &self.scheduler;
        let operation = {
            let _guard = self.enqueue_lock.lock().await;
            self.ensure_capacity().await?;

            let mut dependencies = Vec::with_capacity(options.dependencies.len());
            for dependency in options.dependencies {
                if dependencies.contains(&dependency) {
                    continue;
                }
                if scheduler.store.get(&dependency).await?.is_none() {
                    return Err(QueueError::UnknownDependency(dependency));
                }
                dependencies.push(dependency);
            }

            let now_ms = scheduler.now_ms();
            let max_retries = options.max_retries.unwrap_or(scheduler.config.default_max_retries);
            let mut operation =
                Operation::new(Uuid::new_v4().to_string(), descriptor, max_retries, dependencies, now_ms);
            operation.priority = scheduler.scorer.score(&operation, scheduler.effective_quality(), now_ms);
            self.encode_payload(&mut operation)?;

            scheduler.store.put(&operation).await?;
            scheduler.tracker.register_dependencies(&operation.id, operation.dependencies.iter().cloned());
            operation
        };

        debug!(operation_id = %operation.id, priority = ?operation.priority, "Operation enqueued");
        scheduler.emit(&operation, None, None);

        if options.immediate {
            match scheduler.try_dispatch_now(&operation).await {
                Ok(true) => return Ok(operation.id),
                Ok(false) => {}
                Err(e) => warn!(operation_id = %operation.id, error = %e, "Immediate dispatch failed"),
            }
        }
        scheduler.wake();
        Ok(operation.id)
    }

    async fn ensure_capacity(&self) -> QueueResult<()> {
        let max = self.scheduler.config.max_queue_size;
        if self.scheduler.store.count().await? < max {
            return Ok(());
        }

        let removed = self.scheduler.cleanup().await?;
        if removed > 0 && self.scheduler.store.count().await? < max {
            return Ok(());
        }

        self.scheduler.metrics.record_capacity_rejection();
        warn!(max_queue_size = max, "Queue is full");
        Err(QueueError::CapacityExceeded(max))
    }

    /// Store the codec output when it is smaller than the raw payload
    fn encode_payload(&self, operation: &mut Operation) -> QueueResult<()> {
        let encoded = self.scheduler.codec.encode(&operation.payload)?;
        if encoded.len() < operation.payload.len() {
            let saved = (operation.payload.len() - encoded.len()) as u64;
            self.scheduler.metrics.record_compression_savings(saved);
            operation.payload = encoded;
            operation.encoded = true;
        }
        Ok(())
    }

    /// Recover interrupted work and spawn the scheduler loop
    #[instrument(skip(self))]
    pub async fn start(&self) -> QueueResult<()> {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return Err(QueueError::AlreadyRunning);
        }

        let stored = self.scheduler.recover().await?;

        let cancel = CancellationToken::new();
        let scheduler = Arc::clone(&self.scheduler);
        let task = tokio::spawn(scheduler.run(cancel.clone()));
        *handle = Some(SchedulerHandle { cancel, task });

        info!(stored, "Offline queue started");
        Ok(())
    }

    /// Stop the scheduler loop
    ///
    /// Executions already in flight run to completion and record their
    /// outcome; no new cycle starts.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> QueueResult<()> {
        let Some(SchedulerHandle { cancel, task }) = self.handle.lock().await.take() else {
            return Err(QueueError::NotRunning);
        };

        cancel.cancel();
        let timeout = self.scheduler.config.stop_timeout;
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(CommonError::internal_with_context(e.to_string(), "scheduler task").into());
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Scheduler did not stop within timeout");
                return Err(CommonError::timeout("scheduler stop", timeout).into());
            }
        }

        info!("Offline queue stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_some()
    }

    /// Run a single scheduling pass and wait for its executions
    pub async fn run_cycle(&self) -> QueueResult<CycleReport> {
        self.scheduler.run_cycle(&CancellationToken::new()).await
    }

    /// Remove completed operations older than the retention period
    pub async fn cleanup(&self) -> QueueResult<usize> {
        self.scheduler.cleanup().await
    }

    /// Delete a failed operation; the only way failed operations leave the
    /// store
    #[instrument(skip(self))]
    pub async fn acknowledge_failure(&self, id: &str) -> QueueResult<()> {
        let operation =
            self.scheduler.store.get(id).await?.ok_or_else(|| QueueError::OperationNotFound(id.to_string()))?;
        if operation.status != OperationStatus::Failed {
            return Err(QueueError::NotAcknowledgeable { id: id.to_string(), status: operation.status });
        }
        self.scheduler.store.delete(id).await?;
        self.scheduler.tracker.release(id);
        debug!(operation_id = %id, "Failed operation acknowledged");
        Ok(())
    }

    pub async fn get_operation(&self, id: &str) -> QueueResult<Option<Operation>> {
        self.scheduler.store.get(id).await
    }

    /// Operations with `status`, oldest first
    pub async fn operations_by_status(&self, status: OperationStatus) -> QueueResult<Vec<Operation>> {
        let mut operations: Vec<_> =
            self.scheduler.store.get_all().await?.into_iter().filter(|op| op.status == status).collect();
        operations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(operations)
    }

    pub async fn pending_count(&self) -> QueueResult<usize> {
        Ok(self.scheduler.store.get_all().await?.iter().filter(|op| op.status == OperationStatus::Pending).count())
    }

    /// Ids currently executing in this process
    pub fn in_flight(&self) -> HashSet<String> {
        self.scheduler.in_flight_ids()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.scheduler.metrics.snapshot()
    }

    /// Called on every status transition, including enqueue
    pub fn add_operation_listener<F>(&self, listener: F)
    where
        F: Fn(&OperationEvent) + Send + Sync + 'static,
    {
        self.scheduler.listeners.add_operation_listener(Arc::new(listener));
    }

    /// Called with a fresh snapshot after every cycle
    pub fn add_metrics_listener<F>(&self, listener: F)
    where
        F: Fn(&MetricsSnapshot) + Send + Sync + 'static,
    {
        let listener: MetricsListener = Arc::new(listener);
        self.scheduler.listeners.add_metrics_listener(listener);
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue").field("scheduler", &self.scheduler).finish_non_exhaustive()
    }
}

/// Builder for [`OfflineQueue`]
pub struct OfflineQueueBuilder {
    store: Arc<dyn PersistentStore>,
    network: Arc<dyn NetworkMonitor>,
    config: QueueConfig,
    executors: ExecutorRegistry,
    clock: Arc<dyn Clock>,
    codec: Option<Arc<dyn PayloadCodec>>,
    classifier: Option<Arc<dyn ErrorClassifier>>,
}

impl OfflineQueueBuilder {
    fn new(store: Arc<dyn PersistentStore>, network: Arc<dyn NetworkMonitor>) -> Self {
        Self {
            store,
            network,
            config: QueueConfig::default(),
            executors: ExecutorRegistry::new(),
            clock: Arc::new(SystemClock),
            codec: None,
            classifier: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn executor(mut self, category: OperationCategory, executor: Arc<dyn OperationExecutor>) -> Self {
        self.executors.register(category, executor);
        self
    }

    #[must_use]
    pub fn executors(mut self, executors: ExecutorRegistry) -> Self {
        self.executors = executors;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the codec chosen from `compression_enabled`
    #[must_use]
    pub fn codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    #[must_use]
    pub fn error_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build(self) -> QueueResult<OfflineQueue> {
        self.config.validate()?;

        let missing: Vec<_> = OperationCategory::ALL.into_iter().filter(|c| !self.executors.contains(*c)).collect();
        if !missing.is_empty() {
            debug!(?missing, "No executor for some categories; their operations will fail");
        }

        let codec = self.codec.unwrap_or_else(|| {
            if self.config.compression_enabled {
                Arc::new(GzipCodec::new(self.config.compression_level))
            } else {
                Arc::new(IdentityCodec)
            }
        });

        let mut retry_policy = RetryPolicy::new(self.config.retry_backoff());
        if let Some(classifier) = self.classifier {
            retry_policy = retry_policy.with_classifier(classifier);
        }

        let scheduler = Arc::new(Scheduler::new(
            self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.network),
            self.executors,
            codec,
            self.clock,
            retry_policy,
        ));

        let weak: Weak<Scheduler> = Arc::downgrade(&scheduler);
        self.network.on_change(Arc::new(move |status: NetworkStatus, quality: NetworkQuality| {
            if let Some(scheduler) = weak.upgrade() {
                debug!(online = status.is_online, ?quality, "Network changed, waking scheduler");
                scheduler.wake();
            }
        }));

        Ok(OfflineQueue { scheduler, handle: AsyncMutex::new(None), enqueue_lock: AsyncMutex::new(()) })
    }
}
