//! Shared helpers for `repsync-core` integration tests.
//!
//! A scripted executor that records every call and tracks concurrency, plus
//! polling helpers for waiting on background dispatch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use repsync_common::testing::Clock;
use repsync_core::offline_queue::{
    ExecutionError, ManualNetworkMonitor, NetworkQuality, OfflineQueue, Operation, OperationCategory,
    OperationExecutor, OperationStatus, PersistentStore, QueueConfig,
};

/// One recorded executor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: String,
    pub payload: Vec<u8>,
}

/// Executor returning scripted outcomes in order, then `fallback`
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<(), ExecutionError>>>,
    fallback: Result<(), ExecutionError>,
    delay: Duration,
    calls: Mutex<Vec<Call>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedExecutor {
    /// Always succeeds
    pub fn succeeding() -> Self {
        Self::with_fallback(Ok(()))
    }

    /// Always fails with `error`
    pub fn failing(error: ExecutionError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: Result<(), ExecutionError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Queue an outcome for the next unscripted call
    pub fn then(self, outcome: Result<(), ExecutionError>) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    /// Hold every execution for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.calls.lock().iter().map(|call| call.kind.clone()).collect()
    }

    /// Highest number of executions observed running at once
    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperationExecutor for ScriptedExecutor {
    async fn execute(&self, kind: &str, payload: &[u8]) -> Result<(), ExecutionError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls.lock().push(Call { kind: kind.to_string(), payload: payload.to_vec() });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self.script.lock().pop_front().unwrap_or_else(|| self.fallback.clone());
        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// Queue with `executor` registered for every category
pub fn build_queue(
    store: Arc<dyn PersistentStore>,
    network: Arc<ManualNetworkMonitor>,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    executor: Arc<ScriptedExecutor>,
) -> OfflineQueue {
    let mut builder = OfflineQueue::builder(store, network).config(config).clock(clock);
    for category in OperationCategory::ALL {
        builder = builder.executor(category, executor.clone());
    }
    builder.build().expect("valid queue configuration")
}

pub fn monitor(quality: NetworkQuality) -> Arc<ManualNetworkMonitor> {
    Arc::new(ManualNetworkMonitor::new(quality))
}

/// Poll until `id` reaches `status`, panicking after five seconds
pub async fn wait_for_status(queue: &OfflineQueue, id: &str, status: OperationStatus) -> Operation {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(op) = queue.get_operation(id).await.expect("store readable") {
            if op.status == status {
                return op;
            }
        }
        assert!(Instant::now() < deadline, "operation {id} never reached {status}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Poll until nothing is executing
pub async fn wait_for_idle(queue: &OfflineQueue) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !queue.in_flight().is_empty() {
        assert!(Instant::now() < deadline, "executions still running after 5s");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
