//! Category-keyed executor registry

use std::collections::HashMap;
use std::sync::Arc;

use super::errors::{QueueError, QueueResult};
use super::ports::{ExecutionError, OperationExecutor};
use super::types::OperationCategory;

/// Maps each [`OperationCategory`] to the executor that performs its
/// network calls
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<OperationCategory, Arc<dyn OperationExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the executor for `category`
    pub fn register(&mut self, category: OperationCategory, executor: Arc<dyn OperationExecutor>) {
        self.executors.insert(category, executor);
    }

    #[must_use]
    pub fn with(mut self, category: OperationCategory, executor: Arc<dyn OperationExecutor>) -> Self {
        self.register(category, executor);
        self
    }

    pub fn contains(&self, category: OperationCategory) -> bool {
        self.executors.contains_key(&category)
    }

    pub fn get(&self, category: OperationCategory) -> QueueResult<Arc<dyn OperationExecutor>> {
        self.executors.get(&category).cloned().ok_or(QueueError::ExecutorMissing(category))
    }

    /// Run `kind` on the category's executor
    ///
    /// A missing executor is reported as a validation failure so the
    /// operation fails permanently instead of retrying forever.
    pub async fn execute(
        &self,
        category: OperationCategory,
        kind: &str,
        payload: &[u8],
    ) -> Result<(), ExecutionError> {
        let executor = self.get(category).map_err(|e| ExecutionError::validation(e.to_string()))?;
        executor.execute(kind, payload).await
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry").field("categories", &self.executors.keys().collect::<Vec<_>>()).finish()
    }
}
