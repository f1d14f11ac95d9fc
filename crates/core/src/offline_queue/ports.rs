//! Port interfaces for the queue's collaborators
//!
//! The queue owns none of its I/O: storage, connectivity and the actual
//! network calls are injected through these traits.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::errors::QueueResult;
use super::types::{ErrorKind, NetworkQuality, NetworkStatus, Operation, OperationStatus};

/// Durable key-value storage for operations, keyed by operation id
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Insert or overwrite a record
    async fn put(&self, operation: &Operation) -> QueueResult<()>;

    async fn get(&self, id: &str) -> QueueResult<Option<Operation>>;

    async fn get_all(&self) -> QueueResult<Vec<Operation>>;

    /// Remove a record; returns whether it existed
    async fn delete(&self, id: &str) -> QueueResult<bool>;

    /// Atomically replace the record if its stored status equals `expected`
    ///
    /// Returns `false` (and writes nothing) when the record is missing or
    /// its status differs. This is the authority against double-claiming.
    async fn update_if_status(
        &self,
        id: &str,
        expected: OperationStatus,
        operation: &Operation,
    ) -> QueueResult<bool>;

    async fn count(&self) -> QueueResult<usize> {
        Ok(self.get_all().await?.len())
    }
}

/// Callback invoked with the new quality whenever connectivity changes
pub type NetworkChangeListener = Arc<dyn Fn(NetworkStatus, NetworkQuality) + Send + Sync>;

/// Source of connectivity information
pub trait NetworkMonitor: Send + Sync {
    fn status(&self) -> NetworkStatus;

    fn quality(&self) -> NetworkQuality;

    /// Register a listener for connectivity changes
    fn on_change(&self, listener: NetworkChangeListener);
}

/// Failure reported by an executor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} error: {message}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

/// Performs the network call behind one category of operations
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Execute `kind` with the decoded payload
    async fn execute(&self, kind: &str, payload: &[u8]) -> Result<(), ExecutionError>;
}
