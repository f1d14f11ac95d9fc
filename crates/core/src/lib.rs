//! # RepSync Core
//!
//! Offline operation queue - no infrastructure dependencies.
//!
//! This crate contains:
//! - The operation model, status lifecycle and priority scoring
//! - Port interfaces for persistence, network monitoring and execution
//! - The scheduler that batches, retries and orders queued work
//!
//! ## Architecture Principles
//! - Only depends on `repsync-common`
//! - No filesystem, HTTP, or platform code
//! - All external dependencies via traits
//! - In-memory adapters ship alongside the ports for tests and embedding

pub mod offline_queue;

pub use offline_queue::{
    EnqueueOptions, ExecutionError, NetworkMonitor, OfflineQueue, Operation, OperationCategory,
    OperationDescriptor, OperationExecutor, OperationStatus, PersistentStore, QueueConfig,
    QueueError, QueueResult,
};
