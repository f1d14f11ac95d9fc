// Offline operation queue
// Persist, prioritize and replay user operations while connectivity comes and goes

mod batching;
mod codec;
mod config;
mod dependency;
mod errors;
mod listeners;
mod maintenance;
mod memory;
pub mod metrics;
mod ports;
mod priority;
mod queue;
mod registry;
mod retry;
mod scheduler;
mod types;

pub use self::batching::BatchPolicy;
pub use self::codec::{GzipCodec, IdentityCodec, PayloadCodec};
pub use self::config::QueueConfig;
pub use self::dependency::DependencyTracker;
pub use self::errors::{QueueError, QueueResult};
pub use self::listeners::{MetricsListener, OperationEvent, OperationListener};
pub use self::maintenance::MaintenanceService;
pub use self::memory::{InMemoryOperationStore, ManualNetworkMonitor};
pub use self::metrics::{MetricsCollector, MetricsSnapshot};
pub use self::ports::{
    ExecutionError, NetworkChangeListener, NetworkMonitor, OperationExecutor, PersistentStore,
};
pub use self::priority::{network_weight, PriorityScorer};
pub use self::queue::{OfflineQueue, OfflineQueueBuilder};
pub use self::registry::ExecutorRegistry;
pub use self::retry::{ErrorClassifier, ReportedKindClassifier, RetryDecision, RetryPolicy};
pub use self::scheduler::CycleReport;
pub use self::types::{
    EnqueueOptions, ErrorKind, NetworkQuality, NetworkRequirement, NetworkStatus, Operation,
    OperationCategory, OperationDescriptor, OperationStatus, Priority,
};
