use repsync_common::error::{CommonError, ErrorSeverity};
use repsync_common::{impl_error_classification, impl_error_conversion};
use thiserror::Error;

use super::types::{OperationCategory, OperationStatus};

/// Queue operation errors
///
/// Failures of individual executions are not represented here: they are
/// recorded on the operation (`failed` status, `last_error`) and surfaced
/// through listeners and metrics. `QueueError` covers the queue's own API and
/// its collaborators.
///
/// Serialization, store I/O and timeout failures arrive through the
/// embedded [`CommonError`], so `?` works on `serde_json` and `std::io`
/// results.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Queue is at maximum capacity ({0})")]
    CapacityExceeded(usize),

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Invalid transition for operation {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: OperationStatus, to: OperationStatus },

    #[error("Unknown dependency: {0}")]
    UnknownDependency(String),

    #[error("No executor registered for category {0}")]
    ExecutorMissing(OperationCategory),

    #[error("Operation {id} is {status}; only failed operations can be acknowledged")]
    NotAcknowledgeable { id: String, status: OperationStatus },

    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Scheduler is not running")]
    NotRunning,

    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

impl_error_conversion!(QueueError, Common);

impl_error_classification!(QueueError, Common,
    Self::CapacityExceeded(_) => {
        retryable: true,  // Cleanup or completions may free space
        severity: ErrorSeverity::Warning,
        critical: false,
        retry_after: Some(std::time::Duration::from_secs(1)),
    },
    Self::OperationNotFound(_) => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::InvalidTransition { .. } => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: true,
    },
    Self::UnknownDependency(_) => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::ExecutorMissing(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::NotAcknowledgeable { .. } => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    Self::AlreadyRunning => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::NotRunning => {
        retryable: false,
        severity: ErrorSeverity::Info,
        critical: false,
    },
    Self::InvalidConfig(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    }
);

#[cfg(test)]
mod tests {
    //! Unit tests for offline_queue::errors.
    use repsync_common::error::ErrorClassification;

    use super::*;

    #[test]
    fn test_capacity_exceeded_is_retryable_with_hint() {
        let err = QueueError::CapacityExceeded(1000);
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(1)));
        assert_eq!(err.to_string(), "Queue is at maximum capacity (1000)");
    }

    #[test]
    fn test_invalid_transition_is_critical() {
        let err = QueueError::InvalidTransition {
            id: "op-1".into(),
            from: OperationStatus::Failed,
            to: OperationStatus::Pending,
        };
        assert!(err.is_critical());
        assert_eq!(err.to_string(), "Invalid transition for operation op-1: failed -> pending");
    }

    /// Validates store failures keep their `CommonError` classification.
    ///
    /// Assertions:
    /// - An I/O error converts into `QueueError::Common` and stays retryable.
    #[test]
    fn test_io_error_converts_through_common() {
        let err: QueueError = std::io::Error::new(std::io::ErrorKind::Other, "disk full").into();
        assert!(matches!(err, QueueError::Common(CommonError::Persistence { .. })));
        assert!(err.is_retryable());
    }
}
