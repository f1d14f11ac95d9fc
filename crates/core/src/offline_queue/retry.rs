//! Failure classification and retry backoff

use std::sync::Arc;
use std::time::Duration;

use repsync_common::resilience::ExponentialBackoff;

use super::ports::ExecutionError;
use super::types::{ErrorKind, OperationCategory};

/// Decides which [`ErrorKind`] an execution failure belongs to
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &ExecutionError, category: OperationCategory) -> ErrorKind;
}

/// Trusts the kind reported by the executor
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedKindClassifier;

impl ErrorClassifier for ReportedKindClassifier {
    fn classify(&self, error: &ExecutionError, _category: OperationCategory) -> ErrorKind {
        error.kind
    }
}

/// Outcome of classifying a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
    /// Delay before the next attempt; zero when `should_retry` is false
    pub retry_delay: Duration,
    pub kind: ErrorKind,
}

/// Classifies execution failures and computes the retry delay
///
/// `should_retry` reflects only the error kind; whether the operation still
/// has retry budget is decided by the caller against `max_retries`.
#[derive(Clone)]
pub struct RetryPolicy {
    classifier: Arc<dyn ErrorClassifier>,
    backoff: ExponentialBackoff,
}

impl RetryPolicy {
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self { classifier: Arc::new(ReportedKindClassifier), backoff }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn backoff(&self) -> &ExponentialBackoff {
        &self.backoff
    }

    /// `retry_count` is the number of retries already consumed
    pub fn classify(&self, error: &ExecutionError, category: OperationCategory, retry_count: u32) -> RetryDecision {
        let kind = self.classifier.classify(error, category);
        if kind.is_retryable() {
            RetryDecision { should_retry: true, retry_delay: self.backoff.delay_for(retry_count), kind }
        } else {
            RetryDecision { should_retry: false, retry_delay: Duration::ZERO, kind }
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy").field("classifier", &"<dyn ErrorClassifier>").field("backoff", &self.backoff).finish()
    }
}
