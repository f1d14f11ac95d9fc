//! Data model for queued operations

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{QueueError, QueueResult};

/// Functional area an operation belongs to; selects its executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationCategory {
    Workout,
    Social,
    Settings,
    Media,
    Analytics,
}

impl OperationCategory {
    pub const ALL: [Self; 5] = [Self::Workout, Self::Social, Self::Settings, Self::Media, Self::Analytics];

    /// Scoring weight; also the third dispatch tie-breaker
    pub fn weight(self) -> i32 {
        match self {
            Self::Workout => 25,
            Self::Settings => 18,
            Self::Social => 12,
            Self::Media => 8,
            Self::Analytics => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workout => "workout",
            Self::Social => "social",
            Self::Settings => "settings",
            Self::Media => "media",
            Self::Analytics => "analytics",
        }
    }
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum connectivity an operation needs before it may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkRequirement {
    None,
    Low,
    Medium,
    High,
}

/// Discrete network quality tier reported by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Offline,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl NetworkQuality {
    /// Highest requirement this tier can serve
    pub fn max_requirement(self) -> NetworkRequirement {
        match self {
            Self::Offline => NetworkRequirement::None,
            Self::Poor => NetworkRequirement::Low,
            Self::Fair => NetworkRequirement::Medium,
            Self::Good | Self::Excellent => NetworkRequirement::High,
        }
    }
}

/// Connectivity snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub is_online: bool,
}

/// Dispatch priority class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Base score contributed by a requested priority
    pub fn base_score(self) -> i32 {
        match self {
            Self::Low => 10,
            Self::Medium => 20,
            Self::High => 30,
        }
    }

    /// One class higher, saturating at `High`
    pub fn raised(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium | Self::High => Self::High,
        }
    }
}

/// Lifecycle status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Whether `self -> next` is an edge of the lifecycle graph
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Pending)
                | (Self::Processing, Self::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure class of an execution error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Network,
    Validation,
    Auth,
    Unknown,
}

impl ErrorKind {
    /// Transient kinds are worth another attempt
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::Unknown)
    }
}

/// What the caller wants queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    pub category: OperationCategory,
    pub kind: String,
    pub payload: Vec<u8>,
    pub network_requirement: NetworkRequirement,
    pub user_initiated: bool,
    pub priority: Priority,
}

impl OperationDescriptor {
    /// Descriptor with medium priority, low network requirement and no user
    /// initiation
    pub fn new(category: OperationCategory, kind: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            category,
            kind: kind.into(),
            payload: payload.into(),
            network_requirement: NetworkRequirement::Low,
            user_initiated: false,
            priority: Priority::Medium,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_network_requirement(mut self, requirement: NetworkRequirement) -> Self {
        self.network_requirement = requirement;
        self
    }

    #[must_use]
    pub fn user_initiated(mut self, user_initiated: bool) -> Self {
        self.user_initiated = user_initiated;
        self
    }
}

/// Enqueue options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Try an out-of-band dispatch right away
    pub immediate: bool,
    /// Ids that must complete before this operation runs
    pub dependencies: Vec<String>,
    /// Overrides `QueueConfig::default_max_retries`
    pub max_retries: Option<u32>,
}

impl EnqueueOptions {
    pub fn immediate() -> Self {
        Self { immediate: true, ..Self::default() }
    }

    #[must_use]
    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(ids.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// A deferred operation as persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub category: OperationCategory,
    pub kind: String,
    pub payload: Vec<u8>,
    /// Whether `payload` went through the queue's payload codec
    #[serde(default)]
    pub encoded: bool,
    /// Payload size before encoding
    pub estimated_size: usize,
    pub network_requirement: NetworkRequirement,
    pub user_initiated: bool,
    pub requested_priority: Priority,
    pub priority: Priority,
    pub status: OperationStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default)]
    pub next_attempt_at: Option<u64>,
    #[serde(default)]
    pub processing_started_at: Option<u64>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl Operation {
    /// Fresh pending operation; the payload is stored as given
    pub fn new(
        id: String,
        descriptor: OperationDescriptor,
        max_retries: u32,
        dependencies: Vec<String>,
        now_ms: u64,
    ) -> Self {
        let estimated_size = descriptor.payload.len();
        Self {
            id,
            category: descriptor.category,
            kind: descriptor.kind,
            payload: descriptor.payload,
            encoded: false,
            estimated_size,
            network_requirement: descriptor.network_requirement,
            user_initiated: descriptor.user_initiated,
            requested_priority: descriptor.priority,
            priority: descriptor.priority,
            status: OperationStatus::Pending,
            retry_count: 0,
            max_retries,
            created_at: now_ms,
            updated_at: now_ms,
            next_attempt_at: None,
            processing_started_at: None,
            dependencies,
            last_error: None,
        }
    }

    /// Time spent in the queue so far
    pub fn age(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.created_at))
    }

    /// Pending and past any backoff deadline
    pub fn is_ready(&self, now_ms: u64) -> bool {
        self.status == OperationStatus::Pending && self.next_attempt_at.map_or(true, |at| at <= now_ms)
    }

    pub fn has_retry_budget(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Move to `next`, rejecting edges outside the lifecycle graph
    pub fn transition(&mut self, next: OperationStatus, now_ms: u64) -> QueueResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(QueueError::InvalidTransition { id: self.id.clone(), from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = now_ms;
        Ok(())
    }

    /// Raise the priority class; lower values are ignored
    pub fn raise_priority(&mut self, priority: Priority) -> bool {
        if priority > self.priority {
            self.priority = priority;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for offline_queue::types.
    use super::*;

    fn operation() -> Operation {
        let descriptor = OperationDescriptor::new(OperationCategory::Workout, "create", b"{}".to_vec());
        Operation::new("op-1".into(), descriptor, 3, Vec::new(), 1_000)
    }

    /// Validates every (from, to) pair against the lifecycle graph.
    ///
    /// Assertions:
    /// - Exactly the four documented edges are accepted.
    #[test]
    fn test_transition_edges() {
        use OperationStatus::*;
        let all = [Pending, Processing, Completed, Failed];
        let allowed = [(Pending, Processing), (Processing, Completed), (Processing, Pending), (Processing, Failed)];

        for from in all {
            for to in all {
                assert_eq!(from.can_transition_to(to), allowed.contains(&(from, to)), "{from} -> {to}");
            }
        }
    }

    /// Validates `Operation::transition` rejects illegal edges untouched.
    ///
    /// Assertions:
    /// - `pending -> completed` fails with `InvalidTransition`.
    /// - Status and `updated_at` are unchanged after the rejection.
    #[test]
    fn test_operation_transition_rejects_illegal_edge() {
        let mut op = operation();
        let err = op.transition(OperationStatus::Completed, 2_000).unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition { from: OperationStatus::Pending, .. }));
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.updated_at, 1_000);

        op.transition(OperationStatus::Processing, 2_000).unwrap();
        assert_eq!(op.updated_at, 2_000);
    }

    #[test]
    fn test_raise_priority_is_monotonic() {
        let mut op = operation();
        assert!(op.raise_priority(Priority::High));
        assert!(!op.raise_priority(Priority::Low));
        assert_eq!(op.priority, Priority::High);
    }

    #[test]
    fn test_is_ready_respects_backoff() {
        let mut op = operation();
        op.next_attempt_at = Some(5_000);
        assert!(!op.is_ready(4_999));
        assert!(op.is_ready(5_000));
    }

    #[test]
    fn test_quality_max_requirement() {
        assert_eq!(NetworkQuality::Offline.max_requirement(), NetworkRequirement::None);
        assert_eq!(NetworkQuality::Poor.max_requirement(), NetworkRequirement::Low);
        assert_eq!(NetworkQuality::Fair.max_requirement(), NetworkRequirement::Medium);
        assert_eq!(NetworkQuality::Excellent.max_requirement(), NetworkRequirement::High);
    }

    #[test]
    fn test_operation_serde_uses_lowercase_enums() {
        let json = serde_json::to_value(operation()).unwrap();
        assert_eq!(json["category"], "workout");
        assert_eq!(json["status"], "pending");
        assert_eq!(json["network_requirement"], "low");
    }
}
