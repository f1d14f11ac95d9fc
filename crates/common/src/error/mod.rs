//! Common error types shared by the repsync crates
//!
//! Module-specific errors compose with [`CommonError`] for the failures every
//! layer shares (serialization, persistence, timeouts, bad input):
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! pub enum StoreError {
//!     #[error("Record is corrupt: {0}")]
//!     Corrupt(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//!
//! impl_error_conversion!(StoreError, Common);
//! impl_error_classification!(StoreError, Common,
//!     Self::Corrupt(_) => {
//!         retryable: false,
//!         severity: ErrorSeverity::Error,
//!         critical: true,
//!     }
//! );
//! ```
//!
//! Every error type implements [`ErrorClassification`] so that retry loops,
//! logging and alerting can treat errors uniformly.

use std::fmt;
use std::time::Duration;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Failures shared by the queue engine and its adapters
#[derive(Debug, Clone)]
pub enum CommonError {
    /// Encoding or decoding a payload or record
    Serialization { format: String, message: String },

    /// Store I/O
    Persistence { message: String, operation: Option<String> },

    Timeout { operation: String, duration: Duration },

    /// Rejected input
    Validation { field: String, message: String },

    /// Broken internal invariant
    Internal { message: String, context: Option<String> },
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization { format, message } => write!(f, "Serialization error ({format}): {message}"),
            Self::Persistence { message, operation: Some(op) } => {
                write!(f, "Persistence error during '{op}': {message}")
            }
            Self::Persistence { message, operation: None } => write!(f, "Persistence error: {message}"),
            Self::Timeout { operation, duration } => {
                write!(f, "Operation '{operation}' timed out after {duration:?}")
            }
            Self::Validation { field, message } => write!(f, "Validation error for field '{field}': {message}"),
            Self::Internal { message, context: Some(ctx) } => write!(f, "Internal error in '{ctx}': {message}"),
            Self::Internal { message, context: None } => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for CommonError {}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Persistence { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::Internal { .. } => ErrorSeverity::Critical,
            Self::Serialization { .. } | Self::Persistence { .. } | Self::Validation { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl CommonError {
    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { format: format.into(), message: message.into() }
    }

    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Persistence error tagged with the store operation that failed
    pub fn persistence_op<O: Into<String>, S: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), context: None }
    }

    pub fn internal_with_context<S: Into<String>, C: Into<String>>(message: S, context: C) -> Self {
        Self::Internal { message: message.into(), context: Some(context.into()) }
    }
}

/// Error classification trait for consistent error handling across modules
pub trait ErrorClassification {
    /// Whether the failed operation may succeed if attempted again
    fn is_retryable(&self) -> bool;

    /// Severity used for logging and alerting
    fn severity(&self) -> ErrorSeverity;

    /// Whether the error signals a broken invariant or data integrity problem
    fn is_critical(&self) -> bool;

    /// Suggested delay before retrying, when the error carries one
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

/// Implements `From<serde_json::Error>` and `From<std::io::Error>` for a
/// module error that embeds [`CommonError`] in the given variant.
#[macro_export]
macro_rules! impl_error_conversion {
    ($error_type:ty, $variant:ident) => {
        impl From<serde_json::Error> for $error_type {
            fn from(err: serde_json::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }

        impl From<std::io::Error> for $error_type {
            fn from(err: std::io::Error) -> Self {
                Self::$variant($crate::error::CommonError::from(err))
            }
        }
    };
}

/// Implements [`ErrorClassification`] for a module error, delegating the
/// embedded [`CommonError`] variant and classifying the rest inline.
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(, retry_after: $retry_after:expr)?
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_retryable(e),
                    $(
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::severity(e),
                    $(
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::is_critical(e),
                    $(
                        $variant => $critical,
                    )*
                }
            }

            fn retry_after(&self) -> Option<std::time::Duration> {
                match self {
                    Self::$common_variant(e) => $crate::error::ErrorClassification::retry_after(e),
                    $(
                        $(
                            $variant => $retry_after,
                        )?
                    )*
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}
