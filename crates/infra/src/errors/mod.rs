//! Infrastructure error type
//!
//! Adapters report `InfraError` internally and convert into the core's
//! [`QueueError`] at the port boundary.

mod conversions;

use std::path::PathBuf;

use repsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use repsync_common::{impl_error_classification, impl_error_conversion};
use repsync_core::QueueError;
use thiserror::Error;

pub type InfraResult<T> = Result<T, InfraError>;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid operation id for file storage: {0}")]
    InvalidId(String),

    #[error("Failed to install tracing subscriber: {0}")]
    Tracing(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl InfraError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl_error_conversion!(InfraError, Common);

impl_error_classification!(InfraError, Common,
    InfraError::Io { source, .. } => {
        retryable: matches!(
            source.kind(),
            std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ),
        severity: ErrorSeverity::Error,
        critical: false,
    },
    InfraError::Config(_) => {
        retryable: false,
        severity: ErrorSeverity::Critical,
        critical: true,
    },
    InfraError::InvalidId(_) => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    InfraError::Tracing(_) => {
        retryable: false,
        severity: ErrorSeverity::Warning,
        critical: false,
    },
    InfraError::Queue(inner) => {
        retryable: inner.is_retryable(),
        severity: inner.severity(),
        critical: inner.is_critical(),
    },
);
