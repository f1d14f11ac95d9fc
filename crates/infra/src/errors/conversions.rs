//! Conversions between infrastructure errors and the core queue error.

use repsync_common::error::CommonError;
use repsync_core::QueueError;

use super::InfraError;

impl From<InfraError> for QueueError {
    fn from(value: InfraError) -> Self {
        match value {
            InfraError::Common(e) => QueueError::Common(e),
            InfraError::Io { path, source } => QueueError::Common(CommonError::persistence_op(
                "file",
                format!("{}: {source}", path.display()),
            )),
            InfraError::Config(message) => QueueError::InvalidConfig(message),
            InfraError::InvalidId(id) => {
                QueueError::Common(CommonError::validation("id", format!("not usable as a file name: {id}")))
            }
            InfraError::Tracing(message) => QueueError::Common(CommonError::internal(message)),
            InfraError::Queue(inner) => inner,
        }
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(err: toml::de::Error) -> Self {
        InfraError::Config(format!("Invalid TOML format: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::PathBuf;

    use repsync_common::error::ErrorClassification;

    use super::*;

    #[test]
    fn test_io_error_maps_to_persistence() {
        let err = InfraError::io(PathBuf::from("/tmp/queue/op.json"), io::Error::other("disk full"));
        let queue_err = QueueError::from(err);

        assert!(matches!(queue_err, QueueError::Common(CommonError::Persistence { .. })));
        assert!(queue_err.to_string().contains("disk full"));
    }

    #[test]
    fn test_config_error_maps_to_invalid_config() {
        let queue_err = QueueError::from(InfraError::config("max_queue_size must be greater than 0"));
        assert!(matches!(queue_err, QueueError::InvalidConfig(ref m) if m.contains("max_queue_size")));
    }

    #[test]
    fn test_interrupted_io_is_retryable() {
        let err = InfraError::io("/tmp/x", io::Error::from(io::ErrorKind::Interrupted));
        assert!(err.is_retryable());
        assert!(!InfraError::config("bad").is_retryable());
    }
}
