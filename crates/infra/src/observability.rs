//! Tracing subscriber setup
//!
//! Libraries in this workspace only emit `tracing` events; the host
//! application installs a subscriber once at startup with [`init_tracing`].
//! `RUST_LOG` takes precedence over the configured level.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::errors::{InfraError, InfraResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `repsync_core=debug,info`
    pub level: String,
    pub format: LogFormat,
    /// Include file and line of each event
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Plain, include_location: false }
    }
}

impl LoggingConfig {
    /// Filter from `RUST_LOG`, falling back to `level`
    pub fn env_filter(&self) -> InfraResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level)
                .map_err(|e| InfraError::config(format!("Invalid log level '{}': {e}", self.level))),
        }
    }
}

/// Install the global subscriber
///
/// # Errors
/// Returns `InfraError::Config` for an unparseable level and
/// `InfraError::Tracing` if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> InfraResult<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let result = match config.format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Plain => builder.with_target(false).try_init(),
    };
    result.map_err(|e| InfraError::Tracing(e.to_string()))?;

    tracing::debug!(level = %config.level, format = ?config.format, "Tracing initialized");
    Ok(())
}
