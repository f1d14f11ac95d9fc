//! Configuration loading
//!
//! Loads [`RepSyncConfig`] from environment variables and files.

pub mod loader;

use repsync_core::QueueConfig;
use serde::{Deserialize, Serialize};

use crate::observability::LoggingConfig;

pub use loader::{load, load_from_env, load_from_env_with, load_from_file, probe_config_paths};

/// Top-level configuration document
///
/// ```toml
/// [queue]
/// max_concurrent_operations = 3
/// retention_period = 86400000
///
/// [logging]
/// level = "info"
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepSyncConfig {
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
}
