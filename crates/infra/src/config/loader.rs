//! Configuration loader
//!
//! ## Loading Strategy
//! 1. If any `REPSYNC_*` variable is set, build the config from defaults plus
//!    those variables
//! 2. Otherwise load from a file, probing the standard locations
//! 3. Supports JSON and TOML formats
//!
//! Every loaded config is validated before it is returned.
//!
//! ## Environment Variables
//! - `REPSYNC_MAX_CONCURRENT_OPERATIONS`
//! - `REPSYNC_NETWORK_AWARE_PROCESSING` (true/false)
//! - `REPSYNC_PRIORITY_BOOST_THRESHOLD_MS`
//! - `REPSYNC_MAX_QUEUE_SIZE`
//! - `REPSYNC_COMPRESSION_ENABLED` (true/false)
//! - `REPSYNC_COMPRESSION_LEVEL`
//! - `REPSYNC_RETENTION_PERIOD_MS`
//! - `REPSYNC_DEFAULT_MAX_RETRIES`
//! - `REPSYNC_LOG_LEVEL`
//! - `REPSYNC_LOG_FORMAT` (`plain` or `json`)
//!
//! ## File Locations
//! Probed in order, first match wins:
//! 1. `./repsync.toml`, `./repsync.json` (current working directory)
//! 2. `../repsync.toml`, `../repsync.json`
//! 3. Next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::RepSyncConfig;
use crate::errors::{InfraError, InfraResult};
use crate::observability::LogFormat;

const FILE_STEM: &str = "repsync";

/// Load configuration, preferring environment variables over files
///
/// Falls back to defaults when neither source is present.
///
/// # Errors
/// Returns `InfraError::Config` if a present source is malformed or the
/// result fails validation.
pub fn load() -> InfraResult<RepSyncConfig> {
    if let Some(config) = load_from_env()? {
        tracing::info!("Configuration loaded from environment variables");
        return Ok(config);
    }

    match probe_config_paths() {
        Some(path) => load_from_file(Some(path)),
        None => {
            tracing::debug!("No configuration source found, using defaults");
            Ok(RepSyncConfig::default())
        }
    }
}

/// Load configuration from the process environment
///
/// Returns `Ok(None)` when no `REPSYNC_*` variable is set.
pub fn load_from_env() -> InfraResult<Option<RepSyncConfig>> {
    load_from_env_with(|key| std::env::var(key).ok())
}

/// Load configuration from an arbitrary variable lookup
pub fn load_from_env_with<F>(lookup: F) -> InfraResult<Option<RepSyncConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = RepSyncConfig::default();
    let mut found = false;
    let mut var = |key: &str| {
        let value = lookup(key);
        found |= value.is_some();
        value
    };

    if let Some(v) = var("REPSYNC_MAX_CONCURRENT_OPERATIONS") {
        config.queue.max_concurrent_operations = parse("REPSYNC_MAX_CONCURRENT_OPERATIONS", &v)?;
    }
    if let Some(v) = var("REPSYNC_NETWORK_AWARE_PROCESSING") {
        config.queue.network_aware_processing = parse_bool(&v);
    }
    if let Some(v) = var("REPSYNC_PRIORITY_BOOST_THRESHOLD_MS") {
        config.queue.priority_boost_threshold =
            Duration::from_millis(parse("REPSYNC_PRIORITY_BOOST_THRESHOLD_MS", &v)?);
    }
    if let Some(v) = var("REPSYNC_MAX_QUEUE_SIZE") {
        config.queue.max_queue_size = parse("REPSYNC_MAX_QUEUE_SIZE", &v)?;
    }
    if let Some(v) = var("REPSYNC_COMPRESSION_ENABLED") {
        config.queue.compression_enabled = parse_bool(&v);
    }
    if let Some(v) = var("REPSYNC_COMPRESSION_LEVEL") {
        config.queue.compression_level = parse("REPSYNC_COMPRESSION_LEVEL", &v)?;
    }
    if let Some(v) = var("REPSYNC_RETENTION_PERIOD_MS") {
        config.queue.retention_period = Duration::from_millis(parse("REPSYNC_RETENTION_PERIOD_MS", &v)?);
    }
    if let Some(v) = var("REPSYNC_DEFAULT_MAX_RETRIES") {
        config.queue.default_max_retries = parse("REPSYNC_DEFAULT_MAX_RETRIES", &v)?;
    }
    if let Some(v) = var("REPSYNC_LOG_LEVEL") {
        config.logging.level = v;
    }
    if let Some(v) = var("REPSYNC_LOG_FORMAT") {
        config.logging.format = match v.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "plain" | "text" => LogFormat::Plain,
            other => return Err(InfraError::config(format!("Invalid REPSYNC_LOG_FORMAT: {other}"))),
        };
    }

    if !found {
        return Ok(None);
    }
    validate(&config)?;
    Ok(Some(config))
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// extension.
///
/// # Errors
/// Returns `InfraError::Config` if the file is missing, malformed or
/// invalid.
pub fn load_from_file(path: Option<PathBuf>) -> InfraResult<RepSyncConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(InfraError::config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths()
            .ok_or_else(|| InfraError::config("No config file found in any of the standard locations"))?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| InfraError::io(&config_path, e))?;
    let config = parse_config(&contents, &config_path)?;
    validate(&config)?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> InfraResult<RepSyncConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents)?),
        "json" => serde_json::from_str(contents)
            .map_err(|e| InfraError::config(format!("Invalid JSON format: {e}"))),
        _ => Err(InfraError::config(format!("Unsupported config format: {extension}"))),
    }
}

fn validate(config: &RepSyncConfig) -> InfraResult<()> {
    config.queue.validate().map_err(|e| InfraError::config(e.to_string()))
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        dirs.push(exe_dir);
    }

    dirs.into_iter()
        .flat_map(|dir| ["toml", "json"].map(|ext| dir.join(format!("{FILE_STEM}.{ext}"))))
        .find(|path| path.exists())
}

fn parse<T>(key: &str, value: &str) -> InfraResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| InfraError::config(format!("Invalid {key}: {e}")))
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
