//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::time::Duration;

use repsync_infra::config;
use repsync_infra::{InfraError, LogFormat};
use tempfile::TempDir;

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "queue": {
            "max_concurrent_operations": 4,
            "network_aware_processing": false,
            "max_queue_size": 250,
            "retention_period": 3600000,
            "compression_enabled": false
        },
        "logging": {
            "level": "debug",
            "format": "json"
        }
    }"#;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("repsync.json");
    std::fs::write(&path, json_content).expect("Failed to write config file");

    let config = config::load_from_file(Some(path)).expect("JSON config should load");

    assert_eq!(config.queue.max_concurrent_operations, 4);
    assert!(!config.queue.network_aware_processing);
    assert_eq!(config.queue.max_queue_size, 250);
    assert_eq!(config.queue.retention_period, Duration::from_secs(3600));
    assert!(!config.queue.compression_enabled);
    // Unspecified fields keep their defaults
    assert_eq!(config.queue.default_max_retries, 3);

    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
[queue]
max_concurrent_operations = 2
priority_boost_threshold = 120000
base_retry_delay = 500
max_retry_delay = 30000

[logging]
level = "repsync_core=trace,info"
"#;

    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("repsync.toml");
    std::fs::write(&path, toml_content).expect("Failed to write config file");

    let config = config::load_from_file(Some(path)).expect("TOML config should load");

    assert_eq!(config.queue.max_concurrent_operations, 2);
    assert_eq!(config.queue.priority_boost_threshold, Duration::from_secs(120));
    assert_eq!(config.queue.base_retry_delay, Duration::from_millis(500));
    assert_eq!(config.queue.max_retry_delay, Duration::from_secs(30));
    assert_eq!(config.logging.level, "repsync_core=trace,info");
    assert_eq!(config.logging.format, LogFormat::Plain);
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let result = config::load_from_file(Some(dir.path().join("absent.toml")));

    assert!(matches!(result, Err(InfraError::Config(ref m)) if m.contains("not found")));
}

#[test]
fn test_invalid_values_fail_validation() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("repsync.toml");
    std::fs::write(&path, "[queue]\nmax_queue_size = 0\n").expect("Failed to write config file");

    let result = config::load_from_file(Some(path));

    assert!(matches!(result, Err(InfraError::Config(ref m)) if m.contains("max_queue_size")));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("repsync.toml");
    std::fs::write(&path, "[queue\nmax_queue_size = ").expect("Failed to write config file");

    let result = config::load_from_file(Some(path));

    assert!(matches!(result, Err(InfraError::Config(ref m)) if m.contains("TOML")));
}
