//! # RepSync Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - A file-backed `PersistentStore`
//! - Configuration loading from environment variables and files
//! - Tracing subscriber setup
//!
//! ## Architecture
//! - Implements traits defined in `repsync-core`
//! - Contains all "impure" code (filesystem, process environment)

pub mod config;
pub mod errors;
pub mod observability;
pub mod storage;

pub use config::{load as load_config, RepSyncConfig};
pub use errors::{InfraError, InfraResult};
pub use observability::{init_tracing, LogFormat, LoggingConfig};
pub use storage::FileOperationStore;
