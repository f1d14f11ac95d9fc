//! Common utilities shared across the repsync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors and serde helpers
//! - `runtime`: backoff, compression and injectable clocks
//! - `observability`: tracing (pulled in by `runtime`)
//! - `test-utils`: testing helpers for downstream test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
#[macro_use]
pub mod error;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod compression;
#[cfg(feature = "runtime")]
pub mod resilience;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "runtime", feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use compression::{CompressionAlgorithm, CompressionService};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use resilience::ExponentialBackoff;
#[cfg(any(feature = "runtime", feature = "test-utils", test))]
pub use testing::{Clock, MockClock, SystemClock};
#[cfg(feature = "foundation")]
pub use utils::serde::duration_millis;
