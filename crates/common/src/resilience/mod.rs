//! Resilience primitives shared by the queue engine
//!
//! - **[`backoff`]**: exponential backoff with bounded jitter, used for
//!   per-operation retry delays and for scheduler loop error recovery

pub mod backoff;

pub use backoff::ExponentialBackoff;
