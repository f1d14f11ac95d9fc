//! Testing utilities and helpers
//!
//! - **[`time`]**: injectable clocks so time-dependent queue behaviour
//!   (backoff deadlines, age boosts, retention) can be tested without sleeping

pub mod time;

pub use time::{Clock, MockClock, SystemClock};
