//! Testing utilities and helpers
//!
//! - **[`async_utils`]**: polling and timeout helpers for async tests
//!
//! Clock mocking lives in [`crate::time::MockClock`] and is re-exported here
//! for convenience.

pub mod async_utils;

pub use async_utils::{poll_until, timeout_ok};

pub use crate::time::{Clock, MockClock, SystemClock};
