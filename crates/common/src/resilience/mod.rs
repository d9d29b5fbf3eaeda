//! Resilience patterns for transient failures
//!
//! - **Retry**: bounded attempts with fixed, linear or exponential backoff,
//!   an optional total budget shared by all attempts, and a pluggable
//!   [`RetryPolicy`] deciding which errors deserve another attempt.
//!
//! The executor is generic over the operation's error type and hands the
//! final error back unchanged, so domain layers keep their own taxonomy.

pub mod retry;

pub use retry::{
    policies, BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryConfigError, RetryDecision,
    RetryError, RetryExecutor, RetryPolicy, RetryResult,
};
