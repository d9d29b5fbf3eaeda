//! Async testing utilities
//!
//! Both helpers measure time with `tokio::time`, so they behave the same
//! under `#[tokio::test(start_paused = true)]`.

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::time::Duration;

/// Wait for a future to complete with a timeout, returning a Result
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use footsteps_common::testing::async_utils::timeout_ok;
///
/// #[tokio::test]
/// async fn completes_quickly() {
///     let value = timeout_ok(Duration::from_millis(100), async { 42 }).await;
///     assert_eq!(value.unwrap(), 42);
/// }
/// ```
pub async fn timeout_ok<F, T>(duration: Duration, fut: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut).await
}

/// Poll a condition until it returns true or the timeout elapses
///
/// Returns whether the condition was met.
pub async fn poll_until<F>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
