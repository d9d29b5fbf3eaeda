//! Integration tests for the retry executor
//!
//! Runs under paused Tokio time so backoff sleeps complete instantly while
//! elapsed time stays observable.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use footsteps_common::resilience::policies::PredicateRetry;
use footsteps_common::resilience::{RetryConfig, RetryError, RetryExecutor, RetryPolicy, RetryResult};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchError {
    Offline(u32),
    Rejected(u16),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offline(attempt) => write!(f, "offline on attempt {attempt}"),
            Self::Rejected(status) => write!(f, "rejected with {status}"),
        }
    }
}

fn offline_only() -> impl RetryPolicy<FetchError> {
    PredicateRetry::new(|error: &FetchError| matches!(error, FetchError::Offline(_)))
}

fn linear(max_attempts: u32, base: Duration) -> RetryConfig {
    RetryConfig::builder().max_attempts(max_attempts).linear_backoff(base).build().unwrap()
}

/// Validates that exhaustion hands back the final attempt's error untouched.
///
/// Assertions:
/// - Confirms the error is from attempt 3, not an earlier one.
/// - Confirms waits of 1s then 2s elapsed between attempts.
#[tokio::test(start_paused = true)]
async fn test_exhaustion_returns_last_error_unchanged() {
    let executor = RetryExecutor::new(linear(3, Duration::from_secs(1)), offline_only());
    let started = Instant::now();

    let result: Result<(), _> =
        executor.execute(|attempt| async move { Err(FetchError::Offline(attempt)) }).await;

    match result {
        Err(RetryError::Exhausted { attempts, last }) => {
            assert_eq!(attempts, 3);
            assert_eq!(last, FetchError::Offline(3));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_policy_stop_skips_remaining_attempts() {
    let executor = RetryExecutor::new(linear(5, Duration::from_millis(100)), offline_only());
    let calls = Arc::new(AtomicU32::new(0));

    let result: Result<(), _> = executor
        .execute(|_| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Rejected(500))
            }
        })
        .await;

    assert!(matches!(result, Err(RetryError::NonRetryable { attempts: 1, .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Validates that one budget bounds every attempt of a sequence.
///
/// Assertions:
/// - Confirms the executor stops before a backoff would cross the budget.
/// - Confirms the last error is still reported.
#[tokio::test(start_paused = true)]
async fn test_shared_budget_stops_before_overrun() {
    let config = RetryConfig::builder()
        .max_attempts(10)
        .linear_backoff(Duration::from_millis(400))
        .max_total_time(Duration::from_secs(1))
        .build()
        .unwrap();
    let executor = RetryExecutor::new(config, offline_only());

    let result: Result<(), _> =
        executor.execute(|attempt| async move { Err(FetchError::Offline(attempt)) }).await;

    let err = result.unwrap_err();
    assert!(matches!(err, RetryError::BudgetExceeded { .. }));
    // 400ms after attempt 1, then 800ms would cross the 1s budget
    assert_eq!(err.attempts(), 2);
    assert_eq!(err.into_last_error(), Some(FetchError::Offline(2)));
}

#[tokio::test(start_paused = true)]
async fn test_slow_attempt_is_cut_by_budget() {
    let config = RetryConfig::builder()
        .max_attempts(3)
        .fixed_backoff(Duration::from_millis(10))
        .max_total_time(Duration::from_millis(500))
        .build()
        .unwrap();
    let executor = RetryExecutor::new(config, offline_only());

    let result: RetryResult<(), FetchError> = executor
        .execute(|_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

    match result {
        Err(RetryError::BudgetExceeded { attempts, elapsed, last }) => {
            assert_eq!(attempts, 1);
            assert!(elapsed >= Duration::from_millis(500));
            assert_eq!(last, None);
        }
        other => panic!("expected the budget to cut the attempt, got {other:?}"),
    }
}
