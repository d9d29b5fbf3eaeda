//! Retry wiring for transport calls
//!
//! Only network failures are retried. HTTP error responses go straight back
//! to the caller (or to the auth coordinator) on the first attempt.

use footsteps_common::resilience::{RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy};
use footsteps_domain::{RequestError, RequestLayerConfig};

/// Retries [`RequestError::Network`] and nothing else
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkFailuresOnly;

impl RetryPolicy<RequestError> for NetworkFailuresOnly {
    fn should_retry(&self, error: &RequestError, _attempt: u32) -> RetryDecision {
        if error.is_network() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Executor with linear backoff: the wait after failed attempt `n` is
/// `base_retry_delay * n`
pub fn retry_executor(config: &RequestLayerConfig) -> Result<RetryExecutor<NetworkFailuresOnly>, RequestError> {
    let mut builder = RetryConfig::builder()
        .max_attempts(config.max_retry_attempts)
        .linear_backoff(config.base_retry_delay);
    if let Some(budget) = config.retry_budget {
        builder = builder.max_total_time(budget);
    }
    let retry = builder.build().map_err(|err| RequestError::config(err.to_string()))?;
    Ok(RetryExecutor::new(retry, NetworkFailuresOnly))
}

/// The error the final attempt produced, unchanged
pub fn last_error(error: RetryError<RequestError>) -> RequestError {
    match error {
        RetryError::BudgetExceeded { last: None, elapsed, attempts } => RequestError::network(format!(
            "retry budget exhausted after {elapsed:?} and {attempts} attempt(s) without a response"
        )),
        other => other
            .into_last_error()
            .unwrap_or_else(|| RequestError::network("retry ended without an error")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use footsteps_domain::ApiResponse;

    use super::*;

    #[test]
    fn only_network_failures_retry() {
        let policy = NetworkFailuresOnly;
        let http = RequestError::Http { status: 503, response: ApiResponse::new(503, "") };

        assert_eq!(policy.should_retry(&RequestError::network("reset"), 1), RetryDecision::Retry);
        assert_eq!(policy.should_retry(&http, 1), RetryDecision::Stop);
    }

    #[test]
    fn executor_follows_config() {
        let config = RequestLayerConfig {
            max_retry_attempts: 4,
            base_retry_delay: Duration::from_millis(250),
            ..Default::default()
        };
        let executor = retry_executor(&config).unwrap();

        assert_eq!(executor.config().max_attempts, 4);
        assert_eq!(executor.config().backoff.delay_for_retry(2), Duration::from_millis(500));
    }

    #[test]
    fn last_error_is_passed_through() {
        let reset = RequestError::network("connection reset");
        let exhausted = RetryError::Exhausted { attempts: 3, last: reset.clone() };
        assert_eq!(last_error(exhausted), reset);
    }

    #[test]
    fn budget_without_response_is_a_network_error() {
        let error = RetryError::BudgetExceeded {
            attempts: 1,
            elapsed: Duration::from_secs(5),
            last: None,
        };
        assert!(last_error(error).is_network());
    }
}
