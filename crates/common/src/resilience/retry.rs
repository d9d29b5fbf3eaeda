//! Generic retry executor
//!
//! Runs an async operation up to `max_attempts` times, sleeping between
//! attempts according to a [`BackoffStrategy`]. A [`RetryPolicy`] decides
//! which errors are worth another attempt. When attempts run out the last
//! error is handed back unchanged inside [`RetryError`], so callers can
//! surface exactly what the final attempt saw.
//!
//! An optional total budget bounds the whole sequence: every attempt runs
//! against the same deadline instead of getting a fresh one.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Why a retried operation ultimately failed
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("All {attempts} attempts failed, last error: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The policy refused to retry this error
    #[error("Operation failed with non-retryable error: {error}")]
    NonRetryable { attempts: u32, error: E },

    /// The shared budget ran out before an attempt succeeded
    #[error("Retry budget exceeded after {elapsed:?} ({attempts} attempts)")]
    BudgetExceeded { attempts: u32, elapsed: Duration, last: Option<E> },
}

impl<E> RetryError<E> {
    /// Number of attempts that were started
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::NonRetryable { attempts, .. }
            | Self::BudgetExceeded { attempts, .. } => *attempts,
        }
    }

    /// The error returned by the final completed attempt
    pub fn into_last_error(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } | Self::NonRetryable { error: last, .. } => Some(last),
            Self::BudgetExceeded { last, .. } => last,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Invalid [`RetryConfig`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid retry configuration: {message}")]
pub struct RetryConfigError {
    pub message: String,
}

/// Decides whether an error should be retried
pub trait RetryPolicy<E> {
    /// `attempt` is the 1-indexed number of the attempt that just failed
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the backoff delay
    Retry,
    /// Retry after a caller-chosen delay
    RetryAfter(Duration),
    Stop,
}

/// Delay schedule between attempts
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed(Duration),
    /// `base * n` before the n-th retry
    Linear { base: Duration },
    /// `initial * factor^(n-1)` before the n-th retry, capped at `max_delay`
    Exponential { initial: Duration, factor: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Delay before the given retry (1-indexed)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        match self {
            Self::Fixed(delay) => *delay,
            Self::Linear { base } => base.saturating_mul(retry),
            Self::Exponential { initial, factor, max_delay } => {
                let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
                #[allow(clippy::cast_precision_loss)]
                let scaled_ms = initial.as_millis() as f64 * factor.powi(exponent);
                #[allow(clippy::cast_precision_loss)]
                let cap_ms = max_delay.as_millis() as f64;
                if scaled_ms.is_finite() && scaled_ms < cap_ms {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    Duration::from_millis(scaled_ms.round() as u64)
                } else {
                    *max_delay
                }
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    /// Budget shared by all attempts and delays (None = attempts only)
    pub max_total_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Linear { base: Duration::from_secs(1) },
            max_total_time: None,
        }
    }
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if self.max_attempts == 0 {
            return Err(RetryConfigError {
                message: "max_attempts must be greater than 0".to_string(),
            });
        }
        if let BackoffStrategy::Exponential { factor, .. } = &self.backoff {
            if *factor < 1.0 {
                return Err(RetryConfigError {
                    message: "exponential factor must be at least 1.0".to_string(),
                });
            }
        }
        if self.max_total_time.is_some_and(|budget| budget.is_zero()) {
            return Err(RetryConfigError {
                message: "max_total_time must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn linear_backoff(mut self, base: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Linear { base };
        self
    }

    pub fn exponential_backoff(mut self, initial: Duration, factor: f64, max_delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial, factor, max_delay };
        self
    }

    pub fn max_total_time(mut self, budget: Duration) -> Self {
        self.config.max_total_time = Some(budget);
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Runs operations under a [`RetryConfig`] and a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute `operation` until it succeeds, the policy stops, attempts run
    /// out, or the budget is spent.
    ///
    /// `operation` receives the 1-indexed attempt number.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let deadline = self.config.max_total_time.map(|budget| started + budget);
        let mut attempt = 0_u32;
        let mut last_error: Option<E> = None;

        loop {
            attempt += 1;
            debug!(attempt, max_attempts = self.config.max_attempts, "executing attempt");

            let result = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, operation(attempt)).await {
                    Ok(result) => result,
                    Err(_) => {
                        let elapsed = started.elapsed();
                        warn!(attempt, ?elapsed, "retry budget exceeded during attempt");
                        return Err(RetryError::BudgetExceeded {
                            attempts: attempt,
                            elapsed,
                            last: last_error,
                        });
                    }
                },
                None => operation(attempt).await,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(attempt, %error, "retry policy declined to retry");
                    return Err(RetryError::NonRetryable { attempts: attempt, error });
                }
                RetryDecision::Retry => self.config.backoff.delay_for_retry(attempt),
                RetryDecision::RetryAfter(delay) => delay,
            };

            if attempt >= self.config.max_attempts {
                warn!(attempts = attempt, %error, "all retry attempts exhausted");
                return Err(RetryError::Exhausted { attempts: attempt, last: error });
            }

            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    let elapsed = started.elapsed();
                    warn!(attempt, ?elapsed, ?delay, "retry budget cannot cover next backoff");
                    return Err(RetryError::BudgetExceeded {
                        attempts: attempt,
                        elapsed,
                        last: Some(error),
                    });
                }
            }

            warn!(attempt, ?delay, %error, "attempt failed, retrying after backoff");
            last_error = Some(error);
            tokio::time::sleep(delay).await;
        }
    }
}

/// Pre-defined retry policies
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Retries on any error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Retries while the predicate holds
    #[derive(Debug, Clone)]
    pub struct PredicateRetry<F> {
        predicate: F,
    }

    impl<F> PredicateRetry<F> {
        pub const fn new(predicate: F) -> Self {
            Self { predicate }
        }
    }

    impl<F, E> RetryPolicy<E> for PredicateRetry<F>
    where
        F: Fn(&E) -> bool,
    {
        fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
            if (self.predicate)(error) {
                RetryDecision::Retry
            } else {
                RetryDecision::Stop
            }
        }
    }
}
