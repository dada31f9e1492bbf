//! Resilient call wrapper
//!
//! Runs a single gateway operation with a bounded number of attempts and a
//! jittered pause between them. Only errors that report themselves as
//! retryable are repeated; everything else fails on the first attempt.
//!
//! Order placement goes through this wrapper as well. A timeout after the
//! exchange already accepted an order will be retried and can submit a
//! duplicate: no idempotency key is attached to orders.

use crate::config::RetryConfig;
use crate::exchange::ExchangeError;
use crate::telemetry::{increment, CounterMetric};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

/// Errors that know whether repeating the call may help
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ExchangeError {
    fn is_retryable(&self) -> bool {
        ExchangeError::is_retryable(self)
    }
}

/// Failure of a wrapped operation
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error
    #[error("{operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: E,
    },
    /// The operation failed with an error that is not worth repeating
    #[error("{operation} failed: {source}")]
    NotRetryable {
        operation: String,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// The last error returned by the operation
    pub fn last_error(&self) -> &E {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::NotRetryable { source, .. } => {
                source
            }
        }
    }

    pub fn operation(&self) -> &str {
        match self {
            RetryError::Exhausted { operation, .. } | RetryError::NotRetryable { operation, .. } => {
                operation
            }
        }
    }
}

/// Retry count and backoff policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_retries: u32,
    /// Fixed part of the pause between attempts
    pub base_delay: Duration,
    /// Upper bound of the uniform random addition to `base_delay`
    pub jitter_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(5),
            jitter_max: Duration::from_secs(2),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, jitter_max: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            jitter_max,
        }
    }

    /// Pause before the next attempt: `base_delay + U(0, jitter_max)`
    pub fn backoff(&self) -> Duration {
        let jitter_ms = self.jitter_max.as_millis() as u64;
        if jitter_ms == 0 {
            return self.base_delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        self.base_delay + Duration::from_millis(jitter)
    }

    /// Run `f` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent
    pub async fn call<T, E, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match f().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !error.is_retryable() {
                tracing::error!(operation, error = %error, "Operation failed with non-retryable error");
                return Err(RetryError::NotRetryable {
                    operation: operation.to_string(),
                    source: error,
                });
            }

            if attempt >= max_attempts {
                tracing::error!(
                    operation,
                    attempts = attempt,
                    error = %error,
                    "Maximum retry attempts reached"
                );
                return Err(RetryError::Exhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            let wait = self.backoff();
            tracing::warn!(
                operation,
                attempt,
                max_attempts,
                wait_ms = wait.as_millis() as u64,
                error = %error,
                "Retrying after error"
            );
            increment(CounterMetric::Retry);
            sleep(wait).await;
        }
    }
}
