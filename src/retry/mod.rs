//! Policy-driven retry with backoff.
//!
//! Attempt 1 runs immediately. After a failed attempt `n` the coordinator
//! either surfaces the error (non-retryable status) or sleeps
//! [`backoff_delay`]`(n)` and tries again, until the policy's attempt budget
//! is spent.

use std::time::Duration;

use crate::error::IntegrationError;
use crate::executor::{RequestExecutor, RequestOptions, ResponseEnvelope};
use crate::registry::{BackoffStrategy, Endpoint, RetryPolicy};

/// Delay to wait after failed attempt `attempt` (1-based).
///
/// - exponential: `base × 2^(attempt − 1)`
/// - linear: `base × attempt`
/// - fixed: `base`
///
/// The result is clamped to `max_delay` when set.
///
/// # Examples
///
/// ```
/// use conduit::registry::{BackoffStrategy, RetryPolicy};
/// use conduit::retry::backoff_delay;
/// use std::time::Duration;
///
/// let policy = RetryPolicy {
///     max_attempts: 4,
///     backoff_strategy: BackoffStrategy::Exponential,
///     base_delay: 100,
///     max_delay: None,
///     retryable_status_codes: vec![503],
/// };
/// let delays: Vec<Duration> = (1..4).map(|n| backoff_delay(&policy, n)).collect();
/// assert_eq!(
///     delays,
///     vec![Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(400)]
/// );
/// ```
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let delay_ms = match policy.backoff_strategy {
        BackoffStrategy::Exponential => {
            let factor = 2u64.saturating_pow(attempt - 1);
            policy.base_delay.saturating_mul(factor)
        }
        BackoffStrategy::Linear => policy.base_delay.saturating_mul(attempt as u64),
        BackoffStrategy::Fixed => policy.base_delay,
    };

    let capped = match policy.max_delay {
        Some(max) => delay_ms.min(max),
        None => delay_ms,
    };
    Duration::from_millis(capped)
}

/// Wraps a [`RequestExecutor`] with a bounded re-attempt loop.
#[derive(Debug, Clone)]
pub struct RetryCoordinator {
    executor: RequestExecutor,
}

impl RetryCoordinator {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Execute with the endpoint's effective policy, or once without one.
    pub async fn execute(
        &self,
        endpoint: &Endpoint,
        options: &RequestOptions,
    ) -> Result<ResponseEnvelope, IntegrationError> {
        match endpoint.effective_retry_policy() {
            Some(policy) => self.execute_with_retry(endpoint, &policy, options).await,
            None => self.executor.execute(endpoint, options).await,
        }
    }

    /// Execute under `policy`.
    ///
    /// # Errors
    ///
    /// - the original error when its status code is not retryable, or when it
    ///   can never succeed on another attempt (auth, invalid request)
    /// - `RetryExhausted` once `max_attempts` retryable failures occurred
    pub async fn execute_with_retry(
        &self,
        endpoint: &Endpoint,
        policy: &RetryPolicy,
        options: &RequestOptions,
    ) -> Result<ResponseEnvelope, IntegrationError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match self.executor.execute(endpoint, options).await {
                Ok(envelope) => {
                    if attempt > 1 {
                        tracing::info!(
                            endpoint_id = %endpoint.id,
                            attempt,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(envelope);
                }
                Err(error) => error,
            };

            let retryable = match error.status_code() {
                Some(status) => policy.is_retryable_status(status),
                None => error.is_transient(),
            };
            if !retryable {
                return Err(error);
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    endpoint_id = %endpoint.id,
                    attempts = attempt,
                    error = %error,
                    "Retry attempts exhausted"
                );
                return Err(IntegrationError::RetryExhausted {
                    endpoint: endpoint.id.clone(),
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let delay = backoff_delay(policy, attempt);
            tracing::debug!(
                endpoint_id = %endpoint.id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying request after backoff"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
