//! Bounded retry of a single logical API operation.
//!
//! A [`RetrySession`] is created per operation call and consumed by [`RetrySession::run`], so no
//! attempt bookkeeping outlives the call that owns it.

use crate::error::ApiError;
use reqwest::StatusCode;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Retry bounds for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    overall_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the initial attempt (1 => no retries). Zero is treated as one.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            overall_timeout: None,
        }
    }

    /// Bound the whole operation (all attempts) by `budget`.
    #[must_use]
    pub fn with_overall_timeout(mut self, budget: Duration) -> Self {
        self.overall_timeout = Some(budget);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout
    }

    #[must_use]
    pub fn session(&self) -> RetrySession {
        RetrySession::new(*self)
    }
}

/// Statuses worth another attempt: request timeout, or anything strictly above 500.
///
/// Exactly 500 is not retried.
#[must_use]
pub fn is_retryable_status(status_code: u16) -> bool {
    status_code == StatusCode::REQUEST_TIMEOUT.as_u16()
        || status_code > StatusCode::INTERNAL_SERVER_ERROR.as_u16()
}

/// Call-scoped retry state.
#[derive(Debug)]
pub struct RetrySession {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetrySession {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Run `op`, re-invoking it from scratch while the failure is retryable and attempts remain.
    ///
    /// Attempts are strictly sequential. Success returns immediately.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error, the first non-retryable error, or a 408 error when the
    /// overall budget runs out.
    pub async fn run<T, F, Fut>(mut self, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let deadline = self.policy.overall_timeout.map(|t| Instant::now() + t);
        loop {
            self.attempt += 1;

            let outcome = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(self.budget_exhausted());
                    }
                    match tokio::time::timeout(remaining, op()).await {
                        Ok(r) => r,
                        Err(_) => return Err(self.budget_exhausted()),
                    }
                }
                None => op().await,
            };

            let err = match outcome {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if !self.should_retry(&err) {
                return Err(err);
            }
            warn!(
                attempt = self.attempt,
                max_attempts = self.policy.max_attempts,
                status = err.status_code(),
                error = %err.message(),
                "retrying api request"
            );
        }
    }

    fn should_retry(&self, err: &ApiError) -> bool {
        self.attempt < self.policy.max_attempts && is_retryable_status(err.status_code())
    }

    fn budget_exhausted(&self) -> ApiError {
        let budget = self.policy.overall_timeout.unwrap_or_default();
        debug!(attempt = self.attempt, "retry budget exhausted");
        ApiError::with_status(
            format!(
                "Request timed out after {}ms (attempt {} of {})",
                budget.as_millis(),
                self.attempt,
                self.policy.max_attempts
            ),
            StatusCode::REQUEST_TIMEOUT,
        )
    }
}
