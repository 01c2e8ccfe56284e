//! Fixed-delay retry for fallible asynchronous operations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// How many times to retry and how long to wait in between.
///
/// The delay is constant: there is no backoff and no jitter.
///
/// # Examples
///
/// ```
/// use karakuri::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_retries(), 2);
/// assert_eq!(policy.delay(), Duration::from_millis(300));
///
/// let policy = RetryPolicy::fixed(5, Duration::from_secs(1));
/// assert_eq!(policy.max_attempts(), 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    /// Retries up to `max_retries` additional times, waiting `delay` between attempts.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }

    /// Returns the number of retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the total number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Returns the delay between attempts.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Runs `operation` until it succeeds or the policy is exhausted.
///
/// Every failed attempt is logged. When no attempts remain the last error is
/// returned to the caller unchanged.
///
/// # Examples
///
/// ```
/// use karakuri::{with_retry, RetryPolicy};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let mut calls = 0;
/// let result: Result<u32, String> = with_retry(&RetryPolicy::fixed(2, Duration::ZERO), || {
///     calls += 1;
///     let attempt = calls;
///     async move {
///         if attempt < 2 {
///             Err("not yet".to_string())
///         } else {
///             Ok(attempt)
///         }
///     }
/// })
/// .await;
/// assert_eq!(result, Ok(2));
/// # }
/// ```
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                warn!(attempt, error = %e, "Retryable error");
                if attempt > policy.max_retries {
                    error!(attempts = attempt, error = %e, "Operation failed after retries");
                    return Err(e);
                }
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
