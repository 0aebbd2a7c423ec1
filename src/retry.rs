//! Retry policy for remote platform calls.
//!
//! Retries are expressed as an explicit policy value (max attempts, delay,
//! backoff factor) applied uniformly by the request layer, rather than as
//! ad-hoc wrappers around individual calls. Which errors qualify is decided
//! by [`MirrorError::is_retryable()`](crate::error::MirrorError::is_retryable):
//! transport failures retry, everything else escalates immediately.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> thread_mirror::error::Result<()> {
//! use thread_mirror::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::default(); // 3 attempts, fixed 5s delay
//! let value = policy
//!     .run("demo", || async { Ok::<_, thread_mirror::error::MirrorError>(42) })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::metrics;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retrying transient remote failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub delay: Duration,

    /// Backoff multiplier between retries. `1.0` means a fixed delay.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    /// Three attempts with a fixed 5 second delay.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            backoff_factor: 1.0,
        }
    }
}

impl RetryPolicy {
    /// Fixed-delay policy with the given attempt count.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff_factor: 1.0,
        }
    }

    /// Fast-fail policy for tests.
    pub fn testing() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(10),
            backoff_factor: 1.0,
        }
    }

    /// Calculate the delay before retry number `retry` (1-indexed).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return self.delay;
        }
        let multiplier = self.backoff_factor.powi((retry - 1) as i32);
        Duration::from_secs_f64(self.delay.as_secs_f64() * multiplier)
    }

    /// Run `f`, retrying while it fails with a retryable error.
    ///
    /// Non-retryable errors and exhaustion of `max_attempts` both return
    /// the last error to the caller.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for_retry(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    metrics::record_retry(operation);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(operation, attempt, "transient failure, retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
