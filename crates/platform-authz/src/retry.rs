//! Retry with exponential backoff for policy store reads.
//!
//! Only refresh operations go through here. Enforcement never touches the
//! store and is never retried.
//!
//! # Example
//!
//! ```rust,no_run
//! use platform_authz::retry::{with_retry_if, RetryConfig};
//! use platform_authz::AuthzError;
//!
//! async fn example() -> Result<Vec<String>, AuthzError> {
//!     let config = RetryConfig::default();
//!
//!     with_retry_if(
//!         &config,
//!         "list_domains",
//!         || async { Ok(vec!["acme".to_string()]) },
//!         AuthzError::is_retryable,
//!     )
//!     .await
//! }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Upper bound on any single delay
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each failure
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    /// Short delays, for tests and latency-sensitive refreshes.
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(50),
            exponential_base: 2.0,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_base: 1.0,
        }
    }

    /// Delay to wait after a failure, given the delay used last time.
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::from_secs_f64(
            (current.as_secs_f64() * self.exponential_base).min(self.max_delay.as_secs_f64()),
        )
    }
}

/// Execute an operation, retrying only errors accepted by `is_retryable`.
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation` - Name used in log records
/// * `f` - Operation to run (called once per attempt)
/// * `is_retryable` - Predicate deciding whether an error is transient
///
/// # Returns
///
/// The first success, the first non-retryable error, or the last error
/// once attempts are exhausted.
pub async fn with_retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation: &str,
    mut f: F,
    mut is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: FnMut(&E) -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(operation, attempts = attempt, "Store call succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !is_retryable(&e) => {
                tracing::debug!(operation, error = %e, "Error is not retryable");
                return Err(e);
            }
            Err(e) if attempt >= config.max_attempts => {
                tracing::warn!(operation, attempts = attempt, error = %e, "Retry attempts exhausted");
                return Err(e);
            }
            Err(e) => {
                tracing::debug!(
                    operation,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Store call failed, retrying"
                );

                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_next_delay_is_capped() {
        let config = RetryConfig::fast();
        assert_eq!(config.next_delay(Duration::from_millis(5)), Duration::from_millis(10));
        assert_eq!(config.next_delay(Duration::from_millis(40)), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_retryable_error_succeeds_after_retries() {
        let config = RetryConfig::fast();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry_if(
            &config,
            "test",
            || {
                let counter = counter_clone.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err("not yet")
                    } else {
                        Ok(42)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retryable_error_exhausts_attempts() {
        let config = RetryConfig {
            max_attempts: 2,
            ..RetryConfig::fast()
        };
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry_if(
            &config,
            "test",
            || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>("always fails")
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let config = RetryConfig::fast();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry_if(
            &config,
            "test",
            || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>("permanent failure")
                }
            },
            |_| false,
        )
        .await;

        assert_eq!(result, Err("permanent failure"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
