//! Retry with exponential backoff for individual probe operations.
//!
//! A single latency round trip is retried a bounded number of times before
//! the engine substitutes its fallback constant; transfer chunks are not
//! retried here since the transfer loop reissues chunks for the remainder
//! of its budget anyway.

use log::{debug, warn};
use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Default number of retry attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default base delay for exponential backoff (in milliseconds).
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Maximum delay cap for exponential backoff (in milliseconds).
pub const DEFAULT_MAX_DELAY_MS: u64 = 2000;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration.
    pub fn new(
        max_retries: u32,
        base_delay_ms: u64,
        max_delay_ms: u64,
    ) -> Self {
        Self { max_retries, base_delay_ms, max_delay_ms }
    }

    /// Calculate the delay for a given attempt number.
    ///
    /// The delay is base_delay * 2^attempt, capped at max_delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed after all retries.
    Failed {
        /// The last error that occurred.
        last_error: Box<dyn Error + Send + Sync>,
        /// Number of attempts made.
        attempts: u32,
    },
}

impl<T> RetryResult<T> {
    /// Returns true if the operation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }

    /// Converts to Option, discarding error information.
    pub fn ok(self) -> Option<T> {
        match self {
            RetryResult::Success(value) => Some(value),
            RetryResult::Failed { .. } => None,
        }
    }
}

/// Execute an async operation with retry and exponential backoff.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging
/// * `f` - Async function that returns a Result
///
/// # Returns
/// RetryResult indicating success or failure with attempt count
pub async fn retry_async<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> RetryResult<T>
where
    E: Error + Send + Sync + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error: Option<Box<dyn Error + Send + Sync>> = None;
    let total_attempts = config.max_retries + 1;

    for attempt in 0..total_attempts {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt - 1);
            debug!(
                "{}: retry attempt {}/{} after {:?} delay",
                operation_name, attempt, config.max_retries, delay
            );
            sleep(delay).await;
        }

        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "{}: succeeded on attempt {}",
                        operation_name,
                        attempt + 1
                    );
                }
                return RetryResult::Success(result);
            }
            Err(e) => {
                warn!(
                    "{}: attempt {} failed: {}",
                    operation_name,
                    attempt + 1,
                    e
                );
                last_error = Some(Box::new(e));
            }
        }
    }

    RetryResult::Failed {
        last_error: last_error.unwrap(),
        attempts: total_attempts,
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
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.base_delay_ms, DEFAULT_BASE_DELAY_MS);
        assert_eq!(config.max_delay_ms, DEFAULT_MAX_DELAY_MS);
    }

    #[test]
    fn test_delay_for_attempt_exponential() {
        let config = RetryConfig::new(3, 100, 5000);

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_for_attempt_capped() {
        let config = RetryConfig::new(10, 100, 500);

        // 100 * 2^5 = 3200ms, capped at 500ms
        assert_eq!(config.delay_for_attempt(5), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retry_async_success_first_attempt() {
        let config = RetryConfig::new(3, 10, 100);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_async(&config, "test op", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(42)
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(result.ok(), Some(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_async_success_after_retries() {
        let config = RetryConfig::new(3, 10, 100);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_async(&config, "test op", || {
            let counter = counter_clone.clone();
            async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    Err(std::io::Error::other("temporary failure"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert!(result.is_success());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_async_all_attempts_fail() {
        let config = RetryConfig::new(2, 10, 100);
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: RetryResult<i32> = retry_async(&config, "test op", || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(std::io::Error::other("persistent failure"))
            }
        })
        .await;

        assert!(!result.is_success());
        // 1 initial + 2 retries = 3 total attempts
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
