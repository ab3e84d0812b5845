//! Bounded exponential backoff around a single API call.
//!
//! The attempt counter lives inside one `with_retry` call, so every page
//! fetch starts with a fresh budget.

use std::future::Future;

use crate::config::RetryConfig;
use crate::error::{ApiError, AppError, Result};

/// Run `operation` until it succeeds or `config.max_attempts` is reached.
///
/// `operation` receives the 1-based attempt number. Every failure before the
/// last attempt is logged and followed by the backoff delay for that attempt.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    project: &str,
    operation: &str,
    mut make_request: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, ApiError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match make_request(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(project, operation, attempt, "Request succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if attempt >= max_attempts => {
                tracing::error!(
                    project,
                    operation,
                    error = %error,
                    attempts = max_attempts,
                    "Request failed after all retry attempts"
                );
                return Err(AppError::RetryExhausted {
                    attempts: max_attempts,
                    last: error,
                });
            }
            Err(error) => {
                let delay = config.delay_for_attempt(attempt - 1);
                tracing::warn!(
                    project,
                    operation,
                    error = %error,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, will retry after delay"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
