//! Retry logic with linear backoff
//!
//! Page fetches and attachment downloads share one policy: on a retryable failure the
//! caller sleeps `backoff_step × attempt` and tries again, up to `max_attempts` calls in
//! total. Terminal failures (404, conflicting local file) are returned immediately.
//!
//! # Example
//!
//! ```no_run
//! use discord_dl::retry::{IsRetryable, with_retry};
//! use discord_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{DownloadError, Error};
use std::future::Future;
use std::time::Duration;

/// Status code that is never retried
const NOT_FOUND: u16 = 404;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (server errors, rate limiting, truncated transfers) should return `true`.
/// Permanent failures (not found, bad configuration, conflicting local files) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Api { .. } => self.status() != Some(NOT_FOUND),
            Error::Download(e) => match e {
                DownloadError::Status { .. } => self.status() != Some(NOT_FOUND),
                // The existing file is left alone; retrying would hit the same check
                DownloadError::ExistingMismatch { .. } => false,
                // Likely a truncated or corrupted transfer
                DownloadError::HashMismatch { .. } | DownloadError::SizeMismatch { .. } => true,
            },
            Error::Network(e) => {
                if let Some(status) = self.status() {
                    return status != NOT_FOUND;
                }
                e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
            }
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ),
            // Server sent something we could not decode; may be a transient error page
            Error::Serialization(_) => true,
            Error::Config { .. } | Error::Template(_) | Error::Unauthorized => false,
        }
    }
}

/// Delay before the retry that follows failed attempt number `attempt` (1-based)
#[must_use]
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    config.backoff_step.saturating_mul(attempt)
}

/// Execute an async operation with linear backoff retry logic
///
/// # Arguments
///
/// * `config` - Retry configuration (attempt ceiling, backoff step)
/// * `operation` - Async closure that returns `Result<T, E>` where `E` implements [`IsRetryable`]
///
/// # Returns
///
/// Returns the successful result, the first non-retryable error, or the last error once
/// `max_attempts` calls have failed.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
                tracing::info!("Retrying {}/{}", attempt, max_attempts);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::warn!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
