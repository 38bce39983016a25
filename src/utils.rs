//! Retry helpers for transport calls.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Retry a Telegram API operation with exponential backoff.
///
/// Use it for downloads and replies that can fail on transient network
/// errors.
///
/// # Errors
///
/// Returns the last error once all retry attempts are exhausted.
///
/// # Examples
///
/// ```no_run
/// use chat_archiver::utils::retry_telegram_operation;
/// use anyhow::Result;
///
/// async fn download_file() -> Result<Vec<u8>> {
///     // ... your download logic
///     Ok(vec![])
/// }
///
/// # async fn example() -> Result<()> {
/// let buffer = retry_telegram_operation(|| async {
///     download_file().await
/// }).await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}
