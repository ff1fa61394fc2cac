//! Best-effort deadlines for adapter calls

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;

/// Run `future` with a deadline. Expiry becomes an error whose text
/// classifies as a network failure.
pub async fn with_timeout<F, T>(duration: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let start = Instant::now();
    match tokio::time::timeout(duration, future).await {
        Ok(result) => {
            let elapsed = start.elapsed();
            if elapsed > duration / 2 {
                tracing::warn!(operation, elapsed_ms = elapsed.as_millis() as u64, "Slow operation");
            }
            result
        }
        Err(_) => {
            tracing::error!(operation, timeout_ms = duration.as_millis() as u64, "Operation timed out");
            anyhow::bail!("{} timed out after {}ms", operation, duration.as_millis())
        }
    }
}
