//! Timeout enforcement.
//!
//! # Responsibilities
//! - Put a deadline on every outbound call, independent of the retry envelope
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timeout is reported as its own error, never as a status code

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

/// Raised when a call did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(pub Duration);

/// Run `fut`, giving up after `limit`.
pub async fn with_deadline<F, T>(limit: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    timeout(limit, fut).await.map_err(|_| Elapsed(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires() {
        let result = with_deadline(Duration::from_secs(10), async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        })
        .await;
        assert_eq!(result, Err(Elapsed(Duration::from_secs(10))));
    }

    #[tokio::test]
    async fn test_fast_call_passes() {
        let result = with_deadline(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
