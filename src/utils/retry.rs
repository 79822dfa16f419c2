//! Retry utilities: backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

/// Backoff for directory connection retries at startup.
///
/// - Min delay: 100ms
/// - Max delay: 2s
/// - Max attempts: 5
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(5)
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::Retryable;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_connection_backoff_retries_until_success() {
        let attempts = AtomicU32::new(0);

        let result: Result<u32, &str> = (|| async {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err("unreachable")
            } else {
                Ok(n)
            }
        })
        .retry(connection_backoff().with_min_delay(Duration::from_millis(1)))
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_connection_backoff_gives_up() {
        let attempts = AtomicU32::new(0);

        let result: Result<(), &str> = (|| async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err("unreachable")
        })
        .retry(
            connection_backoff()
                .with_min_delay(Duration::from_millis(1))
                .with_max_delay(Duration::from_millis(2)),
        )
        .await;

        assert!(result.is_err());
        assert!(attempts.load(Ordering::SeqCst) > 1);
    }
}
