// src/blockchain/retry.rs

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry an async operation with exponential backoff.
/// Delay starts at `initial_delay` and is multiplied by `factor` per attempt.
pub async fn with_backoff<T, E, F, Fut>(
    max_retries: u32,
    initial_delay: Duration,
    factor: u32,
    mut operation: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = initial_delay;
    let mut last_err = None;

    for attempt in 0..=max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < max_retries {
                    warn!(
                        "operation failed (attempt {}/{}): {}",
                        attempt + 1,
                        max_retries + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= factor;
                }
                last_err = Some(e);
            }
        }
    }

    // max_retries + 1 attempts all failed; last_err is always set here.
    Err(last_err.unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, String> =
            with_backoff(3, Duration::from_millis(1), 2, || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), String> =
            with_backoff(2, Duration::from_millis(1), 2, || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("down".to_string())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
