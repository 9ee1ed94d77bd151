//! Bounded-backoff retry for transport calls.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times a transport call is attempted before its error is surfaced.
const MAX_ATTEMPTS: u32 = 3;

/// The delay before the first retry; doubled after every failed attempt.
const BASE_DELAY: Duration = Duration::from_millis(250);

/// Runs `operation` with bounded exponential backoff.
///
/// Only transport errors belong here: a logical verdict must never be retried into existence.
/// After the final attempt the last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(label: &str, mut operation: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = BASE_DELAY;
    let mut last_error = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt < MAX_ATTEMPTS {
                    warn!(target: "providers", %err, attempt, label, "rpc attempt failed; backing off");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                last_error = Some(err);
            }
        }
    }

    Err(last_error.expect("at least one attempt ran"))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry("test", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_last_error_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("still down".to_string()) }
        })
        .await;
        assert_eq!(result.unwrap_err(), "still down");
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
