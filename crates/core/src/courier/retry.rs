//! Bounded retry with exponential backoff for courier calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::CourierError;

/// Run `operation` up to `max_attempts` times, doubling the delay after each
/// transient failure. Non-transient errors return immediately.
///
/// The closure receives the 1-based attempt number, for logging only; the
/// request it sends must be identical every time.
pub async fn with_retries<T, F, Fut>(
    op_name: &str,
    max_attempts: u32,
    base_delay: Duration,
    operation: F,
) -> Result<T, CourierError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, CourierError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut delay = base_delay;

    for attempt in 1..=max_attempts {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    operation = op_name,
                    attempt,
                    error = %e,
                    "Courier call failed, retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("retry loop returns on the last attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = with_retries("submit", 3, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CourierError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retries("submit", 3, Duration::from_millis(1), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CourierError::Timeout)
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries("submit", 3, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(CourierError::ConnectionFailed("refused".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(CourierError::ConnectionFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retries("submit", 3, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CourierError::Rejected {
                    error_type: "VALIDATION".to_string(),
                    error_code: "E100".to_string(),
                    message: "bad address".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(CourierError::Rejected { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_clamped_to_one() {
        let calls = AtomicU32::new(0);
        let result = with_retries("track", 0, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, CourierError>(()) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
