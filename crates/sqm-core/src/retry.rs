//! Bounded retry with backoff.
//!
//! The device's flaky first replies, the session handshake, and the per-slot
//! attempt loop all share the same shape: try, log, back off, try again
//! until a deadline. One combinator instead of three hand-rolled loops.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Run `op` until it succeeds or `max` has elapsed.
///
/// Each failure is logged at warn level and followed by a `backoff` sleep
/// (which may be zero for immediate retry). The deadline is checked after
/// each failed attempt, so at least one attempt is always made; the final
/// error is returned on exhaustion.
pub async fn retry_for<T, E, F, Fut>(max: Duration, backoff: Duration, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let deadline = Instant::now() + max;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if Instant::now() >= deadline {
                    return Err(err);
                }
                tracing::warn!(error = %err, "attempt failed, retrying");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> =
            retry_for(Duration::from_secs(10), Duration::from_secs(1), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 3 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_on_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            retry_for(Duration::from_secs(5), Duration::from_secs(1), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {n}"))
            })
            .await;
        assert_eq!(result.unwrap_err(), "failure 5");
        // Attempts at t = 0..=5s; the deadline check fires after the sixth.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn makes_at_least_one_attempt() {
        let result: Result<(), &str> =
            retry_for(Duration::ZERO, Duration::ZERO, || async { Err("immediate") }).await;
        assert_eq!(result.unwrap_err(), "immediate");
    }
}
