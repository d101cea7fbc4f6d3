//! Resilience primitives used by the request pipeline
//!
//! - **Backoff**: exponential schedule with bounded jitter
//! - **Cancellable waits**: sleeps that abort as soon as a caller-supplied
//!   [`CancellationToken`] fires

pub mod backoff;

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub use backoff::{ExponentialBackoff, Jitter};

/// Returned when a wait was aborted through its cancellation token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Sleep for `delay` unless `cancel` fires first.
///
/// A zero delay still observes an already-cancelled token.
pub async fn sleep_or_cancel(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }

    trace!(delay_ms = delay.as_millis() as u64, "sleeping");
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        sleep_or_cancel(Duration::from_secs(3), &cancel).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_aborts_on_cancel() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let result = sleep_or_cancel(Duration::from_secs(60), &cancel).await;
        assert_eq!(result, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(sleep_or_cancel(Duration::ZERO, &cancel).await, Err(Cancelled));
    }
}
