//! Server-declared rate-limit tracking
//!
//! The dispatcher feeds every response into [`RateLimitTracker::observe`]
//! and calls [`RateLimitTracker::acquire`] before each attempt. The state is
//! shared by every domain client that uses the same dispatcher.

use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use threatlink_common::sleep_or_cancel;
use threatlink_domain::{ApiError, ApiResponse, RateLimitConfig, RateLimitMode};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::classifier;

/// Point-in-time view of the quota
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub reset_at: Option<Instant>,
}

impl RateLimitState {
    /// How long a request must wait at `now`, if the quota is exhausted
    pub fn wait_at(&self, now: Instant) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) if now < reset_at => Some(reset_at - now),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitTracker {
    state: RwLock<RateLimitState>,
    config: RateLimitConfig,
}

impl RateLimitTracker {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { state: RwLock::new(RateLimitState::default()), config }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    pub fn snapshot(&self) -> RateLimitState {
        *self.state.read()
    }

    /// Learn the quota from a response's headers (and, for 429, its body)
    pub fn observe(&self, response: &ApiResponse) {
        let now = Instant::now();
        let wall_now = Utc::now();
        let headers = &response.headers;

        let remaining = headers
            .get("x-ratelimit-remaining")
            .or_else(|| headers.get("ratelimit-remaining"))
            .and_then(|v| v.trim().parse::<u64>().ok());
        let reset_in = headers
            .get("x-ratelimit-reset")
            .or_else(|| headers.get("ratelimit-reset"))
            .and_then(|v| classifier::parse_reset(v, wall_now));

        let throttled = if response.status == 429 {
            let body = serde_json::from_slice(&response.body).ok();
            Some(classifier::retry_after(headers, body.as_ref(), wall_now))
        } else {
            None
        };

        if remaining.is_none() && reset_in.is_none() && throttled.is_none() {
            return;
        }

        let mut state = self.state.write();
        if let Some(remaining) = remaining {
            state.remaining = Some(remaining);
        }
        if let Some(reset_in) = reset_in {
            state.reset_at = Some(deadline(now, reset_in));
        }
        if let Some(retry_after) = throttled {
            state.remaining = Some(0);
            if let Some(retry_after) = retry_after {
                state.reset_at = Some(deadline(now, retry_after));
            }
        }
        debug!(remaining = ?state.remaining, "Rate limit state updated");
    }

    /// Wait until the quota allows another request
    ///
    /// Returns how long the caller was held back.
    ///
    /// # Errors
    ///
    /// `RateLimitExceeded` in fail-fast mode or when the wait would exceed
    /// `max_wait`; `TransportError { cause: Cancelled }` if `cancel` fires.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Duration, ApiError> {
        let mut waited = Duration::ZERO;

        loop {
            let Some(wait) = self.snapshot().wait_at(Instant::now()) else {
                return Ok(waited);
            };

            let over_budget = self.config.max_wait.is_some_and(|max| wait > max);
            if self.config.mode == RateLimitMode::FailFast || over_budget {
                return Err(ApiError::RateLimitExceeded {
                    message: format!("rate limit exhausted, resets in {}ms", wait.as_millis()),
                    retry_after: Some(wait),
                    status: None,
                });
            }

            info!(wait_ms = wait.as_millis() as u64, "Rate limit exhausted, waiting for reset");
            sleep_or_cancel(wait, cancel).await.map_err(|_| ApiError::cancelled())?;
            waited += wait;
        }
    }
}

fn deadline(now: Instant, wait: Duration) -> Instant {
    now.checked_add(wait)
        .or_else(|| now.checked_add(classifier::MAX_SERVER_WAIT))
        .unwrap_or(now)
}
