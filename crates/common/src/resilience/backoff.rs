//! Exponential backoff with bounded jitter
//!
//! The schedule used by the request pipeline between retry attempts:
//!
//! ```text
//! delay(attempt) = min(max_delay, base_delay * 2^attempt) + jitter
//! ```
//!
//! `attempt` is 0-based: the wait before the first retry uses `attempt = 0`.

use std::time::Duration;

use rand::Rng;

/// Largest exponent applied to the base delay. Past this the product
/// saturates long before it matters.
const MAX_EXPONENT: u32 = 20;

/// Randomisation applied on top of a computed backoff delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter, delays are fully deterministic
    #[default]
    None,
    /// Add a uniformly random amount in `0..=max` to the delay
    Additive(Duration),
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            Jitter::None => delay,
            Jitter::Additive(max) => delay.saturating_add(random_up_to(*max)),
        }
    }

    /// Upper bound on what [`Jitter::apply`] may add to `delay`.
    pub fn max_added(&self) -> Duration {
        match self {
            Jitter::Additive(max) => *max,
            Jitter::None => Duration::ZERO,
        }
    }
}

fn random_up_to(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Exponential backoff schedule capped at `max_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    jitter: Jitter,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            jitter: Jitter::Additive(Duration::from_millis(100)),
        }
    }
}

impl ExponentialBackoff {
    /// Create a schedule. `max_delay` smaller than `base_delay` is clamped up
    /// to `base_delay`.
    pub fn new(base_delay: Duration, max_delay: Duration, jitter: Jitter) -> Self {
        Self { base_delay, max_delay: max_delay.max(base_delay), jitter }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Deterministic part of the delay for the given 0-based retry attempt.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let multiplier = 1u32 << attempt.min(MAX_EXPONENT);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Full delay (deterministic part plus jitter) for the given attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.jitter.apply(self.base_delay_for(attempt))
    }
}
