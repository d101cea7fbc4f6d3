//! Generic utilities shared across ThreatLink crates.
//!
//! Nothing in here knows about the remote API. These are the building blocks
//! the request pipeline composes:
//! - `error`: the `ErrorClassification` vocabulary (retryability, severity)
//! - `resilience`: exponential backoff with jitter, cancellable waits
//! - `utils`: serde helpers for configuration types

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod resilience;
pub mod utils;

// Re-export commonly used types and traits for convenience
pub use error::{ErrorClassification, ErrorSeverity};
pub use resilience::{sleep_or_cancel, Cancelled, ExponentialBackoff, Jitter};
pub use utils::serde::{duration_millis, option_duration_millis};
