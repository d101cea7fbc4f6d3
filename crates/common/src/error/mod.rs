//! Error classification shared by every ThreatLink error type
//!
//! Concrete error enums live next to the code that produces them; this module
//! only defines the vocabulary used to reason about them uniformly:
//!
//! - **`ErrorClassification`**: is the failure retryable, how severe is it,
//!   and did the remote side suggest a retry delay
//! - **`ErrorSeverity`**: a single severity scale for logging decisions
//!
//! ```rust,ignore
//! use threatlink_common::error::ErrorClassification;
//!
//! fn log_failure<E: ErrorClassification + std::fmt::Display>(err: &E) {
//!     match err.severity() {
//!         ErrorSeverity::Info => tracing::info!(%err, "request failed"),
//!         ErrorSeverity::Warning => tracing::warn!(%err, "request failed"),
//!         _ => tracing::error!(%err, "request failed"),
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient conditions that may succeed if attempted
    /// again: timeouts, dropped connections, rate limiting, temporary service
    /// unavailability.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the remote side recommended a delay
    /// (e.g. from a `Retry-After` header).
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically expected conditions
    Info,
    /// Warning, degraded but operational
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
