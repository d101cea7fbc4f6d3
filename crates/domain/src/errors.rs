//! Error types used throughout the client
//!
//! [`ApiError`] is the closed taxonomy every request resolves to. Callers
//! pattern-match on it; the variant names and fields are part of the public
//! contract. [`ConfigError`] covers everything that can go wrong before a
//! client exists (loading, validating, building).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use threatlink_common::{ErrorClassification, ErrorSeverity};

/// Why a request never produced an HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailureKind {
    /// The per-request deadline elapsed
    Timeout,
    /// The connection was reset or closed mid-exchange
    ConnectionReset,
    /// No connection could be established (DNS, refused, TLS handshake)
    Connect,
    /// The caller cancelled the request
    Cancelled,
    /// Anything else the transport could not categorise
    Other,
}

impl fmt::Display for TransportFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Timeout => "timeout",
            Self::ConnectionReset => "connection reset",
            Self::Connect => "connect",
            Self::Cancelled => "cancelled",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Stable label for each [`ApiError`] variant, for logs and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    Unauthorized,
    BadRequest,
    NotFound,
    RateLimitExceeded,
    ServerError,
    TransportError,
    Unknown,
}

impl ApiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::RateLimitExceeded => "rate_limit_exceeded",
            Self::ServerError => "server_error",
            Self::TransportError => "transport_error",
            Self::Unknown => "unknown",
        }
    }
}

/// Typed outcome of a failed request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// Missing, invalid, expired or revoked credentials
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, status: Option<u16> },

    /// The server (or the client, for local misuse) rejected the request
    #[error("Bad request: {message}")]
    BadRequest { message: String, details: Option<serde_json::Value>, status: Option<u16> },

    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Rate limited, either by the server (429) or by the local pacing gate
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String, retry_after: Option<Duration>, status: Option<u16> },

    #[error("Server error ({status_code}): {message}")]
    ServerError { message: String, status_code: u16 },

    /// No HTTP response was obtained
    #[error("Transport error ({cause}): {message}")]
    TransportError { message: String, cause: TransportFailureKind },

    /// A response the client could not map onto any other variant
    #[error("Unexpected response: {message}")]
    Unknown { message: String, status: Option<u16>, raw: String },
}

impl ApiError {
    /// Local authentication failure (no HTTP status involved)
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into(), status: None }
    }

    /// Local misuse of the API (no HTTP status involved)
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), details: None, status: None }
    }

    pub fn transport(cause: TransportFailureKind, message: impl Into<String>) -> Self {
        Self::TransportError { message: message.into(), cause }
    }

    pub fn cancelled() -> Self {
        Self::transport(TransportFailureKind::Cancelled, "request cancelled by caller")
    }

    pub fn kind(&self) -> ApiErrorKind {
        match self {
            Self::Unauthorized { .. } => ApiErrorKind::Unauthorized,
            Self::BadRequest { .. } => ApiErrorKind::BadRequest,
            Self::NotFound { .. } => ApiErrorKind::NotFound,
            Self::RateLimitExceeded { .. } => ApiErrorKind::RateLimitExceeded,
            Self::ServerError { .. } => ApiErrorKind::ServerError,
            Self::TransportError { .. } => ApiErrorKind::TransportError,
            Self::Unknown { .. } => ApiErrorKind::Unknown,
        }
    }

    /// Human-readable message, without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthorized { message, .. }
            | Self::BadRequest { message, .. }
            | Self::NotFound { message }
            | Self::RateLimitExceeded { message, .. }
            | Self::ServerError { message, .. }
            | Self::TransportError { message, .. }
            | Self::Unknown { message, .. } => message,
        }
    }

    /// HTTP status code the error was derived from, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. }
            | Self::BadRequest { status, .. }
            | Self::RateLimitExceeded { status, .. }
            | Self::Unknown { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            Self::ServerError { status_code, .. } => Some(*status_code),
            Self::TransportError { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::TransportError { cause: TransportFailureKind::Cancelled, .. })
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } | Self::ServerError { .. } => true,
            Self::TransportError { cause, .. } => *cause != TransportFailureKind::Cancelled,
            Self::Unauthorized { .. }
            | Self::BadRequest { .. }
            | Self::NotFound { .. }
            | Self::Unknown { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. } => ErrorSeverity::Info,
            Self::TransportError { cause: TransportFailureKind::Cancelled, .. } => {
                ErrorSeverity::Info
            }
            Self::Unauthorized { .. }
            | Self::RateLimitExceeded { .. }
            | Self::TransportError { .. } => ErrorSeverity::Warning,
            Self::BadRequest { .. } | Self::ServerError { .. } | Self::Unknown { .. } => {
                ErrorSeverity::Error
            }
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for request operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors raised while loading configuration or constructing a client
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {format} format: {message}")]
    Parse { format: &'static str, message: String },

    #[error("Invalid base URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_accessor() {
        let err = ApiError::ServerError { message: "boom".into(), status_code: 503 };
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(ApiError::NotFound { message: "x".into() }.status_code(), Some(404));
        assert_eq!(ApiError::unauthorized("no creds").status_code(), None);
        assert_eq!(ApiError::cancelled().status_code(), None);
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = ApiError::bad_request("unknown session");
        assert_eq!(err.message(), "unknown session");
        assert_eq!(err.to_string(), "Bad request: unknown session");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::ServerError { message: String::new(), status_code: 502 }.is_retryable());
        assert!(ApiError::transport(TransportFailureKind::Timeout, "slow").is_retryable());
        assert!(!ApiError::cancelled().is_retryable());
        assert!(!ApiError::unauthorized("x").is_retryable());
        assert!(!ApiError::NotFound { message: String::new() }.is_retryable());
    }

    #[test]
    fn test_retry_after_only_for_rate_limit() {
        let err = ApiError::RateLimitExceeded {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(7)),
            status: Some(429),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(ApiError::bad_request("x").retry_after(), None);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ApiError::cancelled().kind().as_str(), "transport_error");
        assert!(ApiError::cancelled().is_cancelled());
        assert_eq!(
            ApiError::Unknown { message: String::new(), status: Some(418), raw: String::new() }
                .kind(),
            ApiErrorKind::Unknown
        );
    }

    #[test]
    fn test_transport_kind_display() {
        assert_eq!(TransportFailureKind::ConnectionReset.to_string(), "connection reset");
    }
}
