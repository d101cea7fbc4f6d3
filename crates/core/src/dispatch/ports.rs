//! Port interfaces for sending requests
//!
//! The dispatcher never touches the network itself. It hands a fully
//! prepared [`TransportRequest`] to a [`Transport`] and gets back either a
//! response or a [`TransportFailure`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use threatlink_domain::{ApiResponse, HttpMethod, TransportFailureKind};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A single wire-level attempt
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub cancellation: CancellationToken,
}

impl TransportRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }
}

/// The attempt produced no HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    /// Whether any request bytes may have reached the server
    pub bytes_sent: bool,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: TransportFailureKind, bytes_sent: bool, message: impl Into<String>) -> Self {
        Self { kind, bytes_sent, message: message.into() }
    }

    /// Failed before anything was written to the connection
    pub fn before_send(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, false, message)
    }

    /// Failed after the request was (possibly partially) written
    pub fn after_send(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, true, message)
    }
}

/// Executes one HTTP exchange
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the raw response.
    ///
    /// Non-2xx statuses are responses, not failures.
    async fn send(&self, request: TransportRequest) -> Result<ApiResponse, TransportFailure>;
}
