//! Session login flow types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a session login
///
/// ```text
/// create ──> Pending ──verify──> Verified ──401 / TTL / failed refresh──> Expired
///                                    └──────────────logout─────────────> Revoked
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the verification code sent to the user
    Pending,
    /// Verified; the session owns the active bearer credential
    Verified,
    /// Token TTL elapsed, refresh failed, or the server answered 401
    Expired,
    /// Explicitly logged out
    Revoked,
}

impl SessionState {
    /// Whether the session can no longer produce authenticated requests
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Revoked)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Expired => "expired",
            Self::Revoked => "revoked",
        };
        f.write_str(label)
    }
}

/// A server-tracked login flow keyed by its verification code identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub verification_code_id: String,
    pub email: String,
    pub state: SessionState,
}

impl Session {
    pub fn pending(verification_code_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            verification_code_id: verification_code_id.into(),
            email: email.into(),
            state: SessionState::Pending,
        }
    }
}

/// Bearer token issued by a successful verification or refresh
#[derive(Clone, PartialEq, Eq)]
pub struct BearerGrant {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Present only when the server issues refresh tokens
    pub refresh_token: Option<String>,
}

impl fmt::Debug for BearerGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerGrant")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
