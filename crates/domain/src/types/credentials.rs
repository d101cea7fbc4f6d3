//! Credentials attached to outgoing requests

use std::fmt;

use chrono::{DateTime, Utc};

/// The single active authentication mode of a client instance
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// No credentials; only unauthenticated requests can be sent
    #[default]
    None,
    /// Static API key and secret
    ApiKeyPair { key: String, secret: String },
    /// Bearer token, typically obtained from a verified session
    BearerToken { value: String, expires_at: Option<DateTime<Utc>> },
}

/// Discriminant of [`Credentials`] without the secret material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    None,
    ApiKey,
    Bearer,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ApiKey => "api_key",
            Self::Bearer => "bearer",
        }
    }
}

impl Credentials {
    pub fn api_key(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::ApiKeyPair { key: key.into(), secret: secret.into() }
    }

    pub fn bearer(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self::BearerToken { value: value.into(), expires_at }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Self::None => AuthMode::None,
            Self::ApiKeyPair { .. } => AuthMode::ApiKey,
            Self::BearerToken { .. } => AuthMode::Bearer,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The bearer token value, if this is a bearer credential
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Self::BearerToken { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Whether a bearer credential's expiry has passed at `now`.
    ///
    /// Credentials without an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::BearerToken { expires_at: Some(expires_at), .. } => now >= *expires_at,
            _ => false,
        }
    }
}

// Secrets never reach logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::ApiKeyPair { key, .. } => f
                .debug_struct("ApiKeyPair")
                .field("key", &redact(key))
                .field("secret", &"<redacted>")
                .finish(),
            Self::BearerToken { expires_at, .. } => f
                .debug_struct("BearerToken")
                .field("value", &"<redacted>")
                .field("expires_at", expires_at)
                .finish(),
        }
    }
}

/// Keep a short prefix of an identifier so log lines stay correlatable.
pub(crate) fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    if prefix.len() < value.len() {
        format!("{prefix}…")
    } else {
        "<redacted>".to_string()
    }
}
