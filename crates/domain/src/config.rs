//! Client configuration
//!
//! All durations serialize as integer milliseconds (`timeout_ms = 30000`).
//! Every section has defaults, so a config file only needs the values it
//! changes.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use threatlink_common::{duration_millis, option_duration_millis, ExponentialBackoff, Jitter};
use url::Url;

use crate::errors::{ConfigError, TransportFailureKind};
use crate::types::credentials::{redact, Credentials};

pub const DEFAULT_BASE_URL: &str = "https://api.threatlink.io";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";
pub const DEFAULT_API_SECRET_HEADER: &str = "X-API-Secret";

/// Top-level configuration, supplied once when a client is constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(rename = "timeout_ms", with = "duration_millis")]
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub session: SessionEndpoints,
    pub log: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("threatlink-client/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
            session: SessionEndpoints::default(),
            log: LogConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    /// Parsed base URL
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Url` if `base_url` is not an absolute URL, or
    /// `ConfigError::Invalid` for schemes other than http(s).
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid(format!("unsupported base URL scheme '{other}'"))),
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;

        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout_ms must be greater than 0".into()));
        }

        self.retry.validate()?;
        self.auth.validate()?;
        Ok(())
    }
}

/// Retry behaviour of the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    #[serde(rename = "base_delay_ms", with = "duration_millis")]
    pub base_delay: Duration,
    #[serde(rename = "max_delay_ms", with = "duration_millis")]
    pub max_delay: Duration,
    /// Upper bound of the random amount added to each delay
    #[serde(rename = "jitter_ms", with = "duration_millis")]
    pub jitter: Duration,
    pub retryable_statuses: BTreeSet<u16>,
    pub retryable_transport_failures: BTreeSet<TransportFailureKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(100),
            retryable_statuses: [429, 502, 503, 504].into_iter().collect(),
            retryable_transport_failures: [
                TransportFailureKind::Timeout,
                TransportFailureKind::ConnectionReset,
                TransportFailureKind::Connect,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl RetryPolicy {
    /// A policy that sends each request exactly once
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Cancellation is never retryable, whatever the configured set says.
    pub fn is_retryable_transport(&self, kind: TransportFailureKind) -> bool {
        kind != TransportFailureKind::Cancelled && self.retryable_transport_failures.contains(&kind)
    }

    /// Backoff schedule derived from this policy
    pub fn backoff(&self) -> ExponentialBackoff {
        let jitter =
            if self.jitter.is_zero() { Jitter::None } else { Jitter::Additive(self.jitter) };
        ExponentialBackoff::new(self.base_delay, self.max_delay, jitter)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for zero attempts or inverted delays.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigError::Invalid(
                "retry.max_delay_ms must not be smaller than retry.base_delay_ms".into(),
            ));
        }
        Ok(())
    }
}

/// What the dispatcher does when the server-declared quota is exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// Sleep until the quota resets, then send
    #[default]
    Wait,
    /// Fail immediately with `RateLimitExceeded`
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub mode: RateLimitMode,
    /// Longest wait accepted in `Wait` mode; longer waits fail fast
    #[serde(rename = "max_wait_ms", with = "option_duration_millis")]
    pub max_wait: Option<Duration>,
}

/// Initial credentials and API-key header names
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub bearer_token: Option<String>,
    pub key_header: String,
    pub secret_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            bearer_token: None,
            key_header: DEFAULT_API_KEY_HEADER.to_string(),
            secret_header: DEFAULT_API_SECRET_HEADER.to_string(),
        }
    }
}

impl AuthConfig {
    /// Credentials the client starts with. A bearer token wins over a key
    /// pair; with neither the client starts unauthenticated.
    pub fn initial_credentials(&self) -> Credentials {
        if let Some(token) = &self.bearer_token {
            return Credentials::bearer(token.clone(), None);
        }
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Credentials::api_key(key.clone(), secret.clone()),
            _ => Credentials::None,
        }
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when only half of a key pair is set,
    /// or `ConfigError::Invalid` for empty header names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (&self.api_key, &self.api_secret) {
            (Some(_), None) => return Err(ConfigError::Missing("auth.api_secret".into())),
            (None, Some(_)) => return Err(ConfigError::Missing("auth.api_key".into())),
            _ => {}
        }
        if self.key_header.trim().is_empty() || self.secret_header.trim().is_empty() {
            return Err(ConfigError::Invalid("auth header names must not be empty".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("key_header", &self.key_header)
            .field("secret_header", &self.secret_header)
            .finish()
    }
}

/// Paths of the session login endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEndpoints {
    pub create: String,
    pub verify: String,
    pub refresh: String,
    /// Server-side revoke called on logout, if the API offers one
    pub revoke: Option<String>,
}

impl Default for SessionEndpoints {
    fn default() -> Self {
        Self {
            create: "/v1/auth/session".to_string(),
            verify: "/v1/auth/session/verify".to_string(),
            refresh: "/v1/auth/session/refresh".to_string(),
            revoke: Some("/v1/auth/session/revoke".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
