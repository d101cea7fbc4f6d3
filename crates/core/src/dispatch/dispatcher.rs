//! The request dispatcher
//!
//! Every API call goes through [`RequestDispatcher::execute`]. Per attempt:
//!
//! 1. check that credentials exist when the request needs them (a bearer
//!    past its expiry counts as missing and is reported to listeners)
//! 2. wait for (or fail on) an exhausted rate-limit quota
//! 3. attach credentials, `X-Request-ID` and content headers
//! 4. send with the per-request timeout, racing the cancellation token
//! 5. feed the response into the rate-limit tracker, then return, retry or
//!    classify
//!
//! Retries follow the [`RetryPolicy`]: transport failures are retried when
//! their kind is retryable and either the request is idempotent or nothing
//! was sent yet; retryable statuses only for idempotent requests. Exhausted
//! retries surface the last classified error.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use threatlink_common::{sleep_or_cancel, ErrorClassification, ExponentialBackoff};
use threatlink_domain::{
    ApiError, ApiResponse, ApiResult, ClientConfig, ConfigError, Credentials, RateLimitConfig,
    RequestSpec, RetryPolicy, TransportFailureKind, DEFAULT_TIMEOUT,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::classifier::{classify_response, classify_transport};
use super::ports::{Transport, TransportFailure, TransportRequest};
use super::rate_limit::{RateLimitState, RateLimitTracker};
use crate::auth::credentials::CredentialStore;
use crate::auth::ports::{AuthEventListener, RequestSigner, SigningContext};
use crate::auth::signing::HeaderKeySigner;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Central choke point between domain clients and the transport
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    base_url: Url,
    timeout: Duration,
    user_agent: Option<String>,
    retry: RetryPolicy,
    backoff: ExponentialBackoff,
    credentials: Arc<CredentialStore>,
    signer: Arc<dyn RequestSigner>,
    rate_limits: RateLimitTracker,
    listeners: RwLock<Vec<Weak<dyn AuthEventListener>>>,
}

/// Headers derived from the active credentials for one attempt
struct Authorization {
    headers: Vec<(String, String)>,
    bearer: Option<String>,
}

impl RequestDispatcher {
    pub fn builder(transport: Arc<dyn Transport>) -> DispatcherBuilder {
        DispatcherBuilder::new(transport)
    }

    /// Build a dispatcher from a validated client configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration does not validate.
    pub fn from_config(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        DispatcherBuilder::new(transport)
            .base_url(config.base_url.clone())
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .retry_policy(config.retry.clone())
            .rate_limit(config.rate_limit)
            .credentials(Arc::new(CredentialStore::new(config.auth.initial_credentials())))
            .signer(Arc::new(HeaderKeySigner::new(
                config.auth.key_header.clone(),
                config.auth.secret_header.clone(),
            )))
            .build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Current rate-limit view, as learned from the last responses
    pub fn rate_limit_state(&self) -> RateLimitState {
        self.rate_limits.snapshot()
    }

    /// Register for bearer rejection events
    ///
    /// Listeners are held weakly; dropping the listener unsubscribes it.
    pub fn subscribe(&self, listener: Weak<dyn AuthEventListener>) {
        self.listeners.write().push(listener);
    }

    /// Execute a request with no caller-side cancellation
    pub async fn execute(&self, spec: RequestSpec) -> ApiResult<ApiResponse> {
        self.execute_with_cancel(spec, &CancellationToken::new()).await
    }

    /// Execute a request and decode the JSON body of the successful response
    pub async fn execute_json<T: DeserializeOwned>(&self, spec: RequestSpec) -> ApiResult<T> {
        self.execute(spec).await?.json()
    }

    /// Execute a request; `cancel` aborts the in-flight attempt and any wait
    #[instrument(
        name = "dispatch",
        skip(self, spec, cancel),
        fields(method = %spec.method(), path = spec.path())
    )]
    pub async fn execute_with_cancel(
        &self,
        spec: RequestSpec,
        cancel: &CancellationToken,
    ) -> ApiResult<ApiResponse> {
        let url = self.build_url(&spec)?;
        let body = spec
            .body()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::bad_request(format!("Failed to encode request body: {e}")))?;
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::cancelled());
            }

            let mut auth = self.authorize(&spec, &url, body.as_deref())?;
            if !self.rate_limits.acquire(cancel).await?.is_zero() {
                // Credentials may have changed while waiting for the quota.
                auth = self.authorize(&spec, &url, body.as_deref())?;
            }

            let request_id = Uuid::now_v7().to_string();
            let request = self.prepare(&spec, &url, body.clone(), auth.headers, &request_id, cancel);
            debug!(attempt = attempt + 1, max_attempts, %request_id, "Sending request");

            let delay = match self.send(request, cancel).await {
                Err(failure) => {
                    let retryable = failure.kind != TransportFailureKind::Cancelled
                        && self.retry.is_retryable_transport(failure.kind)
                        && (spec.is_idempotent() || !failure.bytes_sent)
                        && attempt + 1 < max_attempts;
                    if !retryable {
                        debug!(%request_id, kind = %failure.kind, "Transport failure, giving up");
                        return Err(classify_transport(&failure));
                    }
                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        attempt = attempt + 1,
                        %request_id,
                        kind = %failure.kind,
                        delay_ms = delay.as_millis() as u64,
                        "Transport failure, retrying"
                    );
                    delay
                }
                Ok(response) => {
                    self.rate_limits.observe(&response);
                    if response.is_success() {
                        debug!(%request_id, status = response.status, "Request succeeded");
                        return Ok(response);
                    }

                    let error = classify_response(&response);
                    if response.status == 401 {
                        if let Some(token) = auth.bearer.as_deref() {
                            self.notify_unauthorized(token);
                        }
                        return Err(error);
                    }

                    let retryable = self.retry.is_retryable_status(response.status)
                        && spec.is_idempotent()
                        && attempt + 1 < max_attempts;
                    if !retryable {
                        debug!(%request_id, status = response.status, "Request failed");
                        return Err(error);
                    }
                    let server_wait = error.retry_after();
                    let max_wait = self.rate_limits.config().max_wait;
                    if let Some((wait, _)) =
                        server_wait.zip(max_wait).filter(|(wait, max)| wait > max)
                    {
                        debug!(
                            %request_id,
                            wait_ms = wait.as_millis() as u64,
                            "Server wait exceeds max_wait, giving up"
                        );
                        return Err(error);
                    }
                    let delay = server_wait.unwrap_or_else(|| self.backoff.delay_for(attempt));
                    warn!(
                        attempt = attempt + 1,
                        %request_id,
                        status = response.status,
                        delay_ms = delay.as_millis() as u64,
                        "Retryable status, retrying"
                    );
                    delay
                }
            };

            sleep_or_cancel(delay, cancel).await.map_err(|_| ApiError::cancelled())?;
            attempt += 1;
        }
    }

    fn build_url(&self, spec: &RequestSpec) -> ApiResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = spec.path();
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };

        let mut url = Url::parse(&joined)
            .map_err(|e| ApiError::bad_request(format!("Invalid request path '{path}': {e}")))?;
        if !spec.query().is_empty() {
            url.query_pairs_mut()
                .extend_pairs(spec.query().iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    fn authorize(
        &self,
        spec: &RequestSpec,
        url: &Url,
        body: Option<&[u8]>,
    ) -> ApiResult<Authorization> {
        if !spec.requires_auth() {
            return Ok(Authorization { headers: Vec::new(), bearer: None });
        }

        match self.credentials.snapshot().as_ref() {
            Credentials::None => Err(ApiError::unauthorized("No credentials configured")),
            Credentials::ApiKeyPair { key, secret } => {
                let context = SigningContext { method: spec.method(), url, body };
                Ok(Authorization { headers: self.signer.sign(&context, key, secret), bearer: None })
            }
            creds @ Credentials::BearerToken { value, .. } => {
                if creds.is_expired_at(Utc::now()) {
                    self.notify_unauthorized(value);
                    return Err(ApiError::unauthorized("Bearer token expired"));
                }
                Ok(Authorization {
                    headers: vec![("Authorization".to_string(), format!("Bearer {value}"))],
                    bearer: Some(value.clone()),
                })
            }
        }
    }

    fn prepare(
        &self,
        spec: &RequestSpec,
        url: &Url,
        body: Option<Vec<u8>>,
        auth_headers: Vec<(String, String)>,
        request_id: &str,
        cancel: &CancellationToken,
    ) -> TransportRequest {
        let mut headers = auth_headers;
        headers.push(("Accept".to_string(), "application/json".to_string()));
        headers.push((REQUEST_ID_HEADER.to_string(), request_id.to_string()));
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(agent) = &self.user_agent {
            headers.push(("User-Agent".to_string(), agent.clone()));
        }

        TransportRequest {
            method: spec.method(),
            url: url.clone(),
            headers,
            body,
            timeout: self.timeout,
            cancellation: cancel.child_token(),
        }
    }

    async fn send(
        &self,
        request: TransportRequest,
        cancel: &CancellationToken,
    ) -> Result<ApiResponse, TransportFailure> {
        let timeout = request.timeout;
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransportFailure::after_send(
                TransportFailureKind::Cancelled,
                "request cancelled by caller",
            )),
            result = tokio::time::timeout(timeout, self.transport.send(request)) => {
                result.unwrap_or_else(|_| {
                    Err(TransportFailure::after_send(
                        TransportFailureKind::Timeout,
                        format!("no response within {}ms", timeout.as_millis()),
                    ))
                })
            }
        }
    }

    fn notify_unauthorized(&self, token: &str) {
        let listeners: Vec<Arc<dyn AuthEventListener>> = {
            let mut guard = self.listeners.write();
            guard.retain(|listener| listener.strong_count() > 0);
            guard.iter().filter_map(Weak::upgrade).collect()
        };
        debug!(listeners = listeners.len(), "Bearer rejected, notifying listeners");
        for listener in listeners {
            listener.on_unauthorized(token);
        }
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RequestDispatcher`]
pub struct DispatcherBuilder {
    transport: Arc<dyn Transport>,
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
    retry: RetryPolicy,
    rate_limit: RateLimitConfig,
    credentials: Option<Arc<CredentialStore>>,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl DispatcherBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            base_url: threatlink_domain::DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            credentials: None,
            signer: None,
        }
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Share a credential store (defaults to a fresh, empty one)
    pub fn credentials(mut self, credentials: Arc<CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// # Errors
    ///
    /// Returns `ConfigError` for an invalid base URL, a zero timeout or an
    /// invalid retry policy.
    pub fn build(self) -> Result<RequestDispatcher, ConfigError> {
        let base_url = Url::parse(&self.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!("'{}' cannot be a base URL", self.base_url)));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than 0".into()));
        }
        self.retry.validate()?;

        Ok(RequestDispatcher {
            transport: self.transport,
            base_url,
            timeout: self.timeout,
            user_agent: self.user_agent,
            backoff: self.retry.backoff(),
            retry: self.retry,
            credentials: self.credentials.unwrap_or_default(),
            signer: self.signer.unwrap_or_else(|| Arc::new(HeaderKeySigner::default())),
            rate_limits: RateLimitTracker::new(self.rate_limit),
            listeners: RwLock::new(Vec::new()),
        })
    }
}
