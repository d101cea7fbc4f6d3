//! Session login state machine
//!
//! ```text
//! create_session ──> Pending ──verify_session──> Verified
//!                                                   │
//!          401 / TTL elapsed / refresh failed ──────┼──> Expired
//!                                     logout ───────┴──> Revoked
//! ```
//!
//! A Verified session owns the bearer credential in the shared
//! [`CredentialStore`]; leaving Verified clears it. The manager never logs
//! in again on its own.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use threatlink_domain::{
    ApiError, ApiResult, BearerGrant, Credentials, RequestSpec, Session, SessionEndpoints,
    SessionState,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::credentials::CredentialStore;
use super::ports::AuthEventListener;
use crate::dispatch::dispatcher::RequestDispatcher;

const UNKNOWN_SESSION: &str = "unknown session";

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    #[serde(alias = "verificationCodeId")]
    verification_code_id: String,
}

#[derive(Debug, Serialize)]
struct VerifySessionRequest<'a> {
    verification_code_id: &'a str,
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

/// Token payload returned by verify and refresh
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(alias = "accessToken", alias = "access_token")]
    token: String,
    #[serde(default, alias = "expiresAt")]
    expires_at: Option<DateTime<Utc>>,
    /// Lifetime in seconds, used when no absolute expiry is given
    #[serde(default, alias = "expiresIn")]
    expires_in: Option<u64>,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_grant(self, now: DateTime<Utc>) -> ApiResult<BearerGrant> {
        if self.token.is_empty() {
            return Err(ApiError::Unknown {
                message: "server returned an empty token".into(),
                status: None,
                raw: String::new(),
            });
        }
        let expires_at = self.expires_at.or_else(|| {
            let secs = i64::try_from(self.expires_in?).ok()?;
            now.checked_add_signed(chrono::TimeDelta::try_seconds(secs)?)
        });
        Ok(BearerGrant { token: self.token, expires_at, refresh_token: self.refresh_token })
    }
}

#[derive(Debug, Clone)]
struct SessionRecord {
    session: Session,
    grant: Option<BearerGrant>,
}

impl SessionRecord {
    fn token(&self) -> Option<&str> {
        self.grant.as_ref().map(|grant| grant.token.as_str())
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.grant.as_ref().and_then(|grant| grant.expires_at)
    }
}

/// Owns the session login flow and the bearer credential it produces
pub struct SessionManager {
    dispatcher: Arc<RequestDispatcher>,
    credentials: Arc<CredentialStore>,
    endpoints: SessionEndpoints,
    current: Mutex<Option<SessionRecord>>,
}

impl SessionManager {
    /// Create a manager and subscribe it to the dispatcher's 401 events
    pub fn new(dispatcher: Arc<RequestDispatcher>, endpoints: SessionEndpoints) -> Arc<Self> {
        let credentials = Arc::clone(dispatcher.credentials());
        let manager = Arc::new(Self {
            dispatcher: Arc::clone(&dispatcher),
            credentials,
            endpoints,
            current: Mutex::new(None),
        });

        let listener: Arc<dyn AuthEventListener> = manager.clone();
        dispatcher.subscribe(Arc::downgrade(&listener));
        manager
    }

    /// Current session, with TTL expiry applied
    pub fn session(&self) -> Option<Session> {
        let mut current = self.current.lock();
        self.expire_if_elapsed(&mut current, Utc::now());
        current.as_ref().map(|record| record.session.clone())
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session().map(|session| session.state)
    }

    /// Expiry of the active bearer, if the session is Verified
    pub fn token_expires_at(&self) -> Option<DateTime<Utc>> {
        let current = self.current.lock();
        current
            .as_ref()
            .filter(|record| record.session.state == SessionState::Verified)
            .and_then(SessionRecord::expires_at)
    }

    /// Start a login: the server sends a verification code to `email`
    ///
    /// Replaces any existing session. A Verified predecessor's credential is
    /// cleared.
    #[instrument(skip(self))]
    pub async fn create_session(&self, email: &str) -> ApiResult<Session> {
        let spec = RequestSpec::post(self.endpoints.create.as_str())
            .json(&CreateSessionRequest { email })?
            .unauthenticated()
            .build();

        let response: CreateSessionResponse = self.dispatcher.execute_json(spec).await?;
        if response.verification_code_id.is_empty() {
            return Err(ApiError::Unknown {
                message: "server returned an empty verification code id".into(),
                status: None,
                raw: String::new(),
            });
        }

        let session = Session::pending(response.verification_code_id, email);
        let record = SessionRecord { session: session.clone(), grant: None };
        let previous = self.current.lock().replace(record);
        if let Some(previous) = previous {
            if let Some(token) = previous.token() {
                self.clear_credential_if(token);
            }
        }

        info!(verification_code_id = %session.verification_code_id, "Session created");
        Ok(session)
    }

    /// Complete a login with the code the user received
    ///
    /// # Errors
    ///
    /// `BadRequest("unknown session")` when `verification_code_id` does not
    /// name the current Pending session. A rejected code surfaces the
    /// server's error and leaves the session Pending.
    #[instrument(skip(self, code))]
    pub async fn verify_session(
        &self,
        verification_code_id: &str,
        code: &str,
    ) -> ApiResult<BearerGrant> {
        self.ensure_pending(verification_code_id)?;

        let spec = RequestSpec::post(self.endpoints.verify.as_str())
            .json(&VerifySessionRequest { verification_code_id, code })?
            .unauthenticated()
            .build();

        let response: TokenResponse = match self.dispatcher.execute_json(spec).await {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, "Verification rejected, session stays pending");
                return Err(err);
            }
        };
        let grant = response.into_grant(Utc::now())?;

        {
            let mut current = self.current.lock();
            let record = current
                .as_mut()
                .filter(|record| Self::is_pending(record, verification_code_id))
                .ok_or_else(|| ApiError::bad_request(UNKNOWN_SESSION))?;
            record.session.state = SessionState::Verified;
            record.grant = Some(grant.clone());
            self.credentials.set(Credentials::bearer(grant.token.clone(), grant.expires_at));
        }

        info!(expires_at = ?grant.expires_at, "Session verified");
        Ok(grant)
    }

    /// Exchange the current token for a fresh one
    ///
    /// On failure the session becomes Expired and the credential is cleared.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> ApiResult<BearerGrant> {
        let (token, refresh_token) = {
            let mut current = self.current.lock();
            self.expire_if_elapsed(&mut current, Utc::now());
            match current.as_ref() {
                Some(record) if record.session.state == SessionState::Verified => (
                    record.token().map(str::to_string),
                    record.grant.as_ref().and_then(|grant| grant.refresh_token.clone()),
                ),
                _ => return Err(ApiError::unauthorized("No verified session to refresh")),
            }
        };

        let spec = RequestSpec::post(self.endpoints.refresh.as_str())
            .json(&RefreshRequest { refresh_token: refresh_token.as_deref() })?
            .build();

        let result = match self.dispatcher.execute_json::<TokenResponse>(spec).await {
            Ok(response) => response.into_grant(Utc::now()),
            Err(err) => Err(err),
        };

        let mut current = self.current.lock();
        let Some(record) = current.as_mut().filter(|record| {
            record.session.state == SessionState::Verified && record.token() == token.as_deref()
        }) else {
            // A 401 during the refresh already expired the session.
            return Err(result
                .err()
                .unwrap_or_else(|| ApiError::unauthorized("Session ended during refresh")));
        };

        match result {
            Ok(grant) => {
                record.grant = Some(grant.clone());
                self.credentials.set(Credentials::bearer(grant.token.clone(), grant.expires_at));
                info!(expires_at = ?grant.expires_at, "Session token refreshed");
                Ok(grant)
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, session expired");
                record.session.state = SessionState::Expired;
                if let Some(token) = &token {
                    self.clear_credential_if(token);
                }
                Err(err)
            }
        }
    }

    /// Refresh when the token expires within `threshold`
    ///
    /// Returns whether a refresh happened.
    pub async fn refresh_if_expiring(&self, threshold: Duration) -> ApiResult<bool> {
        let Some(expires_at) = self.token_expires_at() else {
            return Ok(false);
        };
        let due = match chrono::Duration::from_std(threshold) {
            Ok(threshold) => expires_at
                .checked_sub_signed(threshold)
                .map_or(true, |refresh_at| Utc::now() >= refresh_at),
            Err(_) => true,
        };
        if !due {
            return Ok(false);
        }
        self.refresh().await.map(|_| true)
    }

    /// End the session: Revoked, credential cleared. Idempotent.
    ///
    /// The server-side revoke is best effort; its failure is logged only.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let active = {
            let current = self.current.lock();
            current
                .as_ref()
                .filter(|record| record.session.state == SessionState::Verified)
                .and_then(|record| record.token().map(str::to_string))
        };

        if let (Some(_), Some(path)) = (&active, &self.endpoints.revoke) {
            let spec = RequestSpec::post(path.as_str()).build();
            if let Err(err) = self.dispatcher.execute(spec).await {
                warn!(error = %err, "Server-side session revoke failed");
            }
        }

        let mut current = self.current.lock();
        if let Some(record) = current.as_mut() {
            if record.session.state != SessionState::Revoked {
                if let Some(token) = record.token() {
                    self.clear_credential_if(token);
                }
                record.session.state = SessionState::Revoked;
                info!("Session revoked");
            }
        }
    }

    /// Periodically refresh the token before it expires
    ///
    /// The task stops when `cancel` fires or the manager is dropped.
    pub fn spawn_auto_refresh(
        self: &Arc<Self>,
        interval: Duration,
        threshold: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        tokio::spawn(async move {
            Self::refresh_loop(manager, interval, threshold, cancel).await;
        })
    }

    async fn refresh_loop(
        manager: Weak<Self>,
        interval: Duration,
        threshold: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Auto refresh cancelled");
                    break;
                }
                () = tokio::time::sleep(interval) => {
                    let Some(manager) = manager.upgrade() else {
                        break;
                    };
                    match manager.refresh_if_expiring(threshold).await {
                        Ok(true) => debug!("Auto refresh renewed the session token"),
                        Ok(false) => {}
                        Err(err) => warn!(error = %err, "Auto refresh failed"),
                    }
                }
            }
        }
    }

    fn ensure_pending(&self, verification_code_id: &str) -> ApiResult<()> {
        let current = self.current.lock();
        match current.as_ref() {
            Some(record) if Self::is_pending(record, verification_code_id) => Ok(()),
            _ => Err(ApiError::bad_request(UNKNOWN_SESSION)),
        }
    }

    fn is_pending(record: &SessionRecord, verification_code_id: &str) -> bool {
        record.session.verification_code_id == verification_code_id
            && record.session.state == SessionState::Pending
    }

    fn expire_if_elapsed(&self, current: &mut Option<SessionRecord>, now: DateTime<Utc>) {
        let Some(record) = current.as_mut() else {
            return;
        };
        let elapsed = record.expires_at().is_some_and(|expires_at| now >= expires_at);
        if record.session.state == SessionState::Verified && elapsed {
            info!("Session token TTL elapsed, session expired");
            record.session.state = SessionState::Expired;
            if let Some(token) = record.token() {
                self.clear_credential_if(token);
            }
        }
    }

    /// Clear the store only if it still holds this session's token
    fn clear_credential_if(&self, token: &str) {
        if self.credentials.snapshot().bearer_token() == Some(token) {
            self.credentials.set(Credentials::None);
        }
    }
}

impl AuthEventListener for SessionManager {
    fn on_unauthorized(&self, token: &str) {
        let mut current = self.current.lock();
        let Some(record) = current.as_mut() else {
            return;
        };
        if record.session.state == SessionState::Verified && record.token() == Some(token) {
            info!("Bearer rejected, session expired");
            record.session.state = SessionState::Expired;
            self.clear_credential_if(token);
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("endpoints", &self.endpoints)
            .field("state", &self.current.lock().as_ref().map(|r| r.session.state))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_expires_in() {
        let now = Utc::now();
        let response: TokenResponse =
            serde_json::from_str(r#"{"token":"t","expiresIn":60,"refreshToken":"r"}"#).unwrap();
        let grant = response.into_grant(now).unwrap();
        assert_eq!(grant.expires_at, Some(now + chrono::Duration::seconds(60)));
        assert_eq!(grant.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_token_response_out_of_range_expiry() {
        for body in [
            r#"{"token":"t","expires_in":10000000000000000}"#,
            r#"{"token":"t","expires_in":18446744073709551615}"#,
        ] {
            let response: TokenResponse = serde_json::from_str(body).unwrap();
            let grant = response.into_grant(Utc::now()).unwrap();
            assert_eq!(grant.token, "t");
            assert_eq!(grant.expires_at, None, "{body}");
        }
    }

    #[test]
    fn test_token_response_absolute_expiry_wins() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"t","expires_at":"2030-01-01T00:00:00Z","expires_in":5}"#,
        )
        .unwrap();
        let grant = response.into_grant(Utc::now()).unwrap();
        assert_eq!(grant.expires_at.unwrap().to_rfc3339(), "2030-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_empty_token_rejected() {
        let response: TokenResponse = serde_json::from_str(r#"{"token":""}"#).unwrap();
        assert!(matches!(response.into_grant(Utc::now()), Err(ApiError::Unknown { .. })));
    }
}
