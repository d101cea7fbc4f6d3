//! Client facade tying configuration, transport, dispatcher and sessions

use std::sync::Arc;

use threatlink_core::{CredentialStore, RequestDispatcher, SessionManager, Transport};
use threatlink_domain::{ClientConfig, ConfigError, RequestSpec};
use tracing::{debug, info};

use super::analytics::AnalyticsClient;
use super::feeds::FeedsClient;
use super::ingest::{BatchConfig, IngestClient};
use super::search::SearchClient;
use crate::http::ReqwestTransport;

const HEALTH_PATH: &str = "/health";

/// One independent ThreatLink client.
///
/// Each instance owns its credentials and rate-limit state; several clients
/// in one process never share either. Domain clients handed out by the
/// accessors all go through the same dispatcher.
#[derive(Debug, Clone)]
pub struct ThreatLinkClient {
    dispatcher: Arc<RequestDispatcher>,
    sessions: Arc<SessionManager>,
}

impl ThreatLinkClient {
    /// Build a client talking HTTP through reqwest
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration does not validate or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::from_config(config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client from the environment or a discovered config file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no configuration can be loaded, it does not
    /// validate, or the HTTP client cannot be built.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_config(&crate::config::load()?)
    }

    /// Build a client over any [`Transport`]
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration does not validate.
    pub fn with_transport(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let dispatcher = Arc::new(RequestDispatcher::from_config(config, transport)?);
        let sessions = SessionManager::new(Arc::clone(&dispatcher), config.session.clone());

        info!(
            base_url = %dispatcher.base_url(),
            auth = ?dispatcher.credentials().get().mode(),
            "threatlink client ready"
        );
        Ok(Self { dispatcher, sessions })
    }

    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        self.dispatcher.credentials()
    }

    pub fn search(&self) -> SearchClient {
        SearchClient::new(Arc::clone(&self.dispatcher))
    }

    pub fn analytics(&self) -> AnalyticsClient {
        AnalyticsClient::new(Arc::clone(&self.dispatcher))
    }

    pub fn feeds(&self) -> FeedsClient {
        FeedsClient::new(Arc::clone(&self.dispatcher))
    }

    pub fn ingest(&self) -> IngestClient {
        IngestClient::new(Arc::clone(&self.dispatcher))
    }

    pub fn ingest_with(&self, config: BatchConfig) -> IngestClient {
        IngestClient::with_config(Arc::clone(&self.dispatcher), config)
    }

    /// Whether the API answers its unauthenticated health endpoint with 2xx
    pub async fn health_check(&self) -> bool {
        let spec = RequestSpec::get(HEALTH_PATH).unauthenticated().build();
        match self.dispatcher.execute(spec).await {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "health check failed");
                false
            }
        }
    }
}
