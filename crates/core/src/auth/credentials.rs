//! Holder of the active credentials

use std::sync::Arc;

use parking_lot::RwLock;
use threatlink_domain::Credentials;
use tracing::debug;

/// The single active [`Credentials`] value of a client
///
/// Writers swap the whole value; readers always see either the old or the
/// new credentials, never a mix.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: RwLock<Arc<Credentials>>,
}

impl CredentialStore {
    pub fn new(initial: Credentials) -> Self {
        Self { current: RwLock::new(Arc::new(initial)) }
    }

    /// The most recently set credentials
    pub fn get(&self) -> Credentials {
        self.current.read().as_ref().clone()
    }

    /// Cheap shared handle to the current value
    pub fn snapshot(&self) -> Arc<Credentials> {
        Arc::clone(&self.current.read())
    }

    /// Replace the active credentials
    pub fn set(&self, credentials: Credentials) {
        debug!(mode = credentials.mode().as_str(), "Credentials replaced");
        *self.current.write() = Arc::new(credentials);
    }
}
