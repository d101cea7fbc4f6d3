//! Credentials, API-key signing and the session login flow

pub mod credentials;
pub mod ports;
pub mod session;
pub mod signing;

pub use credentials::CredentialStore;
pub use ports::{AuthEventListener, RequestSigner, SigningContext};
pub use session::SessionManager;
pub use signing::HeaderKeySigner;
