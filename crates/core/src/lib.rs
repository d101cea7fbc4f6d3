//! # ThreatLink Core
//!
//! The authenticated request pipeline, with no network code of its own.
//!
//! This crate contains:
//! - Port interfaces (`Transport`, `RequestSigner`, `AuthEventListener`)
//! - `CredentialStore` and `SessionManager`
//! - `RequestDispatcher` with retry, backoff and rate-limit pacing
//! - The error classifier
//!
//! ## Architecture Principles
//! - Depends only on `threatlink-common` and `threatlink-domain`
//! - All I/O goes through the `Transport` trait
//! - Deterministic under `tokio::time::pause`

pub mod auth;
pub mod dispatch;

// Re-export commonly used items
pub use auth::{
    AuthEventListener, CredentialStore, HeaderKeySigner, RequestSigner, SessionManager,
    SigningContext,
};
pub use dispatch::{
    classify, classify_response, classify_transport, DispatcherBuilder, Outcome,
    RateLimitState, RateLimitTracker, RequestDispatcher, Transport, TransportFailure,
    TransportRequest, REQUEST_ID_HEADER,
};
