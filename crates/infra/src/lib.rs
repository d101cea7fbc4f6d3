//! # ThreatLink Infrastructure
//!
//! Adapters and the public client surface.
//!
//! This crate contains:
//! - The reqwest-backed [`Transport`](threatlink_core::Transport)
//! - Configuration loading from the environment and config files
//! - Tracing subscriber setup
//! - The `ThreatLinkClient` facade and its Search/Analytics/Feeds/Ingest
//!   clients
//!
//! ## Architecture
//! - Implements ports defined in `threatlink-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{
    AnalyticsClient, BatchConfig, BatchSubmissionResult, FeedsClient, IngestClient, SearchClient,
    ThreatLinkClient,
};
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use observability::init_tracing;
