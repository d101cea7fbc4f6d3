//! Typed ThreatLink API surface
//!
//! [`ThreatLinkClient`] wires a transport, a dispatcher and a session
//! manager together and hands out thin domain clients. Domain clients only
//! shape payloads; credentials, retries and error mapping happen in the
//! dispatcher.

pub mod analytics;
pub mod client;
pub mod feeds;
pub mod ingest;
pub mod models;
pub mod search;

pub use analytics::{AnalyticsClient, AnalyticsSummary, Interval, TimeRange, TimelinePoint};
pub use client::ThreatLinkClient;
pub use feeds::{Feed, FeedsClient};
pub use ingest::{BatchConfig, BatchSubmissionResult, IngestClient, IngestReceipt, NewIndicator};
pub use models::{Indicator, IndicatorType, Page};
pub use search::{IndicatorQuery, SearchClient};
