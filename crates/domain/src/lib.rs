//! # ThreatLink Domain
//!
//! Data types and error definitions for the ThreatLink client.
//!
//! This crate contains:
//! - Credentials, sessions, request and response types
//! - The `ApiError` taxonomy every request resolves to
//! - Client configuration (`ClientConfig`, `RetryPolicy`, ...)
//!
//! ## Architecture
//! - Depends only on `threatlink-common` among ThreatLink crates
//! - No I/O: plain data and validation

pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
