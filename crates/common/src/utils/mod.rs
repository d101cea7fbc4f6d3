//! Small helpers that do not belong to a larger module

pub mod serde;
