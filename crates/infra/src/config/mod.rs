//! Configuration loading
//!
//! Builds a [`ClientConfig`](threatlink_domain::ClientConfig) from
//! environment variables, `.env` files and TOML/JSON config files.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
