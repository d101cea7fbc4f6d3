//! Configuration loader
//!
//! Loads [`ClientConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment, if present
//! 2. Attempts to load from `THREATLINK_*` environment variables
//! 3. If `THREATLINK_BASE_URL` is unset, falls back to a config file
//! 4. Validates the result
//!
//! ## Environment Variables
//! - `THREATLINK_BASE_URL`: API base URL (required for env loading)
//! - `THREATLINK_API_KEY` / `THREATLINK_API_SECRET`: static key pair
//! - `THREATLINK_BEARER_TOKEN`: pre-issued bearer token
//! - `THREATLINK_TIMEOUT_MS`: per-request timeout
//! - `THREATLINK_MAX_ATTEMPTS`: retry attempts, including the first
//! - `THREATLINK_RATE_LIMIT_MODE`: `wait` or `fail_fast`
//! - `THREATLINK_RATE_LIMIT_MAX_WAIT_MS`: longest accepted quota wait
//! - `THREATLINK_LOG_LEVEL`: fallback log filter when `RUST_LOG` is unset
//! - `THREATLINK_LOG_JSON`: JSON log output (true/false)
//!
//! ## File Locations
//! The loader probes, in order, `threatlink.{toml,json}` then
//! `config.{toml,json}` in the working directory, its parent, and next to
//! the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use threatlink_domain::{ClientConfig, ConfigError, RateLimitMode};

const FILE_NAMES: [&str; 4] = ["threatlink.toml", "threatlink.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `ConfigError` if neither source yields a valid configuration.
pub fn load() -> Result<ClientConfig, ConfigError> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(ConfigError::Missing(var)) => {
            tracing::debug!(missing = %var, "Environment incomplete, trying config file");
            load_from_file(None)?
        }
        Err(e) => return Err(e),
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from `THREATLINK_*` environment variables
///
/// Unset optional variables keep their defaults.
///
/// # Errors
/// `ConfigError::Missing` if `THREATLINK_BASE_URL` is unset,
/// `ConfigError::Invalid` for unparsable values.
pub fn load_from_env() -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::new(env_var("THREATLINK_BASE_URL")?);

    config.auth.api_key = optional_env("THREATLINK_API_KEY");
    config.auth.api_secret = optional_env("THREATLINK_API_SECRET");
    config.auth.bearer_token = optional_env("THREATLINK_BEARER_TOKEN");

    if let Some(ms) = env_parse::<u64>("THREATLINK_TIMEOUT_MS")? {
        config.timeout = Duration::from_millis(ms);
    }
    if let Some(attempts) = env_parse::<u32>("THREATLINK_MAX_ATTEMPTS")? {
        config.retry.max_attempts = attempts;
    }
    if let Some(mode) = optional_env("THREATLINK_RATE_LIMIT_MODE") {
        config.rate_limit.mode = parse_rate_limit_mode(&mode)?;
    }
    if let Some(ms) = env_parse::<u64>("THREATLINK_RATE_LIMIT_MAX_WAIT_MS")? {
        config.rate_limit.max_wait = Some(Duration::from_millis(ms));
    }
    if let Some(level) = optional_env("THREATLINK_LOG_LEVEL") {
        config.log.level = level;
    }
    config.log.json = env_bool("THREATLINK_LOG_JSON", config.log.json);

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. The format is
/// detected by extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `ConfigError` if no file is found, it cannot be read, or it does
/// not parse.
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::Missing(format!("config file {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ConfigError::Missing("config file in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|source| ConfigError::Io { path: config_path.clone(), source })?;

    parse_config(&contents, &config_path)
}

/// Parse configuration by file extension
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "TOML", message: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "JSON", message: e.to_string() }),
        other => Err(ConfigError::Invalid(format!("Unsupported config format: {other}"))),
    }
}

/// First existing config file among the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".."));
        dirs.insert(0, cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn env_var(key: &str) -> Result<String, ConfigError> {
    optional_env(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Set and non-empty
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::Invalid(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_rate_limit_mode(value: &str) -> Result<RateLimitMode, ConfigError> {
    match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "wait" => Ok(RateLimitMode::Wait),
        "fail_fast" => Ok(RateLimitMode::FailFast),
        other => Err(ConfigError::Invalid(format!("unknown rate limit mode '{other}'"))),
    }
}
