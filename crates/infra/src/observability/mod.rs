//! Tracing subscriber setup
//!
//! The library itself only emits `tracing` events; applications that want
//! them on stderr call [`init_tracing`] once at startup.

use threatlink_domain::{ConfigError, LogConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. Output is JSON when
/// `config.json` is true.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` for an unparseable level, or when a
/// global subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = build_filter(config)?;
    let registry = Registry::default().with(filter);

    let result = if config.json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true).with_writer(std::io::stderr)).try_init()
    };

    result.map_err(|err| ConfigError::Invalid(format!("tracing already initialised: {err}")))
}

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn build_filter(config: &LogConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|err| ConfigError::Invalid(format!("log level '{}': {err}", config.level)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LogConfig {
        LogConfig { level: level.to_string(), ..LogConfig::default() }
    }

    #[test]
    fn configured_level_is_used_without_rust_log() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let filter = build_filter(&config("threatlink_core=debug,warn")).unwrap();
        assert!(filter.to_string().contains("threatlink_core=debug"));
    }

    #[test]
    fn garbage_level_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = build_filter(&config("threatlink_core=notalevel")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn second_init_reports_error() {
        let _ = init_tracing(&config("warn"));
        assert!(init_tracing(&config("warn")).is_err());
    }
}
