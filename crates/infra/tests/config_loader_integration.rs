//! Integration tests for configuration loading
//!
//! Config files on disk through to a ready client.

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use threatlink_domain::{AuthMode, ConfigError, RateLimitMode};
use threatlink_infra::{config, ThreatLinkClient};

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn toml_file_produces_configured_client() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "threatlink.toml",
        r#"
            base_url = "https://intel.example.com/api"
            timeout_ms = 5000

            [retry]
            max_attempts = 5
            base_delay_ms = 50

            [rate_limit]
            mode = "fail_fast"

            [auth]
            api_key = "key"
            api_secret = "secret"
            key_header = "X-TL-Key"

            [session]
            revoke = "/v2/logout"
        "#,
    );

    let config = config::load_from_file(Some(path)).unwrap();
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay, Duration::from_millis(50));
    assert_eq!(config.rate_limit.mode, RateLimitMode::FailFast);
    assert_eq!(config.session.revoke.as_deref(), Some("/v2/logout"));
    assert_eq!(config.session.create, "/v1/auth/session");

    let client = ThreatLinkClient::from_config(&config).unwrap();
    assert_eq!(client.credentials().get().mode(), AuthMode::ApiKey);
    assert_eq!(client.dispatcher().base_url().as_str(), "https://intel.example.com/api");
}

#[test]
fn json_file_with_bearer_token() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "config.json",
        r#"{"base_url": "http://localhost:8080", "auth": {"bearer_token": "tok"}}"#,
    );

    let config = config::load_from_file(Some(path)).unwrap();
    let client = ThreatLinkClient::from_config(&config).unwrap();

    assert_eq!(client.credentials().get().bearer_token(), Some("tok"));
}

#[test]
fn half_configured_key_pair_is_rejected_at_construction() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "threatlink.toml",
        r#"
            base_url = "https://intel.example.com"
            [auth]
            api_key = "key"
        "#,
    );

    let config = config::load_from_file(Some(path)).unwrap();
    let err = ThreatLinkClient::from_config(&config).unwrap_err();

    assert!(matches!(err, ConfigError::Missing(_)));
}

#[test]
fn inverted_retry_delays_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "threatlink.toml",
        r#"
            [retry]
            base_delay_ms = 5000
            max_delay_ms = 100
        "#,
    );

    let config = config::load_from_file(Some(path)).unwrap();

    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn malformed_file_reports_format() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "threatlink.toml", "base_url = [");

    let err = config::load_from_file(Some(path)).unwrap_err();

    assert!(matches!(err, ConfigError::Parse { format: "TOML", .. }));
}
