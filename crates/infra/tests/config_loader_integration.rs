//! Integration tests for configuration loading
//!
//! Env-driven paths are exercised through `apply_env_with` so the suite never
//! mutates the process environment.

use std::fs;

use mintflow_domain::MintFlowError;
use mintflow_infra::config::{apply_env_with, load_from_file};
use mintflow_infra::MintFlowClient;
use tempfile::TempDir;

const FULL_TOML: &str = r#"
[api]
base_url = "https://api.mintflow.app"
timeout_secs = 15
refresh_path = "/api/v1/auth/refresh"

[credentials]
keychain_service = "MintFlow.staging"
account = "ada"

[query]
stale_time_ms = 10000
cache_time_ms = 60000
max_retries = 2
mutation_max_retries = 4
"#;

#[test]
fn file_then_env_overrides_build_a_client() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mintflow.toml");
    fs::write(&path, FULL_TOML).unwrap();

    let mut config = load_from_file(Some(path)).unwrap();
    apply_env_with(&mut config, |key| {
        (key == "MINTFLOW_QUERY_MAX_RETRIES").then(|| "1".to_string())
    })
    .unwrap();

    assert_eq!(config.api.base_url, "https://api.mintflow.app");
    assert_eq!(config.api.timeout_secs, 15);
    assert_eq!(config.credentials.keychain_service, "MintFlow.staging");
    assert_eq!(config.query.max_retries, 1);
    assert_eq!(config.query.effective_mutation_retries(), 1);

    let client = MintFlowClient::from_config(&config).unwrap();
    assert_eq!(client.queries().defaults().max_retries, 1);
}

#[test]
fn json_config_is_accepted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mintflow.json");
    fs::write(&path, r#"{"api": {"base_url": "https://api.mintflow.app"}}"#).unwrap();

    let config = load_from_file(Some(path)).unwrap();
    assert_eq!(config.api.base_url, "https://api.mintflow.app");
    assert_eq!(config.query.stale_time_ms, 30_000);
}

#[test]
fn invalid_base_url_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mintflow.toml");
    fs::write(&path, "[api]\nbase_url = \"not a url\"\n").unwrap();

    assert!(matches!(load_from_file(Some(path)), Err(MintFlowError::Config(_))));
}
