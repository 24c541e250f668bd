//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Start from a probed config file, or from defaults when none exists
//! 2. Apply `MINTFLOW_*` environment variables on top
//! 3. Validate the result
//!
//! ## Environment Variables
//! - `MINTFLOW_API_BASE_URL`: API origin, e.g. `https://api.mintflow.app`
//! - `MINTFLOW_API_TIMEOUT_SECS`: transport timeout per request
//! - `MINTFLOW_REFRESH_PATH`: token refresh endpoint path
//! - `MINTFLOW_KEYCHAIN_SERVICE`: keychain service name
//! - `MINTFLOW_KEYCHAIN_ACCOUNT`: keychain account name
//! - `MINTFLOW_QUERY_MAX_RETRIES`: retries for cached reads
//! - `MINTFLOW_QUERY_STALE_TIME_MS`: time before cached data goes stale
//! - `MINTFLOW_QUERY_CACHE_TIME_MS`: time before cached data is evicted
//! - `MINTFLOW_QUERY_REFETCH_ON_FOCUS`: revalidate on focus (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./mintflow.toml`, `./mintflow.json` (current working directory)
//! 2. `./config.toml`, `./config.json`
//! 3. The same names in the parent and grandparent directories
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use mintflow_domain::{ClientConfig, MintFlowError, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["mintflow.toml", "mintflow.json", "config.toml", "config.json"];

/// Load configuration from the first probed file (or defaults) with
/// environment overrides.
///
/// # Errors
/// Returns `MintFlowError::Config` if a probed file cannot be parsed, an
/// environment variable has an invalid value, or validation fails.
pub fn load() -> Result<ClientConfig> {
    let mut config = match probe_config_paths() {
        Some(path) => read_config_file(&path)?,
        None => {
            tracing::debug!("No config file found, starting from defaults");
            ClientConfig::default()
        }
    };

    apply_env_with(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    tracing::info!(base_url = %config.api.base_url, "Configuration loaded");
    Ok(config)
}

/// Load configuration from defaults and environment variables only.
///
/// # Errors
/// Returns `MintFlowError::Config` for invalid values.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::default();
    apply_env_with(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// extension (`.toml` or `.json`). Missing fields take their defaults.
///
/// # Errors
/// Returns `MintFlowError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MintFlowError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MintFlowError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    let config = read_config_file(&config_path)?;
    config.validate()?;
    Ok(config)
}

/// Apply `MINTFLOW_*` overrides read through `lookup`.
///
/// # Errors
/// Returns `MintFlowError::Config` naming the variable whose value does not
/// parse.
pub fn apply_env_with<F>(config: &mut ClientConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("MINTFLOW_API_BASE_URL") {
        config.api.base_url = url;
    }
    if let Some(secs) = parsed(&lookup, "MINTFLOW_API_TIMEOUT_SECS")? {
        config.api.timeout_secs = secs;
    }
    if let Some(path) = lookup("MINTFLOW_REFRESH_PATH") {
        config.api.refresh_path = path;
    }
    if let Some(service) = lookup("MINTFLOW_KEYCHAIN_SERVICE") {
        config.credentials.keychain_service = service;
    }
    if let Some(account) = lookup("MINTFLOW_KEYCHAIN_ACCOUNT") {
        config.credentials.account = account;
    }
    if let Some(retries) = parsed(&lookup, "MINTFLOW_QUERY_MAX_RETRIES")? {
        config.query.max_retries = retries;
    }
    if let Some(ms) = parsed(&lookup, "MINTFLOW_QUERY_STALE_TIME_MS")? {
        config.query.stale_time_ms = ms;
    }
    if let Some(ms) = parsed(&lookup, "MINTFLOW_QUERY_CACHE_TIME_MS")? {
        config.query.cache_time_ms = ms;
    }
    if let Some(value) = lookup("MINTFLOW_QUERY_REFETCH_ON_FOCUS") {
        config.query.refetch_on_focus = parse_bool(&value);
    }
    Ok(())
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn read_config_file(path: &Path) -> Result<ClientConfig> {
    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| MintFlowError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| MintFlowError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| MintFlowError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(MintFlowError::Config(format!("Unsupported config format: {extension}"))),
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| MintFlowError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
