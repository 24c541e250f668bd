//! Client configuration
//!
//! Every field has a default so partial files and environment overrides are
//! enough to build a working configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    DEFAULT_BASE_URL, DEFAULT_CACHE_TIME_MS, DEFAULT_KEYCHAIN_ACCOUNT, DEFAULT_KEYCHAIN_SERVICE,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
    DEFAULT_STALE_TIME_MS, DEFAULT_TIMEOUT_SECS, MAX_MUTATION_RETRIES, REFRESH_PATH,
};
use crate::errors::{MintFlowError, Result};

/// Top-level configuration for a MintFlow client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub credentials: CredentialConfig,
    pub query: QueryDefaults,
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL all endpoint paths are joined onto.
    pub base_url: String,
    /// Fixed per-request transport timeout.
    pub timeout_secs: u64,
    /// Path of the token refresh endpoint.
    pub refresh_path: String,
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_path: REFRESH_PATH.to_string(),
            user_agent: format!("mintflow-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Where credentials are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub keychain_service: String,
    pub account: String,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            account: DEFAULT_KEYCHAIN_ACCOUNT.to_string(),
        }
    }
}

/// Defaults applied to queries and mutations unless overridden per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    /// Age after which cached data is stale but still served.
    pub stale_time_ms: u64,
    /// Age after which an entry is evicted.
    pub cache_time_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub refetch_on_focus: bool,
    /// Clamped to at most one retry when used.
    pub mutation_max_retries: u32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            stale_time_ms: DEFAULT_STALE_TIME_MS,
            cache_time_ms: DEFAULT_CACHE_TIME_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            refetch_on_focus: true,
            mutation_max_retries: MAX_MUTATION_RETRIES,
        }
    }
}

impl QueryDefaults {
    /// Mutation retries after clamping.
    #[must_use]
    pub fn effective_mutation_retries(&self) -> u32 {
        self.mutation_max_retries.min(MAX_MUTATION_RETRIES)
    }
}

impl ClientConfig {
    /// Check the configuration for values the client cannot work with.
    ///
    /// # Errors
    /// Returns [`MintFlowError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.api.timeout_secs == 0 {
            return Err(MintFlowError::Config("api.timeout_secs must be greater than 0".into()));
        }
        if !self.api.refresh_path.starts_with('/') {
            return Err(MintFlowError::Config(format!(
                "api.refresh_path must start with '/': {}",
                self.api.refresh_path
            )));
        }
        if self.credentials.keychain_service.trim().is_empty() {
            return Err(MintFlowError::Config("credentials.keychain_service is empty".into()));
        }
        if self.query.stale_time_ms > self.query.cache_time_ms {
            return Err(MintFlowError::Config(format!(
                "query.stale_time_ms ({}) exceeds query.cache_time_ms ({})",
                self.query.stale_time_ms, self.query.cache_time_ms
            )));
        }
        if self.query.retry_base_delay_ms > self.query.retry_max_delay_ms {
            return Err(MintFlowError::Config(
                "query.retry_base_delay_ms exceeds query.retry_max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    /// Parsed base URL.
    ///
    /// # Errors
    /// Returns [`MintFlowError::Config`] if the URL is empty, malformed, or
    /// not http(s).
    pub fn base_url(&self) -> Result<Url> {
        let raw = self.api.base_url.trim();
        if raw.is_empty() {
            return Err(MintFlowError::Config("api.base_url is empty".into()));
        }
        let url = Url::parse(raw)
            .map_err(|e| MintFlowError::Config(format!("api.base_url is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MintFlowError::Config(format!(
                "api.base_url must be http or https, got {}",
                url.scheme()
            )));
        }
        Ok(url)
    }
}
