//! Client assembly
//!
//! Wires credential store → refresh coordinator → executor → query client →
//! [`MintFlowApi`]. Hosts normally call [`MintFlowClient::from_config`];
//! tests and embedders substitute parts through [`MintFlowClient::builder`].

use std::sync::Arc;
use std::time::Duration;

use mintflow_common::resilience::{Clock, SystemClock};
use mintflow_common::security::KeychainProvider;
use mintflow_domain::{ClientConfig, MintFlowError};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::api::{
    CredentialStore, Credentials, HttpTokenRefresher, KeychainCredentialStore, RefreshCoordinator,
    RequestExecutor, SessionEvent, SessionEvents, TokenRefresher,
};
use crate::http::HttpClient;
use crate::query::{MutationConfig, QueryClient, QueryConfig};
use crate::resources::MintFlowApi;

/// Upper bound on the default sweep interval for expired queries.
const MAX_GC_INTERVAL: Duration = Duration::from_secs(60);
const MIN_GC_INTERVAL: Duration = Duration::from_millis(1);

/// A fully wired MintFlow client.
#[derive(Debug, Clone)]
pub struct MintFlowClient {
    config: ClientConfig,
    coordinator: Arc<RefreshCoordinator>,
    api: MintFlowApi,
}

impl MintFlowClient {
    pub fn builder() -> MintFlowClientBuilder {
        MintFlowClientBuilder::default()
    }

    /// Client backed by the platform keychain and the HTTP refresh endpoint.
    ///
    /// # Errors
    /// Returns `MintFlowError::Config` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, MintFlowError> {
        Self::builder().config(config.clone()).build()
    }

    /// Restore the persisted session, if any. Call once at start-up.
    ///
    /// # Errors
    /// Returns `MintFlowError::Keychain` if the keychain cannot be read.
    pub fn load_credentials(&self) -> Result<bool, MintFlowError> {
        Ok(self.coordinator.resume()?)
    }

    pub fn api(&self) -> &MintFlowApi {
        &self.api
    }

    pub fn queries(&self) -> &QueryClient {
        self.api.queries()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.coordinator.session().subscribe()
    }

    pub fn credentials(&self) -> Credentials {
        self.coordinator.credentials()
    }

    /// Number of token refresh calls sent so far.
    pub fn refresh_count(&self) -> u64 {
        self.coordinator.refresh_count()
    }
}

#[derive(Default)]
pub struct MintFlowClientBuilder {
    config: ClientConfig,
    credential_store: Option<Arc<dyn CredentialStore>>,
    token_refresher: Option<Arc<dyn TokenRefresher>>,
    clock: Option<Arc<dyn Clock>>,
    gc_interval: Option<Duration>,
}

impl MintFlowClientBuilder {
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the keychain-backed store.
    #[must_use]
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// Replace the HTTP refresh call.
    #[must_use]
    pub fn token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.token_refresher = Some(refresher);
        self
    }

    /// Clock the query cache measures staleness with.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// How often expired queries are swept. Defaults to the cache time,
    /// capped at one minute.
    #[must_use]
    pub fn gc_interval(mut self, every: Duration) -> Self {
        self.gc_interval = Some(every);
        self
    }

    /// Assemble the client. Inside a Tokio runtime this also starts the
    /// collector that evicts expired queries; it stops once every clone of
    /// the client is dropped.
    ///
    /// # Errors
    /// Returns `MintFlowError::Config` if the configuration is invalid or the
    /// HTTP client cannot be built.
    pub fn build(self) -> Result<MintFlowClient, MintFlowError> {
        let config = self.config;
        config.validate()?;

        let timeout = Duration::from_secs(config.api.timeout_secs);
        let http =
            HttpClient::builder().timeout(timeout).user_agent(config.api.user_agent.clone()).build()?;

        let store: Arc<dyn CredentialStore> = match self.credential_store {
            Some(store) => store,
            None => Arc::new(KeychainCredentialStore::new(
                KeychainProvider::new(config.credentials.keychain_service.clone()),
                config.credentials.account.clone(),
            )),
        };
        let refresher: Arc<dyn TokenRefresher> = match self.token_refresher {
            Some(refresher) => refresher,
            None => Arc::new(HttpTokenRefresher::new(
                http.clone(),
                &config.api.base_url,
                &config.api.refresh_path,
            )),
        };

        let coordinator = Arc::new(RefreshCoordinator::new(
            store,
            refresher,
            Arc::new(SessionEvents::new()),
            timeout,
        ));
        let executor =
            Arc::new(RequestExecutor::new(http, &config.api.base_url, Arc::clone(&coordinator)));

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let query_config = QueryConfig::from(&config.query);
        let gc_interval = self
            .gc_interval
            .unwrap_or_else(|| query_config.cache_time.min(MAX_GC_INTERVAL))
            .max(MIN_GC_INTERVAL);
        let queries = QueryClient::with_clock(query_config, clock);
        if Handle::try_current().is_ok() {
            queries.spawn_garbage_collector(gc_interval);
        } else {
            debug!("no async runtime, expired queries are evicted on access only");
        }
        let api = MintFlowApi::new(executor, queries, MutationConfig::from(&config.query));

        info!(base_url = %config.api.base_url, "MintFlow client ready");
        Ok(MintFlowClient { config, coordinator, api })
    }
}
