//! Single-flight access token refresh
//!
//! # State machine
//!
//! ```text
//! Idle ──refresh()──▶ InFlight ──(ok: store.set | err: store.clear)──▶ Idle
//! ```
//!
//! The first caller that finds the coordinator idle spawns the refresh task
//! and publishes a [`Shared`] handle to it; every caller that arrives while
//! the task runs awaits the same handle. The task owns the outcome: it writes
//! or clears the credential store and returns the coordinator to idle before
//! any waiter observes the result, so a dropped caller can never leave the
//! coordinator stuck.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use mintflow_common::error::{classify, ClassifiedError, RawFailure};
use mintflow_domain::constants::REQUEST_ID_HEADER;
use mintflow_domain::{RefreshRequest, TokenResponse};
use parking_lot::Mutex;
use reqwest::Method;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::credentials::{CredentialError, CredentialStore, Credentials};
use super::session::{SessionEndReason, SessionEvents};
use crate::http::client::{status_failure, transport_failure};
use crate::http::HttpClient;

/// Exchanges a refresh token for a new token pair.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns the new pair; `refresh_token` is `None` when the server does
    /// not rotate it.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ClassifiedError>;
}

/// Calls the MintFlow refresh endpoint.
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    http: HttpClient,
    endpoint: String,
}

impl HttpTokenRefresher {
    /// `refresh_path` is appended to `base_url`.
    pub fn new(http: HttpClient, base_url: &str, refresh_path: &str) -> Self {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), refresh_path);
        Self { http, endpoint }
    }

    /// Full refresh URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ClassifiedError> {
        let body = RefreshRequest { refresh_token: refresh_token.to_string() };
        let builder = self
            .http
            .request(Method::POST, &self.endpoint)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .json(&body);

        let response = self.http.send(builder).await.map_err(|raw| classify(&raw))?;
        if !response.status().is_success() {
            return Err(classify(&status_failure(response).await));
        }

        let text = response.text().await.map_err(|err| classify(&transport_failure(&err)))?;
        serde_json::from_str(&text).map_err(|err| {
            classify(&RawFailure::MalformedResponse { message: err.to_string() })
        })
    }
}

type RefreshHandle = Shared<BoxFuture<'static, Result<String, ClassifiedError>>>;

enum RefreshState {
    Idle,
    InFlight { generation: u64, handle: RefreshHandle },
}

/// Process-wide owner of every credential write.
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    session: Arc<SessionEvents>,
    state: Arc<Mutex<RefreshState>>,
    generation: AtomicU64,
    refresh_count: Arc<AtomicU64>,
    refresh_timeout: Duration,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("refresh_count", &self.refresh_count())
            .field("refresh_timeout", &self.refresh_timeout)
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        session: Arc<SessionEvents>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            store,
            refresher,
            session,
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            generation: AtomicU64::new(0),
            refresh_count: Arc::new(AtomicU64::new(0)),
            refresh_timeout,
        }
    }

    /// Current credentials.
    pub fn credentials(&self) -> Credentials {
        self.store.get()
    }

    /// Session signal this coordinator ends when credentials are lost.
    pub fn session(&self) -> &Arc<SessionEvents> {
        &self.session
    }

    /// Number of refresh calls sent to the network so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Whether a refresh call is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::InFlight { .. })
    }

    /// Store credentials from a successful sign-in and start a session.
    pub fn install(&self, credentials: Credentials) -> Result<(), CredentialError> {
        self.store.set(credentials)?;
        self.session.started();
        info!("session started");
        Ok(())
    }

    /// Restore a persisted session. Returns whether one was found.
    pub fn resume(&self) -> Result<bool, CredentialError> {
        let restored = self.store.load()?;
        if restored {
            self.session.resume();
            debug!("persisted session restored");
        }
        Ok(restored)
    }

    /// Forget the credentials and end the session.
    pub fn sign_out(&self) -> Result<(), CredentialError> {
        self.store.clear()?;
        self.session.ended(SessionEndReason::SignedOut);
        Ok(())
    }

    /// Obtain a usable access token after `rejected` was refused with 401.
    ///
    /// Joins the in-flight refresh if there is one. If the store already holds
    /// a different access token, another caller refreshed or signed in in the
    /// meantime and that token is returned without a network call. A request
    /// sent without a token (`rejected` is `None`) counts as stale as soon as
    /// the store holds one.
    ///
    /// # Errors
    /// Returns an `AuthError` when the session cannot be renewed; the store has
    /// been cleared by then and the caller must not retry.
    pub async fn refresh(&self, rejected: Option<&str>) -> Result<String, ClassifiedError> {
        let handle = {
            let mut state = self.state.lock();
            if let RefreshState::InFlight { handle, .. } = &*state {
                debug!("joining in-flight token refresh");
                handle.clone()
            } else {
                let current = self.store.get();
                if let Some(bearer) = current.bearer() {
                    if rejected != Some(bearer) {
                        return Ok(bearer.to_string());
                    }
                }

                let Some(refresh_token) = current.refresh_token.clone() else {
                    drop(state);
                    return Err(self.fail_without_refresh_token(&current));
                };

                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let handle = self.spawn_refresh(generation, refresh_token);
                *state = RefreshState::InFlight { generation, handle: handle.clone() };
                handle
            }
        };

        handle.await
    }

    /// End the session because `token`, returned by a successful refresh, was
    /// refused again with `cause`.
    ///
    /// The store is cleared only while it still holds `token`, so a sign-in
    /// that happened in the meantime survives. Returns the terminal error to
    /// surface to the caller.
    pub fn reject(&self, token: &str, cause: ClassifiedError) -> ClassifiedError {
        let _state = self.state.lock();
        if self.store.get().bearer() == Some(token) {
            warn!(status = ?cause.http_status, "refreshed access token rejected");
            if let Err(err) = self.store.clear() {
                warn!(error = %err, "failed to clear credentials");
            }
            self.session.ended(SessionEndReason::Rejected(cause.clone()));
        }
        ClassifiedError::session_expired_with_status(
            format!("refreshed access token was rejected: {}", cause.message),
            cause.http_status,
        )
    }

    fn fail_without_refresh_token(&self, current: &Credentials) -> ClassifiedError {
        if current.is_authenticated() {
            if let Err(err) = self.store.clear() {
                warn!(error = %err, "failed to clear credentials");
            }
            self.session.ended(SessionEndReason::MissingRefreshToken);
        }
        ClassifiedError::session_expired("no refresh token available")
    }

    fn spawn_refresh(&self, generation: u64, refresh_token: String) -> RefreshHandle {
        let store = Arc::clone(&self.store);
        let refresher = Arc::clone(&self.refresher);
        let session = Arc::clone(&self.session);
        let state = Arc::clone(&self.state);
        let timeout = self.refresh_timeout;
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        debug!(generation, "starting token refresh");

        let task = tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, refresher.refresh(&refresh_token)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(classify(&RawFailure::transport("token refresh timed out", true))),
            };

            let result = outcome.and_then(|tokens| {
                let access_token = tokens.access_token;
                let credentials = Credentials {
                    access_token: Some(access_token.clone()),
                    refresh_token: tokens.refresh_token.or(Some(refresh_token)),
                };
                store.set(credentials).map(|()| access_token).map_err(|err| {
                    ClassifiedError::session_expired(format!(
                        "refreshed credentials could not be stored: {err}"
                    ))
                })
            });

            let result = match result {
                Ok(access_token) => {
                    info!(generation, "access token refreshed");
                    Ok(access_token)
                }
                Err(cause) => {
                    warn!(generation, kind = %cause.kind, error = %cause.message, "token refresh failed");
                    if let Err(err) = store.clear() {
                        warn!(error = %err, "failed to clear credentials");
                    }
                    let err = session_expired(&cause);
                    session.ended(SessionEndReason::RefreshFailed(cause));
                    Err(err)
                }
            };

            let mut state = state.lock();
            if matches!(&*state, RefreshState::InFlight { generation: current, .. } if *current == generation)
            {
                *state = RefreshState::Idle;
            }
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(err) => Err(ClassifiedError::session_expired(format!(
                    "token refresh task failed: {err}"
                ))),
            }
        }
        .boxed()
        .shared()
    }
}

fn session_expired(cause: &ClassifiedError) -> ClassifiedError {
    ClassifiedError::session_expired_with_status(
        format!("token refresh failed: {}", cause.message),
        cause.http_status,
    )
}
