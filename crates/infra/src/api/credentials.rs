//! Credential storage for the MintFlow access/refresh token pair
//!
//! The store is a passive holder: it never talks to the API. Only the refresh
//! coordinator writes to it (see [`super::refresh::RefreshCoordinator`]).

use std::fmt;

use mintflow_common::security::{KeychainError, SecretStore};
use mintflow_domain::MintFlowError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Access and refresh token pair.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self { access_token: Some(access_token.into()), refresh_token: Some(refresh_token.into()) }
    }

    /// Whether requests should carry an `Authorization` header.
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Access token to send as a bearer credential.
    pub fn bearer(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential storage failed: {0}")]
    Keychain(#[from] KeychainError),

    #[error("credential encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<CredentialError> for MintFlowError {
    fn from(err: CredentialError) -> Self {
        Self::Keychain(err.to_string())
    }
}

/// Process-wide holder of the current credentials.
///
/// Each call is atomic with respect to the others: a reader observes either
/// the whole previous pair or the whole new pair.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Credentials;

    fn set(&self, credentials: Credentials) -> Result<(), CredentialError>;

    fn clear(&self) -> Result<(), CredentialError>;

    /// Restore persisted credentials at start-up. Returns whether a session
    /// was restored.
    fn load(&self) -> Result<bool, CredentialError> {
        Ok(self.get().is_authenticated())
    }
}

/// Credentials held in memory only. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Credentials>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { inner: RwLock::new(credentials) }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self) -> Credentials {
        self.inner.read().clone()
    }

    fn set(&self, credentials: Credentials) -> Result<(), CredentialError> {
        *self.inner.write() = credentials;
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self.inner.write() = Credentials::default();
        Ok(())
    }
}

/// Credentials persisted to the platform keychain.
///
/// The pair is stored as a single JSON secret so one write replaces both
/// tokens together. Reads are served from an in-memory mirror.
pub struct KeychainCredentialStore<S: SecretStore> {
    secrets: S,
    account: String,
    mirror: RwLock<Credentials>,
}

impl<S: SecretStore> KeychainCredentialStore<S> {
    pub fn new(secrets: S, account: impl Into<String>) -> Self {
        Self { secrets, account: account.into(), mirror: RwLock::new(Credentials::default()) }
    }

    pub fn account(&self) -> &str {
        &self.account
    }
}

impl<S: SecretStore> fmt::Debug for KeychainCredentialStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeychainCredentialStore")
            .field("account", &self.account)
            .field("authenticated", &self.mirror.read().is_authenticated())
            .finish_non_exhaustive()
    }
}

impl<S: SecretStore> CredentialStore for KeychainCredentialStore<S> {
    fn get(&self) -> Credentials {
        self.mirror.read().clone()
    }

    fn set(&self, credentials: Credentials) -> Result<(), CredentialError> {
        let encoded = serde_json::to_string(&credentials)?;
        // Hold the write lock across the persist so the mirror never gets
        // ahead of (or behind) the keychain.
        let mut mirror = self.mirror.write();
        self.secrets.set_secret(&self.account, &encoded)?;
        *mirror = credentials;
        debug!(account = %self.account, "credentials persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let mut mirror = self.mirror.write();
        *mirror = Credentials::default();
        self.secrets.delete_secret(&self.account)?;
        debug!(account = %self.account, "credentials cleared");
        Ok(())
    }

    fn load(&self) -> Result<bool, CredentialError> {
        let raw = match self.secrets.get_secret(&self.account) {
            Ok(raw) => raw,
            Err(KeychainError::NotFound) => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        let restored = match serde_json::from_str::<Credentials>(&raw) {
            Ok(credentials) if credentials.refresh_token.is_some() => credentials,
            Ok(_) => {
                debug!(account = %self.account, "persisted session has no refresh token");
                Credentials::default()
            }
            Err(err) => {
                warn!(account = %self.account, error = %err, "discarding unreadable credentials");
                Credentials::default()
            }
        };

        let authenticated = restored.is_authenticated();
        *self.mirror.write() = restored;
        Ok(authenticated)
    }
}
