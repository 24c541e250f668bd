//! Platform keychain storage for secrets
//!
//! [`KeychainProvider`] is a thin wrapper over `keyring` (macOS Keychain
//! Access, Windows Credential Manager, Linux Secret Service). Callers depend on
//! the [`SecretStore`] trait so tests can substitute
//! [`crate::testing::MockKeychainProvider`].
//!
//! ```no_run
//! use mintflow_common::security::{KeychainProvider, SecretStore};
//!
//! let keychain = KeychainProvider::new("MintFlow.api");
//! keychain.set_secret("default", "super-secret")?;
//! assert_eq!(keychain.get_secret("default")?, "super-secret");
//! # Ok::<(), mintflow_common::security::KeychainError>(())
//! ```

use keyring::Entry;
use thiserror::Error;
use tracing::debug;

/// Keychain error types
#[derive(Debug, Error)]
pub enum KeychainError {
    /// Keychain access failed (permission denied, not available, etc.)
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    /// Entry not found in keychain
    #[error("Entry not found")]
    NotFound,

    /// Stored value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Synchronous secret storage keyed by account name.
///
/// Implementations must make each call atomic: a concurrent reader observes
/// either the previous value or the new one.
pub trait SecretStore: Send + Sync {
    /// Persist `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns [`KeychainError::AccessFailed`] if the backend rejects the write.
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    /// Returns [`KeychainError::NotFound`] when nothing is stored.
    fn get_secret(&self, key: &str) -> Result<String, KeychainError>;

    /// Delete the value under `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    /// Returns [`KeychainError::AccessFailed`] if the backend rejects the delete.
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;
}

/// Keychain provider scoped to one service name.
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// Provider for `service_name` (e.g. `"MintFlow.api"`).
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    /// Service name entries are stored under.
    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn create_entry(&self, account: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, account).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry: {e}"))
        })
    }
}

impl SecretStore for KeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        self.create_entry(key)?.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        self.create_entry(key)?.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => KeychainError::NotFound,
            other => {
                KeychainError::AccessFailed(format!("Failed to retrieve secret for {key}: {other}"))
            }
        })
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        match self.create_entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }
}
