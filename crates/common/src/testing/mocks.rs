//! Mock implementations of common traits
//!
//! Thread-safe in-memory stand-ins for platform services, usable from unit and
//! integration tests across the workspace.

#![allow(clippy::missing_errors_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::security::{KeychainError, SecretStore};

/// In-memory keychain with failure injection.
///
/// Clones share storage, so a test can keep one handle for inspection while
/// the code under test owns another.
#[derive(Debug, Clone, Default)]
pub struct MockKeychainProvider {
    storage: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MockKeychainProvider {
    /// Empty mock keychain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock keychain pre-populated with `key = value`.
    #[must_use]
    pub fn with_secret(key: &str, value: &str) -> Self {
        let mock = Self::new();
        mock.storage.lock().insert(key.to_string(), value.to_string());
        mock
    }

    /// Make subsequent writes and deletes fail with `AccessFailed`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes and deletes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw stored value, bypassing the trait.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.storage.lock().get(key).cloned()
    }

    fn check_writable(&self) -> Result<(), KeychainError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeychainError::AccessFailed("mock keychain is read-only".into()));
        }
        Ok(())
    }
}

impl SecretStore for MockKeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.check_writable()?;
        self.storage.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        self.storage.lock().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.check_writable()?;
        self.storage.lock().remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_and_delete_secret() {
        let keychain = MockKeychainProvider::new();
        keychain.set_secret("default", "super-secret").unwrap();
        assert_eq!(keychain.get_secret("default").unwrap(), "super-secret");

        keychain.delete_secret("default").unwrap();
        keychain.delete_secret("default").unwrap();
        assert!(matches!(keychain.get_secret("default"), Err(KeychainError::NotFound)));
        assert_eq!(keychain.write_count(), 3);
    }

    #[test]
    fn injected_failures_leave_storage_untouched() {
        let keychain = MockKeychainProvider::with_secret("default", "old");
        keychain.fail_writes(true);
        assert!(keychain.set_secret("default", "new").is_err());
        assert!(keychain.delete_secret("default").is_err());
        assert_eq!(keychain.raw("default").as_deref(), Some("old"));
    }

    #[test]
    fn clones_share_storage() {
        let keychain = MockKeychainProvider::new();
        let observer = keychain.clone();
        keychain.set_secret("k", "v").unwrap();
        assert_eq!(observer.raw("k").as_deref(), Some("v"));
    }
}
