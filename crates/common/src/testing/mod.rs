//! Testing utilities and helpers
//!
//! - [`mocks`]: in-memory stand-ins for platform services
//! - [`async_utils`]: polling and timeout helpers for async tests
//!
//! ```rust
//! use mintflow_common::security::SecretStore;
//! use mintflow_common::testing::{MockClock, MockKeychainProvider};
//!
//! let clock = MockClock::new();
//! clock.advance(std::time::Duration::from_secs(5));
//!
//! let keychain = MockKeychainProvider::new();
//! keychain.set_secret("default", "{}").unwrap();
//! ```

pub mod async_utils;
#[cfg(feature = "platform")]
pub mod mocks;

pub use async_utils::{poll_until, timeout_ok};
#[cfg(feature = "platform")]
pub use mocks::MockKeychainProvider;

pub use crate::resilience::{Clock, MockClock, SystemClock};
