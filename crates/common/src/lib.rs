//! Building blocks shared across MintFlow crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error taxonomy and failure classification
//! - `runtime`: async infrastructure (retry, clock, stale-while-revalidate cache)
//! - `platform`: platform integrations (keychain secret storage)
//! - `test-utils`: mocks and async helpers for downstream test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod resilience;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod security;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "runtime", feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{CacheStats, EntryLifetime, Lookup, SwrCache};
#[cfg(feature = "foundation")]
pub use error::{
    classify, classify_at, ClassifiedError, ErrorClassification, ErrorKind, ErrorSeverity,
    RawFailure,
};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, Clock, Jitter, MockClock, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryExecutor, RetryOutcome, RetryPolicy, SystemClock,
};
#[cfg(feature = "platform")]
pub use security::{KeychainError, KeychainProvider, SecretStore};
