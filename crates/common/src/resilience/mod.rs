//! Resilience patterns for transient failures
//!
//! - **Retry**: bounded retries with capped exponential backoff and optional
//!   jitter, driven by a pluggable [`RetryPolicy`].
//! - **Clock**: time abstraction so freshness and backoff logic can be tested
//!   without sleeping.
//!
//! The retry executor is generic over the error type. MintFlow code pairs it
//! with [`policies::ClassifiedRetryPolicy`], which reads the verdict produced
//! by [`crate::error::classify`].

pub mod clock;
pub mod retry;

pub use clock::{Clock, MockClock, SystemClock};
pub use retry::{
    policies, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryConfigError,
    RetryDecision, RetryExecutor, RetryOutcome, RetryPolicy,
};
