//! Bounded retry with backoff
//!
//! [`RetryExecutor`] runs an operation until it succeeds, the policy refuses
//! another attempt, or `max_retries` retries have been spent. An operation is
//! therefore attempted at most `max_retries + 1` times. The final error is
//! returned as-is so callers keep the original classification.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{ClassifiedError, ErrorKind};

/// Invalid retry configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid retry configuration: {message}")]
pub struct RetryConfigError {
    /// What is wrong with the configuration.
    pub message: String,
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// Decide whether to retry after the `attempt`-th failure (0-based).
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the configured backoff delay
    Retry,
    /// Retry the operation after a specific delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
///
/// Two `Custom` strategies never compare equal; function pointer identity is
/// not stable across codegen units.
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// `min(initial_delay * 2^attempt, max_delay)`
    Exponential {
        /// Delay before the first retry
        initial_delay: Duration,
        /// Cap applied to every delay
        max_delay: Duration,
    },
    /// Caller-supplied delay function
    Custom(fn(u32) -> Duration),
}

impl BackoffStrategy {
    /// Exponential backoff with the given base and cap.
    #[must_use]
    pub const fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self::Exponential { initial_delay, max_delay }
    }

    /// Calculate the delay before retry number `attempt` (0-based)
    #[must_use]
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential { initial_delay, max_delay } => {
                let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                initial_delay.saturating_mul(factor).min(*max_delay)
            }
            Self::Custom(f) => f(attempt),
        }
    }
}

impl PartialEq for BackoffStrategy {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Fixed(a), Self::Fixed(b)) => a == b,
            (
                Self::Exponential { initial_delay: a, max_delay: a_max },
                Self::Exponential { initial_delay: b, max_delay: b_max },
            ) => a == b && a_max == b_max,
            _ => false,
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(1_000), Duration::from_secs(30))
    }
}

/// Jitter type for adding randomness to retry delays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Jitter {
    /// Use the computed delay unchanged
    #[default]
    None,
    /// Uniform in `[delay / 2, delay]`
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay
    #[must_use]
    pub fn apply(self, delay: Duration) -> Duration {
        match self {
            Self::None => delay,
            Self::Equal => {
                let half = delay / 2;
                let spread = u64::try_from(half.as_millis()).unwrap_or(u64::MAX);
                if spread == 0 {
                    return delay;
                }
                half + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries allowed after the initial attempt
    pub max_retries: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter applied on top of the backoff delay
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, backoff: BackoffStrategy::default(), jitter: Jitter::None }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Configuration that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self { max_retries: 0, ..Self::default() }
    }

    /// Total attempts this configuration allows.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns an error when an exponential backoff has a cap below its
    /// initial delay.
    pub fn validate(&self) -> Result<(), RetryConfigError> {
        if let BackoffStrategy::Exponential { initial_delay, max_delay } = self.backoff {
            if max_delay < initial_delay {
                return Err(RetryConfigError {
                    message: format!(
                        "max_delay ({max_delay:?}) must not be below initial_delay ({initial_delay:?})"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`RetryConfig`]
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    /// Retries allowed after the initial attempt.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Use a fixed delay between attempts.
    #[must_use]
    pub const fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    /// Use capped exponential backoff.
    #[must_use]
    pub const fn exponential_backoff(mut self, initial_delay: Duration, max_delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::exponential(initial_delay, max_delay);
        self
    }

    /// Use a custom delay function.
    #[must_use]
    pub const fn custom_backoff(mut self, delay: fn(u32) -> Duration) -> Self {
        self.config.backoff = BackoffStrategy::Custom(delay);
        self
    }

    /// Randomise delays within `[delay / 2, delay]`.
    #[must_use]
    pub const fn equal_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Equal;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    /// See [`RetryConfig::validate`].
    pub fn build(self) -> Result<RetryConfig, RetryConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result (the last error on failure).
    pub result: Result<T, E>,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Time spent sleeping between attempts.
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub const fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// The configuration in use.
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    pub async fn execute_with_outcome<F, Fut, T, E>(&self, mut operation: F) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.config.max_attempts();
        let mut total_delay = Duration::ZERO;
        let mut attempt: u32 = 0;

        loop {
            debug!(attempt = attempt + 1, max_attempts, "executing operation");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retrying");
                    }
                    return RetryOutcome { result: Ok(value), attempts: attempt + 1, total_delay };
                }
                Err(error) => error,
            };

            if attempt + 1 >= max_attempts {
                warn!(attempts = attempt + 1, error = %error, "retry attempts exhausted");
                return RetryOutcome { result: Err(error), attempts: attempt + 1, total_delay };
            }

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(attempt = attempt + 1, error = %error, "error is not retryable");
                    return RetryOutcome { result: Err(error), attempts: attempt + 1, total_delay };
                }
                RetryDecision::Retry => {
                    self.config.jitter.apply(self.config.backoff.calculate_delay(attempt))
                }
                RetryDecision::RetryAfter(delay) => delay,
            };

            warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64, error = %error, "operation failed, retrying");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            total_delay += delay;
            attempt += 1;
        }
    }
}

/// Pre-defined retry policies
pub mod policies {
    use super::{ClassifiedError, Duration, ErrorKind, RetryDecision, RetryPolicy};

    /// Retries on any error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retries
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }

    /// Retry policy for [`ClassifiedError`]s.
    ///
    /// `AuthError` and `ValidationError` are never retried regardless of the
    /// advisory flag. A server `Retry-After` hint replaces the backoff delay
    /// when it does not exceed `max_hint`.
    #[derive(Debug, Clone, Copy)]
    pub struct ClassifiedRetryPolicy {
        max_hint: Duration,
    }

    impl ClassifiedRetryPolicy {
        /// Honour `Retry-After` hints up to `max_hint`.
        #[must_use]
        pub const fn new(max_hint: Duration) -> Self {
            Self { max_hint }
        }
    }

    impl Default for ClassifiedRetryPolicy {
        fn default() -> Self {
            Self::new(Duration::from_secs(30))
        }
    }

    impl RetryPolicy<ClassifiedError> for ClassifiedRetryPolicy {
        fn should_retry(&self, error: &ClassifiedError, _attempt: u32) -> RetryDecision {
            if matches!(error.kind, ErrorKind::AuthError | ErrorKind::ValidationError)
                || !error.retryable
            {
                return RetryDecision::Stop;
            }
            match error.retry_after {
                Some(hint) if hint <= self.max_hint => RetryDecision::RetryAfter(hint),
                _ => RetryDecision::Retry,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::policies::{AlwaysRetry, ClassifiedRetryPolicy};
    use super::*;
    use crate::error::{classify, RawFailure};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_retries(max_retries)
            .fixed_backoff(Duration::from_millis(1))
            .build()
            .unwrap()
    }

    #[test]
    fn exponential_backoff_doubles_until_cap() {
        let backoff =
            BackoffStrategy::exponential(Duration::from_millis(100), Duration::from_millis(1_000));
        assert_eq!(backoff.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(backoff.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(backoff.calculate_delay(3), Duration::from_millis(800));
        assert_eq!(backoff.calculate_delay(4), Duration::from_millis(1_000));
        assert_eq!(backoff.calculate_delay(40), Duration::from_millis(1_000));
    }

    #[test]
    fn custom_backoff_never_compares_equal() {
        fn linear(attempt: u32) -> Duration {
            Duration::from_millis(u64::from(attempt) * 10)
        }

        let fixed = BackoffStrategy::Fixed(Duration::from_millis(5));
        assert_eq!(fixed, BackoffStrategy::Fixed(Duration::from_millis(5)));
        assert_ne!(fixed, BackoffStrategy::Fixed(Duration::from_millis(6)));
        assert_eq!(
            BackoffStrategy::default(),
            BackoffStrategy::exponential(Duration::from_secs(1), Duration::from_secs(30))
        );
        let custom = BackoffStrategy::Custom(linear);
        let copy = custom;
        assert_ne!(custom, copy);
        assert_ne!(custom, fixed);
    }

    #[test]
    fn equal_jitter_stays_within_bounds() {
        let delay = Duration::from_millis(400);
        for _ in 0..50 {
            let jittered = Jitter::Equal.apply(delay);
            assert!(jittered >= Duration::from_millis(200) && jittered <= delay);
        }
    }

    #[test]
    fn builder_rejects_cap_below_initial_delay() {
        let result = RetryConfig::builder()
            .exponential_backoff(Duration::from_secs(2), Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn retryable_failures_stop_after_max_retries_plus_one() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast(2), ClassifiedRetryPolicy::default());

        let counter = calls.clone();
        let outcome = executor
            .execute_with_outcome(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(classify(&RawFailure::transport("timeout", true)))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.unwrap_err().kind, ErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn validation_errors_are_attempted_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast(5), ClassifiedRetryPolicy::default());

        let counter = calls.clone();
        let result = executor
            .execute(|| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(classify(&RawFailure::status(400, "bad")))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind, ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RetryExecutor::new(fast(3), AlwaysRetry);

        let counter = calls.clone();
        let outcome = executor
            .execute_with_outcome(|| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("flaky".to_string())
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.unwrap(), 42);
    }

    #[test]
    fn retry_after_hint_overrides_backoff() {
        let policy = ClassifiedRetryPolicy::new(Duration::from_secs(5));
        let mut err = classify(&RawFailure::status(429, ""));
        err.retry_after = Some(Duration::from_secs(2));
        assert_eq!(policy.should_retry(&err, 0), RetryDecision::RetryAfter(Duration::from_secs(2)));

        err.retry_after = Some(Duration::from_secs(60));
        assert_eq!(policy.should_retry(&err, 0), RetryDecision::Retry);
    }
}
