//! Integration tests for the resilience module
//!
//! Drives the retry executor with classified MintFlow errors and checks the
//! attempt bounds the query layer relies on.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mintflow_common::error::{classify, ErrorKind, RawFailure};
use mintflow_common::resilience::policies::{ClassifiedRetryPolicy, NeverRetry};
use mintflow_common::resilience::{RetryConfig, RetryExecutor};

fn config(max_retries: u32) -> RetryConfig {
    RetryConfig::builder()
        .max_retries(max_retries)
        .exponential_backoff(Duration::from_millis(1), Duration::from_millis(4))
        .build()
        .expect("valid config")
}

/// Three consecutive transport timeouts with two retries allowed surface a
/// `NetworkError` after the third attempt, never a fourth.
///
/// # Test Steps
/// 1. Configure two retries
/// 2. Fail every attempt with a timed-out transport failure
/// 3. Confirm three attempts and a `NetworkError` result
#[tokio::test(flavor = "multi_thread")]
async fn test_timeouts_exhaust_after_max_retries_plus_one() {
    let attempts = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(config(2), ClassifiedRetryPolicy::default());

    let counter = Arc::clone(&attempts);
    let outcome = executor
        .execute_with_outcome(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(classify(&RawFailure::transport("request timed out", true)))
            }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.attempts, 3);
    let err = outcome.result.expect_err("all attempts fail");
    assert_eq!(err.kind, ErrorKind::NetworkError);
    assert!(err.retryable);
}

/// Authentication failures are never retried by the generic retry path.
#[tokio::test(flavor = "multi_thread")]
async fn test_auth_errors_are_not_retried() {
    let attempts = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(config(4), ClassifiedRetryPolicy::default());

    let counter = Arc::clone(&attempts);
    let result = executor
        .execute(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(classify(&RawFailure::status(401, "")))
            }
        })
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(result.expect_err("401 fails").kind, ErrorKind::AuthError);
}

/// Server errors recover once the backend comes back.
#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_recovers_within_budget() {
    let attempts = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(config(3), ClassifiedRetryPolicy::default());

    let counter = Arc::clone(&attempts);
    let outcome = executor
        .execute_with_outcome(|| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(classify(&RawFailure::status(503, "maintenance")))
                } else {
                    Ok("accounts")
                }
            }
        })
        .await;

    assert_eq!(outcome.result.expect("second attempt succeeds"), "accounts");
    assert_eq!(outcome.attempts, 2);
    assert!(outcome.total_delay >= Duration::from_millis(1));
}

#[tokio::test]
async fn test_never_retry_policy_runs_once() {
    let attempts = Arc::new(AtomicU32::new(0));
    let executor = RetryExecutor::new(config(5), NeverRetry);

    let counter = Arc::clone(&attempts);
    let result: Result<(), String> = executor
        .execute(|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("nope".to_string())
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn test_zero_retries_means_single_attempt() {
    assert_eq!(RetryConfig::no_retry().max_attempts(), 1);
    assert_eq!(config(2).max_attempts(), 3);
}
