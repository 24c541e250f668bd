//! Integration tests for the error module
//!
//! Covers the classified error as the host application sees it: serialized
//! payloads, user-facing messages and retry affordances.

#![cfg(feature = "foundation")]

use mintflow_common::error::{classify, ClassifiedError, ErrorKind, RawFailure};

/// A classified error serializes with a stable kind tag the host can switch
/// on, and survives a round trip.
#[test]
fn test_classified_error_serializes_for_host() {
    let err = classify(&RawFailure::status(503, "upstream unavailable"));
    let json = serde_json::to_value(&err).expect("serializes");

    assert_eq!(json["kind"], serde_json::json!(ErrorKind::ServerError.as_str()));
    assert_eq!(json["http_status"], 503);
    assert_eq!(json["retryable"], true);
    assert!(json["occurred_at"].is_string());

    let back: ClassifiedError = serde_json::from_value(json).expect("deserializes");
    assert_eq!(back, err);
}

#[test]
fn test_display_includes_kind_and_message() {
    let err = classify(&RawFailure::status(400, "amount must be positive"));
    let rendered = err.to_string();
    assert!(rendered.contains("amount must be positive"));
    assert!(rendered.contains(ErrorKind::ValidationError.as_str()));
}

#[test]
fn test_only_transient_failures_offer_retry() {
    let offered: Vec<bool> = [
        RawFailure::transport("connection reset", false),
        RawFailure::status(401, ""),
        RawFailure::status(403, ""),
        RawFailure::status(400, ""),
        RawFailure::status(404, ""),
        RawFailure::status(429, ""),
        RawFailure::Cancelled,
    ]
    .iter()
    .map(|raw| classify(raw).offers_retry())
    .collect();

    assert_eq!(offered, vec![true, false, false, false, false, true, false]);
}

#[test]
fn test_session_expired_is_terminal_auth_error() {
    let err = ClassifiedError::session_expired("refresh rejected");
    assert_eq!(err.kind, ErrorKind::AuthError);
    assert!(!err.retryable);
    assert!(err.requires_reauthentication());
}
