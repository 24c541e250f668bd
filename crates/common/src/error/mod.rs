//! Error taxonomy and failure classification for MintFlow API calls
//!
//! Every failed HTTP attempt is normalised into a [`ClassifiedError`] before it
//! leaves the transport layer. The classification drives three decisions:
//!
//! 1. Whether the resilient query layer may retry transparently
//!    ([`ClassifiedError::retryable`]).
//! 2. Whether the host must route the user back to sign-in
//!    ([`ClassifiedError::requires_reauthentication`]).
//! 3. Which human-readable message the host renders
//!    ([`ClassifiedError::user_message`]).
//!
//! # Classification Table
//!
//! | raw failure | kind | retryable |
//! |-------------|------|-----------|
//! | transport failure (no response) | `NetworkError` | yes |
//! | 400 | `ValidationError` | no |
//! | 401, 403 | `AuthError` | no |
//! | 404 | `ServerError` | no |
//! | 429 | `ServerError` | yes |
//! | 500-599 | `ServerError` | yes |
//! | malformed success body | `ServerError` | no |
//! | anything else | `UnknownError` | no |
//!
//! [`classify`] is pure: it performs no I/O and touches no shared state.
//! Logging of classified errors is the caller's job.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on response-body bytes copied into an error message.
pub const MAX_BODY_IN_MESSAGE: usize = 512;

/// Fixed taxonomy of API failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response was received (connect failure, reset, timeout).
    NetworkError,
    /// 401/403 or a failed token refresh.
    AuthError,
    /// 400: the request itself is wrong and the user can correct it.
    ValidationError,
    /// 404, 429, 5xx or a malformed response body.
    ServerError,
    /// Anything that does not map onto the other kinds.
    UnknownError,
}

impl ErrorKind {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::AuthError => "auth_error",
            Self::ValidationError => "validation_error",
            Self::ServerError => "server_error",
            Self::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity used to pick a log level for a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Expected condition (e.g. a 404 for an optional resource).
    Info,
    /// Transient, usually recovered by retrying.
    Warning,
    /// Failure the user will see.
    Error,
    /// The session is gone.
    Critical,
}

/// A raw failure as observed by the transport, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    /// The request never produced a response.
    Transport {
        /// Transport error description.
        message: String,
        /// Whether the transport deadline elapsed.
        timed_out: bool,
    },
    /// The server answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly empty).
        body: String,
        /// Value of a `Retry-After` header, when the server sent one.
        retry_after: Option<Duration>,
    },
    /// A success status whose body could not be parsed.
    MalformedResponse {
        /// Parser error description.
        message: String,
    },
    /// The caller abandoned the request.
    Cancelled,
}

impl RawFailure {
    /// Shorthand for a status failure without a `Retry-After` hint.
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status { status, body: body.into(), retry_after: None }
    }

    /// Shorthand for a transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>, timed_out: bool) -> Self {
        Self::Transport { message: message.into(), timed_out }
    }
}

/// A failure normalised into the fixed taxonomy.
///
/// Created once per failed attempt and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    /// Failure kind.
    pub kind: ErrorKind,
    /// Diagnostic message (not meant for end users, see
    /// [`Self::user_message`]).
    pub message: String,
    /// HTTP status when a response was received.
    pub http_status: Option<u16>,
    /// Advisory retry verdict; the retry layer also weighs attempt counts.
    pub retryable: bool,
    /// When the failed attempt was observed.
    pub occurred_at: DateTime<Utc>,
    /// Server-provided retry hint (429/503 `Retry-After`).
    #[serde(skip)]
    pub retry_after: Option<Duration>,
}

impl ClassifiedError {
    /// Build an error directly (used by code paths that do not start from an
    /// HTTP failure, e.g. a missing refresh token).
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            http_status: None,
            retryable,
            occurred_at: Utc::now(),
            retry_after: None,
        }
    }

    /// Terminal authentication failure: the session is over.
    #[must_use]
    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthError, message, false)
    }

    /// Terminal authentication failure that carries the status of the
    /// response that ended the session.
    #[must_use]
    pub fn session_expired_with_status(message: impl Into<String>, http_status: Option<u16>) -> Self {
        Self { http_status, ..Self::session_expired(message) }
    }

    /// Whether the host must send the user back to sign-in instead of
    /// offering a retry.
    #[must_use]
    pub const fn requires_reauthentication(&self) -> bool {
        matches!(self.kind, ErrorKind::AuthError)
    }

    /// Whether the host should render a manual retry affordance.
    #[must_use]
    pub const fn offers_retry(&self) -> bool {
        self.retryable && !self.requires_reauthentication()
    }

    /// Human-readable message for the host UI, per kind.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match (self.kind, self.http_status) {
            (ErrorKind::NetworkError, _) => {
                "We couldn't reach MintFlow. Check your connection and try again."
            }
            (ErrorKind::AuthError, Some(403)) => "You don't have access to this information.",
            (ErrorKind::AuthError, _) => "Your session has ended. Please sign in again.",
            (ErrorKind::ValidationError, _) => "Some of the details you entered aren't valid.",
            (ErrorKind::ServerError, Some(404)) => "We couldn't find what you were looking for.",
            (ErrorKind::ServerError, Some(429)) => {
                "You're doing that too often. Please wait a moment and try again."
            }
            (ErrorKind::ServerError, _) => "MintFlow is having trouble right now. Please try again.",
            (ErrorKind::UnknownError, _) => "Something went wrong.",
        }
    }
}

/// Standard interface for classifying errors by their characteristics.
pub trait ErrorClassification {
    /// Check if this error is retryable.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention.
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Suggested retry delay, if the failure carried one.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl ErrorClassification for ClassifiedError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn severity(&self) -> ErrorSeverity {
        match self.kind {
            ErrorKind::AuthError => ErrorSeverity::Critical,
            ErrorKind::ServerError if self.http_status == Some(404) => ErrorSeverity::Info,
            ErrorKind::NetworkError | ErrorKind::ServerError if self.retryable => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Classify a raw failure, stamping it with the current time.
#[must_use]
pub fn classify(raw: &RawFailure) -> ClassifiedError {
    classify_at(raw, Utc::now())
}

/// Classify a raw failure with an explicit timestamp.
#[must_use]
pub fn classify_at(raw: &RawFailure, occurred_at: DateTime<Utc>) -> ClassifiedError {
    let (kind, retryable, http_status, message, retry_after) = match raw {
        RawFailure::Transport { message, timed_out } => {
            let message = if *timed_out {
                format!("request timed out: {message}")
            } else {
                format!("transport failure: {message}")
            };
            (ErrorKind::NetworkError, true, None, message, None)
        }
        RawFailure::Status { status, body, retry_after } => {
            let (kind, retryable) = status_verdict(*status);
            let message = status_message(*status, body);
            (kind, retryable, Some(*status), message, *retry_after)
        }
        RawFailure::MalformedResponse { message } => (
            ErrorKind::ServerError,
            false,
            None,
            format!("malformed response: {message}"),
            None,
        ),
        RawFailure::Cancelled => {
            (ErrorKind::UnknownError, false, None, "request cancelled".to_string(), None)
        }
    };

    ClassifiedError { kind, message, http_status, retryable, occurred_at, retry_after }
}

const fn status_verdict(status: u16) -> (ErrorKind, bool) {
    match status {
        400 => (ErrorKind::ValidationError, false),
        401 | 403 => (ErrorKind::AuthError, false),
        404 => (ErrorKind::ServerError, false),
        429 | 500..=599 => (ErrorKind::ServerError, true),
        _ => (ErrorKind::UnknownError, false),
    }
}

fn status_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("server returned status {status}");
    }

    let mut cut = body.len().min(MAX_BODY_IN_MESSAGE);
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    let ellipsis = if cut < body.len() { "..." } else { "" };
    format!("server returned status {status}: {}{ellipsis}", &body[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_and_retry(raw: RawFailure) -> (ErrorKind, bool) {
        let err = classify(&raw);
        (err.kind, err.retryable)
    }

    #[test]
    fn classifies_transport_failures_as_retryable_network_errors() {
        assert_eq!(
            kind_and_retry(RawFailure::transport("connection refused", false)),
            (ErrorKind::NetworkError, true)
        );

        let timeout = classify(&RawFailure::transport("deadline elapsed", true));
        assert_eq!(timeout.kind, ErrorKind::NetworkError);
        assert!(timeout.retryable);
        assert!(timeout.message.contains("timed out"));
        assert_eq!(timeout.http_status, None);
    }

    #[test]
    fn session_expired_with_status_keeps_the_rejecting_status() {
        let err = ClassifiedError::session_expired_with_status("refresh rejected", Some(401));
        assert_eq!(err.kind, ErrorKind::AuthError);
        assert_eq!(err.http_status, Some(401));
        assert!(!err.retryable);
        assert!(err.requires_reauthentication());

        let offline = ClassifiedError::session_expired_with_status("refresh unreachable", None);
        assert_eq!(offline.http_status, None);
    }

    #[test]
    fn classifies_status_codes_per_table() {
        let cases = [
            (400, ErrorKind::ValidationError, false),
            (401, ErrorKind::AuthError, false),
            (403, ErrorKind::AuthError, false),
            (404, ErrorKind::ServerError, false),
            (429, ErrorKind::ServerError, true),
            (500, ErrorKind::ServerError, true),
            (503, ErrorKind::ServerError, true),
            (599, ErrorKind::ServerError, true),
            (302, ErrorKind::UnknownError, false),
            (409, ErrorKind::UnknownError, false),
            (423, ErrorKind::UnknownError, false),
        ];

        for (status, kind, retryable) in cases {
            let err = classify(&RawFailure::status(status, ""));
            assert_eq!(err.kind, kind, "status {status}");
            assert_eq!(err.retryable, retryable, "status {status}");
            assert_eq!(err.http_status, Some(status));
        }
    }

    #[test]
    fn malformed_body_is_a_non_retryable_server_error() {
        let err = classify(&RawFailure::MalformedResponse { message: "expected value".into() });
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert!(!err.retryable);
        assert!(err.message.contains("malformed"));
    }

    #[test]
    fn classify_at_uses_supplied_timestamp() {
        let at = DateTime::parse_from_rfc3339("2025-01-15T10:00:00Z").unwrap().with_timezone(&Utc);
        let err = classify_at(&RawFailure::status(500, "boom"), at);
        assert_eq!(err.occurred_at, at);
    }

    #[test]
    fn long_bodies_are_truncated_in_messages() {
        let body = "x".repeat(MAX_BODY_IN_MESSAGE * 2);
        let err = classify(&RawFailure::status(500, body));
        assert!(err.message.ends_with("..."));
        assert!(err.message.len() < MAX_BODY_IN_MESSAGE + 64);
    }

    #[test]
    fn retry_after_hint_is_preserved() {
        let raw = RawFailure::Status {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(2)),
        };
        let err = classify(&raw);
        assert_eq!(ErrorClassification::retry_after(&err), Some(Duration::from_secs(2)));
    }

    #[test]
    fn auth_errors_force_reauthentication_instead_of_retry() {
        let err = classify(&RawFailure::status(401, "expired"));
        assert!(err.requires_reauthentication());
        assert!(!err.offers_retry());
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let server = classify(&RawFailure::status(502, ""));
        assert!(server.offers_retry());
        assert_eq!(server.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn user_messages_differ_per_kind() {
        let network = classify(&RawFailure::transport("reset", false));
        let auth = classify(&RawFailure::status(401, ""));
        let validation = classify(&RawFailure::status(400, ""));
        assert_ne!(network.user_message(), auth.user_message());
        assert_ne!(auth.user_message(), validation.user_message());
    }
}
