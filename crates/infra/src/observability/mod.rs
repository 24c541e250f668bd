//! Structured logging for the MintFlow client
//!
//! The host calls [`init_tracing`] once at start-up and keeps the returned
//! guard alive; dropping it flushes and stops the background writer.
//!
//! Filtering follows `RUST_LOG` when set, otherwise [`DEFAULT_FILTER`].

use mintflow_common::error::ClassifiedError;
use mintflow_domain::MintFlowError;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_FILTER: &str = "mintflow_infra=info,mintflow_common=info,warn";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for terminals.
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers.
    Json,
}

/// Install the global subscriber, writing to stderr through a non-blocking
/// worker.
///
/// # Errors
/// Returns [`MintFlowError::Internal`] if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> Result<WorkerGuard, MintFlowError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(writer).with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer).with_current_span(true))
            .try_init(),
    };

    installed.map_err(|err| MintFlowError::Internal(format!("tracing already initialised: {err}")))?;
    Ok(guard)
}

/// Log one classified failure.
pub fn record_classified_error(error: &ClassifiedError, operation: &str) {
    warn!(
        kind = %error.kind,
        http_status = error.http_status,
        retryable = error.retryable,
        occurred_at = %error.occurred_at.to_rfc3339(),
        operation,
        message = %error.message,
        "request failed"
    );
}

#[cfg(test)]
mod tests {
    use mintflow_common::error::{classify, RawFailure};

    use super::*;

    #[test]
    fn recording_without_subscriber_is_a_no_op() {
        record_classified_error(&classify(&RawFailure::status(503, "")), "GET /api/v1/auth/me");
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
