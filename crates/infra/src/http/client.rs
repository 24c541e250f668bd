use std::time::Duration;

use chrono::{DateTime, Utc};
use mintflow_common::error::RawFailure;
use mintflow_domain::MintFlowError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

/// HTTP client with a fixed per-request timeout.
///
/// Sends each request exactly once. Retrying is the caller's decision, made on
/// the classified failure.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, MintFlowError> {
        Self::builder().build()
    }

    /// Transport timeout applied to every request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send the request once.
    ///
    /// A response with any status is `Ok`; only failures that produced no
    /// response are returned as [`RawFailure::Transport`].
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, RawFailure> {
        let request = builder
            .build()
            .map_err(|err| RawFailure::transport(format!("invalid request: {err}"), false))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, path = %url.path(), "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                debug!(%method, path = %url.path(), status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, path = %url.path(), error = %err, "HTTP request failed");
                Err(transport_failure(&err))
            }
        }
    }
}

/// Map a reqwest error that produced no usable response.
pub(crate) fn transport_failure(err: &reqwest::Error) -> RawFailure {
    RawFailure::transport(err.to_string(), err.is_timeout())
}

/// Turn a non-success response into a raw failure, consuming the body.
pub(crate) async fn status_failure(response: Response) -> RawFailure {
    let status = response.status().as_u16();
    let retry_after = retry_after(response.headers());
    // The status alone is enough to classify; the body is diagnostic only.
    let body = response.text().await.unwrap_or_default();
    RawFailure::Status { status, body, retry_after }
}

/// Parse `Retry-After` as delta-seconds or an HTTP date.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: None, default_headers: None }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, MintFlowError> {
        if self.timeout.is_zero() {
            return Err(MintFlowError::Config("HTTP timeout must be greater than zero".into()));
        }

        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| MintFlowError::Network(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}
