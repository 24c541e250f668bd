//! Authenticated request execution
//!
//! Sends a [`RequestDescriptor`] once, and once more after a successful token
//! refresh if the first attempt came back 401. Nothing here retries on other
//! failures; that decision belongs to the query layer.

use std::sync::Arc;

use mintflow_common::error::{classify, ClassifiedError, RawFailure};
use mintflow_domain::constants::REQUEST_ID_HEADER;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::refresh::RefreshCoordinator;
use super::request::{ApiResponse, RequestDescriptor, ResponseBody};
use crate::http::client::{status_failure, transport_failure};
use crate::http::HttpClient;
use crate::observability::record_classified_error;

#[derive(Debug)]
pub struct RequestExecutor {
    http: HttpClient,
    base_url: String,
    coordinator: Arc<RefreshCoordinator>,
}

impl RequestExecutor {
    pub fn new(http: HttpClient, base_url: &str, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), coordinator }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `request` and parse the response.
    ///
    /// # Errors
    /// Every failure is classified and logged before it is returned. A 401 on
    /// an authenticated request triggers one refresh; if the refresh fails the
    /// result is an `AuthError` and the request is not re-sent. A 401 on the
    /// re-sent request ends the session.
    #[instrument(skip_all, fields(method = %request.method(), path = request.path()))]
    pub async fn execute(&self, request: &RequestDescriptor) -> Result<ApiResponse, ClassifiedError> {
        let result = self.execute_once(request).await;
        if let Err(err) = &result {
            record_classified_error(err, &format!("{} {}", request.method(), request.path()));
        }
        result
    }

    /// [`Self::execute`], then decode the body as `T`.
    ///
    /// # Errors
    /// As [`Self::execute`]; a body that does not decode is a non-retryable
    /// `ServerError`, logged like any other failure.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        request: &RequestDescriptor,
    ) -> Result<T, ClassifiedError> {
        self.execute(request).await?.json::<T>().inspect_err(|err| {
            record_classified_error(err, &format!("decode {} {}", request.method(), request.path()));
        })
    }

    async fn execute_once(&self, request: &RequestDescriptor) -> Result<ApiResponse, ClassifiedError> {
        let token = if request.requires_auth() {
            self.coordinator.credentials().access_token
        } else {
            None
        };

        let response = self.send(request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !request.requires_auth() {
            return parse_response(response).await;
        }

        debug!(had_token = token.is_some(), "request rejected with 401, refreshing access token");
        let fresh = self.coordinator.refresh(token.as_deref()).await?;

        // Whatever the re-send returns is final.
        let response = self.send(request, Some(&fresh)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let cause = classify(&status_failure(response).await);
            return Err(self.coordinator.reject(&fresh, cause));
        }
        parse_response(response).await
    }

    async fn send(
        &self,
        request: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<Response, ClassifiedError> {
        let url = format!("{}{}", self.base_url, request.path());
        let mut builder = self
            .http
            .request(request.method().clone(), &url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());

        if !request.query_params().is_empty() {
            builder = builder.query(request.query_params());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        self.http.send(builder).await.map_err(|raw| classify(&raw))
    }
}

async fn parse_response(response: Response) -> Result<ApiResponse, ClassifiedError> {
    let status = response.status();
    if !status.is_success() {
        return Err(classify(&status_failure(response).await));
    }

    let code = status.as_u16();
    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
        return Ok(ApiResponse { status: code, body: ResponseBody::Empty });
    }

    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("json"));

    let text = response.text().await.map_err(|err| classify(&transport_failure(&err)))?;
    if text.trim().is_empty() {
        return Ok(ApiResponse { status: code, body: ResponseBody::Empty });
    }

    let body = if is_json {
        let value = serde_json::from_str(&text).map_err(|err| {
            classify(&RawFailure::MalformedResponse { message: err.to_string() })
        })?;
        ResponseBody::Json(value)
    } else {
        ResponseBody::Text(text)
    };

    Ok(ApiResponse { status: code, body })
}
