//! Request descriptors and parsed responses

use mintflow_common::error::{classify, ClassifiedError, RawFailure};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::observability::record_classified_error;

/// Everything needed to send one API call.
///
/// The body is serialised once when the descriptor is built, so a re-send
/// after a token refresh is byte-for-byte the same request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    requires_auth: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, requires_auth: true }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    /// Fails with an `UnknownError` if `body` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ClassifiedError> {
        let value = serde_json::to_value(body).map_err(|err| {
            let err = ClassifiedError::new(
                mintflow_common::error::ErrorKind::UnknownError,
                format!("request body could not be encoded: {err}"),
                false,
            );
            record_classified_error(&err, &format!("encode {} {}", self.method, self.path));
            err
        })?;
        Ok(self.with_body(value))
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send without an `Authorization` header and skip the refresh path.
    #[must_use]
    pub fn unauthenticated(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }
}

/// Successful response body, parsed by declared content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl ApiResponse {
    /// Decode the body into `T`.
    ///
    /// An empty body decodes as JSON `null`, so `()` and `Option<T>` accept it.
    ///
    /// # Errors
    /// A body that does not match `T` is a malformed-response `ServerError`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClassifiedError> {
        let value = match &self.body {
            ResponseBody::Json(value) => value.clone(),
            ResponseBody::Text(text) => Value::String(text.clone()),
            ResponseBody::Empty => Value::Null,
        };
        serde_json::from_value(value)
            .map_err(|err| classify(&RawFailure::MalformedResponse { message: err.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use mintflow_common::error::ErrorKind;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Account {
        id: String,
    }

    #[test]
    fn descriptor_defaults_to_authenticated() {
        let request = RequestDescriptor::get("/api/v1/banking/accounts").query("limit", 100);
        assert!(request.requires_auth());
        assert_eq!(request.query_params(), &[("limit".to_string(), "100".to_string())]);
        assert!(!request.clone().unauthenticated().requires_auth());
    }

    #[test]
    fn json_body_is_encoded_once() {
        let request =
            RequestDescriptor::post("/x").json(&serde_json::json!({"force": true})).unwrap();
        assert_eq!(request.body(), Some(&serde_json::json!({"force": true})));
    }

    #[test]
    fn decoding_mismatch_is_a_malformed_server_error() {
        let response = ApiResponse { status: 200, body: ResponseBody::Json(serde_json::json!([1])) };
        let err = response.json::<Account>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert!(!err.retryable);
    }

    #[test]
    fn empty_body_decodes_as_unit_or_none() {
        let response = ApiResponse { status: 204, body: ResponseBody::Empty };
        response.json::<()>().unwrap();
        assert_eq!(response.json::<Option<Account>>().unwrap(), None);
    }
}
