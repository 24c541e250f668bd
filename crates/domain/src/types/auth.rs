//! Auth service payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credentials submitted to the login endpoint.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp_code: Option<String>,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into(), totp_code: None }
    }

    #[must_use]
    pub fn with_totp(mut self, code: impl Into<String>) -> Self {
        self.totp_code = Some(code.into());
        self
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("totp_code", &self.totp_code.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Token pair returned by login and refresh.
///
/// The refresh endpoint may omit `refresh_token` when it does not rotate it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Body of the refresh endpoint.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

impl std::fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshRequest").field("refresh_token", &"<redacted>").finish()
    }
}

/// Profile of the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_2fa_enabled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

/// Plain acknowledgement body (`{"message": ...}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_tolerates_missing_rotation() {
        let tokens: TokenResponse = serde_json::from_str(r#"{"access_token":"T2"}"#).unwrap();
        assert_eq!(tokens.access_token, "T2");
        assert!(tokens.refresh_token.is_none());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let login = LoginRequest::new("ada@example.com", "hunter2").with_totp("123456");
        let rendered = format!("{login:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("123456"));

        let tokens = TokenResponse {
            access_token: "secret-access".into(),
            refresh_token: Some("secret-refresh".into()),
            token_type: Some("bearer".into()),
            expires_in: Some(3600),
        };
        let rendered = format!("{tokens:?}");
        assert!(!rendered.contains("secret-"));
    }
}
