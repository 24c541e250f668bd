//! Error types used outside the request path

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for MintFlow client setup and storage.
///
/// Request failures are reported as `ClassifiedError`; this type covers the
/// parts around them (loading configuration, opening the keychain, building
/// the HTTP client).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MintFlowError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for MintFlow operations
pub type Result<T> = std::result::Result<T, MintFlowError>;
