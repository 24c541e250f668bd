//! Authenticated access to the MintFlow API
//!
//! # Architecture
//!
//! - [`credentials`]: where the token pair lives (keychain or memory)
//! - [`refresh`]: the only writer of that store; single-flight token refresh
//! - [`session`]: tells the host when the session is over
//! - [`executor`]: one request, one optional re-send after a refresh
//!
//! Every failure leaving this module is a
//! [`ClassifiedError`](mintflow_common::error::ClassifiedError).

pub mod credentials;
pub mod executor;
pub mod refresh;
pub mod request;
pub mod session;

pub use credentials::{
    CredentialError, CredentialStore, Credentials, InMemoryCredentialStore, KeychainCredentialStore,
};
pub use executor::RequestExecutor;
pub use refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher};
pub use request::{ApiResponse, RequestDescriptor, ResponseBody};
pub use session::{SessionEndReason, SessionEvent, SessionEvents};
