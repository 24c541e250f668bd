//! # MintFlow Infrastructure
//!
//! Authenticated API client and resilience layer for MintFlow.
//!
//! This crate contains:
//! - HTTP transport (reqwest, one attempt per call)
//! - Credential storage, single-flight token refresh, and the session signal
//! - The request executor
//! - The query layer: stale-while-revalidate cache, retries, de-duplication
//! - Typed MintFlow resources and client assembly
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Builds on `mintflow-common` (classifier, retry, cache core, keychain)
//! - Speaks the wire types defined in `mintflow-domain`
//! - Contains all "impure" code (network, keychain, clocks, tasks)

pub mod api;
pub mod client;
pub mod config;
pub mod http;
pub mod observability;
pub mod query;
pub mod resources;

// Re-export commonly used items
pub use api::{
    CredentialStore, Credentials, RequestDescriptor, RequestExecutor, SessionEndReason,
    SessionEvent,
};
pub use client::{MintFlowClient, MintFlowClientBuilder};
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::{init_tracing, LogFormat};
pub use query::{MutationConfig, QueryClient, QueryConfig, QueryHandle, QueryKey, QueryState};
pub use resources::{MintFlowApi, MutationResult};
