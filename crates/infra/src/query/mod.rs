//! Resilient query layer
//!
//! Wraps API calls with a stale-while-revalidate cache, bounded retry with
//! capped exponential backoff, per-key request de-duplication and
//! last-writer-wins ordering.
//!
//! Reads go through [`QueryClient::fetch_query`] (one-shot) or
//! [`QueryClient::query`] (a live [`QueryHandle`]); writes go through
//! [`QueryClient::mutate`], which retries at most once.

pub mod client;
pub mod config;
pub mod handle;
pub mod key;

pub use client::{QueryClient, QueryErrorEvent};
pub use config::{MutationConfig, QueryConfig, QueryConfigBuilder};
pub use handle::{QueryHandle, QueryState};
pub use key::QueryKey;
