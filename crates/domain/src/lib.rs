//! # MintFlow Domain
//!
//! Types shared by the MintFlow client crates.
//!
//! This crate contains:
//! - Wire types for the auth, banking and transaction services
//! - Client configuration structures
//! - Domain error type and Result alias
//! - Endpoint paths and default values
//!
//! ## Architecture
//! - No dependencies on other MintFlow crates
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
