//! Configuration loading
//!
//! Builds a [`ClientConfig`](mintflow_domain::ClientConfig) from an optional
//! config file and `MINTFLOW_*` environment variables.

pub mod loader;

// Re-export commonly used items
pub use loader::{apply_env_with, load, load_from_env, load_from_file, probe_config_paths};
