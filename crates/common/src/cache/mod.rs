//! Stale-while-revalidate caching
//!
//! [`SwrCache`] classifies each lookup as fresh, stale or missing and orders
//! writes by the issue sequence of the fetch that produced them. It holds no
//! async state; callers decide when to revalidate.
//!
//! ```
//! use std::time::Duration;
//!
//! use mintflow_common::cache::{EntryLifetime, Lookup, SwrCache};
//!
//! let cache: SwrCache<String, u32> = SwrCache::new();
//! let lifetime = EntryLifetime::new(Duration::from_secs(30), Duration::from_secs(300));
//! cache.insert_if_newer("accounts".to_string(), 3, 1, lifetime);
//! assert_eq!(cache.lookup(&"accounts".to_string()), Lookup::Fresh(3));
//! ```

pub mod stats;
pub mod swr;

pub use stats::CacheStats;
pub use swr::{EntryLifetime, Lookup, SwrCache};
