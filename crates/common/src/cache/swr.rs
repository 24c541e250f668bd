//! Stale-while-revalidate cache core.
//!
//! Entries move through three phases relative to their fetch time:
//!
//! ```text
//! fetched_at ──fresh──▶ stale_at ──stale──▶ expires_at ──gone
//! ```
//!
//! Writes carry the issue sequence of the fetch that produced them. A write
//! whose sequence is older than the stored one is rejected, so a slow
//! revalidation can never overwrite data from a request issued after it.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::stats::{CacheStats, MetricsCollector};
use crate::resilience::{Clock, SystemClock};

/// How long an entry stays fresh and how long it is kept at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLifetime {
    /// Time after fetch during which the entry is served without revalidation.
    pub stale_time: Duration,
    /// Time after fetch after which the entry is evicted.
    pub cache_time: Duration,
}

impl EntryLifetime {
    /// Lifetime with the given stale and cache times.
    ///
    /// A cache time shorter than the stale time is raised to the stale time.
    #[must_use]
    pub fn new(stale_time: Duration, cache_time: Duration) -> Self {
        Self { stale_time, cache_time: cache_time.max(stale_time) }
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Within its stale time; serve without touching the network.
    Fresh(V),
    /// Past its stale time but not expired; serve and revalidate.
    Stale(V),
    /// Absent or expired; the caller has to fetch.
    Missing,
}

impl<V> Lookup<V> {
    /// The cached value, if any.
    pub fn into_value(self) -> Option<V> {
        match self {
            Self::Fresh(v) | Self::Stale(v) => Some(v),
            Self::Missing => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    fetched_at: Instant,
    stale_at: Instant,
    expires_at: Instant,
    issued_seq: u64,
}

/// Concurrent stale-while-revalidate cache.
///
/// The lock is never held across an `.await`; every operation is a short
/// critical section.
pub struct SwrCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    entries: Mutex<HashMap<K, Entry<V>>>,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> SwrCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Cache backed by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<K, V> Default for SwrCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> SwrCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Cache reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self { entries: Mutex::new(HashMap::new()), metrics: MetricsCollector::default(), clock }
    }

    /// Look up `key`, classifying the entry by age. Expired entries are
    /// dropped and reported as [`Lookup::Missing`].
    pub fn lookup(&self, key: &K) -> Lookup<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired = entries.get(key).is_some_and(|e| now >= e.expires_at);
        if expired {
            entries.remove(key);
            self.metrics.record_expirations(1);
        }
        let result = match entries.get(key) {
            None => Lookup::Missing,
            Some(entry) if now >= entry.stale_at => Lookup::Stale(entry.value.clone()),
            Some(entry) => Lookup::Fresh(entry.value.clone()),
        };
        drop(entries);

        match &result {
            Lookup::Fresh(_) => self.metrics.record_fresh_hit(),
            Lookup::Stale(_) => self.metrics.record_stale_hit(),
            Lookup::Missing => self.metrics.record_miss(),
        }
        result
    }

    /// Value for `key` if it has not expired, without touching statistics.
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.entries.lock().get(key).filter(|e| now < e.expires_at).map(|e| e.value.clone())
    }

    /// When the current entry for `key` was fetched.
    pub fn fetched_at(&self, key: &K) -> Option<Instant> {
        self.entries.lock().get(key).map(|e| e.fetched_at)
    }

    /// Store `value` produced by the fetch issued with sequence `issued_seq`.
    ///
    /// Returns `false` (and leaves the cache untouched) when the stored entry
    /// came from a fetch issued later.
    pub fn insert_if_newer(&self, key: K, value: V, issued_seq: u64, lifetime: EntryLifetime) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        if entries.get(&key).is_some_and(|existing| existing.issued_seq > issued_seq) {
            drop(entries);
            self.metrics.record_rejected_write();
            return false;
        }

        entries.insert(
            key,
            Entry {
                value,
                fetched_at: now,
                stale_at: now + lifetime.stale_time,
                expires_at: now + lifetime.cache_time,
                issued_seq,
            },
        );
        drop(entries);
        self.metrics.record_insert();
        true
    }

    /// Mark matching entries stale so the next read revalidates.
    /// Returns how many entries were marked.
    pub fn invalidate_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let now = self.clock.now();
        let mut marked = 0;
        for (key, entry) in self.entries.lock().iter_mut() {
            if predicate(key) && entry.stale_at > now {
                entry.stale_at = now;
                marked += 1;
            }
        }
        marked
    }

    /// Remove the entry for `key`.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.lock().remove(key).map(|e| e.value)
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop every expired entry and return how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| now < e.expires_at);
        let evicted = before - entries.len();
        drop(entries);
        if evicted > 0 {
            self.metrics.record_expirations(evicted);
        }
        evicted
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len())
    }
}

impl<K, V, C> std::fmt::Debug for SwrCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwrCache").field("len", &self.len()).finish_non_exhaustive()
    }
}
