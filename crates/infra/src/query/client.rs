//! Cached, de-duplicated, retrying reads
//!
//! # Read policy
//!
//! | cache entry | caller gets | network |
//! |-------------|-------------|---------|
//! | fresh | cached value, immediately | none |
//! | stale | cached value, immediately | one background refetch |
//! | missing / expired | waits for the fetch | one fetch, shared by all waiters |
//!
//! # In-flight fetches
//!
//! Each fetch runs on its own task and is tracked in a per-key slot. Callers
//! for the same key attach to the slot as waiters instead of starting another
//! fetch. A waiter that gives up only detaches; the fetch is cancelled when
//! its last waiter leaves.
//!
//! Every fetch takes a sequence number when it is issued. The cache refuses
//! a write from a fetch issued before the one that produced the stored value,
//! so a slow revalidation cannot overwrite newer data.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use mintflow_common::cache::{CacheStats, Lookup, SwrCache};
use mintflow_common::error::{classify, ClassifiedError, ErrorKind, RawFailure};
use mintflow_common::resilience::policies::ClassifiedRetryPolicy;
use mintflow_common::resilience::{Clock, RetryExecutor, SystemClock};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::config::{MutationConfig, QueryConfig};
use super::handle::QueryHandle;
use super::key::QueryKey;
use crate::observability::record_classified_error;

pub(crate) type CachedValue = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<CachedValue, ClassifiedError>;
pub(crate) type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A background revalidation failed; the stale value is still being served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryErrorEvent {
    pub key: QueryKey,
    pub error: ClassifiedError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CacheEvent {
    Updated(QueryKey),
    Invalidated(String),
    Cleared,
    Focus,
}

struct FetchSlot {
    seq: u64,
    fetch: Shared<BoxFuture<'static, FetchResult>>,
    waiters: AtomicUsize,
    cancel: CancellationToken,
    completed: Arc<AtomicBool>,
}

struct Inner {
    cache: SwrCache<QueryKey, CachedValue, Arc<dyn Clock>>,
    in_flight: Mutex<HashMap<QueryKey, Arc<FetchSlot>>>,
    next_seq: AtomicU64,
    events: broadcast::Sender<CacheEvent>,
    errors: broadcast::Sender<QueryErrorEvent>,
    defaults: QueryConfig,
}

impl Inner {
    /// Forget the slot once its fetch has finished, unless a newer fetch
    /// already took its place.
    fn finish(&self, key: &QueryKey, seq: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(key).is_some_and(|slot| slot.seq == seq) {
            in_flight.remove(key);
        }
    }

    fn detach(&self, key: &QueryKey, slot: &FetchSlot) {
        let mut in_flight = self.in_flight.lock();
        let remaining = slot.waiters.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        if remaining > 0 || slot.completed.load(Ordering::SeqCst) {
            return;
        }

        slot.cancel.cancel();
        if in_flight.get(key).is_some_and(|current| current.seq == slot.seq) {
            in_flight.remove(key);
        }
        debug!(key = %key, seq = slot.seq, "last waiter left, fetch cancelled");
    }
}

/// One caller's interest in an in-flight fetch.
struct Waiter {
    inner: Arc<Inner>,
    key: QueryKey,
    slot: Arc<FetchSlot>,
}

impl Waiter {
    fn attach(inner: &Arc<Inner>, key: &QueryKey, slot: Arc<FetchSlot>) -> Self {
        slot.waiters.fetch_add(1, Ordering::SeqCst);
        Self { inner: Arc::clone(inner), key: key.clone(), slot }
    }

    async fn wait(&self, cancel: Option<&CancellationToken>) -> FetchResult {
        let fetch = self.slot.fetch.clone();
        match cancel {
            Some(token) => tokio::select! {
                () = token.cancelled() => Err(classify(&RawFailure::Cancelled)),
                result = fetch => result,
            },
            None => fetch.await,
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.inner.detach(&self.key, &self.slot);
    }
}

/// Shared cache and fetch coordinator. Clones share state.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("cached", &self.inner.cache.len())
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl QueryClient {
    pub fn new(defaults: QueryConfig) -> Self {
        Self::with_clock(defaults, Arc::new(SystemClock))
    }

    /// Client whose cache reads time from `clock`.
    pub fn with_clock(defaults: QueryConfig, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (errors, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                cache: SwrCache::with_clock(clock),
                in_flight: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                events,
                errors,
                defaults,
            }),
        }
    }

    /// Options used by [`Self::set_query_data`] and the typed resources.
    pub fn defaults(&self) -> &QueryConfig {
        &self.inner.defaults
    }

    /// Read `key` under the cache policy, fetching when nothing usable is
    /// cached.
    ///
    /// # Errors
    /// The last classified failure once retries are exhausted or the failure
    /// is not retryable.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        config: &QueryConfig,
    ) -> Result<Arc<T>, ClassifiedError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClassifiedError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let value = self.read(&key, &fetcher, config, None).await?;
        downcast(&key, value)
    }

    /// Like [`Self::fetch_query`], giving up when `cancel` fires.
    ///
    /// Cancelling detaches this caller only; other callers waiting on the same
    /// fetch keep waiting.
    ///
    /// # Errors
    /// An `UnknownError` ("request cancelled") when cancelled, otherwise as
    /// [`Self::fetch_query`].
    pub async fn fetch_query_with_cancel<T, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        config: &QueryConfig,
        cancel: &CancellationToken,
    ) -> Result<Arc<T>, ClassifiedError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClassifiedError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let value = self.read(&key, &fetcher, config, Some(cancel)).await?;
        downcast(&key, value)
    }

    /// Issue a new fetch for `key` regardless of what is cached.
    ///
    /// # Errors
    /// As [`Self::fetch_query`].
    #[instrument(skip_all, fields(key = %key))]
    pub async fn refetch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        config: &QueryConfig,
    ) -> Result<Arc<T>, ClassifiedError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClassifiedError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let value = self.refetch(&key, &fetcher, config, None).await?;
        downcast(&key, value)
    }

    /// Observe `key`. The returned handle loads immediately and follows
    /// later refetches, invalidations and focus changes until dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn query<T, F, Fut>(&self, key: QueryKey, fetcher: F, config: QueryConfig) -> QueryHandle<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClassifiedError>> + Send + 'static,
    {
        QueryHandle::spawn(self.clone(), key, erase(fetcher), config)
    }

    /// Run a state-changing call. On success every cached entry under the
    /// same resource is marked stale.
    ///
    /// # Errors
    /// The last classified failure; at most one retry is made.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn mutate<T, F, Fut>(
        &self,
        key: &QueryKey,
        fetcher: F,
        config: &MutationConfig,
    ) -> Result<T, ClassifiedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClassifiedError>>,
    {
        let retry = RetryExecutor::new(config.retry_config(), ClassifiedRetryPolicy::default());
        let value = retry.execute(fetcher).await?;
        self.invalidate(key.resource());
        Ok(value)
    }

    /// Mark every entry under `resource` stale. Live handles revalidate.
    pub fn invalidate(&self, resource: &str) -> usize {
        let marked = self.inner.cache.invalidate_where(|key| key.matches_resource(resource));
        debug!(resource, marked, "invalidated cached queries");
        let _ = self.inner.events.send(CacheEvent::Invalidated(resource.to_string()));
        marked
    }

    /// Store `value` as if a fetch issued now had returned it.
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let seq = self.next_seq();
        let lifetime = self.inner.defaults.lifetime();
        let value: CachedValue = Arc::new(value);
        if self.inner.cache.insert_if_newer(key.clone(), value, seq, lifetime) {
            let _ = self.inner.events.send(CacheEvent::Updated(key));
        }
    }

    /// Cached value for `key`, fresh or stale, without fetching.
    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.inner.cache.peek(key).and_then(|value| value.downcast::<T>().ok())
    }

    pub fn remove(&self, key: &QueryKey) -> bool {
        self.inner.cache.remove(key).is_some()
    }

    /// Drop every entry and cancel every in-flight fetch.
    pub fn clear(&self) {
        let slots: Vec<Arc<FetchSlot>> =
            self.inner.in_flight.lock().drain().map(|(_, slot)| slot).collect();
        for slot in &slots {
            slot.cancel.cancel();
        }
        self.inner.cache.clear();
        debug!(cancelled = slots.len(), "query cache cleared");
        let _ = self.inner.events.send(CacheEvent::Cleared);
    }

    /// Evict entries past their cache time. Returns how many were evicted.
    pub fn garbage_collect(&self) -> usize {
        self.inner.cache.evict_expired()
    }

    /// Run [`Self::garbage_collect`] every `every` until the client is
    /// dropped.
    pub fn spawn_garbage_collector(&self, every: Duration) -> JoinHandle<()> {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else { break };
                let evicted = inner.cache.evict_expired();
                if evicted > 0 {
                    debug!(evicted, "evicted expired queries");
                }
            }
        })
    }

    /// The host window regained focus.
    pub fn notify_focus(&self) {
        let _ = self.inner.events.send(CacheEvent::Focus);
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<QueryErrorEvent> {
        self.inner.errors.subscribe()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.in_flight.lock().contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) async fn read(
        &self,
        key: &QueryKey,
        fetcher: &ErasedFetcher,
        config: &QueryConfig,
        cancel: Option<&CancellationToken>,
    ) -> FetchResult {
        match self.inner.cache.lookup(key) {
            Lookup::Fresh(value) => return Ok(value),
            Lookup::Stale(value) => {
                self.revalidate(key, fetcher, config);
                return Ok(value);
            }
            Lookup::Missing => {}
        }

        let waiter = self.attach(key, fetcher, config, false);
        waiter.wait(cancel).await
    }

    pub(crate) async fn refetch(
        &self,
        key: &QueryKey,
        fetcher: &ErasedFetcher,
        config: &QueryConfig,
        cancel: Option<&CancellationToken>,
    ) -> FetchResult {
        let waiter = self.attach(key, fetcher, config, true);
        waiter.wait(cancel).await
    }

    fn next_seq(&self) -> u64 {
        self.inner.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Join the in-flight fetch for `key`, or start one. `force` always
    /// starts a new fetch, superseding the current slot.
    fn attach(
        &self,
        key: &QueryKey,
        fetcher: &ErasedFetcher,
        config: &QueryConfig,
        force: bool,
    ) -> Waiter {
        let mut in_flight = self.inner.in_flight.lock();
        if !force {
            if let Some(slot) = in_flight.get(key) {
                debug!(key = %key, seq = slot.seq, "joining in-flight fetch");
                return Waiter::attach(&self.inner, key, Arc::clone(slot));
            }
        }

        let slot = self.start_fetch(key, Arc::clone(fetcher), config);
        in_flight.insert(key.clone(), Arc::clone(&slot));
        Waiter::attach(&self.inner, key, slot)
    }

    /// Start a background refetch unless one is already running.
    fn revalidate(&self, key: &QueryKey, fetcher: &ErasedFetcher, config: &QueryConfig) {
        let waiter = {
            let mut in_flight = self.inner.in_flight.lock();
            if in_flight.contains_key(key) {
                return;
            }
            let slot = self.start_fetch(key, Arc::clone(fetcher), config);
            in_flight.insert(key.clone(), Arc::clone(&slot));
            Waiter::attach(&self.inner, key, slot)
        };

        debug!(key = %key, "revalidating stale entry");
        let errors = self.inner.errors.clone();
        tokio::spawn(async move {
            if let Err(error) = waiter.wait(None).await {
                let _ = errors.send(QueryErrorEvent { key: waiter.key.clone(), error });
            }
        });
    }

    fn start_fetch(
        &self,
        key: &QueryKey,
        fetcher: ErasedFetcher,
        config: &QueryConfig,
    ) -> Arc<FetchSlot> {
        let seq = self.next_seq();
        let cancel = CancellationToken::new();
        let completed = Arc::new(AtomicBool::new(false));
        let retry = RetryExecutor::new(config.retry_config(), ClassifiedRetryPolicy::default());
        let lifetime = config.lifetime();

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let task_cancel = cancel.clone();
        let task_completed = Arc::clone(&completed);

        let task = tokio::spawn(async move {
            let result = tokio::select! {
                () = task_cancel.cancelled() => Err(classify(&RawFailure::Cancelled)),
                result = retry.execute(|| fetcher()) => result,
            };
            task_completed.store(true, Ordering::SeqCst);

            if let Ok(value) = &result {
                if !inner.cache.insert_if_newer(task_key.clone(), Arc::clone(value), seq, lifetime) {
                    debug!(key = %task_key, seq, "discarding result of superseded fetch");
                }
            }
            inner.finish(&task_key, seq);
            if result.is_ok() {
                let _ = inner.events.send(CacheEvent::Updated(task_key));
            }
            result
        });

        let fetch = async move {
            task.await.unwrap_or_else(|err| {
                Err(ClassifiedError::new(
                    ErrorKind::UnknownError,
                    format!("fetch task failed: {err}"),
                    false,
                ))
            })
        }
        .boxed()
        .shared();

        Arc::new(FetchSlot { seq, fetch, waiters: AtomicUsize::new(0), cancel, completed })
    }
}

pub(crate) fn erase<T, F, Fut>(fetcher: F) -> ErasedFetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ClassifiedError>> + Send + 'static,
{
    Arc::new(move || {
        let fetch = fetcher();
        async move { fetch.await.map(|value| Arc::new(value) as CachedValue) }.boxed()
    })
}

pub(crate) fn downcast<T: Send + Sync + 'static>(
    key: &QueryKey,
    value: CachedValue,
) -> Result<Arc<T>, ClassifiedError> {
    value.downcast::<T>().map_err(|_| {
        let err = ClassifiedError::new(
            ErrorKind::UnknownError,
            format!("cached value for {key} is not a {}", std::any::type_name::<T>()),
            false,
        );
        record_classified_error(&err, "read cached query");
        err
    })
}
