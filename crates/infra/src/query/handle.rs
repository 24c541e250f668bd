//! Observable query state for UI bindings

use std::sync::Arc;

use mintflow_common::error::ClassifiedError;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::client::{downcast, CacheEvent, ErasedFetcher, QueryClient, QueryErrorEvent};
use super::config::QueryConfig;
use super::key::QueryKey;

/// Snapshot of one query as a view would render it.
///
/// `data` survives failed refetches; `error` carries the latest failure
/// alongside it.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<ClassifiedError>,
    /// No data yet and a fetch is running.
    pub is_loading: bool,
    /// Any fetch for the key is running, background ones included.
    pub is_fetching: bool,
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
        }
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self { data: None, error: None, is_loading: false, is_fetching: false }
    }
}

enum Command {
    Refetch,
}

/// Live subscription to one query.
///
/// Dropping the handle (or calling [`Self::cancel`]) stops it and abandons
/// its pending fetch without disturbing other callers of the same key.
pub struct QueryHandle<T> {
    key: QueryKey,
    state: watch::Receiver<QueryState<T>>,
    commands: mpsc::UnboundedSender<Command>,
    driver: CancellationToken,
}

impl<T: Send + Sync + 'static> QueryHandle<T> {
    pub(crate) fn spawn(
        client: QueryClient,
        key: QueryKey,
        fetcher: ErasedFetcher,
        config: QueryConfig,
    ) -> Self {
        let cached = client.get_query_data::<T>(&key);
        let initial = QueryState {
            is_loading: cached.is_none(),
            is_fetching: cached.is_none(),
            data: cached,
            error: None,
        };
        let (state, receiver) = watch::channel(initial);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let driver = CancellationToken::new();

        // Subscribe before the first load so no update can slip past.
        let events = client.subscribe_events();
        let errors = client.subscribe_errors();
        let task = Driver { client, key: key.clone(), fetcher, config, state, cancel: driver.clone() };
        tokio::spawn(task.run(command_rx, events, errors));

        Self { key, state: receiver, commands, driver }
    }
}

impl<T> QueryHandle<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<T> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.state.borrow().data.clone()
    }

    pub fn error(&self) -> Option<ClassifiedError> {
        self.state.borrow().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    /// Ask for a new fetch regardless of freshness.
    pub fn refetch(&self) {
        let _ = self.commands.send(Command::Refetch);
    }

    /// Wait for the next state change. Returns `false` once the handle has
    /// stopped.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Wait until the state satisfies `predicate`. Returns `None` if the
    /// handle stopped first.
    pub async fn wait_until<P>(&mut self, predicate: P) -> Option<QueryState<T>>
    where
        P: FnMut(&QueryState<T>) -> bool,
    {
        self.state.wait_for(predicate).await.ok().map(|state| (*state).clone())
    }

    pub fn cancel(&self) {
        self.driver.cancel();
    }
}

impl<T> Drop for QueryHandle<T> {
    fn drop(&mut self) {
        self.driver.cancel();
    }
}

impl<T> std::fmt::Debug for QueryHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHandle")
            .field("key", &self.key)
            .field("stopped", &self.driver.is_cancelled())
            .finish_non_exhaustive()
    }
}

struct Driver<T> {
    client: QueryClient,
    key: QueryKey,
    fetcher: ErasedFetcher,
    config: QueryConfig,
    state: watch::Sender<QueryState<T>>,
    cancel: CancellationToken,
}

impl<T: Send + Sync + 'static> Driver<T> {
    async fn run(
        self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: broadcast::Receiver<CacheEvent>,
        mut errors: broadcast::Receiver<QueryErrorEvent>,
    ) {
        self.load(false).await;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(Command::Refetch) => self.load(true).await,
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => self.on_cache_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        debug!(key = %self.key, missed, "query handle lagged behind cache events");
                        self.sync_from_cache();
                    }
                    Err(RecvError::Closed) => break,
                },
                failure = errors.recv() => match failure {
                    Ok(QueryErrorEvent { key, error }) if key == self.key => {
                        self.state.send_modify(|state| {
                            state.error = Some(error);
                            state.is_loading = false;
                            state.is_fetching = false;
                        });
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
            }
        }

        debug!(key = %self.key, "query handle stopped");
    }

    async fn on_cache_event(&self, event: CacheEvent) {
        match event {
            CacheEvent::Updated(key) if key == self.key => self.sync_from_cache(),
            CacheEvent::Invalidated(resource) if self.key.matches_resource(&resource) => {
                self.load(false).await;
            }
            CacheEvent::Focus if self.config.refetch_on_focus => self.load(false).await,
            CacheEvent::Cleared => self.state.send_modify(|state| *state = QueryState::default()),
            _ => {}
        }
    }

    async fn load(&self, force: bool) {
        if force || self.client.get_query_data::<T>(&self.key).is_none() {
            self.state.send_modify(|state| {
                state.is_loading = state.data.is_none();
                state.is_fetching = true;
            });
        }

        let result = if force {
            self.client.refetch(&self.key, &self.fetcher, &self.config, Some(&self.cancel)).await
        } else {
            self.client.read(&self.key, &self.fetcher, &self.config, Some(&self.cancel)).await
        };
        if self.cancel.is_cancelled() {
            return;
        }

        match result.and_then(|value| downcast::<T>(&self.key, value)) {
            Ok(data) => {
                // A newer fetch may have landed while this one was running.
                let data = self.client.get_query_data::<T>(&self.key).unwrap_or(data);
                let fetching = self.client.is_fetching(&self.key);
                self.state.send_modify(|state| {
                    state.data = Some(data);
                    state.error = None;
                    state.is_loading = false;
                    state.is_fetching = fetching;
                });
            }
            Err(error) => self.state.send_modify(|state| {
                state.error = Some(error);
                state.is_loading = false;
                state.is_fetching = false;
            }),
        }
    }

    fn sync_from_cache(&self) {
        let Some(data) = self.client.get_query_data::<T>(&self.key) else { return };
        let fetching = self.client.is_fetching(&self.key);
        self.state.send_if_modified(|state| {
            let unchanged = state.data.as_ref().is_some_and(|current| Arc::ptr_eq(current, &data))
                && state.error.is_none()
                && !state.is_loading
                && state.is_fetching == fetching;
            if unchanged {
                return false;
            }
            state.data = Some(data);
            state.error = None;
            state.is_loading = false;
            state.is_fetching = fetching;
            true
        });
    }
}
