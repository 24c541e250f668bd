//! Typed MintFlow resources
//!
//! Reads are exposed as [`QueryHandle`]s keyed by service resource
//! (`banking.accounts`, `transactions.budgets`, ...). Mutations go through
//! [`QueryClient::mutate`] and mark the resource they touch stale.

mod auth;
mod banking;
mod transactions;

use std::sync::Arc;

use mintflow_common::error::ClassifiedError;
use serde::de::DeserializeOwned;

use crate::api::{RequestDescriptor, RequestExecutor};
use crate::query::{MutationConfig, QueryClient, QueryHandle, QueryKey};

/// Outcome of a mutation, shaped for a view: exactly one side is set.
#[derive(Debug, Clone)]
pub struct MutationResult<T> {
    pub data: Option<T>,
    pub error: Option<ClassifiedError>,
}

impl<T> MutationResult<T> {
    pub fn failed(error: ClassifiedError) -> Self {
        Self { data: None, error: Some(error) }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// # Errors
    /// Returns the classified failure if the mutation failed.
    pub fn into_result(self) -> Result<T, ClassifiedError> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Err(ClassifiedError::new(
                mintflow_common::error::ErrorKind::UnknownError,
                "mutation produced no result",
                false,
            )),
        }
    }
}

impl<T> From<Result<T, ClassifiedError>> for MutationResult<T> {
    fn from(result: Result<T, ClassifiedError>) -> Self {
        match result {
            Ok(data) => Self { data: Some(data), error: None },
            Err(error) => Self::failed(error),
        }
    }
}

/// Facade over the executor and query client.
#[derive(Debug, Clone)]
pub struct MintFlowApi {
    executor: Arc<RequestExecutor>,
    queries: QueryClient,
    mutations: MutationConfig,
}

impl MintFlowApi {
    pub fn new(executor: Arc<RequestExecutor>, queries: QueryClient, mutations: MutationConfig) -> Self {
        Self { executor, queries, mutations }
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Subscribe to `request` under `key` with the client's default options.
    fn watch<T>(&self, key: QueryKey, request: RequestDescriptor) -> QueryHandle<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let executor = Arc::clone(&self.executor);
        let request = Arc::new(request);
        self.queries.query(
            key,
            move || {
                let executor = Arc::clone(&executor);
                let request = Arc::clone(&request);
                async move { executor.execute_json::<T>(&request).await }
            },
            self.queries.defaults().clone(),
        )
    }

    /// Send `request` as a mutation of `resource`.
    async fn mutation<T>(&self, resource: &str, request: RequestDescriptor) -> MutationResult<T>
    where
        T: DeserializeOwned,
    {
        let key = QueryKey::new(resource);
        let executor = &self.executor;
        let request = &request;
        self.queries
            .mutate(&key, move || async move { executor.execute_json::<T>(request).await }, &self.mutations)
            .await
            .into()
    }
}
