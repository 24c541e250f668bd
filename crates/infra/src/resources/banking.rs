use mintflow_domain::constants::{ACCOUNTS_PATH, BANK_TRANSACTIONS_PATH, CONNECTIONS_PATH, SYNC_PATH};
use mintflow_domain::types::{
    BankAccount, BankConnection, MessageResponse, SyncRequest, SyncResponse, Transaction,
    TransactionPageParams,
};

use super::{MintFlowApi, MutationResult};
use crate::api::RequestDescriptor;
use crate::query::{QueryHandle, QueryKey};

impl MintFlowApi {
    /// Linked bank accounts with their latest balances.
    pub fn accounts(&self) -> QueryHandle<Vec<BankAccount>> {
        self.watch(QueryKey::new("banking.accounts"), RequestDescriptor::get(ACCOUNTS_PATH))
    }

    /// Aggregator connections, one per linked institution.
    pub fn connections(&self) -> QueryHandle<Vec<BankConnection>> {
        self.watch(QueryKey::new("banking.connections"), RequestDescriptor::get(CONNECTIONS_PATH))
    }

    /// One page of transactions, optionally for a single account.
    pub fn transactions_page(&self, params: &TransactionPageParams) -> QueryHandle<Vec<Transaction>> {
        let key = QueryKey::new("banking.transactions")
            .with_optional_param("account_id", params.account_id.as_deref())
            .with_param("limit", params.limit)
            .with_param("offset", params.offset);

        let mut request = RequestDescriptor::get(BANK_TRANSACTIONS_PATH);
        if let Some(account_id) = &params.account_id {
            request = request.query("account_id", account_id);
        }
        let request = request.query("limit", params.limit).query("offset", params.offset);

        self.watch(key, request)
    }

    /// Ask the aggregator to pull new data. Every banking query goes stale.
    pub async fn sync(&self, sync: &SyncRequest) -> MutationResult<SyncResponse> {
        match RequestDescriptor::post(SYNC_PATH).json(sync) {
            Ok(request) => self.mutation("banking", request).await,
            Err(error) => MutationResult::failed(error),
        }
    }

    /// Deactivate a bank connection and its accounts.
    pub async fn delete_connection(&self, connection_id: &str) -> MutationResult<MessageResponse> {
        let request = RequestDescriptor::delete(format!("{CONNECTIONS_PATH}/{connection_id}"));
        self.mutation("banking", request).await
    }
}
