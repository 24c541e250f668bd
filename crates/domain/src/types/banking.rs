//! Banking service payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_PAGE_LIMIT;

/// Link between a user and a financial institution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankConnection {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub institution_id: String,
    pub institution_name: String,
    pub is_active: bool,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BankAccount {
    pub id: String,
    pub connection_id: String,
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub current_balance: Option<f64>,
    #[serde(default)]
    pub available_balance: Option<f64>,
    #[serde(default)]
    pub credit_limit: Option<f64>,
    pub currency_code: String,
    pub is_active: bool,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

/// Posted or pending bank transaction. Positive amounts are spending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub account_id: String,
    pub transaction_id: String,
    pub amount: f64,
    pub date: DateTime<Utc>,
    pub description: String,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub pending: bool,
    #[serde(default)]
    pub transaction_type: Option<String>,
}

/// Paging and filter parameters for the transactions listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionPageParams {
    pub account_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for TransactionPageParams {
    fn default() -> Self {
        Self { account_id: None, limit: DEFAULT_PAGE_LIMIT, offset: 0 }
    }
}

impl TransactionPageParams {
    #[must_use]
    pub fn for_account(account_id: impl Into<String>) -> Self {
        Self { account_id: Some(account_id.into()), ..Self::default() }
    }

    /// Parameters for the page following this one.
    #[must_use]
    pub fn next_page(&self) -> Self {
        Self { offset: self.offset.saturating_add(self.limit), ..self.clone() }
    }
}

/// Request to pull fresh data from the aggregator.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Sync even if the connection was synced within the last hour.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResponse {
    pub message: String,
    #[serde(default)]
    pub connections: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_type_uses_wire_name() {
        let account: BankAccount = serde_json::from_value(serde_json::json!({
            "id": "acc_1",
            "connection_id": "conn_1",
            "account_id": "plaid_1",
            "name": "Checking",
            "type": "depository",
            "currency_code": "USD",
            "is_active": true,
            "current_balance": 1250.5
        }))
        .unwrap();
        assert_eq!(account.account_type, "depository");
        assert_eq!(account.current_balance, Some(1250.5));
        assert!(account.mask.is_none());
    }

    #[test]
    fn page_params_default_and_advance() {
        let params = TransactionPageParams::for_account("acc_1");
        assert_eq!((params.limit, params.offset), (100, 0));
        let next = params.next_page();
        assert_eq!(next.offset, 100);
        assert_eq!(next.account_id.as_deref(), Some("acc_1"));
    }
}
