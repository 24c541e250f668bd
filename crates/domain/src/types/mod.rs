//! Wire types for the MintFlow API
//!
//! Field names follow the JSON the services emit; amounts are plain `f64`
//! because the services serialise them as JSON numbers.

pub mod auth;
pub mod banking;
pub mod transactions;

pub use auth::{LoginRequest, MessageResponse, RefreshRequest, TokenResponse, UserProfile};
pub use banking::{
    BankAccount, BankConnection, SyncRequest, SyncResponse, Transaction, TransactionPageParams,
};
pub use transactions::{
    Budget, BudgetCreate, CategorySpend, Goal, GoalCreate, MonthlySpend, Period, SpendingAnalysis,
    TransactionCategoryUpdate, TransactionInsight,
};
