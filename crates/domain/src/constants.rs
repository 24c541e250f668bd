//! API constants
//!
//! Endpoint paths are relative to `api.base_url`.

// Auth service
pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";
pub const LOGOUT_PATH: &str = "/api/v1/auth/logout";
pub const ME_PATH: &str = "/api/v1/auth/me";

// Banking service
pub const ACCOUNTS_PATH: &str = "/api/v1/banking/accounts";
pub const CONNECTIONS_PATH: &str = "/api/v1/banking/connections";
pub const BANK_TRANSACTIONS_PATH: &str = "/api/v1/banking/transactions";
pub const SYNC_PATH: &str = "/api/v1/banking/sync";

// Transaction service
pub const BUDGETS_PATH: &str = "/api/v1/transactions/budgets";
pub const GOALS_PATH: &str = "/api/v1/transactions/goals";
pub const CATEGORIZE_PATH: &str = "/api/v1/transactions/categorize";
pub const ANALYSIS_PATH: &str = "/api/v1/transactions/analysis";
pub const INSIGHTS_PATH: &str = "/api/v1/transactions/insights";

/// Request correlation header understood by the API gateway.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

// Client defaults
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "MintFlow.api";
pub const DEFAULT_KEYCHAIN_ACCOUNT: &str = "default";
pub const DEFAULT_STALE_TIME_MS: u64 = 30_000;
pub const DEFAULT_CACHE_TIME_MS: u64 = 300_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Upper bound on retries for state-changing calls.
pub const MAX_MUTATION_RETRIES: u32 = 1;

// Transactions listing
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
