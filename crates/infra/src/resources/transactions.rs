use mintflow_common::error::{ClassifiedError, ErrorKind};
use mintflow_domain::constants::{
    ANALYSIS_PATH, BUDGETS_PATH, CATEGORIZE_PATH, GOALS_PATH, INSIGHTS_PATH,
};
use mintflow_domain::types::{
    Budget, BudgetCreate, Goal, GoalCreate, MessageResponse, Period, SpendingAnalysis,
    TransactionCategoryUpdate, TransactionInsight,
};

use super::{MintFlowApi, MutationResult};
use crate::api::RequestDescriptor;
use crate::query::{QueryHandle, QueryKey};

impl MintFlowApi {
    /// Active budgets.
    pub fn budgets(&self) -> QueryHandle<Vec<Budget>> {
        self.watch(QueryKey::new("transactions.budgets"), RequestDescriptor::get(BUDGETS_PATH))
    }

    /// Spending totals by category over `period`.
    pub fn spending_analysis(&self, period: Period) -> QueryHandle<SpendingAnalysis> {
        self.watch(
            QueryKey::new("transactions.analysis").with_param("period", period),
            RequestDescriptor::get(ANALYSIS_PATH).query("period", period),
        )
    }

    pub fn insights(&self) -> QueryHandle<Vec<TransactionInsight>> {
        self.watch(QueryKey::new("transactions.insights"), RequestDescriptor::get(INSIGHTS_PATH))
    }

    /// Create a budget. Invalid input is rejected before anything is sent.
    pub async fn create_budget(&self, budget: &BudgetCreate) -> MutationResult<Budget> {
        if let Err(err) = budget.validate() {
            return MutationResult::failed(ClassifiedError::new(
                ErrorKind::ValidationError,
                err.to_string(),
                false,
            ));
        }
        match RequestDescriptor::post(BUDGETS_PATH).json(budget) {
            Ok(request) => self.mutation("transactions.budgets", request).await,
            Err(error) => MutationResult::failed(error),
        }
    }

    /// Create a savings goal. Goal queries go stale.
    pub async fn create_goal(&self, goal: &GoalCreate) -> MutationResult<Goal> {
        match RequestDescriptor::post(GOALS_PATH).json(goal) {
            Ok(request) => self.mutation("transactions.goals", request).await,
            Err(error) => MutationResult::failed(error),
        }
    }

    /// Recategorise one transaction. Analysis, insights, and the banking
    /// transaction listing all go stale.
    pub async fn categorize(&self, update: &TransactionCategoryUpdate) -> MutationResult<MessageResponse> {
        let request = match RequestDescriptor::put(CATEGORIZE_PATH).json(update) {
            Ok(request) => request,
            Err(error) => return MutationResult::failed(error),
        };
        let result = self.mutation("transactions", request).await;
        if result.is_success() {
            self.queries.invalidate("banking.transactions");
        }
        result
    }
}
