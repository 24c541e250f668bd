//! Transaction service payloads: budgets, goals, categorisation, analysis

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MintFlowError;

/// Budget and analysis period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl Period {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = MintFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(MintFlowError::InvalidInput(format!(
                "period must be weekly, monthly, or yearly, got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetCreate {
    pub name: String,
    pub category: String,
    pub amount: f64,
    pub period: Period,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl BudgetCreate {
    /// Reject budgets the service would refuse anyway.
    ///
    /// # Errors
    /// Returns [`MintFlowError::InvalidInput`] for a blank name or category,
    /// a non-positive amount, or an end date before the start date.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() || self.category.trim().is_empty() {
            return Err(MintFlowError::InvalidInput("budget name and category are required".into()));
        }
        if self.amount.is_nan() || self.amount <= 0.0 {
            return Err(MintFlowError::InvalidInput("budget amount must be positive".into()));
        }
        if self.end_date.is_some_and(|end| end < self.start_date) {
            return Err(MintFlowError::InvalidInput("budget ends before it starts".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub category: String,
    pub amount: f64,
    pub period: Period,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(default)]
    pub spent_amount: f64,
    #[serde(default)]
    pub remaining_amount: f64,
    #[serde(default)]
    pub percentage_used: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub target_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_amount: f64,
    pub current_amount: f64,
    #[serde(default)]
    pub target_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: Option<String>,
    pub is_achieved: bool,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionCategoryUpdate {
    pub transaction_id: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySpend {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthlySpend {
    /// `YYYY-MM`
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpendingAnalysis {
    pub period: Period,
    pub total_spent: f64,
    pub total_income: f64,
    pub net_amount: f64,
    #[serde(default)]
    pub top_categories: Vec<CategorySpend>,
    /// Oldest month first.
    #[serde(default)]
    pub monthly_trend: Vec<MonthlySpend>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionInsight {
    /// `spending_pattern`, `unusual_transaction` or `budget_alert`.
    #[serde(rename = "type")]
    pub insight_type: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    pub confidence: f64,
    pub action_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> BudgetCreate {
        BudgetCreate {
            name: "Groceries".into(),
            category: "Food and Drink".into(),
            amount: 400.0,
            period: Period::Monthly,
            start_date: Utc::now(),
            end_date: None,
        }
    }

    #[test]
    fn period_parses_wire_values() {
        assert_eq!("weekly".parse::<Period>().unwrap(), Period::Weekly);
        assert!("daily".parse::<Period>().is_err());
        assert_eq!(serde_json::to_value(Period::Yearly).unwrap(), "yearly");
    }

    #[test]
    fn budget_validation() {
        assert!(budget().validate().is_ok());

        let mut negative = budget();
        negative.amount = -5.0;
        assert!(negative.validate().is_err());

        let mut backwards = budget();
        backwards.end_date = Some(backwards.start_date - chrono::Duration::days(1));
        assert!(backwards.validate().is_err());
    }

    #[test]
    fn analysis_decodes_nested_lists() {
        let analysis: SpendingAnalysis = serde_json::from_value(serde_json::json!({
            "period": "monthly",
            "total_spent": 820.0,
            "total_income": 3000.0,
            "net_amount": 2180.0,
            "top_categories": [{"category": "Food and Drink", "amount": 320.0, "percentage": 39.0}],
            "monthly_trend": [{"month": "2025-01", "amount": 820.0}]
        }))
        .unwrap();
        assert_eq!(analysis.top_categories.len(), 1);
        assert_eq!(analysis.monthly_trend[0].month, "2025-01");
    }
}
