//! Wire shapes exchanged with the external optimizer
//!
//! The plan schema belongs to the optimizer. Every plan field is optional and
//! unknown fields are ignored; only the first-year fields the engine consumes
//! are validated, in [`super::OptimizerAdapter`].

use serde::{Deserialize, Serialize};

use crate::case::{Allocation, Balances};
use crate::choice::PolicyParams;
use crate::regime::YearAssumptions;

/// Single-scenario problem handed to the optimizer for one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerRequest {
    pub case_name: String,

    /// Calendar year being decided
    pub calendar_year: i32,

    /// Zero-based trial year being decided
    pub year_index: u32,

    /// Household ages at the start of the year
    pub ages: Vec<u32>,

    /// Realized balances at the start of the year
    pub balances: Balances,

    /// Cumulative inflation since the first year (today's dollars -> nominal)
    pub price_index: f64,

    /// Years left including this one
    pub remaining_years: u32,

    /// This year's realized rates; the optimizer holds them flat over its horizon
    pub assumptions: YearAssumptions,

    pub allocation: Allocation,

    pub policy: PolicyParams,
}

fn default_feasible() -> bool {
    true
}

/// Optimal trajectory returned by the optimizer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizerPlan {
    #[serde(default = "default_feasible")]
    pub feasible: bool,

    /// Free-form solver status message
    #[serde(default)]
    pub status: Option<String>,

    /// Year-by-year amounts, first entry is the year being decided
    #[serde(default)]
    pub years: Vec<PlanYear>,
}

/// One planned year, nominal dollars
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanYear {
    #[serde(default)]
    pub net_spending: Option<f64>,

    #[serde(default)]
    pub roth_conversion: Option<f64>,

    /// Gross withdrawals per account
    #[serde(default)]
    pub withdrawals: Option<Balances>,

    /// All taxes paid this year
    #[serde(default)]
    pub taxes: Option<f64>,

    /// Optimizer's own projection of end-of-year balances
    #[serde(default)]
    pub end_balances: Option<Balances>,
}

/// The single decision the engine applies for the current year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub net_spending: f64,
    pub roth_conversion: f64,
    pub withdrawals: Balances,
    pub taxes: f64,
    /// Optimizer's projected end-of-year total, if it supplied one
    pub planned_end_total: Option<f64>,
}

impl Decision {
    pub fn total_withdrawn(&self) -> f64 {
        self.withdrawals.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tolerates_unknown_and_missing_fields() {
        let json = r#"{
            "solver": "HiGHS",
            "years": [{"net_spending": 50000.0, "taxes": 4000.0, "medicare": 2100.0}]
        }"#;
        let plan: OptimizerPlan = serde_json::from_str(json).unwrap();
        assert!(plan.feasible);
        assert_eq!(plan.years[0].net_spending, Some(50_000.0));
        assert_eq!(plan.years[0].withdrawals, None);
    }
}
