//! Trial records: the per-year trace and the terminal outcome of one trial

use serde::{Deserialize, Serialize};

use super::TrialState;
use crate::optimizer::Decision;
use crate::regime::{TrialSeeds, YearAssumptions};

/// Why a trial was ruined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RuinReason {
    /// The decision's cash could not be covered by any account
    InsufficientFunds { shortfall: f64 },
    /// Realized balances fell below what the next year's floor requires
    BelowSpendingFloor { total: f64, floor: f64 },
}

/// Class of per-year optimizer failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Infeasible,
    Timeout,
    MalformedPlan,
}

/// Terminal outcome; `year` is always the number of years simulated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialStatus {
    Completed,
    Ruined { year: u32, reason: RuinReason },
    Failed { year: u32, kind: FailureKind, reason: String },
    Cancelled { year: u32 },
}

impl TrialStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TrialStatus::Completed => "completed",
            TrialStatus::Ruined { .. } => "ruined",
            TrialStatus::Failed { .. } => "failed",
            TrialStatus::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TrialStatus::Completed)
    }
}

/// One applied year: state before, decision, realized state after
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearRecord {
    pub calendar_year: i32,
    pub assumptions: YearAssumptions,
    pub before: TrialState,
    pub decision: Decision,
    pub after: TrialState,
    /// Realized end total minus the optimizer's projected end total
    pub forecast_gap: Option<f64>,
}

impl YearRecord {
    pub fn real_spending(&self) -> f64 {
        self.decision.net_spending / self.before.price_index
    }
}

/// Totals derived from a trial's trace
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrialMetrics {
    pub total_spending_nominal: f64,
    pub total_spending_real: f64,
    pub total_conversions_nominal: f64,
    pub total_conversions_real: f64,
    pub total_taxes_nominal: f64,
    pub total_taxes_real: f64,
    /// After-tax estate at the end of the trial
    pub terminal_bequest_nominal: f64,
    pub terminal_bequest_real: f64,
    pub final_price_index: f64,
}

impl TrialMetrics {
    pub fn from_trace(years: &[YearRecord], final_state: &TrialState, heirs_tax_rate: f64) -> Self {
        let mut metrics = TrialMetrics::default();
        for y in years {
            let index = y.before.price_index;
            metrics.total_spending_nominal += y.decision.net_spending;
            metrics.total_spending_real += y.real_spending();
            metrics.total_conversions_nominal += y.decision.roth_conversion;
            metrics.total_conversions_real += y.decision.roth_conversion / index;
            metrics.total_taxes_nominal += y.decision.taxes;
            metrics.total_taxes_real += y.decision.taxes / index;
        }
        let estate = final_state.after_tax_estate(heirs_tax_rate).max(0.0);
        metrics.terminal_bequest_nominal = estate;
        metrics.terminal_bequest_real = estate / final_state.price_index;
        metrics.final_price_index = final_state.price_index;
        metrics
    }
}

/// Everything one trial produced; read-only once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub run_label: String,
    pub case_name: String,
    pub trial_id: u32,
    pub seeds: TrialSeeds,
    /// Horizon this trial ran against (may be shortened by longevity sampling)
    pub horizon_years: u32,
    /// The full rate draw, fixed before the first year
    pub draw: Vec<YearAssumptions>,
    pub years: Vec<YearRecord>,
    pub final_state: TrialState,
    pub status: TrialStatus,
    pub metrics: TrialMetrics,
}
