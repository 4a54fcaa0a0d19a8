//! Financial state owned by one trial
//!
//! States are values: each year produces a new one from the previous state,
//! the applied decision and the realized assumptions. Nothing is shared
//! between trials.

use serde::{Deserialize, Serialize};

use crate::case::{Allocation, Balances, Case};
use crate::optimizer::Decision;
use crate::regime::YearAssumptions;

/// Accounts below this are treated as overdrawn
pub const OVERDRAW_TOLERANCE: f64 = 1e-6;

/// State at a year boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialState {
    /// Years simulated so far
    pub year: u32,

    /// Household ages at the start of `year`
    pub ages: Vec<u32>,

    /// Nominal balances at the start of `year`
    pub balances: Balances,

    /// Cumulative realized inflation since the first year
    pub price_index: f64,
}

/// Result of realizing one year's decision
#[derive(Debug, Clone, PartialEq)]
pub struct Realized {
    pub state: TrialState,
    /// Cash the decision required but no account could supply
    pub shortfall: f64,
}

impl TrialState {
    /// Starting state seeded from the case
    pub fn initial(case: &Case) -> Self {
        Self {
            year: 0,
            ages: case.starting_ages(),
            balances: case.balances,
            price_index: 1.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.balances.total()
    }

    /// After-tax value if the household died now
    pub fn after_tax_estate(&self, heirs_tax_rate: f64) -> f64 {
        self.balances.taxable
            + self.balances.tax_free
            + self.balances.tax_deferred * (1.0 - heirs_tax_rate)
    }

    /// Apply the decision's cash amounts literally, then realized growth
    ///
    /// Order: Roth conversion, per-account withdrawals, settle the cash
    /// identity (surplus to taxable; deficit from taxable, tax-free, then
    /// tax-deferred), grow every account by the allocation-weighted realized
    /// return, advance the price index, ages and year.
    pub fn realize(&self, decision: &Decision, assumptions: &YearAssumptions, allocation: &Allocation) -> Realized {
        let mut b = self.balances;

        b.tax_deferred -= decision.roth_conversion;
        b.tax_free += decision.roth_conversion;

        b.taxable -= decision.withdrawals.taxable;
        b.tax_deferred -= decision.withdrawals.tax_deferred;
        b.tax_free -= decision.withdrawals.tax_free;

        let surplus = decision.total_withdrawn() - decision.net_spending - decision.taxes;
        let mut shortfall = 0.0;
        if surplus >= 0.0 {
            b.taxable += surplus;
        } else {
            let mut deficit = -surplus;
            for account in [&mut b.taxable, &mut b.tax_free, &mut b.tax_deferred] {
                let take = deficit.min((*account).max(0.0));
                *account -= take;
                deficit -= take;
            }
            shortfall = deficit;
        }

        let growth = 1.0 + assumptions.portfolio_return(allocation);
        let state = TrialState {
            year: self.year + 1,
            ages: self.ages.iter().map(|a| a + 1).collect(),
            balances: b.grown(growth),
            price_index: self.price_index * (1.0 + assumptions.inflation),
        };

        Realized { state, shortfall }
    }

    pub fn is_overdrawn(&self) -> bool {
        self.balances.min_account() < -OVERDRAW_TOLERANCE
    }
}
