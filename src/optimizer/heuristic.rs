//! Closed-form reference optimizer
//!
//! Not a tax model. Holds the request's rates flat over the remaining horizon,
//! taxes tax-deferred withdrawals and Roth conversions at one flat rate, and
//! solves the objective with an annuity-due on after-tax wealth:
//!
//! - max spending: level real spending that leaves the bequest target
//! - max bequest: the requested real spending, feasible when its present value
//!   fits inside after-tax wealth
//!
//! Withdrawal order is taxable, then tax-deferred (grossed up), then tax-free.

use super::{Optimizer, OptimizerPlan, OptimizerRequest, PlanYear, SolverFailure};
use crate::case::{Balances, Objective};

/// Default flat ordinary income tax rate
pub const DEFAULT_TAX_RATE: f64 = 0.22;

#[derive(Debug, Clone)]
pub struct HeuristicOptimizer {
    tax_rate: f64,
}

impl Default for HeuristicOptimizer {
    fn default() -> Self {
        Self { tax_rate: DEFAULT_TAX_RATE }
    }
}

/// Amounts for one planned year plus the balances it leaves behind
struct YearPlan {
    year: PlanYear,
    end: Balances,
}

impl HeuristicOptimizer {
    pub fn new(tax_rate: f64) -> Self {
        Self { tax_rate: tax_rate.clamp(0.0, 0.99) }
    }

    fn after_tax_wealth(&self, balances: &Balances) -> f64 {
        balances.taxable + balances.tax_free + balances.tax_deferred * (1.0 - self.tax_rate)
    }

    /// Sum of real discount factors for `years` start-of-year payments
    fn annuity_due(real_return: f64, years: u32) -> f64 {
        (0..years).map(|k| (1.0 + real_return).powi(-(k as i32))).sum()
    }

    /// Target nominal net spending for the current year
    fn spending(&self, request: &OptimizerRequest, balances: &Balances, remaining: u32, price_index: f64) -> Result<f64, SolverFailure> {
        let real = request.assumptions.real_portfolio_return(&request.allocation);
        let wealth = self.after_tax_wealth(balances);
        let annuity = Self::annuity_due(real, remaining);
        let floor = request.policy.spending_floor * price_index;

        match request.policy.objective {
            Objective::MaxSpending { bequest } => {
                let bequest_pv = bequest * price_index / (1.0 + real).powi(remaining as i32);
                let spend = ((wealth - bequest_pv) / annuity).max(0.0);
                if spend + 1e-6 < floor {
                    return Err(SolverFailure::new(format!(
                        "sustainable spending {:.2} cannot meet floor {:.2}",
                        spend, floor
                    )));
                }
                Ok(spend)
            }
            Objective::MaxBequest { net_spending } => {
                let spend = (net_spending * price_index).max(floor);
                if spend * annuity > wealth * (1.0 + 1e-9) + 1e-6 {
                    return Err(SolverFailure::new(format!(
                        "spending {:.2} for {} years exceeds after-tax wealth {:.2}",
                        spend, remaining, wealth
                    )));
                }
                Ok(spend)
            }
        }
    }

    fn plan_year(&self, request: &OptimizerRequest, balances: Balances, remaining: u32, price_index: f64) -> Result<YearPlan, SolverFailure> {
        let t = self.tax_rate;
        let spend = self.spending(request, &balances, remaining, price_index)?;

        let conversion = request
            .policy
            .requested_conversion(balances.tax_deferred, price_index)
            .min(balances.tax_deferred);
        let conversion_tax = conversion * t;

        let mut need = spend + conversion_tax;
        let from_taxable = need.min(balances.taxable);
        need -= from_taxable;

        let deferred_left = balances.tax_deferred - conversion;
        let from_deferred = (need / (1.0 - t)).min(deferred_left);
        let withdrawal_tax = from_deferred * t;
        need -= from_deferred - withdrawal_tax;

        let from_free = need.min(balances.tax_free + conversion);
        need -= from_free;

        if need > 1e-6 * (1.0 + balances.total()) {
            return Err(SolverFailure::new(format!(
                "balances short by {:.2} to fund year with {} remaining",
                need, remaining
            )));
        }

        let withdrawals = Balances::new(from_taxable, from_deferred, from_free);
        let after = Balances::new(
            balances.taxable - from_taxable,
            deferred_left - from_deferred,
            balances.tax_free + conversion - from_free,
        );
        let growth = 1.0 + request.assumptions.portfolio_return(&request.allocation);
        let end = after.grown(growth);

        Ok(YearPlan {
            year: PlanYear {
                net_spending: Some(spend),
                roth_conversion: Some(conversion),
                withdrawals: Some(withdrawals),
                taxes: Some(conversion_tax + withdrawal_tax),
                end_balances: Some(end),
            },
            end,
        })
    }
}

impl Optimizer for HeuristicOptimizer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn solve(&self, request: &OptimizerRequest) -> Result<OptimizerPlan, SolverFailure> {
        if request.remaining_years == 0 {
            return Err(SolverFailure::new("no years left to plan"));
        }

        let first = self.plan_year(request, request.balances, request.remaining_years, request.price_index)?;
        let mut balances = first.end;
        let mut years = vec![first.year];

        let inflation = 1.0 + request.assumptions.inflation;
        let mut price_index = request.price_index;
        for remaining in (1..request.remaining_years).rev() {
            price_index *= inflation;
            // Later years only inform the projection; a shortfall ends it early.
            match self.plan_year(request, balances, remaining, price_index) {
                Ok(next) => {
                    balances = next.end;
                    years.push(next.year);
                }
                Err(_) => break,
            }
        }

        Ok(OptimizerPlan {
            feasible: true,
            status: Some(format!("{} years planned", years.len())),
            years,
        })
    }
}
