//! Adapter between the trial loop and the external optimizer
//!
//! Builds the request from the currently realized state, calls the solver
//! (optionally under a wall-clock budget), and reduces the returned plan to
//! the first-year [`Decision`]. Nothing is cached between calls.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{Decision, Optimizer, OptimizerPlan, OptimizerRequest};
use crate::case::{Balances, Case};
use crate::choice::PolicyParams;
use crate::error::{Result, RoostError};
use crate::regime::YearAssumptions;
use crate::trial::TrialState;

/// Absolute tolerance on dollar amounts
const DOLLAR_TOLERANCE: f64 = 1e-6;

/// Optimizer output reduced to what the engine consumes
#[derive(Debug, Clone)]
pub struct Advice {
    /// Full plan as returned, kept for inspection only
    pub plan: OptimizerPlan,
    /// The decision for the year being simulated
    pub decision: Decision,
}

/// Wraps an optimizer with first-year extraction and failure classification
#[derive(Debug, Clone)]
pub struct OptimizerAdapter {
    optimizer: Arc<dyn Optimizer>,
    timeout: Option<Duration>,
}

impl OptimizerAdapter {
    pub fn new(optimizer: Arc<dyn Optimizer>) -> Self {
        Self { optimizer, timeout: None }
    }

    /// Builder: bound each solve by a wall-clock budget
    ///
    /// Each budgeted solve runs on its own OS thread, one per trial year. A
    /// solver that overruns is abandoned rather than killed, so its thread
    /// lives until the solver returns; a solver that never returns leaks it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn optimizer_name(&self) -> &str {
        self.optimizer.name()
    }

    /// Ask for this year's decision given the realized state and assumptions
    pub fn advise(
        &self,
        case: &Case,
        state: &TrialState,
        remaining_horizon: u32,
        year_assumptions: &YearAssumptions,
        params: &PolicyParams,
    ) -> Result<Advice> {
        let request = OptimizerRequest {
            case_name: case.name.clone(),
            calendar_year: case.start_year + state.year as i32,
            year_index: state.year,
            ages: state.ages.clone(),
            balances: state.balances,
            price_index: state.price_index,
            remaining_years: remaining_horizon,
            assumptions: *year_assumptions,
            allocation: case.allocation,
            policy: *params,
        };

        let plan = self.solve(request)?;
        let decision = first_year_decision(&plan, state, params)?;
        Ok(Advice { plan, decision })
    }

    fn solve(&self, request: OptimizerRequest) -> Result<OptimizerPlan> {
        let year = request.year_index;
        let outcome = match self.timeout {
            None => self.optimizer.solve(&request),
            Some(budget) => {
                let optimizer = Arc::clone(&self.optimizer);
                let (tx, rx) = mpsc::channel();
                let started = Instant::now();
                // A solver that overruns is abandoned; its thread finishes on its own.
                thread::spawn(move || {
                    let _ = tx.send(optimizer.solve(&request));
                });
                match rx.recv_timeout(budget) {
                    Ok(outcome) => outcome,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        return Err(RoostError::OptimizerTimeout {
                            year,
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        });
                    }
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        return Err(RoostError::OptimizerInfeasible {
                            year,
                            reason: "solver thread exited without a plan".into(),
                        });
                    }
                }
            }
        };

        outcome.map_err(|failure| RoostError::OptimizerInfeasible {
            year,
            reason: failure.to_string(),
        })
    }
}

fn malformed(year: u32, reason: impl Into<String>) -> RoostError {
    RoostError::MalformedPlan { year, reason: reason.into() }
}

fn amount(year: u32, field: &str, value: Option<f64>) -> Result<f64> {
    let value = value.ok_or_else(|| malformed(year, format!("first year lacks `{}`", field)))?;
    if !value.is_finite() || value < -DOLLAR_TOLERANCE {
        return Err(malformed(year, format!("`{}` = {} is not a valid amount", field, value)));
    }
    Ok(value.max(0.0))
}

/// Extract and validate the first planned year against the realized state
fn first_year_decision(plan: &OptimizerPlan, state: &TrialState, params: &PolicyParams) -> Result<Decision> {
    let year = state.year;
    if !plan.feasible {
        return Err(RoostError::OptimizerInfeasible {
            year,
            reason: plan.status.clone().unwrap_or_else(|| "solver reported infeasible".into()),
        });
    }
    let first = plan.years.first().ok_or_else(|| malformed(year, "plan has no years"))?;

    let net_spending = amount(year, "net_spending", first.net_spending)?;
    let taxes = amount(year, "taxes", first.taxes)?;
    let roth_conversion = amount(year, "roth_conversion", first.roth_conversion.or(Some(0.0)))?;
    let planned = first
        .withdrawals
        .ok_or_else(|| malformed(year, "first year lacks `withdrawals`"))?;
    let withdrawals = Balances::new(
        amount(year, "withdrawals.taxable", Some(planned.taxable))?,
        amount(year, "withdrawals.tax_deferred", Some(planned.tax_deferred))?,
        amount(year, "withdrawals.tax_free", Some(planned.tax_free))?,
    );

    let balances = &state.balances;
    if withdrawals.taxable > balances.taxable + DOLLAR_TOLERANCE
        || roth_conversion + withdrawals.tax_deferred > balances.tax_deferred + DOLLAR_TOLERANCE
        || withdrawals.tax_free > balances.tax_free + roth_conversion + DOLLAR_TOLERANCE
    {
        return Err(malformed(year, "decision moves more than the realized balances hold"));
    }

    let floor = params.spending_floor * state.price_index;
    if net_spending + DOLLAR_TOLERANCE < floor {
        return Err(RoostError::OptimizerInfeasible {
            year,
            reason: format!("net spending {:.2} below floor {:.2}", net_spending, floor),
        });
    }

    Ok(Decision {
        net_spending,
        roth_conversion,
        withdrawals,
        taxes,
        planned_end_total: first.end_balances.map(|b| b.total()),
    })
}
