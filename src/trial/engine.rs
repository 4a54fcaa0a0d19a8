//! Trial executor: the annual re-optimization loop
//!
//! One trial walks `Initialized -> Stepping -> {Completed, Ruined, Failed}`
//! (plus `Cancelled` when the batch is stopped). Each step asks the optimizer
//! for a plan from the realized state and only the current year's
//! assumptions, applies the first year, then realizes that year's returns.

use std::sync::Arc;

use super::record::{FailureKind, RuinReason, TrialMetrics, TrialRecord, TrialStatus, YearRecord};
use super::state::OVERDRAW_TOLERANCE;
use super::{CancelToken, TrialState};
use crate::choice::Run;
use crate::error::{Result, RoostError};
use crate::longevity::sample_household;
use crate::optimizer::{Optimizer, OptimizerAdapter};
use crate::regime::YearAssumptions;

/// Where a trial is in its lifecycle
#[derive(Debug, Clone, PartialEq)]
pub enum TrialPhase {
    Initialized,
    Stepping,
    Done(TrialStatus),
}

/// Outcome of a single year step
#[derive(Debug)]
enum Step {
    Applied(YearRecord),
    Ruined(YearRecord, RuinReason),
    Failed(FailureKind, String),
}

/// Runs trials for any run against one optimizer
#[derive(Debug, Clone)]
pub struct TrialExecutor {
    adapter: OptimizerAdapter,
}

impl TrialExecutor {
    pub fn new(adapter: OptimizerAdapter) -> Self {
        Self { adapter }
    }

    /// Executor around a bare optimizer with no time budget
    pub fn from_optimizer(optimizer: Arc<dyn Optimizer>) -> Self {
        Self::new(OptimizerAdapter::new(optimizer))
    }

    pub fn adapter(&self) -> &OptimizerAdapter {
        &self.adapter
    }

    /// Horizon for one trial: the case horizon, or a sampled lifetime when enabled
    pub fn trial_horizon(run: &Run, trial_id: u32) -> u32 {
        if run.settings.sample_longevity {
            sample_household(&run.case, run.trial_seeds(trial_id).longevity).horizon_years
        } else {
            run.case.horizon_years
        }
    }

    /// Execute one trial to a terminal status
    ///
    /// Optimizer failures end the trial as `Failed` and are not returned as
    /// errors; an `Err` here means the run itself is misconfigured.
    pub fn execute(&self, run: &Run, trial_id: u32, cancel: &CancelToken) -> Result<TrialRecord> {
        let seeds = run.trial_seeds(trial_id);
        let horizon = Self::trial_horizon(run, trial_id);
        let draw = run.regime.generate(seeds.rates, horizon)?;
        if draw.len() != horizon as usize {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "{} regime produced {} years for a {}-year horizon",
                run.regime.name(),
                draw.len(),
                horizon
            )));
        }

        let mut state = TrialState::initial(&run.case);
        let mut years: Vec<YearRecord> = Vec::with_capacity(horizon as usize);
        let mut phase = TrialPhase::Initialized;

        let status = loop {
            phase = match phase {
                TrialPhase::Initialized => {
                    log::trace!(
                        "{} trial {}: horizon {} years, rates seed {:#x}",
                        run.label,
                        trial_id,
                        horizon,
                        seeds.rates
                    );
                    TrialPhase::Stepping
                }
                TrialPhase::Stepping => {
                    if state.year >= horizon {
                        TrialPhase::Done(TrialStatus::Completed)
                    } else if cancel.is_cancelled() {
                        TrialPhase::Done(TrialStatus::Cancelled { year: state.year })
                    } else {
                        let assumptions = draw[state.year as usize];
                        match self.step(run, &state, horizon, &assumptions)? {
                            Step::Applied(record) => {
                                state = record.after.clone();
                                years.push(record);
                                TrialPhase::Stepping
                            }
                            Step::Ruined(record, reason) => {
                                state = record.after.clone();
                                years.push(record);
                                TrialPhase::Done(TrialStatus::Ruined { year: state.year, reason })
                            }
                            Step::Failed(kind, reason) => {
                                TrialPhase::Done(TrialStatus::Failed { year: state.year, kind, reason })
                            }
                        }
                    }
                }
                TrialPhase::Done(status) => break status,
            };
        };

        match &status {
            TrialStatus::Completed => {
                log::trace!("{} trial {} completed {} years", run.label, trial_id, years.len())
            }
            other => log::debug!("{} trial {} ended {:?}", run.label, trial_id, other),
        }

        let metrics = TrialMetrics::from_trace(&years, &state, run.case.constraints.heirs_tax_rate);
        Ok(TrialRecord {
            run_label: run.label.clone(),
            case_name: run.case.name.clone(),
            trial_id,
            seeds,
            horizon_years: horizon,
            draw,
            years,
            final_state: state,
            status,
            metrics,
        })
    }

    /// Advise, apply and realize one year
    fn step(&self, run: &Run, state: &TrialState, horizon: u32, assumptions: &YearAssumptions) -> Result<Step> {
        let remaining = horizon - state.year;
        let advice = match self.adapter.advise(&run.case, state, remaining, assumptions, &run.params) {
            Ok(advice) => advice,
            Err(err) => return classify_failure(err),
        };

        let realized = state.realize(&advice.decision, assumptions, &run.case.allocation);
        let after = realized.state;
        let record = YearRecord {
            calendar_year: run.case.start_year + state.year as i32,
            assumptions: *assumptions,
            before: state.clone(),
            decision: advice.decision,
            forecast_gap: advice.decision.planned_end_total.map(|planned| after.total() - planned),
            after,
        };
        log::trace!(
            "{} year {}: spent {:.2}, balance {:.2} -> {:.2}",
            run.label,
            state.year,
            record.decision.net_spending,
            state.total(),
            record.after.total()
        );

        if realized.shortfall > OVERDRAW_TOLERANCE || record.after.is_overdrawn() {
            let shortfall = realized.shortfall.max(-record.after.balances.min_account());
            return Ok(Step::Ruined(record, RuinReason::InsufficientFunds { shortfall }));
        }

        let floor = run.params.spending_floor * record.after.price_index;
        let total = record.after.total();
        if record.after.year < horizon && total + OVERDRAW_TOLERANCE < floor {
            return Ok(Step::Ruined(record, RuinReason::BelowSpendingFloor { total, floor }));
        }

        Ok(Step::Applied(record))
    }
}

/// Per-year optimizer errors end the trial; anything else aborts the run
fn classify_failure(err: RoostError) -> Result<Step> {
    if !err.is_trial_scoped() {
        return Err(err);
    }
    let kind = match &err {
        RoostError::OptimizerTimeout { .. } => FailureKind::Timeout,
        RoostError::MalformedPlan { .. } => FailureKind::MalformedPlan,
        _ => FailureKind::Infeasible,
    };
    Ok(Step::Failed(kind, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::single_case;
    use crate::choice::{ChoiceTemplate, ChoiceValues, TrialSettings};
    use crate::case::Balances;
    use crate::optimizer::{HeuristicOptimizer, OptimizerPlan, OptimizerRequest, PlanYear, SolverFailure};
    use crate::regime::{HistoricalStart, RegimeConfig, SeriesSource};
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct NeverFeasible;

    impl Optimizer for NeverFeasible {
        fn name(&self) -> &str {
            "never"
        }

        fn solve(&self, _request: &OptimizerRequest) -> std::result::Result<OptimizerPlan, SolverFailure> {
            Err(SolverFailure::new("constraints cannot be met"))
        }
    }

    /// Spends a fixed nominal amount from the taxable account every year
    #[derive(Debug)]
    struct FixedSpend(f64);

    impl Optimizer for FixedSpend {
        fn name(&self) -> &str {
            "fixed-spend"
        }

        fn solve(&self, request: &OptimizerRequest) -> std::result::Result<OptimizerPlan, SolverFailure> {
            let spend = self.0.min(request.balances.taxable);
            Ok(OptimizerPlan {
                feasible: true,
                status: None,
                years: vec![PlanYear {
                    net_spending: Some(spend),
                    roth_conversion: Some(0.0),
                    withdrawals: Some(Balances::new(spend, 0.0, 0.0)),
                    taxes: Some(0.0),
                    end_balances: None,
                }],
            })
        }
    }

    /// Delegates to the reference optimizer and keeps every request it saw
    #[derive(Debug, Default)]
    struct Recording {
        inner: HeuristicOptimizer,
        requests: Mutex<Vec<OptimizerRequest>>,
    }

    impl Optimizer for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn solve(&self, request: &OptimizerRequest) -> std::result::Result<OptimizerPlan, SolverFailure> {
            self.requests.lock().unwrap().push(request.clone());
            self.inner.solve(request)
        }
    }

    fn run(balance: f64, horizon: u32, floor: f64, regime: RegimeConfig, trials: u32) -> Run {
        let case = Arc::new(single_case(balance, horizon, floor));
        let settings = TrialSettings { trials, ..TrialSettings::default() };
        Run::new(case, &ChoiceTemplate::new("plain"), ChoiceValues::new(), regime, settings).unwrap()
    }

    fn zero_rates() -> RegimeConfig {
        RegimeConfig::Fixed { rates: YearAssumptions::default() }
    }

    fn heuristic() -> TrialExecutor {
        TrialExecutor::from_optimizer(Arc::new(HeuristicOptimizer::new(0.0)))
    }

    #[test]
    fn test_constant_zero_return_fixed_spend() {
        let run = run(1_000.0, 3, 100.0, zero_rates(), 4);
        let executor = TrialExecutor::from_optimizer(Arc::new(FixedSpend(100.0)));
        for trial_id in 0..4 {
            let record = executor.execute(&run, trial_id, &CancelToken::new()).unwrap();
            assert_eq!(record.status, TrialStatus::Completed);
            assert_eq!(record.years.len(), 3);
            assert_relative_eq!(record.final_state.total(), 700.0, epsilon = 1e-9);
            assert_relative_eq!(record.metrics.total_spending_nominal, 300.0, epsilon = 1e-9);
            assert_relative_eq!(record.metrics.terminal_bequest_real, 700.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_year_counter_advances_by_one() {
        let run = run(1_000.0, 5, 50.0, zero_rates(), 1);
        let record = heuristic().execute(&run, 0, &CancelToken::new()).unwrap();
        for (k, year) in record.years.iter().enumerate() {
            assert_eq!(year.before.year, k as u32);
            assert_eq!(year.after.year, k as u32 + 1);
            assert_eq!(year.calendar_year, 2026 + k as i32);
        }
        assert_eq!(record.final_state.year, 5);
        assert_eq!(record.final_state.ages, vec![70]);
    }

    #[test]
    fn test_catastrophic_first_year_ruins() {
        let mut years = vec![YearAssumptions::default(); 3];
        years[0].equity = -0.95;
        let regime = RegimeConfig::Historical {
            series: SeriesSource::Inline { first_year: 2000, years },
            start: HistoricalStart::Index(0),
            wrap: false,
        };
        let run = run(1_000.0, 3, 100.0, regime, 1);
        let executor = TrialExecutor::from_optimizer(Arc::new(FixedSpend(100.0)));
        let record = executor.execute(&run, 0, &CancelToken::new()).unwrap();

        match record.status {
            TrialStatus::Ruined { year, reason: RuinReason::BelowSpendingFloor { total, floor } } => {
                assert_eq!(year, 1);
                assert_relative_eq!(total, 45.0, epsilon = 1e-9);
                assert_relative_eq!(floor, 100.0);
            }
            other => panic!("expected ruin, got {:?}", other),
        }
        assert_eq!(record.years.len(), 1);
    }

    #[test]
    fn test_infeasible_optimizer_fails_trial() {
        let run = run(1_000.0, 3, 100.0, zero_rates(), 3);
        let executor = TrialExecutor::from_optimizer(Arc::new(NeverFeasible));
        for trial_id in 0..3 {
            let record = executor.execute(&run, trial_id, &CancelToken::new()).unwrap();
            match &record.status {
                TrialStatus::Failed { year, kind, reason } => {
                    assert_eq!(*year, 0);
                    assert_eq!(*kind, FailureKind::Infeasible);
                    assert!(reason.contains("constraints cannot be met"));
                }
                other => panic!("expected failure, got {:?}", other),
            }
            assert!(record.years.is_empty());
        }
    }

    #[test]
    fn test_heuristic_reoptimizes_each_year() {
        let run = run(1_000.0, 4, 0.0, zero_rates(), 1);
        let record = heuristic().execute(&run, 0, &CancelToken::new()).unwrap();
        assert_eq!(record.status, TrialStatus::Completed);
        // Plain max-bequest with a zero target spends nothing and keeps the estate intact
        assert_relative_eq!(record.metrics.terminal_bequest_nominal, 1_000.0, epsilon = 1e-9);
        for year in &record.years {
            assert_relative_eq!(year.forecast_gap.unwrap(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cancelled_before_first_year() {
        let run = run(1_000.0, 3, 0.0, zero_rates(), 1);
        let cancel = CancelToken::new();
        cancel.cancel();
        let record = heuristic().execute(&run, 0, &cancel).unwrap();
        assert_eq!(record.status, TrialStatus::Cancelled { year: 0 });
    }

    #[test]
    fn test_replay_is_identical() {
        let regime = RegimeConfig::Stochastic {
            mean: YearAssumptions::new(0.06, 0.03, 0.02, 0.025),
            volatility: YearAssumptions::new(0.16, 0.06, 0.01, 0.01),
            correlation: None,
            autocorrelation: 0.2,
        };
        let run = run(1_000_000.0, 20, 30_000.0, regime, 2);
        let executor = heuristic();
        let a = executor.execute(&run, 1, &CancelToken::new()).unwrap();
        let b = executor.execute(&run, 1, &CancelToken::new()).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());

        let other = executor.execute(&run, 0, &CancelToken::new()).unwrap();
        assert_ne!(a.draw, other.draw);
    }

    #[test]
    fn test_draw_consumed_in_year_order() {
        let regime = RegimeConfig::Stochastic {
            mean: YearAssumptions::new(0.06, 0.03, 0.02, 0.025),
            volatility: YearAssumptions::new(0.16, 0.06, 0.01, 0.01),
            correlation: None,
            autocorrelation: 0.3,
        };
        let run = run(1_000_000.0, 12, 20_000.0, regime, 1);
        let optimizer = Arc::new(Recording::default());
        let executor = TrialExecutor::from_optimizer(optimizer.clone());
        let record = executor.execute(&run, 3, &CancelToken::new()).unwrap();

        let expected = run.regime.generate(run.trial_seeds(3).rates, 12).unwrap();
        assert_eq!(record.draw, expected);
        assert!(!record.years.is_empty());
        for (k, year) in record.years.iter().enumerate() {
            assert_eq!(year.assumptions, expected[k]);
        }

        // Each request carries only the year being decided
        let requests = optimizer.requests.lock().unwrap();
        let failed = matches!(record.status, TrialStatus::Failed { .. });
        assert_eq!(requests.len(), record.years.len() + usize::from(failed));
        for (k, request) in requests.iter().enumerate() {
            assert_eq!(request.year_index, k as u32);
            assert_eq!(request.remaining_years, 12 - k as u32);
            assert_eq!(request.assumptions, expected[k]);
        }
    }

    #[test]
    fn test_failure_classification() {
        let kinds = [
            (RoostError::OptimizerInfeasible { year: 1, reason: "floor".into() }, FailureKind::Infeasible),
            (RoostError::OptimizerTimeout { year: 1, elapsed_ms: 5 }, FailureKind::Timeout),
            (RoostError::MalformedPlan { year: 1, reason: "no years".into() }, FailureKind::MalformedPlan),
        ];
        for (err, expected) in kinds {
            match classify_failure(err).unwrap() {
                Step::Failed(kind, _) => assert_eq!(kind, expected),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(matches!(
            classify_failure(RoostError::InvalidRegimeConfig("short".into())),
            Err(RoostError::InvalidRegimeConfig(_))
        ));
    }

    #[test]
    fn test_sampled_horizon_bounds_trace() {
        let case = Arc::new(single_case(1_000_000.0, 40, 0.0));
        let settings = TrialSettings { trials: 1, sample_longevity: true, ..TrialSettings::default() };
        let run = Run::new(case, &ChoiceTemplate::new("plain"), ChoiceValues::new(), zero_rates(), settings).unwrap();
        let record = heuristic().execute(&run, 7, &CancelToken::new()).unwrap();
        assert_eq!(record.horizon_years, TrialExecutor::trial_horizon(&run, 7));
        assert!(record.horizon_years <= 40);
        assert_eq!(record.years.len() as u32, record.horizon_years);
    }
}
