//! Reduction of a run's trial records into one summary
//!
//! Records are validated, then ordered by trial id before any floating point
//! reduction, so permuting the input never changes the output.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::Distribution;
use crate::choice::{ChoiceValues, Run};
use crate::error::{Result, RoostError};
use crate::trial::{FailureKind, RuinReason, TrialRecord, TrialStatus};

/// Trial counts by terminal status; ruin and failure are never merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: u32,
    pub completed: u32,
    pub ruined: u32,
    pub failed: u32,
    pub cancelled: u32,

    pub ruined_insufficient_funds: u32,
    pub ruined_below_floor: u32,

    pub failed_infeasible: u32,
    pub failed_timeout: u32,
    pub failed_malformed_plan: u32,
}

impl OutcomeCounts {
    fn record(&mut self, status: &TrialStatus) {
        self.total += 1;
        match status {
            TrialStatus::Completed => self.completed += 1,
            TrialStatus::Ruined { reason, .. } => {
                self.ruined += 1;
                match reason {
                    RuinReason::InsufficientFunds { .. } => self.ruined_insufficient_funds += 1,
                    RuinReason::BelowSpendingFloor { .. } => self.ruined_below_floor += 1,
                }
            }
            TrialStatus::Failed { kind, .. } => {
                self.failed += 1;
                match kind {
                    FailureKind::Infeasible => self.failed_infeasible += 1,
                    FailureKind::Timeout => self.failed_timeout += 1,
                    FailureKind::MalformedPlan => self.failed_malformed_plan += 1,
                }
            }
            TrialStatus::Cancelled { .. } => self.cancelled += 1,
        }
    }
}

/// Aggregated result of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_label: String,
    pub case_name: String,

    /// Choice values the run was built from; empty when aggregated from bare records
    #[serde(default)]
    pub values: ChoiceValues,

    pub counts: OutcomeCounts,

    /// completed / total, every trial in the denominator
    pub success_probability: f64,
    pub ruin_probability: f64,
    pub failure_rate: f64,

    /// Over completed trials, today's dollars
    pub terminal_bequest_real: Option<Distribution>,
    pub total_spending_real: Option<Distribution>,
    pub total_taxes_real: Option<Distribution>,
    pub total_conversions_real: Option<Distribution>,

    /// Years survived by ruined trials
    pub ruin_year: Option<Distribution>,

    pub ruined_trial_ids: Vec<u32>,
    pub failed_trial_ids: Vec<u32>,
}

fn invalid(reason: String) -> RoostError {
    RoostError::Aggregation(reason)
}

/// Check one record is terminal and internally consistent
fn check_record(record: &TrialRecord) -> Result<()> {
    let simulated = record.years.len() as u32;
    let expected = match &record.status {
        TrialStatus::Completed => record.horizon_years,
        TrialStatus::Ruined { year, .. } => *year,
        TrialStatus::Failed { year, .. } | TrialStatus::Cancelled { year } => *year,
    };
    if simulated != expected || simulated > record.horizon_years {
        return Err(invalid(format!(
            "trial {} of {} is {} with {} of {} years recorded",
            record.trial_id,
            record.run_label,
            record.status.label(),
            simulated,
            record.horizon_years
        )));
    }
    let m = &record.metrics;
    if ![m.terminal_bequest_real, m.total_spending_real, m.final_price_index]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(invalid(format!("trial {} carries non-finite metrics", record.trial_id)));
    }
    Ok(())
}

fn over(trials: &[&TrialRecord], metric: fn(&TrialRecord) -> f64) -> Option<Distribution> {
    Distribution::from_values(trials.iter().map(|t| metric(t)).collect())
}

/// Summarize every trial of one run
pub fn aggregate(trials: &[TrialRecord]) -> Result<RunSummary> {
    let first = trials
        .first()
        .ok_or_else(|| invalid("no trial records to aggregate".into()))?;

    let mut ordered: Vec<&TrialRecord> = trials.iter().collect();
    ordered.sort_by_key(|t| t.trial_id);

    let mut seen = BTreeSet::new();
    for record in &ordered {
        if record.run_label != first.run_label || record.case_name != first.case_name {
            return Err(invalid(format!(
                "trial {} belongs to run {}, expected {}",
                record.trial_id, record.run_label, first.run_label
            )));
        }
        if !seen.insert(record.trial_id) {
            return Err(invalid(format!("duplicate trial id {}", record.trial_id)));
        }
        check_record(record)?;
    }

    let mut counts = OutcomeCounts::default();
    let mut ruined_trial_ids = Vec::new();
    let mut failed_trial_ids = Vec::new();
    let mut ruin_years = Vec::new();
    for record in &ordered {
        counts.record(&record.status);
        match record.status {
            TrialStatus::Ruined { year, .. } => {
                ruined_trial_ids.push(record.trial_id);
                ruin_years.push(year as f64);
            }
            TrialStatus::Failed { .. } => failed_trial_ids.push(record.trial_id),
            _ => {}
        }
    }

    let completed: Vec<&TrialRecord> = ordered
        .iter()
        .copied()
        .filter(|t| t.status.is_success())
        .collect();

    let total = counts.total as f64;
    Ok(RunSummary {
        run_label: first.run_label.clone(),
        case_name: first.case_name.clone(),
        values: ChoiceValues::new(),
        counts,
        success_probability: counts.completed as f64 / total,
        ruin_probability: counts.ruined as f64 / total,
        failure_rate: counts.failed as f64 / total,
        terminal_bequest_real: over(&completed, |t| t.metrics.terminal_bequest_real),
        total_spending_real: over(&completed, |t| t.metrics.total_spending_real),
        total_taxes_real: over(&completed, |t| t.metrics.total_taxes_real),
        total_conversions_real: over(&completed, |t| t.metrics.total_conversions_real),
        ruin_year: Distribution::from_values(ruin_years),
        ruined_trial_ids,
        failed_trial_ids,
    })
}

/// Summarize a run's trials, checking they came from `run`
pub fn aggregate_run(run: &Run, trials: &[TrialRecord]) -> Result<RunSummary> {
    let mut summary = aggregate(trials)?;
    if summary.run_label != run.label {
        return Err(invalid(format!(
            "records belong to {}, not {}",
            summary.run_label, run.label
        )));
    }
    if summary.counts.total != run.settings.trials {
        log::warn!(
            "{}: aggregating {} of {} configured trials",
            run.label,
            summary.counts.total,
            run.settings.trials
        );
    }
    summary.values = run.values.clone();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Balances;
    use crate::regime::TrialSeeds;
    use crate::trial::{TrialMetrics, TrialState, YearRecord};
    use crate::optimizer::Decision;
    use crate::regime::YearAssumptions;

    fn state(year: u32, total: f64) -> TrialState {
        TrialState {
            year,
            ages: vec![65 + year],
            balances: Balances::new(total, 0.0, 0.0),
            price_index: 1.0,
        }
    }

    fn trace(years: u32) -> Vec<YearRecord> {
        (0..years)
            .map(|y| YearRecord {
                calendar_year: 2026 + y as i32,
                assumptions: YearAssumptions::default(),
                before: state(y, 100.0),
                decision: Decision {
                    net_spending: 10.0,
                    roth_conversion: 0.0,
                    withdrawals: Balances::new(10.0, 0.0, 0.0),
                    taxes: 0.0,
                    planned_end_total: None,
                },
                after: state(y + 1, 90.0),
                forecast_gap: None,
            })
            .collect()
    }

    fn record(trial_id: u32, status: TrialStatus, years: u32, bequest: f64) -> TrialRecord {
        TrialRecord {
            run_label: "plain[baseline]".into(),
            case_name: "single".into(),
            trial_id,
            seeds: TrialSeeds::derive(1, trial_id),
            horizon_years: 3,
            draw: vec![YearAssumptions::default(); 3],
            years: trace(years),
            final_state: state(years, bequest),
            status,
            metrics: TrialMetrics {
                terminal_bequest_real: bequest,
                total_spending_real: 10.0 * years as f64,
                final_price_index: 1.0,
                ..TrialMetrics::default()
            },
        }
    }

    fn ruined(year: u32) -> TrialStatus {
        TrialStatus::Ruined {
            year,
            reason: RuinReason::BelowSpendingFloor { total: 1.0, floor: 5.0 },
        }
    }

    fn failed(year: u32) -> TrialStatus {
        TrialStatus::Failed { year, kind: FailureKind::Infeasible, reason: "floor".into() }
    }

    fn batch() -> Vec<TrialRecord> {
        vec![
            record(0, TrialStatus::Completed, 3, 70.0),
            record(1, ruined(1), 1, 0.0),
            record(2, TrialStatus::Completed, 3, 110.0),
            record(3, failed(2), 2, 0.0),
            record(4, TrialStatus::Completed, 3, 90.0),
        ]
    }

    #[test]
    fn test_counts_keep_ruin_and_failure_apart() {
        let summary = aggregate(&batch()).unwrap();
        assert_eq!(summary.counts.total, 5);
        assert_eq!(summary.counts.completed, 3);
        assert_eq!(summary.counts.ruined, 1);
        assert_eq!(summary.counts.ruined_below_floor, 1);
        assert_eq!(summary.counts.failed, 1);
        assert_eq!(summary.counts.failed_infeasible, 1);
        assert_eq!(summary.ruined_trial_ids, vec![1]);
        assert_eq!(summary.failed_trial_ids, vec![3]);
    }

    #[test]
    fn test_success_probability_is_exact_ratio() {
        let summary = aggregate(&batch()).unwrap();
        assert_eq!(summary.success_probability, 3.0 / 5.0);
        assert_eq!(summary.ruin_probability, 1.0 / 5.0);
        assert_eq!(summary.failure_rate, 1.0 / 5.0);

        let single = aggregate(&[record(0, TrialStatus::Completed, 3, 1.0)]).unwrap();
        assert_eq!(single.success_probability, 1.0);
    }

    #[test]
    fn test_bequest_percentiles_over_completed() {
        let summary = aggregate(&batch()).unwrap();
        let bequest = summary.terminal_bequest_real.unwrap();
        assert_eq!(bequest.count, 3);
        assert_eq!(bequest.p50, 90.0);
        assert_eq!(bequest.min, 70.0);
        assert_eq!(summary.ruin_year.unwrap().p50, 1.0);
    }

    #[test]
    fn test_order_independent() {
        let forward = batch();
        let mut reversed = batch();
        reversed.reverse();
        reversed.swap(0, 2);
        assert_eq!(aggregate(&forward).unwrap(), aggregate(&reversed).unwrap());
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        assert!(matches!(aggregate(&[]), Err(RoostError::Aggregation(_))));

        let mut dup = batch();
        dup.push(record(2, TrialStatus::Completed, 3, 5.0));
        assert!(matches!(aggregate(&dup), Err(RoostError::Aggregation(_))));
    }

    #[test]
    fn test_rejects_incomplete_trace() {
        let short = vec![record(0, TrialStatus::Completed, 2, 5.0)];
        assert!(matches!(aggregate(&short), Err(RoostError::Aggregation(_))));
    }

    #[test]
    fn test_rejects_mixed_runs() {
        let mut mixed = batch();
        mixed[1].run_label = "other[baseline]".into();
        assert!(matches!(aggregate(&mixed), Err(RoostError::Aggregation(_))));
    }

    #[test]
    fn test_all_failed_has_no_distributions() {
        let all_failed: Vec<_> = (0..4).map(|id| record(id, failed(0), 0, 0.0)).collect();
        let summary = aggregate(&all_failed).unwrap();
        assert_eq!(summary.counts.failed, 4);
        assert_eq!(summary.success_probability, 0.0);
        assert!(summary.terminal_bequest_real.is_none());
    }
}
