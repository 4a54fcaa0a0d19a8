//! Sensitivity of run outcomes to the varied policy parameters

use serde::{Deserialize, Serialize};

use super::{Distribution, RunSummary};
use crate::choice::PolicyKey;
use crate::error::{Result, RoostError};

/// One parameter that differs between two runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub key: PolicyKey,
    pub baseline: Option<f64>,
    pub variant: Option<f64>,
}

/// Variant minus baseline, for two runs over the same case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityDelta {
    pub case_name: String,
    pub baseline_label: String,
    pub variant_label: String,
    pub changed: Vec<ParameterChange>,

    pub success_probability: f64,
    pub ruin_probability: f64,
    pub failure_rate: f64,

    /// Median and tail shifts; None when either side has no completed trials
    pub median_bequest_real: Option<f64>,
    pub p10_bequest_real: Option<f64>,
    pub median_spending_real: Option<f64>,
    pub p10_spending_real: Option<f64>,
}

fn shift(a: &Option<Distribution>, b: &Option<Distribution>, pick: fn(&Distribution) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(b) - pick(a)),
        _ => None,
    }
}

/// Compare `variant` against `baseline`
pub fn compare(baseline: &RunSummary, variant: &RunSummary) -> Result<SensitivityDelta> {
    if baseline.case_name != variant.case_name {
        return Err(RoostError::Aggregation(format!(
            "cannot compare runs over different cases ({} vs {})",
            baseline.case_name, variant.case_name
        )));
    }

    let mut keys: Vec<PolicyKey> = baseline.values.keys().chain(variant.values.keys()).copied().collect();
    keys.sort();
    keys.dedup();
    let changed = keys
        .into_iter()
        .filter_map(|key| {
            let (b, v) = (baseline.values.get(&key).copied(), variant.values.get(&key).copied());
            (b != v).then_some(ParameterChange { key, baseline: b, variant: v })
        })
        .collect();

    Ok(SensitivityDelta {
        case_name: baseline.case_name.clone(),
        baseline_label: baseline.run_label.clone(),
        variant_label: variant.run_label.clone(),
        changed,
        success_probability: variant.success_probability - baseline.success_probability,
        ruin_probability: variant.ruin_probability - baseline.ruin_probability,
        failure_rate: variant.failure_rate - baseline.failure_rate,
        median_bequest_real: shift(&baseline.terminal_bequest_real, &variant.terminal_bequest_real, |d| d.p50),
        p10_bequest_real: shift(&baseline.terminal_bequest_real, &variant.terminal_bequest_real, |d| d.p10),
        median_spending_real: shift(&baseline.total_spending_real, &variant.total_spending_real, |d| d.p50),
        p10_spending_real: shift(&baseline.total_spending_real, &variant.total_spending_real, |d| d.p10),
    })
}

/// Compare every summary against the first one
pub fn compare_to_baseline(summaries: &[RunSummary]) -> Result<Vec<SensitivityDelta>> {
    let (baseline, variants) = summaries
        .split_first()
        .ok_or_else(|| RoostError::Aggregation("no runs to compare".into()))?;
    variants.iter().map(|v| compare(baseline, v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::OutcomeCounts;
    use crate::choice::ChoiceValues;

    fn summary(label: &str, success: f64, rate: Option<f64>, median: f64) -> RunSummary {
        let mut values = ChoiceValues::new();
        if let Some(rate) = rate {
            values.insert(PolicyKey::ConversionRate, rate);
        }
        RunSummary {
            run_label: label.into(),
            case_name: "couple".into(),
            values,
            counts: OutcomeCounts::default(),
            success_probability: success,
            ruin_probability: 1.0 - success,
            failure_rate: 0.0,
            terminal_bequest_real: Distribution::from_values(vec![median]),
            total_spending_real: None,
            total_taxes_real: None,
            total_conversions_real: None,
            ruin_year: None,
            ruined_trial_ids: Vec::new(),
            failed_trial_ids: Vec::new(),
        }
    }

    #[test]
    fn test_delta_is_variant_minus_baseline() {
        let base = summary("roth[baseline]", 0.75, None, 100.0);
        let variant = summary("roth[conversion_rate=0.5]", 0.875, Some(0.5), 130.0);
        let delta = compare(&base, &variant).unwrap();

        assert_eq!(delta.success_probability, 0.125);
        assert_eq!(delta.median_bequest_real, Some(30.0));
        assert_eq!(delta.median_spending_real, None);
        assert_eq!(
            delta.changed,
            vec![ParameterChange { key: PolicyKey::ConversionRate, baseline: None, variant: Some(0.5) }]
        );
    }

    #[test]
    fn test_different_cases_rejected() {
        let base = summary("a", 0.5, None, 1.0);
        let mut other = summary("b", 0.5, None, 1.0);
        other.case_name = "single".into();
        assert!(matches!(compare(&base, &other), Err(RoostError::Aggregation(_))));
    }

    #[test]
    fn test_compare_to_baseline() {
        let runs = vec![
            summary("a", 0.5, None, 1.0),
            summary("b", 0.25, Some(0.1), 1.0),
            summary("c", 0.5, Some(0.2), 2.0),
        ];
        let deltas = compare_to_baseline(&runs).unwrap();
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].success_probability, -0.25);
        assert!(compare_to_baseline(&[]).is_err());
    }
}
