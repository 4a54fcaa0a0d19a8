//! Experiment plans: one case, one choice template, a regime and batch settings
//!
//! A plan file is JSON. Relative paths inside it (case file, rate CSVs) are
//! resolved against the plan's own directory.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::case::{load_case, Case};
use crate::choice::{ChoiceTemplate, ChoiceValues, Run};
use crate::error::{Result, RoostError};
use crate::regime::{RegimeConfig, SeriesSource};

/// Case given inline or by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaseSource {
    File { file: PathBuf },
    Inline(Box<Case>),
}

fn default_template() -> ChoiceTemplate {
    ChoiceTemplate::new("baseline")
}

/// Serializable experiment description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPlan {
    pub case: CaseSource,

    #[serde(default = "default_template")]
    pub template: ChoiceTemplate,

    /// Explicit arms; the template's full grid when omitted
    #[serde(default)]
    pub variants: Option<Vec<ChoiceValues>>,

    pub regime: RegimeConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

fn rebase(base: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}

impl RunPlan {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut plan = Self::from_reader(BufReader::new(File::open(path)?))?;
        if let Some(base) = path.parent() {
            plan.rebase_paths(base);
        }
        log::debug!("Loaded plan from {}", path.display());
        Ok(plan)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    fn rebase_paths(&mut self, base: &Path) {
        if let CaseSource::File { file } = &mut self.case {
            rebase(base, file);
        }
        match &mut self.regime {
            RegimeConfig::Historical { series: SeriesSource::Csv { csv }, .. }
            | RegimeConfig::Bootstrap { series: SeriesSource::Csv { csv } } => rebase(base, csv),
            _ => {}
        }
    }

    /// Load (if needed) and validate the case
    pub fn load_case(&self) -> Result<Case> {
        match &self.case {
            CaseSource::File { file } => load_case(file),
            CaseSource::Inline(case) => {
                case.validate()?;
                Ok((**case).clone())
            }
        }
    }

    /// Choice values for every arm, in plan order
    pub fn variants(&self) -> Result<Vec<ChoiceValues>> {
        let variants = match &self.variants {
            Some(explicit) => explicit.clone(),
            None if self.template.parameters.is_empty() => vec![ChoiceValues::new()],
            None => self.template.grid()?,
        };
        if variants.is_empty() {
            return Err(RoostError::InvalidChoice("plan lists no variants".into()));
        }
        Ok(variants)
    }

    /// Validate everything and bind one run per variant
    ///
    /// Any invalid input fails the whole plan before a trial executes.
    pub fn build_runs(&self) -> Result<Vec<Run>> {
        let case = Arc::new(self.load_case()?);
        let settings = self.batch.trial_settings();
        let runs = self
            .variants()?
            .into_iter()
            .map(|values| Run::new(Arc::clone(&case), &self.template, values, self.regime.clone(), settings))
            .collect::<Result<Vec<Run>>>()?;

        let mut labels: Vec<&str> = runs.iter().map(|r| r.label.as_str()).collect();
        labels.sort_unstable();
        if labels.windows(2).any(|w| w[0] == w[1]) {
            return Err(RoostError::InvalidChoice("plan repeats a variant".into()));
        }

        log::info!("Plan for '{}' builds {} run(s)", case.name, runs.len());
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::PolicyKey;

    const PLAN_JSON: &str = r#"{
        "case": {
            "name": "jill",
            "start_year": 2026,
            "people": [{"name": "Jill", "current_age": 66, "retirement_age": 65, "sex": "female"}],
            "balances": {"taxable": 200000.0, "tax_deferred": 800000.0, "tax_free": 0.0},
            "horizon_years": 25,
            "constraints": {"spending_floor": 30000.0},
            "objective": {"objective": "max_spending", "bequest": 0.0}
        },
        "template": {
            "name": "roth",
            "parameters": [
                {"key": "conversion_rate", "domain": "choices", "values": [0.0, 0.25, 0.5]},
                {"key": "conversion_threshold", "domain": "range", "min": 0.0, "max": 400000.0, "steps": 2}
            ]
        },
        "regime": {"kind": "fixed", "rates": {"equity": 0.05, "bonds": 0.03, "cash": 0.01, "inflation": 0.02}},
        "batch": {"trials": 50, "jobs": 4}
    }"#;

    #[test]
    fn test_plan_expands_grid() {
        let plan = RunPlan::from_reader(PLAN_JSON.as_bytes()).unwrap();
        assert_eq!(plan.batch.trials, 50);
        assert_eq!(plan.batch.master_seed, 12345);
        assert_eq!(plan.batch.jobs, Some(4));

        let runs = plan.build_runs().unwrap();
        assert_eq!(runs.len(), 6);
        assert_eq!(runs[0].params.conversion_rate, 0.0);
        assert_eq!(runs[5].values[&PolicyKey::ConversionThreshold], 400_000.0);
        assert!(runs.iter().all(|r| r.settings.trials == 50));
    }

    #[test]
    fn test_explicit_variants_override_grid() {
        let mut plan = RunPlan::from_reader(PLAN_JSON.as_bytes()).unwrap();
        let mut arm = ChoiceValues::new();
        arm.insert(PolicyKey::ConversionRate, 0.25);
        arm.insert(PolicyKey::ConversionThreshold, 0.0);
        plan.variants = Some(vec![arm]);
        let runs = plan.build_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].params.conversion_rate, 0.25);
    }

    #[test]
    fn test_out_of_domain_variant_fails_plan() {
        let mut plan = RunPlan::from_reader(PLAN_JSON.as_bytes()).unwrap();
        let mut arm = ChoiceValues::new();
        arm.insert(PolicyKey::ConversionRate, 0.9);
        plan.variants = Some(vec![arm]);
        assert!(matches!(plan.build_runs(), Err(RoostError::InvalidChoice(_))));
    }

    #[test]
    fn test_relative_paths_rebased() {
        let json = r#"{
            "case": {"file": "cases/jill.json"},
            "regime": {"kind": "bootstrap", "series": {"csv": "rates.csv"}}
        }"#;
        let mut plan = RunPlan::from_reader(json.as_bytes()).unwrap();
        plan.rebase_paths(Path::new("/plans"));
        assert_eq!(plan.case, CaseSource::File { file: PathBuf::from("/plans/cases/jill.json") });
        match plan.regime {
            RegimeConfig::Bootstrap { series: SeriesSource::Csv { csv } } => {
                assert_eq!(csv, PathBuf::from("/plans/rates.csv"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(plan.template.parameters.is_empty());
    }
}
