//! Choice templates: families of decision policies with validated domains

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{PolicyKey, PolicyParams};
use crate::case::{Case, Objective};
use crate::error::{Result, RoostError};

/// Concrete parameter values chosen for one run
pub type ChoiceValues = BTreeMap<PolicyKey, f64>;

/// Allowed values for one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum ParameterDomain {
    /// Closed interval; `steps` points (ends included) when swept
    Range {
        min: f64,
        max: f64,
        #[serde(default)]
        steps: Option<u32>,
    },
    /// Explicit enumeration
    Choices { values: Vec<f64> },
}

impl ParameterDomain {
    pub fn contains(&self, value: f64) -> bool {
        match self {
            ParameterDomain::Range { min, max, .. } => value >= *min && value <= *max,
            ParameterDomain::Choices { values } => values.iter().any(|v| (v - value).abs() < 1e-12),
        }
    }

    /// Values visited by a sweep
    pub fn grid_values(&self) -> Result<Vec<f64>> {
        match self {
            ParameterDomain::Choices { values } => Ok(values.clone()),
            ParameterDomain::Range { min, max, steps } => match steps {
                Some(1) => Ok(vec![*min]),
                Some(n) if *n >= 2 => {
                    let n = *n;
                    Ok((0..n)
                        .map(|i| min + (max - min) * i as f64 / (n - 1) as f64)
                        .collect())
                }
                _ => Err(RoostError::InvalidChoice(
                    "range domain needs `steps` >= 1 to be swept".into(),
                )),
            },
        }
    }

    fn validate(&self, key: PolicyKey) -> Result<()> {
        match self {
            ParameterDomain::Range { min, max, steps } => {
                if !(key.admissible(*min) && key.admissible(*max)) || min > max {
                    return Err(RoostError::InvalidChoice(format!(
                        "{} range [{}, {}] is not admissible",
                        key.as_str(),
                        min,
                        max
                    )));
                }
                if *steps == Some(0) {
                    return Err(RoostError::InvalidChoice(format!(
                        "{} range has zero steps",
                        key.as_str()
                    )));
                }
            }
            ParameterDomain::Choices { values } => {
                if values.is_empty() {
                    return Err(RoostError::InvalidChoice(format!(
                        "{} has an empty choice list",
                        key.as_str()
                    )));
                }
                if let Some(bad) = values.iter().find(|v| !key.admissible(**v)) {
                    return Err(RoostError::InvalidChoice(format!(
                        "{} choice {} is not admissible",
                        key.as_str(),
                        bad
                    )));
                }
            }
        }
        Ok(())
    }
}

/// One varied parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub key: PolicyKey,
    #[serde(flatten)]
    pub domain: ParameterDomain,
    /// Used when a run does not pick a value
    #[serde(default)]
    pub default: Option<f64>,
}

/// A named family of policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceTemplate {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl ChoiceTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), parameters: Vec::new() }
    }

    /// Builder: add a varied parameter
    pub fn with_parameter(mut self, key: PolicyKey, domain: ParameterDomain, default: Option<f64>) -> Self {
        self.parameters.push(ParameterSpec { key, domain, default });
        self
    }

    pub fn spec(&self, key: PolicyKey) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.key == key)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for spec in &self.parameters {
            if !seen.insert(spec.key) {
                return Err(RoostError::InvalidChoice(format!(
                    "template '{}' lists {} twice",
                    self.name,
                    spec.key.as_str()
                )));
            }
            spec.domain.validate(spec.key)?;
            if let Some(default) = spec.default {
                if !spec.domain.contains(default) {
                    return Err(RoostError::InvalidChoice(format!(
                        "default {} for {} lies outside its domain",
                        default,
                        spec.key.as_str()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Bind concrete values against a case into a resolved policy
    pub fn resolve(&self, case: &Case, values: &ChoiceValues) -> Result<PolicyParams> {
        self.validate()?;

        if let Some(key) = values.keys().find(|k| self.spec(**k).is_none()) {
            return Err(RoostError::InvalidChoice(format!(
                "template '{}' does not vary {}",
                self.name,
                key.as_str()
            )));
        }

        let mut resolved = ChoiceValues::new();
        for spec in &self.parameters {
            let value = match values.get(&spec.key).copied().or(spec.default) {
                Some(v) => v,
                None => {
                    return Err(RoostError::InvalidChoice(format!(
                        "no value or default for {}",
                        spec.key.as_str()
                    )))
                }
            };
            if !spec.domain.contains(value) {
                return Err(RoostError::InvalidChoice(format!(
                    "{} = {} lies outside its domain",
                    spec.key.as_str(),
                    value
                )));
            }
            resolved.insert(spec.key, value);
        }

        let objective = match (case.objective, resolved.get(&PolicyKey::BequestTarget), resolved.get(&PolicyKey::SpendingTarget)) {
            (Objective::MaxSpending { .. }, _, Some(_)) | (Objective::MaxBequest { .. }, Some(_), _) => {
                return Err(RoostError::InvalidChoice(format!(
                    "objective {} does not take the varied target",
                    case.objective.as_str()
                )))
            }
            (Objective::MaxSpending { bequest }, target, None) => Objective::MaxSpending {
                bequest: target.copied().unwrap_or(bequest),
            },
            (Objective::MaxBequest { net_spending }, None, target) => Objective::MaxBequest {
                net_spending: target.copied().unwrap_or(net_spending),
            },
        };

        let spending_floor = resolved
            .get(&PolicyKey::SpendingFloor)
            .copied()
            .unwrap_or(0.0)
            .max(case.constraints.spending_floor);

        if let Objective::MaxBequest { net_spending } = objective {
            if net_spending + 1e-9 < spending_floor {
                return Err(RoostError::InvalidChoice(format!(
                    "spending target {} is below the spending floor {}",
                    net_spending, spending_floor
                )));
            }
        }

        Ok(PolicyParams {
            conversion_rate: resolved.get(&PolicyKey::ConversionRate).copied().unwrap_or(0.0),
            conversion_threshold: resolved.get(&PolicyKey::ConversionThreshold).copied().unwrap_or(0.0),
            max_conversion: resolved.get(&PolicyKey::MaxConversion).copied(),
            spending_floor,
            objective,
        })
    }

    /// Cartesian product of every parameter's sweep values
    pub fn grid(&self) -> Result<Vec<ChoiceValues>> {
        self.validate()?;
        let mut combos = vec![ChoiceValues::new()];
        for spec in &self.parameters {
            let values = spec.domain.grid_values()?;
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    values.iter().map(move |v| {
                        let mut next = combo.clone();
                        next.insert(spec.key, *v);
                        next
                    })
                })
                .collect();
        }
        Ok(combos)
    }
}

/// Human-readable label for a set of values
pub fn describe_values(values: &ChoiceValues) -> String {
    if values.is_empty() {
        return "baseline".to_string();
    }
    values
        .iter()
        .map(|(k, v)| format!("{}={}", k.as_str(), v))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::single_case;

    fn roth_template() -> ChoiceTemplate {
        ChoiceTemplate::new("roth")
            .with_parameter(
                PolicyKey::ConversionRate,
                ParameterDomain::Range { min: 0.0, max: 1.0, steps: Some(3) },
                Some(0.0),
            )
            .with_parameter(
                PolicyKey::MaxConversion,
                ParameterDomain::Choices { values: vec![50_000.0, 100_000.0] },
                Some(100_000.0),
            )
    }

    #[test]
    fn test_resolve_defaults() {
        let case = single_case(1_000_000.0, 30, 40_000.0);
        let params = roth_template().resolve(&case, &ChoiceValues::new()).unwrap();
        assert_eq!(params.conversion_rate, 0.0);
        assert_eq!(params.max_conversion, Some(100_000.0));
        assert_eq!(params.spending_floor, 40_000.0);
    }

    #[test]
    fn test_resolve_out_of_domain_rejected() {
        let case = single_case(1_000_000.0, 30, 40_000.0);
        let mut values = ChoiceValues::new();
        values.insert(PolicyKey::MaxConversion, 75_000.0);
        assert!(matches!(roth_template().resolve(&case, &values), Err(RoostError::InvalidChoice(_))));
    }

    #[test]
    fn test_resolve_unknown_key_rejected() {
        let case = single_case(1_000_000.0, 30, 40_000.0);
        let mut values = ChoiceValues::new();
        values.insert(PolicyKey::SpendingFloor, 10.0);
        assert!(roth_template().resolve(&case, &values).is_err());
    }

    #[test]
    fn test_target_must_match_objective() {
        let case = single_case(1_000_000.0, 30, 40_000.0);
        let template = ChoiceTemplate::new("bequest").with_parameter(
            PolicyKey::BequestTarget,
            ParameterDomain::Choices { values: vec![0.0] },
            None,
        );
        let mut values = ChoiceValues::new();
        values.insert(PolicyKey::BequestTarget, 0.0);
        assert!(template.resolve(&case, &values).is_err());
    }

    #[test]
    fn test_spending_target_below_floor_rejected() {
        let case = single_case(1_000_000.0, 30, 40_000.0);
        let template = ChoiceTemplate::new("spend").with_parameter(
            PolicyKey::SpendingTarget,
            ParameterDomain::Range { min: 0.0, max: 100_000.0, steps: None },
            None,
        );
        let mut values = ChoiceValues::new();
        values.insert(PolicyKey::SpendingTarget, 30_000.0);
        assert!(template.resolve(&case, &values).is_err());
        values.insert(PolicyKey::SpendingTarget, 50_000.0);
        let params = template.resolve(&case, &values).unwrap();
        assert_eq!(params.objective, Objective::MaxBequest { net_spending: 50_000.0 });
    }

    #[test]
    fn test_grid_is_cartesian() {
        let grid = roth_template().grid().unwrap();
        assert_eq!(grid.len(), 6);
        assert!(grid.iter().any(|v| v[&PolicyKey::ConversionRate] == 0.5 && v[&PolicyKey::MaxConversion] == 50_000.0));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let template = roth_template().with_parameter(
            PolicyKey::ConversionRate,
            ParameterDomain::Choices { values: vec![0.1] },
            None,
        );
        assert!(template.validate().is_err());
    }

    #[test]
    fn test_template_from_json() {
        let json = r#"{
            "name": "floor",
            "parameters": [
                {"key": "spending_floor", "domain": "choices", "values": [30000.0, 45000.0], "default": 30000.0}
            ]
        }"#;
        let template: ChoiceTemplate = serde_json::from_str(json).unwrap();
        assert_eq!(template.parameters[0].key, PolicyKey::SpendingFloor);
        assert_eq!(template.grid().unwrap().len(), 2);
    }

    #[test]
    fn test_describe_values() {
        let mut values = ChoiceValues::new();
        values.insert(PolicyKey::ConversionRate, 0.5);
        assert_eq!(describe_values(&values), "conversion_rate=0.5");
        assert_eq!(describe_values(&ChoiceValues::new()), "baseline");
    }
}
