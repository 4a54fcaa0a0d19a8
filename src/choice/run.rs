//! A run: one case bound to one resolved policy and one rate regime

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{describe_values, ChoiceTemplate, ChoiceValues, PolicyParams};
use crate::case::Case;
use crate::error::{Result, RoostError};
use crate::regime::{RateRegime, RegimeConfig, TrialSeeds, DEFAULT_MASTER_SEED};

fn default_master_seed() -> u64 {
    DEFAULT_MASTER_SEED
}

/// How many trials a run draws and how they are seeded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialSettings {
    /// Number of independent trials (>= 1)
    pub trials: u32,

    #[serde(default = "default_master_seed")]
    pub master_seed: u64,

    /// Draw a stochastic horizon per trial from the longevity model
    #[serde(default)]
    pub sample_longevity: bool,
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            trials: 100,
            master_seed: DEFAULT_MASTER_SEED,
            sample_longevity: false,
        }
    }
}

/// One fully bound experiment arm; immutable once built
#[derive(Debug, Clone)]
pub struct Run {
    /// Label unique within a sweep (template name plus values)
    pub label: String,
    pub case: Arc<Case>,
    pub template_name: String,
    pub values: ChoiceValues,
    pub params: PolicyParams,
    pub regime_config: RegimeConfig,
    pub regime: Arc<dyn RateRegime>,
    pub settings: TrialSettings,
}

impl Run {
    /// Validate every input and bind them; nothing here is retried per trial
    pub fn new(
        case: Arc<Case>,
        template: &ChoiceTemplate,
        values: ChoiceValues,
        regime_config: RegimeConfig,
        settings: TrialSettings,
    ) -> Result<Self> {
        case.validate()?;
        if settings.trials == 0 {
            return Err(RoostError::InvalidChoice("a run needs at least one trial".into()));
        }
        let params = template.resolve(&case, &values)?;
        let regime = regime_config.build()?;
        let label = format!("{}[{}]", template.name, describe_values(&values));

        log::debug!("Run {} resolved to {:?}", label, params);

        Ok(Self {
            label,
            case,
            template_name: template.name.clone(),
            values,
            params,
            regime_config,
            regime,
            settings,
        })
    }

    /// Seeds for one trial of this run
    pub fn trial_seeds(&self, trial_id: u32) -> TrialSeeds {
        TrialSeeds::derive(self.settings.master_seed, trial_id)
    }
}
