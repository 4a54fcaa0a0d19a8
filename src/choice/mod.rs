//! Decision policies: choice templates, resolved parameters and runs

mod params;
mod template;
mod run;

pub use params::{PolicyKey, PolicyParams};
pub use template::{describe_values, ChoiceTemplate, ChoiceValues, ParameterDomain, ParameterSpec};
pub use run::{Run, TrialSettings};
