//! Gompertz–Makeham longevity model for stochastic planning horizons
//!
//! Hazard `mu(x) = A + B * exp(C * x)`, survival
//! `S(x) = exp(-A x - (B / C) (exp(C x) - 1))`.
//! Health, sex, smoking and marriage scale the level parameters (A, B);
//! health also nudges the acceleration C so advantages persist at old ages.
//! Sampling inverts the conditional CDF on an integer-age grid.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::case::{Case, Health, Person, Sex};

/// Baseline Makeham (background) mortality
pub const A_BASE: f64 = 0.0009;
/// Baseline Gompertz level
pub const B_BASE: f64 = 0.000010;
/// Baseline Gompertz acceleration
pub const C_BASE: f64 = 0.110;
/// Oldest age on the sampling grid
pub const MAX_AGE: u32 = 120;

const MARRIAGE_MULTIPLIER: f64 = 0.97;

fn health_multiplier(health: Health) -> f64 {
    match health {
        Health::Excellent => 0.85,
        Health::Average => 1.00,
        Health::Poor => 1.15,
    }
}

fn acceleration_adjustment(health: Health) -> f64 {
    match health {
        Health::Excellent => 0.96,
        Health::Average => 1.00,
        Health::Poor => 1.05,
    }
}

fn sex_multiplier(sex: Sex) -> f64 {
    match sex {
        Sex::Female => 0.92,
        Sex::Male => 1.08,
    }
}

/// Excess mortality for smokers: strong in middle age, tapering later
pub fn smoker_multiplier(age: f64) -> f64 {
    if age < 40.0 {
        2.3
    } else if age <= 80.0 {
        1.0 + 1.2 * (80.0 - age) / 40.0
    } else if age <= 90.0 {
        1.3
    } else {
        1.1
    }
}

/// Adjusted Gompertz–Makeham parameters for one person
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GompertzMakeham {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl GompertzMakeham {
    pub fn baseline() -> Self {
        Self { a: A_BASE, b: B_BASE, c: C_BASE }
    }

    pub fn adjusted(health: Health, age: f64, sex: Sex, smoker: bool, married: bool) -> Self {
        let mut k = health_multiplier(health) * sex_multiplier(sex);
        if smoker {
            k *= smoker_multiplier(age);
        }
        if married {
            k *= MARRIAGE_MULTIPLIER;
        }
        Self {
            a: A_BASE * k,
            b: B_BASE * k,
            c: C_BASE * acceleration_adjustment(health),
        }
    }

    pub fn for_person(person: &Person, married: bool) -> Self {
        Self::adjusted(
            person.health,
            person.current_age as f64,
            person.sex,
            person.smoker,
            married,
        )
    }

    /// Unconditional survival to age `x`
    pub fn survival(&self, x: f64) -> f64 {
        (-self.a * x - (self.b / self.c) * ((self.c * x).exp() - 1.0)).exp()
    }

    /// Age at death given survival to `current_age`, from a uniform draw `u` in [0, 1)
    pub fn age_at_death(&self, current_age: u32, u: f64) -> f64 {
        if current_age >= MAX_AGE {
            return MAX_AGE as f64;
        }
        let s0 = self.survival(current_age as f64);
        let mut prev_age = current_age as f64;
        let mut prev_cdf = 0.0;
        for age in (current_age + 1)..=MAX_AGE {
            let age = age as f64;
            let cdf = 1.0 - self.survival(age) / s0;
            if u <= cdf {
                let span = cdf - prev_cdf;
                if span <= 0.0 {
                    return age;
                }
                return prev_age + (u - prev_cdf) / span * (age - prev_age);
            }
            prev_age = age;
            prev_cdf = cdf;
        }
        MAX_AGE as f64
    }

    pub fn sample_age_at_death<R: Rng>(&self, rng: &mut R, current_age: u32) -> f64 {
        self.age_at_death(current_age, rng.gen::<f64>())
    }
}

/// Sampled lifetimes for one trial's household
#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdLifetimes {
    /// Age at death per person, in case order
    pub ages_at_death: Vec<u32>,
    /// Years until the last survivor dies, clamped to the case horizon
    pub horizon_years: u32,
}

/// Draw every person's lifetime and derive the trial horizon
pub fn sample_household(case: &Case, longevity_seed: u64) -> HouseholdLifetimes {
    let mut rng = ChaCha8Rng::seed_from_u64(longevity_seed);
    let ages_at_death: Vec<u32> = case
        .people
        .iter()
        .map(|p| {
            GompertzMakeham::for_person(p, case.married).sample_age_at_death(&mut rng, p.current_age)
                as u32
        })
        .collect();

    let remaining = case
        .people
        .iter()
        .zip(&ages_at_death)
        .map(|(p, &death)| death.saturating_sub(p.current_age))
        .max()
        .unwrap_or(case.horizon_years);

    HouseholdLifetimes {
        ages_at_death,
        horizon_years: remaining.clamp(1, case.horizon_years),
    }
}
