//! Deterministic per-trial seed derivation
//!
//! Every trial id maps to a pair of independent seeds (rates, longevity)
//! derived from one master seed, so a single trial can be replayed alone
//! and still match the batch it came from.

use serde::{Deserialize, Serialize};

/// Master seed used when a plan does not supply one
pub const DEFAULT_MASTER_SEED: u64 = 12345;

const RATES_STREAM: u64 = 0x5241_5445; // "RATE"
const LONGEVITY_STREAM: u64 = 0x4C4F_4E47; // "LONG"

/// Seeds consumed by one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSeeds {
    /// Seeds the rate-regime generator
    pub rates: u64,
    /// Seeds the lifetime sampler
    pub longevity: u64,
}

impl TrialSeeds {
    /// Derive the seeds for `trial_id` from `master`
    pub fn derive(master: u64, trial_id: u32) -> Self {
        let trial_base = splitmix64(master ^ splitmix64(trial_id as u64));
        Self {
            rates: splitmix64(trial_base ^ RATES_STREAM),
            longevity: splitmix64(trial_base ^ LONGEVITY_STREAM),
        }
    }
}

/// SplitMix64 finalizer
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
