//! Parametric stochastic regime: correlated normal draws with optional AR(1) persistence
//!
//! Each year's deviation from the mean follows
//! `d_t = phi * d_{t-1} + sqrt(1 - phi^2) * sigma * e_t`, with `e_t = L z_t`,
//! `L` the Cholesky factor of the correlation matrix and `z_t` standard normal.
//! The first year is drawn from the stationary distribution.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use super::{check_horizon, RateRegime, YearAssumptions};
use crate::error::{Result, RoostError};

/// Correlation matrix over (equity, bonds, cash, inflation)
pub type CorrelationMatrix = [[f64; 4]; 4];

/// Lowest rate a draw may take; a year at -100% would zero balances or the price index
pub const MIN_DRAWN_RATE: f64 = -0.99;

pub const IDENTITY_CORRELATION: CorrelationMatrix = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Draws from a configured multivariate normal, optionally autocorrelated
#[derive(Debug, Clone)]
pub struct StochasticRegime {
    mean: [f64; 4],
    volatility: [f64; 4],
    cholesky: CorrelationMatrix,
    autocorrelation: f64,
}

impl StochasticRegime {
    pub fn new(
        mean: YearAssumptions,
        volatility: YearAssumptions,
        correlation: Option<CorrelationMatrix>,
        autocorrelation: f64,
    ) -> Result<Self> {
        if !mean.is_finite() {
            return Err(RoostError::InvalidRegimeConfig("mean rates must be finite".into()));
        }
        let volatility = volatility.as_array();
        if volatility.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "volatilities must be finite and non-negative: {:?}",
                volatility
            )));
        }
        if !autocorrelation.is_finite() || autocorrelation.abs() >= 1.0 {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "autocorrelation {} must lie strictly inside (-1, 1)",
                autocorrelation
            )));
        }
        let correlation = correlation.unwrap_or(IDENTITY_CORRELATION);
        validate_correlation(&correlation)?;
        let cholesky = cholesky(&correlation).ok_or_else(|| {
            RoostError::InvalidRegimeConfig("correlation matrix is not positive definite".into())
        })?;

        Ok(Self {
            mean: mean.as_array(),
            volatility,
            cholesky,
            autocorrelation,
        })
    }

    fn correlated_shock(&self, rng: &mut ChaCha8Rng) -> [f64; 4] {
        let mut z = [0.0; 4];
        for v in z.iter_mut() {
            *v = StandardNormal.sample(rng);
        }
        let mut e = [0.0; 4];
        for (i, out) in e.iter_mut().enumerate() {
            *out = (0..=i).map(|j| self.cholesky[i][j] * z[j]).sum();
        }
        e
    }
}

impl RateRegime for StochasticRegime {
    fn name(&self) -> &'static str {
        "stochastic"
    }

    fn generate(&self, trial_seed: u64, horizon: u32) -> Result<Vec<YearAssumptions>> {
        check_horizon(horizon)?;
        let mut rng = ChaCha8Rng::seed_from_u64(trial_seed);
        let phi = self.autocorrelation;
        let innovation_scale = (1.0 - phi * phi).sqrt();

        let mut deviation = [0.0; 4];
        let mut path = Vec::with_capacity(horizon as usize);
        for year in 0..horizon {
            let shock = self.correlated_shock(&mut rng);
            let mut rates = [0.0; 4];
            for k in 0..4 {
                deviation[k] = if year == 0 {
                    self.volatility[k] * shock[k]
                } else {
                    phi * deviation[k] + innovation_scale * self.volatility[k] * shock[k]
                };
                rates[k] = (self.mean[k] + deviation[k]).max(MIN_DRAWN_RATE);
            }
            path.push(YearAssumptions::from_array(rates));
        }
        Ok(path)
    }
}

fn validate_correlation(matrix: &CorrelationMatrix) -> Result<()> {
    for i in 0..4 {
        if (matrix[i][i] - 1.0).abs() > 1e-9 {
            return Err(RoostError::InvalidRegimeConfig(format!(
                "correlation diagonal [{}][{}] = {} must be 1",
                i, i, matrix[i][i]
            )));
        }
        for j in 0..4 {
            let rho = matrix[i][j];
            if !rho.is_finite() || rho.abs() > 1.0 || (rho - matrix[j][i]).abs() > 1e-9 {
                return Err(RoostError::InvalidRegimeConfig(format!(
                    "correlation [{}][{}] = {} must be symmetric and within [-1, 1]",
                    i, j, rho
                )));
            }
        }
    }
    Ok(())
}

/// Lower-triangular Cholesky factor, or None when not positive definite
fn cholesky(matrix: &CorrelationMatrix) -> Option<CorrelationMatrix> {
    let mut l = [[0.0; 4]; 4];
    for i in 0..4 {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            if i == j {
                let d = matrix[i][i] - sum;
                if d <= 1e-12 {
                    return None;
                }
                l[i][j] = d.sqrt();
            } else {
                l[i][j] = (matrix[i][j] - sum) / l[j][j];
            }
        }
    }
    Some(l)
}
