//! Order-independent distribution statistics

use serde::{Deserialize, Serialize};

/// Linear-interpolated percentile of an ascending slice; `p` in [0, 100]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => return f64::NAN,
        1 => return sorted[0],
        _ => {}
    }
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let w = rank - lower as f64;
        sorted[lower] * (1.0 - w) + sorted[upper] * w
    }
}

/// Summary of one metric across trials
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub max: f64,
}

impl Distribution {
    /// None for an empty sample
    ///
    /// Values are sorted before any reduction, so input order never changes
    /// the result.
    pub fn from_values(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        Some(Self {
            count: n,
            mean,
            min: values[0],
            p5: percentile(&values, 5.0),
            p10: percentile(&values, 10.0),
            p25: percentile(&values, 25.0),
            p50: percentile(&values, 50.0),
            p75: percentile(&values, 75.0),
            p90: percentile(&values, 90.0),
            p95: percentile(&values, 95.0),
            max: values[n - 1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&values, 25.0), 1.75);
        assert_relative_eq!(percentile(&values, 50.0), 2.5);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 100.0), 4.0);
    }

    #[test]
    fn test_percentile_edge_sizes() {
        assert!(percentile(&[], 50.0).is_nan());
        assert_eq!(percentile(&[7.0], 90.0), 7.0);
    }

    #[test]
    fn test_distribution_ignores_order() {
        let a = Distribution::from_values(vec![0.1, 5.0, 3.3, 1e6, -2.0]).unwrap();
        let b = Distribution::from_values(vec![1e6, -2.0, 3.3, 0.1, 5.0]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.count, 5);
        assert_eq!(a.min, -2.0);
        assert_eq!(a.p50, 3.3);
    }

    #[test]
    fn test_empty_distribution() {
        assert!(Distribution::from_values(Vec::new()).is_none());
    }
}
