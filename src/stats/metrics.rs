//! Regression Metrics Module
//! Holdout evaluation for the forecast regressor.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Error summary of predictions against known targets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub count: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// 95th percentile of absolute error.
    pub p95_abs_error: f64,
}

impl RegressionMetrics {
    /// Compare `predicted` against `actual`. Returns `None` for empty or
    /// mismatched inputs.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        let n = actual.len();
        if n == 0 || n != predicted.len() {
            return None;
        }

        let errors: Vec<f64> = actual
            .iter()
            .zip(predicted)
            .map(|(a, p)| a - p)
            .collect();

        let mse = errors.iter().map(|e| e * e).mean();
        let mut abs_errors: Vec<f64> = errors.iter().map(|e| e.abs()).collect();
        let mae = abs_errors.iter().mean();
        abs_errors.sort_by(|a, b| a.total_cmp(b));

        // R^2 against the variance of the targets; a constant target has no
        // variance to explain.
        let ss_tot = actual.iter().population_variance() * n as f64;
        let ss_res = mse * n as f64;
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Some(Self {
            count: n,
            rmse: mse.sqrt(),
            mae,
            r2,
            p95_abs_error: percentile(&abs_errors, 95.0),
        })
    }
}

/// Percentile of pre-sorted values, interpolating linearly between ranks.
pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    let n = sorted_values.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_values[0];
    }

    let rank = (p / 100.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (rank.ceil() as usize).min(n - 1);
    let frac = rank - lower as f64;

    if lower == upper {
        sorted_values[lower]
    } else {
        sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
    }
}
