//! Residual diagnostics: normality histogram and homoscedasticity data
//!
//! Produces the numbers behind the diagnostic plots; rendering is left to external tools.

use serde::Serialize;
use statrs::distribution::{Continuous, Normal};

use crate::analysis::statistics::{
    bartlett_partition_test, exponential_weighted_average, mean, normalize_residuals, BartlettResult,
};
use crate::error::{Error, Result};

/// Residual histogram with a fitted normal density
#[derive(Debug, Clone, Serialize)]
pub struct ResidualHistogram {
    /// `bins + 1` edges, first and last equal to the residual range
    pub edges: Vec<f64>,
    /// Fraction of residuals per bin (sums to 1)
    pub weights: Vec<f64>,
    /// Residuals in ascending order
    pub sorted: Vec<f64>,
    /// Normal density at each sorted residual
    pub normal_pdf: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

pub fn residual_histogram(residuals: &[f64], bins: usize) -> Result<ResidualHistogram> {
    if bins == 0 {
        return Err(Error::InvalidInput("histogram needs at least one bin".to_string()));
    }
    if residuals.is_empty() {
        return Err(Error::InsufficientData("no residuals to histogram".to_string()));
    }

    let mut sorted = residuals.to_vec();
    sorted.sort_by(f64::total_cmp);

    let (mut lo, mut hi) = (sorted[0], sorted[sorted.len() - 1]);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

    let share = 1.0 / residuals.len() as f64;
    let mut weights = vec![0.0; bins];
    for &r in residuals {
        let bin = (((r - lo) / width) as usize).min(bins - 1);
        weights[bin] += share;
    }

    let m = mean(residuals);
    let std = (residuals.iter().map(|r| (r - m).powi(2)).sum::<f64>() / residuals.len() as f64).sqrt();
    let normal = Normal::new(m, std)
        .map_err(|e| Error::DegenerateInput(format!("cannot fit normal density: {}", e)))?;
    let normal_pdf = sorted.iter().map(|&r| normal.pdf(r)).collect();

    Ok(ResidualHistogram {
        edges,
        weights,
        sorted,
        normal_pdf,
        mean: m,
        std,
    })
}

/// Everything the diagnostics report needs for one residual series
#[derive(Debug, Clone, Serialize)]
pub struct ResidualDiagnostics {
    pub label: String,
    pub histogram: ResidualHistogram,
    /// `(observation number, standardized residual)` points of the homoscedasticity scatter
    pub scatter: Vec<(usize, f64)>,
    /// Exponential weighted average of the absolute standardized residuals
    pub trend: Vec<f64>,
    pub bartlett_statistic: f64,
    pub bartlett_p_value: f64,
    pub bartlett_groups: usize,
}

pub fn diagnose_residuals(
    label: &str,
    residuals: &[f64],
    bins: usize,
    partition_factor: usize,
    trend_beta: f64,
) -> Result<ResidualDiagnostics> {
    let histogram = residual_histogram(residuals, bins)?;
    let normalized = normalize_residuals(residuals)?;
    let BartlettResult {
        statistic,
        p_value,
        groups,
    } = bartlett_partition_test(&normalized, partition_factor)?;
    let trend = exponential_weighted_average(normalized.iter().map(|r| r.abs()), trend_beta)?.collect();

    Ok(ResidualDiagnostics {
        label: label.to_string(),
        histogram,
        scatter: normalized.into_iter().enumerate().collect(),
        trend,
        bartlett_statistic: statistic,
        bartlett_p_value: p_value,
        bartlett_groups: groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_weights_sum_to_one() {
        let residuals = [-1.0, -0.5, 0.0, 0.0, 0.5, 1.0];
        let hist = residual_histogram(&residuals, 4).unwrap();
        assert_eq!(hist.edges.len(), 5);
        assert_eq!(hist.edges[0], -1.0);
        assert_eq!(hist.edges[4], 1.0);
        let total: f64 = hist.weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        // max value lands in the last (closed) bin
        assert!((hist.weights[3] - 2.0 / 6.0).abs() < 1e-12);
        assert_eq!(hist.sorted.first(), Some(&-1.0));
        assert!(hist.normal_pdf[2] > hist.normal_pdf[0]);
    }

    #[test]
    fn test_histogram_constant_series() {
        assert!(matches!(residual_histogram(&[2.0, 2.0], 3), Err(Error::DegenerateInput(_))));
        assert!(residual_histogram(&[1.0], 0).is_err());
        assert!(residual_histogram(&[], 3).is_err());
    }

    #[test]
    fn test_diagnose_residuals() {
        let residuals: Vec<f64> = (0..40).map(|i| ((i * 7) % 11) as f64 - 5.0).collect();
        let report = diagnose_residuals("low", &residuals, 10, 10, 0.1).unwrap();
        assert_eq!(report.label, "low");
        assert_eq!(report.scatter.len(), 40);
        assert_eq!(report.scatter[3].0, 3);
        assert_eq!(report.trend.len(), 40);
        assert!(report.trend.iter().all(|v| *v >= 0.0));
        assert!(diagnose_residuals("low", &residuals, 10, 10, 1.0).is_err());
        assert_eq!(report.bartlett_groups, 4);
        assert!(report.bartlett_p_value >= 0.0 && report.bartlett_p_value <= 1.0);
    }
}
