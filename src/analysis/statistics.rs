//! Stateless numeric transforms used by training and residual diagnostics
//!
//! Matrices are row-major observations: one row per time step, one column per feature.
//! Variances are population variances (divide by `n`) unless stated otherwise.

use ndarray::{Array1, Array2, Axis};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{Error, Result};

/// Normalize columns to zero mean and unit variance with externally supplied statistics
///
/// Computes `(data - mean) / (std + epsilon)` with `mean` and `std` broadcast across rows.
/// The statistics usually come from the training matrix so train and test are scaled alike.
///
/// # Arguments
/// * `data` - Matrix to normalize
/// * `mean` - Per-column mean (length = number of columns)
/// * `std` - Per-column standard deviation (length = number of columns)
/// * `epsilon` - Added to `std` to guard against division by zero
pub fn z_score(data: &Array2<f64>, mean: &Array1<f64>, std: &Array1<f64>, epsilon: f64) -> Result<Array2<f64>> {
    let cols = data.ncols();
    if mean.len() != cols || std.len() != cols {
        return Err(Error::InvalidInput(format!(
            "z-score statistics have lengths {}/{} but data has {} columns",
            mean.len(),
            std.len(),
            cols
        )));
    }

    let denom = std.mapv(|s| s + epsilon);
    Ok((data - mean) / &denom)
}

/// Column mean and population standard deviation of a matrix
pub fn column_stats(data: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
    let mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| Error::InsufficientData("cannot compute statistics of an empty matrix".to_string()))?;
    let std = data.std_axis(Axis(0), 0.0);
    Ok((mean, std))
}

/// Z-score both matrices with the statistics of `train`
pub fn standardize(train: &Array2<f64>, test: &Array2<f64>, epsilon: f64) -> Result<(Array2<f64>, Array2<f64>)> {
    let (mean, std) = column_stats(train)?;
    Ok((z_score(train, &mean, &std, epsilon)?, z_score(test, &mean, &std, epsilon)?))
}

/// Lazy exponential weighted average over a sequence
///
/// Yields `v[0] = beta·(1-beta)·x[0]` and `v[i] = (1-beta)·v[i-1] + beta·(1-beta)·x[i]`.
/// Consumes its source, so it can be traversed only once.
#[derive(Debug)]
pub struct ExponentialWeightedAverage<I> {
    source: I,
    beta: f64,
    state: f64,
}

impl<I: Iterator<Item = f64>> Iterator for ExponentialWeightedAverage<I> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let x = self.source.next()?;
        self.state = (1.0 - self.beta) * self.state + self.beta * (1.0 - self.beta) * x;
        Some(self.state)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.source.size_hint()
    }
}

/// Exponential weighted average of `values`; `beta` must lie in `(0, 1)`
pub fn exponential_weighted_average<I>(values: I, beta: f64) -> Result<ExponentialWeightedAverage<I::IntoIter>>
where
    I: IntoIterator<Item = f64>,
{
    if !(beta > 0.0 && beta < 1.0) {
        return Err(Error::InvalidInput(format!("beta must be in (0, 1), got {}", beta)));
    }
    Ok(ExponentialWeightedAverage {
        source: values.into_iter(),
        beta,
        state: 0.0,
    })
}

/// Result of Bartlett's test for equal variances
#[derive(Debug, Clone, PartialEq)]
pub struct BartlettResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Number of complete chunks that entered the test
    pub groups: usize,
}

/// Bartlett's homogeneity-of-variance test across contiguous chunks of a series
///
/// `values` is cut into non-overlapping chunks of exactly `partition_factor` elements; a
/// trailing incomplete chunk is dropped. Chunk variances use `n - 1`.
///
/// # Errors
/// * `InvalidPartition` - `partition_factor < 2` or fewer than two complete chunks
/// * `DegenerateInput` - pooled variance is zero
pub fn bartlett_partition_test(values: &[f64], partition_factor: usize) -> Result<BartlettResult> {
    if partition_factor == 0 {
        return Err(Error::InvalidPartition("partition factor must be positive".to_string()));
    }
    if partition_factor == 1 {
        return Err(Error::InvalidPartition(
            "partition factor 1 leaves no degrees of freedom per chunk".to_string(),
        ));
    }

    let chunks: Vec<&[f64]> = values.chunks_exact(partition_factor).collect();
    if chunks.len() < 2 {
        return Err(Error::InvalidPartition(format!(
            "{} values with partition factor {} give {} complete chunk(s), need at least 2",
            values.len(),
            partition_factor,
            chunks.len()
        )));
    }

    let k = chunks.len() as f64;
    let ni = partition_factor as f64;
    let total = k * ni;

    let variances: Vec<f64> = chunks.iter().map(|chunk| sample_variance(chunk)).collect();
    let pooled = variances.iter().map(|v| (ni - 1.0) * v).sum::<f64>() / (total - k);
    if pooled == 0.0 {
        return Err(Error::DegenerateInput("pooled variance of all chunks is zero".to_string()));
    }

    let numerator =
        (total - k) * pooled.ln() - variances.iter().map(|v| (ni - 1.0) * v.ln()).sum::<f64>();
    let correction = 1.0 + (k / (ni - 1.0) - 1.0 / (total - k)) / (3.0 * (k - 1.0));
    let statistic = numerator / correction;

    let p_value = match ChiSquared::new(k - 1.0) {
        Ok(chi2) => chi2.sf(statistic),
        Err(e) => return Err(Error::InvalidPartition(format!("chi-squared with {} dof: {}", k - 1.0, e))),
    };

    Ok(BartlettResult {
        statistic,
        p_value,
        groups: chunks.len(),
    })
}

/// Residuals scaled by their variance and leverage-like weight
///
/// `r_i / (Var(r) · (1 - w_i - 1/n))` with `w_i = (r_i - mean)² / Σ(r_j - mean)²`.
///
/// # Errors
/// `DegenerateInput` when `n <= 1`, the variance is zero, or a denominator vanishes
/// (always the case for `n == 2`).
pub fn normalize_residuals(residuals: &[f64]) -> Result<Vec<f64>> {
    let n = residuals.len();
    if n <= 1 {
        return Err(Error::DegenerateInput(format!(
            "need at least 2 residuals, got {}",
            n
        )));
    }

    let mean = mean(residuals);
    let centered: Vec<f64> = residuals.iter().map(|r| (r - mean).powi(2)).collect();
    let total: f64 = centered.iter().sum();
    let variance = total / n as f64;
    if variance == 0.0 {
        return Err(Error::DegenerateInput("residual variance is zero".to_string()));
    }

    residuals
        .iter()
        .zip(&centered)
        .map(|(r, c)| {
            let denom = variance * (1.0 - c / total - 1.0 / n as f64);
            if denom == 0.0 {
                Err(Error::DegenerateInput(format!(
                    "residual {} has a zero normalization denominator",
                    r
                )))
            } else {
                Ok(r / denom)
            }
        })
        .collect()
}

/// Root mean squared error between two equally long series
pub fn rmse(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_pair(predicted, actual)?;
    let mse = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum::<f64>()
        / predicted.len() as f64;
    Ok(mse.sqrt())
}

/// Coefficient of determination; a constant target scores 1.0 when matched exactly, else 0.0
pub fn r2_score(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_pair(predicted, actual)?;
    let mean = mean(actual);
    let ss_res: f64 = predicted.iter().zip(actual).map(|(p, a)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

fn check_pair(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::InvalidInput(format!(
            "series lengths differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if a.is_empty() {
        return Err(Error::InsufficientData("empty series".to_string()));
    }
    Ok(())
}
