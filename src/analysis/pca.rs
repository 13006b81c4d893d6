//! Principal component projection
//!
//! Components are found by power iteration with deflation on the covariance matrix of the
//! training data, which is enough for the handful of components the pipeline asks for.

use ndarray::{concatenate, Array1, Array2, Axis};
use tracing::debug;

use crate::error::{Error, Result};

const MAX_ITERATIONS: usize = 1000;
const TOLERANCE: f64 = 1e-12;

/// Fitted projection onto the leading principal components
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    /// One component per row, unit length
    components: Array2<f64>,
    explained_variance: Array1<f64>,
}

impl Pca {
    pub fn fit(data: &Array2<f64>, n_components: usize) -> Result<Self> {
        let (rows, cols) = data.dim();
        if n_components == 0 || n_components > cols {
            return Err(Error::InvalidInput(format!(
                "cannot extract {} components from {} columns",
                n_components, cols
            )));
        }
        if rows < 2 {
            return Err(Error::InsufficientData(format!(
                "PCA needs at least 2 rows, got {}",
                rows
            )));
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InsufficientData("empty matrix".to_string()))?;
        let centered = data - &mean;
        let mut covariance = centered.t().dot(&centered) / (rows as f64 - 1.0);

        let mut components = Array2::zeros((n_components, cols));
        let mut explained_variance = Array1::zeros(n_components);

        for k in 0..n_components {
            let (eigenvalue, vector) = leading_eigenpair(&covariance);
            debug!("PCA component {}: eigenvalue {:.6}", k, eigenvalue);

            components.row_mut(k).assign(&vector);
            explained_variance[k] = eigenvalue;

            let outer = outer(&vector, &vector) * eigenvalue;
            covariance = covariance - outer;
        }

        Ok(Self {
            mean,
            components,
            explained_variance,
        })
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.mean.len() {
            return Err(Error::InvalidInput(format!(
                "PCA was fitted on {} columns, got {}",
                self.mean.len(),
                data.ncols()
            )));
        }
        Ok((data - &self.mean).dot(&self.components.t()))
    }
}

/// Project train and test onto `n_features` components fitted on train, with a leading
/// column of ones
pub fn pca_transformation(
    train: &Array2<f64>,
    test: &Array2<f64>,
    n_features: usize,
) -> Result<(Array2<f64>, Array2<f64>)> {
    let pca = Pca::fit(train, n_features)?;
    Ok((
        with_bias_column(&pca.transform(train)?)?,
        with_bias_column(&pca.transform(test)?)?,
    ))
}

fn with_bias_column(data: &Array2<f64>) -> Result<Array2<f64>> {
    let ones = Array2::ones((data.nrows(), 1));
    concatenate(Axis(1), &[ones.view(), data.view()])
        .map_err(|e| Error::InvalidInput(format!("cannot add bias column: {}", e)))
}

fn leading_eigenpair(matrix: &Array2<f64>) -> (f64, Array1<f64>) {
    let n = matrix.nrows();

    // Start from the column with the largest norm; it is never orthogonal to the top
    // eigenvector unless the matrix is zero.
    let start = (0..n)
        .max_by(|&a, &b| {
            let na = matrix.column(a).dot(&matrix.column(a));
            let nb = matrix.column(b).dot(&matrix.column(b));
            na.total_cmp(&nb)
        })
        .unwrap_or(0);
    let mut vector = matrix.column(start).to_owned();
    let norm = vector.dot(&vector).sqrt();
    if norm < TOLERANCE {
        let mut unit = Array1::zeros(n);
        unit[start] = 1.0;
        return (0.0, unit);
    }
    vector /= norm;

    for _ in 0..MAX_ITERATIONS {
        let mut next = matrix.dot(&vector);
        let norm = next.dot(&next).sqrt();
        if norm < TOLERANCE {
            break;
        }
        next /= norm;
        let delta = (&next - &vector).mapv(f64::abs).sum();
        vector = next;
        if delta < TOLERANCE {
            break;
        }
    }

    // Sign convention: the loading with the largest magnitude is positive
    let pivot = vector
        .iter()
        .copied()
        .max_by(|a, b| a.abs().total_cmp(&b.abs()))
        .unwrap_or(1.0);
    if pivot < 0.0 {
        vector.mapv_inplace(|v| -v);
    }

    let eigenvalue = vector.dot(&matrix.dot(&vector));
    (eigenvalue, vector)
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let column = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    column.dot(&row)
}
