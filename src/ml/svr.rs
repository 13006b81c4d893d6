//! Support vector regression with an exhaustive hyperparameter grid
//!
//! One SVR is fitted per label column. Each grid point is scored by its mean R² over
//! contiguous folds of the training rows; the best point is refitted on all of them.

use ndarray::{Array2, ArrayView1, Axis};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::svm::svr::{SVRParameters, SVR};
use smartcore::svm::Kernels;
use std::fmt;
use tracing::{debug, info};

use super::{check_training_shapes, Predictions, Regressor};
use crate::analysis::r2_score;
use crate::error::{Error, Result};

const POLY_DEGREE: f64 = 3.0;
const POLY_COEF0: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvrKernel {
    Rbf,
    Poly,
}

impl fmt::Display for SvrKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvrKernel::Rbf => write!(f, "rbf"),
            SvrKernel::Poly => write!(f, "poly"),
        }
    }
}

/// One point of the search grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvrParams {
    pub kernel: SvrKernel,
    pub c: f64,
    pub gamma: f64,
    pub epsilon: f64,
}

impl fmt::Display for SvrParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "kernel={} C={} gamma={} epsilon={}",
            self.kernel, self.c, self.gamma, self.epsilon
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SvrGrid {
    pub kernels: Vec<SvrKernel>,
    pub c: Vec<f64>,
    pub gamma: Vec<f64>,
    pub epsilon: Vec<f64>,
    /// Contiguous cross-validation folds
    pub folds: usize,
}

impl Default for SvrGrid {
    fn default() -> Self {
        Self {
            kernels: vec![SvrKernel::Rbf, SvrKernel::Poly],
            c: vec![100.0, 500.0],
            gamma: vec![1e-4],
            epsilon: vec![100.0, 150.0],
            folds: 3,
        }
    }
}

impl SvrGrid {
    /// Every combination, kernels varying slowest
    pub fn candidates(&self) -> Vec<SvrParams> {
        let mut out = Vec::new();
        for &kernel in &self.kernels {
            for &c in &self.c {
                for &gamma in &self.gamma {
                    for &epsilon in &self.epsilon {
                        out.push(SvrParams {
                            kernel,
                            c,
                            gamma,
                            epsilon,
                        });
                    }
                }
            }
        }
        out
    }
}

pub struct SvrRegressor {
    grid: SvrGrid,
}

impl SvrRegressor {
    pub fn new(grid: SvrGrid) -> Self {
        Self { grid }
    }

    /// Best grid point for one target column and its mean fold score
    pub fn search(&self, x: &Array2<f64>, y: ArrayView1<'_, f64>) -> Result<(SvrParams, f64)> {
        let folds = fold_bounds(x.nrows(), self.grid.folds)?;
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(Error::Model("empty hyperparameter grid".to_string()));
        }

        let mut best: Option<(SvrParams, f64)> = None;
        for params in candidates {
            let mut total = 0.0;
            for &(start, end) in &folds {
                let train_rows: Vec<usize> = (0..start).chain(end..x.nrows()).collect();
                let val_rows: Vec<usize> = (start..end).collect();

                let x_fit = x.select(Axis(0), &train_rows);
                let y_fit: Vec<f64> = train_rows.iter().map(|&r| y[r]).collect();
                let x_val = x.select(Axis(0), &val_rows);
                let y_val: Vec<f64> = val_rows.iter().map(|&r| y[r]).collect();

                let predicted = fit_predict(&params, &x_fit, &y_fit, &x_val)?;
                total += r2_score(&predicted, &y_val)?;
            }
            let score = total / folds.len() as f64;
            debug!("SVR {} -> mean R² {:.4}", params, score);

            if best.map_or(true, |(_, s)| score > s) {
                best = Some((params, score));
            }
        }

        best.ok_or_else(|| Error::Model("grid search produced no score".to_string()))
    }
}

impl Regressor for SvrRegressor {
    fn name(&self) -> &'static str {
        "svr"
    }

    fn train_and_predict(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array2<f64>,
        x_test: &Array2<f64>,
    ) -> Result<Predictions> {
        check_training_shapes(x_train, y_train, x_test)?;

        let labels = y_train.ncols();
        let mut test = Array2::zeros((x_test.nrows(), labels));
        let mut train = Array2::zeros((x_train.nrows(), labels));
        let mut reports = Vec::with_capacity(labels);

        for (j, column) in y_train.axis_iter(Axis(1)).enumerate() {
            let (params, score) = self.search(x_train, column)?;
            info!("Label column {}: best {} (mean R² {:.4})", j, params, score);

            let y: Vec<f64> = column.to_vec();
            let test_pred = fit_predict(&params, x_train, &y, x_test)?;
            let train_pred = fit_predict(&params, x_train, &y, x_train)?;
            test.column_mut(j).assign(&ArrayView1::from(&test_pred[..]));
            train.column_mut(j).assign(&ArrayView1::from(&train_pred[..]));
            reports.push(format!("[{}] {}", j, params));
        }

        Ok(Predictions {
            test,
            train,
            best_params: Some(reports.join("; ")),
        })
    }
}

/// `(start, end)` of each validation fold; the last fold takes the remainder
fn fold_bounds(rows: usize, folds: usize) -> Result<Vec<(usize, usize)>> {
    if folds < 2 {
        return Err(Error::InvalidInput(format!("cross-validation needs at least 2 folds, got {}", folds)));
    }
    if rows < folds * 2 {
        return Err(Error::InsufficientData(format!(
            "{} rows are too few for {}-fold cross-validation",
            rows, folds
        )));
    }
    let size = rows / folds;
    Ok((0..folds)
        .map(|k| {
            let start = k * size;
            let end = if k + 1 == folds { rows } else { start + size };
            (start, end)
        })
        .collect())
}

fn to_dense(x: &Array2<f64>) -> Result<DenseMatrix<f64>> {
    let rows: Vec<Vec<f64>> = x.outer_iter().map(|row| row.to_vec()).collect();
    DenseMatrix::from_2d_vec(&rows)
        .map_err(|e| Error::Model(format!("Failed to create feature matrix: {}", e)))
}

fn fit_predict(params: &SvrParams, x_fit: &Array2<f64>, y_fit: &Vec<f64>, x_eval: &Array2<f64>) -> Result<Vec<f64>> {
    let x = to_dense(x_fit)?;
    let x_eval = to_dense(x_eval)?;

    let base = SVRParameters::default().with_c(params.c).with_eps(params.epsilon);
    let parameters = match params.kernel {
        SvrKernel::Rbf => base.with_kernel(Kernels::rbf().with_gamma(params.gamma)),
        SvrKernel::Poly => base.with_kernel(
            Kernels::polynomial()
                .with_degree(POLY_DEGREE)
                .with_gamma(params.gamma)
                .with_coef0(POLY_COEF0),
        ),
    };

    let model = SVR::fit(&x, y_fit, &parameters)
        .map_err(|e| Error::Model(format!("SVR training failed ({}): {}", params, e)))?;
    model
        .predict(&x_eval)
        .map_err(|e| Error::Model(format!("SVR prediction failed ({}): {}", params, e)))
}
