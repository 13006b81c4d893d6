//! Regression models trained on a [`FeatureLabelSplit`](crate::models::FeatureLabelSplit)

pub mod mlp;
pub mod svr;

use ndarray::Array2;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub use mlp::{MlpConfig, MlpRegressor, TrainedMlp};
pub use svr::{SvrGrid, SvrKernel, SvrParams, SvrRegressor};

/// Output of one training run
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    /// Predictions for `x_test`, one column per label
    pub test: Array2<f64>,
    /// Predictions for `x_train`, one column per label
    pub train: Array2<f64>,
    /// Human readable description of the selected hyperparameters, if a search ran
    pub best_params: Option<String>,
}

/// A model that can be fitted on train rows and evaluated on test rows
pub trait Regressor {
    fn name(&self) -> &'static str;

    fn train_and_predict(
        &self,
        x_train: &Array2<f64>,
        y_train: &Array2<f64>,
        x_test: &Array2<f64>,
    ) -> Result<Predictions>;
}

/// Which regressor the `train` command uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelKind {
    #[default]
    Mlp,
    Svr,
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mlp" => Ok(ModelKind::Mlp),
            "svr" | "svm" => Ok(ModelKind::Svr),
            other => Err(Error::InvalidInput(format!(
                "unknown model '{}', expected 'mlp' or 'svr'",
                other
            ))),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Mlp => write!(f, "mlp"),
            ModelKind::Svr => write!(f, "svr"),
        }
    }
}

impl ModelKind {
    /// Regressor with default settings
    pub fn build(self) -> Box<dyn Regressor> {
        match self {
            ModelKind::Mlp => Box::new(MlpRegressor::new(MlpConfig::default())),
            ModelKind::Svr => Box::new(SvrRegressor::new(SvrGrid::default())),
        }
    }
}

/// Shape checks shared by every regressor
pub(crate) fn check_training_shapes(
    x_train: &Array2<f64>,
    y_train: &Array2<f64>,
    x_test: &Array2<f64>,
) -> Result<()> {
    if x_train.nrows() == 0 {
        return Err(Error::InsufficientData("no training rows".to_string()));
    }
    if x_train.nrows() != y_train.nrows() {
        return Err(Error::InvalidInput(format!(
            "{} feature rows but {} label rows",
            x_train.nrows(),
            y_train.nrows()
        )));
    }
    if y_train.ncols() == 0 {
        return Err(Error::InvalidInput("no label columns".to_string()));
    }
    if x_train.ncols() != x_test.ncols() {
        return Err(Error::InvalidInput(format!(
            "train has {} features, test has {}",
            x_train.ncols(),
            x_test.ncols()
        )));
    }
    Ok(())
}
