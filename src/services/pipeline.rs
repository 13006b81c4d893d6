//! End-to-end stages driven by the CLI commands

use ndarray::Array2;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::analysis::{
    cross_correlation_lag, diagnose_residuals, pca_transformation, r2_score, rmse, standardize, top_correlated,
    ResidualDiagnostics,
};
use crate::constants::{INDEX_HISTORY_SYMBOL, Z_SCORE_EPSILON};
use crate::error::{Error, Result};
use crate::ml::Regressor;
use crate::models::{AlignedDataset, PipelineConfig, TimeSeriesTable};
use crate::services::aligner::{align, attach_index_columns, reindex_forward_fill};
use crate::services::checkpoint::{IntradayCache, PipelineCheckpoint};
use crate::services::csv_loader::{canonical_index, list_symbols, load_index_history, load_symbols};
use crate::services::report::{fit_path, forecast_path, read_prediction_report, write_diagnostics, write_prediction_report};
use crate::services::splitter::split;

/// Symbols ranked by volume/price correlation in the `prepare` summary
const TOP_VOLUME_CORRELATIONS: usize = 10;

/// What `prepare` produced
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub checkpoint: PipelineCheckpoint,
    /// Rows of the aligned dataset after the index columns were attached
    pub rows: usize,
    pub feature_names: Vec<String>,
    /// Symbols whose daily volume tracks the index price best, strongest last
    pub top_volume_correlations: Vec<String>,
}

/// Load CSVs, align, attach index targets, split, and save the checkpoint
pub fn prepare(config: &PipelineConfig) -> Result<PreparedDataset> {
    let symbols = list_symbols(&config.stocks_dir)?;
    if symbols.is_empty() {
        return Err(Error::NotFound(format!(
            "no symbol files in {}",
            config.stocks_dir.display()
        )));
    }

    let index = canonical_index(&config.stocks_dir, &config.reference_symbol)?;
    let tables = load_symbols(&config.stocks_dir, &symbols)?;
    let dataset = align(&tables, &index)?;

    let index_table = load_index_history(&config.index_file, INDEX_HISTORY_SYMBOL)?;
    let top_volume_correlations = rank_volume_correlations(&dataset, &symbols, &index_table);

    let dataset = attach_index_columns(dataset, &index_table, &config.index_label_keys, config.label_lead)?;
    let split = split(&dataset, config.split_fraction)?;

    let checkpoint = PipelineCheckpoint::from_split(&split, symbols);
    checkpoint.save(&config.checkpoint_path)?;

    Ok(PreparedDataset {
        checkpoint,
        rows: dataset.nrows(),
        feature_names: split.feature_names,
        top_volume_correlations,
    })
}

fn rank_volume_correlations(dataset: &AlignedDataset, symbols: &[String], index_table: &TimeSeriesTable) -> Vec<String> {
    let price = match index_table
        .select(&["Price"])
        .and_then(|t| reindex_forward_fill(&t, dataset.index()))
    {
        Ok(aligned) => aligned.values().column(0).to_vec(),
        Err(e) => {
            warn!("Skipping volume correlation: {}", e);
            return Vec::new();
        }
    };

    let (names, volumes): (Vec<&String>, Vec<Vec<f64>>) = symbols
        .iter()
        .filter_map(|s| dataset.column(&format!("{}_volume", s)).map(|c| (s, c.to_vec())))
        .unzip();

    let n = TOP_VOLUME_CORRELATIONS.min(volumes.len());
    match top_correlated(&volumes, &price, n) {
        Ok(indices) => indices.into_iter().map(|i| names[i].clone()).collect(),
        Err(e) => {
            warn!("Skipping volume correlation: {}", e);
            Vec::new()
        }
    }
}

/// Per-label fit quality
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMetrics {
    pub label: String,
    pub train_rmse: f64,
    pub train_r2: f64,
    pub test_rmse: f64,
    pub test_r2: f64,
}

/// What `train` produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: &'static str,
    pub metrics: Vec<LabelMetrics>,
    /// Lag maximizing the cross-correlation of train and test predictions (first label)
    pub lag: isize,
    pub best_params: Option<String>,
    pub reports: Vec<PathBuf>,
    /// Intraday tables found in the cache, `None` if no cache exists
    pub intraday_tables: Option<usize>,
}

/// Label names stored in the checkpoint, or positional names for older checkpoints
pub fn label_names(checkpoint: &PipelineCheckpoint) -> Vec<String> {
    if checkpoint.label_names.is_empty() {
        (0..checkpoint.y_train.ncols()).map(|j| format!("label_{}", j)).collect()
    } else {
        checkpoint.label_names.clone()
    }
}

/// Normalize features, fit the regressor, and write prediction reports
pub fn train(
    config: &PipelineConfig,
    regressor: &dyn Regressor,
    pca_components: Option<usize>,
) -> Result<TrainingOutcome> {
    let checkpoint = PipelineCheckpoint::load(&config.checkpoint_path)?;

    let intraday_tables = match IntradayCache::load(&config.intraday_cache) {
        Ok(cache) => {
            info!("Intraday cache holds {} tables", cache.hourly_data.len());
            Some(cache.hourly_data.len())
        }
        Err(Error::NotFound(_)) => {
            warn!("No intraday cache at {}", config.intraday_cache.display());
            None
        }
        Err(e) => return Err(e),
    };

    let (x_train, x_test) = standardize(&checkpoint.x_train, &checkpoint.x_test, Z_SCORE_EPSILON)?;
    let (x_train, x_test) = match pca_components {
        Some(n) => pca_transformation(&x_train, &x_test, n)?,
        None => (x_train, x_test),
    };

    info!(
        "Training {} on {} rows x {} features",
        regressor.name(),
        x_train.nrows(),
        x_train.ncols()
    );
    let predictions = regressor.train_and_predict(&x_train, &checkpoint.y_train, &x_test)?;
    check_prediction_shape(&predictions.test, &checkpoint.y_test)?;
    check_prediction_shape(&predictions.train, &checkpoint.y_train)?;

    let lag = cross_correlation_lag(
        &predictions.train.column(0).to_vec(),
        &predictions.test.column(0).to_vec(),
    )?;

    let mut metrics = Vec::new();
    let mut reports = Vec::new();
    for (j, label) in label_names(&checkpoint).into_iter().enumerate() {
        let forecast = forecast_path(&config.report_dir, &label);
        write_prediction_report(&forecast, predictions.test.column(j), checkpoint.y_test.column(j))?;
        let fit = fit_path(&config.report_dir, &label);
        write_prediction_report(&fit, predictions.train.column(j), checkpoint.y_train.column(j))?;
        reports.push(forecast);
        reports.push(fit);

        let train_pred = predictions.train.column(j).to_vec();
        let train_true = checkpoint.y_train.column(j).to_vec();
        let test_pred = predictions.test.column(j).to_vec();
        let test_true = checkpoint.y_test.column(j).to_vec();
        metrics.push(LabelMetrics {
            label,
            train_rmse: rmse(&train_pred, &train_true)?,
            train_r2: r2_score(&train_pred, &train_true)?,
            test_rmse: rmse(&test_pred, &test_true)?,
            test_r2: r2_score(&test_pred, &test_true)?,
        });
    }

    Ok(TrainingOutcome {
        model: regressor.name(),
        metrics,
        lag,
        best_params: predictions.best_params,
        reports,
        intraday_tables,
    })
}

fn check_prediction_shape(predicted: &Array2<f64>, actual: &Array2<f64>) -> Result<()> {
    if predicted.dim() != actual.dim() {
        return Err(Error::Model(format!(
            "predictions have shape {:?}, expected {:?}",
            predicted.dim(),
            actual.dim()
        )));
    }
    Ok(())
}

/// Options of the `diagnose` stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnoseOptions {
    pub partition_factor: usize,
    pub bins: usize,
    pub trend_beta: f64,
}

impl Default for DiagnoseOptions {
    fn default() -> Self {
        Self {
            partition_factor: 10,
            bins: 20,
            trend_beta: 0.1,
        }
    }
}

/// Diagnostics of one label together with the files written for it
#[derive(Debug, Clone)]
pub struct LabelDiagnostics {
    pub diagnostics: ResidualDiagnostics,
    pub histogram_path: PathBuf,
    pub scatter_path: PathBuf,
}

/// Residual diagnostics of the training fit written by `train`
pub fn diagnose(config: &PipelineConfig, options: DiagnoseOptions) -> Result<Vec<LabelDiagnostics>> {
    let checkpoint = PipelineCheckpoint::load(&config.checkpoint_path)?;

    label_names(&checkpoint)
        .into_iter()
        .map(|label| {
            let (predicted, actual) = read_prediction_report(&fit_path(&config.report_dir, &label))?;
            let residuals: Vec<f64> = actual.iter().zip(&predicted).map(|(a, p)| a - p).collect();
            let diagnostics = diagnose_residuals(
                &label,
                &residuals,
                options.bins,
                options.partition_factor,
                options.trend_beta,
            )?;
            let (histogram_path, scatter_path) = write_diagnostics(&config.report_dir, &diagnostics)?;
            info!(
                "{}: Bartlett statistic {:.4}, p-value {:.4}",
                label, diagnostics.bartlett_statistic, diagnostics.bartlett_p_value
            );
            Ok(LabelDiagnostics {
                diagnostics,
                histogram_path,
                scatter_path,
            })
        })
        .collect()
}
