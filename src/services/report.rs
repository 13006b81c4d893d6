//! CSV reports for external plotting

use csv::{Reader, Writer};
use ndarray::ArrayView1;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::analysis::ResidualDiagnostics;
use crate::error::{Error, Result};

/// `{report_dir}/{label}_forecast.csv`, predictions on the test partition
pub fn forecast_path(report_dir: &Path, label: &str) -> PathBuf {
    report_dir.join(format!("{}_forecast.csv", label))
}

/// `{report_dir}/{label}_fit.csv`, predictions on the train partition
pub fn fit_path(report_dir: &Path, label: &str) -> PathBuf {
    report_dir.join(format!("{}_fit.csv", label))
}

/// Write `time_step,prediction,actual` rows
pub fn write_prediction_report(
    path: &Path,
    predicted: ArrayView1<'_, f64>,
    actual: ArrayView1<'_, f64>,
) -> Result<usize> {
    if predicted.len() != actual.len() {
        return Err(Error::InvalidInput(format!(
            "{} predictions for {} actual values",
            predicted.len(),
            actual.len()
        )));
    }
    ensure_parent(path)?;

    let mut writer = Writer::from_path(path)?;
    writer.write_record(["time_step", "prediction", "actual"])?;
    for (step, (p, a)) in predicted.iter().zip(actual.iter()).enumerate() {
        writer.write_record(&[step.to_string(), p.to_string(), a.to_string()])?;
    }
    writer.flush()?;

    debug!("Wrote {} rows to {}", predicted.len(), path.display());
    Ok(predicted.len())
}

/// Read back `(predictions, actuals)` from a prediction report
pub fn read_prediction_report(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    if !path.exists() {
        return Err(Error::NotFound(format!("report {}", path.display())));
    }

    let mut reader = Reader::from_path(path)?;
    let mut predicted = Vec::new();
    let mut actual = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let parse = |col: usize| -> Result<f64> {
            record
                .get(col)
                .unwrap_or("")
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::Parse(format!("{} line {}: bad value in column {}", path.display(), line + 2, col)))
        };
        predicted.push(parse(1)?);
        actual.push(parse(2)?);
    }
    Ok((predicted, actual))
}

/// Write the histogram and scatter series of one diagnostics run, returning both paths
pub fn write_diagnostics(report_dir: &Path, diagnostics: &ResidualDiagnostics) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(report_dir)?;

    let histogram_path = report_dir.join(format!("{}_residual_histogram.csv", diagnostics.label));
    let mut writer = Writer::from_path(&histogram_path)?;
    writer.write_record(["bin_start", "bin_end", "weight"])?;
    let hist = &diagnostics.histogram;
    for (i, weight) in hist.weights.iter().enumerate() {
        writer.write_record(&[hist.edges[i].to_string(), hist.edges[i + 1].to_string(), weight.to_string()])?;
    }
    writer.flush()?;

    let scatter_path = report_dir.join(format!("{}_residual_scatter.csv", diagnostics.label));
    let mut writer = Writer::from_path(&scatter_path)?;
    writer.write_record(["observation", "standardized_residual", "trend"])?;
    for ((obs, value), trend) in diagnostics.scatter.iter().zip(&diagnostics.trend) {
        writer.write_record(&[obs.to_string(), value.to_string(), trend.to_string()])?;
    }
    writer.flush()?;

    Ok((histogram_path, scatter_path))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
