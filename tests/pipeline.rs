use chrono::{Duration, NaiveDate};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use stock_forecast::ml::{MlpConfig, MlpRegressor};
use stock_forecast::models::PipelineConfig;
use stock_forecast::services::{self, DiagnoseOptions, PipelineCheckpoint};
use stock_forecast::Error;

const DAYS: i64 = 30;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()
}

fn write_symbol(dir: &Path, symbol: &str, skip: &[i64], scale: f64) {
    let mut content = String::from("date,open,high,low,close,volume,Name\n");
    for d in (0..DAYS).filter(|d| !skip.contains(d)) {
        let date = start() + Duration::days(d);
        let base = scale * (100.0 + d as f64 + ((d * 7) % 5) as f64);
        content.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            date.format("%Y-%m-%d"),
            base,
            base + 1.5,
            base - 1.0,
            base + 0.5,
            1_000_000 + ((d * 37) % 11) * 1000,
            symbol
        ));
    }
    fs::write(dir.join(format!("{}_data.csv", symbol)), content).unwrap();
}

fn write_index(path: &Path) {
    let mut content = String::from("Date,Price,Open,High,Low,Vol.,Change %\n");
    // newest first, as exported
    for d in (0..DAYS).rev() {
        let date = start() + Duration::days(d);
        let price = 2600.0 + 3.0 * d as f64 + ((d * 3) % 4) as f64;
        content.push_str(&format!(
            "\"{}\",\"{:.2}\",\"{:.2}\",\"{:.2}\",\"{:.2}\",-,{:.2}%\n",
            date.format("%b %d, %Y"),
            price,
            price - 5.0,
            price + 10.0,
            price - 12.0,
            0.1 * (d % 3) as f64
        ));
    }
    fs::write(path, content).unwrap();
}

fn config(root: &Path) -> PipelineConfig {
    let stocks_dir = root.join("stocks");
    fs::create_dir_all(&stocks_dir).unwrap();
    write_symbol(&stocks_dir, "AAPL", &[], 1.0);
    write_symbol(&stocks_dir, "MSFT", &[0, 1, 10, 11], 0.8);
    write_symbol(&stocks_dir, "XOM", &[5], 0.6);
    let index_file = stocks_dir.join("S&P 500 Historical Data.csv");
    write_index(&index_file);

    PipelineConfig {
        stocks_dir,
        index_file,
        checkpoint_path: root.join("model.json"),
        intraday_cache: root.join("intra_day_data.json"),
        report_dir: root.join("reports"),
        ..PipelineConfig::default()
    }
}

#[test]
fn test_prepare_writes_checkpoint() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());

    let prepared = services::prepare(&config).unwrap();
    assert_eq!(prepared.rows, (DAYS - 1) as usize);
    assert_eq!(prepared.feature_names.len(), 15);
    assert_eq!(prepared.feature_names[5], "MSFT_open");

    let checkpoint = PipelineCheckpoint::load(&config.checkpoint_path).unwrap();
    assert_eq!(checkpoint, prepared.checkpoint);
    assert_eq!(checkpoint.company_listings, vec!["AAPL", "MSFT", "XOM"]);
    assert_eq!(checkpoint.x_train.dim(), (26, 15));
    assert_eq!(checkpoint.x_test.dim(), (3, 15));
    assert_eq!(checkpoint.y_train.ncols(), 4);
    assert_eq!(
        checkpoint.label_names,
        vec!["SP500_Open", "SP500_High", "SP500_Low", "SP500_Price"]
    );

    // MSFT's first two days precede its first observation
    assert_eq!(checkpoint.x_train[[0, 5]], 0.0);
    assert_eq!(checkpoint.x_train[[1, 5]], 0.0);
    // MSFT day 10 is forward filled from day 9
    assert_eq!(checkpoint.x_train[[10, 5]], checkpoint.x_train[[9, 5]]);

    // day 0 features are paired with day 1 index values: price 2600 + 3 + 3 = 2606
    assert_eq!(checkpoint.y_train[[0, 3]], 2606.0);
    assert_eq!(checkpoint.y_train[[0, 0]], 2601.0);
}

#[test]
fn test_train_and_diagnose() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    services::prepare(&config).unwrap();

    let regressor = MlpRegressor::new(MlpConfig {
        hidden_layers: vec![8],
        learning_rate: 0.01,
        epochs: 50,
        patience: 8,
        seed: 1,
    });
    let outcome = services::train(&config, &regressor, None).unwrap();
    assert_eq!(outcome.model, "mlp");
    assert_eq!(outcome.metrics.len(), 4);
    assert_eq!(outcome.reports.len(), 8);
    assert!(outcome.intraday_tables.is_none());
    assert!(config.report_dir.join("SP500_Open_forecast.csv").exists());
    assert!(config.report_dir.join("SP500_Price_fit.csv").exists());

    let with_pca = services::train(&config, &regressor, Some(3)).unwrap();
    assert_eq!(with_pca.metrics.len(), 4);

    let results = services::diagnose(
        &config,
        DiagnoseOptions {
            partition_factor: 5,
            bins: 5,
            trend_beta: 0.1,
        },
    )
    .unwrap();
    assert_eq!(results.len(), 4);
    for result in &results {
        assert_eq!(result.diagnostics.bartlett_groups, 5);
        assert_eq!(result.diagnostics.scatter.len(), 26);
        assert!(result.histogram_path.exists());
        assert!(result.scatter_path.exists());
    }
}

#[test]
fn test_train_without_checkpoint_fails() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());
    let regressor = MlpRegressor::new(MlpConfig::default());
    assert!(matches!(
        services::train(&config, &regressor, None),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_prepare_without_reference_symbol_fails() {
    let dir = TempDir::new().unwrap();
    let mut config = config(dir.path());
    config.reference_symbol = "NOPE".to_string();
    assert!(matches!(services::prepare(&config), Err(Error::NotFound(_))));
}
