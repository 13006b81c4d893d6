//! JSON artifacts written between pipeline stages

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{FeatureLabelSplit, Partition, TimeSeriesTable};

/// Prepared train/test matrices, saved by `prepare` and read by `train`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineCheckpoint {
    #[serde(rename = "x train")]
    pub x_train: Array2<f64>,

    #[serde(rename = "y train")]
    pub y_train: Array2<f64>,

    #[serde(rename = "x test")]
    pub x_test: Array2<f64>,

    #[serde(rename = "y test")]
    pub y_test: Array2<f64>,

    /// Symbols whose columns make up the features, in column order
    #[serde(rename = "company listings")]
    pub company_listings: Vec<String>,

    /// Names of the label columns; empty in checkpoints that predate it
    #[serde(rename = "label names", default)]
    pub label_names: Vec<String>,
}

impl PipelineCheckpoint {
    pub fn from_split(split: &FeatureLabelSplit, company_listings: Vec<String>) -> Self {
        Self {
            x_train: split.train.features.clone(),
            y_train: split.train.labels.clone(),
            x_test: split.test.features.clone(),
            y_test: split.test.labels.clone(),
            company_listings,
            label_names: split.label_names.clone(),
        }
    }

    pub fn train(&self) -> Partition {
        Partition {
            features: self.x_train.clone(),
            labels: self.y_train.clone(),
        }
    }

    pub fn test(&self) -> Partition {
        Partition {
            features: self.x_test.clone(),
            labels: self.y_test.clone(),
        }
    }

    /// Check that the four matrices describe one consistent split
    pub fn validate(&self) -> Result<()> {
        if self.x_train.nrows() != self.y_train.nrows() {
            return Err(Error::Checkpoint(format!(
                "'x train' has {} rows but 'y train' has {}",
                self.x_train.nrows(),
                self.y_train.nrows()
            )));
        }
        if self.x_test.nrows() != self.y_test.nrows() {
            return Err(Error::Checkpoint(format!(
                "'x test' has {} rows but 'y test' has {}",
                self.x_test.nrows(),
                self.y_test.nrows()
            )));
        }
        if self.x_train.ncols() != self.x_test.ncols() {
            return Err(Error::Checkpoint(format!(
                "feature width differs: train {} vs test {}",
                self.x_train.ncols(),
                self.x_test.ncols()
            )));
        }
        if self.y_train.ncols() != self.y_test.ncols() {
            return Err(Error::Checkpoint(format!(
                "label width differs: train {} vs test {}",
                self.y_train.ncols(),
                self.y_test.ncols()
            )));
        }
        if !self.label_names.is_empty() && self.label_names.len() != self.y_train.ncols() {
            return Err(Error::Checkpoint(format!(
                "{} label names for {} label columns",
                self.label_names.len(),
                self.y_train.ncols()
            )));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        write_json(path, self)?;
        info!(
            "Saved checkpoint to {} ({} train / {} test rows)",
            path.display(),
            self.x_train.nrows(),
            self.x_test.nrows()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let checkpoint: Self = read_json(path)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }
}

/// Intraday bars per symbol, saved by `scrape`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntradayCache {
    #[serde(rename = "hourly data")]
    pub hourly_data: Vec<TimeSeriesTable>,
}

impl IntradayCache {
    pub fn new(hourly_data: Vec<TimeSeriesTable>) -> Self {
        Self { hourly_data }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)?;
        info!("Saved {} intraday tables to {}", self.hourly_data.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(Error::NotFound(format!("artifact {}", path.display())));
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Checkpoint(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Serialize to a temporary sibling file, then rename over the target
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(value)
        .map_err(|e| Error::Checkpoint(format!("Failed to serialize {}: {}", path.display(), e)))?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);
    fs::write(temp_path, json)?;
    fs::rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeSeriesRow;
    use chrono::NaiveDate;
    use ndarray::array;
    use tempfile::TempDir;

    fn checkpoint() -> PipelineCheckpoint {
        PipelineCheckpoint {
            x_train: array![[1.0, 2.0], [3.0, 4.0]],
            y_train: array![[10.0], [20.0]],
            x_test: array![[5.0, 6.0]],
            y_test: array![[30.0]],
            company_listings: vec!["AAPL".to_string(), "MSFT".to_string()],
            label_names: vec!["SP500_Open".to_string()],
        }
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("model.json");
        checkpoint().save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        for key in ["x train", "y train", "x test", "y test", "company listings"] {
            assert!(content.contains(&format!("\"{}\"", key)), "missing key {}", key);
        }
        assert_eq!(PipelineCheckpoint::load(&path).unwrap(), checkpoint());
    }

    #[test]
    fn test_missing_checkpoint_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = PipelineCheckpoint::load(&dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_wrong_key_casing_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let mut value = serde_json::to_value(checkpoint()).unwrap();
        let obj = value.as_object_mut().unwrap();
        let x_train = obj.remove("x train").unwrap();
        obj.insert("X_train".to_string(), x_train);
        fs::write(&path, value.to_string()).unwrap();

        assert!(matches!(PipelineCheckpoint::load(&path), Err(Error::Checkpoint(_))));
    }

    #[test]
    fn test_inconsistent_shapes_rejected() {
        let mut bad = checkpoint();
        bad.y_test = array![[1.0], [2.0]];
        assert!(matches!(bad.validate(), Err(Error::Checkpoint(_))));

        let dir = TempDir::new().unwrap();
        assert!(bad.save(&dir.path().join("model.json")).is_err());
    }

    #[test]
    fn test_intraday_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intra_day_data.json");
        let time = NaiveDate::from_ymd_opt(2018, 2, 1).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let table = TimeSeriesTable::new(
            "AAPL",
            vec!["open".to_string()],
            vec![TimeSeriesRow::new(time, vec![None])],
        )
        .unwrap();

        IntradayCache::new(vec![table.clone()]).save(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("\"hourly data\""));
        assert_eq!(IntradayCache::load(&path).unwrap().hourly_data, vec![table]);
    }
}
