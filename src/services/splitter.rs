use ndarray::{s, Array2, Axis};
use tracing::info;

use crate::constants::LABEL_COLUMNS;
use crate::error::{Error, Result};
use crate::models::{AlignedDataset, FeatureLabelSplit, Partition};

/// Chronological train/test split of an aligned dataset
///
/// The last [`LABEL_COLUMNS`] columns become labels in reversed order (last column first);
/// everything before them is a feature. Rows `[0, floor(fraction * n))` train, the rest test.
pub fn split(dataset: &AlignedDataset, split_fraction: f64) -> Result<FeatureLabelSplit> {
    let rows = dataset.nrows();
    let cols = dataset.ncols();

    if !(0.0..=1.0).contains(&split_fraction) {
        return Err(Error::InvalidInput(format!(
            "split fraction must be in [0, 1], got {}",
            split_fraction
        )));
    }
    if rows < 2 {
        return Err(Error::InsufficientData(format!(
            "need at least 2 rows to split, got {}",
            rows
        )));
    }
    if cols <= LABEL_COLUMNS {
        return Err(Error::InsufficientData(format!(
            "need at least {} columns ({} labels plus features), got {}",
            LABEL_COLUMNS + 1,
            LABEL_COLUMNS,
            cols
        )));
    }

    let split_index = (split_fraction * rows as f64).floor() as usize;
    if split_index == 0 || split_index == rows {
        return Err(Error::InsufficientData(format!(
            "split index {} leaves an empty partition for {} rows",
            split_index, rows
        )));
    }

    let feature_count = cols - LABEL_COLUMNS;
    let values = dataset.values();
    let features = values.slice(s![.., ..feature_count]);
    let labels: Array2<f64> = values.slice(s![.., feature_count..;-1]).to_owned();

    let columns = dataset.columns();
    let feature_names = columns[..feature_count].to_vec();
    let label_names = columns[feature_count..].iter().rev().cloned().collect();

    let (train_x, test_x) = features.split_at(Axis(0), split_index);
    let (train_y, test_y) = labels.view().split_at(Axis(0), split_index);

    info!(
        "Split {} rows into {} train / {} test ({} features, {} labels)",
        rows,
        split_index,
        rows - split_index,
        feature_count,
        LABEL_COLUMNS
    );

    Ok(FeatureLabelSplit {
        train: Partition {
            features: train_x.to_owned(),
            labels: train_y.to_owned(),
        },
        test: Partition {
            features: test_x.to_owned(),
            labels: test_y.to_owned(),
        },
        feature_names,
        label_names,
        split_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn dataset(rows: usize, cols: usize) -> AlignedDataset {
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let index: Vec<NaiveDateTime> = (0..rows).map(|i| start + Duration::days(i as i64)).collect();
        let columns = (0..cols).map(|c| format!("c{}", c)).collect();
        let values = Array2::from_shape_fn((rows, cols), |(r, c)| (r * 100 + c) as f64);
        AlignedDataset::new(index, columns, values).unwrap()
    }

    #[test]
    fn test_split_100_rows() {
        let result = split(&dataset(100, 7), 0.9).unwrap();
        assert_eq!(result.split_index, 90);
        assert_eq!(result.train.len(), 90);
        assert_eq!(result.test.len(), 10);
        assert_eq!(result.train.features.ncols(), 3);
        assert_eq!(result.train.labels.ncols(), 4);
        // first test row is source row 90
        assert_eq!(result.test.features[[0, 0]], 9000.0);
    }

    #[test]
    fn test_labels_reversed() {
        let result = split(&dataset(10, 6), 0.5).unwrap();
        assert_eq!(result.feature_names, vec!["c0", "c1"]);
        assert_eq!(result.label_names, vec!["c5", "c4", "c3", "c2"]);
        assert_eq!(result.train.labels.row(1).to_vec(), vec![105.0, 104.0, 103.0, 102.0]);
        assert_eq!(result.label_position("c3"), Some(2));
    }

    #[test]
    fn test_single_row_fails() {
        assert!(matches!(split(&dataset(1, 6), 0.9), Err(Error::InsufficientData(_))));
    }

    #[test]
    fn test_empty_partition_fails() {
        // floor(0.4 * 2) = 0
        assert!(matches!(split(&dataset(2, 6), 0.4), Err(Error::InsufficientData(_))));
        assert!(matches!(split(&dataset(10, 4), 0.5), Err(Error::InsufficientData(_))));
        assert!(split(&dataset(10, 6), 1.5).is_err());
    }

    #[test]
    fn test_boundary_fractions_leave_empty_partition() {
        assert!(matches!(split(&dataset(10, 6), 0.0), Err(Error::InsufficientData(_))));
        assert!(matches!(split(&dataset(10, 6), 1.0), Err(Error::InsufficientData(_))));
        assert!(matches!(split(&dataset(10, 6), f64::NAN), Err(Error::InvalidInput(_))));
        assert!(matches!(split(&dataset(10, 6), -0.1), Err(Error::InvalidInput(_))));
    }
}
