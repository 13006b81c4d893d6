use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Feature and label rows of one partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    pub features: Array2<f64>,
    pub labels: Array2<f64>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }
}

/// Chronological train/test partitions of an aligned dataset
///
/// Train rows all precede test rows. `label_names[i]` names label column `i`, which
/// lets callers match predictions to targets by name rather than by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLabelSplit {
    pub train: Partition,
    pub test: Partition,
    pub feature_names: Vec<String>,
    pub label_names: Vec<String>,
    pub split_index: usize,
}

impl FeatureLabelSplit {
    /// Position of a label column by name
    pub fn label_position(&self, name: &str) -> Option<usize> {
        self.label_names.iter().position(|l| l == name)
    }
}
