use chrono::NaiveDateTime;
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Dense table of per-symbol columns on a shared date index
///
/// # Invariants
/// - `values` has shape `(index.len(), columns.len())`
/// - every cell holds a value (gaps were filled during alignment)
/// - column names are unique, the index is strictly increasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct AlignedDataset {
    index: Vec<NaiveDateTime>,
    columns: Vec<String>,
    values: Array2<f64>,
}

#[derive(Deserialize)]
struct RawDataset {
    index: Vec<NaiveDateTime>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl TryFrom<RawDataset> for AlignedDataset {
    type Error = Error;

    fn try_from(raw: RawDataset) -> Result<Self> {
        AlignedDataset::new(raw.index, raw.columns, raw.values)
    }
}

impl AlignedDataset {
    pub fn new(index: Vec<NaiveDateTime>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (index.len(), columns.len()) {
            return Err(Error::InvalidInput(format!(
                "matrix shape {:?} does not match {} rows x {} columns",
                values.dim(),
                index.len(),
                columns.len()
            )));
        }
        if index.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidInput("dataset index is not strictly increasing".to_string()));
        }
        ensure_unique(&columns)?;

        Ok(Self { index, columns, values })
    }

    /// Dataset with an index but no columns yet
    pub fn empty(index: Vec<NaiveDateTime>) -> Result<Self> {
        let rows = index.len();
        Self::new(index, Vec::new(), Array2::zeros((rows, 0)))
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.index.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_position(name).map(|pos| self.values.column(pos))
    }

    /// Concatenate an auxiliary numeric column
    pub fn append_column(&mut self, name: impl Into<String>, values: Array1<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.nrows() {
            return Err(Error::InvalidInput(format!(
                "column '{}' has {} values, dataset has {} rows",
                name,
                values.len(),
                self.nrows()
            )));
        }
        if self.column_position(&name).is_some() {
            return Err(Error::InvalidInput(format!("duplicate column '{}'", name)));
        }

        let column = values.insert_axis(Axis(1));
        self.values = concatenate(Axis(1), &[self.values.view(), column.view()])
            .map_err(|e| Error::InvalidInput(format!("cannot append column '{}': {}", name, e)))?;
        self.columns.push(name);
        Ok(())
    }

    /// Join the columns of another dataset built on the same index
    pub fn join(mut self, other: AlignedDataset) -> Result<Self> {
        if self.index != other.index {
            return Err(Error::InvalidInput(
                "cannot join datasets with different indexes".to_string(),
            ));
        }

        let mut columns = self.columns;
        columns.extend(other.columns);
        ensure_unique(&columns)?;

        self.values = concatenate(Axis(1), &[self.values.view(), other.values.view()])
            .map_err(|e| Error::InvalidInput(format!("cannot join datasets: {}", e)))?;
        self.columns = columns;
        Ok(self)
    }

    /// Rows `[start, end)` as a new dataset
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.nrows() {
            return Err(Error::InvalidInput(format!(
                "row range {}..{} out of bounds for {} rows",
                start,
                end,
                self.nrows()
            )));
        }
        Ok(Self {
            index: self.index[start..end].to_vec(),
            columns: self.columns.clone(),
            values: self.values.slice(s![start..end, ..]).to_owned(),
        })
    }
}

fn ensure_unique(columns: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(Error::InvalidInput(format!("duplicate column '{}'", column)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn index(n: u32) -> Vec<NaiveDateTime> {
        (1..=n)
            .map(|d| NaiveDate::from_ymd_opt(2018, 3, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
            .collect()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = AlignedDataset::new(index(2), vec!["a".into()], array![[1.0], [2.0], [3.0]]);
        assert!(err.is_err());
    }

    #[test]
    fn test_append_column() {
        let mut ds = AlignedDataset::new(index(2), vec!["a".into()], array![[1.0], [2.0]]).unwrap();
        ds.append_column("b", array![10.0, 20.0]).unwrap();
        assert_eq!(ds.ncols(), 2);
        assert_eq!(ds.column("b").unwrap().to_vec(), vec![10.0, 20.0]);

        assert!(ds.append_column("c", array![1.0]).is_err());
        assert!(ds.append_column("a", array![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_join_requires_same_index() {
        let left = AlignedDataset::new(index(2), vec!["a".into()], array![[1.0], [2.0]]).unwrap();
        let right = AlignedDataset::new(index(2), vec!["b".into()], array![[3.0], [4.0]]).unwrap();
        let joined = left.clone().join(right).unwrap();
        assert_eq!(joined.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(joined.values(), &array![[1.0, 3.0], [2.0, 4.0]]);

        let other = AlignedDataset::new(index(3), vec!["c".into()], array![[1.0], [2.0], [3.0]]).unwrap();
        assert!(left.join(other).is_err());
    }

    #[test]
    fn test_deserialize_checks_invariants() {
        let ds = AlignedDataset::new(index(2), vec!["a".into(), "b".into()], array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let json = serde_json::to_value(&ds).unwrap();
        assert_eq!(serde_json::from_value::<AlignedDataset>(json.clone()).unwrap(), ds);

        let mut duplicate = json.clone();
        duplicate["columns"] = serde_json::json!(["a", "a"]);
        assert!(serde_json::from_value::<AlignedDataset>(duplicate).is_err());

        let mut reversed = json.clone();
        let dates = reversed["index"].as_array().unwrap().iter().rev().cloned().collect::<Vec<_>>();
        reversed["index"] = serde_json::Value::Array(dates);
        assert!(serde_json::from_value::<AlignedDataset>(reversed).is_err());

        let mut short = json;
        short["columns"] = serde_json::json!(["a"]);
        assert!(serde_json::from_value::<AlignedDataset>(short).is_err());
    }

    #[test]
    fn test_slice_rows() {
        let ds = AlignedDataset::new(index(3), vec!["a".into()], array![[1.0], [2.0], [3.0]]).unwrap();
        let head = ds.slice_rows(0, 2).unwrap();
        assert_eq!(head.nrows(), 2);
        assert_eq!(head.index(), &index(2)[..]);
        assert!(ds.slice_rows(2, 4).is_err());
    }
}
