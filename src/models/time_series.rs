use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// One timestamped row of a [`TimeSeriesTable`]
///
/// `None` marks a missing cell (e.g. a `null` in the quote payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRow {
    pub time: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

impl TimeSeriesRow {
    pub fn new(time: NaiveDateTime, values: Vec<Option<f64>>) -> Self {
        Self { time, values }
    }

    /// Row where every cell is observed
    pub fn observed(time: NaiveDateTime, values: &[f64]) -> Self {
        Self {
            time,
            values: values.iter().copied().map(Some).collect(),
        }
    }
}

/// Time series for a single symbol or index
///
/// # Invariants
/// - timestamps are strictly increasing (and therefore unique)
/// - every row has exactly one cell per field
/// - field names are unique
///
/// Timestamps are naive local times; timezone conversion happens before a table is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct TimeSeriesTable {
    symbol: String,
    fields: Vec<String>,
    rows: Vec<TimeSeriesRow>,
}

#[derive(Deserialize)]
struct RawTable {
    symbol: String,
    fields: Vec<String>,
    rows: Vec<TimeSeriesRow>,
}

impl TryFrom<RawTable> for TimeSeriesTable {
    type Error = Error;

    fn try_from(raw: RawTable) -> Result<Self> {
        TimeSeriesTable::new(raw.symbol, raw.fields, raw.rows)
    }
}

impl TimeSeriesTable {
    pub fn new(symbol: impl Into<String>, fields: Vec<String>, rows: Vec<TimeSeriesRow>) -> Result<Self> {
        let symbol = symbol.into();

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate field '{}' in table for {}",
                    field, symbol
                )));
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.values.len() != fields.len() {
                return Err(Error::InvalidInput(format!(
                    "row {} of {} has {} cells, expected {}",
                    i,
                    symbol,
                    row.values.len(),
                    fields.len()
                )));
            }
        }

        if let Some(pos) = rows.windows(2).position(|w| w[0].time >= w[1].time) {
            return Err(Error::InvalidInput(format!(
                "timestamps of {} are not strictly increasing at row {} ({} -> {})",
                symbol,
                pos + 1,
                rows[pos].time,
                rows[pos + 1].time
            )));
        }

        Ok(Self { symbol, fields, rows })
    }

    /// Build a table from rows in arbitrary order, sorting them by time first
    pub fn from_unsorted(
        symbol: impl Into<String>,
        fields: Vec<String>,
        mut rows: Vec<TimeSeriesRow>,
    ) -> Result<Self> {
        rows.sort_by_key(|row| row.time);
        Self::new(symbol, fields, rows)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn rows(&self) -> &[TimeSeriesRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Timestamps in chronological order
    pub fn index(&self) -> Vec<NaiveDateTime> {
        self.rows.iter().map(|row| row.time).collect()
    }

    pub fn field_position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// All cells of one field in chronological order
    pub fn column(&self, field: &str) -> Option<Vec<Option<f64>>> {
        let pos = self.field_position(field)?;
        Some(self.rows.iter().map(|row| row.values[pos]).collect())
    }

    /// Cell at an exact timestamp, `None` if the timestamp or the value is absent
    pub fn value_at(&self, time: NaiveDateTime, field: &str) -> Option<f64> {
        let pos = self.field_position(field)?;
        let row = self.rows.binary_search_by_key(&time, |row| row.time).ok()?;
        self.rows[row].values[pos]
    }

    /// Table restricted to the given fields, in the given order
    pub fn select(&self, fields: &[&str]) -> Result<Self> {
        let positions = fields
            .iter()
            .map(|field| {
                self.field_position(field).ok_or_else(|| {
                    Error::NotFound(format!("field '{}' in table for {}", field, self.symbol))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| TimeSeriesRow::new(row.time, positions.iter().map(|&p| row.values[p]).collect()))
            .collect();

        Ok(Self {
            symbol: self.symbol.clone(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            rows,
        })
    }

    /// Same data under another symbol
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 2, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn fields() -> Vec<String> {
        vec!["open".to_string(), "close".to_string()]
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let rows = vec![
            TimeSeriesRow::observed(day(2), &[1.0, 2.0]),
            TimeSeriesRow::observed(day(1), &[1.0, 2.0]),
        ];
        let err = TimeSeriesTable::new("AAPL", fields(), rows).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_duplicate_timestamps() {
        let rows = vec![
            TimeSeriesRow::observed(day(1), &[1.0, 2.0]),
            TimeSeriesRow::observed(day(1), &[3.0, 4.0]),
        ];
        assert!(TimeSeriesTable::new("AAPL", fields(), rows).is_err());
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let rows = vec![TimeSeriesRow::observed(day(1), &[1.0])];
        assert!(TimeSeriesTable::new("AAPL", fields(), rows).is_err());
    }

    #[test]
    fn test_from_unsorted_sorts_rows() {
        let rows = vec![
            TimeSeriesRow::observed(day(3), &[3.0, 3.5]),
            TimeSeriesRow::observed(day(1), &[1.0, 1.5]),
        ];
        let table = TimeSeriesTable::from_unsorted("AAPL", fields(), rows).unwrap();
        assert_eq!(table.index(), vec![day(1), day(3)]);
        assert_eq!(table.value_at(day(3), "close"), Some(3.5));
        assert_eq!(table.value_at(day(2), "close"), None);
    }

    #[test]
    fn test_select_reorders_fields() {
        let rows = vec![TimeSeriesRow::observed(day(1), &[1.0, 2.0])];
        let table = TimeSeriesTable::new("AAPL", fields(), rows).unwrap();
        let selected = table.select(&["close", "open"]).unwrap();
        assert_eq!(selected.fields(), &["close".to_string(), "open".to_string()]);
        assert_eq!(selected.rows()[0].values, vec![Some(2.0), Some(1.0)]);
        assert!(table.select(&["volume"]).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"symbol":"AAPL","fields":["open"],"rows":[
            {"time":"2018-02-02T00:00:00","values":[1.0]},
            {"time":"2018-02-01T00:00:00","values":[null]}]}"#;
        assert!(serde_json::from_str::<TimeSeriesTable>(json).is_err());

        let json = r#"{"symbol":"AAPL","fields":["open"],"rows":[
            {"time":"2018-02-01T00:00:00","values":[null]},
            {"time":"2018-02-02T00:00:00","values":[1.0]}]}"#;
        let table: TimeSeriesTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.column("open").unwrap(), vec![None, Some(1.0)]);
    }
}
