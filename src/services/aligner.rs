//! Merge per-symbol time series onto one canonical date index

use chrono::NaiveDateTime;
use ndarray::{s, Array2};
use tracing::{debug, info};

use crate::constants::LEADING_GAP_SENTINEL;
use crate::error::{Error, Result};
use crate::models::{AlignedDataset, TimeSeriesRow, TimeSeriesTable};

/// Reindex every table onto `canonical_index`, forward fill, and join them in order
///
/// Columns are named `{symbol}_{field}`. Symbols that failed to load are simply absent from
/// `tables` and therefore absent from the result.
pub fn align(tables: &[TimeSeriesTable], canonical_index: &[NaiveDateTime]) -> Result<AlignedDataset> {
    let mut dataset = AlignedDataset::empty(canonical_index.to_vec())?;

    for table in tables {
        let reindexed = reindex_forward_fill(table, canonical_index)?;
        dataset = dataset.join(reindexed)?;
    }

    info!(
        "Aligned {} tables onto {} timestamps ({} columns)",
        tables.len(),
        dataset.nrows(),
        dataset.ncols()
    );
    Ok(dataset)
}

/// One table reindexed onto `index` with gaps forward filled
///
/// Source rows whose timestamp is not in `index` are dropped. A gap takes the last value
/// observed at an earlier index position; gaps before the first observation stay missing.
pub fn reindex_table(table: &TimeSeriesTable, index: &[NaiveDateTime]) -> Result<TimeSeriesTable> {
    let source = table.rows();
    let mut last: Vec<Option<f64>> = vec![None; table.fields().len()];
    let mut rows = Vec::with_capacity(index.len());
    let mut matched = 0usize;

    for time in index {
        if let Ok(pos) = source.binary_search_by_key(time, |row| row.time) {
            matched += 1;
            for (slot, value) in last.iter_mut().zip(&source[pos].values) {
                if value.is_some() {
                    *slot = *value;
                }
            }
        }
        rows.push(TimeSeriesRow::new(*time, last.clone()));
    }

    debug!(
        "Reindexed {}: {} of {} timestamps present in source",
        table.symbol(),
        matched,
        index.len()
    );
    TimeSeriesTable::new(table.symbol(), table.fields().to_vec(), rows)
}

/// [`reindex_table`] as dense `{symbol}_{field}` columns, leading gaps set to
/// [`LEADING_GAP_SENTINEL`]
pub fn reindex_forward_fill(table: &TimeSeriesTable, index: &[NaiveDateTime]) -> Result<AlignedDataset> {
    let reindexed = reindex_table(table, index)?;
    let fields = reindexed.fields();

    let mut values = Array2::from_elem((index.len(), fields.len()), LEADING_GAP_SENTINEL);
    for (i, row) in reindexed.rows().iter().enumerate() {
        for (j, value) in row.values.iter().enumerate() {
            if let Some(v) = value {
                values[[i, j]] = *v;
            }
        }
    }

    let columns = fields
        .iter()
        .map(|field| format!("{}_{}", table.symbol(), field))
        .collect();
    AlignedDataset::new(index.to_vec(), columns, values)
}

/// Append index history fields as target columns, `lead` rows ahead of the features
///
/// Row `t` of the result holds the features of `t` and the index values of `t + lead`; the
/// last `lead` rows have no target and are dropped.
pub fn attach_index_columns(
    dataset: AlignedDataset,
    index_table: &TimeSeriesTable,
    keys: &[String],
    lead: usize,
) -> Result<AlignedDataset> {
    let rows = dataset.nrows();
    if lead >= rows {
        return Err(Error::InsufficientData(format!(
            "cannot lead {} rows ahead in a dataset of {} rows",
            lead, rows
        )));
    }

    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    let targets = reindex_forward_fill(&index_table.select(&keys)?, dataset.index())?;

    let kept = rows - lead;
    let features = dataset.slice_rows(0, kept)?;
    let shifted = AlignedDataset::new(
        features.index().to_vec(),
        targets.columns().to_vec(),
        targets.values().slice(s![lead.., ..]).to_owned(),
    )?;

    features.join(shifted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 2, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn table(symbol: &str, rows: Vec<TimeSeriesRow>) -> TimeSeriesTable {
        TimeSeriesTable::new(symbol, vec!["open".to_string(), "close".to_string()], rows).unwrap()
    }

    #[test]
    fn test_preserves_observed_values() {
        let t = table(
            "AAPL",
            vec![
                TimeSeriesRow::observed(day(1), &[1.0, 1.5]),
                TimeSeriesRow::observed(day(3), &[3.0, 3.5]),
                TimeSeriesRow::observed(day(6), &[6.0, 6.5]),
            ],
        );
        let index: Vec<_> = (1..=6).map(day).collect();
        let ds = align(&[t.clone()], &index).unwrap();

        for row in t.rows() {
            let pos = index.iter().position(|d| *d == row.time).unwrap();
            assert_eq!(ds.values()[[pos, 0]], row.values[0].unwrap());
            assert_eq!(ds.values()[[pos, 1]], row.values[1].unwrap());
        }
    }

    #[test]
    fn test_forward_fill_and_leading_sentinel() {
        let t = table(
            "AAPL",
            vec![
                TimeSeriesRow::observed(day(2), &[2.0, 2.5]),
                TimeSeriesRow::new(day(4), vec![None, Some(4.5)]),
            ],
        );
        let index: Vec<_> = (1..=5).map(day).collect();
        let ds = align(&[t], &index).unwrap();

        assert_eq!(ds.column("AAPL_open").unwrap().to_vec(), vec![0.0, 2.0, 2.0, 2.0, 2.0]);
        assert_eq!(ds.column("AAPL_close").unwrap().to_vec(), vec![0.0, 2.5, 2.5, 4.5, 4.5]);
    }

    #[test]
    fn test_failed_symbol_excluded_partial_symbol_kept() {
        let full = table(
            "AAPL",
            (1..=4).map(|d| TimeSeriesRow::observed(day(d), &[d as f64, d as f64])).collect(),
        );
        let partial = table("MSFT", vec![TimeSeriesRow::observed(day(2), &[20.0, 21.0])]);
        let index: Vec<_> = (1..=4).map(day).collect();

        // GOOG failed to fetch, so it is never passed in
        let ds = align(&[full, partial], &index).unwrap();
        assert_eq!(
            ds.columns(),
            &["AAPL_open", "AAPL_close", "MSFT_open", "MSFT_close"].map(String::from)
        );
        assert!(ds.column("GOOG_open").is_none());
        assert_eq!(ds.column("MSFT_close").unwrap().to_vec(), vec![0.0, 21.0, 21.0, 21.0]);
    }

    #[test]
    fn test_reindex_table_keeps_leading_gap_missing() {
        let t = table(
            "AAPL",
            vec![
                TimeSeriesRow::observed(day(2), &[2.0, 2.5]),
                TimeSeriesRow::new(day(3), vec![Some(3.0), None]),
            ],
        );
        let index: Vec<_> = (1..=4).map(day).collect();
        let reindexed = reindex_table(&t, &index).unwrap();
        assert_eq!(reindexed.symbol(), "AAPL");
        assert_eq!(reindexed.index(), index);
        assert_eq!(
            reindexed.column("close").unwrap(),
            vec![None, Some(2.5), Some(2.5), Some(2.5)]
        );
        assert_eq!(
            reindexed.column("open").unwrap(),
            vec![None, Some(2.0), Some(3.0), Some(3.0)]
        );
    }

    #[test]
    fn test_source_dates_outside_index_dropped() {
        let t = table(
            "AAPL",
            vec![
                TimeSeriesRow::observed(day(1), &[1.0, 1.0]),
                TimeSeriesRow::observed(day(2), &[2.0, 2.0]),
                TimeSeriesRow::observed(day(3), &[3.0, 3.0]),
            ],
        );
        let ds = align(&[t], &[day(1), day(3)]).unwrap();
        assert_eq!(ds.nrows(), 2);
        assert_eq!(ds.column("AAPL_open").unwrap().to_vec(), vec![1.0, 3.0]);
    }

    #[test]
    fn test_duplicate_symbol_rejected() {
        let t = table("AAPL", vec![TimeSeriesRow::observed(day(1), &[1.0, 1.0])]);
        assert!(matches!(
            align(&[t.clone(), t], &[day(1)]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unsorted_index_rejected() {
        let t = table("AAPL", vec![TimeSeriesRow::observed(day(1), &[1.0, 1.0])]);
        assert!(align(&[t], &[day(2), day(1)]).is_err());
    }

    #[test]
    fn test_attach_index_columns_leads_one_day() {
        let t = table(
            "AAPL",
            (1..=3).map(|d| TimeSeriesRow::observed(day(d), &[d as f64, d as f64])).collect(),
        );
        let index: Vec<_> = (1..=3).map(day).collect();
        let ds = align(&[t], &index).unwrap();

        let sp = TimeSeriesTable::new(
            "SP500",
            vec!["Price".to_string(), "Low".to_string()],
            (1..=3)
                .map(|d| TimeSeriesRow::observed(day(d), &[100.0 * d as f64, 90.0 * d as f64]))
                .collect(),
        )
        .unwrap();

        let keys = vec!["Low".to_string(), "Price".to_string()];
        let joined = attach_index_columns(ds, &sp, &keys, 1).unwrap();
        assert_eq!(joined.nrows(), 2);
        assert_eq!(joined.index(), &[day(1), day(2)]);
        assert_eq!(
            joined.columns(),
            &["AAPL_open", "AAPL_close", "SP500_Low", "SP500_Price"].map(String::from)
        );
        // day 1 features paired with day 2 index values
        assert_eq!(joined.values().row(0).to_vec(), vec![1.0, 1.0, 180.0, 200.0]);
    }

    #[test]
    fn test_attach_index_columns_errors() {
        let t = table("AAPL", vec![TimeSeriesRow::observed(day(1), &[1.0, 1.0])]);
        let ds = align(&[t.clone()], &[day(1)]).unwrap();
        assert!(matches!(
            attach_index_columns(ds.clone(), &t, &["open".to_string()], 1),
            Err(Error::InsufficientData(_))
        ));
        assert!(attach_index_columns(ds, &t, &["Missing".to_string()], 0).is_err());
    }
}
