//! Historical CSV loading
//!
//! Two layouts are supported:
//! - per-symbol daily files `{SYMBOL}_data.csv`: `date,open,high,low,close,volume,Name`
//! - the index history export: `Date,Price,Open,High,Low,Vol.,Change %`, with quoted
//!   numbers such as `"2,695.81"`, volumes like `1.23B` and percent strings like `-0.45%`

use chrono::{NaiveDate, NaiveDateTime};
use csv::{Reader, StringRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{CSV_NAME_COLUMN, CSV_SYMBOL_SUFFIX, QUOTE_FIELDS};
use crate::error::{Error, Result};
use crate::models::{TimeSeriesRow, TimeSeriesTable};

/// Field names of a loaded index history table
pub const INDEX_HISTORY_FIELDS: &[&str] = &["Price", "Open", "High", "Low", "Volume", "Change"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%m/%d/%Y"];

/// Path of a symbol's daily file
pub fn symbol_path(stocks_dir: &Path, symbol: &str) -> PathBuf {
    stocks_dir.join(format!("{}{}", symbol, CSV_SYMBOL_SUFFIX))
}

/// Symbols with a daily file in `stocks_dir`, sorted
pub fn list_symbols(stocks_dir: &Path) -> Result<Vec<String>> {
    let mut symbols = Vec::new();
    for entry in fs::read_dir(stocks_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(symbol) = name.strip_suffix(CSV_SYMBOL_SUFFIX) {
            if !symbol.is_empty() {
                symbols.push(symbol.to_string());
            }
        }
    }
    symbols.sort();
    debug!("Found {} symbol files in {}", symbols.len(), stocks_dir.display());
    Ok(symbols)
}

/// Load one symbol's daily file; the `Name` column is dropped
pub fn load_symbol_csv(path: &Path, symbol: &str) -> Result<TimeSeriesTable> {
    let mut reader = Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let date_col = header_position(&headers, "date", path)?;
    let field_cols = QUOTE_FIELDS
        .iter()
        .map(|field| header_position(&headers, field, path))
        .collect::<Result<Vec<_>>>()?;
    if headers.iter().all(|h| h.trim() != CSV_NAME_COLUMN) {
        debug!("{} has no '{}' column", path.display(), CSV_NAME_COLUMN);
    }

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let time = parse_date(record.get(date_col).unwrap_or(""))
            .map_err(|e| Error::Parse(format!("{} line {}: {}", path.display(), line + 2, e)))?;
        let values = field_cols
            .iter()
            .map(|&col| parse_number(record.get(col).unwrap_or("")))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| Error::Parse(format!("{} line {}: {}", path.display(), line + 2, e)))?;
        rows.push(TimeSeriesRow::new(time, values));
    }

    let fields = QUOTE_FIELDS.iter().map(|f| f.to_string()).collect();
    TimeSeriesTable::from_unsorted(symbol, fields, rows)
}

/// Load every listed symbol from `stocks_dir`
pub fn load_symbols(stocks_dir: &Path, symbols: &[String]) -> Result<Vec<TimeSeriesTable>> {
    symbols
        .iter()
        .map(|symbol| {
            let table = load_symbol_csv(&symbol_path(stocks_dir, symbol), symbol)?;
            if table.is_empty() {
                warn!("{} has no rows", symbol);
            }
            Ok(table)
        })
        .collect()
}

/// Dates of the reference symbol, which every other series is aligned onto
pub fn canonical_index(stocks_dir: &Path, reference_symbol: &str) -> Result<Vec<NaiveDateTime>> {
    let path = symbol_path(stocks_dir, reference_symbol);
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "reference symbol file {}",
            path.display()
        )));
    }
    let index = load_symbol_csv(&path, reference_symbol)?.index();
    info!("Canonical index from {}: {} dates", reference_symbol, index.len());
    Ok(index)
}

/// Load the index history export, sorted oldest first
pub fn load_index_history(path: &Path, symbol: &str) -> Result<TimeSeriesTable> {
    let mut reader = Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let date_col = header_position(&headers, "Date", path)?;
    let price_cols = ["Price", "Open", "High", "Low"]
        .iter()
        .map(|h| header_position(&headers, h, path))
        .collect::<Result<Vec<_>>>()?;
    let volume_col = header_position(&headers, "Vol.", path)?;
    let change_col = header_position(&headers, "Change %", path)?;

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let context = |e: Error| Error::Parse(format!("{} line {}: {}", path.display(), line + 2, e));

        let time = parse_date(record.get(date_col).unwrap_or("")).map_err(context)?;
        let mut values = price_cols
            .iter()
            .map(|&col| parse_number(record.get(col).unwrap_or("")))
            .collect::<Result<Vec<_>>>()
            .map_err(context)?;
        values.push(parse_volume(record.get(volume_col).unwrap_or("")).map_err(context)?);
        values.push(Some(percent_to_float(record.get(change_col).unwrap_or("")).map_err(context)?));
        rows.push(TimeSeriesRow::new(time, values));
    }

    info!("Loaded {} rows of index history from {}", rows.len(), path.display());
    let fields = INDEX_HISTORY_FIELDS.iter().map(|f| f.to_string()).collect();
    TimeSeriesTable::from_unsorted(symbol, fields, rows)
}

fn header_position(headers: &StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim().trim_start_matches('\u{feff}') == name)
        .ok_or_else(|| Error::Parse(format!("{} is missing column '{}'", path.display(), name)))
}

fn parse_date(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::Parse(format!("unrecognized date '{}'", raw)))
}

/// Number with optional thousands separators; empty cells are missing
pub fn parse_number(raw: &str) -> Result<Option<f64>> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() || cleaned == "-" {
        return Ok(None);
    }
    cleaned
        .parse::<f64>()
        .map(Some)
        .map_err(|_| Error::Parse(format!("invalid number '{}'", raw)))
}

/// Volume such as `1.23B`, `850.5M`, `12K` or a plain number; `-` is missing
pub fn parse_volume(raw: &str) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    let (digits, scale) = match trimmed.chars().last() {
        Some('K') | Some('k') => (&trimmed[..trimmed.len() - 1], 1e3),
        Some('M') | Some('m') => (&trimmed[..trimmed.len() - 1], 1e6),
        Some('B') | Some('b') => (&trimmed[..trimmed.len() - 1], 1e9),
        _ => (trimmed, 1.0),
    };
    Ok(parse_number(digits)?.map(|v| v * scale))
}

/// `"-0.45%"` -> `-0.45`
pub fn percent_to_float(raw: &str) -> Result<f64> {
    let stripped = raw.trim().trim_end_matches('%');
    stripped
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Parse(format!("invalid percentage '{}'", raw)))
}
