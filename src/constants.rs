//! Dataset and endpoint constants
//!
//! ## Historical CSV layout
//!
//! Per-symbol daily files (`{SYMBOL}_data.csv`):
//! `date,open,high,low,close,volume,Name`
//!
//! Index history file (`S&P 500 Historical Data.csv`):
//! `Date,Price,Open,High,Low,Vol.,Change %`

/// Fields kept from every quote payload and per-symbol CSV, in column order
pub const QUOTE_FIELDS: &[&str] = &["open", "high", "low", "close", "volume"];

/// Number of trailing dataset columns used as regression targets
pub const LABEL_COLUMNS: usize = 4;

/// Index history fields appended to the feature table as targets
///
/// They become the last [`LABEL_COLUMNS`] dataset columns, so the split reports them as
/// `Open, High, Low, Price`.
pub const INDEX_LABEL_KEYS: &[&str] = &["Price", "Low", "High", "Open"];

/// Sentinel for cells that precede the first observation of a column
pub const LEADING_GAP_SENTINEL: f64 = 0.0;

/// Guard added to the standard deviation in z-score normalization
pub const Z_SCORE_EPSILON: f64 = 1e-8;

/// Default train/test split fraction
pub const DEFAULT_SPLIT_FRACTION: f64 = 0.90;

/// Yahoo chart endpoint; the symbol is appended to the path
pub const DEFAULT_QUOTES_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";

/// Symbol of the index used as the canonical intraday clock
pub const INDEX_SYMBOL: &str = "^GSPC";

/// Column name of the symbol column dropped from per-symbol CSV files
pub const CSV_NAME_COLUMN: &str = "Name";

/// Suffix of per-symbol daily CSV files
pub const CSV_SYMBOL_SUFFIX: &str = "_data.csv";

/// Symbol given to the index history table; prefixes its columns after alignment
pub const INDEX_HISTORY_SYMBOL: &str = "SP500";
