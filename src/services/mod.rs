pub mod aligner;
pub mod checkpoint;
pub mod csv_loader;
pub mod intraday;
pub mod pipeline;
pub mod quote_client;
pub mod report;
pub mod splitter;

pub use aligner::{align, attach_index_columns, reindex_forward_fill, reindex_table};
pub use checkpoint::{IntradayCache, PipelineCheckpoint};
pub use csv_loader::{canonical_index, list_symbols, load_index_history, load_symbol_csv, load_symbols};
pub use intraday::{scrape_intraday, IntradayScrape};
pub use pipeline::{diagnose, prepare, train, DiagnoseOptions, LabelMetrics, PreparedDataset, TrainingOutcome};
pub use quote_client::{parse_chart_response, QuoteClient, QuoteUnavailable, UnavailableReason};
pub use splitter::split;
