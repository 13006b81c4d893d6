mod aligned_dataset;
mod feature_split;
mod pipeline_config;
mod quote_interval;
mod time_series;

pub use aligned_dataset::AlignedDataset;
pub use feature_split::{FeatureLabelSplit, Partition};
pub use pipeline_config::{PipelineConfig, QuoteConfig, RetryPolicy};
pub use quote_interval::{QuoteInterval, QuoteRange};
pub use time_series::{TimeSeriesRow, TimeSeriesTable};
