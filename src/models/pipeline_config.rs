use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DEFAULT_QUOTES_BASE_URL, DEFAULT_SPLIT_FRACTION, INDEX_LABEL_KEYS};
use crate::error::{Error, Result};
use crate::models::{QuoteInterval, QuoteRange};
use crate::utils::{env_path, env_string};

/// Retry behaviour for quote requests
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first request
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles on every further attempt
    pub base_delay: Duration,

    /// Upper bound for a single backoff delay
    pub max_delay: Duration,

    /// Add up to one second of random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before `attempt` (0-based); zero for the first attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2.0_f64.powi((attempt - 1).min(63) as i32);
        let jitter = if self.jitter { rand::random::<f64>() } else { 0.0 };
        let secs = (self.base_delay.as_secs_f64() * factor + jitter).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Chart endpoint configuration
#[derive(Debug, Clone)]
pub struct QuoteConfig {
    /// Endpoint prefix; the symbol is appended
    pub base_url: String,

    /// Timezone the epoch timestamps are converted into
    pub timezone: Tz,

    /// Look-back window for intraday scraping
    pub range: QuoteRange,

    /// Bar interval for intraday scraping
    pub interval: QuoteInterval,

    /// Per-request timeout
    pub timeout: Duration,

    pub retry: RetryPolicy,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_QUOTES_BASE_URL.to_string(),
            timezone: chrono_tz::EST,
            range: QuoteRange::default(),
            interval: QuoteInterval::default(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Configuration for the whole forecasting pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory holding `{SYMBOL}_data.csv` files
    pub stocks_dir: PathBuf,

    /// Index history CSV providing the label columns
    pub index_file: PathBuf,

    /// Symbol whose dates form the canonical daily index
    pub reference_symbol: String,

    /// Pipeline checkpoint (train/test matrices + symbols)
    pub checkpoint_path: PathBuf,

    /// Intraday cache file
    pub intraday_cache: PathBuf,

    /// Directory for prediction reports
    pub report_dir: PathBuf,

    /// Fraction of rows used for training
    pub split_fraction: f64,

    /// Rows between a feature row and the index row it is paired with
    pub label_lead: usize,

    /// Index history fields appended as targets
    pub index_label_keys: Vec<String>,

    pub quotes: QuoteConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stocks_dir: PathBuf::from("stocks"),
            index_file: PathBuf::from("stocks").join("S&P 500 Historical Data.csv"),
            reference_symbol: "AAPL".to_string(),
            checkpoint_path: PathBuf::from("model.json"),
            intraday_cache: PathBuf::from("intra_day_data.json"),
            report_dir: PathBuf::from("reports"),
            split_fraction: DEFAULT_SPLIT_FRACTION,
            label_lead: 1,
            index_label_keys: INDEX_LABEL_KEYS.iter().map(|k| k.to_string()).collect(),
            quotes: QuoteConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by environment variables
    ///
    /// `STOCKS_DIR`, `INDEX_FILE`, `REFERENCE_SYMBOL`, `CHECKPOINT_FILE`, `INTRADAY_CACHE`,
    /// `REPORT_DIR`, `SPLIT_FRACTION`, `QUOTES_BASE_URL`, `QUOTES_TIMEZONE`
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let stocks_dir = env_path("STOCKS_DIR", defaults.stocks_dir);
        let index_file = env_path(
            "INDEX_FILE",
            stocks_dir.join("S&P 500 Historical Data.csv"),
        );

        let split_fraction = match env_string("SPLIT_FRACTION") {
            Some(raw) => raw
                .parse::<f64>()
                .map_err(|e| Error::Config(format!("SPLIT_FRACTION '{}': {}", raw, e)))?,
            None => defaults.split_fraction,
        };

        let timezone = match env_string("QUOTES_TIMEZONE") {
            Some(raw) => raw
                .parse::<Tz>()
                .map_err(|e| Error::Config(format!("QUOTES_TIMEZONE '{}': {}", raw, e)))?,
            None => defaults.quotes.timezone,
        };

        let config = Self {
            stocks_dir,
            index_file,
            reference_symbol: env_string("REFERENCE_SYMBOL").unwrap_or(defaults.reference_symbol),
            checkpoint_path: env_path("CHECKPOINT_FILE", defaults.checkpoint_path),
            intraday_cache: env_path("INTRADAY_CACHE", defaults.intraday_cache),
            report_dir: env_path("REPORT_DIR", defaults.report_dir),
            split_fraction,
            quotes: QuoteConfig {
                base_url: env_string("QUOTES_BASE_URL").unwrap_or(defaults.quotes.base_url),
                timezone,
                ..defaults.quotes
            },
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.split_fraction > 0.0 && self.split_fraction < 1.0) {
            return Err(Error::Config(format!(
                "split fraction must be in (0, 1), got {}",
                self.split_fraction
            )));
        }
        if self.quotes.retry.max_attempts == 0 {
            return Err(Error::Config("retry policy needs at least one attempt".to_string()));
        }
        if !self.quotes.base_url.starts_with("http://") && !self.quotes.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                self.quotes.base_url
            )));
        }
        Ok(())
    }
}
