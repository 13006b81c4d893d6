use chrono::DateTime;
use chrono_tz::Tz;
use serde_json::Value;
use thiserror::Error as ThisError;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::constants::QUOTE_FIELDS;
use crate::error::{Error, Result};
use crate::models::{QuoteConfig, QuoteInterval, QuoteRange, RetryPolicy, TimeSeriesRow, TimeSeriesTable};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Why a symbol's quotes could not be obtained
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum UnavailableReason {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Http(u16),

    #[error("chart error: {0}")]
    ChartError(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no data in response")]
    NoData,
}

/// A symbol whose fetch failed; callers exclude it from alignment
#[derive(ThisError, Debug, Clone, PartialEq)]
#[error("quotes for {symbol} unavailable: {reason}")]
pub struct QuoteUnavailable {
    pub symbol: String,
    pub reason: UnavailableReason,
}

impl QuoteUnavailable {
    fn new(symbol: &str, reason: UnavailableReason) -> Self {
        Self {
            symbol: symbol.to_string(),
            reason,
        }
    }
}

/// Client for the chart endpoint (`{base_url}{symbol}?range=..&interval=..`)
#[derive(Clone)]
pub struct QuoteClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl QuoteClient {
    pub fn new(config: &QuoteConfig) -> Result<Self> {
        let base_url = config.base_url.trim().to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                base_url
            )));
        }
        if config.retry.max_attempts == 0 {
            return Err(Error::Config("retry policy needs at least one attempt".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            "Created QuoteClient: base_url='{}', timeout={:?}, max_attempts={}",
            base_url, config.timeout, config.retry.max_attempts
        );

        Ok(Self {
            client,
            base_url,
            retry: config.retry.clone(),
        })
    }

    /// Fetch one symbol's bars, converted to naive local time in `timezone`
    ///
    /// Never fails hard: every failure mode is reported as [`QuoteUnavailable`].
    pub async fn fetch_quotes(
        &self,
        symbol: &str,
        range: &QuoteRange,
        interval: QuoteInterval,
        timezone: Tz,
    ) -> std::result::Result<TimeSeriesTable, QuoteUnavailable> {
        let url = format!("{}{}", self.base_url, symbol);
        let query = [("range", range.as_str()), ("interval", interval.to_api_format())];

        debug!("Fetching quotes: url={}, range={}, interval={}", url, range, interval);

        let body = self.get_with_retry(symbol, &url, &query).await?;
        let table = parse_chart_response(symbol, &body, timezone)?;

        info!("Fetched {} bars for {}", table.len(), symbol);
        Ok(table)
    }

    async fn get_with_retry(
        &self,
        symbol: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<Value, QuoteUnavailable> {
        let mut last_error: Option<String> = None;

        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt);
                info!(
                    "Quote retry backoff for {}: attempt {}/{} - reason: {}, waiting {:.1}s before retry",
                    symbol,
                    attempt + 1,
                    self.retry.max_attempts,
                    last_error.as_deref().unwrap_or("unknown error"),
                    delay.as_secs_f64()
                );
                sleep(delay).await;
            }

            let response = match self.client.get(url).query(query).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(format!("Network error: {}", e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(format!("HTTP error ({})", status.as_u16()));
                continue;
            }

            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    last_error = Some(format!("Response body error: {}", e));
                    continue;
                }
            };

            if status.is_success() {
                return serde_json::from_str::<Value>(&text).map_err(|e| {
                    QuoteUnavailable::new(symbol, UnavailableReason::Malformed(format!("JSON parse error: {}", e)))
                });
            }

            // Client errors are not retried; the body usually carries a chart error.
            if let Ok(body) = serde_json::from_str::<Value>(&text) {
                if let Some(err) = chart_error(&body) {
                    return Err(QuoteUnavailable::new(symbol, UnavailableReason::ChartError(err)));
                }
            }
            return Err(QuoteUnavailable::new(symbol, UnavailableReason::Http(status.as_u16())));
        }

        let reason = last_error.unwrap_or_else(|| "Max retries exceeded".to_string());
        warn!("Giving up on {} after {} attempts: {}", symbol, self.retry.max_attempts, reason);
        Err(QuoteUnavailable::new(symbol, UnavailableReason::Network(reason)))
    }
}

fn chart_error(body: &Value) -> Option<String> {
    let error = body.get("chart")?.get("error")?;
    if error.is_null() {
        return None;
    }
    Some(
        error
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
    )
}

/// Convert a chart payload into a table of `open, high, low, close, volume`
///
/// `null` prices stay missing cells; timestamps are epoch seconds in UTC.
pub fn parse_chart_response(
    symbol: &str,
    body: &Value,
    timezone: Tz,
) -> std::result::Result<TimeSeriesTable, QuoteUnavailable> {
    let malformed = |msg: &str| QuoteUnavailable::new(symbol, UnavailableReason::Malformed(msg.to_string()));

    let chart = body.get("chart").ok_or_else(|| malformed("missing 'chart'"))?;
    if let Some(err) = chart_error(body) {
        return Err(QuoteUnavailable::new(symbol, UnavailableReason::ChartError(err)));
    }

    let result = chart
        .get("result")
        .and_then(Value::as_array)
        .and_then(|results| results.first())
        .ok_or_else(|| QuoteUnavailable::new(symbol, UnavailableReason::NoData))?;

    let timestamps = result
        .get("timestamp")
        .and_then(Value::as_array)
        .ok_or_else(|| QuoteUnavailable::new(symbol, UnavailableReason::NoData))?;

    let quote = result
        .get("indicators")
        .and_then(|i| i.get("quote"))
        .and_then(Value::as_array)
        .and_then(|q| q.first())
        .ok_or_else(|| malformed("missing 'indicators.quote[0]'"))?;

    let columns = QUOTE_FIELDS
        .iter()
        .map(|field| {
            let values = quote
                .get(*field)
                .and_then(Value::as_array)
                .ok_or_else(|| malformed(&format!("missing '{}' array", field)))?;
            if values.len() != timestamps.len() {
                return Err(malformed(&format!(
                    "'{}' has {} values for {} timestamps",
                    field,
                    values.len(),
                    timestamps.len()
                )));
            }
            Ok(values)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rows = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let secs = ts
            .as_i64()
            .ok_or_else(|| malformed(&format!("timestamp {} is not an integer", ts)))?;
        let time = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| malformed(&format!("timestamp {} out of range", secs)))?
            .with_timezone(&timezone)
            .naive_local();
        let values = columns.iter().map(|column| column[i].as_f64()).collect();
        rows.push(TimeSeriesRow::new(time, values));
    }

    let fields = QUOTE_FIELDS.iter().map(|f| f.to_string()).collect();
    TimeSeriesTable::new(symbol, fields, rows).map_err(|e| malformed(&e.to_string()))
}
