//! Intraday scraping onto the index's trading clock

use tracing::{info, warn};

use crate::constants::INDEX_SYMBOL;
use crate::error::{Error, Result};
use crate::models::{QuoteConfig, TimeSeriesTable};
use crate::services::aligner::reindex_table;
use crate::services::quote_client::{QuoteClient, QuoteUnavailable};

/// Result of one intraday scrape
#[derive(Debug, Clone)]
pub struct IntradayScrape {
    /// Per-symbol bars reindexed onto the index timestamps, in request order
    pub tables: Vec<TimeSeriesTable>,

    /// Symbols that could not be fetched
    pub unavailable: Vec<QuoteUnavailable>,

    /// Share of requested symbols that could not be fetched, in percent
    pub unavailable_percent: f64,
}

/// Fetch the index to obtain the canonical timestamps, then every symbol
///
/// Symbols are fetched one at a time. A failed symbol is logged and skipped; a failed index
/// fetch aborts the scrape since there is nothing to align onto.
pub async fn scrape_intraday(
    client: &QuoteClient,
    symbols: &[String],
    config: &QuoteConfig,
) -> Result<IntradayScrape> {
    let index_table = client
        .fetch_quotes(INDEX_SYMBOL, &config.range, config.interval, config.timezone)
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    let index = index_table.index();
    info!("Index {} provided {} intraday timestamps", INDEX_SYMBOL, index.len());

    let mut tables = Vec::with_capacity(symbols.len());
    let mut unavailable = Vec::new();

    for symbol in symbols {
        match client
            .fetch_quotes(symbol, &config.range, config.interval, config.timezone)
            .await
        {
            Ok(table) => {
                let reindexed = reindex_table(&table, &index)?;
                info!("{}: {} bars", symbol, reindexed.len());
                tables.push(reindexed);
            }
            Err(e) => {
                warn!("data for {} is unavailable: {}", symbol, e.reason);
                unavailable.push(e);
            }
        }
    }

    let unavailable_percent = unavailable_percent(unavailable.len(), symbols.len());
    info!("{:.1}% of companies are unavailable", unavailable_percent);

    Ok(IntradayScrape {
        tables,
        unavailable,
        unavailable_percent,
    })
}

pub fn unavailable_percent(unavailable: usize, requested: usize) -> f64 {
    if requested == 0 {
        0.0
    } else {
        100.0 * unavailable as f64 / requested as f64
    }
}
