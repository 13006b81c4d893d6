use crate::error::Result;
use crate::models::{PipelineConfig, QuoteInterval, QuoteRange};
use crate::services::{self, IntradayCache, PipelineCheckpoint, QuoteClient};

use super::load_config;

pub fn run(range: Option<String>, interval: Option<String>) {
    let mut config = load_config();

    if let Some(raw) = range {
        match raw.parse::<QuoteRange>() {
            Ok(range) => config.quotes.range = range,
            Err(e) => {
                eprintln!("❌ Error parsing range: {}", e);
                eprintln!("   Valid options: <n>d, <n>wk, <n>mo, <n>y, ytd, max (e.g., 730d)");
                std::process::exit(1);
            }
        }
    }
    if let Some(raw) = interval {
        match raw.parse::<QuoteInterval>() {
            Ok(interval) => config.quotes.interval = interval,
            Err(e) => {
                eprintln!("❌ Error parsing interval: {}", e);
                eprintln!("   Valid options: 1m, 5m, 15m, 30m, 60m, 90m, 1h, 1d, 1wk, 1mo");
                std::process::exit(1);
            }
        }
    }

    let symbols = match scrape_symbols(&config) {
        Ok(symbols) => symbols,
        Err(e) => {
            eprintln!("❌ Could not determine symbols: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "🌐 Scraping {} symbols (range={}, interval={})",
        symbols.len(),
        config.quotes.range,
        config.quotes.interval
    );

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ Failed to create async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let scrape = match runtime.block_on(async {
        let client = QuoteClient::new(&config.quotes)?;
        services::scrape_intraday(&client, &symbols, &config.quotes).await
    }) {
        Ok(scrape) => scrape,
        Err(e) => {
            eprintln!("\n❌ Scrape failed: {}", e);
            std::process::exit(1);
        }
    };

    for unavailable in &scrape.unavailable {
        println!("⚠️  data for {} is unavailable ({})", unavailable.symbol, unavailable.reason);
    }
    println!(
        "\n📊 {:.1}% of companies are unavailable ({} of {})",
        scrape.unavailable_percent,
        scrape.unavailable.len(),
        symbols.len()
    );

    let tables = scrape.tables.len();
    if let Err(e) = IntradayCache::new(scrape.tables).save(&config.intraday_cache) {
        eprintln!("❌ Failed to write intraday cache: {}", e);
        std::process::exit(1);
    }
    println!("✅ Saved {} intraday tables to {}", tables, config.intraday_cache.display());
}

/// Symbols recorded in the checkpoint, or every symbol file when there is none yet
fn scrape_symbols(config: &PipelineConfig) -> Result<Vec<String>> {
    if config.checkpoint_path.exists() {
        let checkpoint = PipelineCheckpoint::load(&config.checkpoint_path)?;
        return Ok(checkpoint.company_listings);
    }
    services::list_symbols(&config.stocks_dir)
}
