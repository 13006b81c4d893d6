use std::path::Path;

use crate::models::PipelineConfig;
use crate::services::{self, IntradayCache, PipelineCheckpoint};

use super::load_config;

pub fn run() {
    let config = load_config();
    println!("📊 Forecast Pipeline Status\n");
    show_status(&config);
}

fn show_status(config: &PipelineConfig) {
    println!("═══════════════════════════════════════════════════════════\n");

    match services::list_symbols(&config.stocks_dir) {
        Ok(symbols) => println!(
            "📂 Stocks:     {} symbol files in {}",
            symbols.len(),
            config.stocks_dir.display()
        ),
        Err(e) => println!("⚠️  Stocks:     {} ({})", config.stocks_dir.display(), e),
    }
    println!("   Index:      {}", presence(&config.index_file));

    match PipelineCheckpoint::load(&config.checkpoint_path) {
        Ok(checkpoint) => {
            println!("\n💾 Checkpoint: {}", config.checkpoint_path.display());
            println!("   Symbols:    {}", checkpoint.company_listings.len());
            println!(
                "   Train:      {} x {} features, {} labels",
                checkpoint.x_train.nrows(),
                checkpoint.x_train.ncols(),
                checkpoint.y_train.ncols()
            );
            println!("   Test:       {} rows", checkpoint.x_test.nrows());
        }
        Err(e) => println!("\n⚠️  Checkpoint: {} ({})", config.checkpoint_path.display(), e),
    }

    match IntradayCache::load(&config.intraday_cache) {
        Ok(cache) => {
            let bars: usize = cache.hourly_data.iter().map(|t| t.len()).sum();
            println!(
                "\n⏱️  Intraday:   {} tables, {} bars ({})",
                cache.hourly_data.len(),
                bars,
                config.intraday_cache.display()
            );
        }
        Err(e) => println!("\n⚠️  Intraday:   {} ({})", config.intraday_cache.display(), e),
    }

    println!("\n═══════════════════════════════════════════════════════════\n");
    println!("💡 Tip: run 'prepare', then 'train', then 'diagnose'");
    println!("   Reports are written to {}", config.report_dir.display());
}

fn presence(path: &Path) -> String {
    if path.exists() {
        format!("{} ✓", path.display())
    } else {
        format!("{} (missing)", path.display())
    }
}
