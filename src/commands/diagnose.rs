use crate::services::{self, DiagnoseOptions};

use super::load_config;

pub fn run(partition_factor: usize, bins: usize, trend_beta: f64) {
    let config = load_config();
    let options = DiagnoseOptions {
        partition_factor,
        bins,
        trend_beta,
    };

    println!(
        "🔬 Residual diagnostics (partition factor {}, {} bins)",
        options.partition_factor, options.bins
    );

    let results = match services::diagnose(&config, options) {
        Ok(results) => results,
        Err(e) => {
            eprintln!("\n❌ Diagnostics failed: {}", e);
            eprintln!("   Run 'train' first to produce the fit reports.");
            std::process::exit(1);
        }
    };

    for result in &results {
        let d = &result.diagnostics;
        let verdict = if d.bartlett_p_value < 0.05 {
            "heteroscedastic"
        } else {
            "homoscedastic"
        };
        println!("\n🔹 {}", d.label);
        println!(
            "   Residual mean {:.4}, std {:.4} over {} observations",
            d.histogram.mean,
            d.histogram.std,
            d.scatter.len()
        );
        println!(
            "   Bartlett: statistic {:.4}, p-value {:.4} across {} groups ({})",
            d.bartlett_statistic, d.bartlett_p_value, d.bartlett_groups, verdict
        );
        println!("   Histogram: {}", result.histogram_path.display());
        println!("   Scatter:   {}", result.scatter_path.display());
    }

    println!("\n✅ Diagnosed {} labels", results.len());
}
