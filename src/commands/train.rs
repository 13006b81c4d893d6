use crate::ml::ModelKind;
use crate::services;

use super::load_config;

pub fn run(model: String, pca: Option<usize>) {
    let config = load_config();

    let kind = match model.parse::<ModelKind>() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    println!("🧠 Training {} on {}", kind, config.checkpoint_path.display());
    if let Some(n) = pca {
        println!("   Projecting features onto {} principal components", n);
    }

    let regressor = kind.build();
    let outcome = match services::train(&config, regressor.as_ref(), pca) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("\n❌ Training failed: {}", e);
            std::process::exit(1);
        }
    };

    match outcome.intraday_tables {
        Some(n) => println!("   Intraday cache: {} tables", n),
        None => println!("   Intraday cache: not found (run 'scrape' to create it)"),
    }
    if let Some(params) = &outcome.best_params {
        println!("   Best parameters: {}", params);
    }

    println!("\n═══════════════════════════════════════════════════════════");
    println!("{:<16} {:>12} {:>10} {:>12} {:>10}", "label", "train rmse", "train r2", "test rmse", "test r2");
    for m in &outcome.metrics {
        println!(
            "{:<16} {:>12.4} {:>10.4} {:>12.4} {:>10.4}",
            m.label, m.train_rmse, m.train_r2, m.test_rmse, m.test_r2
        );
    }
    println!("═══════════════════════════════════════════════════════════\n");

    println!("🔁 Prediction lag (train vs test cross-correlation): {}", outcome.lag);
    println!("📝 Wrote {} reports to {}", outcome.reports.len(), config.report_dir.display());
    println!("✅ Training completed with {}", outcome.model);
}
