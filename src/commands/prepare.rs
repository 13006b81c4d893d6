use crate::services;

use super::load_config;

pub fn run() {
    let config = load_config();

    println!("📂 Preparing dataset from {}", config.stocks_dir.display());
    println!("   Reference symbol: {}", config.reference_symbol);
    println!("   Index history:    {}", config.index_file.display());

    let prepared = match services::prepare(&config) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("\n❌ Prepare failed: {}", e);
            std::process::exit(1);
        }
    };

    let checkpoint = &prepared.checkpoint;
    println!("\n✅ Aligned {} symbols over {} rows", checkpoint.company_listings.len(), prepared.rows);
    println!(
        "   Train: {} rows x {} features",
        checkpoint.x_train.nrows(),
        checkpoint.x_train.ncols()
    );
    println!("   Test:  {} rows", checkpoint.x_test.nrows());
    println!("   Labels: {}", checkpoint.label_names.join(", "));

    if !prepared.top_volume_correlations.is_empty() {
        println!(
            "\n📈 Volume most correlated with the index price: {}",
            prepared.top_volume_correlations.join(", ")
        );
    }

    println!("\n💾 Checkpoint saved to {}", config.checkpoint_path.display());
}
