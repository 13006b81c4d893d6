pub mod diagnose;
pub mod prepare;
pub mod scrape;
pub mod status;
pub mod train;

use crate::models::PipelineConfig;

/// Configuration from the environment, exiting on invalid values
pub(crate) fn load_config() -> PipelineConfig {
    match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    }
}
