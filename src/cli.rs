use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser)]
#[command(name = "stock-forecast")]
#[command(about = "Stock price forecasting pipeline", long_about = None)]
pub struct Cli {
    /// Defaults to `train` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Align the historical CSVs and save the train/test checkpoint
    Prepare,
    /// Scrape intraday quotes for every symbol into the intraday cache
    Scrape {
        /// Look-back range (e.g., 730d, 1y, max)
        #[arg(short, long)]
        range: Option<String>,

        /// Bar interval (e.g., 60m, 1d)
        #[arg(short, long)]
        interval: Option<String>,
    },
    /// Train a regressor on the checkpoint and write prediction reports
    Train {
        /// Model to train: mlp or svr
        #[arg(short, long, default_value = "mlp")]
        model: String,

        /// Project features onto this many principal components first
        #[arg(long)]
        pca: Option<usize>,
    },
    /// Residual normality and homoscedasticity diagnostics of the last training fit
    Diagnose {
        /// Residuals per Bartlett group
        #[arg(short, long, default_value_t = 10)]
        partition_factor: usize,

        /// Histogram bins
        #[arg(short, long, default_value_t = 20)]
        bins: usize,

        /// Smoothing factor of the residual trend, in (0, 1)
        #[arg(long, default_value_t = 0.1)]
        trend_beta: f64,
    },
    /// Show current status
    Status,
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Train {
        model: "mlp".to_string(),
        pca: None,
    }) {
        Commands::Prepare => {
            commands::prepare::run();
        }
        Commands::Scrape { range, interval } => {
            commands::scrape::run(range, interval);
        }
        Commands::Train { model, pca } => {
            commands::train::run(model, pca);
        }
        Commands::Diagnose {
            partition_factor,
            bins,
            trend_beta,
        } => {
            commands::diagnose::run(partition_factor, bins, trend_beta);
        }
        Commands::Status => {
            commands::status::run();
        }
    }
}
