pub mod correlation;
pub mod pca;
pub mod residuals;
pub mod statistics;

pub use correlation::{cross_correlation_lag, pearson, top_correlated, Correlation};
pub use pca::{pca_transformation, Pca};
pub use residuals::{diagnose_residuals, residual_histogram, ResidualDiagnostics, ResidualHistogram};
pub use statistics::{
    bartlett_partition_test, column_stats, exponential_weighted_average, normalize_residuals, r2_score, rmse,
    standardize, z_score, BartlettResult, ExponentialWeightedAverage,
};
