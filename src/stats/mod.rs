//! Stats module - holdout evaluation metrics and number formatting

mod format;
mod metrics;

pub use format::format_count;
pub use metrics::{percentile, RegressionMetrics};
