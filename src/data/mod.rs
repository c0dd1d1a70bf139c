//! Data module - CSV loading, filtering and aggregation

mod loader;
mod processor;

pub use loader::{DataLoader, LoaderError, SalesData, SalesRecord};
pub use processor::{DataProcessor, DatasetSummary, ProcessorError};

#[cfg(test)]
pub(crate) use processor::tests as processor_tests;

/// Column names used throughout the sales dataset.
pub mod columns {
    pub const PARAMETER: &str = "parameter";
    pub const REGION: &str = "region";
    pub const MODE: &str = "mode";
    pub const POWERTRAIN: &str = "powertrain";
    pub const CATEGORY: &str = "category";
    pub const YEAR: &str = "year";
    pub const VALUE: &str = "value";
}

/// The `parameter` value that marks a row as in scope.
pub const EV_SALES: &str = "EV sales";

/// Aggregate buckets that are not genuine named regions.
pub const AGGREGATE_REGIONS: [&str; 2] = ["World", "Rest of the world"];
