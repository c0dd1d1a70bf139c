//! CSV Data Loader Module
//! Handles CSV file loading and the derived sales views using Polars.

use super::processor::{DataProcessor, ProcessorError};
use super::columns::{PARAMETER, REGION};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

/// One row of the sales dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub region: String,
    pub category: String,
    pub parameter: String,
    pub mode: String,
    pub powertrain: String,
    pub year: i32,
    pub value: f64,
}

/// The two views derived from the raw dataset.
#[derive(Debug, Clone)]
pub struct SalesData {
    /// "EV sales" rows for named regions only. Feeds chat answers and charts.
    pub analysis: DataFrame,
    /// All "EV sales" rows, aggregate regions included.
    pub prediction_options: DataFrame,
}

impl SalesData {
    /// Derive both views from a raw dataset.
    pub fn from_raw(raw: &DataFrame) -> Result<Self, LoaderError> {
        DataProcessor::require_columns(raw, &[PARAMETER, REGION])?;

        let prediction_options = DataProcessor::filter_ev_sales(raw)?;
        let analysis = DataProcessor::exclude_aggregate_regions(&prediction_options)?;

        Ok(Self {
            analysis,
            prediction_options,
        })
    }
}

/// Handles CSV file loading with Polars. Loaded views are kept for the
/// lifetime of the loader, keyed by path.
pub struct DataLoader {
    data: Option<SalesData>,
    file_path: Option<PathBuf>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            data: None,
            file_path: None,
        }
    }

    /// Read a CSV file into a DataFrame.
    pub fn read_csv(file_path: &Path) -> Result<DataFrame, LoaderError> {
        let df = LazyCsvReader::new(file_path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;
        Ok(df)
    }

    /// Load the sales dataset and derive its views.
    ///
    /// Returns `Ok(None)` when the file does not exist. A repeated call with the
    /// same path returns the cached views.
    pub fn load(&mut self, file_path: impl AsRef<Path>) -> Result<Option<SalesData>, LoaderError> {
        let file_path = file_path.as_ref();

        if self.file_path.as_deref() == Some(file_path) && self.data.is_some() {
            debug!(path = %file_path.display(), "Reusing cached sales data");
            return Ok(self.data.clone());
        }

        self.file_path = Some(file_path.to_path_buf());
        self.data = None;

        if !file_path.exists() {
            warn!(path = %file_path.display(), "Sales dataset not found");
            return Ok(None);
        }

        let raw = Self::read_csv(file_path)?;
        let data = SalesData::from_raw(&raw)?;
        info!(
            path = %file_path.display(),
            rows = raw.height(),
            analysis_rows = data.analysis.height(),
            prediction_rows = data.prediction_options.height(),
            "Loaded sales dataset"
        );

        self.data = Some(data);
        Ok(self.data.clone())
    }

    /// Load a user supplied CSV for ad-hoc analysis.
    ///
    /// The file must carry `region`, `year`, `value` and `parameter`; numeric
    /// cells that do not parse are dropped.
    pub fn load_upload(file_path: &Path) -> Result<DataFrame, LoaderError> {
        let raw = Self::read_csv(file_path)?;
        let prepared = DataProcessor::prepare_upload(&raw)?;
        info!(
            path = %file_path.display(),
            rows = raw.height(),
            kept = prepared.height(),
            "Prepared uploaded CSV"
        );
        Ok(prepared)
    }

    /// Get a reference to the loaded views.
    pub fn get_data(&self) -> Option<&SalesData> {
        self.data.as_ref()
    }

    /// Get file path.
    pub fn get_file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "region,category,parameter,mode,powertrain,year,unit,value\n\
        China,Historical,EV sales,Cars,BEV,2021,Vehicles,2700000\n\
        World,Historical,EV sales,Cars,BEV,2021,Vehicles,4600000\n\
        Rest of the world,Historical,EV sales,Cars,BEV,2021,Vehicles,50000\n\
        Europe,Historical,EV stock,Cars,BEV,2021,Vehicles,5500000\n\
        Europe,Historical,EV sales,Cars,PHEV,2021,Vehicles,1200000\n";

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn missing_file_yields_no_data() {
        let mut loader = DataLoader::new();
        let result = loader.load("does/not/exist.csv").unwrap();
        assert!(result.is_none());
        assert!(loader.get_data().is_none());
    }

    #[test]
    fn load_builds_both_views() {
        let file = write_csv(CSV);
        let mut loader = DataLoader::new();
        let data = loader.load(file.path()).unwrap().unwrap();

        assert_eq!(data.prediction_options.height(), 4);
        assert_eq!(data.analysis.height(), 2);

        let regions = DataProcessor::unique_sorted(&data.analysis, REGION);
        assert_eq!(regions, vec!["China".to_string(), "Europe".to_string()]);
    }

    #[test]
    fn second_load_uses_cache() {
        let file = write_csv(CSV);
        let path = file.path().to_path_buf();
        let mut loader = DataLoader::new();
        loader.load(&path).unwrap().unwrap();

        drop(file);
        let cached = loader.load(&path).unwrap();
        assert!(cached.is_some());
    }

    #[test]
    fn upload_without_value_column_is_rejected() {
        let file = write_csv("region,year,parameter\nChina,2021,EV sales\n");
        let err = DataLoader::load_upload(file.path()).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Processor(ProcessorError::MissingColumns { ref missing }) if missing == &vec!["value".to_string()]
        ));
    }
}
