//! EV Insights Dashboard
//! Owns the dataset and the forecast model for the life of the process and
//! routes every user interaction through them.

use crate::charts::{Chart, ChartError, ChartPlotter, ImageFormat, StaticChartRenderer};
use crate::chat::IntentResponder;
use crate::config::AppConfig;
use crate::data::columns::{CATEGORY, MODE, POWERTRAIN, REGION};
use crate::data::{DataLoader, DataProcessor, DatasetSummary, LoaderError, SalesData};
use crate::model::{ForecastInput, ForecastModel, Trainer, TrainingError, TrainingReport};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Years the forecast form accepts.
pub const PREDICTION_YEARS: RangeInclusive<i32> = 2024..=2040;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Sales data is not available from {}", path.display())]
    NoData { path: PathBuf },
    #[error("Prediction model is unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Year {year} is outside the supported range {}..={}", PREDICTION_YEARS.start(), PREDICTION_YEARS.end())]
    YearOutOfRange { year: i32 },
    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Chart(#[from] ChartError),
    #[error(transparent)]
    Training(#[from] TrainingError),
}

/// Whether forecasts can be served.
#[derive(Debug, Clone)]
pub enum ModelStatus {
    Loaded(ForecastModel),
    Unavailable(String),
}

impl ModelStatus {
    pub fn model(&self) -> Option<&ForecastModel> {
        match self {
            ModelStatus::Loaded(model) => Some(model),
            ModelStatus::Unavailable(_) => None,
        }
    }
}

/// Choices offered for each prediction input, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredictionOptions {
    pub regions: Vec<String>,
    pub modes: Vec<String>,
    pub powertrains: Vec<String>,
    pub categories: Vec<String>,
}

/// Result of analysing an uploaded CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadAnalysis {
    pub summary: DatasetSummary,
    pub charts: Vec<PathBuf>,
}

pub struct Dashboard {
    config: AppConfig,
    loader: DataLoader,
    model: ModelStatus,
    responder: IntentResponder,
}

impl Dashboard {
    /// Load the dataset and the model once. Failures degrade the dashboard
    /// instead of aborting it.
    pub fn initialise(config: AppConfig) -> Self {
        let mut loader = DataLoader::new();
        if let Err(e) = loader.load(&config.data_path) {
            warn!(path = %config.data_path.display(), error = %e, "Failed to load sales data");
        }

        let model = match ForecastModel::load(&config.model_path) {
            Ok(model) => ModelStatus::Loaded(model),
            Err(e) => {
                warn!(error = %e, "Forecast model unavailable");
                ModelStatus::Unavailable(e.to_string())
            }
        };

        Self {
            config,
            loader,
            model,
            responder: IntentResponder::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data(&self) -> Option<&SalesData> {
        self.loader.get_data()
    }

    /// The "EV sales" view over named regions, if the dataset loaded.
    pub fn analysis(&self) -> Option<&DataFrame> {
        self.data().map(|d| &d.analysis)
    }

    /// Load the configured dataset again. Views already loaded from the same
    /// path are reused without reading the file.
    pub fn reload_data(&mut self) -> Result<bool, DashboardError> {
        Ok(self.loader.load(&self.config.data_path)?.is_some())
    }

    pub fn summary(&self) -> DatasetSummary {
        self.analysis()
            .map(DataProcessor::summary)
            .unwrap_or_default()
    }

    pub fn answer(&self, query: &str) -> String {
        self.responder.respond(query, self.analysis())
    }

    pub fn prediction_options(&self) -> Option<PredictionOptions> {
        let df = &self.data()?.prediction_options;
        Some(PredictionOptions {
            regions: DataProcessor::unique_sorted(df, REGION),
            modes: DataProcessor::unique_sorted(df, MODE),
            powertrains: DataProcessor::unique_sorted(df, POWERTRAIN),
            categories: DataProcessor::unique_sorted(df, CATEGORY),
        })
    }

    pub fn model_status(&self) -> &ModelStatus {
        &self.model
    }

    /// Forecast sales for `input`.
    pub fn predict(&self, input: &ForecastInput) -> Result<f64, DashboardError> {
        if !PREDICTION_YEARS.contains(&input.year) {
            return Err(DashboardError::YearOutOfRange { year: input.year });
        }
        match &self.model {
            ModelStatus::Loaded(model) => Ok(model.predict(input)),
            ModelStatus::Unavailable(reason) => Err(DashboardError::ModelUnavailable(reason.clone())),
        }
    }

    /// Retrain from the configured dataset, save the bundle and serve it.
    pub fn train(&mut self) -> Result<TrainingReport, DashboardError> {
        let data_path = &self.config.data_path;
        if !data_path.exists() {
            return Err(DashboardError::NoData {
                path: data_path.clone(),
            });
        }

        let raw = DataLoader::read_csv(data_path)?;
        let trainer = Trainer::new(self.config.training.clone());
        let (bundle, report) = trainer.train_and_save(&raw, &self.config.model_path)?;
        self.model = ModelStatus::Loaded(ForecastModel::from_bundle(
            bundle,
            self.config.model_path.clone(),
        ));
        Ok(report)
    }

    /// Render the trend and top-region charts for the loaded dataset.
    pub fn render_charts(&self, out_dir: &Path, format: ImageFormat) -> Result<Vec<PathBuf>, DashboardError> {
        let Some(df) = self.analysis() else {
            return Err(DashboardError::NoData {
                path: self.config.data_path.clone(),
            });
        };
        self.render_frame(df, out_dir, format)
    }

    /// Load a user CSV, summarise it and render its charts.
    ///
    /// A CSV missing required columns is rejected before anything is drawn.
    pub fn analyze_upload(
        &self,
        path: &Path,
        out_dir: &Path,
        format: ImageFormat,
    ) -> Result<UploadAnalysis, DashboardError> {
        let df = DataLoader::load_upload(path)?;
        let summary = DataProcessor::summary(&df);
        let charts = self.render_frame(&df, out_dir, format)?;
        Ok(UploadAnalysis { summary, charts })
    }

    fn render_frame(
        &self,
        df: &DataFrame,
        out_dir: &Path,
        format: ImageFormat,
    ) -> Result<Vec<PathBuf>, DashboardError> {
        fs::create_dir_all(out_dir).map_err(|source| DashboardError::OutputDir {
            path: out_dir.to_path_buf(),
            source,
        })?;

        let charts = ChartPlotter::all(df)?;
        let size = self.config.chart_size;
        let rendered: Vec<Option<PathBuf>> = charts
            .par_iter()
            .map(|chart| {
                if chart.is_empty() {
                    warn!(title = chart.title(), "Skipping chart without data");
                    return Ok(None);
                }
                let path = out_dir.join(chart_file_name(chart, format));
                StaticChartRenderer::render(chart, &path, size)?;
                Ok(Some(path))
            })
            .collect::<Result<_, ChartError>>()?;

        let paths: Vec<PathBuf> = rendered.into_iter().flatten().collect();
        info!(out_dir = %out_dir.display(), charts = paths.len(), "Charts written");
        Ok(paths)
    }
}

fn chart_file_name(chart: &Chart, format: ImageFormat) -> String {
    let stem = match chart {
        Chart::Trend(_) => "ev_sales_trend",
        Chart::RegionBars(_) => "top_regions",
    };
    format!("{stem}.{}", format.extension())
}
