//! Training Procedure
//! Fits the feature pipeline and the regressor on the "EV sales" rows and
//! persists them as one bundle.

use super::bundle::{ArtifactError, ModelArtifactBundle, TrainingMetadata};
use super::features::{FeatureError, FeaturePipeline, FeatureVector};
use super::gbdt::{GbdtError, GradientBoostingRegressor};
use crate::config::TrainingConfig;
use crate::data::columns::{CATEGORY, MODE, PARAMETER, POWERTRAIN, REGION, VALUE, YEAR};
use crate::data::{DataProcessor, ProcessorError, SalesRecord};
use crate::stats::RegressionMetrics;
use polars::prelude::DataFrame;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Columns the training dataset must provide besides `parameter`.
pub const REQUIRED_COLUMNS: [&str; 6] = [REGION, MODE, POWERTRAIN, CATEGORY, YEAR, VALUE];

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("Required column missing: {0}")]
    MissingColumn(String),
    #[error("No usable \"EV sales\" rows to train on")]
    NoTrainingRows,
    #[error("Sales value {value} for {region} in {year} cannot be log-transformed")]
    InvalidTarget { region: String, year: i32, value: f64 },
    #[error(transparent)]
    Data(#[from] ProcessorError),
    #[error(transparent)]
    Features(#[from] FeatureError),
    #[error(transparent)]
    Regressor(#[from] GbdtError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Summary of a finished training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub holdout: Option<RegressionMetrics>,
}

pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Filter `raw` to complete "EV sales" rows.
    pub fn prepare(raw: &DataFrame) -> Result<Vec<SalesRecord>, TrainingError> {
        if let Some(column) = DataProcessor::missing_columns(raw, &[PARAMETER])
            .into_iter()
            .next()
        {
            return Err(TrainingError::MissingColumn(column));
        }
        let ev_sales = DataProcessor::filter_ev_sales(raw)?;
        if let Some(column) = DataProcessor::missing_columns(&ev_sales, &REQUIRED_COLUMNS)
            .into_iter()
            .next()
        {
            return Err(TrainingError::MissingColumn(column));
        }

        let records = DataProcessor::sales_records(&ev_sales)?;
        let dropped = ev_sales.height() - records.len();
        if dropped > 0 {
            warn!(dropped, "Skipped incomplete \"EV sales\" rows");
        }
        if records.is_empty() {
            return Err(TrainingError::NoTrainingRows);
        }
        Ok(records)
    }

    /// Fit the pipeline and regressor on `raw`.
    pub fn train(&self, raw: &DataFrame) -> Result<(ModelArtifactBundle, TrainingReport), TrainingError> {
        let started = Instant::now();
        let records = Self::prepare(raw)?;
        let targets = log_targets(&records)?;
        let (features, rows) = FeaturePipeline::fit(&records)?;

        let (train_idx, holdout_idx) =
            holdout_split(records.len(), self.config.test_fraction, self.config.seed);
        let (train_rows, train_targets) = select(&rows, &targets, &train_idx);
        let (holdout_rows, holdout_targets) = select(&rows, &targets, &holdout_idx);

        info!(
            train_rows = train_rows.len(),
            holdout_rows = holdout_rows.len(),
            n_estimators = self.config.boosting.n_estimators,
            learning_rate = self.config.boosting.learning_rate,
            max_depth = self.config.boosting.max_depth,
            "Training gradient boosting regressor"
        );
        let regressor =
            GradientBoostingRegressor::fit(&train_rows, &train_targets, &self.config.boosting)?;

        let predicted: Vec<f64> = holdout_rows.iter().map(|r| regressor.predict(r)).collect();
        let holdout = RegressionMetrics::compute(&holdout_targets, &predicted);
        if let Some(m) = &holdout {
            info!(rmse = m.rmse, mae = m.mae, r2 = m.r2, "Holdout metrics (log space)");
        }

        let report = TrainingReport {
            train_rows: train_rows.len(),
            holdout_rows: holdout_rows.len(),
            holdout,
        };
        let metadata = TrainingMetadata {
            train_rows: report.train_rows,
            holdout_rows: report.holdout_rows,
            holdout,
        };
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "Training finished");

        Ok((ModelArtifactBundle::new(regressor, features, metadata), report))
    }

    /// Train and persist the bundle at `path`.
    pub fn train_and_save(
        &self,
        raw: &DataFrame,
        path: &Path,
    ) -> Result<(ModelArtifactBundle, TrainingReport), TrainingError> {
        let (bundle, report) = self.train(raw)?;
        bundle.save(path)?;
        Ok((bundle, report))
    }
}

/// `ln_1p(value)` per record. Values at or below -1 have no finite log.
fn log_targets(records: &[SalesRecord]) -> Result<Vec<f64>, TrainingError> {
    records
        .iter()
        .map(|r| {
            let target = r.value.ln_1p();
            if target.is_finite() {
                Ok(target)
            } else {
                Err(TrainingError::InvalidTarget {
                    region: r.region.clone(),
                    year: r.year,
                    value: r.value,
                })
            }
        })
        .collect()
}

/// Seeded shuffle split into `(train, holdout)` indices.
///
/// The holdout takes `ceil(n * test_fraction)` rows but never all of them.
fn holdout_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let fraction = if test_fraction.is_finite() {
        test_fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let n_holdout = ((n as f64 * fraction).ceil() as usize).min(n.saturating_sub(1));
    let train = indices.split_off(n_holdout);
    (train, indices)
}

fn select(rows: &[FeatureVector], targets: &[f64], idx: &[usize]) -> (Vec<FeatureVector>, Vec<f64>) {
    idx.iter().map(|&i| (rows[i], targets[i])).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EV_SALES;
    use polars::prelude::*;

    #[test]
    fn split_is_seeded_and_sized() {
        let (train, holdout) = holdout_split(10, 0.2, 42);
        assert_eq!(train.len(), 8);
        assert_eq!(holdout.len(), 2);
        assert_eq!(holdout_split(10, 0.2, 42), (train.clone(), holdout.clone()));

        let mut all: Vec<usize> = train.into_iter().chain(holdout).collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());

        assert_eq!(holdout_split(1, 0.2, 42), (vec![0], vec![]));
        assert_eq!(holdout_split(5, 0.0, 42).1.len(), 0);
    }

    #[test]
    fn missing_required_column_aborts_training() {
        let df = DataFrame::new(vec![
            Column::new(PARAMETER.into(), vec![EV_SALES]),
            Column::new(REGION.into(), vec!["China"]),
            Column::new(MODE.into(), vec!["Cars"]),
            Column::new(POWERTRAIN.into(), vec!["BEV"]),
            Column::new(CATEGORY.into(), vec!["Historical"]),
            Column::new(YEAR.into(), vec![2020i64]),
        ])
        .unwrap();

        let err = Trainer::new(TrainingConfig::default()).train(&df).unwrap_err();
        assert!(matches!(err, TrainingError::MissingColumn(ref c) if c == "value"));
    }

    fn ev_sales_frame(values: &[f64]) -> DataFrame {
        let n = values.len();
        let years: Vec<i64> = (0..n as i64).map(|i| 2015 + i).collect();
        DataFrame::new(vec![
            Column::new(PARAMETER.into(), vec![EV_SALES; n]),
            Column::new(REGION.into(), vec!["China"; n]),
            Column::new(MODE.into(), vec!["Cars"; n]),
            Column::new(POWERTRAIN.into(), vec!["BEV"; n]),
            Column::new(CATEGORY.into(), vec!["Historical"; n]),
            Column::new(YEAR.into(), years),
            Column::new(VALUE.into(), values.to_vec()),
        ])
        .unwrap()
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            boosting: crate::model::BoostingParams {
                n_estimators: 5,
                ..Default::default()
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn value_without_finite_log_aborts_before_saving() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let df = ev_sales_frame(&[10.0, 20.0, -1.0, 40.0, 50.0]);

        let err = Trainer::new(small_config())
            .train_and_save(&df, &path)
            .unwrap_err();
        match err {
            TrainingError::InvalidTarget { region, year, value } => {
                assert_eq!(region, "China");
                assert_eq!(year, 2017);
                assert_eq!(value, -1.0);
            }
            other => panic!("expected invalid target, got {other:?}"),
        }
        assert!(!path.exists());
    }

    #[test]
    fn saved_bundle_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let df = ev_sales_frame(&[10.0, 20.0, 0.0, 40.0, 50.0]);

        let (bundle, report) = Trainer::new(small_config()).train_and_save(&df, &path).unwrap();
        assert_eq!(report.train_rows + report.holdout_rows, 5);
        assert_eq!(ModelArtifactBundle::load(&path).unwrap(), bundle);
    }

    #[test]
    fn no_ev_sales_rows_is_an_error() {
        let df = DataFrame::new(vec![
            Column::new(PARAMETER.into(), vec!["EV stock"]),
            Column::new(REGION.into(), vec!["China"]),
            Column::new(MODE.into(), vec!["Cars"]),
            Column::new(POWERTRAIN.into(), vec!["BEV"]),
            Column::new(CATEGORY.into(), vec!["Historical"]),
            Column::new(YEAR.into(), vec![2020i64]),
            Column::new(VALUE.into(), vec![10.0]),
        ])
        .unwrap();

        let err = Trainer::new(TrainingConfig::default()).train(&df).unwrap_err();
        assert!(matches!(err, TrainingError::NoTrainingRows));
    }
}
