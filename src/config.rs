//! Application configuration.
//!
//! Defaults cover a normal run; a JSON file can override any subset of fields.

use crate::model::BoostingParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DATA_PATH: &str = "IEA-EV-dataEV salesHistoricalCars.csv";
pub const DEFAULT_MODEL_PATH: &str = "models/gbr_pipeline.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Hyperparameters and split settings for the training procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    #[serde(flatten)]
    pub boosting: BoostingParams,
    /// Share of rows held out for evaluation.
    pub test_fraction: f64,
    /// Seed for the holdout shuffle.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            boosting: BoostingParams::default(),
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    /// Delay between characters when streaming chat answers. 0 disables it.
    pub typing_delay_ms: u64,
    /// Width and height of rendered charts in pixels.
    pub chart_size: (u32, u32),
    pub training: TrainingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            typing_delay_ms: 10,
            chart_size: (900, 600),
            training: TrainingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or return the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_training_hyperparameters() {
        let config = AppConfig::default();
        assert_eq!(config.training.boosting.n_estimators, 600);
        assert_eq!(config.training.boosting.learning_rate, 0.05);
        assert_eq!(config.training.boosting.max_depth, 7);
        assert_eq!(config.training.test_fraction, 0.2);
        assert_eq!(config.training.seed, 42);
        assert_eq!(AppConfig::load(None).unwrap(), config);
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"model_path": "out/model.json", "training": {"n_estimators": 50, "seed": 7}}"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.model_path, PathBuf::from("out/model.json"));
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert_eq!(config.training.boosting.n_estimators, 50);
        assert_eq!(config.training.boosting.max_depth, 7);
        assert_eq!(config.training.seed, 7);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(AppConfig::load(Some(&path)), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            AppConfig::load(Some(&dir.path().join("absent.json"))),
            Err(ConfigError::Read { .. })
        ));
    }
}
