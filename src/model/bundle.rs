//! Model Artifact Bundle
//! The regressor and its fitted feature pipeline, persisted as one JSON
//! document so they are always loaded and used together.

use super::encoder::CategoricalField;
use super::features::FeaturePipeline;
use super::gbdt::GradientBoostingRegressor;
use crate::stats::RegressionMetrics;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Model bundle not found at {}", path.display())]
    Missing { path: PathBuf },
    #[error("Failed to access model bundle at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Model bundle at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("Failed to serialise model bundle: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// Facts about the training run that produced a bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub train_rows: usize,
    pub holdout_rows: usize,
    /// Holdout metrics in log space, absent when there was no holdout.
    pub holdout: Option<RegressionMetrics>,
}

/// Regressor, label encoders, polynomial expander and scaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifactBundle {
    pub format_version: u32,
    pub regressor: GradientBoostingRegressor,
    #[serde(flatten)]
    pub features: FeaturePipeline,
    #[serde(default)]
    pub metadata: TrainingMetadata,
}

impl ModelArtifactBundle {
    pub fn new(
        regressor: GradientBoostingRegressor,
        features: FeaturePipeline,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            regressor,
            features,
            metadata,
        }
    }

    /// Write the bundle to a temporary file beside `path` and rename it into
    /// place, so readers never observe a partial bundle. A bundle that would
    /// not pass `load` is refused.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        self.validate().map_err(|reason| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;

        let io_err = |source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, self)?;
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        info!(path = %path.display(), trees = self.regressor.trees().len(), "Saved model bundle");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::Missing {
                path: path.to_path_buf(),
            });
        }

        let contents = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bundle: Self = serde_json::from_str(&contents).map_err(|e| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        bundle.validate().map_err(|reason| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(bundle)
    }

    /// Check that every component is present and consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {BUNDLE_FORMAT_VERSION})",
                self.format_version
            ));
        }
        for field in CategoricalField::ALL {
            match self.features.encoder(field) {
                Some(encoder) if !encoder.is_empty() && encoder.is_well_formed() => {}
                Some(_) => return Err(format!("label encoder for '{}' is malformed", field.column())),
                None => return Err(format!("label encoder for '{}' is missing", field.column())),
            }
        }
        self.features.poly.validate().map_err(|e| e.to_string())?;
        if !self.features.scaler.is_well_formed() {
            return Err("scaler does not match the feature layout".to_string());
        }
        if !self.regressor.is_well_formed() {
            return Err("regressor trees are malformed".to_string());
        }
        Ok(())
    }
}
