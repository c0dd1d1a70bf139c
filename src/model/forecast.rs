//! Forecast Model Wrapper
//! Best-effort sales prediction from a loaded artifact bundle.

use super::bundle::{ArtifactError, ModelArtifactBundle};
use super::features::FeatureInput;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Owned prediction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastInput {
    pub region: String,
    pub mode: String,
    pub powertrain: String,
    pub category: String,
    pub year: i32,
}

impl ForecastInput {
    pub fn features(&self) -> FeatureInput<'_> {
        FeatureInput {
            region: &self.region,
            mode: &self.mode,
            powertrain: &self.powertrain,
            category: &self.category,
            year: self.year,
        }
    }
}

/// Estimated sales for `input`, never negative.
///
/// The regressor works on `ln_1p(value)`, so its output is mapped back with
/// `exp_m1`. A missing bundle yields 0.
pub fn predict(bundle: Option<&ModelArtifactBundle>, input: &ForecastInput) -> f64 {
    let Some(bundle) = bundle else {
        return 0.0;
    };

    let features = bundle.features.assemble(&input.features());
    let estimate = bundle.regressor.predict(&features).exp_m1();

    if estimate.is_finite() {
        estimate.max(0.0)
    } else {
        warn!(?input, estimate, "Non-finite forecast, reporting 0");
        0.0
    }
}

/// A bundle loaded from disk, immutable for the life of the process.
#[derive(Debug, Clone)]
pub struct ForecastModel {
    bundle: ModelArtifactBundle,
    path: PathBuf,
}

impl ForecastModel {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bundle = ModelArtifactBundle::load(path)?;
        info!(
            path = %path.display(),
            trees = bundle.regressor.trees().len(),
            "Loaded forecast model"
        );
        Ok(Self {
            bundle,
            path: path.to_path_buf(),
        })
    }

    pub fn from_bundle(bundle: ModelArtifactBundle, path: PathBuf) -> Self {
        Self { bundle, path }
    }

    pub fn predict(&self, input: &ForecastInput) -> f64 {
        predict(Some(&self.bundle), input)
    }

    pub fn bundle(&self) -> &ModelArtifactBundle {
        &self.bundle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
