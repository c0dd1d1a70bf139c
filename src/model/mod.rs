//! Model module - feature pipeline, regressor, artifact bundle and training

mod bundle;
mod encoder;
mod features;
mod forecast;
mod gbdt;
mod trainer;

pub use bundle::{ArtifactError, ModelArtifactBundle, TrainingMetadata, BUNDLE_FORMAT_VERSION};
pub use encoder::{encode_categorical, CategoricalField, LabelEncoder};
pub use features::{
    assemble, expand_year, raw_features, FeatureError, FeatureInput, FeaturePipeline,
    FeatureVector, PolynomialExpander, StandardScaler, FEATURE_NAMES, N_FEATURES,
};
pub use forecast::{predict, ForecastInput, ForecastModel};
pub use gbdt::{BoostingParams, GbdtError, GradientBoostingRegressor, Node, RegressionTree};
pub use trainer::{Trainer, TrainingError, TrainingReport, REQUIRED_COLUMNS};
