//! EV Insights - analytics over historical EV sales data.
//!
//! Loads the sales CSV, answers chat-style questions through ordered intent
//! rules, renders aggregate charts and forecasts sales with a gradient-boosted
//! regression model trained offline.

pub mod app;
pub mod charts;
pub mod chat;
pub mod config;
pub mod data;
pub mod model;
pub mod stats;

pub use app::{Dashboard, DashboardError, ModelStatus, PredictionOptions, UploadAnalysis};
pub use config::AppConfig;
pub use data::{DataLoader, SalesData, SalesRecord};
pub use model::{ForecastInput, ForecastModel, ModelArtifactBundle, Trainer};
