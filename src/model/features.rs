//! Feature Pipeline Module
//! Turns categorical inputs plus a year into the scaled feature vector the
//! regressor consumes. Training and inference both go through
//! [`raw_features`], so the column order cannot drift between them.

use super::encoder::{encode_categorical, CategoricalField, LabelEncoder};
use crate::data::SalesRecord;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Number of model features.
pub const N_FEATURES: usize = 6;

/// Feature column order. The scaler is fit in this order.
pub const FEATURE_NAMES: [&str; N_FEATURES] =
    ["region", "mode", "powertrain", "category", "year", "year^2"];

pub type FeatureVector = [f64; N_FEATURES];

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Cannot fit the feature pipeline on an empty dataset")]
    EmptyDataset,
    #[error("Unsupported polynomial expansion: degree {degree}, bias {include_bias}")]
    UnsupportedExpansion { degree: u32, include_bias: bool },
}

/// One prediction or training input before encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureInput<'a> {
    pub region: &'a str,
    pub mode: &'a str,
    pub powertrain: &'a str,
    pub category: &'a str,
    pub year: i32,
}

impl<'a> FeatureInput<'a> {
    fn categorical(&self, field: CategoricalField) -> &'a str {
        match field {
            CategoricalField::Region => self.region,
            CategoricalField::Mode => self.mode,
            CategoricalField::Powertrain => self.powertrain,
            CategoricalField::Category => self.category,
        }
    }
}

impl<'a> From<&'a SalesRecord> for FeatureInput<'a> {
    fn from(record: &'a SalesRecord) -> Self {
        Self {
            region: &record.region,
            mode: &record.mode,
            powertrain: &record.powertrain,
            category: &record.category,
            year: record.year,
        }
    }
}

/// Degree-2 polynomial expansion of year, no bias term.
pub fn expand_year(year: f64) -> (f64, f64) {
    (year, year * year)
}

/// Polynomial expander fit on the year column alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialExpander {
    degree: u32,
    include_bias: bool,
}

impl Default for PolynomialExpander {
    fn default() -> Self {
        Self {
            degree: 2,
            include_bias: false,
        }
    }
}

impl PolynomialExpander {
    pub fn fit(years: &[f64]) -> Result<Self, FeatureError> {
        if years.is_empty() {
            return Err(FeatureError::EmptyDataset);
        }
        Ok(Self::default())
    }

    pub fn transform(&self, year: f64) -> [f64; 2] {
        let (year, squared) = expand_year(year);
        [year, squared]
    }

    /// Only the degree-2, bias-free expansion is supported.
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.degree == 2 && !self.include_bias {
            Ok(())
        } else {
            Err(FeatureError::UnsupportedExpansion {
                degree: self.degree,
                include_bias: self.include_bias,
            })
        }
    }
}

/// Per-column standardization: `(value - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations. Columns without
    /// variance get a scale of 1.
    pub fn fit(rows: &[FeatureVector]) -> Result<Self, FeatureError> {
        if rows.is_empty() {
            return Err(FeatureError::EmptyDataset);
        }

        let (mean, scale) = (0..N_FEATURES)
            .map(|j| {
                let column: Vec<f64> = rows.iter().map(|row| row[j]).collect();
                let mean = column.iter().mean();
                let std = column.iter().population_std_dev();
                let scale = if std.is_finite() && std > 0.0 { std } else { 1.0 };
                (mean, scale)
            })
            .unzip();

        Ok(Self { mean, scale })
    }

    pub fn transform(&self, row: &FeatureVector) -> FeatureVector {
        let mut scaled = *row;
        for (j, value) in scaled.iter_mut().enumerate() {
            let mean = self.mean.get(j).copied().unwrap_or(0.0);
            let scale = self.scale.get(j).copied().unwrap_or(1.0);
            *value = (*value - mean) / scale;
        }
        scaled
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.mean.len() == N_FEATURES
            && self.scale.len() == N_FEATURES
            && self.scale.iter().all(|s| s.is_finite() && *s != 0.0)
    }
}

/// Unscaled features in [`FEATURE_NAMES`] order.
pub fn raw_features(
    input: &FeatureInput<'_>,
    encoders: &BTreeMap<CategoricalField, LabelEncoder>,
    poly: &PolynomialExpander,
) -> FeatureVector {
    let mut row = [0.0; N_FEATURES];
    for (slot, field) in row.iter_mut().zip(CategoricalField::ALL) {
        let raw_value = input.categorical(field);
        *slot = match encoders.get(&field) {
            Some(encoder) => encode_categorical(field, raw_value, encoder) as f64,
            None => {
                warn!(field = field.column(), "No encoder for field, using fallback code 0");
                0.0
            }
        };
    }
    let [year, squared] = poly.transform(f64::from(input.year));
    row[4] = year;
    row[5] = squared;
    row
}

/// Scaled feature vector for one input.
pub fn assemble(
    input: &FeatureInput<'_>,
    encoders: &BTreeMap<CategoricalField, LabelEncoder>,
    poly: &PolynomialExpander,
    scaler: &StandardScaler,
) -> FeatureVector {
    scaler.transform(&raw_features(input, encoders, poly))
}

/// The fitted encoders, year expander and scaler, used together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    pub label_encoders: BTreeMap<CategoricalField, LabelEncoder>,
    pub poly: PolynomialExpander,
    pub scaler: StandardScaler,
}

impl FeaturePipeline {
    /// Fit every stage on `records` and return the pipeline together with the
    /// scaled training matrix.
    pub fn fit(records: &[SalesRecord]) -> Result<(Self, Vec<FeatureVector>), FeatureError> {
        if records.is_empty() {
            return Err(FeatureError::EmptyDataset);
        }

        let label_encoders: BTreeMap<CategoricalField, LabelEncoder> = CategoricalField::ALL
            .into_iter()
            .map(|field| {
                let encoder = LabelEncoder::fit(
                    records
                        .iter()
                        .map(|r| FeatureInput::from(r).categorical(field).trim().to_string()),
                );
                (field, encoder)
            })
            .collect();

        let years: Vec<f64> = records.iter().map(|r| f64::from(r.year)).collect();
        let poly = PolynomialExpander::fit(&years)?;

        let raw: Vec<FeatureVector> = records
            .iter()
            .map(|r| raw_features(&FeatureInput::from(r), &label_encoders, &poly))
            .collect();
        let scaler = StandardScaler::fit(&raw)?;
        let scaled = raw.iter().map(|row| scaler.transform(row)).collect();

        Ok((
            Self {
                label_encoders,
                poly,
                scaler,
            },
            scaled,
        ))
    }

    pub fn assemble(&self, input: &FeatureInput<'_>) -> FeatureVector {
        assemble(input, &self.label_encoders, &self.poly, &self.scaler)
    }

    pub fn transform_records(&self, records: &[SalesRecord]) -> Vec<FeatureVector> {
        records
            .iter()
            .map(|r| self.assemble(&FeatureInput::from(r)))
            .collect()
    }

    pub fn encoder(&self, field: CategoricalField) -> Option<&LabelEncoder> {
        self.label_encoders.get(&field)
    }
}
