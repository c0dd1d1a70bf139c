//! Data Processor Module
//! Handles filtering, cleaning and the group sums behind answers and charts.

use super::columns::{CATEGORY, MODE, PARAMETER, POWERTRAIN, REGION, VALUE, YEAR};
use super::loader::SalesRecord;
use super::{AGGREGATE_REGIONS, EV_SALES};
use polars::prelude::*;
use std::collections::HashSet;
use thiserror::Error;

/// Columns an uploaded CSV must provide.
pub const UPLOAD_REQUIRED_COLUMNS: [&str; 4] = [REGION, YEAR, VALUE, PARAMETER];

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Your CSV is missing required columns: {}", missing.join(", "))]
    MissingColumns { missing: Vec<String> },
}

/// Headline figures for the loaded analysis view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetSummary {
    pub regions: usize,
    pub latest_year: Option<i32>,
    pub records: usize,
}

impl DatasetSummary {
    pub fn latest_year_label(&self) -> String {
        self.latest_year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Handles data cleaning and aggregation operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Names of the `required` columns absent from `df`.
    pub fn missing_columns(df: &DataFrame, required: &[&str]) -> Vec<String> {
        let present: HashSet<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        required
            .iter()
            .filter(|name| !present.contains(**name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<(), ProcessorError> {
        let missing = Self::missing_columns(df, required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ProcessorError::MissingColumns { missing })
        }
    }

    /// Keep only rows whose `parameter` is "EV sales".
    pub fn filter_ev_sales(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        Self::require_columns(df, &[PARAMETER])?;
        let filtered = df
            .clone()
            .lazy()
            .filter(col(PARAMETER).eq(lit(EV_SALES)))
            .collect()?;
        Ok(filtered)
    }

    /// Drop the "World" and "Rest of the world" aggregate buckets.
    pub fn exclude_aggregate_regions(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        let [world, rest] = AGGREGATE_REGIONS;
        let filtered = df
            .clone()
            .lazy()
            .filter(
                col(REGION)
                    .neq(lit(world))
                    .and(col(REGION).neq(lit(rest))),
            )
            .collect()?;
        Ok(filtered)
    }

    /// Validate and clean a user supplied CSV.
    ///
    /// `year` and `value` are coerced to numbers; rows where either does not
    /// parse are dropped.
    pub fn prepare_upload(df: &DataFrame) -> Result<DataFrame, ProcessorError> {
        Self::require_columns(df, &UPLOAD_REQUIRED_COLUMNS)?;

        let cleaned = df
            .clone()
            .lazy()
            .with_columns([
                col(YEAR).cast(DataType::Float64),
                col(VALUE).cast(DataType::Float64),
            ])
            .filter(
                col(YEAR)
                    .is_not_null()
                    .and(col(VALUE).is_not_null())
                    .and(col(YEAR).is_not_nan())
                    .and(col(VALUE).is_not_nan()),
            )
            .with_column(col(YEAR).cast(DataType::Int64))
            .collect()?;
        Ok(cleaned)
    }

    /// Sum of `value` per year, ascending by year.
    pub fn sum_by_year(df: &DataFrame) -> Result<Vec<(i32, f64)>, ProcessorError> {
        let grouped = df
            .clone()
            .lazy()
            .select([
                col(YEAR).cast(DataType::Int64),
                col(VALUE).cast(DataType::Float64),
            ])
            .filter(col(YEAR).is_not_null())
            .group_by([col(YEAR)])
            .agg([col(VALUE).sum()])
            .collect()?;

        let years = i64_values(&grouped, YEAR)?;
        let totals = f64_values(&grouped, VALUE)?;

        let mut sums: Vec<(i32, f64)> = years
            .into_iter()
            .zip(totals)
            .filter_map(|(year, total)| {
                let year = i32::try_from(year?).ok()?;
                Some((year, total.unwrap_or(0.0)))
            })
            .collect();
        sums.sort_by_key(|(year, _)| *year);
        Ok(sums)
    }

    /// Sum of `value` per region, ascending by region name.
    pub fn sum_by_region(df: &DataFrame) -> Result<Vec<(String, f64)>, ProcessorError> {
        let grouped = df
            .clone()
            .lazy()
            .select([
                col(REGION).cast(DataType::String),
                col(VALUE).cast(DataType::Float64),
            ])
            .filter(col(REGION).is_not_null())
            .group_by([col(REGION)])
            .agg([col(VALUE).sum()])
            .collect()?;

        let regions = str_values(&grouped, REGION)?;
        let totals = f64_values(&grouped, VALUE)?;

        let mut sums: Vec<(String, f64)> = regions
            .into_iter()
            .zip(totals)
            .filter_map(|(region, total)| Some((region?, total.unwrap_or(0.0))))
            .collect();
        sums.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(sums)
    }

    /// The `n` regions with the highest summed value, descending.
    ///
    /// Equal totals keep alphabetical order.
    pub fn top_regions(df: &DataFrame, n: usize) -> Result<Vec<(String, f64)>, ProcessorError> {
        let mut sums = Self::sum_by_region(df)?;
        sums.sort_by(|a, b| b.1.total_cmp(&a.1));
        sums.truncate(n);
        Ok(sums)
    }

    /// The year with the largest summed value. Ties resolve to the earliest year.
    pub fn peak_year(df: &DataFrame) -> Result<Option<(i32, f64)>, ProcessorError> {
        let sums = Self::sum_by_year(df)?;
        let peak = sums.into_iter().fold(None, |best: Option<(i32, f64)>, (year, total)| {
            match best {
                Some((_, best_total)) if best_total >= total => best,
                _ => Some((year, total)),
            }
        });
        Ok(peak)
    }

    pub fn latest_year(df: &DataFrame) -> Result<Option<i32>, ProcessorError> {
        let years = i64_values(df, YEAR)?;
        Ok(years
            .into_iter()
            .flatten()
            .filter_map(|y| i32::try_from(y).ok())
            .max())
    }

    pub fn total_for_year(df: &DataFrame, year: i32) -> Result<f64, ProcessorError> {
        let filtered = df
            .clone()
            .lazy()
            .filter(col(YEAR).cast(DataType::Int64).eq(lit(i64::from(year))))
            .collect()?;
        Self::total_value(&filtered)
    }

    pub fn total_for_region(df: &DataFrame, region: &str) -> Result<f64, ProcessorError> {
        let filtered = df
            .clone()
            .lazy()
            .filter(col(REGION).eq(lit(region)))
            .collect()?;
        Self::total_value(&filtered)
    }

    /// Sum of the `value` column, nulls skipped.
    pub fn total_value(df: &DataFrame) -> Result<f64, ProcessorError> {
        Ok(f64_values(df, VALUE)?
            .into_iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .sum())
    }

    /// Distinct regions in order of first appearance.
    pub fn regions_in_order(df: &DataFrame) -> Result<Vec<String>, ProcessorError> {
        let mut seen = HashSet::new();
        Ok(str_values(df, REGION)?
            .into_iter()
            .flatten()
            .filter(|region| seen.insert(region.clone()))
            .collect())
    }

    /// Get sorted unique values from a column.
    pub fn unique_sorted(df: &DataFrame, column: &str) -> Vec<String> {
        let mut values: Vec<String> = str_values(df, column)
            .map(|values| values.into_iter().flatten().collect::<HashSet<_>>())
            .unwrap_or_default()
            .into_iter()
            .collect();
        values.sort();
        values
    }

    pub fn summary(df: &DataFrame) -> DatasetSummary {
        DatasetSummary {
            regions: Self::unique_sorted(df, REGION).len(),
            latest_year: Self::latest_year(df).ok().flatten(),
            records: df.height(),
        }
    }

    /// Materialize complete rows. Rows with a null in any field are skipped.
    pub fn sales_records(df: &DataFrame) -> Result<Vec<SalesRecord>, ProcessorError> {
        Self::require_columns(df, &[REGION, CATEGORY, PARAMETER, MODE, POWERTRAIN, YEAR, VALUE])?;

        let regions = str_values(df, REGION)?;
        let categories = str_values(df, CATEGORY)?;
        let parameters = str_values(df, PARAMETER)?;
        let modes = str_values(df, MODE)?;
        let powertrains = str_values(df, POWERTRAIN)?;
        let years = i64_values(df, YEAR)?;
        let values = f64_values(df, VALUE)?;

        let records = (0..df.height())
            .filter_map(|i| {
                Some(SalesRecord {
                    region: regions[i].clone()?,
                    category: categories[i].clone()?,
                    parameter: parameters[i].clone()?,
                    mode: modes[i].clone()?,
                    powertrain: powertrains[i].clone()?,
                    year: i32::try_from(years[i]?).ok()?,
                    value: values[i].filter(|v| !v.is_nan())?,
                })
            })
            .collect();
        Ok(records)
    }
}

fn str_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

fn i64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().collect())
}
