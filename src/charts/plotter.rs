//! Chart Plotter Module
//! Turns the sales data into chart-ready series. Pure functions; drawing
//! happens in the renderer.

use crate::data::{DataProcessor, ProcessorError};
use polars::prelude::DataFrame;
use thiserror::Error;

pub const TREND_TITLE: &str = "EV Sales Trend";
pub const TOP_REGIONS_TITLE: &str = "Top 10 Regions by Total Sales";
pub const TOP_REGION_LIMIT: usize = 10;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error(transparent)]
    Data(#[from] ProcessorError),
    #[error("No data to plot for '{0}'")]
    NoData(String),
    #[error("Unsupported chart format '{0}', use .png or .svg")]
    UnsupportedFormat(String),
    #[error("Failed to draw chart: {0}")]
    Render(String),
}

/// Summed sales per year, ascending by year.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendChart {
    pub title: String,
    pub points: Vec<(i32, f64)>,
}

/// Summed sales per region, largest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBarChart {
    pub title: String,
    pub bars: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Trend(TrendChart),
    RegionBars(RegionBarChart),
}

impl Chart {
    pub fn title(&self) -> &str {
        match self {
            Chart::Trend(c) => &c.title,
            Chart::RegionBars(c) => &c.title,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Chart::Trend(c) => c.points.is_empty(),
            Chart::RegionBars(c) => c.bars.is_empty(),
        }
    }
}

impl From<TrendChart> for Chart {
    fn from(chart: TrendChart) -> Self {
        Chart::Trend(chart)
    }
}

impl From<RegionBarChart> for Chart {
    fn from(chart: RegionBarChart) -> Self {
        Chart::RegionBars(chart)
    }
}

pub struct ChartPlotter;

impl ChartPlotter {
    /// Line chart of total "EV sales" per year.
    pub fn global_trend(df: &DataFrame) -> Result<TrendChart, ChartError> {
        let ev_sales = DataProcessor::filter_ev_sales(df)?;
        Ok(TrendChart {
            title: TREND_TITLE.to_string(),
            points: DataProcessor::sum_by_year(&ev_sales)?,
        })
    }

    /// Horizontal bars for the ten regions with the most "EV sales".
    pub fn top_regions(df: &DataFrame) -> Result<RegionBarChart, ChartError> {
        let ev_sales = DataProcessor::filter_ev_sales(df)?;
        Ok(RegionBarChart {
            title: TOP_REGIONS_TITLE.to_string(),
            bars: DataProcessor::top_regions(&ev_sales, TOP_REGION_LIMIT)?,
        })
    }

    /// Both charts for `df`, trend first.
    pub fn all(df: &DataFrame) -> Result<Vec<Chart>, ChartError> {
        Ok(vec![Self::global_trend(df)?.into(), Self::top_regions(df)?.into()])
    }
}
