//! Charts module - chart data and rendering

mod plotter;
mod renderer;

pub use plotter::{
    Chart, ChartError, ChartPlotter, RegionBarChart, TrendChart, TOP_REGIONS_TITLE,
    TOP_REGION_LIMIT, TREND_TITLE,
};
pub use renderer::{ImageFormat, StaticChartRenderer};
