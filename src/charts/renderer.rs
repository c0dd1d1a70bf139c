//! Static Chart Renderer
//! Draws trend and bar charts to PNG or SVG with plotters.
//!
//! Layout:
//! 1. Title centered above the plot
//! 2. Trend: line with point markers, year on x, sales on y
//! 3. Regions: horizontal bars, largest at the top

use super::plotter::{Chart, ChartError, RegionBarChart, TrendChart};
use crate::stats::format_count;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;
use tracing::info;

const LINE: RGBColor = RGBColor(52, 152, 219); // Blue
const BAR: RGBColor = RGBColor(46, 204, 113); // Green
const GRID: RGBColor = RGBColor(200, 200, 200);

const FONT: &str = "sans-serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Svg,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Result<Self, ChartError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "png" => Ok(Self::Png),
            "svg" => Ok(Self::Svg),
            _ => Err(ChartError::UnsupportedFormat(extension)),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render `chart` to `path`; the extension picks PNG or SVG.
    pub fn render(chart: &Chart, path: &Path, size: (u32, u32)) -> Result<(), ChartError> {
        if chart.is_empty() {
            return Err(ChartError::NoData(chart.title().to_string()));
        }

        match ImageFormat::from_path(path)? {
            ImageFormat::Png => Self::draw(chart, BitMapBackend::new(path, size).into_drawing_area())?,
            ImageFormat::Svg => Self::draw(chart, SVGBackend::new(path, size).into_drawing_area())?,
        }
        info!(path = %path.display(), title = chart.title(), "Rendered chart");
        Ok(())
    }

    fn draw<DB: DrawingBackend>(chart: &Chart, root: DrawingArea<DB, Shift>) -> Result<(), ChartError> {
        root.fill(&WHITE).map_err(render_err)?;
        match chart {
            Chart::Trend(trend) => Self::draw_trend(&root, trend)?,
            Chart::RegionBars(bars) => Self::draw_region_bars(&root, bars)?,
        }
        root.present().map_err(render_err)
    }

    fn draw_trend<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        trend: &TrendChart,
    ) -> Result<(), ChartError> {
        let (first, last) = match (trend.points.first(), trend.points.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => return Err(ChartError::NoData(trend.title.clone())),
        };
        let y_max = Self::axis_max(trend.points.iter().map(|p| p.1));

        let mut chart = ChartBuilder::on(root)
            .caption(&trend.title, (FONT, 28))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(90)
            .build_cartesian_2d((first - 1)..(last + 1), 0f64..y_max)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .light_line_style(GRID.mix(0.3))
            .x_desc("Year")
            .y_desc("Total EV Sales")
            .x_label_formatter(&|year| year.to_string())
            .y_label_formatter(&|v| format_count(*v))
            .draw()
            .map_err(render_err)?;

        chart
            .draw_series(LineSeries::new(trend.points.iter().copied(), LINE.stroke_width(3)))
            .map_err(render_err)?;
        chart
            .draw_series(
                trend
                    .points
                    .iter()
                    .map(|&point| Circle::new(point, 4, LINE.filled())),
            )
            .map_err(render_err)?;
        Ok(())
    }

    fn draw_region_bars<DB: DrawingBackend>(
        root: &DrawingArea<DB, Shift>,
        chart_data: &RegionBarChart,
    ) -> Result<(), ChartError> {
        let n = chart_data.bars.len();
        let x_max = Self::axis_max(chart_data.bars.iter().map(|b| b.1));
        // Row 0 is drawn at the bottom, so bar `i` goes to row `n - 1 - i`.
        let label_for = |row: usize| -> String {
            n.checked_sub(row + 1)
                .and_then(|i| chart_data.bars.get(i))
                .map(|(region, _)| region.clone())
                .unwrap_or_default()
        };

        let mut chart = ChartBuilder::on(root)
            .caption(&chart_data.title, (FONT, 28))
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(160)
            .build_cartesian_2d(0f64..x_max, (0usize..n).into_segmented())
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .light_line_style(GRID.mix(0.3))
            .x_desc("Total EV Sales")
            .x_label_formatter(&|v| format_count(*v))
            .y_labels(n)
            .y_label_formatter(&|v| match v {
                SegmentValue::CenterOf(row) => label_for(*row),
                _ => String::new(),
            })
            .draw()
            .map_err(render_err)?;

        chart
            .draw_series(chart_data.bars.iter().enumerate().map(|(i, (_, total))| {
                let row = n - 1 - i;
                let mut bar = Rectangle::new(
                    [
                        (0.0, SegmentValue::Exact(row)),
                        (*total, SegmentValue::Exact(row + 1)),
                    ],
                    BAR.filled(),
                );
                bar.set_margin(4, 4, 0, 0);
                bar
            }))
            .map_err(render_err)?;
        Ok(())
    }

    /// Upper axis bound with headroom; never zero so the range is valid.
    fn axis_max(values: impl Iterator<Item = f64>) -> f64 {
        let max = values.filter(|v| v.is_finite()).fold(0.0, f64::max);
        if max > 0.0 {
            max * 1.1
        } else {
            1.0
        }
    }
}

fn render_err<E: std::error::Error>(e: E) -> ChartError {
    ChartError::Render(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_extension() {
        assert_eq!(ImageFormat::from_path(Path::new("a/trend.png")).unwrap(), ImageFormat::Png);
        assert_eq!(ImageFormat::from_path(Path::new("trend.SVG")).unwrap(), ImageFormat::Svg);
        assert!(matches!(
            ImageFormat::from_path(Path::new("trend.pdf")),
            Err(ChartError::UnsupportedFormat(ext)) if ext == "pdf"
        ));
        assert!(ImageFormat::from_path(Path::new("trend")).is_err());
    }

    #[test]
    fn empty_chart_is_not_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trend.png");
        let chart = Chart::Trend(TrendChart {
            title: "EV Sales Trend".to_string(),
            points: Vec::new(),
        });
        assert!(matches!(
            StaticChartRenderer::render(&chart, &path, (640, 480)),
            Err(ChartError::NoData(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn axis_bound_has_headroom() {
        assert!((StaticChartRenderer::axis_max([10.0, 20.0].into_iter()) - 22.0).abs() < 1e-9);
        assert_eq!(StaticChartRenderer::axis_max([0.0, f64::NAN].into_iter()), 1.0);
    }
}
