//! PNG charts drawn with [`plotters`].
//!
//! Every chart function returns `Ok(false)` without touching the file system
//! when there is nothing to draw.

mod calibration;
mod performance;

pub use calibration::{
    calibration_bars, calibration_over_time_chart, count_chart, heatmap_chart, price_bin_series,
    top_bin_bars, tstat_chart, TSTAT_BOUND,
};
pub use performance::{calibration_sweep_chart, equity_chart, regression_chart, sharpe_chart};

use nt_research_core::ChartConfig;
use plotters::prelude::*;
use std::fmt::Display;
use std::fs;
use std::ops::Range;
use std::path::Path;

use crate::error::{ReportError, Result};

const FONT: &str = "sans-serif";

/// One labelled line.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    #[must_use]
    pub fn new(label: impl Into<String>, points: Vec<(f64, f64)>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }
}

/// A multi-series line chart.
#[derive(Debug, Clone)]
pub struct LineChart<'a> {
    pub title: &'a str,
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    pub series: Vec<Series>,
    /// Fixed y axis; derived from the data when `None`.
    pub y_range: Option<Range<f64>>,
    /// Horizontal reference line.
    pub reference: Option<f64>,
}

impl<'a> LineChart<'a> {
    #[must_use]
    pub fn new(title: &'a str, x_desc: &'a str, y_desc: &'a str, series: Vec<Series>) -> Self {
        Self {
            title,
            x_desc,
            y_desc,
            series,
            y_range: None,
            reference: None,
        }
    }

    #[must_use]
    pub fn with_y_range(mut self, range: Range<f64>) -> Self {
        self.y_range = Some(range);
        self
    }

    #[must_use]
    pub fn with_reference(mut self, y: f64) -> Self {
        self.reference = Some(y);
        self
    }

    fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }
}

/// Draws a line chart with a legend.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn line_chart(path: &Path, chart: &LineChart<'_>, config: &ChartConfig) -> Result<bool> {
    if chart.is_empty() {
        return Ok(skip(path));
    }
    prepare(path)?;

    let points = || chart.series.iter().flat_map(|s| s.points.iter());
    let x_range = padded_range(points().map(|(x, _)| *x)).unwrap_or(0.0..1.0);
    let y_range = match &chart.y_range {
        Some(range) => range.clone(),
        None => padded_range(points().map(|(_, y)| *y).chain(chart.reference))
            .unwrap_or(0.0..1.0),
    };

    let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(area_error)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(chart.title, (FONT, 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range.clone(), y_range)
        .map_err(config_error)?;

    ctx.configure_mesh()
        .x_desc(chart.x_desc)
        .y_desc(chart.y_desc)
        .label_style((FONT, 18))
        .axis_desc_style((FONT, 22))
        .draw()
        .map_err(drawing_error)?;

    if let Some(y) = chart.reference {
        ctx.draw_series(LineSeries::new(
            [(x_range.start, y), (x_range.end, y)],
            BLACK.mix(0.6),
        ))
        .map_err(drawing_error)?;
    }

    for (i, series) in chart.series.iter().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        ctx.draw_series(LineSeries::new(series.points.iter().copied(), color.stroke_width(2)))
            .map_err(drawing_error)?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        ctx.draw_series(
            series
                .points
                .iter()
                .map(|p| Circle::new(*p, 3, color.filled())),
        )
        .map_err(drawing_error)?;
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font((FONT, 16))
        .draw()
        .map_err(drawing_error)?;

    root.present().map_err(drawing_error)?;
    saved(path)
}

/// `min..max` widened by 5% on both sides, or by 1 when all values are equal.
/// Non-finite values are ignored.
pub(crate) fn padded_range(values: impl Iterator<Item = f64>) -> Option<Range<f64>> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    if min == max {
        return Some((min - 1.0)..(max + 1.0));
    }
    let pad = (max - min) * 0.05;
    Some((min - pad)..(max + pad))
}

/// Label of segment `index`, or empty outside the labels.
pub(crate) fn segment_label<T: Display>(labels: &[T], value: &SegmentValue<i32>) -> String {
    match value {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => usize::try_from(*i)
            .ok()
            .and_then(|i| labels.get(i))
            .map(ToString::to_string)
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    }
}

pub(crate) fn segment_count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

pub(crate) fn skip(path: &Path) -> bool {
    tracing::warn!("No data to plot, skipping {}", path.display());
    false
}

pub(crate) fn prepare(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub(crate) fn saved(path: &Path) -> Result<bool> {
    tracing::info!("Saved chart {}", path.display());
    Ok(true)
}

pub(crate) fn area_error<E: Display>(e: E) -> ReportError {
    ReportError::DrawingArea(e.to_string())
}

pub(crate) fn config_error<E: Display>(e: E) -> ReportError {
    ReportError::ChartConfig(e.to_string())
}

pub(crate) fn drawing_error<E: Display>(e: E) -> ReportError {
    ReportError::Drawing(e.to_string())
}
