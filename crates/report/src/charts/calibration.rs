use nt_research_backtest::{clip_tstats, CalibrationRow, CountHeatmap, Interval, TimeBinTotal};
use nt_research_core::ChartConfig;
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use super::{
    area_error, config_error, drawing_error, line_chart, prepare, saved, segment_count,
    segment_label, skip, LineChart, Series, FONT,
};
use crate::error::Result;

/// T statistics are clipped to `[-TSTAT_BOUND, TSTAT_BOUND]` before plotting.
pub const TSTAT_BOUND: f64 = 10.0;

const BAR_GRAY: RGBColor = RGBColor(105, 105, 105);
const PRICE_BLUE: RGBColor = RGBColor(70, 110, 180);
const RESULT_ORANGE: RGBColor = RGBColor(230, 140, 50);

/// Percentage won per price bin with the mean price as the perfect-calibration line.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn calibration_bars(
    path: &Path,
    rows: &[CalibrationRow],
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    if rows.is_empty() {
        return Ok(skip(path));
    }
    prepare(path)?;

    let labels: Vec<String> = rows
        .iter()
        .map(|r| r.price_bin.map_or_else(|| "-".to_string(), |b| b.to_string()))
        .collect();
    let n = segment_count(rows.len());

    let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(area_error)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(title, (FONT, 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n).into_segmented(), 0.0..105.0)
        .map_err(config_error)?;

    ctx.configure_mesh()
        .disable_x_mesh()
        .x_labels(rows.len())
        .x_label_formatter(&|v| segment_label(&labels, v))
        .x_desc("Price Group")
        .y_desc("Percentage Won")
        .label_style((FONT, 18))
        .axis_desc_style((FONT, 22))
        .draw()
        .map_err(drawing_error)?;

    ctx.draw_series(rows.iter().zip(0..).map(|(row, i)| {
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), row.result_mean)],
            BAR_GRAY.filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))
    .map_err(drawing_error)?;

    ctx.draw_series(LineSeries::new(
        rows.iter()
            .zip(0..)
            .map(|(row, i)| (SegmentValue::CenterOf(i), row.price_mean)),
        RED.stroke_width(2),
    ))
    .map_err(drawing_error)?
    .label("Perfect Calibration")
    .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font((FONT, 16))
        .draw()
        .map_err(drawing_error)?;

    root.present().map_err(drawing_error)?;
    saved(path)
}

/// Mean price next to percentage won for each time bin of one price bin.
///
/// Tick labels carry the bucket t statistic. Bins starting at 90 or above
/// are zoomed to `90..100`.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn top_bin_bars(
    path: &Path,
    rows: &[CalibrationRow],
    price_bin: &Interval,
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    if rows.is_empty() {
        return Ok(skip(path));
    }
    prepare(path)?;

    let labels: Vec<String> = rows
        .iter()
        .map(|r| {
            let bin = r.time_bin.map_or_else(|| "-".to_string(), |b| b.to_string());
            let tstat = r.tstat.map_or_else(|| "-".to_string(), |t| format!("{t:.2}"));
            format!("{bin} (t={tstat})")
        })
        .collect();
    let n = segment_count(rows.len());
    let y_range = if price_bin.lower >= 90.0 { 90.0..100.0 } else { 0.0..105.0 };

    let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(area_error)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(title, (FONT, 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n).into_segmented(), y_range.clone())
        .map_err(config_error)?;

    ctx.configure_mesh()
        .disable_x_mesh()
        .x_labels(rows.len())
        .x_label_formatter(&|v| segment_label(&labels, v))
        .x_desc("Time Bin (T-stat)")
        .label_style((FONT, 16))
        .axis_desc_style((FONT, 22))
        .draw()
        .map_err(drawing_error)?;

    let floor = y_range.start;
    let bars = move |value: fn(&CalibrationRow) -> f64, left: bool, color: RGBColor| {
        rows.iter().zip(0..).map(move |(row, i)| {
            let (from, to) = if left {
                (SegmentValue::Exact(i), SegmentValue::CenterOf(i))
            } else {
                (SegmentValue::CenterOf(i), SegmentValue::Exact(i + 1))
            };
            let mut bar = Rectangle::new([(from, floor), (to, value(row))], color.filled());
            bar.set_margin(0, 0, 4, 4);
            bar
        })
    };

    ctx.draw_series(bars(|r| r.price_mean, true, PRICE_BLUE))
        .map_err(drawing_error)?
        .label("Price Mean")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], PRICE_BLUE.filled()));
    ctx.draw_series(bars(|r| r.result_mean, false, RESULT_ORANGE))
        .map_err(drawing_error)?
        .label("Result Mean")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], RESULT_ORANGE.filled()));

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .label_font((FONT, 16))
        .draw()
        .map_err(drawing_error)?;

    root.present().map_err(drawing_error)?;
    saved(path)
}

/// One series per price bin of `(trade_time_mean, value)` points in time order.
/// Rows where `value` is `None` are left out.
pub fn price_bin_series(
    rows: &[CalibrationRow],
    value: impl Fn(&CalibrationRow) -> Option<f64>,
) -> Vec<Series> {
    let mut by_bin: BTreeMap<Option<Interval>, Vec<(f64, f64)>> = BTreeMap::new();
    for row in rows {
        if let Some(y) = value(row) {
            by_bin
                .entry(row.price_bin)
                .or_default()
                .push((row.trade_time_mean, y));
        }
    }

    by_bin
        .into_iter()
        .map(|(bin, mut points)| {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            let label = bin.map_or_else(|| "-".to_string(), |b| b.to_string());
            Series::new(label, points)
        })
        .collect()
}

/// Percentage won over time, one line per price bin.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn calibration_over_time_chart(
    path: &Path,
    rows: &[CalibrationRow],
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    let chart = LineChart::new(
        title,
        "Mean Elapsed Time",
        "Percentage Won",
        price_bin_series(rows, |r| Some(r.result_mean)),
    )
    .with_y_range(0.0..105.0);
    line_chart(path, &chart, config)
}

/// Trade count of one price bin against the total over time.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn count_chart(
    path: &Path,
    rows: &[CalibrationRow],
    totals: &[TimeBinTotal],
    price_bin: &Interval,
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    let bin_points = rows
        .iter()
        .filter(|r| r.price_bin.as_ref() == Some(price_bin))
        .map(|r| (r.trade_time_mean, r.count as f64))
        .collect();
    let total_points = totals
        .iter()
        .map(|t| (t.trade_time_mean, t.count as f64))
        .collect();

    let chart = LineChart::new(
        title,
        "Mean Elapsed Time",
        "Count",
        vec![
            Series::new(format!("{price_bin} Count"), bin_points),
            Series::new("Total", total_points),
        ],
    );
    line_chart(path, &chart, config)
}

/// T statistic over time, clipped to [`TSTAT_BOUND`]. With `price_bin` set,
/// only that bin is drawn.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn tstat_chart(
    path: &Path,
    rows: &[CalibrationRow],
    price_bin: Option<&Interval>,
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    let selected: Vec<CalibrationRow> = rows
        .iter()
        .filter(|r| price_bin.is_none() || r.price_bin.as_ref() == price_bin)
        .cloned()
        .collect();
    let clipped = clip_tstats(&selected, TSTAT_BOUND);

    let x_desc = format!("Mean Elapsed Time (t-stats clipped to [-{TSTAT_BOUND}, {TSTAT_BOUND}])");
    let chart = LineChart::new(title, &x_desc, "T-Stat", price_bin_series(&clipped, |r| r.tstat))
        .with_y_range(-(TSTAT_BOUND + 1.0)..(TSTAT_BOUND + 1.0))
        .with_reference(0.0);
    line_chart(path, &chart, config)
}

/// Distinct-ticker counts per (price bin, time bin), highest price bin on top.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn heatmap_chart(
    path: &Path,
    heatmap: &CountHeatmap,
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    if heatmap.is_empty() {
        return Ok(skip(path));
    }
    prepare(path)?;

    let cols = segment_count(heatmap.time_bins.len());
    let rows = segment_count(heatmap.price_bins.len());
    // Row 0 of the heatmap is drawn at the top.
    let price_labels: Vec<String> = heatmap
        .price_bins
        .iter()
        .rev()
        .map(ToString::to_string)
        .collect();
    let time_labels: Vec<String> = heatmap.time_bins.iter().map(ToString::to_string).collect();
    let max = heatmap.max_count().max(1) as f64;

    let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(area_error)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(title, (FONT, 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(110)
        .build_cartesian_2d((0..cols).into_segmented(), (0..rows).into_segmented())
        .map_err(config_error)?;

    ctx.configure_mesh()
        .disable_mesh()
        .x_labels(heatmap.time_bins.len())
        .y_labels(heatmap.price_bins.len())
        .x_label_formatter(&|v| segment_label(&time_labels, v))
        .y_label_formatter(&|v| segment_label(&price_labels, v))
        .x_desc("Time Bin")
        .y_desc("Price Bin")
        .label_style((FONT, 16))
        .axis_desc_style((FONT, 22))
        .draw()
        .map_err(drawing_error)?;

    let cells: Vec<(i32, i32, usize)> = heatmap
        .counts
        .iter()
        .zip(0..)
        .flat_map(|(counts, row)| {
            counts
                .iter()
                .zip(0..)
                .filter_map(move |(count, col)| count.map(|c| (col, rows - 1 - row, c)))
        })
        .collect();

    ctx.draw_series(cells.iter().map(|&(col, row, count)| {
        let shade = count as f64 / max;
        Rectangle::new(
            [
                (SegmentValue::Exact(col), SegmentValue::Exact(row)),
                (SegmentValue::Exact(col + 1), SegmentValue::Exact(row + 1)),
            ],
            HSLColor(0.6, 0.7, 0.92 - 0.55 * shade).filled(),
        )
    }))
    .map_err(drawing_error)?;

    ctx.draw_series(cells.iter().map(|&(col, row, count)| {
        Text::new(
            count.to_string(),
            (SegmentValue::CenterOf(col), SegmentValue::CenterOf(row)),
            (FONT, 16).into_font().color(&BLACK),
        )
    }))
    .map_err(drawing_error)?;

    root.present().map_err(drawing_error)?;
    saved(path)
}
