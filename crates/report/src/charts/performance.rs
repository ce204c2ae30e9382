use nt_research_backtest::{
    CalibrationSweepRow, DailyReturn, PerformanceSweepRow, PnlPoint, PriceRange,
};
use nt_research_core::{ChartConfig, OlsFit};
use plotters::prelude::*;
use std::path::Path;

use super::{
    area_error, config_error, drawing_error, line_chart, padded_range, prepare, saved, skip,
    LineChart, Series, FONT,
};
use crate::error::Result;

/// Mean price and mean result of a price range against entry time.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn calibration_sweep_chart(
    path: &Path,
    rows: &[CalibrationSweepRow],
    range: &PriceRange,
    config: &ChartConfig,
) -> Result<bool> {
    let title = format!("Contracts in {range}");
    let chart = LineChart::new(
        &title,
        "Elapsed Time",
        "Mean Result/Price",
        vec![
            Series::new(
                "Mean Price",
                rows.iter().map(|r| (r.entry_time as f64, r.trade_price)).collect(),
            ),
            Series::new(
                "Mean Result",
                rows.iter().map(|r| (r.entry_time as f64, r.result)).collect(),
            ),
        ],
    );
    line_chart(path, &chart, config)
}

/// Sharpe ratio against entry time, one line per price range, with a zero line.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn sharpe_chart(
    path: &Path,
    rows: &[PerformanceSweepRow],
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    let mut groups: Vec<(PriceRange, Vec<(f64, f64)>)> = Vec::new();
    for row in rows {
        let Some(sharpe) = row.sharpe else {
            continue;
        };
        let point = (row.entry_time as f64, sharpe);
        match groups.iter_mut().find(|(range, _)| *range == row.price_range) {
            Some((_, points)) => points.push(point),
            None => groups.push((row.price_range, vec![point])),
        }
    }

    let series = groups
        .into_iter()
        .map(|(range, mut points)| {
            points.sort_by(|a, b| a.0.total_cmp(&b.0));
            Series::new(range.to_string(), points)
        })
        .collect();

    let chart =
        LineChart::new(title, "Entry Time", "Daily Sharpe Ratio", series).with_reference(0.0);
    line_chart(path, &chart, config)
}

/// Mean P&L per entry price with the fitted regression line.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn regression_chart(
    path: &Path,
    points: &[PnlPoint],
    fit: &OlsFit,
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    if points.is_empty() {
        return Ok(skip(path));
    }
    prepare(path)?;

    let x_range = padded_range(points.iter().map(|p| p.trade_price)).unwrap_or(0.0..100.0);
    let fitted = [
        (x_range.start, fit.predict(x_range.start)),
        (x_range.end, fit.predict(x_range.end)),
    ];
    let y_range = padded_range(
        points
            .iter()
            .map(|p| p.pnl_mean)
            .chain(fitted.iter().map(|(_, y)| *y)),
    )
    .unwrap_or(-1.0..1.0);

    let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(area_error)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(title, (FONT, 32))
        .margin(20)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(x_range, y_range)
        .map_err(config_error)?;

    ctx.configure_mesh()
        .x_desc("Trade Price")
        .y_desc("Mean P&L")
        .label_style((FONT, 18))
        .axis_desc_style((FONT, 22))
        .draw()
        .map_err(drawing_error)?;

    ctx.draw_series(
        points
            .iter()
            .map(|p| Circle::new((p.trade_price, p.pnl_mean), 4, BLUE.filled())),
    )
    .map_err(drawing_error)?
    .label("Mean P&L")
    .legend(|(x, y)| Circle::new((x + 10, y), 4, BLUE.filled()));

    ctx.draw_series(LineSeries::new(fitted, RED.stroke_width(2)))
        .map_err(drawing_error)?
        .label(format!(
            "Fit: {:.3} {:+.3}x (R² {:.3})",
            fit.intercept, fit.slope, fit.r_squared
        ))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

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

/// Cumulative return on top and drawdown below, both in percent.
///
/// # Errors
/// Returns an error if the chart cannot be drawn or saved.
pub fn equity_chart(
    path: &Path,
    days: &[DailyReturn],
    title: &str,
    config: &ChartConfig,
) -> Result<bool> {
    if days.is_empty() {
        return Ok(skip(path));
    }
    prepare(path)?;

    let last = i32::try_from(days.len()).unwrap_or(i32::MAX).max(2) - 1;
    let date_label = |i: &i32| {
        usize::try_from(*i)
            .ok()
            .and_then(|i| days.get(i))
            .map(|d| d.date.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    };
    let cumulative: Vec<(i32, f64)> = days
        .iter()
        .zip(0..)
        .map(|(d, i)| (i, d.cumulative_return))
        .collect();
    let drawdown: Vec<(i32, f64)> = days
        .iter()
        .zip(0..)
        .map(|(d, i)| (i, -d.drawdown * 100.0))
        .collect();

    let root = BitMapBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(area_error)?;
    let root = root
        .titled(title, (FONT, 32))
        .map_err(area_error)?;
    let split = i32::try_from(config.height * 3 / 5).unwrap_or(480);
    let (upper, lower) = root.split_vertically(split);

    let panels = [
        (&upper, "Cumulative Return (%)", &cumulative, BLUE),
        (&lower, "Drawdown (%)", &drawdown, RED),
    ];
    for (area, y_desc, series, color) in panels {
        let y_range =
            padded_range(series.iter().map(|(_, y)| *y).chain([0.0])).unwrap_or(-1.0..1.0);
        let mut ctx = ChartBuilder::on(area)
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d(0..last, y_range)
            .map_err(config_error)?;

        ctx.configure_mesh()
            .x_labels(8)
            .x_label_formatter(&date_label)
            .y_desc(y_desc)
            .label_style((FONT, 16))
            .axis_desc_style((FONT, 20))
            .draw()
            .map_err(drawing_error)?;

        ctx.draw_series(LineSeries::new(
            [(0, 0.0), (last, 0.0)],
            BLACK.mix(0.4),
        ))
        .map_err(drawing_error)?;
        ctx.draw_series(LineSeries::new(series.iter().copied(), color.stroke_width(2)))
            .map_err(drawing_error)?;
    }

    root.present().map_err(drawing_error)?;
    saved(path)
}
