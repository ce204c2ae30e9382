//! Experiments run by both studies: calibration, calibration over time and
//! hold-to-resolution performance.

use anyhow::Result;
use clap::Args;
use nt_research_backtest::{studies, CalibrationRow, Interval, PerformanceRow, PriceSource, Study};
use nt_research_data::ToFrame;
use nt_research_report::charts::{
    calibration_bars, calibration_over_time_chart, count_chart, heatmap_chart, top_bin_bars,
    tstat_chart,
};
use nt_research_report::{
    display_rows, CalibrationBinRow, CalibrationTimeRow, PerformanceTableRow, TradeTableRow,
};

use super::context::Context;

/// Arguments for the calibration experiment.
#[derive(Args, Debug, Clone)]
pub struct CalibrationArgs {
    /// Minutes after event start from which the first trade is taken
    #[arg(long, default_value = "-30", allow_negative_numbers = true)]
    pub entry_after: i64,
}

/// Arguments for the calibration-over-time experiment.
#[derive(Args, Debug, Clone)]
pub struct CalibrationOverTimeArgs {
    /// Window start in minutes after event start
    /// (exclusive for underdog, inclusive for merger)
    #[arg(long, default_value = "-180", allow_negative_numbers = true)]
    pub min: i64,

    /// Window end in minutes after event start (inclusive)
    #[arg(long, default_value = "180", allow_negative_numbers = true)]
    pub max: i64,

    /// Time bin width in minutes
    #[arg(long, default_value = "60")]
    pub interval: i64,

    /// Price bin to focus on, e.g. "(90, 99]" (default: the study's top bin)
    #[arg(long)]
    pub price_bin: Option<String>,

    /// Count only the first quote of each contract per bin pair
    #[arg(long)]
    pub first_per_bin: bool,
}

/// Arguments for the performance experiment.
#[derive(Args, Debug, Clone)]
pub struct PerformanceArgs {
    /// Entry time in minutes (default: -60 for underdog, -30 for merger)
    #[arg(long, allow_negative_numbers = true)]
    pub entry_after: Option<i64>,

    /// Price bin to trade, e.g. "(90, 99]" (default: the study's top bin)
    #[arg(long)]
    pub price_bin: Option<String>,

    /// Price column: ask or mid (default: ask for underdog, mid for merger)
    #[arg(long)]
    pub price_source: Option<String>,
}

fn price_bin(study: Study, raw: Option<&str>) -> Result<Interval> {
    raw.map_or_else(|| Ok(study.top_bin()), str::parse::<Interval>)
}

/// Runs the calibration experiment: one row per price bin of the first trades.
///
/// # Errors
/// Returns an error if the quotes cannot be loaded or the outputs cannot be written.
pub async fn run_calibration(ctx: &Context, study: Study, args: CalibrationArgs) -> Result<()> {
    let quotes = ctx.load_quotes(&ctx.history_path()).await?;
    let result = studies::calibration(&quotes, study, args.entry_after);

    let dir = ctx.output_dir(study, "calibration");
    let title = format!("Calibration of first trades at t >= {}", args.entry_after);
    let rows: Vec<CalibrationBinRow> = display_rows(&result.rows);
    ctx.emit_table(&dir, "calibration", &rows, &title)?;
    ctx.chart("calibration", || {
        calibration_bars(&dir.join("calibration.png"), &result.rows, &title, ctx.charts())
    });

    ctx.save_frame(&CalibrationRow::to_frame(&result.rows)).await
}

/// Runs the calibration-over-time experiment and draws all six of its charts.
///
/// # Errors
/// Returns an error for an invalid window or price bin, or if the outputs
/// cannot be written.
pub async fn run_calibration_over_time(
    ctx: &Context,
    study: Study,
    args: CalibrationOverTimeArgs,
) -> Result<()> {
    let window = study.time_window(args.min, args.max, args.interval)?;
    let top_bin = price_bin(study, args.price_bin.as_deref())?;
    let quotes = ctx.load_quotes(&ctx.history_path()).await?;
    let result =
        studies::calibration_over_time(&quotes, study, &window, top_bin, args.first_per_bin)?;

    let dir = ctx.output_dir(study, "calibration_over_time");
    let span = format!("{window} every {}m", args.interval);

    let rows: Vec<CalibrationTimeRow> = display_rows(&result.rows);
    let title = format!("Calibration over time {span}");
    ctx.emit_table(&dir, "calibration_over_time", &rows, &title)?;
    let top_rows: Vec<CalibrationTimeRow> = display_rows(&result.top_bin_rows);
    let title = format!("Price bin {top_bin} over time {span}");
    ctx.emit_table(&dir, "top_bin", &top_rows, &title)?;

    let charts = ctx.charts();
    ctx.chart("calibration_over_time", || {
        calibration_over_time_chart(
            &dir.join("calibration_over_time.png"),
            &result.rows,
            "Percentage Won over Time",
            charts,
        )
    });
    ctx.chart("top_bin", || {
        top_bin_bars(
            &dir.join("top_bin.png"),
            &result.top_bin_rows,
            &top_bin,
            &format!("Price vs Result in {top_bin}"),
            charts,
        )
    });
    ctx.chart("counts", || {
        count_chart(
            &dir.join("counts.png"),
            &result.rows,
            &result.totals,
            &top_bin,
            &format!("Trades in {top_bin} vs Total"),
            charts,
        )
    });
    ctx.chart("tstats", || {
        tstat_chart(&dir.join("tstats.png"), &result.rows, None, "T-Stat over Time", charts)
    });
    ctx.chart("top_bin_tstats", || {
        tstat_chart(
            &dir.join("top_bin_tstats.png"),
            &result.rows,
            Some(&top_bin),
            &format!("T-Stat over Time in {top_bin}"),
            charts,
        )
    });
    ctx.chart("heatmap", || {
        heatmap_chart(
            &dir.join("heatmap.png"),
            &result.heatmap,
            "Contracts per Price and Time Bin",
            charts,
        )
    });

    ctx.save_frame(&CalibrationRow::to_frame(&result.rows)).await
}

/// Runs the performance experiment: the Won/Lost/Total table and the lost trades.
///
/// # Errors
/// Returns an error for an invalid price bin or price source, or if the
/// outputs cannot be written.
pub async fn run_performance(ctx: &Context, study: Study, args: PerformanceArgs) -> Result<()> {
    let (default_entry, default_source) = match study {
        Study::Underdog => (-60, PriceSource::AskClose),
        Study::Merger => (-30, PriceSource::Mid),
    };
    let entry_after = args.entry_after.unwrap_or(default_entry);
    let price_source = args
        .price_source
        .as_deref()
        .map_or(Ok(default_source), str::parse::<PriceSource>)?;
    let bin = price_bin(study, args.price_bin.as_deref())?;

    let quotes = ctx.load_quotes(&ctx.history_path()).await?;
    let result = studies::performance(&quotes, study, entry_after, price_source, bin);

    let dir = ctx.output_dir(study, "performance");
    let rows: Vec<PerformanceTableRow> = display_rows(&result.table);
    ctx.emit_table(
        &dir,
        "performance",
        &rows,
        &format!("Performance in {bin} at t >= {entry_after} ({price_source} price)"),
    )?;
    let lost: Vec<TradeTableRow> = display_rows(&result.lost);
    ctx.emit_table(&dir, "lost_trades", &lost, &format!("Lost trades in {bin}"))?;

    ctx.save_frame(&PerformanceRow::to_frame(&result.table)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::GlobalArgs;
    use chrono::{Duration, TimeZone, Utc};
    use nt_research_data::{Outcome, ParquetStorage, QuoteRecord};
    use std::path::Path;

    fn quote(ticker: &str, minute: i64, ask: f64, won: bool) -> QuoteRecord {
        let start = Utc.with_ymd_and_hms(2025, 10, 5, 17, 0, 0).unwrap();
        let result = if won { Outcome::Yes } else { Outcome::No };
        QuoteRecord::new(ticker, start, start + Duration::minutes(minute), Some(ask), result)
    }

    fn context(root: &Path, format: &str) -> Context {
        let snapshot = root.join("history.parquet");
        let quotes = vec![
            quote("A", -120, 93.0, true),
            quote("A", -30, 95.0, true),
            quote("B", -30, 92.0, false),
            quote("C", -30, 45.0, true),
            quote("D", 30, 97.0, true),
        ];
        ParquetStorage::write_quotes(&snapshot, &quotes).unwrap();

        let args = GlobalArgs {
            config: root.join("missing.toml").display().to_string(),
            data: Some(snapshot.display().to_string()),
            results_dir: Some(root.join("results").display().to_string()),
            format: Some(format.to_string()),
            no_charts: true,
            ..GlobalArgs::default()
        };
        Context::from_args(&args).unwrap()
    }

    // ============================================
    // Calibration
    // ============================================

    #[tokio::test]
    async fn calibration_writes_table() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "csv");

        run_calibration(&ctx, Study::Underdog, CalibrationArgs { entry_after: -30 })
            .await
            .unwrap();

        let table = dir
            .path()
            .join("results/underdog_risk_premium/calibration/calibration.csv");
        let csv = std::fs::read_to_string(table).unwrap();
        assert!(csv.starts_with("Price Bin,"));
        assert!(csv.contains("\"(90, 99]\",3"));
    }

    #[test]
    fn price_bin_defaults_to_top_bin() {
        assert_eq!(price_bin(Study::Merger, None).unwrap(), Study::Merger.top_bin());
        assert_eq!(
            price_bin(Study::Underdog, Some("(80, 90]")).unwrap(),
            Interval::new(80.0, 90.0)
        );
        assert!(price_bin(Study::Underdog, Some("80-90")).is_err());
    }

    // ============================================
    // Performance
    // ============================================

    #[tokio::test]
    async fn performance_lists_lost_trades() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "text");
        let args = PerformanceArgs {
            entry_after: Some(-30),
            price_bin: None,
            price_source: Some("ask".to_string()),
        };

        run_performance(&ctx, Study::Underdog, args).await.unwrap();

        let out = dir.path().join("results/underdog_risk_premium/performance");
        let performance = std::fs::read_to_string(out.join("performance.txt")).unwrap();
        assert!(performance.contains("Won"));
        assert!(performance.contains("Total"));
        let lost = std::fs::read_to_string(out.join("lost_trades.txt")).unwrap();
        assert!(lost.lines().any(|line| line.starts_with("| B ")));
        assert!(!lost.contains("No data"));
    }

    #[tokio::test]
    async fn performance_rejects_unknown_price_source() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "text");
        let args = PerformanceArgs {
            entry_after: None,
            price_bin: None,
            price_source: Some("last".to_string()),
        };

        assert!(run_performance(&ctx, Study::Merger, args).await.is_err());
    }

    // ============================================
    // Calibration over time
    // ============================================

    #[tokio::test]
    async fn calibration_over_time_rejects_bad_window() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "text");
        let args = CalibrationOverTimeArgs {
            min: 180,
            max: -180,
            interval: 60,
            price_bin: None,
            first_per_bin: false,
        };

        assert!(run_calibration_over_time(&ctx, Study::Underdog, args).await.is_err());
    }

    #[tokio::test]
    async fn merger_calibration_over_time_counts_the_window_start() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), "csv");
        let args = CalibrationOverTimeArgs {
            min: -120,
            max: 60,
            interval: 60,
            price_bin: None,
            first_per_bin: false,
        };

        run_calibration_over_time(&ctx, Study::Merger, args).await.unwrap();

        let out = dir.path().join("results/merger_arbitrage/calibration_over_time");
        let top = std::fs::read_to_string(out.join("top_bin.csv")).unwrap();
        assert!(top.contains("(-inf, -60]"));
        assert!(top.contains("(0, inf]"));
        // Header plus the (-inf, -60], (-60, 0] and (0, inf] rows.
        assert_eq!(top.lines().count(), 4);
    }
}
