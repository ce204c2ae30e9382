//! Merger arbitrage study.
//!
//! Near-certain contracts are bought late and held to resolution. Besides the
//! shared experiments this study sweeps entry time and price, backtests a
//! fixed entry rule and regresses P&L on entry price.

use anyhow::Result;
use clap::{Args, Subcommand};
use nt_research_backtest::{
    calibration_sweep, default_entry_times, first_trades, fit_pnl_regression, performance_sweep,
    pnl_by_price, select_ranges, studies, CalibrationSweepRow, PerformanceSweepRow, PnlPoint,
    PriceRange, PriceSource, ProfitRow, Study,
};
use nt_research_core::MetricsFormatter;
use nt_research_data::ToFrame;
use nt_research_report::charts::{calibration_sweep_chart, regression_chart, sharpe_chart};
use nt_research_report::{
    coefficient_rows, display_rows, summary_rows, CalibrationSweepTableRow,
    PerformanceSweepTableRow, PnlTableRow, ProfitTableRow,
};

use super::context::Context;
use super::experiments::{
    run_calibration, run_calibration_over_time, run_performance, CalibrationArgs,
    CalibrationOverTimeArgs, PerformanceArgs,
};

#[derive(Subcommand, Debug, Clone)]
pub enum MergerCommand {
    /// Experiment 1: calibration of the first trades per price bin
    Calibration(CalibrationArgs),
    /// Experiment 2: calibration per price and time bin
    CalibrationOverTime(CalibrationOverTimeArgs),
    /// Experiment 3: performance of the top price bin
    Performance(PerformanceArgs),
    /// Fine calibration of one price range across entry times
    CalibrationSweep(CalibrationSweepArgs),
    /// Buy the first quote after a fixed entry time inside a price range
    Backtest(BacktestArgs),
    /// Regress mean P&L on entry price
    Regression(RegressionArgs),
    /// Return statistics for every entry time and price decile
    PerformanceSweep(PerformanceSweepArgs),
}

/// Arguments for the calibration sweep.
#[derive(Args, Debug, Clone)]
pub struct CalibrationSweepArgs {
    /// Number of equal-width price bins
    #[arg(long, default_value = "100")]
    pub n_bins: usize,

    /// Lowest bin kept, inclusive
    #[arg(long, default_value = "90")]
    pub min_price: f64,

    /// Highest bin kept, inclusive
    #[arg(long, default_value = "100")]
    pub max_price: f64,

    /// Comma-separated entry times in minutes (default: 30,60,...,180)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub entry_times: Vec<i64>,
}

/// Arguments for the fixed-entry backtest.
#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    /// Entry time in minutes after event start
    #[arg(long, default_value = "60", allow_negative_numbers = true)]
    pub entry_after: i64,

    /// Lowest price bought, inclusive
    #[arg(long, default_value = "90")]
    pub min_price: f64,

    /// Highest price bought, inclusive
    #[arg(long, default_value = "99")]
    pub max_price: f64,
}

/// Arguments for the P&L regression.
#[derive(Args, Debug, Clone)]
pub struct RegressionArgs {
    /// Entry time in minutes after event start
    #[arg(long, default_value = "30", allow_negative_numbers = true)]
    pub entry_after: i64,

    /// Lowest entry price, inclusive
    #[arg(long, default_value = "90")]
    pub min_price: f64,

    /// Highest entry price, inclusive
    #[arg(long, default_value = "100")]
    pub max_price: f64,
}

/// Arguments for the performance sweep.
#[derive(Args, Debug, Clone)]
pub struct PerformanceSweepArgs {
    /// Comma-separated entry times in minutes (default: 30,60,...,180)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub entry_times: Vec<i64>,
}

/// Runs one merger experiment.
///
/// # Errors
/// Returns an error if the experiment fails.
pub async fn run_merger(ctx: &Context, command: MergerCommand) -> Result<()> {
    match command {
        MergerCommand::Calibration(args) => run_calibration(ctx, Study::Merger, args).await,
        MergerCommand::CalibrationOverTime(args) => {
            run_calibration_over_time(ctx, Study::Merger, args).await
        }
        MergerCommand::Performance(args) => run_performance(ctx, Study::Merger, args).await,
        MergerCommand::CalibrationSweep(args) => run_calibration_sweep(ctx, args).await,
        MergerCommand::Backtest(args) => run_backtest(ctx, args).await,
        MergerCommand::Regression(args) => run_regression(ctx, args).await,
        MergerCommand::PerformanceSweep(args) => run_performance_sweep(ctx, args).await,
    }
}

fn entry_times_or_default(entry_times: Vec<i64>) -> Vec<i64> {
    if entry_times.is_empty() {
        default_entry_times()
    } else {
        entry_times
    }
}

/// Mean price and mean result of the fine bins in a range, per entry time.
///
/// # Errors
/// Returns an error if `n_bins` is zero or the outputs cannot be written.
pub async fn run_calibration_sweep(ctx: &Context, args: CalibrationSweepArgs) -> Result<()> {
    let range = PriceRange::new(args.min_price, args.max_price);
    let entry_times = entry_times_or_default(args.entry_times);

    let quotes = ctx.load_quotes(&ctx.history_path()).await?;
    let rows = calibration_sweep(&quotes, &entry_times, args.n_bins, &range)?;

    let dir = ctx.output_dir(Study::Merger, "calibration_sweep");
    let table: Vec<CalibrationSweepTableRow> = display_rows(&rows);
    ctx.emit_table(
        &dir,
        "calibration_sweep",
        &table,
        &format!("Calibration of {range} over {} bins", args.n_bins),
    )?;
    ctx.chart("calibration_sweep", || {
        calibration_sweep_chart(&dir.join("calibration_sweep.png"), &rows, &range, ctx.charts())
    });

    ctx.save_frame(&CalibrationSweepRow::to_frame(&rows)).await
}

/// Backtests the first quote at or after the entry time inside a price range.
///
/// # Errors
/// Returns an error if the outputs cannot be written.
pub async fn run_backtest(ctx: &Context, args: BacktestArgs) -> Result<()> {
    let range = PriceRange::new(args.min_price, args.max_price);

    let quotes = ctx.load_quotes(&ctx.history_path()).await?;
    let (profits, summary) = studies::backtest(&quotes, args.entry_after, &range);
    println!("{}", MetricsFormatter::format(&summary));

    let dir = ctx.output_dir(Study::Merger, "backtest");
    ctx.emit_table(&dir, "summary", &summary_rows(&summary), &summary.name)?;
    let trades: Vec<ProfitTableRow> = display_rows(&profits);
    ctx.emit_table(&dir, "trades", &trades, "Trades")?;

    ctx.save_frame(&ProfitRow::to_frame(&profits)).await
}

/// Regresses mean P&L per entry price on the price.
///
/// # Errors
/// Returns an error with too few distinct prices to fit, or if the outputs
/// cannot be written.
pub async fn run_regression(ctx: &Context, args: RegressionArgs) -> Result<()> {
    let range = PriceRange::new(args.min_price, args.max_price);

    let quotes = ctx.load_quotes(&ctx.history_path()).await?;
    let trades = first_trades(&quotes, args.entry_after, PriceSource::AskClose);
    let points = pnl_by_price(&trades, &range);

    let dir = ctx.output_dir(Study::Merger, "regression");
    let table: Vec<PnlTableRow> = display_rows(&points);
    ctx.emit_table(
        &dir,
        "pnl_by_price",
        &table,
        &format!("Mean P&L per price in {range} at t >= {}", args.entry_after),
    )?;

    let fit = fit_pnl_regression(&points)?;
    ctx.emit_table(
        &dir,
        "regression",
        &coefficient_rows(&fit, "Trade Price"),
        "OLS: Mean P&L ~ Trade Price",
    )?;
    ctx.chart("regression", || {
        regression_chart(
            &dir.join("regression.png"),
            &points,
            &fit,
            &format!("Mean P&L vs Trade Price in {range}"),
            ctx.charts(),
        )
    });

    ctx.save_frame(&PnlPoint::to_frame(&points)).await
}

/// Return statistics for every entry time and price decile.
///
/// # Errors
/// Returns an error if the outputs cannot be written.
pub async fn run_performance_sweep(ctx: &Context, args: PerformanceSweepArgs) -> Result<()> {
    let entry_times = entry_times_or_default(args.entry_times);
    let ranges = PriceRange::deciles();

    let quotes = ctx.load_quotes(&ctx.history_path()).await?;
    let rows = performance_sweep(&quotes, &entry_times, &ranges);

    let dir = ctx.output_dir(Study::Merger, "performance_sweep");
    let table: Vec<PerformanceSweepTableRow> = display_rows(&rows);
    ctx.emit_table(&dir, "performance_sweep", &table, "Performance by Entry Time and Price")?;

    let charted = select_ranges(&rows, &[PriceRange::new(0.0, 10.0), PriceRange::new(90.0, 100.0)]);
    ctx.chart("sharpe", || {
        sharpe_chart(
            &dir.join("sharpe.png"),
            &charted,
            "Sharpe Ratio by Entry Time",
            ctx.charts(),
        )
    });

    ctx.save_frame(&PerformanceSweepRow::to_frame(&rows)).await
}
