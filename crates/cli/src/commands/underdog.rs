//! Underdog risk premium study.
//!
//! Favourites priced in `(90, 99]` are bought and held to resolution to test
//! whether they win more often than their price implies.

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use clap::{Args, Subcommand};
use nt_research_backtest::{daily_equity, DailyReturn, PriceRange, Study};
use nt_research_core::MetricsFormatter;
use nt_research_data::ToFrame;
use nt_research_report::charts::equity_chart;
use nt_research_report::{display_rows, summary_rows, DailyReturnTableRow};

use super::context::Context;
use super::experiments::{
    run_calibration, run_calibration_over_time, run_performance, CalibrationArgs,
    CalibrationOverTimeArgs, PerformanceArgs,
};

#[derive(Subcommand, Debug, Clone)]
pub enum UnderdogCommand {
    /// Experiment 1: calibration of the first trades per price bin
    Calibration(CalibrationArgs),
    /// Experiment 2: calibration per price and time bin
    CalibrationOverTime(CalibrationOverTimeArgs),
    /// Experiment 3: performance of the top price bin
    Performance(PerformanceArgs),
    /// Experiment 4: daily equity curve of game-day favourites
    Equity(EquityArgs),
}

/// Arguments for the equity curve experiment.
#[derive(Args, Debug, Clone)]
pub struct EquityArgs {
    /// Timezone deciding the game day (default: from config)
    #[arg(long)]
    pub tz: Option<String>,

    /// Lowest price bought, inclusive
    #[arg(long, default_value = "90")]
    pub min_price: f64,

    /// Highest price bought, inclusive
    #[arg(long, default_value = "99")]
    pub max_price: f64,
}

/// Runs one underdog experiment.
///
/// # Errors
/// Returns an error if the experiment fails.
pub async fn run_underdog(ctx: &Context, command: UnderdogCommand) -> Result<()> {
    match command {
        UnderdogCommand::Calibration(args) => run_calibration(ctx, Study::Underdog, args).await,
        UnderdogCommand::CalibrationOverTime(args) => {
            run_calibration_over_time(ctx, Study::Underdog, args).await
        }
        UnderdogCommand::Performance(args) => run_performance(ctx, Study::Underdog, args).await,
        UnderdogCommand::Equity(args) => run_equity(ctx, args).await,
    }
}

fn parse_tz(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow!("Invalid timezone '{}': {}", name, e))
}

/// Builds the daily equity curve from the daily candle snapshot.
///
/// # Errors
/// Returns an error for an unknown timezone or if the outputs cannot be written.
pub async fn run_equity(ctx: &Context, args: EquityArgs) -> Result<()> {
    let tz = parse_tz(args.tz.as_deref().unwrap_or(&ctx.config.data.timezone))?;
    let range = PriceRange::new(args.min_price, args.max_price);

    let quotes = ctx.load_quotes(&ctx.daily_history_path()).await?;
    let curve = daily_equity(&quotes, tz, &range);
    let summary = curve.to_strategy_summary(&format!("Game-day favourites in {range}"));
    println!("{}", MetricsFormatter::format(&summary));

    let dir = ctx.output_dir(Study::Underdog, "equity");
    let days: Vec<DailyReturnTableRow> = display_rows(&curve.days);
    ctx.emit_table(&dir, "daily_returns", &days, &format!("Daily returns in {range} ({tz})"))?;
    ctx.emit_table(&dir, "summary", &summary_rows(&summary), "Equity Summary")?;
    ctx.chart("equity", || {
        equity_chart(
            &dir.join("equity.png"),
            &curve.days,
            &format!("Equity Curve {range}"),
            ctx.charts(),
        )
    });

    ctx.save_frame(&DailyReturn::to_frame(&curve.days)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::GlobalArgs;
    use chrono::{Duration, TimeZone, Utc};
    use nt_research_data::{Outcome, ParquetStorage, QuoteRecord};

    #[test]
    fn timezone_names_parse() {
        assert_eq!(parse_tz("America/Denver").unwrap(), chrono_tz::America::Denver);
        assert!(parse_tz("Mars/Olympus").is_err());
    }

    #[tokio::test]
    async fn equity_writes_daily_returns() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("daily.parquet");
        // 20:00 UTC is early afternoon in Denver, so both quotes fall on game day.
        let start = Utc.with_ymd_and_hms(2025, 10, 5, 20, 0, 0).unwrap();
        let next = start + Duration::days(1);
        let quotes = vec![
            QuoteRecord::new("A", start, start + Duration::hours(1), Some(95.0), Outcome::Yes),
            QuoteRecord::new("B", next, next + Duration::hours(1), Some(92.0), Outcome::No),
        ];
        ParquetStorage::write_quotes(&snapshot, &quotes).unwrap();

        let args = GlobalArgs {
            config: dir.path().join("missing.toml").display().to_string(),
            data: Some(snapshot.display().to_string()),
            results_dir: Some(dir.path().join("results").display().to_string()),
            format: Some("csv".to_string()),
            no_charts: true,
            ..GlobalArgs::default()
        };
        let ctx = Context::from_args(&args).unwrap();

        run_equity(
            &ctx,
            EquityArgs {
                tz: Some("America/Denver".to_string()),
                min_price: 90.0,
                max_price: 99.0,
            },
        )
        .await
        .unwrap();

        let out = dir.path().join("results/underdog_risk_premium/equity");
        let days = std::fs::read_to_string(out.join("daily_returns.csv")).unwrap();
        assert_eq!(days.lines().count(), 3);
        assert!(days.contains("2025-10-05"));
        assert!(days.contains("2025-10-06"));
        assert!(out.join("summary.csv").exists());
    }
}
