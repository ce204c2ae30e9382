use clap::{Parser, Subcommand};

mod commands;

use commands::{
    run_db, run_merger, run_underdog, Context, DbCommand, GlobalArgs, MergerCommand,
    UnderdogCommand,
};

#[derive(Parser)]
#[command(name = "nt-research")]
#[command(
    about = "Calibration and performance studies of prediction-market contracts",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Underdog risk premium study
    #[command(subcommand)]
    Underdog(UnderdogCommand),
    /// Merger arbitrage study
    #[command(subcommand)]
    Merger(MergerCommand),
    /// PostgreSQL helpers
    #[command(subcommand)]
    Db(DbCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let ctx = Context::from_args(&cli.global)?;

    match cli.command {
        Commands::Underdog(command) => run_underdog(&ctx, command).await?,
        Commands::Merger(command) => run_merger(&ctx, command).await?,
        Commands::Db(command) => run_db(&ctx, command).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::merger::{CalibrationSweepArgs, PerformanceSweepArgs};
    use crate::commands::underdog::EquityArgs;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("nt-research").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_entry_times_parse() {
        let cli = parse(&["underdog", "calibration", "--entry-after", "-45"]);
        match cli.command {
            Commands::Underdog(UnderdogCommand::Calibration(args)) => {
                assert_eq!(args.entry_after, -45);
            }
            _ => panic!("expected underdog calibration"),
        }
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = parse(&[
            "merger",
            "performance",
            "--price-source",
            "mid",
            "--format",
            "html",
            "--results-dir",
            "out",
            "--no-charts",
        ]);
        assert_eq!(cli.global.format.as_deref(), Some("html"));
        assert_eq!(cli.global.results_dir.as_deref(), Some("out"));
        assert!(cli.global.no_charts);
        match cli.command {
            Commands::Merger(MergerCommand::Performance(args)) => {
                assert_eq!(args.price_source.as_deref(), Some("mid"));
                assert_eq!(args.entry_after, None);
            }
            _ => panic!("expected merger performance"),
        }
    }

    #[test]
    fn sweep_entry_times_are_comma_separated() {
        let cli = parse(&["merger", "calibration-sweep", "--entry-times", "-30,30,90"]);
        match cli.command {
            Commands::Merger(MergerCommand::CalibrationSweep(CalibrationSweepArgs {
                entry_times,
                n_bins,
                ..
            })) => {
                assert_eq!(entry_times, vec![-30, 30, 90]);
                assert_eq!(n_bins, 100);
            }
            _ => panic!("expected merger calibration-sweep"),
        }

        let cli = parse(&["merger", "performance-sweep"]);
        assert!(matches!(
            cli.command,
            Commands::Merger(MergerCommand::PerformanceSweep(PerformanceSweepArgs {
                ref entry_times
            })) if entry_times.is_empty()
        ));
    }

    #[test]
    fn equity_defaults() {
        let cli = parse(&["underdog", "equity", "--data", "daily.parquet"]);
        assert_eq!(cli.global.data.as_deref(), Some("daily.parquet"));
        match cli.command {
            Commands::Underdog(UnderdogCommand::Equity(EquityArgs {
                tz,
                min_price,
                max_price,
            })) => {
                assert_eq!(tz, None);
                assert!((min_price - 90.0).abs() < f64::EPSILON);
                assert!((max_price - 99.0).abs() < f64::EPSILON);
            }
            _ => panic!("expected underdog equity"),
        }
    }

    #[test]
    fn db_commands_collect_repeated_flags() {
        let cli = parse(&[
            "db", "run-file", "report.sql", "--param", "table=quotes", "--param", "limit=10",
        ]);
        match cli.command {
            Commands::Db(DbCommand::RunFile(args)) => {
                assert_eq!(args.path, "report.sql");
                assert_eq!(args.params, vec!["table=quotes", "limit=10"]);
            }
            _ => panic!("expected db run-file"),
        }

        let cli = parse(&["db", "query", "SELECT $1::int", "--bind", "-5"]);
        match cli.command {
            Commands::Db(DbCommand::Query(args)) => assert_eq!(args.binds, vec!["-5"]),
            _ => panic!("expected db query"),
        }
    }

    #[test]
    fn unknown_study_is_rejected() {
        assert!(Cli::try_parse_from(["nt-research", "election", "calibration"]).is_err());
    }
}
