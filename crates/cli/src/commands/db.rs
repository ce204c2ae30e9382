//! PostgreSQL helper commands: ad-hoc queries, templated SQL files and
//! moving frames between parquet/CSV files and tables.

use anyhow::{anyhow, Context as _, Result};
use clap::{Args, Subcommand};
use nt_research_data::{
    parse_params, CsvStorage, Frame, ParquetStorage, QueryOutcome, QueryParam,
};
use std::path::Path;

use super::context::Context;

#[derive(Subcommand, Debug, Clone)]
pub enum DbCommand {
    /// Execute one SQL statement
    Query(QueryArgs),
    /// Execute a SQL file with {{ name }} placeholders
    RunFile(RunFileArgs),
    /// Load a parquet file into a table, replacing it
    Import(ImportArgs),
    /// Write a table to a parquet or CSV file
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// SQL statement, with $1, $2, ... for bound values
    pub sql: String,

    /// Positional values bound to $1, $2, ... (repeatable)
    #[arg(long = "bind", allow_hyphen_values = true)]
    pub binds: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunFileArgs {
    /// SQL file path
    pub path: String,

    /// Template value as key=value (repeatable)
    #[arg(long = "param")]
    pub params: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Parquet file to load
    #[arg(long)]
    pub input: String,

    /// Destination table
    #[arg(long)]
    pub table: String,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Source table
    #[arg(long)]
    pub table: String,

    /// Output file; the extension (.parquet or .csv) selects the format
    #[arg(long)]
    pub output: String,
}

/// File formats a table can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Parquet,
    Csv,
}

impl ExportFormat {
    fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("parquet") => Ok(ExportFormat::Parquet),
            Some("csv") => Ok(ExportFormat::Csv),
            _ => Err(anyhow!(
                "Unsupported output file '{}'. Use a .parquet or .csv extension",
                path.display()
            )),
        }
    }
}

fn write_local(path: &Path, frame: &Frame) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    match ExportFormat::from_path(path)? {
        ExportFormat::Parquet => ParquetStorage::write_frame(path, frame),
        ExportFormat::Csv => CsvStorage::write_frame(path, frame),
    }
}

fn print_outcome(outcome: &QueryOutcome) -> Result<()> {
    match outcome {
        QueryOutcome::Rows(rows) => {
            println!("{}", serde_json::to_string_pretty(rows)?);
            tracing::info!("{} rows", rows.len());
        }
        QueryOutcome::Affected(count) => println!("{count} rows affected"),
    }
    Ok(())
}

/// Runs one database command.
///
/// # Errors
/// Returns an error if no database URL is configured, a file cannot be read
/// or written, or a statement fails.
pub async fn run_db(ctx: &Context, command: DbCommand) -> Result<()> {
    // The export format is checked before connecting.
    if let DbCommand::Export(args) = &command {
        ExportFormat::from_path(Path::new(&args.output))?;
    }

    let db = ctx.database().await?;
    match command {
        DbCommand::Query(args) => {
            let params: Vec<QueryParam> = args.binds.iter().map(|b| QueryParam::parse(b)).collect();
            let outcome = db.execute_query(&args.sql, &params).await?;
            print_outcome(&outcome)
        }
        DbCommand::RunFile(args) => {
            let params = parse_params(&args.params)?;
            tracing::info!("Running {} with {} parameters", args.path, params.len());
            let outcome = db.execute_sql_file(&args.path, &params).await?;
            print_outcome(&outcome)
        }
        DbCommand::Import(args) => {
            let frame = ParquetStorage::read_frame(&args.input)?;
            db.write_frame(&args.table, &frame).await?;
            tracing::info!(
                "Imported {} rows from {} into {}",
                frame.num_rows(),
                args.input,
                args.table
            );
            Ok(())
        }
        DbCommand::Export(args) => {
            let frame = db.read_frame(&args.table).await?;
            write_local(Path::new(&args.output), &frame)?;
            tracing::info!(
                "Exported {} rows from {} to {}",
                frame.num_rows(),
                args.table,
                args.output
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::context::GlobalArgs;

    #[test]
    fn export_format_follows_extension() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out/quotes.parquet")).unwrap(),
            ExportFormat::Parquet
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("quotes.CSV")).unwrap(),
            ExportFormat::Csv
        );
        assert!(ExportFormat::from_path(Path::new("quotes.xlsx")).is_err());
        assert!(ExportFormat::from_path(Path::new("quotes")).is_err());
    }

    #[test]
    fn write_local_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let frame = Frame::new()
            .with_text("ticker", vec![Some("A".to_string()), None])
            .with_float("price", vec![Some(95.0), Some(92.5)]);

        let csv_path = dir.path().join("exports").join("table.csv");
        write_local(&csv_path, &frame).unwrap();
        let csv = std::fs::read_to_string(&csv_path).unwrap();
        assert!(csv.starts_with("ticker,price\n"));
        assert_eq!(csv.lines().count(), 3);

        let parquet_path = dir.path().join("exports").join("table.parquet");
        write_local(&parquet_path, &frame).unwrap();
        let back = ParquetStorage::read_frame(&parquet_path).unwrap();
        assert_eq!(back.num_rows(), 2);
        assert_eq!(back.column_names(), vec!["ticker", "price"]);
    }

    #[tokio::test]
    async fn bad_export_extension_fails_before_connecting() {
        let args = GlobalArgs {
            config: "does/not/exist.toml".to_string(),
            db_url: Some("postgres://nobody@127.0.0.1:1/none".to_string()),
            ..GlobalArgs::default()
        };
        let ctx = Context::from_args(&args).unwrap();
        let command = DbCommand::Export(ExportArgs {
            table: "quotes".to_string(),
            output: "quotes.json".to_string(),
        });

        let err = run_db(&ctx, command).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported output file"));
    }
}
