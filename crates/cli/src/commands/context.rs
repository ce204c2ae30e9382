//! Settings shared by every experiment command.

use anyhow::{anyhow, Context as _, Result};
use clap::Args;
use nt_research_backtest::Study;
use nt_research_core::{ChartConfig, ConfigLoader, ResearchConfig, DEFAULT_CONFIG_PATH};
use nt_research_data::{DatabaseClient, Frame, QuoteLoader, QuoteRecord};
use nt_research_report::{format_text_table, write_table, TableFormat};
use std::path::{Path, PathBuf};
use tabled::Tabled;

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Config file path
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Quote snapshot to analyse (overrides the configured path)
    #[arg(long, global = true)]
    pub data: Option<String>,

    /// Read quotes from this PostgreSQL table instead of parquet
    #[arg(long, global = true)]
    pub source_table: Option<String>,

    /// Root directory for tables and charts
    #[arg(long, global = true)]
    pub results_dir: Option<String>,

    /// Table file format: text, html or csv
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Database connection URL (uses DATABASE_URL env var if not provided)
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub db_url: Option<String>,

    /// Also store the experiment's main table in this database table
    #[arg(long, global = true)]
    pub save_table: Option<String>,

    /// Write tables only
    #[arg(long, global = true)]
    pub no_charts: bool,
}

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: ResearchConfig,
    pub data: Option<PathBuf>,
    pub source_table: Option<String>,
    pub results_dir: PathBuf,
    pub format: TableFormat,
    pub db_url: Option<String>,
    pub save_table: Option<String>,
    pub draw_charts: bool,
}

impl Context {
    /// Loads the config file and applies flag overrides.
    ///
    /// # Errors
    /// Returns an error if the config cannot be parsed or the format is unknown.
    pub fn from_args(args: &GlobalArgs) -> Result<Self> {
        let config = ConfigLoader::load_from(&args.config)
            .with_context(|| format!("Failed to load config: {}", args.config))?;
        Self::with_config(config, args)
    }

    /// Applies flag overrides to an already loaded config.
    ///
    /// # Errors
    /// Returns an error if the table format is unknown.
    pub fn with_config(config: ResearchConfig, args: &GlobalArgs) -> Result<Self> {
        let format = args
            .format
            .as_deref()
            .unwrap_or(config.output.format.as_str())
            .parse::<TableFormat>()?;
        let results_dir = PathBuf::from(
            args.results_dir
                .clone()
                .unwrap_or_else(|| config.output.results_dir.clone()),
        );
        let db_url = args.db_url.clone().or_else(|| config.database.url.clone());

        Ok(Self {
            data: args.data.as_ref().map(PathBuf::from),
            source_table: args.source_table.clone(),
            results_dir,
            format,
            db_url,
            save_table: args.save_table.clone(),
            draw_charts: !args.no_charts,
            config,
        })
    }

    #[must_use]
    pub fn charts(&self) -> &ChartConfig {
        &self.config.charts
    }

    /// Intraday snapshot path.
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.data
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.config.data.history_path))
    }

    /// Daily candle snapshot path.
    #[must_use]
    pub fn daily_history_path(&self) -> PathBuf {
        self.data
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.config.data.daily_history_path))
    }

    /// `<results>/<study>/<experiment>`
    #[must_use]
    pub fn output_dir(&self, study: Study, experiment: &str) -> PathBuf {
        self.results_dir.join(study.dir_name()).join(experiment)
    }

    /// Connects to the configured database.
    ///
    /// # Errors
    /// Returns an error if no URL is configured or the connection fails.
    pub async fn database(&self) -> Result<DatabaseClient> {
        let url = self.db_url.as_deref().ok_or_else(|| {
            anyhow!("DATABASE_URL must be set via --db-url or DATABASE_URL env var")
        })?;
        let client = DatabaseClient::connect(url, self.config.database.max_connections).await?;
        tracing::info!("Connected to database");
        Ok(client)
    }

    /// Loads quotes from `--source-table` when given, otherwise from `path`.
    ///
    /// # Errors
    /// Returns an error if the source cannot be read.
    pub async fn load_quotes(&self, path: &Path) -> Result<Vec<QuoteRecord>> {
        let (quotes, stats) = match &self.source_table {
            Some(table) => {
                tracing::info!("Loading quotes from table {}", table);
                self.database().await?.read_quotes(table).await?
            }
            None => {
                tracing::info!("Loading quotes from {}", path.display());
                QuoteLoader::from_parquet(path)?
            }
        };
        tracing::info!("Loaded {} of {} quotes", stats.rows_kept, stats.rows_read);
        Ok(quotes)
    }

    /// Prints a table to stdout and writes it to `dir` in the configured format.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn emit_table<T: Tabled>(
        &self,
        dir: &Path,
        stem: &str,
        rows: &[T],
        title: &str,
    ) -> Result<()> {
        println!("\n{}\n", format_text_table(rows, title));
        write_table(dir, stem, rows, title, self.format)?;
        Ok(())
    }

    /// Stores `frame` under `--save-table` when one was given.
    ///
    /// # Errors
    /// Returns an error if the database write fails.
    pub async fn save_frame(&self, frame: &Frame) -> Result<()> {
        let Some(table) = &self.save_table else {
            return Ok(());
        };
        self.database().await?.write_frame(table, frame).await?;
        tracing::info!("Saved {} rows to table {}", frame.num_rows(), table);
        Ok(())
    }

    /// Draws one chart unless charts are disabled. Chart failures are logged
    /// and do not abort the run.
    pub fn chart(&self, name: &str, draw: impl FnOnce() -> nt_research_report::Result<bool>) {
        if !self.draw_charts {
            tracing::debug!("Charts disabled, skipping {}", name);
            return;
        }
        match draw() {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Chart {} skipped: no data", name),
            Err(e) => tracing::error!("Chart {} failed: {}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> GlobalArgs {
        GlobalArgs {
            config: "does/not/exist.toml".to_string(),
            ..GlobalArgs::default()
        }
    }

    #[test]
    fn defaults_come_from_config() {
        let ctx = Context::from_args(&args()).unwrap();
        assert_eq!(ctx.history_path(), PathBuf::from("data/history.parquet"));
        assert_eq!(ctx.daily_history_path(), PathBuf::from("data/history_daily.parquet"));
        assert_eq!(ctx.format, TableFormat::Text);
        assert_eq!(
            ctx.output_dir(Study::Underdog, "experiment_1"),
            PathBuf::from("results/underdog_risk_premium/experiment_1")
        );
    }

    #[test]
    fn flags_override_config() {
        let overrides = GlobalArgs {
            data: Some("snap.parquet".to_string()),
            results_dir: Some("out".to_string()),
            format: Some("html".to_string()),
            ..args()
        };
        let ctx = Context::from_args(&overrides).unwrap();
        assert_eq!(ctx.history_path(), PathBuf::from("snap.parquet"));
        assert_eq!(ctx.daily_history_path(), PathBuf::from("snap.parquet"));
        assert_eq!(ctx.format, TableFormat::Html);
        assert_eq!(
            ctx.output_dir(Study::Merger, "regression"),
            PathBuf::from("out/merger_arbitrage/regression")
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let bad = GlobalArgs {
            format: Some("xlsx".to_string()),
            ..args()
        };
        assert!(Context::from_args(&bad).is_err());
    }

    #[tokio::test]
    async fn save_frame_without_table_is_noop() {
        let ctx = Context::from_args(&args()).unwrap();
        ctx.save_frame(&Frame::new()).await.unwrap();
    }

    #[tokio::test]
    async fn database_needs_url() {
        let ctx = Context::from_args(&args()).unwrap();
        if ctx.db_url.is_none() {
            assert!(ctx.database().await.is_err());
        }
    }
}
