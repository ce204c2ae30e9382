pub mod config;
pub mod config_loader;
pub mod metrics_formatter;
pub mod stats;
pub mod summary;

pub use config::{ChartConfig, DataConfig, DatabaseConfig, OutputConfig, ResearchConfig};
pub use config_loader::{ConfigLoader, DEFAULT_CONFIG_PATH};
pub use metrics_formatter::MetricsFormatter;
pub use stats::{wilson_ci, OlsFit};
pub use summary::StrategySummary;
