use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResearchConfig {
    pub data: DataConfig,
    pub output: OutputConfig,
    pub database: DatabaseConfig,
    pub charts: ChartConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Intraday quote snapshot used by most experiments.
    pub history_path: String,
    /// Daily candle snapshot used by the equity curve experiment.
    pub daily_history_path: String,
    /// Local timezone used to decide whether a quote falls on game day.
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub results_dir: String,
    /// Table format: text, html or csv.
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            history_path: "data/history.parquet".to_string(),
            daily_history_path: "data/history_daily.parquet".to_string(),
            timezone: "America/Denver".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: "results".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}
