use serde::{Deserialize, Serialize};

/// Headline numbers for one trading rule evaluated over a trade sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategySummary {
    pub name: String,
    pub num_trades: usize,
    /// Sum of per-trade returns in percent.
    pub total_pnl: f64,
    pub return_mean: Option<f64>,
    pub return_std: Option<f64>,
    pub sharpe: Option<f64>,
    pub win_rate: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub calmar: Option<f64>,
}
