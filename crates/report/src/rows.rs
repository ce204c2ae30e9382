//! Display rows for result tables.
//!
//! Each row converts one result record into formatted strings. Returns are
//! shown in percent, prices and results in cents.

use nt_research_backtest::{
    CalibrationRow, CalibrationSweepRow, DailyReturn, PerformanceRow, PerformanceSweepRow, PnlPoint,
    ProfitRow, Trade,
};
use nt_research_core::{OlsFit, StrategySummary};
use tabled::Tabled;

const MISSING: &str = "-";

fn fixed(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

fn optional(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| fixed(v, precision))
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn optional_percent(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), percent)
}

fn bin_label<T: ToString>(bin: Option<T>) -> String {
    bin.map_or_else(|| MISSING.to_string(), |b| b.to_string())
}

/// Calibration of one price bin.
#[derive(Debug, Clone, Tabled)]
pub struct CalibrationBinRow {
    #[tabled(rename = "Price Bin")]
    pub price_bin: String,
    #[tabled(rename = "Trades")]
    pub count: usize,
    #[tabled(rename = "Mean Price")]
    pub price_mean: String,
    #[tabled(rename = "Percent Won")]
    pub result_mean: String,
    #[tabled(rename = "Std. Dev.")]
    pub result_stdev: String,
    #[tabled(rename = "Delta")]
    pub delta: String,
    #[tabled(rename = "T-Stat")]
    pub tstat: String,
    #[tabled(rename = "95% CI")]
    pub ci: String,
}

impl From<&CalibrationRow> for CalibrationBinRow {
    fn from(row: &CalibrationRow) -> Self {
        Self {
            price_bin: bin_label(row.price_bin),
            count: row.count,
            price_mean: fixed(row.price_mean, 2),
            result_mean: fixed(row.result_mean, 2),
            result_stdev: optional(row.result_stdev, 2),
            delta: fixed(row.delta, 2),
            tstat: optional(row.tstat, 2),
            ci: format!("[{:.2}, {:.2}]", row.ci_lower, row.ci_upper),
        }
    }
}

/// Calibration of one (price bin, time bin) bucket.
#[derive(Debug, Clone, Tabled)]
pub struct CalibrationTimeRow {
    #[tabled(rename = "Price Bin")]
    pub price_bin: String,
    #[tabled(rename = "Time Bin")]
    pub time_bin: String,
    #[tabled(rename = "Mean Elapsed")]
    pub trade_time_mean: String,
    #[tabled(rename = "Trades")]
    pub count: usize,
    #[tabled(rename = "Mean Price")]
    pub price_mean: String,
    #[tabled(rename = "Percent Won")]
    pub result_mean: String,
    #[tabled(rename = "Delta")]
    pub delta: String,
    #[tabled(rename = "T-Stat")]
    pub tstat: String,
}

impl From<&CalibrationRow> for CalibrationTimeRow {
    fn from(row: &CalibrationRow) -> Self {
        Self {
            price_bin: bin_label(row.price_bin),
            time_bin: bin_label(row.time_bin),
            trade_time_mean: fixed(row.trade_time_mean, 1),
            count: row.count,
            price_mean: fixed(row.price_mean, 2),
            result_mean: fixed(row.result_mean, 2),
            delta: fixed(row.delta, 2),
            tstat: optional(row.tstat, 2),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct PerformanceTableRow {
    #[tabled(rename = "Trades")]
    pub trades: String,
    #[tabled(rename = "Mean Elapsed")]
    pub elapsed_time: String,
    #[tabled(rename = "Count")]
    pub count: usize,
    #[tabled(rename = "Profit")]
    pub profit: String,
    #[tabled(rename = "Price")]
    pub price: String,
    #[tabled(rename = "Return Mean")]
    pub return_mean: String,
    #[tabled(rename = "Return Std.")]
    pub return_stdev: String,
    #[tabled(rename = "Sharpe")]
    pub sharpe: String,
}

impl From<&PerformanceRow> for PerformanceTableRow {
    fn from(row: &PerformanceRow) -> Self {
        Self {
            trades: row.trades.clone(),
            elapsed_time: fixed(row.elapsed_time, 1),
            count: row.count,
            profit: row.profit.round_dp(2).to_string(),
            price: row.price.round_dp(2).to_string(),
            return_mean: percent(row.return_mean),
            return_stdev: optional_percent(row.return_stdev),
            sharpe: optional(row.sharpe, 4),
        }
    }
}

/// A trade listed on its own, used for the lost-trade listing.
#[derive(Debug, Clone, Tabled)]
pub struct TradeTableRow {
    #[tabled(rename = "Ticker")]
    pub ticker: String,
    #[tabled(rename = "Elapsed Time")]
    pub elapsed_time: i64,
    #[tabled(rename = "Price")]
    pub price: String,
    #[tabled(rename = "Price Bin")]
    pub price_bin: String,
    #[tabled(rename = "Result")]
    pub result: String,
}

impl From<&Trade> for TradeTableRow {
    fn from(trade: &Trade) -> Self {
        Self {
            ticker: trade.ticker.clone(),
            elapsed_time: trade.elapsed_time,
            price: fixed(trade.price, 2),
            price_bin: bin_label(trade.price_bin),
            result: trade.result.to_string(),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct ProfitTableRow {
    #[tabled(rename = "Ticker")]
    pub ticker: String,
    #[tabled(rename = "Elapsed Time")]
    pub elapsed_time: i64,
    #[tabled(rename = "Price")]
    pub price: String,
    #[tabled(rename = "Profit")]
    pub profit: String,
    #[tabled(rename = "Return")]
    pub return_: String,
    #[tabled(rename = "Type")]
    pub trade_type: String,
}

impl From<&ProfitRow> for ProfitTableRow {
    fn from(row: &ProfitRow) -> Self {
        Self {
            ticker: row.ticker.clone(),
            elapsed_time: row.elapsed_time,
            price: row.price.round_dp(2).to_string(),
            profit: row.profit.round_dp(2).to_string(),
            return_: percent(row.return_),
            trade_type: row.trade_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct CalibrationSweepTableRow {
    #[tabled(rename = "Entry Time")]
    pub entry_time: i64,
    #[tabled(rename = "Mean Price")]
    pub trade_price: String,
    #[tabled(rename = "Mean Result")]
    pub result: String,
    #[tabled(rename = "Count")]
    pub count: usize,
}

impl From<&CalibrationSweepRow> for CalibrationSweepTableRow {
    fn from(row: &CalibrationSweepRow) -> Self {
        Self {
            entry_time: row.entry_time,
            trade_price: fixed(row.trade_price, 2),
            result: fixed(row.result, 2),
            count: row.count,
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct PerformanceSweepTableRow {
    #[tabled(rename = "Entry Time")]
    pub entry_time: i64,
    #[tabled(rename = "Price Range")]
    pub price_range: String,
    #[tabled(rename = "Count")]
    pub count: usize,
    #[tabled(rename = "Return Mean")]
    pub return_mean: String,
    #[tabled(rename = "Return Std.")]
    pub return_std: String,
    #[tabled(rename = "Sharpe")]
    pub sharpe: String,
}

impl From<&PerformanceSweepRow> for PerformanceSweepTableRow {
    fn from(row: &PerformanceSweepRow) -> Self {
        Self {
            entry_time: row.entry_time,
            price_range: row.price_range.to_string(),
            count: row.count,
            return_mean: optional_percent(row.return_mean),
            return_std: optional_percent(row.return_std),
            sharpe: optional(row.sharpe, 4),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct DailyReturnTableRow {
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Trades")]
    pub num_trades: usize,
    #[tabled(rename = "Return")]
    pub return_: String,
    #[tabled(rename = "Cumulative Return")]
    pub cumulative_return: String,
    #[tabled(rename = "Drawdown")]
    pub drawdown: String,
}

impl From<&DailyReturn> for DailyReturnTableRow {
    fn from(day: &DailyReturn) -> Self {
        Self {
            date: day.date.to_string(),
            num_trades: day.num_trades,
            return_: percent(day.return_),
            cumulative_return: format!("{:.2}%", day.cumulative_return),
            drawdown: percent(day.drawdown),
        }
    }
}

#[derive(Debug, Clone, Tabled)]
pub struct PnlTableRow {
    #[tabled(rename = "Trade Price")]
    pub trade_price: String,
    #[tabled(rename = "Mean P&L")]
    pub pnl_mean: String,
    #[tabled(rename = "Count")]
    pub count: usize,
}

impl From<&PnlPoint> for PnlTableRow {
    fn from(point: &PnlPoint) -> Self {
        Self {
            trade_price: fixed(point.trade_price, 2),
            pnl_mean: fixed(point.pnl_mean, 4),
            count: point.count,
        }
    }
}

/// One coefficient of a fitted regression.
#[derive(Debug, Clone, Tabled)]
pub struct CoefficientRow {
    #[tabled(rename = "Term")]
    pub term: String,
    #[tabled(rename = "Estimate")]
    pub estimate: String,
    #[tabled(rename = "Std. Error")]
    pub std_err: String,
    #[tabled(rename = "t")]
    pub t: String,
}

/// Intercept and slope rows, followed by R² and the sample size.
#[must_use]
pub fn coefficient_rows(fit: &OlsFit, regressor: &str) -> Vec<CoefficientRow> {
    vec![
        CoefficientRow {
            term: "Intercept".to_string(),
            estimate: fixed(fit.intercept, 6),
            std_err: fixed(fit.intercept_std_err, 6),
            t: optional(fit.intercept_t, 3),
        },
        CoefficientRow {
            term: regressor.to_string(),
            estimate: fixed(fit.slope, 6),
            std_err: fixed(fit.slope_std_err, 6),
            t: optional(fit.slope_t, 3),
        },
        CoefficientRow {
            term: "R²".to_string(),
            estimate: fixed(fit.r_squared, 6),
            std_err: MISSING.to_string(),
            t: MISSING.to_string(),
        },
        CoefficientRow {
            term: "Observations".to_string(),
            estimate: fit.n.to_string(),
            std_err: MISSING.to_string(),
            t: MISSING.to_string(),
        },
    ]
}

#[derive(Debug, Clone, Tabled)]
pub struct MetricRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl MetricRow {
    fn new(metric: &str, value: String) -> Self {
        Self {
            metric: metric.to_string(),
            value,
        }
    }
}

/// Key/value rows of a strategy summary. Drawdown rows appear only when set.
#[must_use]
pub fn summary_rows(summary: &StrategySummary) -> Vec<MetricRow> {
    let mut rows = vec![
        MetricRow::new("Strategy", summary.name.clone()),
        MetricRow::new("Trades", summary.num_trades.to_string()),
        MetricRow::new("Win Rate", optional_percent(summary.win_rate)),
        MetricRow::new("Total P&L (scaled)", fixed(summary.total_pnl, 2)),
        MetricRow::new("Return Mean", optional_percent(summary.return_mean)),
        MetricRow::new("Return Std. Dev.", optional_percent(summary.return_std)),
        MetricRow::new("Sharpe Ratio", optional(summary.sharpe, 4)),
    ];
    if summary.max_drawdown.is_some() || summary.calmar.is_some() {
        rows.push(MetricRow::new("Max Drawdown", optional_percent(summary.max_drawdown)));
        rows.push(MetricRow::new("Calmar Ratio", optional(summary.calmar, 4)));
    }
    rows
}

/// Converts result records into display rows.
pub fn display_rows<'a, S: 'a, D: From<&'a S>>(records: &'a [S]) -> Vec<D> {
    records.iter().map(D::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nt_research_backtest::{Interval, PriceRange, TradeType};
    use rust_decimal::Decimal;

    fn calibration_row() -> CalibrationRow {
        CalibrationRow {
            price_bin: Some(Interval::new(90.0, 99.0)),
            time_bin: None,
            trade_time_mean: -30.0,
            price_mean: 94.123,
            result_mean: 96.5,
            result_stdev: Some(18.4),
            count: 200,
            delta: 2.377,
            tstat: None,
            ci_lower: 92.9,
            ci_upper: 98.3,
        }
    }

    #[test]
    fn calibration_row_formats_bins_and_missing_values() {
        let row = CalibrationBinRow::from(&calibration_row());
        assert_eq!(row.price_bin, "(90, 99]");
        assert_eq!(row.price_mean, "94.12");
        assert_eq!(row.tstat, "-");
        assert_eq!(row.ci, "[92.90, 98.30]");

        let timed = CalibrationTimeRow::from(&calibration_row());
        assert_eq!(timed.time_bin, "-");
        assert_eq!(timed.trade_time_mean, "-30.0");
    }

    #[test]
    fn performance_row_shows_returns_in_percent() {
        let row = PerformanceTableRow::from(&PerformanceRow {
            trades: "Won".to_string(),
            elapsed_time: -60.0,
            count: 3,
            profit: Decimal::new(1250, 2),
            price: Decimal::new(28750, 2),
            return_mean: 0.0435,
            return_stdev: None,
            sharpe: None,
        });

        assert_eq!(row.return_mean, "4.35%");
        assert_eq!(row.return_stdev, "-");
        assert_eq!(row.profit, "12.50");
    }

    #[test]
    fn sweep_row_labels_price_range() {
        let row = PerformanceSweepTableRow::from(&PerformanceSweepRow {
            entry_time: 90,
            price_range: PriceRange::new(90.0, 100.0),
            count: 0,
            return_mean: None,
            return_std: None,
            sharpe: None,
        });
        assert_eq!(row.price_range, "[90, 100]");
        assert_eq!(row.sharpe, "-");
    }

    #[test]
    fn profit_rows_convert_in_bulk() {
        let profits = vec![ProfitRow {
            ticker: "KXNFL-A".to_string(),
            elapsed_time: -30,
            price: Decimal::from(95),
            profit: Decimal::from(5),
            return_: 5.0 / 95.0,
            trade_type: TradeType::Won,
        }];

        let rows: Vec<ProfitTableRow> = display_rows(&profits);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].return_, "5.26%");
        assert_eq!(rows[0].trade_type, "Won");
    }

    #[test]
    fn summary_rows_hide_drawdown_when_unset() {
        let rows = summary_rows(&StrategySummary::default());
        assert!(rows.iter().all(|r| r.metric != "Max Drawdown"));
        assert_eq!(rows[1].value, "0");

        let with_drawdown = StrategySummary {
            max_drawdown: Some(0.25),
            ..StrategySummary::default()
        };
        let rows = summary_rows(&with_drawdown);
        assert!(rows.iter().any(|r| r.metric == "Max Drawdown" && r.value == "25.00%"));
    }

    #[test]
    fn coefficient_rows_include_fit_quality() {
        let fit = OlsFit {
            intercept: 40.0,
            slope: -0.5,
            intercept_std_err: 1.0,
            slope_std_err: 0.01,
            intercept_t: Some(40.0),
            slope_t: Some(-50.0),
            r_squared: 0.9,
            n: 10,
        };
        let rows = coefficient_rows(&fit, "trade_price");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].term, "trade_price");
        assert_eq!(rows[1].t, "-50.000");
        assert_eq!(rows[3].estimate, "10");
    }
}
