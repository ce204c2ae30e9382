//! Hold-to-resolution performance of a set of trades.
//!
//! Buying YES at `price` cents pays `100 - price` on a YES resolution and
//! loses `price` otherwise. Returns are per trade and relative to the stake.

use nt_research_core::stats::{mean, sample_std, sharpe};
use nt_research_core::StrategySummary;
use nt_research_data::{Frame, ToFrame};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::trades::{PriceSelection, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    Won,
    Lost,
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeType::Won => write!(f, "Won"),
            TradeType::Lost => write!(f, "Lost"),
        }
    }
}

/// A trade with its realized profit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitRow {
    pub ticker: String,
    pub elapsed_time: i64,
    pub price: Decimal,
    pub profit: Decimal,
    /// `profit / price`
    pub return_: f64,
    pub trade_type: TradeType,
}

/// Profit of every selected trade.
///
/// Trades whose price cannot be represented as a decimal, or is not
/// positive, are skipped.
#[must_use]
pub fn profits(trades: &[Trade], selection: &PriceSelection) -> Vec<ProfitRow> {
    trades
        .iter()
        .filter(|t| selection.matches(t))
        .filter_map(|t| {
            let price = Decimal::from_f64(t.price).filter(|p| *p > Decimal::ZERO)?;
            let (profit, trade_type) = if t.result.is_win() {
                (dec!(100) - price, TradeType::Won)
            } else {
                (-price, TradeType::Lost)
            };
            let return_ = (profit / price).to_f64()?;
            Some(ProfitRow {
                ticker: t.ticker.clone(),
                elapsed_time: t.elapsed_time,
                price,
                profit,
                return_,
                trade_type,
            })
        })
        .collect()
}

/// One line of the performance table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    /// `Won`, `Lost` or `Total`.
    pub trades: String,
    pub elapsed_time: f64,
    pub count: usize,
    pub profit: Decimal,
    pub price: Decimal,
    pub return_mean: f64,
    pub return_stdev: Option<f64>,
    pub sharpe: Option<f64>,
}

impl PerformanceRow {
    fn from_profits(label: &str, rows: &[&ProfitRow]) -> Option<Self> {
        let elapsed: Vec<f64> = rows.iter().map(|r| r.elapsed_time as f64).collect();
        let returns: Vec<f64> = rows.iter().map(|r| r.return_).collect();

        let return_mean = mean(&returns)?;
        let return_stdev = sample_std(&returns);

        Some(Self {
            trades: label.to_string(),
            elapsed_time: mean(&elapsed)?,
            count: rows.len(),
            profit: rows.iter().map(|r| r.profit).sum(),
            price: rows.iter().map(|r| r.price).sum(),
            return_mean,
            return_stdev,
            sharpe: sharpe(Some(return_mean), return_stdev),
        })
    }
}

/// Won, Lost and Total rows, in that order. Empty groups are omitted.
#[must_use]
pub fn performance_table(profits: &[ProfitRow]) -> Vec<PerformanceRow> {
    let of_type = |kind: TradeType| -> Vec<&ProfitRow> {
        profits.iter().filter(|p| p.trade_type == kind).collect()
    };
    let won = of_type(TradeType::Won);
    let lost = of_type(TradeType::Lost);
    let all: Vec<&ProfitRow> = profits.iter().collect();

    [
        PerformanceRow::from_profits("Won", &won),
        PerformanceRow::from_profits("Lost", &lost),
        PerformanceRow::from_profits("Total", &all),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Losing trades of the selection, sorted by ticker.
#[must_use]
pub fn lost_trades(trades: &[Trade], selection: &PriceSelection) -> Vec<Trade> {
    let mut lost: Vec<Trade> = trades
        .iter()
        .filter(|t| !t.result.is_win() && selection.matches(t))
        .cloned()
        .collect();
    lost.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    lost
}

/// Headline numbers of a trade sample. `total_pnl` is the sum of returns in percent.
#[must_use]
pub fn strategy_summary(name: &str, profits: &[ProfitRow]) -> StrategySummary {
    let returns: Vec<f64> = profits.iter().map(|p| p.return_).collect();
    let return_mean = mean(&returns);
    let return_std = sample_std(&returns);
    let wins = profits.iter().filter(|p| p.trade_type == TradeType::Won).count();

    StrategySummary {
        name: name.to_string(),
        num_trades: profits.len(),
        total_pnl: returns.iter().map(|r| r * 100.0).sum(),
        return_mean,
        return_std,
        sharpe: sharpe(return_mean, return_std),
        win_rate: (!profits.is_empty()).then(|| wins as f64 / profits.len() as f64),
        max_drawdown: None,
        calmar: None,
    }
}

impl ToFrame for ProfitRow {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_text("ticker", rows.iter().map(|r| Some(r.ticker.clone())))
            .with_int("elapsed_time", rows.iter().map(|r| Some(r.elapsed_time)))
            .with_float("price", rows.iter().map(|r| r.price.to_f64()))
            .with_float("profit", rows.iter().map(|r| r.profit.to_f64()))
            .with_float("return", rows.iter().map(|r| Some(r.return_)))
            .with_text("trades_type", rows.iter().map(|r| Some(r.trade_type.to_string())))
    }
}

impl ToFrame for PerformanceRow {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_text("trades_type", rows.iter().map(|r| Some(r.trades.clone())))
            .with_float("elapsed_time", rows.iter().map(|r| Some(r.elapsed_time)))
            .with_int("count", rows.iter().map(|r| i64::try_from(r.count).ok()))
            .with_float("profit", rows.iter().map(|r| r.profit.to_f64()))
            .with_float("price", rows.iter().map(|r| r.price.to_f64()))
            .with_float("return_mean", rows.iter().map(|r| Some(r.return_mean)))
            .with_float("return_stdev", rows.iter().map(|r| r.return_stdev))
            .with_float("sharpe", rows.iter().map(|r| r.sharpe))
    }
}
