//! Daily equity curve for the game-day favourite strategy.
//!
//! Works on daily candles: every contract quoted on its own game day inside
//! the price range is bought at the close and held to resolution. Each day's
//! return is the mean over that day's contracts and days compound.

use chrono::NaiveDate;
use chrono_tz::Tz;
use nt_research_core::stats::{calmar, mean, population_std, sharpe};
use nt_research_core::StrategySummary;
use nt_research_data::{Frame, QuoteRecord, ToFrame};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bins::PriceRange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub num_trades: usize,
    /// Mean per-contract return of the day, as a fraction.
    pub return_: f64,
    /// Compounded return since the first day, in percent.
    pub cumulative_return: f64,
    /// Highest compounded wealth so far (starting wealth is 1).
    pub peak: f64,
    /// `1 - wealth / peak`
    pub drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySummary {
    pub days: usize,
    pub return_mean: Option<f64>,
    /// Population standard deviation of daily returns.
    pub return_std: Option<f64>,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
    pub calmar: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    pub days: Vec<DailyReturn>,
    pub summary: EquitySummary,
}

impl EquityCurve {
    #[must_use]
    pub fn to_strategy_summary(&self, name: &str) -> StrategySummary {
        StrategySummary {
            name: name.to_string(),
            num_trades: self.days.iter().map(|d| d.num_trades).sum(),
            total_pnl: self.days.last().map_or(0.0, |d| d.cumulative_return),
            return_mean: self.summary.return_mean,
            return_std: self.summary.return_std,
            sharpe: self.summary.sharpe,
            win_rate: None,
            max_drawdown: Some(self.summary.max_drawdown),
            calmar: self.summary.calmar,
        }
    }
}

fn quote_return(price: f64, won: bool) -> f64 {
    let profit = if won { 100.0 - price } else { -price };
    profit / price
}

/// Builds the daily equity curve from daily candles.
///
/// Dates are local to `tz`. Quotes without a closing ask, or whose price is
/// not positive, are ignored.
#[must_use]
pub fn daily_equity(quotes: &[QuoteRecord], tz: Tz, range: &PriceRange) -> EquityCurve {
    let mut by_day: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();

    for quote in quotes {
        let Some(price) = quote.yes_ask_close else {
            continue;
        };
        if price <= 0.0 || !range.contains(price) {
            continue;
        }
        let date = quote.end_period_ts.with_timezone(&tz).date_naive();
        let game_day = quote.game_start_time_utc.with_timezone(&tz).date_naive();
        if date != game_day {
            continue;
        }
        by_day
            .entry(date)
            .or_default()
            .push(quote_return(price, quote.result.is_win()));
    }

    let mut wealth = 1.0_f64;
    let mut peak = 1.0_f64;
    let days: Vec<DailyReturn> = by_day
        .into_iter()
        .filter_map(|(date, returns)| {
            let day_return = mean(&returns)?;
            wealth *= 1.0 + day_return;
            peak = peak.max(wealth);
            Some(DailyReturn {
                date,
                num_trades: returns.len(),
                return_: day_return,
                cumulative_return: (wealth - 1.0) * 100.0,
                peak,
                drawdown: if peak > 0.0 { 1.0 - wealth / peak } else { 0.0 },
            })
        })
        .collect();

    let returns: Vec<f64> = days.iter().map(|d| d.return_).collect();
    let return_mean = mean(&returns);
    let return_std = population_std(&returns);
    let max_drawdown = days.iter().map(|d| d.drawdown).fold(0.0, f64::max);

    tracing::debug!(
        "Equity curve over {} days, max drawdown {:.4}",
        days.len(),
        max_drawdown
    );

    EquityCurve {
        summary: EquitySummary {
            days: days.len(),
            return_mean,
            return_std,
            sharpe: sharpe(return_mean, return_std),
            max_drawdown,
            calmar: calmar(return_mean, max_drawdown),
        },
        days,
    }
}

impl ToFrame for DailyReturn {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_timestamp(
                "date",
                rows.iter().map(|r| r.date.and_hms_opt(0, 0, 0).map(|t| t.and_utc())),
            )
            .with_int("num_trades", rows.iter().map(|r| i64::try_from(r.num_trades).ok()))
            .with_float("return", rows.iter().map(|r| Some(r.return_)))
            .with_float("cumulative_return", rows.iter().map(|r| Some(r.cumulative_return)))
            .with_float("peak", rows.iter().map(|r| Some(r.peak)))
            .with_float("drawdown", rows.iter().map(|r| Some(r.drawdown)))
    }
}
