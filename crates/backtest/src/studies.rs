//! End-to-end study pipelines.
//!
//! Both studies share the selection and aggregation steps. They differ in
//! their price bins, in whether settled prices are traded, and in how the
//! calibration-over-time window is bounded.

use anyhow::Result;
use nt_research_core::StrategySummary;
use nt_research_data::QuoteRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bins::{Breaks, Interval, PriceRange, TimeWindow, WindowBounds};
use crate::calibration::{
    aggregate_by_bin, aggregate_by_bin_and_time, count_heatmap, rows_for_price_bin,
    time_bin_totals, CalibrationRow, CountHeatmap, TimeBinTotal,
};
use crate::performance::{
    lost_trades, performance_table, profits, strategy_summary, PerformanceRow, ProfitRow,
};
use crate::trades::{
    assign_price_bins, binned_quotes, first_trades, windowed_trades, within_price, BinFilter,
    PriceSelection, PriceSource, Trade,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Study {
    /// Favourites priced in `(90, 99]`, bins capped at 99.
    Underdog,
    /// Near-certain contracts in `(90, inf]`.
    Merger,
}

impl Study {
    #[must_use]
    pub fn price_breaks(self) -> Breaks {
        match self {
            Study::Underdog => Breaks::capped_price_deciles(),
            Study::Merger => Breaks::price_deciles(),
        }
    }

    /// The favourite bin both studies focus on.
    #[must_use]
    pub fn top_bin(self) -> Interval {
        match self {
            Study::Underdog => Interval::new(90.0, 99.0),
            Study::Merger => Interval::new(90.0, f64::INFINITY),
        }
    }

    /// Prices the underdog study trades. Merger trades keep settled prices.
    #[must_use]
    pub fn tradable_range(self) -> Option<PriceRange> {
        match self {
            Study::Underdog => Some(PriceRange::new(1.0, 99.0)),
            Study::Merger => None,
        }
    }

    /// Calibration-over-time window: `(min, max]` cut at `min..=max` for the
    /// underdog study, `[min, max]` with unbounded outer bins for the merger study.
    ///
    /// # Errors
    /// Returns an error if the window is invalid.
    pub fn time_window(self, min: i64, max: i64, interval: i64) -> Result<TimeWindow> {
        let bounds = match self {
            Study::Underdog => WindowBounds::RightClosed,
            Study::Merger => WindowBounds::Closed,
        };
        TimeWindow::with_bounds(min, max, interval, bounds)
    }

    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            Study::Underdog => "underdog_risk_premium",
            Study::Merger => "merger_arbitrage",
        }
    }
}

impl fmt::Display for Study {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Study::Underdog => write!(f, "underdog"),
            Study::Merger => write!(f, "merger"),
        }
    }
}

impl FromStr for Study {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "underdog" | "underdog_risk_premium" => Ok(Study::Underdog),
            "merger" | "merger_arbitrage" => Ok(Study::Merger),
            _ => Err(anyhow::anyhow!(
                "Invalid study: '{}'. Valid values: underdog, merger",
                s
            )),
        }
    }
}

/// First trades at or after `entry_after`, binned by the study's price breaks.
#[must_use]
pub fn entry_trades(
    quotes: &[QuoteRecord],
    study: Study,
    entry_after: i64,
    price_source: PriceSource,
) -> Vec<Trade> {
    let mut trades = first_trades(quotes, entry_after, price_source);
    if let Some(range) = study.tradable_range() {
        trades = within_price(trades, &range);
    }
    assign_price_bins(&mut trades, &study.price_breaks());
    trades
}

#[derive(Debug, Clone)]
pub struct CalibrationStudy {
    pub trades: Vec<Trade>,
    pub rows: Vec<CalibrationRow>,
}

/// Calibration of the first trade per contract.
#[must_use]
pub fn calibration(quotes: &[QuoteRecord], study: Study, entry_after: i64) -> CalibrationStudy {
    let trades = entry_trades(quotes, study, entry_after, PriceSource::AskClose);
    let rows = aggregate_by_bin(&trades);
    tracing::info!(
        "{} calibration at t >= {}: {} trades in {} bins",
        study,
        entry_after,
        trades.len(),
        rows.len()
    );
    CalibrationStudy { trades, rows }
}

#[derive(Debug, Clone)]
pub struct CalibrationOverTime {
    pub trades: Vec<Trade>,
    pub rows: Vec<CalibrationRow>,
    pub top_bin: Interval,
    pub top_bin_rows: Vec<CalibrationRow>,
    pub totals: Vec<TimeBinTotal>,
    pub heatmap: CountHeatmap,
}

/// Calibration per (price bin, time bin) across an elapsed-time window.
///
/// Every quote in the window counts unless `first_per_bin` is set, in which
/// case only the first quote of each contract per bin pair does. Quotes and
/// buckets outside the study's tradable range are dropped.
///
/// # Errors
/// Returns an error if the window is invalid.
pub fn calibration_over_time(
    quotes: &[QuoteRecord],
    study: Study,
    window: &TimeWindow,
    top_bin: Interval,
    first_per_bin: bool,
) -> Result<CalibrationOverTime> {
    let breaks = study.price_breaks();
    let tradable = study.tradable_range();
    let trades = if first_per_bin {
        let filter = BinFilter {
            price_range: tradable,
            ..BinFilter::default()
        };
        windowed_trades(quotes, window, &breaks, PriceSource::AskClose, &filter)?
    } else {
        binned_quotes(quotes, window, &breaks, PriceSource::AskClose)?
    };

    let rows = aggregate_by_bin_and_time(&trades, tradable.as_ref());
    let top_bin_rows = rows_for_price_bin(&rows, &top_bin);
    let totals = time_bin_totals(&rows);
    let heatmap = count_heatmap(&trades);

    tracing::info!(
        "{} calibration over {} every {}m: {} quotes, {} buckets",
        study,
        window,
        window.interval,
        trades.len(),
        rows.len()
    );

    Ok(CalibrationOverTime {
        trades,
        rows,
        top_bin,
        top_bin_rows,
        totals,
        heatmap,
    })
}

#[derive(Debug, Clone)]
pub struct PerformanceStudy {
    pub profits: Vec<ProfitRow>,
    pub table: Vec<PerformanceRow>,
    pub lost: Vec<Trade>,
}

/// Hold-to-resolution performance of the first trades in one price bin.
#[must_use]
pub fn performance(
    quotes: &[QuoteRecord],
    study: Study,
    entry_after: i64,
    price_source: PriceSource,
    price_bin: Interval,
) -> PerformanceStudy {
    let trades = entry_trades(quotes, study, entry_after, price_source);
    let selection = PriceSelection::Bin(price_bin);
    let profits = profits(&trades, &selection);
    let table = performance_table(&profits);
    let lost = lost_trades(&trades, &selection);

    tracing::info!(
        "{} performance in {} at t >= {}: {} trades, {} lost",
        study,
        price_bin,
        entry_after,
        profits.len(),
        lost.len()
    );

    PerformanceStudy {
        profits,
        table,
        lost,
    }
}

/// Buys the first quote at or after `entry_after` when its price lies in `range`.
#[must_use]
pub fn backtest(
    quotes: &[QuoteRecord],
    entry_after: i64,
    range: &PriceRange,
) -> (Vec<ProfitRow>, StrategySummary) {
    let trades = first_trades(quotes, entry_after, PriceSource::AskClose);
    let profits = profits(&trades, &PriceSelection::Range(*range));
    let name = format!("First trade at t >= {entry_after} in {range}");
    let summary = strategy_summary(&name, &profits);
    (profits, summary)
}
