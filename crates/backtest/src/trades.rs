//! Trade selection from quote snapshots.
//!
//! A trade is the first quote of a ticker satisfying an entry rule. The
//! calibration and performance studies differ only in the rule and in how
//! the selected trades are bucketed.

use anyhow::{anyhow, Result};
use nt_research_data::{Frame, Outcome, QuoteRecord, ToFrame};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bins::{Breaks, Interval, PriceRange, TimeWindow};

/// Which quote column a trade is priced from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    /// Closing YES ask (default)
    #[default]
    AskClose,
    /// Mean of the non-null closing bid and ask
    Mid,
}

impl PriceSource {
    #[must_use]
    pub fn price(self, quote: &QuoteRecord) -> Option<f64> {
        match self {
            PriceSource::AskClose => quote.yes_ask_close,
            PriceSource::Mid => quote.mid_close(),
        }
    }
}

impl std::str::FromStr for PriceSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ask" | "ask-close" | "ask_close" | "yes_ask_close" => Ok(PriceSource::AskClose),
            "mid" | "midprice" | "mid-close" => Ok(PriceSource::Mid),
            _ => Err(anyhow!(
                "Invalid price source: '{}'. Valid values: ask, mid",
                s
            )),
        }
    }
}

impl std::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSource::AskClose => write!(f, "ask"),
            PriceSource::Mid => write!(f, "mid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    /// Minutes since event start at entry.
    pub elapsed_time: i64,
    /// Entry price in cents.
    pub price: f64,
    pub result: Outcome,
    pub price_bin: Option<Interval>,
    pub time_bin: Option<Interval>,
}

impl Trade {
    fn from_quote(quote: &QuoteRecord, price: f64) -> Self {
        Self {
            ticker: quote.ticker.clone(),
            elapsed_time: quote.elapsed_minutes(),
            price,
            result: quote.result,
            price_bin: None,
            time_bin: None,
        }
    }

    /// 1.0 for a YES resolution, 0.0 otherwise.
    #[must_use]
    pub fn result_value(&self) -> f64 {
        f64::from(self.result.as_int())
    }
}

/// Restricts trades to one price bin or an inclusive price range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceSelection {
    Bin(Interval),
    Range(PriceRange),
}

impl PriceSelection {
    #[must_use]
    pub fn matches(&self, trade: &Trade) -> bool {
        match self {
            PriceSelection::Bin(bin) => trade.price_bin.as_ref() == Some(bin),
            PriceSelection::Range(range) => range.contains(trade.price),
        }
    }
}

impl std::fmt::Display for PriceSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceSelection::Bin(bin) => write!(f, "{bin}"),
            PriceSelection::Range(range) => write!(f, "{range}"),
        }
    }
}

/// Optional filters for [`windowed_trades`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BinFilter {
    pub time_bin: Option<Interval>,
    pub price_bin: Option<Interval>,
    /// Applied to each selected trade's price.
    pub price_range: Option<PriceRange>,
}

/// Sorts quote references by (ticker, end of period).
fn sorted_by_ticker<'a>(quotes: impl Iterator<Item = &'a QuoteRecord>) -> Vec<&'a QuoteRecord> {
    let mut sorted: Vec<&QuoteRecord> = quotes.collect();
    sorted.sort_by(|a, b| {
        a.ticker
            .cmp(&b.ticker)
            .then(a.end_period_ts.cmp(&b.end_period_ts))
    });
    sorted
}

/// First quote per ticker at or after `entry_after` minutes, sorted by ticker.
///
/// Tickers whose first eligible quote has no price are skipped.
#[must_use]
pub fn first_trades(
    quotes: &[QuoteRecord],
    entry_after: i64,
    price_source: PriceSource,
) -> Vec<Trade> {
    let eligible =
        sorted_by_ticker(quotes.iter().filter(|q| q.elapsed_minutes() >= entry_after));

    let mut first: BTreeMap<&str, &QuoteRecord> = BTreeMap::new();
    for quote in eligible {
        first.entry(quote.ticker.as_str()).or_insert(quote);
    }

    let mut unpriced = 0usize;
    let trades: Vec<Trade> = first
        .values()
        .filter_map(|quote| match price_source.price(quote) {
            Some(price) => Some(Trade::from_quote(quote, price)),
            None => {
                unpriced += 1;
                None
            }
        })
        .collect();

    if unpriced > 0 {
        tracing::debug!("Skipped {} tickers without an entry price", unpriced);
    }
    tracing::debug!(
        "Selected {} first trades at t >= {} ({})",
        trades.len(),
        entry_after,
        price_source
    );
    trades
}

/// Sets the price bin of every trade.
pub fn assign_price_bins(trades: &mut [Trade], breaks: &Breaks) {
    for trade in trades {
        trade.price_bin = breaks.cut(trade.price);
    }
}

/// Keeps trades inside the inclusive price range.
#[must_use]
pub fn within_price(trades: Vec<Trade>, range: &PriceRange) -> Vec<Trade> {
    trades.into_iter().filter(|t| range.contains(t.price)).collect()
}

/// Every priced quote inside the window with its price and time bins.
///
/// # Errors
/// Returns an error if the window is invalid.
pub fn binned_quotes(
    quotes: &[QuoteRecord],
    window: &TimeWindow,
    price_breaks: &Breaks,
    price_source: PriceSource,
) -> Result<Vec<Trade>> {
    let time_breaks = window.breaks()?;
    let in_window =
        sorted_by_ticker(quotes.iter().filter(|q| window.contains(q.elapsed_minutes())));

    Ok(in_window
        .into_iter()
        .filter_map(|quote| {
            let price = price_source.price(quote)?;
            let mut trade = Trade::from_quote(quote, price);
            trade.price_bin = price_breaks.cut(price);
            #[allow(clippy::cast_precision_loss)]
            let elapsed = trade.elapsed_time as f64;
            trade.time_bin = time_breaks.cut(elapsed);
            Some(trade)
        })
        .collect())
}

/// First quote per (ticker, price bin, time bin) inside the window.
///
/// The filters apply after selection. The result is sorted by
/// (ticker, time bin, price bin).
///
/// # Errors
/// Returns an error if the window is invalid.
pub fn windowed_trades(
    quotes: &[QuoteRecord],
    window: &TimeWindow,
    price_breaks: &Breaks,
    price_source: PriceSource,
    filter: &BinFilter,
) -> Result<Vec<Trade>> {
    let binned = binned_quotes(quotes, window, price_breaks, price_source)?;

    let mut first: BTreeMap<(String, Option<Interval>, Option<Interval>), Trade> = BTreeMap::new();
    for trade in binned {
        first
            .entry((trade.ticker.clone(), trade.time_bin, trade.price_bin))
            .or_insert(trade);
    }

    Ok(first
        .into_values()
        .filter(|t| filter.price_range.map_or(true, |range| range.contains(t.price)))
        .filter(|t| filter.time_bin.is_none() || t.time_bin == filter.time_bin)
        .filter(|t| filter.price_bin.is_none() || t.price_bin == filter.price_bin)
        .collect())
}

fn bin_label(bin: Option<&Interval>) -> Option<String> {
    bin.map(ToString::to_string)
}

impl ToFrame for Trade {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_text("ticker", rows.iter().map(|t| Some(t.ticker.clone())))
            .with_int("elapsed_time", rows.iter().map(|t| Some(t.elapsed_time)))
            .with_float("price", rows.iter().map(|t| Some(t.price)))
            .with_int("result", rows.iter().map(|t| Some(i64::from(t.result.as_int()))))
            .with_text("price_bin", rows.iter().map(|t| bin_label(t.price_bin.as_ref())))
            .with_text("time_bin", rows.iter().map(|t| bin_label(t.time_bin.as_ref())))
    }
}
