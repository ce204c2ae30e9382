//! Calibration of contract prices against realized outcomes.
//!
//! A well calibrated market resolves YES in about `p`% of the contracts
//! traded at `p` cents. Each aggregate row compares the mean entry price of
//! a bucket with the percentage of its trades that resolved YES, and tests
//! the difference with a one-sample t statistic.

use nt_research_core::stats::{mean, sample_std, t_stat};
use nt_research_core::wilson_ci;
use nt_research_data::{Frame, ToFrame};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::bins::{Interval, PriceRange};
use crate::trades::Trade;

const WILSON_Z: f64 = 1.96;

/// Aggregate statistics of one bucket of trades. Result figures are in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRow {
    pub price_bin: Option<Interval>,
    pub time_bin: Option<Interval>,
    pub trade_time_mean: f64,
    pub price_mean: f64,
    pub result_mean: f64,
    pub result_stdev: Option<f64>,
    pub count: usize,
    /// `result_mean - price_mean`
    pub delta: f64,
    pub tstat: Option<f64>,
    /// Wilson 95% interval of the YES rate, in percent.
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl CalibrationRow {
    fn from_trades(
        price_bin: Option<Interval>,
        time_bin: Option<Interval>,
        trades: &[&Trade],
    ) -> Option<Self> {
        let elapsed: Vec<f64> = trades.iter().map(|t| t.elapsed_time as f64).collect();
        let prices: Vec<f64> = trades.iter().map(|t| t.price).collect();
        let results: Vec<f64> = trades.iter().map(|t| t.result_value() * 100.0).collect();

        let trade_time_mean = mean(&elapsed)?;
        let price_mean = mean(&prices)?;
        let result_mean = mean(&results)?;
        let result_stdev = sample_std(&results);
        let delta = result_mean - price_mean;

        let wins = trades.iter().filter(|t| t.result.is_win()).count();
        let (ci_lower, ci_upper) = wilson_ci(wins, trades.len(), WILSON_Z);

        Some(Self {
            price_bin,
            time_bin,
            trade_time_mean,
            price_mean,
            result_mean,
            result_stdev,
            count: trades.len(),
            delta,
            tstat: t_stat(delta, result_stdev, trades.len()),
            ci_lower: ci_lower * 100.0,
            ci_upper: ci_upper * 100.0,
        })
    }
}

/// Per price bin calibration, sorted by mean price.
#[must_use]
pub fn aggregate_by_bin(trades: &[Trade]) -> Vec<CalibrationRow> {
    let mut groups: BTreeMap<Option<Interval>, Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        groups.entry(trade.price_bin).or_default().push(trade);
    }

    let mut rows: Vec<CalibrationRow> = groups
        .into_iter()
        .filter_map(|(bin, members)| CalibrationRow::from_trades(bin, None, &members))
        .collect();
    rows.sort_by(|a, b| a.price_mean.total_cmp(&b.price_mean));
    rows
}

/// Per (price bin, time bin) calibration.
///
/// Buckets whose mean price falls outside `tradable` are dropped. Sorted by
/// (mean trade time, mean price).
#[must_use]
pub fn aggregate_by_bin_and_time(
    trades: &[Trade],
    tradable: Option<&PriceRange>,
) -> Vec<CalibrationRow> {
    let mut groups: BTreeMap<(Option<Interval>, Option<Interval>), Vec<&Trade>> = BTreeMap::new();
    for trade in trades {
        groups
            .entry((trade.price_bin, trade.time_bin))
            .or_default()
            .push(trade);
    }

    let mut rows: Vec<CalibrationRow> = groups
        .into_iter()
        .filter_map(|((price_bin, time_bin), members)| {
            CalibrationRow::from_trades(price_bin, time_bin, &members)
        })
        .filter(|row| tradable.map_or(true, |range| range.contains(row.price_mean)))
        .collect();
    rows.sort_by(|a, b| {
        a.trade_time_mean
            .total_cmp(&b.trade_time_mean)
            .then(a.price_mean.total_cmp(&b.price_mean))
    });
    rows
}

/// Rows of one price bin, in time order.
#[must_use]
pub fn rows_for_price_bin(rows: &[CalibrationRow], price_bin: &Interval) -> Vec<CalibrationRow> {
    let mut selected: Vec<CalibrationRow> = rows
        .iter()
        .filter(|r| r.price_bin.as_ref() == Some(price_bin))
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.time_bin.cmp(&b.time_bin));
    selected
}

/// Trade count of all price bins in one time bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBinTotal {
    pub time_bin: Option<Interval>,
    pub count: usize,
    pub trade_time_mean: f64,
}

/// Summed count and mean trade time per time bin, sorted by mean trade time.
#[must_use]
pub fn time_bin_totals(rows: &[CalibrationRow]) -> Vec<TimeBinTotal> {
    let mut groups: BTreeMap<Option<Interval>, Vec<&CalibrationRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.time_bin).or_default().push(row);
    }

    let mut totals: Vec<TimeBinTotal> = groups
        .into_iter()
        .filter_map(|(time_bin, members)| {
            let times: Vec<f64> = members.iter().map(|r| r.trade_time_mean).collect();
            Some(TimeBinTotal {
                time_bin,
                count: members.iter().map(|r| r.count).sum(),
                trade_time_mean: mean(&times)?,
            })
        })
        .collect();
    totals.sort_by(|a, b| a.trade_time_mean.total_cmp(&b.trade_time_mean));
    totals
}

/// Distinct tickers per (price bin, time bin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountHeatmap {
    /// Row labels, highest price bin first.
    pub price_bins: Vec<Interval>,
    /// Column labels, earliest time bin first.
    pub time_bins: Vec<Interval>,
    /// `counts[row][col]`, `None` where no trade fell.
    pub counts: Vec<Vec<Option<usize>>>,
}

impl CountHeatmap {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.price_bins.is_empty() || self.time_bins.is_empty()
    }

    #[must_use]
    pub fn max_count(&self) -> usize {
        self.counts.iter().flatten().flatten().copied().max().unwrap_or(0)
    }
}

/// Counts distinct tickers per cell, ignoring quotes at 100 cents.
#[must_use]
pub fn count_heatmap(trades: &[Trade]) -> CountHeatmap {
    let mut cells: BTreeMap<(Interval, Interval), BTreeSet<&str>> = BTreeMap::new();
    for trade in trades {
        if trade.price == 100.0 {
            continue;
        }
        if let (Some(price_bin), Some(time_bin)) = (trade.price_bin, trade.time_bin) {
            cells
                .entry((price_bin, time_bin))
                .or_default()
                .insert(trade.ticker.as_str());
        }
    }

    let price_bins: Vec<Interval> = cells
        .keys()
        .map(|(p, _)| *p)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .rev()
        .collect();
    let time_bins: Vec<Interval> = cells
        .keys()
        .map(|(_, t)| *t)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let counts = price_bins
        .iter()
        .map(|p| {
            time_bins
                .iter()
                .map(|t| cells.get(&(*p, *t)).map(BTreeSet::len))
                .collect()
        })
        .collect();

    CountHeatmap {
        price_bins,
        time_bins,
        counts,
    }
}

/// Copies of `rows` with t statistics clipped to `[-bound, bound]`.
#[must_use]
pub fn clip_tstats(rows: &[CalibrationRow], bound: f64) -> Vec<CalibrationRow> {
    rows.iter()
        .cloned()
        .map(|mut row| {
            row.tstat = row.tstat.map(|t| t.clamp(-bound, bound));
            row
        })
        .collect()
}

fn bin_label(bin: Option<&Interval>) -> Option<String> {
    bin.map(ToString::to_string)
}

impl ToFrame for CalibrationRow {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_text("price_bin", rows.iter().map(|r| bin_label(r.price_bin.as_ref())))
            .with_text("time_bin", rows.iter().map(|r| bin_label(r.time_bin.as_ref())))
            .with_float("trade_time_mean", rows.iter().map(|r| Some(r.trade_time_mean)))
            .with_float("price_mean", rows.iter().map(|r| Some(r.price_mean)))
            .with_float("result_mean", rows.iter().map(|r| Some(r.result_mean)))
            .with_float("result_stdev", rows.iter().map(|r| r.result_stdev))
            .with_int("count", rows.iter().map(|r| i64::try_from(r.count).ok()))
            .with_float("delta", rows.iter().map(|r| Some(r.delta)))
            .with_float("tstat", rows.iter().map(|r| r.tstat))
            .with_float("ci_lower", rows.iter().map(|r| Some(r.ci_lower)))
            .with_float("ci_upper", rows.iter().map(|r| Some(r.ci_upper)))
    }
}

impl ToFrame for TimeBinTotal {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_text("time_bin", rows.iter().map(|r| bin_label(r.time_bin.as_ref())))
            .with_int("count", rows.iter().map(|r| i64::try_from(r.count).ok()))
            .with_float("trade_time_mean", rows.iter().map(|r| Some(r.trade_time_mean)))
    }
}

impl CountHeatmap {
    /// One row per price bin and one count column per time bin.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::new().with_text(
            "price_bin",
            self.price_bins.iter().map(|p| Some(p.to_string())),
        );
        for (col, time_bin) in self.time_bins.iter().enumerate() {
            frame = frame.with_int(
                &time_bin.to_string(),
                self.counts
                    .iter()
                    .map(|row| row[col].and_then(|c| i64::try_from(c).ok())),
            );
        }
        frame
    }
}
