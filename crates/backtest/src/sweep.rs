//! Parameter sweeps over entry time and price.

use anyhow::Result;
use nt_research_core::stats::{mean, sample_std, sharpe};
use nt_research_data::{Frame, QuoteRecord, ToFrame};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bins::{Breaks, PriceRange};
use crate::performance::profits;
use crate::trades::{first_trades, PriceSelection, PriceSource};

/// Entry times `30, 60, ..., 180` minutes after start.
#[must_use]
pub fn default_entry_times() -> Vec<i64> {
    (1..=6).map(|i| i * 30).collect()
}

/// One fine price bin, identified by its upper edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FineBin {
    pub bin: i64,
    pub count: usize,
    pub trade_price: f64,
    /// Percentage of trades resolving YES.
    pub result: f64,
}

/// Calibration over `n_bins` equal-width price bins of the first trades at
/// or after `entry_time`, sorted by bin.
///
/// # Errors
/// Returns an error if `n_bins` is zero.
pub fn fine_calibration(
    quotes: &[QuoteRecord],
    entry_time: i64,
    n_bins: usize,
) -> Result<Vec<FineBin>> {
    let breaks = Breaks::fine(n_bins)?;
    let step = 100.0 / n_bins as f64;

    let mut groups: BTreeMap<i64, Vec<(f64, f64)>> = BTreeMap::new();
    for trade in first_trades(quotes, entry_time, PriceSource::AskClose) {
        let Some(index) = breaks.locate(trade.price) else {
            continue;
        };
        #[allow(clippy::cast_possible_truncation)]
        let bin = (index as f64 * step) as i64;
        groups
            .entry(bin)
            .or_default()
            .push((trade.price, trade.result_value() * 100.0));
    }

    Ok(groups
        .into_iter()
        .filter_map(|(bin, members)| {
            let prices: Vec<f64> = members.iter().map(|(p, _)| *p).collect();
            let results: Vec<f64> = members.iter().map(|(_, r)| *r).collect();
            Some(FineBin {
                bin,
                count: members.len(),
                trade_price: mean(&prices)?,
                result: mean(&results)?,
            })
        })
        .collect())
}

/// Count-weighted calibration of the fine bins inside a price range at one entry time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSweepRow {
    pub entry_time: i64,
    pub trade_price: f64,
    pub result: f64,
    pub count: usize,
}

/// Runs a fine calibration per entry time and summarises the bins whose id
/// lies in `bin_range`. Entry times without trades in range are omitted.
///
/// # Errors
/// Returns an error if `n_bins` is zero.
pub fn calibration_sweep(
    quotes: &[QuoteRecord],
    entry_times: &[i64],
    n_bins: usize,
    bin_range: &PriceRange,
) -> Result<Vec<CalibrationSweepRow>> {
    let mut rows = Vec::with_capacity(entry_times.len());

    for &entry_time in entry_times {
        let bins: Vec<FineBin> = fine_calibration(quotes, entry_time, n_bins)?
            .into_iter()
            .filter(|b| bin_range.contains(b.bin as f64))
            .collect();

        let count: usize = bins.iter().map(|b| b.count).sum();
        if count == 0 {
            tracing::debug!("No trades in {} at t >= {}", bin_range, entry_time);
            continue;
        }
        let weight = count as f64;
        rows.push(CalibrationSweepRow {
            entry_time,
            trade_price: bins.iter().map(|b| b.trade_price * b.count as f64).sum::<f64>() / weight,
            result: bins.iter().map(|b| b.result * b.count as f64).sum::<f64>() / weight,
            count,
        });
    }

    rows.sort_by(|a, b| {
        a.entry_time
            .cmp(&b.entry_time)
            .then(a.trade_price.total_cmp(&b.trade_price))
    });
    Ok(rows)
}

/// Return statistics of one (entry time, price range) sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSweepRow {
    pub entry_time: i64,
    pub price_range: PriceRange,
    pub count: usize,
    pub return_mean: Option<f64>,
    pub return_std: Option<f64>,
    pub sharpe: Option<f64>,
}

/// Hold-to-resolution return statistics for every entry time and inclusive price range.
#[must_use]
pub fn performance_sweep(
    quotes: &[QuoteRecord],
    entry_times: &[i64],
    price_ranges: &[PriceRange],
) -> Vec<PerformanceSweepRow> {
    let mut rows = Vec::with_capacity(entry_times.len() * price_ranges.len());

    for &entry_time in entry_times {
        let trades = first_trades(quotes, entry_time, PriceSource::AskClose);
        for range in price_ranges {
            let returns: Vec<f64> = profits(&trades, &PriceSelection::Range(*range))
                .iter()
                .map(|p| p.return_)
                .collect();
            let return_mean = mean(&returns);
            let return_std = sample_std(&returns);
            rows.push(PerformanceSweepRow {
                entry_time,
                price_range: *range,
                count: returns.len(),
                return_mean,
                return_std,
                sharpe: sharpe(return_mean, return_std),
            });
        }
    }

    rows
}

/// Rows whose price range is one of `ranges`.
#[must_use]
pub fn select_ranges(
    rows: &[PerformanceSweepRow],
    ranges: &[PriceRange],
) -> Vec<PerformanceSweepRow> {
    rows.iter()
        .filter(|r| ranges.contains(&r.price_range))
        .cloned()
        .collect()
}

impl ToFrame for CalibrationSweepRow {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_int("min_elapsed_time", rows.iter().map(|r| Some(r.entry_time)))
            .with_float("trade_price", rows.iter().map(|r| Some(r.trade_price)))
            .with_float("result", rows.iter().map(|r| Some(r.result)))
            .with_int("count", rows.iter().map(|r| i64::try_from(r.count).ok()))
    }
}

impl ToFrame for PerformanceSweepRow {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_int("min_elapsed_time", rows.iter().map(|r| Some(r.entry_time)))
            .with_text("price_interval", rows.iter().map(|r| Some(r.price_range.to_string())))
            .with_int("count", rows.iter().map(|r| i64::try_from(r.count).ok()))
            .with_float("return_mean", rows.iter().map(|r| r.return_mean))
            .with_float("return_std", rows.iter().map(|r| r.return_std))
            .with_float("return_sharpe", rows.iter().map(|r| r.sharpe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use nt_research_data::Outcome;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 21, 17, 0, 0).unwrap()
    }

    fn quote(ticker: &str, minute: i64, ask: f64, won: bool) -> QuoteRecord {
        let result = if won { Outcome::Yes } else { Outcome::No };
        QuoteRecord::new(ticker, start(), start() + Duration::minutes(minute), Some(ask), result)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn default_entry_times_step_by_half_hour() {
        assert_eq!(default_entry_times(), vec![30, 60, 90, 120, 150, 180]);
    }

    // ============================================
    // Calibration sweep
    // ============================================

    #[test]
    fn fine_bins_are_named_by_upper_edge() {
        let quotes = vec![
            quote("A", 30, 94.5, true),
            quote("B", 30, 95.0, false),
            quote("C", 30, 96.0, true),
            quote("D", 30, 100.0, true),
        ];

        let bins = fine_calibration(&quotes, 30, 100).unwrap();

        let ids: Vec<i64> = bins.iter().map(|b| b.bin).collect();
        assert_eq!(ids, vec![95, 96, 100]);
        assert_eq!(bins[0].count, 2);
        assert_close(bins[0].trade_price, 94.75);
        assert_close(bins[0].result, 50.0);
    }

    #[test]
    fn calibration_sweep_weights_by_count() {
        let quotes = vec![
            quote("A", 30, 94.5, true),
            quote("B", 30, 95.0, false),
            quote("C", 30, 96.0, true),
            quote("D", 30, 40.0, true),
            // First quoted at t = 60, so it trades in both runs.
            quote("E", 60, 91.0, true),
        ];

        let range = PriceRange::new(90.0, 100.0);
        let rows = calibration_sweep(&quotes, &[30, 60], 100, &range).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entry_time, 30);
        assert_eq!(rows[0].count, 4);
        assert_close(rows[0].trade_price, (94.5 + 95.0 + 96.0 + 91.0) / 4.0);
        assert_close(rows[0].result, 75.0);
        assert_eq!(rows[1].entry_time, 60);
        assert_eq!(rows[1].count, 1);
        assert_close(rows[1].trade_price, 91.0);
    }

    #[test]
    fn calibration_sweep_rejects_zero_bins() {
        assert!(calibration_sweep(&[], &[30], 0, &PriceRange::new(90.0, 100.0)).is_err());
    }

    // ============================================
    // Performance sweep
    // ============================================

    #[test]
    fn performance_sweep_covers_every_pair() {
        let quotes = vec![
            quote("A", 30, 95.0, true),
            quote("B", 30, 90.0, false),
            quote("C", 30, 5.0, false),
            quote("D", 30, 10.0, true),
        ];

        let rows = performance_sweep(&quotes, &[30, 60], &PriceRange::deciles());
        assert_eq!(rows.len(), 20);

        let top = &rows[9];
        assert_eq!(top.price_range.to_string(), "[90, 100]");
        assert_eq!(top.count, 2);
        assert_close(top.return_mean.unwrap(), (5.0 / 95.0 - 1.0) / 2.0);

        // Inclusive ranges share their edges: 90 counts in [80, 90] and [90, 100].
        assert_eq!(rows[8].count, 1);
        assert_eq!(rows[0].count, 2);
        assert!(rows[10..].iter().all(|r| r.count == 0 && r.sharpe.is_none()));

        let tails = select_ranges(
            &rows,
            &[PriceRange::new(0.0, 10.0), PriceRange::new(90.0, 100.0)],
        );
        assert_eq!(tails.len(), 4);

        let frame = PerformanceSweepRow::to_frame(&tails);
        assert_eq!(frame.column("price_interval").unwrap().data.display(0), "[0, 10]");
    }
}
