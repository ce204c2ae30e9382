//! Contract quote snapshot model.
//!
//! One record per (ticker, candle period). Prices are YES-side quotes in
//! cents, so they double as implied probabilities in percent.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::Frame;

/// Resolved outcome of a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    /// Parses the raw `result` column; anything other than yes/no is unresolved.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            _ => None,
        }
    }

    /// 1 for YES, 0 for NO.
    #[must_use]
    pub fn as_int(self) -> i32 {
        match self {
            Self::Yes => 1,
            Self::No => 0,
        }
    }

    #[must_use]
    pub fn is_win(self) -> bool {
        self == Self::Yes
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub end_period_ts: DateTime<Utc>,
    pub ticker: String,
    pub game_start_time_utc: DateTime<Utc>,
    pub yes_ask_close: Option<f64>,
    pub yes_bid_close: Option<f64>,
    pub yes_ask_open: Option<f64>,
    pub yes_ask_high: Option<f64>,
    pub yes_ask_low: Option<f64>,
    pub result: Outcome,
}

impl QuoteRecord {
    pub fn new(
        ticker: impl Into<String>,
        game_start_time_utc: DateTime<Utc>,
        end_period_ts: DateTime<Utc>,
        yes_ask_close: Option<f64>,
        result: Outcome,
    ) -> Self {
        Self {
            end_period_ts,
            ticker: ticker.into(),
            game_start_time_utc,
            yes_ask_close,
            yes_bid_close: None,
            yes_ask_open: None,
            yes_ask_high: None,
            yes_ask_low: None,
            result,
        }
    }

    #[must_use]
    pub fn with_bid(mut self, yes_bid_close: Option<f64>) -> Self {
        self.yes_bid_close = yes_bid_close;
        self
    }

    /// Whole minutes since game start, truncated toward zero.
    #[must_use]
    pub fn elapsed_minutes(&self) -> i64 {
        (self.end_period_ts - self.game_start_time_utc).num_minutes()
    }

    /// Mean of the non-null bid and ask closes.
    #[must_use]
    pub fn mid_close(&self) -> Option<f64> {
        match (self.yes_bid_close, self.yes_ask_close) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }
}

/// Row accounting for a snapshot load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    /// Rows whose result was neither yes nor no.
    pub unresolved: usize,
    /// Rows missing a timestamp or ticker.
    pub incomplete: usize,
}

impl LoadStats {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Read: {}, Kept: {}, Unresolved: {}, Incomplete: {}",
            self.rows_read, self.rows_kept, self.unresolved, self.incomplete
        )
    }
}

/// Converts a snapshot frame into quote records.
///
/// `end_period_ts`, `ticker`, `game_start_time_utc`, `yes_ask_close` and
/// `result` are required; the bid and OHLC ask columns are optional.
///
/// # Errors
/// Returns an error if a required column is missing or has the wrong type.
pub fn quotes_from_frame(frame: &Frame) -> Result<(Vec<QuoteRecord>, LoadStats)> {
    frame.check_shape()?;

    let end_ts = frame.timestamps("end_period_ts")?;
    let tickers = frame.texts("ticker")?;
    let game_start = frame.timestamps("game_start_time_utc")?;
    let results = frame.texts("result")?;
    let ask_close = frame.floats("yes_ask_close")?;
    let bid_close = frame.optional_floats("yes_bid_close")?;
    let ask_open = frame.optional_floats("yes_ask_open")?;
    let ask_high = frame.optional_floats("yes_ask_high")?;
    let ask_low = frame.optional_floats("yes_ask_low")?;

    let optional = |col: &Option<Vec<Option<f64>>>, i: usize| col.as_ref().and_then(|v| v[i]);

    let mut stats = LoadStats {
        rows_read: frame.num_rows(),
        ..LoadStats::default()
    };
    let mut quotes = Vec::with_capacity(frame.num_rows());

    for i in 0..frame.num_rows() {
        let (Some(end_period_ts), Some(ticker), Some(game_start_time_utc)) =
            (end_ts[i], tickers[i].as_ref(), game_start[i])
        else {
            stats.incomplete += 1;
            continue;
        };

        let Some(result) = results[i].as_deref().and_then(Outcome::parse) else {
            stats.unresolved += 1;
            continue;
        };

        quotes.push(QuoteRecord {
            end_period_ts,
            ticker: ticker.clone(),
            game_start_time_utc,
            yes_ask_close: ask_close[i],
            yes_bid_close: optional(&bid_close, i),
            yes_ask_open: optional(&ask_open, i),
            yes_ask_high: optional(&ask_high, i),
            yes_ask_low: optional(&ask_low, i),
            result,
        });
    }

    stats.rows_kept = quotes.len();
    Ok((quotes, stats))
}

/// Converts quote records back into a snapshot frame.
#[must_use]
pub fn quotes_to_frame(quotes: &[QuoteRecord]) -> Frame {
    Frame::new()
        .with_timestamp("end_period_ts", quotes.iter().map(|q| Some(q.end_period_ts)))
        .with_text("ticker", quotes.iter().map(|q| Some(q.ticker.clone())))
        .with_float("yes_ask_open", quotes.iter().map(|q| q.yes_ask_open))
        .with_float("yes_ask_high", quotes.iter().map(|q| q.yes_ask_high))
        .with_float("yes_ask_low", quotes.iter().map(|q| q.yes_ask_low))
        .with_float("yes_ask_close", quotes.iter().map(|q| q.yes_ask_close))
        .with_float("yes_bid_close", quotes.iter().map(|q| q.yes_bid_close))
        .with_timestamp(
            "game_start_time_utc",
            quotes.iter().map(|q| Some(q.game_start_time_utc)),
        )
        .with_text(
            "result",
            quotes.iter().map(|q| Some(q.result.as_str().to_string())),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 5, 17, 0, 0).unwrap()
    }

    // ============================================
    // Outcome
    // ============================================

    #[test]
    fn outcome_parse_is_case_insensitive() {
        assert_eq!(Outcome::parse("yes"), Some(Outcome::Yes));
        assert_eq!(Outcome::parse(" NO "), Some(Outcome::No));
        assert_eq!(Outcome::parse(""), None);
        assert_eq!(Outcome::parse("void"), None);
        assert_eq!(Outcome::Yes.as_int(), 1);
        assert_eq!(Outcome::No.as_int(), 0);
    }

    // ============================================
    // QuoteRecord
    // ============================================

    #[test]
    fn elapsed_minutes_truncates_toward_zero() {
        let q = QuoteRecord::new(
            "T",
            start(),
            start() + Duration::seconds(90),
            Some(50.0),
            Outcome::Yes,
        );
        assert_eq!(q.elapsed_minutes(), 1);

        let before = QuoteRecord::new(
            "T",
            start(),
            start() - Duration::seconds(90),
            Some(50.0),
            Outcome::Yes,
        );
        assert_eq!(before.elapsed_minutes(), -1);
    }

    #[test]
    fn mid_close_ignores_missing_side() {
        let q = QuoteRecord::new("T", start(), start(), Some(96.0), Outcome::Yes);
        assert_eq!(q.mid_close(), Some(96.0));
        assert_eq!(q.clone().with_bid(Some(94.0)).mid_close(), Some(95.0));
        let empty = QuoteRecord::new("T", start(), start(), None, Outcome::Yes);
        assert_eq!(empty.mid_close(), None);
    }

    // ============================================
    // Frame conversion
    // ============================================

    #[test]
    fn quotes_from_frame_drops_unresolved_and_incomplete_rows() {
        let ts = start() + Duration::minutes(5);
        let frame = Frame::new()
            .with_timestamp("end_period_ts", vec![Some(ts), Some(ts), None])
            .with_text(
                "ticker",
                vec![Some("A".into()), Some("B".into()), Some("C".into())],
            )
            .with_int("yes_ask_close", vec![Some(95), Some(40), Some(10)])
            .with_timestamp(
                "game_start_time_utc",
                vec![Some(start()), Some(start()), Some(start())],
            )
            .with_text(
                "result",
                vec![Some("yes".into()), Some("".into()), Some("no".into())],
            );

        let (quotes, stats) = quotes_from_frame(&frame).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].ticker, "A");
        assert_eq!(quotes[0].yes_ask_close, Some(95.0));
        assert_eq!(quotes[0].yes_bid_close, None);
        assert_eq!(
            stats,
            LoadStats {
                rows_read: 3,
                rows_kept: 1,
                unresolved: 1,
                incomplete: 1
            }
        );
    }

    #[test]
    fn quotes_from_frame_requires_result_column() {
        let frame = Frame::new()
            .with_timestamp("end_period_ts", vec![Some(start())])
            .with_text("ticker", vec![Some("A".into())])
            .with_float("yes_ask_close", vec![Some(1.0)])
            .with_timestamp("game_start_time_utc", vec![Some(start())]);
        let err = quotes_from_frame(&frame).unwrap_err();
        assert!(err.to_string().contains("result"));
    }

    #[test]
    fn frame_conversion_preserves_quotes() {
        let quotes = vec![
            QuoteRecord::new("A", start(), start(), Some(91.0), Outcome::Yes).with_bid(Some(89.0)),
            QuoteRecord::new("B", start(), start(), None, Outcome::No),
        ];
        let (back, stats) = quotes_from_frame(&quotes_to_frame(&quotes)).unwrap();
        assert_eq!(back, quotes);
        assert_eq!(stats.rows_kept, 2);
    }
}
