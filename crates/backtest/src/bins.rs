//! Price and elapsed-time bucketing.
//!
//! Bins are right-closed intervals `(lower, upper]`. A set of `n` ascending
//! breaks yields `n + 1` intervals, the outer two unbounded:
//!
//! ```text
//! breaks [0, 10, 20]  ->  (-inf, 0] (0, 10] (10, 20] (20, inf]
//! ```

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A right-closed interval `(lower, upper]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    #[must_use]
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    #[must_use]
    pub fn contains(&self, x: f64) -> bool {
        x > self.lower && x <= self.upper
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Interval {}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lower
            .total_cmp(&other.lower)
            .then_with(|| self.upper.total_cmp(&other.upper))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.lower, self.upper)
    }
}

impl FromStr for Interval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| anyhow!("Invalid interval '{s}', expected '(lower, upper]'"))?;
        let (lower, upper) = inner
            .split_once(',')
            .ok_or_else(|| anyhow!("Invalid interval '{s}', expected '(lower, upper]'"))?;
        let lower: f64 = lower
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid lower edge in '{s}'"))?;
        let upper: f64 = upper
            .trim()
            .parse()
            .map_err(|_| anyhow!("Invalid upper edge in '{s}'"))?;
        if lower.is_nan() || upper.is_nan() || lower >= upper {
            bail!("Invalid interval '{s}', lower edge must be below upper edge");
        }
        Ok(Self { lower, upper })
    }
}

/// An inclusive price range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }

    /// `[0, 10]`, `[10, 20]`, ..., `[90, 100]`.
    #[must_use]
    pub fn deciles() -> Vec<Self> {
        (0..10)
            .map(|i| Self::new(f64::from(i * 10), f64::from((i + 1) * 10)))
            .collect()
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Upper bound on the number of time bins a window may produce.
pub const MAX_TIME_BINS: i64 = 10_000;

fn check_time_window(min: i64, max: i64, interval: i64) -> Result<()> {
    if interval <= 0 {
        bail!("Time interval must be positive, got {interval}");
    }
    if max < min {
        bail!("Time window is empty: min {min} > max {max}");
    }
    let span = max
        .checked_sub(min)
        .ok_or_else(|| anyhow!("Time window overflows: {max} - {min}"))?;
    if span / interval > MAX_TIME_BINS {
        bail!("Time window {min}..{max} every {interval}m needs more than {MAX_TIME_BINS} bins");
    }
    Ok(())
}

/// Ascending bin edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breaks {
    edges: Vec<f64>,
}

impl Breaks {
    /// # Errors
    /// Returns an error if there are no edges or they are not strictly ascending.
    pub fn new(edges: Vec<f64>) -> Result<Self> {
        if edges.is_empty() {
            bail!("Breaks need at least one edge");
        }
        if edges.iter().any(|e| !e.is_finite()) {
            bail!("Break edges must be finite");
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            bail!("Break edges must be strictly ascending: {edges:?}");
        }
        Ok(Self { edges })
    }

    /// `0, 10, ..., 90`; the top bin is `(90, inf]`.
    #[must_use]
    pub fn price_deciles() -> Self {
        Self {
            edges: (0..10).map(|i| f64::from(i * 10)).collect(),
        }
    }

    /// `0, 10, ..., 90, 99`; isolates the `(90, 99]` favourites from settled prices.
    #[must_use]
    pub fn capped_price_deciles() -> Self {
        let mut breaks = Self::price_deciles();
        breaks.edges.push(99.0);
        breaks
    }

    /// `n_bins + 1` evenly spaced edges over `[0, 100]`.
    ///
    /// # Errors
    /// Returns an error if `n_bins` is zero.
    pub fn fine(n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            bail!("Fine bins need n_bins > 0");
        }
        let step = 100.0 / n_bins as f64;
        Ok(Self {
            edges: (0..=n_bins).map(|i| i as f64 * step).collect(),
        })
    }

    /// `min, min + interval, ...` for as long as the edge is below `max + interval`.
    ///
    /// # Errors
    /// Returns an error if the window is invalid or its edges overflow `i64`.
    pub fn time(min: i64, max: i64, interval: i64) -> Result<Self> {
        check_time_window(min, max, interval)?;
        let limit = max
            .checked_add(interval)
            .ok_or_else(|| anyhow!("Time window overflows: {max} + {interval}"))?;
        let mut edges = Vec::new();
        let mut edge = Some(min);
        while let Some(e) = edge.filter(|e| *e < limit) {
            edges.push(e as f64);
            edge = e.checked_add(interval);
        }
        Ok(Self { edges })
    }

    /// `min + interval, min + 2 * interval, ...` strictly below `max`.
    ///
    /// The outer bins stay unbounded, so `min` and `max` fall into them. A
    /// window no wider than one interval has no edges and a single bin.
    ///
    /// # Errors
    /// Returns an error if the window is invalid.
    pub fn open_time(min: i64, max: i64, interval: i64) -> Result<Self> {
        check_time_window(min, max, interval)?;
        let mut edges = Vec::new();
        let mut edge = min.checked_add(interval);
        while let Some(e) = edge.filter(|e| *e < max) {
            edges.push(e as f64);
            edge = e.checked_add(interval);
        }
        Ok(Self { edges })
    }

    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of intervals, including the two unbounded ones.
    #[must_use]
    pub fn num_intervals(&self) -> usize {
        self.edges.len() + 1
    }

    /// Position of the interval containing `x`, `None` for NaN.
    #[must_use]
    pub fn locate(&self, x: f64) -> Option<usize> {
        if x.is_nan() {
            return None;
        }
        Some(self.edges.partition_point(|edge| *edge < x))
    }

    #[must_use]
    pub fn interval(&self, index: usize) -> Option<Interval> {
        if index > self.edges.len() {
            return None;
        }
        let lower = index
            .checked_sub(1)
            .map_or(f64::NEG_INFINITY, |i| self.edges[i]);
        let upper = self.edges.get(index).copied().unwrap_or(f64::INFINITY);
        Some(Interval::new(lower, upper))
    }

    /// The interval containing `x`.
    #[must_use]
    pub fn cut(&self, x: f64) -> Option<Interval> {
        self.locate(x).and_then(|i| self.interval(i))
    }

    /// Every interval in ascending order.
    #[must_use]
    pub fn intervals(&self) -> Vec<Interval> {
        (0..self.num_intervals())
            .filter_map(|i| self.interval(i))
            .collect()
    }
}

/// Which ends of a [`TimeWindow`] are inclusive, and where its bins are cut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowBounds {
    /// `(min, max]` cut at [`Breaks::time`].
    #[default]
    RightClosed,
    /// `[min, max]` cut at [`Breaks::open_time`].
    Closed,
}

/// Elapsed-time window in minutes, split every `interval` minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub min: i64,
    pub max: i64,
    pub interval: i64,
    pub bounds: WindowBounds,
}

impl TimeWindow {
    /// A right-closed `(min, max]` window.
    ///
    /// # Errors
    /// Returns an error if `interval` is not positive, `max < min`, or the
    /// window needs too many bins.
    pub fn new(min: i64, max: i64, interval: i64) -> Result<Self> {
        Self::with_bounds(min, max, interval, WindowBounds::RightClosed)
    }

    /// # Errors
    /// Same as [`TimeWindow::new`].
    pub fn with_bounds(min: i64, max: i64, interval: i64, bounds: WindowBounds) -> Result<Self> {
        let window = Self {
            min,
            max,
            interval,
            bounds,
        };
        window.breaks()?;
        Ok(window)
    }

    #[must_use]
    pub fn contains(&self, elapsed: i64) -> bool {
        match self.bounds {
            WindowBounds::RightClosed => elapsed > self.min && elapsed <= self.max,
            WindowBounds::Closed => elapsed >= self.min && elapsed <= self.max,
        }
    }

    /// # Errors
    /// Returns an error if the window is invalid.
    pub fn breaks(&self) -> Result<Breaks> {
        match self.bounds {
            WindowBounds::RightClosed => Breaks::time(self.min, self.max, self.interval),
            WindowBounds::Closed => Breaks::open_time(self.min, self.max, self.interval),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = match self.bounds {
            WindowBounds::RightClosed => '(',
            WindowBounds::Closed => '[',
        };
        write!(f, "{open}{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================
    // Interval
    // ============================================

    #[test]
    fn interval_display_uses_shortest_form() {
        assert_eq!(Interval::new(90.0, 99.0).to_string(), "(90, 99]");
        assert_eq!(Interval::new(90.0, f64::INFINITY).to_string(), "(90, inf]");
        assert_eq!(Interval::new(-180.0, -120.0).to_string(), "(-180, -120]");
        assert_eq!(Interval::new(94.5, 95.0).to_string(), "(94.5, 95]");
    }

    #[test]
    fn interval_parses_its_own_display() {
        for interval in Breaks::capped_price_deciles().intervals() {
            let parsed: Interval = interval.to_string().parse().unwrap();
            assert_eq!(parsed, interval);
        }
        let top: Interval = " (90, inf] ".parse().unwrap();
        assert_eq!(top, Interval::new(90.0, f64::INFINITY));
    }

    #[test]
    fn interval_parse_rejects_garbage() {
        assert!("[90, 99]".parse::<Interval>().is_err());
        assert!("(90 99]".parse::<Interval>().is_err());
        assert!("(99, 90]".parse::<Interval>().is_err());
        assert!("(a, 90]".parse::<Interval>().is_err());
    }

    #[test]
    fn intervals_order_numerically_not_lexically() {
        let mut bins = vec![
            Interval::new(60.0, 120.0),
            Interval::new(-120.0, -60.0),
            Interval::new(-180.0, -120.0),
            Interval::new(0.0, 60.0),
        ];
        bins.sort();
        let labels: Vec<String> = bins.iter().map(ToString::to_string).collect();
        assert_eq!(
            labels,
            vec!["(-180, -120]", "(-120, -60]", "(0, 60]", "(60, 120]"]
        );
    }

    // ============================================
    // Breaks
    // ============================================

    #[test]
    fn cut_is_right_closed() {
        let breaks = Breaks::capped_price_deciles();
        assert_eq!(breaks.cut(90.0), Some(Interval::new(80.0, 90.0)));
        assert_eq!(breaks.cut(90.5), Some(Interval::new(90.0, 99.0)));
        assert_eq!(breaks.cut(99.0), Some(Interval::new(90.0, 99.0)));
        assert_eq!(breaks.cut(100.0), Some(Interval::new(99.0, f64::INFINITY)));
        assert_eq!(breaks.cut(0.0), Some(Interval::new(f64::NEG_INFINITY, 0.0)));
        assert_eq!(breaks.cut(f64::NAN), None);
    }

    #[test]
    fn price_deciles_top_bin_is_unbounded() {
        let breaks = Breaks::price_deciles();
        assert_eq!(breaks.cut(97.0).unwrap().to_string(), "(90, inf]");
        assert_eq!(breaks.num_intervals(), 11);
    }

    #[test]
    fn fine_breaks_are_evenly_spaced() {
        let breaks = Breaks::fine(100).unwrap();
        assert_eq!(breaks.edges().len(), 101);
        assert_eq!(breaks.locate(95.0), Some(95));
        assert_eq!(breaks.locate(94.5), Some(95));
        assert_eq!(breaks.locate(100.0), Some(100));
        assert!(Breaks::fine(0).is_err());
    }

    #[test]
    fn time_breaks_cover_window() {
        let breaks = Breaks::time(-180, 180, 60).unwrap();
        assert_eq!(
            breaks.edges(),
            &[-180.0, -120.0, -60.0, 0.0, 60.0, 120.0, 180.0]
        );
        // An uneven window gets one edge past max.
        let uneven = Breaks::time(0, 100, 30).unwrap();
        assert_eq!(uneven.edges(), &[0.0, 30.0, 60.0, 90.0, 120.0]);
        assert!(Breaks::time(0, 10, 0).is_err());
        assert!(Breaks::time(10, 0, 5).is_err());
    }

    #[test]
    fn new_rejects_unsorted_edges() {
        assert!(Breaks::new(vec![]).is_err());
        assert!(Breaks::new(vec![1.0, 1.0]).is_err());
        assert!(Breaks::new(vec![2.0, 1.0]).is_err());
        assert!(Breaks::new(vec![0.0, f64::INFINITY]).is_err());
        assert!(Breaks::new(vec![0.0, 50.0]).is_ok());
    }

    // ============================================
    // Ranges and windows
    // ============================================

    #[test]
    fn price_range_is_inclusive() {
        let range = PriceRange::new(90.0, 99.0);
        assert!(range.contains(90.0));
        assert!(range.contains(99.0));
        assert!(!range.contains(99.5));
        assert_eq!(range.to_string(), "[90, 99]");
        assert_eq!(PriceRange::deciles().len(), 10);
        assert_eq!(PriceRange::deciles()[9].to_string(), "[90, 100]");
    }

    #[test]
    fn time_window_excludes_lower_edge() {
        let window = TimeWindow::new(-180, 180, 60).unwrap();
        assert!(!window.contains(-180));
        assert!(window.contains(-179));
        assert!(window.contains(180));
        assert!(!window.contains(181));
        assert_eq!(window.to_string(), "(-180, 180]");
    }

    #[test]
    fn closed_window_keeps_both_edges_in_unbounded_outer_bins() {
        let window = TimeWindow::with_bounds(-180, 180, 60, WindowBounds::Closed).unwrap();
        assert!(window.contains(-180));
        assert!(window.contains(180));
        assert!(!window.contains(-181));
        assert_eq!(window.to_string(), "[-180, 180]");

        let breaks = window.breaks().unwrap();
        assert_eq!(breaks.edges(), &[-120.0, -60.0, 0.0, 60.0, 120.0]);
        assert_eq!(breaks.cut(-180.0).unwrap().to_string(), "(-inf, -120]");
        assert_eq!(breaks.cut(130.0).unwrap().to_string(), "(120, inf]");
    }

    #[test]
    fn narrow_closed_window_is_one_bin() {
        let breaks = Breaks::open_time(0, 30, 60).unwrap();
        assert!(breaks.edges().is_empty());
        assert_eq!(breaks.intervals(), vec![Interval::new(f64::NEG_INFINITY, f64::INFINITY)]);
    }

    #[test]
    fn time_breaks_reject_overflow_and_huge_windows() {
        assert!(Breaks::time(i64::MAX - 10, i64::MAX, 60).is_err());
        assert!(Breaks::time(0, i64::MAX, 60).is_err());
        assert!(Breaks::time(i64::MIN, i64::MAX, i64::MAX).is_err());
        assert!(Breaks::open_time(i64::MIN, i64::MAX, 1).is_err());
        assert!(TimeWindow::new(0, 1_000_000, 1).is_err());
        assert!(TimeWindow::new(0, 1_000_000, 1_000).is_ok());
    }
}
