//! Profit as a function of entry price.

use anyhow::Result;
use nt_research_core::stats::{mean, ols};
use nt_research_core::OlsFit;
use nt_research_data::{Frame, ToFrame};
use serde::{Deserialize, Serialize};

use crate::bins::PriceRange;
use crate::trades::Trade;

/// Mean profit in cents of the trades entered at one price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlPoint {
    pub trade_price: f64,
    pub pnl_mean: f64,
    pub count: usize,
}

/// Mean hold-to-resolution profit per distinct entry price inside `range`,
/// sorted by price.
#[must_use]
pub fn pnl_by_price(trades: &[Trade], range: &PriceRange) -> Vec<PnlPoint> {
    let mut priced: Vec<(f64, f64)> = trades
        .iter()
        .filter(|t| range.contains(t.price))
        .map(|t| {
            let pnl = if t.result.is_win() { 100.0 - t.price } else { -t.price };
            (t.price, pnl)
        })
        .collect();
    priced.sort_by(|a, b| a.0.total_cmp(&b.0));

    priced
        .chunk_by(|a, b| a.0 == b.0)
        .filter_map(|group| {
            let pnls: Vec<f64> = group.iter().map(|(_, pnl)| *pnl).collect();
            Some(PnlPoint {
                trade_price: group[0].0,
                pnl_mean: mean(&pnls)?,
                count: group.len(),
            })
        })
        .collect()
}

/// Ordinary least squares of `pnl_mean ~ trade_price`.
///
/// # Errors
/// Returns an error with fewer than three points or a single distinct price.
pub fn fit_pnl_regression(points: &[PnlPoint]) -> Result<OlsFit> {
    let x: Vec<f64> = points.iter().map(|p| p.trade_price).collect();
    let y: Vec<f64> = points.iter().map(|p| p.pnl_mean).collect();
    let fit = ols(&x, &y)?;
    tracing::debug!(
        "pnl_mean = {:.4} + {:.4} * trade_price (R^2 {:.4}, n {})",
        fit.intercept,
        fit.slope,
        fit.r_squared,
        fit.n
    );
    Ok(fit)
}

impl ToFrame for PnlPoint {
    fn to_frame(rows: &[Self]) -> Frame {
        Frame::new()
            .with_float("trade_price", rows.iter().map(|r| Some(r.trade_price)))
            .with_float("pnl_mean", rows.iter().map(|r| Some(r.pnl_mean)))
            .with_int("count", rows.iter().map(|r| i64::try_from(r.count).ok()))
    }
}
