//! Descriptive and inferential statistics used by the research pipelines.
//!
//! Return-based ratios here are per-trade (or per-day) and never annualised.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1), `None` for fewer than two values.
#[must_use]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Population standard deviation (ddof = 0), `None` for an empty slice.
#[must_use]
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / values.len() as f64).sqrt())
}

/// One-sample t statistic of a mean difference.
///
/// ```text
/// t = mean_diff / (std / sqrt(n))
/// ```
#[must_use]
pub fn t_stat(mean_diff: f64, std: Option<f64>, n: usize) -> Option<f64> {
    let std = std?;
    if n == 0 || std <= f64::EPSILON || !std.is_finite() {
        return None;
    }
    Some(mean_diff / (std / (n as f64).sqrt()))
}

/// Mean over standard deviation.
#[must_use]
pub fn sharpe(mean: Option<f64>, std: Option<f64>) -> Option<f64> {
    let (mean, std) = (mean?, std?);
    if std <= f64::EPSILON {
        return None;
    }
    Some(mean / std)
}

/// Mean return over maximum drawdown.
#[must_use]
pub fn calmar(mean: Option<f64>, max_drawdown: f64) -> Option<f64> {
    let mean = mean?;
    if max_drawdown <= f64::EPSILON {
        return None;
    }
    Some(mean / max_drawdown)
}

/// Calculates the Wilson score confidence interval for a proportion.
///
/// Preferred over the normal approximation for proportions near 0 or 1,
/// which is exactly where favourite/longshot contracts live.
///
/// # Formula
/// ```text
/// CI = (p + z^2/(2n) +/- z * sqrt(p(1-p)/n + z^2/(4n^2))) / (1 + z^2/n)
/// ```
///
/// # Examples
/// ```
/// use nt_research_core::stats::wilson_ci;
///
/// let (lower, upper) = wilson_ci(50, 100, 1.96);
/// assert!(lower > 0.39 && lower < 0.41);
/// assert!(upper > 0.59 && upper < 0.61);
/// ```
#[must_use]
pub fn wilson_ci(successes: usize, n: usize, z: f64) -> (f64, f64) {
    if n == 0 {
        return (0.0, 0.0);
    }

    let n_f = n as f64;
    let p = successes as f64 / n_f;
    let z_sq = z * z;

    let denominator = 1.0 + z_sq / n_f;
    let center = p + z_sq / (2.0 * n_f);

    let variance_term = p * (1.0 - p) / n_f;
    let correction_term = z_sq / (4.0 * n_f * n_f);
    let spread = z * (variance_term + correction_term).sqrt();

    let lower = (center - spread) / denominator;
    let upper = (center + spread) / denominator;

    (lower.max(0.0), upper.min(1.0))
}

/// Ordinary least squares fit of `y = intercept + slope * x`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OlsFit {
    pub intercept: f64,
    pub slope: f64,
    pub intercept_std_err: f64,
    pub slope_std_err: f64,
    pub intercept_t: Option<f64>,
    pub slope_t: Option<f64>,
    pub r_squared: f64,
    pub n: usize,
}

impl OlsFit {
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fits a simple linear regression with intercept.
///
/// # Errors
/// Returns an error if the inputs differ in length, there are fewer than
/// three points, or `x` has no variance.
pub fn ols(x: &[f64], y: &[f64]) -> Result<OlsFit> {
    if x.len() != y.len() {
        bail!("x and y lengths differ ({} vs {})", x.len(), y.len());
    }
    let n = x.len();
    if n < 3 {
        bail!("at least 3 points are required for a regression, got {n}");
    }

    let n_f = n as f64;
    let x_mean = x.iter().sum::<f64>() / n_f;
    let y_mean = y.iter().sum::<f64>() / n_f;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut sst = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        sxx += dx * dx;
        sxy += dx * dy;
        sst += dy * dy;
    }

    if sxx <= f64::EPSILON {
        bail!("x has no variance");
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let sse: f64 = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| (yi - (intercept + slope * xi)).powi(2))
        .sum();

    let sigma_sq = sse / (n_f - 2.0);
    let slope_std_err = (sigma_sq / sxx).sqrt();
    let intercept_std_err = (sigma_sq * (1.0 / n_f + x_mean * x_mean / sxx)).sqrt();

    let ratio = |coef: f64, se: f64| (se > f64::EPSILON).then(|| coef / se);

    let r_squared = if sst <= f64::EPSILON {
        1.0
    } else {
        1.0 - sse / sst
    };

    Ok(OlsFit {
        intercept,
        slope,
        intercept_std_err,
        slope_std_err,
        intercept_t: ratio(intercept, intercept_std_err),
        slope_t: ratio(slope, slope_std_err),
        r_squared,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================
    // Moments
    // ============================================

    #[test]
    fn mean_of_empty_is_none() {
        assert!(mean(&[]).is_none());
    }

    #[test]
    fn sample_std_matches_ddof_one() {
        // values 2, 4, 4, 4, 5, 5, 7, 9: population std 2, sample std sqrt(32/7)
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s = sample_std(&values).unwrap();
        assert!((s - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
        let p = population_std(&values).unwrap();
        assert!((p - 2.0).abs() < 1e-12);
    }

    #[test]
    fn sample_std_needs_two_values() {
        assert!(sample_std(&[1.0]).is_none());
        assert_eq!(population_std(&[1.0]), Some(0.0));
    }

    // ============================================
    // Ratios
    // ============================================

    #[test]
    fn t_stat_scales_with_sqrt_n() {
        let t = t_stat(2.0, Some(10.0), 100).unwrap();
        assert!((t - 2.0).abs() < 1e-12);
    }

    #[test]
    fn t_stat_undefined_without_dispersion() {
        assert!(t_stat(1.0, Some(0.0), 10).is_none());
        assert!(t_stat(1.0, None, 1).is_none());
    }

    #[test]
    fn sharpe_and_calmar() {
        assert_eq!(sharpe(Some(0.02), Some(0.04)), Some(0.5));
        assert!(sharpe(Some(0.02), Some(0.0)).is_none());
        assert_eq!(calmar(Some(0.01), 0.05), Some(0.2));
        assert!(calmar(Some(0.01), 0.0).is_none());
    }

    // ============================================
    // wilson_ci
    // ============================================

    #[test]
    fn wilson_ci_zero_samples() {
        assert_eq!(wilson_ci(0, 0, 1.96), (0.0, 0.0));
    }

    #[test]
    fn wilson_ci_all_wins_stays_below_one() {
        let (lower, upper) = wilson_ci(10, 10, 1.96);
        assert!(lower > 0.65, "lower was {lower}");
        assert!((upper - 1.0).abs() < 0.01, "upper was {upper}");
    }

    // ============================================
    // ols
    // ============================================

    #[test]
    fn ols_recovers_exact_line() {
        let x = [90.0, 92.0, 94.0, 96.0, 98.0];
        let y: Vec<f64> = x.iter().map(|v| 50.0 - 0.5 * v).collect();
        let fit = ols(&x, &y).unwrap();
        assert!((fit.slope + 0.5).abs() < 1e-9);
        assert!((fit.intercept - 50.0).abs() < 1e-7);
        assert!((fit.r_squared - 1.0).abs() < 1e-12);
        assert!((fit.predict(100.0) - 0.0).abs() < 1e-7);
    }

    #[test]
    fn ols_noisy_fit_has_standard_errors() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.1, 1.9, 3.2, 3.8, 5.1];
        let fit = ols(&x, &y).unwrap();
        assert!(fit.slope > 0.9 && fit.slope < 1.1, "slope was {}", fit.slope);
        assert!(fit.slope_std_err > 0.0);
        assert!(fit.slope_t.unwrap() > 10.0);
        assert!(fit.r_squared > 0.95);
        assert_eq!(fit.n, 5);
    }

    #[test]
    fn ols_rejects_degenerate_input() {
        assert!(ols(&[1.0, 2.0], &[1.0, 2.0]).is_err());
        assert!(ols(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_err());
        assert!(ols(&[1.0, 2.0, 3.0], &[1.0, 2.0]).is_err());
    }
}
