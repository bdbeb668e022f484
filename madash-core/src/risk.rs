//! Risk statistics — pure functions over daily return series.
//!
//! Every statistic is a single-pass reduction: return slice in, scalar out.
//! Moments are population moments (divide by n) throughout, so beta,
//! volatility and tracking error are mutually consistent. Beta in particular
//! is population covariance over population variance; a sample covariance
//! over a population variance would overstate it by n/(n-1).

use serde::{Deserialize, Serialize};

use crate::domain::TRADING_DAYS_PER_YEAR;

/// Default risk-free rate used for the Sharpe ratio (annual, as a fraction).
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;

/// Minimum number of date-aligned observations before beta is reported.
pub const DEFAULT_MIN_OVERLAP: usize = 30;

/// Knobs for [`RiskReport::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    pub risk_free_rate: f64,
    pub min_overlap: usize,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            min_overlap: DEFAULT_MIN_OVERLAP,
        }
    }
}

/// Relative statistics against a benchmark, computed on date-aligned returns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRelative {
    pub beta: Option<f64>,
    pub correlation: Option<f64>,
    pub tracking_error: f64,
    pub overlap: usize,
}

/// The fixed set of statistics persisted per portfolio and calculation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub var_95: f64,
    pub var_99: f64,
    pub daily_volatility: f64,
    pub annualized_volatility: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub observations: usize,
    /// `None` when fewer than `min_overlap` aligned observations exist.
    pub relative: Option<BenchmarkRelative>,
}

impl RiskReport {
    /// Compute every statistic from a portfolio return series and, optionally,
    /// a pair of date-aligned (portfolio, benchmark) return slices.
    pub fn compute(
        portfolio_returns: &[f64],
        aligned: Option<(&[f64], &[f64])>,
        params: &RiskParams,
    ) -> Self {
        let daily_vol = daily_volatility(portfolio_returns);
        let annual_vol = annualize_volatility(daily_vol);
        let relative = aligned
            .filter(|(p, b)| p.len() == b.len() && p.len() >= params.min_overlap)
            .map(|(p, b)| BenchmarkRelative {
                beta: beta(p, b),
                correlation: correlation(p, b),
                tracking_error: tracking_error(p, b),
                overlap: p.len(),
            });

        Self {
            var_95: historical_var(portfolio_returns, 0.95),
            var_99: historical_var(portfolio_returns, 0.99),
            daily_volatility: daily_vol,
            annualized_volatility: annual_vol,
            annualized_return: annualized_mean_return(portfolio_returns),
            sharpe_ratio: sharpe_ratio(portfolio_returns, params.risk_free_rate),
            max_drawdown: max_drawdown(portfolio_returns),
            observations: portfolio_returns.len(),
            relative,
        }
    }
}

// ─── Individual statistics ──────────────────────────────────────────

/// One-day historical VaR at `confidence` (e.g. 0.95), as a positive loss fraction.
///
/// |percentile(returns, 1 - confidence)| with linear interpolation between
/// order statistics. Returns 0.0 for an empty series.
pub fn historical_var(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    percentile(returns, (1.0 - confidence) * 100.0).abs()
}

/// Percentile `q` in [0, 100] using linear interpolation (the "linear" method).
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q = q.clamp(0.0, 100.0) / 100.0;
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Population standard deviation of daily returns.
pub fn daily_volatility(returns: &[f64]) -> f64 {
    population_std(returns)
}

/// Scale a daily volatility to annual with the square-root-of-time rule.
pub fn annualize_volatility(daily: f64) -> f64 {
    daily * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Arithmetic mean daily return times 252.
pub fn annualized_mean_return(returns: &[f64]) -> f64 {
    mean(returns) * TRADING_DAYS_PER_YEAR
}

/// Annualised Sharpe ratio: (annualised mean − rf) / annualised volatility.
///
/// Returns 0.0 when volatility is zero.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    let annual_vol = annualize_volatility(daily_volatility(returns));
    if annual_vol < 1e-15 {
        return 0.0;
    }
    (annualized_mean_return(returns) - risk_free_rate) / annual_vol
}

/// Maximum drawdown of the compounded return path, as a positive fraction.
///
/// The path is cumprod(1 + r); drawdown is measured against the running
/// maximum of that path. Returns 0.0 for empty or monotonically rising paths.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut cumulative = 1.0_f64;
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;

    for r in returns {
        cumulative *= 1.0 + r;
        if cumulative > peak {
            peak = cumulative;
        }
        if peak > 0.0 {
            let dd = (cumulative - peak) / peak;
            if dd < worst {
                worst = dd;
            }
        }
    }
    worst.abs()
}

/// Beta of `portfolio` against `benchmark`: cov(p, b) / var(b).
///
/// `None` when the slices differ in length, are empty, or the benchmark has
/// zero variance.
pub fn beta(portfolio: &[f64], benchmark: &[f64]) -> Option<f64> {
    if portfolio.len() != benchmark.len() || portfolio.is_empty() {
        return None;
    }
    let var_b = population_variance(benchmark);
    if var_b < 1e-20 {
        return None;
    }
    Some(population_covariance(portfolio, benchmark) / var_b)
}

/// Pearson correlation. `None` when either side has zero variance.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let sa = population_std(a);
    let sb = population_std(b);
    if sa < 1e-15 || sb < 1e-15 {
        return None;
    }
    Some(population_covariance(a, b) / (sa * sb))
}

/// Annualised tracking error: std(p − b) × √252.
pub fn tracking_error(portfolio: &[f64], benchmark: &[f64]) -> f64 {
    let active: Vec<f64> = portfolio
        .iter()
        .zip(benchmark)
        .map(|(p, b)| p - b)
        .collect();
    annualize_volatility(population_std(&active))
}

// ─── Helpers ────────────────────────────────────────────────────────

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub(crate) fn population_std(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

fn population_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let ma = mean(&a[..n]);
    let mb = mean(&b[..n]);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / n as f64
}
