//! Synthetic market data: a benchmark index with volatility regimes and
//! security price histories tied to it through a single-factor beta model.
//!
//! Output is deterministic for a given seed. Every row produced here is meant
//! to be stored with the `synthetic` source tag.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::{DatedValue, TRADING_DAYS_PER_YEAR};

/// Floor on a generated daily return, keeping backward price walks positive.
const MIN_DAILY_RETURN: f64 = -0.95;

#[derive(Debug, Error)]
pub enum SyntheticError {
    #[error("invalid volatility {0} (must be finite and non-negative)")]
    InvalidVolatility(f64),

    #[error("anchor price must be positive, got {0}")]
    InvalidAnchor(f64),
}

/// `days` consecutive calendar dates ending at `end` (inclusive).
pub fn calendar_dates(end: NaiveDate, days: usize) -> Vec<NaiveDate> {
    (0..days)
        .rev()
        .map(|back| end - Duration::days(back as i64))
        .collect()
}

// ─── Benchmark ──────────────────────────────────────────────────────

/// A window of day indices over which daily volatility is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolRegime {
    /// First day index (inclusive).
    pub start: usize,
    /// Last day index (exclusive); `None` runs to the end of the series.
    pub end: Option<usize>,
    pub multiplier: f64,
}

impl VolRegime {
    fn contains(&self, day: usize) -> bool {
        day >= self.start && self.end.map_or(true, |e| day < e)
    }
}

/// Parameters of the synthetic benchmark index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkModel {
    pub annual_return: f64,
    pub annual_volatility: f64,
    pub start_level: f64,
    pub seed: u64,
    pub regimes: Vec<VolRegime>,
}

impl Default for BenchmarkModel {
    /// ASX 200-like: 7% drift, 15% vol, a crisis (days 101–149, ×2) and a calm
    /// recovery (day 201 on, ×0.8).
    fn default() -> Self {
        Self {
            annual_return: 0.07,
            annual_volatility: 0.15,
            start_level: 7000.0,
            seed: 100,
            regimes: vec![
                VolRegime {
                    start: 101,
                    end: Some(150),
                    multiplier: 2.0,
                },
                VolRegime {
                    start: 201,
                    end: None,
                    multiplier: 0.8,
                },
            ],
        }
    }
}

/// Generated benchmark: index levels and the daily returns that drive them.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticBenchmark {
    pub levels: Vec<DatedValue>,
    pub returns: Vec<DatedValue>,
}

impl BenchmarkModel {
    pub fn vol_multiplier(&self, day: usize) -> f64 {
        self.regimes
            .iter()
            .find(|r| r.contains(day))
            .map_or(1.0, |r| r.multiplier)
    }

    /// Generate one return per date. The level on the first date is
    /// `start_level`; each later level compounds that date's return.
    pub fn generate(&self, dates: &[NaiveDate]) -> Result<SyntheticBenchmark, SyntheticError> {
        let daily_mean = self.annual_return / TRADING_DAYS_PER_YEAR;
        let daily_vol = self.annual_volatility / TRADING_DAYS_PER_YEAR.sqrt();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut returns = Vec::with_capacity(dates.len());
        let mut levels = Vec::with_capacity(dates.len());
        let mut level = self.start_level;

        for (i, &date) in dates.iter().enumerate() {
            let sigma = daily_vol * self.vol_multiplier(i);
            let normal = Normal::new(daily_mean, sigma)
                .map_err(|_| SyntheticError::InvalidVolatility(sigma))?;
            let r = normal.sample(&mut rng).max(MIN_DAILY_RETURN);
            if i > 0 {
                level *= 1.0 + r;
            }
            returns.push(DatedValue::new(date, r));
            levels.push(DatedValue::new(date, level));
        }

        Ok(SyntheticBenchmark { levels, returns })
    }
}

// ─── Securities ─────────────────────────────────────────────────────

/// Single-factor exposure: r = beta × r_benchmark + N(0, idiosyncratic_vol).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaProfile {
    pub beta: f64,
    pub idiosyncratic_vol: f64,
}

impl BetaProfile {
    pub const fn new(beta: f64, idiosyncratic_vol: f64) -> Self {
        Self {
            beta,
            idiosyncratic_vol,
        }
    }
}

/// Built-in exposure for a ticker when no override is configured.
pub fn default_beta_profile(ticker: &str) -> BetaProfile {
    match ticker {
        "CASH" => BetaProfile::new(0.0, 0.001),
        "STW" => BetaProfile::new(1.0, 0.02),
        "DHHF" => BetaProfile::new(0.8, 0.04),
        "VGS" | "VEU" => BetaProfile::new(0.6, 0.06),
        "CBA.AX" => BetaProfile::new(1.2, 0.08),
        "BHP.AX" => BetaProfile::new(1.4, 0.12),
        t if t.ends_with(".AX") => BetaProfile::new(0.9, 0.10),
        _ => BetaProfile::new(0.7, 0.15),
    }
}

/// Override first, then the built-in table.
pub fn beta_profile(ticker: &str, overrides: &HashMap<String, BetaProfile>) -> BetaProfile {
    overrides
        .get(ticker)
        .copied()
        .unwrap_or_else(|| default_beta_profile(ticker))
}

/// Built-in current price used to anchor a history when none is on file.
pub fn default_anchor_price(ticker: &str) -> f64 {
    match ticker {
        "DHHF" => 30.50,
        "STW" => 85.20,
        "VGS" => 115.75,
        "VEU" => 65.40,
        "CBA.AX" => 125.80,
        "CSL.AX" => 295.50,
        "BHP.AX" => 48.75,
        "AAPL" => 185.25,
        "MSFT" => 415.80,
        "GOOGL" => 165.90,
        "CASH" => 1.00,
        _ => 100.00,
    }
}

/// Walk a price history backwards from `anchor_price` on the last date.
///
/// For each date after the first, the return into that date is drawn from the
/// beta model (or from the idiosyncratic term alone when the benchmark has no
/// return on that date), and the previous price is `price / (1 + r)`.
/// Returns prices for every date except the last, which is the anchor itself.
pub fn security_history(
    anchor_price: f64,
    dates: &[NaiveDate],
    benchmark_returns: &HashMap<NaiveDate, f64>,
    profile: BetaProfile,
    seed: u64,
) -> Result<Vec<DatedValue>, SyntheticError> {
    if !(anchor_price > 0.0) {
        return Err(SyntheticError::InvalidAnchor(anchor_price));
    }
    if dates.len() < 2 {
        return Ok(Vec::new());
    }

    let noise = Normal::new(0.0, profile.idiosyncratic_vol)
        .map_err(|_| SyntheticError::InvalidVolatility(profile.idiosyncratic_vol))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let n = dates.len();
    let mut prices = vec![0.0; n];
    prices[n - 1] = anchor_price;

    for i in (1..n).rev() {
        let eps = noise.sample(&mut rng);
        let r = match benchmark_returns.get(&dates[i]) {
            Some(b) => profile.beta * b + eps,
            None => eps,
        }
        .max(MIN_DAILY_RETURN);
        prices[i - 1] = prices[i] / (1.0 + r);
    }

    Ok(dates[..n - 1]
        .iter()
        .zip(&prices[..n - 1])
        .map(|(&date, &p)| DatedValue::new(date, p))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    #[test]
    fn calendar_dates_end_on_anchor() {
        let dates = calendar_dates(end(), 5);
        assert_eq!(dates.len(), 5);
        assert_eq!(*dates.last().unwrap(), end());
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2024, 12, 27).unwrap());
    }

    #[test]
    fn regimes_scale_volatility() {
        let model = BenchmarkModel::default();
        assert_eq!(model.vol_multiplier(0), 1.0);
        assert_eq!(model.vol_multiplier(100), 1.0);
        assert_eq!(model.vol_multiplier(101), 2.0);
        assert_eq!(model.vol_multiplier(149), 2.0);
        assert_eq!(model.vol_multiplier(150), 1.0);
        assert_eq!(model.vol_multiplier(200), 1.0);
        assert_eq!(model.vol_multiplier(201), 0.8);
    }

    #[test]
    fn benchmark_is_deterministic() {
        let dates = calendar_dates(end(), 252);
        let a = BenchmarkModel::default().generate(&dates).unwrap();
        let b = BenchmarkModel::default().generate(&dates).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.levels.len(), 252);
        assert_eq!(a.levels[0].value, 7000.0);
    }

    #[test]
    fn benchmark_levels_compound_returns() {
        let dates = calendar_dates(end(), 10);
        let bench = BenchmarkModel::default().generate(&dates).unwrap();
        for i in 1..10 {
            let expected = bench.levels[i - 1].value * (1.0 + bench.returns[i].value);
            assert!((bench.levels[i].value - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let dates = calendar_dates(end(), 20);
        let a = BenchmarkModel::default().generate(&dates).unwrap();
        let b = BenchmarkModel {
            seed: 7,
            ..BenchmarkModel::default()
        }
        .generate(&dates)
        .unwrap();
        assert_ne!(a.returns[1].value, b.returns[1].value);
    }

    #[test]
    fn profile_table() {
        assert_eq!(default_beta_profile("CASH"), BetaProfile::new(0.0, 0.001));
        assert_eq!(default_beta_profile("CSL.AX"), BetaProfile::new(0.9, 0.10));
        assert_eq!(default_beta_profile("VEU"), BetaProfile::new(0.6, 0.06));
        assert_eq!(default_beta_profile("AAPL"), BetaProfile::new(0.7, 0.15));
    }

    #[test]
    fn overrides_win() {
        let mut overrides = HashMap::new();
        overrides.insert("AAPL".to_string(), BetaProfile::new(1.1, 0.02));
        assert_eq!(beta_profile("AAPL", &overrides).beta, 1.1);
        assert_eq!(beta_profile("MSFT", &overrides).beta, 0.7);
    }

    #[test]
    fn anchor_prices() {
        assert_eq!(default_anchor_price("CBA.AX"), 125.80);
        assert_eq!(default_anchor_price("UNKNOWN"), 100.0);
    }

    #[test]
    fn security_history_excludes_anchor_date() {
        let dates = calendar_dates(end(), 30);
        let bench = BenchmarkModel::default().generate(&dates).unwrap();
        let by_date: HashMap<NaiveDate, f64> =
            bench.returns.iter().map(|r| (r.date, r.value)).collect();
        let history =
            security_history(50.0, &dates, &by_date, default_beta_profile("STW"), 44).unwrap();
        assert_eq!(history.len(), 29);
        assert_eq!(history[0].date, dates[0]);
        assert!(history.iter().all(|p| p.value > 0.0));
    }

    #[test]
    fn zero_noise_tracks_beta_exactly() {
        let dates = calendar_dates(end(), 3);
        let mut by_date = HashMap::new();
        by_date.insert(dates[1], 0.01);
        by_date.insert(dates[2], 0.02);
        let history = security_history(100.0, &dates, &by_date, BetaProfile::new(2.0, 0.0), 1).unwrap();
        // price[1] = 100 / 1.04, price[0] = price[1] / 1.02
        assert!((history[1].value - 100.0 / 1.04).abs() < 1e-9);
        assert!((history[0].value - 100.0 / 1.04 / 1.02).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_anchor() {
        let dates = calendar_dates(end(), 3);
        assert!(security_history(0.0, &dates, &HashMap::new(), BetaProfile::new(1.0, 0.1), 1).is_err());
    }
}
