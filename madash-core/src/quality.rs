//! Data-quality scoring: how much of an entity's price history is real
//! market data, and how much of a portfolio's weight rests on it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::PriceSource;

/// Aggregate counts over one entity's stored price rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityStats {
    pub total: u64,
    pub real: u64,
    pub synthetic: u64,
    pub first_real: Option<NaiveDate>,
    pub last_real: Option<NaiveDate>,
}

impl QualityStats {
    /// Fraction of rows that are real, in [0, 1]. Zero when there are no rows.
    pub fn score(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.real as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    /// `yfinance` only when real rows strictly outnumber synthetic ones.
    pub fn primary_source(&self) -> PriceSource {
        if self.real > self.synthetic {
            PriceSource::YahooFinance
        } else {
            PriceSource::Synthetic
        }
    }

    pub fn has_real_data(&self) -> bool {
        self.real > 0
    }
}

/// Banded reading of a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityRating {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityRating {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.7 {
            Self::Good
        } else if score >= 0.4 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
        }
    }
}

impl fmt::Display for QualityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Portfolio coverage ─────────────────────────────────────────────

/// One held security and the provenance of its price rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingCoverage {
    pub ticker: String,
    /// Portfolio weight as a fraction.
    pub weight: f64,
    pub real_records: u64,
    pub synthetic_records: u64,
}

impl HoldingCoverage {
    pub fn total_records(&self) -> u64 {
        self.real_records + self.synthetic_records
    }

    /// A holding counts as real when real rows outnumber synthetic ones.
    pub fn source(&self) -> PriceSource {
        QualityStats {
            total: self.total_records(),
            real: self.real_records,
            synthetic: self.synthetic_records,
            first_real: None,
            last_real: None,
        }
        .primary_source()
    }
}

/// Overall judgement of how much of a portfolio is backed by real data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageVerdict {
    Excellent,
    Good,
    Poor,
}

impl CoverageVerdict {
    /// From real-data weight in percent: > 80 Excellent, > 50 Good, else Poor.
    pub fn from_real_pct(real_pct: f64) -> Self {
        if real_pct > 80.0 {
            Self::Excellent
        } else if real_pct > 50.0 {
            Self::Good
        } else {
            Self::Poor
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Excellent => "EXCELLENT - most of the portfolio uses real market data",
            Self::Good => "GOOD - majority of the portfolio has real data",
            Self::Poor => "POOR - mostly synthetic data",
        }
    }
}

/// Real versus synthetic weight over a set of holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioCoverage {
    pub holdings: Vec<HoldingCoverage>,
    pub real_pct: f64,
    pub synthetic_pct: f64,
}

impl PortfolioCoverage {
    /// Each holding's weight is counted once, on the side of its primary source.
    /// Holdings are ordered by descending weight.
    pub fn from_holdings(mut holdings: Vec<HoldingCoverage>) -> Self {
        holdings.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let (mut real_pct, mut synthetic_pct) = (0.0, 0.0);
        for h in &holdings {
            if h.source().is_real() {
                real_pct += h.weight * 100.0;
            } else {
                synthetic_pct += h.weight * 100.0;
            }
        }
        Self {
            holdings,
            real_pct,
            synthetic_pct,
        }
    }

    pub fn verdict(&self) -> CoverageVerdict {
        CoverageVerdict::from_real_pct(self.real_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(real: u64, synthetic: u64) -> QualityStats {
        QualityStats {
            total: real + synthetic,
            real,
            synthetic,
            first_real: None,
            last_real: None,
        }
    }

    #[test]
    fn score_empty_is_zero() {
        assert_eq!(QualityStats::default().score(), 0.0);
    }

    #[test]
    fn score_is_real_fraction() {
        assert!((stats(3, 1).score() - 0.75).abs() < 1e-12);
        assert_eq!(stats(10, 0).score(), 1.0);
    }

    #[test]
    fn primary_source_ties_go_synthetic() {
        assert_eq!(stats(5, 5).primary_source(), PriceSource::Synthetic);
        assert_eq!(stats(6, 5).primary_source(), PriceSource::YahooFinance);
        assert_eq!(stats(0, 0).primary_source(), PriceSource::Synthetic);
    }

    #[test]
    fn rating_bands() {
        assert_eq!(QualityRating::from_score(0.95), QualityRating::Excellent);
        assert_eq!(QualityRating::from_score(0.9), QualityRating::Excellent);
        assert_eq!(QualityRating::from_score(0.7), QualityRating::Good);
        assert_eq!(QualityRating::from_score(0.5), QualityRating::Fair);
        assert_eq!(QualityRating::from_score(0.39), QualityRating::Poor);
        assert_eq!(QualityRating::Good.to_string(), "Good");
    }

    #[test]
    fn verdict_thresholds_are_strict() {
        assert_eq!(CoverageVerdict::from_real_pct(80.0), CoverageVerdict::Good);
        assert_eq!(CoverageVerdict::from_real_pct(80.1), CoverageVerdict::Excellent);
        assert_eq!(CoverageVerdict::from_real_pct(50.0), CoverageVerdict::Poor);
    }

    #[test]
    fn coverage_counts_each_holding_once() {
        let coverage = PortfolioCoverage::from_holdings(vec![
            HoldingCoverage {
                ticker: "CBA.AX".into(),
                weight: 0.3,
                real_records: 200,
                synthetic_records: 50,
            },
            HoldingCoverage {
                ticker: "DHHF".into(),
                weight: 0.6,
                real_records: 250,
                synthetic_records: 0,
            },
            HoldingCoverage {
                ticker: "CASH".into(),
                weight: 0.1,
                real_records: 0,
                synthetic_records: 365,
            },
        ]);
        assert_eq!(coverage.holdings[0].ticker, "DHHF");
        assert!((coverage.real_pct - 90.0).abs() < 1e-9);
        assert!((coverage.synthetic_pct - 10.0).abs() < 1e-9);
        assert_eq!(coverage.verdict(), CoverageVerdict::Excellent);
    }
}
