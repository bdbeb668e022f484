//! Price observations and their provenance tag.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tag written to `data_source` for rows fetched from Yahoo Finance.
pub const REAL_SOURCE_TAG: &str = "yfinance";

/// Tag written to `data_source` for generated rows.
pub const SYNTHETIC_SOURCE_TAG: &str = "synthetic";

/// Where a stored price came from.
///
/// Anything that is not tagged `yfinance` (including a NULL tag left by older
/// writers) counts as synthetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceSource {
    YahooFinance,
    Synthetic,
}

impl PriceSource {
    pub fn as_tag(&self) -> &'static str {
        match self {
            PriceSource::YahooFinance => REAL_SOURCE_TAG,
            PriceSource::Synthetic => SYNTHETIC_SOURCE_TAG,
        }
    }

    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some(REAL_SOURCE_TAG) => PriceSource::YahooFinance,
            _ => PriceSource::Synthetic,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, PriceSource::YahooFinance)
    }
}

/// One close price for one entity on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub close: f64,
    pub source: PriceSource,
}

impl PriceObservation {
    pub fn new(date: NaiveDate, close: f64, source: PriceSource) -> Self {
        Self { date, close, source }
    }
}

/// A dated scalar (a return, a level, a benchmark return).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

impl DatedValue {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}
