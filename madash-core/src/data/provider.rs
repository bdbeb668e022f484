//! Market-data provider trait and structured error types.
//!
//! The loader only talks to [`DataProvider`], so tests run against an
//! in-memory provider and never touch the network.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PriceSource;

/// One daily bar as returned by a provider, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: Option<u64>,
}

impl RawBar {
    /// A bar carrying only a close, as the loader stores it.
    pub fn close_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close,
            adj_close: None,
            volume: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no data for {symbol} between {start} and {end}")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("provider has blocked requests (circuit breaker open)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Errors after which no further symbol should be attempted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CircuitBreakerTripped)
    }
}

/// Bars fetched for one symbol, sorted by date.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    pub source: PriceSource,
}

impl FetchResult {
    pub fn closes(&self) -> Vec<(NaiveDate, f64)> {
        self.bars.iter().map(|b| (b.date, b.close)).collect()
    }
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Daily bars for `symbol` over `start..=end`.
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// False while the provider is refusing requests.
    fn is_available(&self) -> bool;
}
