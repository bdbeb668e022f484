//! Yahoo Finance data provider.
//!
//! Fetches daily bars from Yahoo's v8 chart API with retries, exponential
//! backoff and the shared circuit breaker. Yahoo has no official API and its
//! response format can change without notice; parsing failures surface as
//! [`DataError::ResponseFormatChanged`].

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider, FetchResult, RawBar};
use crate::domain::PriceSource;
use async_trait::async_trait;
use chrono::{Duration as Days, FixedOffset, NaiveDate, NaiveTime};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    /// Exchange offset from UTC in seconds, e.g. 39600 for the ASX in AEDT.
    #[serde(default)]
    gmtoffset: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

pub struct YahooProvider {
    client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Chart URL covering `start..=end` in exchange-local dates.
    ///
    /// Bars are stamped at the exchange open, which falls on the previous UTC
    /// day for exchanges east of UTC, so period1 starts a day early and the
    /// parser trims back to the window.
    pub fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = (start - Days::days(1))
            .and_time(NaiveTime::default())
            .and_utc()
            .timestamp();
        let end_ts = (end + Days::days(1))
            .and_time(NaiveTime::default())
            .and_utc()
            .timestamp();
        format!(
            "{}/{symbol}?period1={start_ts}&period2={end_ts}&interval=1d&includeAdjustedClose=true",
            self.base_url
        )
    }

    pub(crate) fn parse_response(
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        resp: ChartResponse,
    ) -> Result<Vec<RawBar>, DataError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            },
            Some(err) => {
                DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => DataError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        let no_data = || DataError::NoData {
            symbol: symbol.to_string(),
            start,
            end,
        };

        // Yahoo omits timestamps entirely for ranges with no trading days.
        let timestamps = data.timestamp.ok_or_else(no_data)?;

        let offset_secs = data.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
        let offset = FixedOffset::east_opt(offset_secs).ok_or_else(|| {
            DataError::ResponseFormatChanged(format!("invalid gmtoffset: {offset_secs}"))
        })?;

        let quote = data.indicators.quote.into_iter().next().unwrap_or_default();
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.with_timezone(&offset).date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Holidays come back as all-null rows; a bar without a close is unusable.
            let Some(close) = close.filter(|c| c.is_finite()) else {
                if open.is_some() || high.is_some() || low.is_some() || volume.is_some() {
                    tracing::debug!(symbol, %date, "dropping bar without close");
                }
                continue;
            };
            if date < start || date > end {
                continue;
            }

            bars.push(RawBar {
                date,
                open,
                high,
                low,
                close,
                adj_close: adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten()),
                volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);

        if bars.is_empty() {
            return Err(no_data());
        }
        Ok(bars)
    }

    async fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawBar>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                tracing::debug!(symbol, attempt, ?delay, "retrying");
                tokio::time::sleep(delay).await;
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let chart: ChartResponse = resp.json().await.map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;

            self.circuit_breaker.record_success();
            return Self::parse_response(symbol, start, end, chart);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

#[async_trait]
impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        let bars = self.fetch_with_retry(symbol, start, end).await?;
        tracing::debug!(symbol, bars = bars.len(), "fetched");
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: PriceSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
