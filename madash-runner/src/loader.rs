//! Market-data loader: fetch daily closes from a provider and upsert them.
//!
//! Two modes share one loop. `Backfill` requests everything from the
//! configured start date; `Update` requests from the day after each entity's
//! real-data watermark. A failure for one symbol is recorded and the loop moves
//! on; a fatal provider error (circuit breaker open) skips every remaining
//! symbol. Store errors abort the whole run.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;
use std::time::Duration;

use madash_core::data::{DataError, DataProvider, FetchWindow};
use madash_core::domain::{BenchmarkId, DatedValue, EntityKind, PriceObservation, SecurityId};
use madash_core::returns::benchmark_return_rows;

use crate::config::LoaderConfig;
use crate::format::{rule, truncate};
use crate::store::{RealDataSummary, Store, StoreError};

/// The slice of the store the loader writes through.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn security_id(&self, ticker: &str) -> Result<Option<SecurityId>, StoreError>;
    async fn benchmark_id(&self, code: &str) -> Result<Option<BenchmarkId>, StoreError>;
    async fn last_real_security_date(
        &self,
        security: SecurityId,
    ) -> Result<Option<NaiveDate>, StoreError>;
    async fn last_real_benchmark_close(
        &self,
        benchmark: BenchmarkId,
    ) -> Result<Option<(NaiveDate, f64)>, StoreError>;
    async fn upsert_security_prices(
        &self,
        security: SecurityId,
        rows: &[PriceObservation],
    ) -> Result<u64, StoreError>;
    async fn upsert_benchmark_prices(
        &self,
        benchmark: BenchmarkId,
        rows: &[PriceObservation],
    ) -> Result<u64, StoreError>;
    async fn upsert_benchmark_returns(
        &self,
        benchmark: BenchmarkId,
        rows: &[DatedValue],
    ) -> Result<u64, StoreError>;
}

#[async_trait]
impl PriceStore for Store {
    async fn security_id(&self, ticker: &str) -> Result<Option<SecurityId>, StoreError> {
        Ok(self.security_by_ticker(ticker).await?.map(|s| s.id))
    }

    async fn benchmark_id(&self, code: &str) -> Result<Option<BenchmarkId>, StoreError> {
        Ok(self.benchmark_by_code(code).await?.map(|b| b.id))
    }

    async fn last_real_security_date(
        &self,
        security: SecurityId,
    ) -> Result<Option<NaiveDate>, StoreError> {
        Store::last_real_security_date(self, security).await
    }

    async fn last_real_benchmark_close(
        &self,
        benchmark: BenchmarkId,
    ) -> Result<Option<(NaiveDate, f64)>, StoreError> {
        Store::last_real_benchmark_close(self, benchmark).await
    }

    async fn upsert_security_prices(
        &self,
        security: SecurityId,
        rows: &[PriceObservation],
    ) -> Result<u64, StoreError> {
        Store::upsert_security_prices(self, security, rows).await
    }

    async fn upsert_benchmark_prices(
        &self,
        benchmark: BenchmarkId,
        rows: &[PriceObservation],
    ) -> Result<u64, StoreError> {
        Store::upsert_benchmark_prices(self, benchmark, rows).await
    }

    async fn upsert_benchmark_returns(
        &self,
        benchmark: BenchmarkId,
        rows: &[DatedValue],
    ) -> Result<u64, StoreError> {
        Store::upsert_benchmark_returns(self, benchmark, rows).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    Backfill,
    Update,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMode::Backfill => write!(f, "backfill"),
            LoadMode::Update => write!(f, "update"),
        }
    }
}

/// What happened to one configured symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded {
        window: FetchWindow,
        prices: u64,
        returns: u64,
    },
    UpToDate,
    /// Configured, but no matching row in the reference tables.
    Unknown,
    Failed(String),
    /// Not attempted because the provider stopped accepting requests.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolLoad {
    pub symbol: String,
    pub identifier: String,
    pub kind: EntityKind,
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone)]
pub struct LoadSummary {
    pub mode: LoadMode,
    pub today: NaiveDate,
    pub symbols: Vec<SymbolLoad>,
}

impl LoadSummary {
    fn count(&self, pred: impl Fn(&LoadOutcome) -> bool) -> usize {
        self.symbols.iter().filter(|s| pred(&s.outcome)).count()
    }

    pub fn loaded(&self) -> usize {
        self.count(|o| matches!(o, LoadOutcome::Loaded { .. }))
    }

    pub fn up_to_date(&self) -> usize {
        self.count(|o| matches!(o, LoadOutcome::UpToDate))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LoadOutcome::Failed(_) | LoadOutcome::Skipped))
    }

    pub fn rows_written(&self) -> u64 {
        self.symbols
            .iter()
            .map(|s| match s.outcome {
                LoadOutcome::Loaded { prices, .. } => prices,
                _ => 0,
            })
            .sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Market data {} ({})", self.mode, self.today)?;
        writeln!(
            f,
            "{:<10} {:<10} {:<10} {:<26} {:>7} {:>7}",
            "Symbol", "Entity", "Kind", "Window / status", "Prices", "Returns"
        )?;
        writeln!(f, "{}", rule(75))?;
        for s in &self.symbols {
            let (status, prices, returns) = match &s.outcome {
                LoadOutcome::Loaded {
                    window,
                    prices,
                    returns,
                } => (window.to_string(), prices.to_string(), returns.to_string()),
                LoadOutcome::UpToDate => ("up to date".to_string(), "-".into(), "-".into()),
                LoadOutcome::Unknown => ("not in database".to_string(), "-".into(), "-".into()),
                LoadOutcome::Failed(e) => (format!("failed: {e}"), "-".into(), "-".into()),
                LoadOutcome::Skipped => ("skipped".to_string(), "-".into(), "-".into()),
            };
            writeln!(
                f,
                "{:<10} {:<10} {:<10} {:<26} {:>7} {:>7}",
                truncate(&s.symbol, 10),
                truncate(&s.identifier, 10),
                s.kind.as_tag(),
                truncate(&status, 26),
                prices,
                returns
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{} loaded, {} up to date, {} failed, {} price rows written",
            self.loaded(),
            self.up_to_date(),
            self.failed(),
            self.rows_written()
        )
    }
}

pub struct Loader<'a> {
    store: &'a dyn PriceStore,
    provider: &'a dyn DataProvider,
    config: &'a LoaderConfig,
}

enum Target {
    Security(SecurityId),
    Benchmark(BenchmarkId),
}

struct Attempt {
    outcome: LoadOutcome,
    /// The provider was called.
    requested: bool,
    /// No further symbol should be attempted.
    fatal: bool,
}

impl Attempt {
    fn local(outcome: LoadOutcome) -> Self {
        Self {
            outcome,
            requested: false,
            fatal: false,
        }
    }

    fn requested(outcome: LoadOutcome) -> Self {
        Self {
            outcome,
            requested: true,
            fatal: false,
        }
    }
}

impl<'a> Loader<'a> {
    pub fn new(
        store: &'a dyn PriceStore,
        provider: &'a dyn DataProvider,
        config: &'a LoaderConfig,
    ) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub async fn run(&self, mode: LoadMode, today: NaiveDate) -> Result<LoadSummary, StoreError> {
        let entries: Vec<(&str, &str, EntityKind)> = self
            .config
            .securities
            .iter()
            .map(|(sym, m)| (sym.as_str(), m.ticker.as_str(), EntityKind::Security))
            .chain(
                self.config
                    .benchmarks
                    .iter()
                    .map(|(sym, m)| (sym.as_str(), m.code.as_str(), EntityKind::Benchmark)),
            )
            .collect();

        tracing::info!(
            %mode,
            provider = self.provider.name(),
            symbols = entries.len(),
            "starting market data load"
        );

        let delay = Duration::from_millis(self.config.request_delay_ms);
        let mut symbols = Vec::with_capacity(entries.len());
        let mut requested = false;
        let mut halted = false;

        for (symbol, identifier, kind) in entries {
            let outcome = if halted || !self.provider.is_available() {
                LoadOutcome::Skipped
            } else {
                if requested && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let attempt = self.load_one(mode, today, symbol, identifier, kind).await?;
                requested = attempt.requested;
                halted = attempt.fatal;
                attempt.outcome
            };

            match &outcome {
                LoadOutcome::Loaded { window, prices, .. } => {
                    tracing::info!(symbol, %window, rows = prices, "loaded")
                }
                LoadOutcome::UpToDate => tracing::info!(symbol, "up to date"),
                LoadOutcome::Unknown => {
                    tracing::warn!(symbol, identifier, kind = kind.as_tag(), "not in database, skipping")
                }
                LoadOutcome::Failed(error) => tracing::warn!(symbol, %error, "load failed"),
                LoadOutcome::Skipped => {
                    tracing::warn!(symbol, "provider unavailable, skipping")
                }
            }

            symbols.push(SymbolLoad {
                symbol: symbol.to_string(),
                identifier: identifier.to_string(),
                kind,
                outcome,
            });
        }

        let summary = LoadSummary {
            mode,
            today,
            symbols,
        };
        tracing::info!(
            loaded = summary.loaded(),
            up_to_date = summary.up_to_date(),
            failed = summary.failed(),
            "market data load finished"
        );
        Ok(summary)
    }

    async fn load_one(
        &self,
        mode: LoadMode,
        today: NaiveDate,
        symbol: &str,
        identifier: &str,
        kind: EntityKind,
    ) -> Result<Attempt, StoreError> {
        let (target, watermark, prev_close) = match kind {
            EntityKind::Security => {
                let Some(id) = self.store.security_id(identifier).await? else {
                    return Ok(Attempt::local(LoadOutcome::Unknown));
                };
                let last = self.store.last_real_security_date(id).await?;
                (Target::Security(id), last, None)
            }
            EntityKind::Benchmark => {
                let Some(id) = self.store.benchmark_id(identifier).await? else {
                    return Ok(Attempt::local(LoadOutcome::Unknown));
                };
                let last = self.store.last_real_benchmark_close(id).await?;
                (
                    Target::Benchmark(id),
                    last.map(|(d, _)| d),
                    last.map(|(_, c)| c),
                )
            }
        };

        let window = match mode {
            LoadMode::Backfill => FetchWindow::plan(None, self.config.start_date, today),
            LoadMode::Update => FetchWindow::plan(watermark, self.config.start_date, today),
        };
        let Some(window) = window else {
            return Ok(Attempt::local(LoadOutcome::UpToDate));
        };

        tracing::debug!(symbol, %window, days = window.days(), ?watermark, "fetching");
        let fetched = match self.provider.fetch(symbol, window.start, window.end).await {
            Ok(result) => result,
            Err(DataError::NoData { .. }) => return Ok(Attempt::requested(LoadOutcome::UpToDate)),
            Err(e) => {
                return Ok(Attempt {
                    fatal: e.is_fatal(),
                    ..Attempt::requested(LoadOutcome::Failed(e.to_string()))
                })
            }
        };

        let closes = fetched.closes();
        let rows: Vec<PriceObservation> = closes
            .iter()
            .map(|&(date, close)| PriceObservation::new(date, close, fetched.source))
            .collect();

        let (prices, returns) = match target {
            Target::Security(id) => (self.store.upsert_security_prices(id, &rows).await?, 0),
            Target::Benchmark(id) => {
                // A backfill restarts the series, so the first day has no return.
                let prev = match mode {
                    LoadMode::Backfill => None,
                    LoadMode::Update => prev_close,
                };
                let return_rows = benchmark_return_rows(&closes, prev);
                let prices = self.store.upsert_benchmark_prices(id, &rows).await?;
                let returns = self.store.upsert_benchmark_returns(id, &return_rows).await?;
                (prices, returns)
            }
        };

        Ok(Attempt::requested(LoadOutcome::Loaded {
            window,
            prices,
            returns,
        }))
    }
}

/// Real-data coverage per entity, as printed by `load summary`.
#[derive(Debug, Clone, Default)]
pub struct RealDataReport {
    pub securities: Vec<RealDataSummary>,
    pub benchmarks: Vec<RealDataSummary>,
}

impl RealDataReport {
    pub async fn collect(store: &Store) -> Result<Self, StoreError> {
        Ok(Self {
            securities: store.real_data_summary(EntityKind::Security).await?,
            benchmarks: store.real_data_summary(EntityKind::Benchmark).await?,
        })
    }
}

fn write_real_data(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    header: &str,
    rows: &[RealDataSummary],
) -> fmt::Result {
    writeln!(f, "{title}")?;
    writeln!(
        f,
        "{:<12} {:<12} {:<12} {:>8}",
        header, "First", "Last", "Records"
    )?;
    writeln!(f, "{}", rule(47))?;
    if rows.is_empty() {
        writeln!(f, "(no real data loaded)")?;
    }
    for r in rows {
        writeln!(
            f,
            "{:<12} {:<12} {:<12} {:>8}",
            truncate(&r.identifier, 12),
            r.first_date,
            r.last_date,
            r.records
        )?;
    }
    Ok(())
}

impl fmt::Display for RealDataReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_real_data(f, "Securities (real data)", "Ticker", &self.securities)?;
        writeln!(f)?;
        write_real_data(f, "Benchmarks (real data)", "Code", &self.benchmarks)
    }
}
