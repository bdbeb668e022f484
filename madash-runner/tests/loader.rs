//! Loader behaviour against an in-memory store and a scripted provider.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use madash_core::data::{DataError, DataProvider, FetchResult, RawBar};
use madash_core::domain::{BenchmarkId, DatedValue, PriceObservation, PriceSource, SecurityId};
use madash_runner::config::{BenchmarkMapping, LoaderConfig, SecurityMapping};
use madash_runner::{LoadMode, LoadOutcome, Loader, PriceStore, StoreError};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
}

// ── In-memory store ──────────────────────────────────────────────────

#[derive(Default)]
struct MemoryStore {
    securities: HashMap<String, SecurityId>,
    benchmarks: HashMap<String, BenchmarkId>,
    security_prices: Mutex<BTreeMap<(i32, NaiveDate), PriceObservation>>,
    benchmark_prices: Mutex<BTreeMap<(i32, NaiveDate), PriceObservation>>,
    benchmark_returns: Mutex<BTreeMap<(i32, NaiveDate), f64>>,
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn security_id(&self, ticker: &str) -> Result<Option<SecurityId>, StoreError> {
        Ok(self.securities.get(ticker).copied())
    }

    async fn benchmark_id(&self, code: &str) -> Result<Option<BenchmarkId>, StoreError> {
        Ok(self.benchmarks.get(code).copied())
    }

    async fn last_real_security_date(
        &self,
        security: SecurityId,
    ) -> Result<Option<NaiveDate>, StoreError> {
        Ok(self
            .security_prices
            .lock()
            .unwrap()
            .iter()
            .filter(|((id, _), p)| *id == security.0 && p.source.is_real())
            .map(|((_, date), _)| *date)
            .max())
    }

    async fn last_real_benchmark_close(
        &self,
        benchmark: BenchmarkId,
    ) -> Result<Option<(NaiveDate, f64)>, StoreError> {
        Ok(self
            .benchmark_prices
            .lock()
            .unwrap()
            .iter()
            .filter(|((id, _), p)| *id == benchmark.0 && p.source.is_real())
            .map(|((_, date), p)| (*date, p.close))
            .max_by_key(|(date, _)| *date))
    }

    async fn upsert_security_prices(
        &self,
        security: SecurityId,
        rows: &[PriceObservation],
    ) -> Result<u64, StoreError> {
        let mut prices = self.security_prices.lock().unwrap();
        for r in rows {
            prices.insert((security.0, r.date), r.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn upsert_benchmark_prices(
        &self,
        benchmark: BenchmarkId,
        rows: &[PriceObservation],
    ) -> Result<u64, StoreError> {
        let mut prices = self.benchmark_prices.lock().unwrap();
        for r in rows {
            prices.insert((benchmark.0, r.date), r.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn upsert_benchmark_returns(
        &self,
        benchmark: BenchmarkId,
        rows: &[DatedValue],
    ) -> Result<u64, StoreError> {
        let mut returns = self.benchmark_returns.lock().unwrap();
        for r in rows {
            returns.insert((benchmark.0, r.date), r.value);
        }
        Ok(rows.len() as u64)
    }
}

// ── Scripted provider ────────────────────────────────────────────────

struct ScriptedProvider {
    closes: HashMap<String, Vec<(NaiveDate, f64)>>,
    /// Symbol whose request trips the breaker.
    trips_on: Option<String>,
    tripped: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(closes: Vec<(&str, Vec<(NaiveDate, f64)>)>) -> Self {
        Self {
            closes: closes
                .into_iter()
                .map(|(s, c)| (s.to_string(), c))
                .collect(),
            trips_on: None,
            tripped: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.trips_on.as_deref() == Some(symbol) {
            self.tripped.store(true, Ordering::SeqCst);
            return Err(DataError::CircuitBreakerTripped);
        }
        let closes = self
            .closes
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;
        let bars: Vec<RawBar> = closes
            .iter()
            .filter(|(date, _)| *date >= start && *date <= end)
            .map(|&(date, close)| RawBar::close_only(date, close))
            .collect();
        if bars.is_empty() {
            return Err(DataError::NoData {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: PriceSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        !self.tripped.load(Ordering::SeqCst)
    }
}

fn config() -> LoaderConfig {
    let mut securities = BTreeMap::new();
    securities.insert(
        "CBA.AX".to_string(),
        SecurityMapping {
            ticker: "CBA.AX".into(),
            name: "Commonwealth Bank".into(),
        },
    );
    securities.insert(
        "STW.AX".to_string(),
        SecurityMapping {
            ticker: "STW".into(),
            name: "SPDR ASX 200".into(),
        },
    );
    let mut benchmarks = BTreeMap::new();
    benchmarks.insert(
        "^AXJO".to_string(),
        BenchmarkMapping {
            code: "ASX200".into(),
            name: "ASX 200".into(),
        },
    );
    LoaderConfig {
        start_date: d(1),
        request_delay_ms: 0,
        max_retries: 0,
        securities,
        benchmarks,
    }
}

fn store() -> MemoryStore {
    MemoryStore {
        securities: [("CBA.AX".to_string(), SecurityId(1)), ("STW".to_string(), SecurityId(2))]
            .into_iter()
            .collect(),
        benchmarks: [("ASX200".to_string(), BenchmarkId(1))].into_iter().collect(),
        ..MemoryStore::default()
    }
}

fn cba() -> Vec<(NaiveDate, f64)> {
    vec![(d(1), 120.0), (d(2), 121.0), (d(3), 119.5), (d(6), 122.0)]
}

fn axjo() -> Vec<(NaiveDate, f64)> {
    vec![(d(1), 7800.0), (d(2), 7850.0), (d(3), 7820.0), (d(6), 7900.0)]
}

fn stw() -> Vec<(NaiveDate, f64)> {
    vec![(d(1), 70.0), (d(2), 70.5)]
}

fn all_symbols() -> ScriptedProvider {
    ScriptedProvider::new(vec![("CBA.AX", cba()), ("^AXJO", axjo()), ("STW.AX", stw())])
}

#[tokio::test]
async fn backfill_loads_every_mapped_symbol() {
    let provider = all_symbols();
    let store = store();
    let config = config();

    let summary = Loader::new(&store, &provider, &config)
        .run(LoadMode::Backfill, d(6))
        .await
        .unwrap();

    assert_eq!(summary.loaded(), 3);
    assert!(summary.all_succeeded());
    assert_eq!(summary.rows_written(), 4 + 2 + 4);

    let prices = store.security_prices.lock().unwrap();
    assert!(prices.values().all(|p| p.source == PriceSource::YahooFinance));
    // Four closes give three returns when nothing precedes them.
    assert_eq!(store.benchmark_returns.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn update_fetches_from_the_watermark() {
    let provider = all_symbols();
    let store = store();
    let config = config();
    let loader = Loader::new(&store, &provider, &config);

    loader.run(LoadMode::Update, d(3)).await.unwrap();
    let summary = loader.run(LoadMode::Update, d(6)).await.unwrap();

    let windows: Vec<_> = summary
        .symbols
        .iter()
        .map(|s| (s.symbol.as_str(), s.outcome.clone()))
        .collect();
    for (symbol, outcome) in &windows {
        match (*symbol, outcome) {
            ("CBA.AX" | "^AXJO", LoadOutcome::Loaded { window, prices, .. }) => {
                assert_eq!(window.start, d(4));
                assert_eq!(*prices, 1);
            }
            // No STW closes after the 3rd: nothing new is not a failure.
            ("STW.AX", LoadOutcome::UpToDate) => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    // The update's first benchmark return links to the last stored close.
    let returns = store.benchmark_returns.lock().unwrap();
    let linked = returns[&(1, d(6))];
    assert!((linked - (7900.0 - 7820.0) / 7820.0).abs() < 1e-12);
    assert_eq!(returns.len(), 3);
}

#[tokio::test]
async fn up_to_date_symbols_make_no_request() {
    let provider = all_symbols();
    let store = store();
    let config = config();
    let loader = Loader::new(&store, &provider, &config);

    loader.run(LoadMode::Update, d(6)).await.unwrap();
    let calls = provider.calls.load(Ordering::SeqCst);

    let summary = loader.run(LoadMode::Update, d(6)).await.unwrap();
    // STW's watermark is the 2nd, so only it is requested again.
    assert_eq!(provider.calls.load(Ordering::SeqCst), calls + 1);
    assert_eq!(summary.up_to_date(), 3);
}

#[tokio::test]
async fn unknown_entities_and_failures_do_not_stop_the_run() {
    // CBA.AX has no data at the provider; STW is missing from the store.
    let provider = ScriptedProvider::new(vec![("^AXJO", axjo()), ("CBA.AX", Vec::new())]);
    let mut store = store();
    store.securities.remove("STW");
    let mut config = config();
    config.securities.insert(
        "NOPE.AX".to_string(),
        SecurityMapping {
            ticker: "NOPE.AX".into(),
            name: "Missing".into(),
        },
    );
    store.securities.insert("NOPE.AX".into(), SecurityId(9));

    let summary = Loader::new(&store, &provider, &config)
        .run(LoadMode::Backfill, d(6))
        .await
        .unwrap();

    let outcome = |sym: &str| {
        summary
            .symbols
            .iter()
            .find(|s| s.symbol == sym)
            .map(|s| s.outcome.clone())
            .unwrap()
    };
    assert_eq!(outcome("STW.AX"), LoadOutcome::Unknown);
    assert_eq!(outcome("CBA.AX"), LoadOutcome::UpToDate);
    assert!(matches!(outcome("NOPE.AX"), LoadOutcome::Failed(_)));
    assert!(matches!(outcome("^AXJO"), LoadOutcome::Loaded { .. }));
    assert_eq!(summary.failed(), 1);
}

#[tokio::test]
async fn tripped_breaker_skips_the_remaining_symbols() {
    let mut provider = all_symbols();
    // Securities load in symbol order (CBA.AX, STW.AX), then benchmarks.
    provider.trips_on = Some("CBA.AX".into());
    let store = store();
    let config = config();

    let summary = Loader::new(&store, &provider, &config)
        .run(LoadMode::Backfill, d(6))
        .await
        .unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(matches!(summary.symbols[0].outcome, LoadOutcome::Failed(_)));
    assert_eq!(summary.symbols[1].outcome, LoadOutcome::Skipped);
    assert_eq!(summary.symbols[2].outcome, LoadOutcome::Skipped);
    assert_eq!(summary.failed(), 3);
    assert!(store.security_prices.lock().unwrap().is_empty());
}

#[tokio::test]
async fn summary_renders_a_row_per_symbol() {
    let provider = all_symbols();
    let store = store();
    let config = config();

    let summary = Loader::new(&store, &provider, &config)
        .run(LoadMode::Backfill, d(6))
        .await
        .unwrap();
    let text = summary.to_string();

    assert!(text.starts_with("Market data backfill (2024-05-06)"));
    assert!(text.contains("2024-05-01 to 2024-05-06"));
    assert!(text.contains("3 loaded, 0 up to date, 0 failed, 10 price rows written"));
}
