//! End-to-end over the pure pipeline: synthetic benchmark and securities,
//! portfolio returns from weights × prices, then the risk report.

use chrono::NaiveDate;
use madash_core::data::{DataError, DataProvider, FetchResult, FetchWindow, RawBar};
use madash_core::domain::{DatedValue, PriceSource, SecurityId};
use madash_core::returns::{align_by_date, benchmark_return_rows, portfolio_returns};
use madash_core::risk::{RiskParams, RiskReport};
use madash_core::synthetic::{
    calendar_dates, default_anchor_price, default_beta_profile, security_history, BenchmarkModel,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

fn build_panel(
    tickers: &[(SecurityId, &str)],
    dates: &[NaiveDate],
    bench: &HashMap<NaiveDate, f64>,
) -> Vec<(SecurityId, NaiveDate, f64)> {
    let mut panel = Vec::new();
    for &(id, ticker) in tickers {
        let anchor_price = default_anchor_price(ticker);
        let history = security_history(
            anchor_price,
            dates,
            bench,
            default_beta_profile(ticker),
            42 + id.0 as u64,
        )
        .unwrap();
        panel.extend(history.into_iter().map(|p| (id, p.date, p.value)));
        panel.push((id, *dates.last().unwrap(), anchor_price));
    }
    panel
}

#[test]
fn synthetic_portfolio_produces_full_report() {
    let dates = calendar_dates(anchor(), 252);
    let bench = BenchmarkModel::default().generate(&dates).unwrap();
    let bench_by_date: HashMap<NaiveDate, f64> =
        bench.returns.iter().map(|r| (r.date, r.value)).collect();

    let holdings = [
        (SecurityId(1), "DHHF"),
        (SecurityId(2), "CBA.AX"),
        (SecurityId(3), "CASH"),
    ];
    let weights = [(SecurityId(1), 0.6), (SecurityId(2), 0.3), (SecurityId(3), 0.1)];
    let panel = build_panel(&holdings, &dates, &bench_by_date);

    let rows = portfolio_returns(&weights, &panel, 50_000.0);
    assert_eq!(rows.len(), 251);

    let portfolio: Vec<DatedValue> = rows
        .iter()
        .map(|r| DatedValue::new(r.date, r.daily_return))
        .collect();
    let bench_rows: Vec<DatedValue> = bench.returns.clone();
    let aligned = align_by_date(&portfolio, &bench_rows);
    assert_eq!(aligned.len(), 251);

    let daily: Vec<f64> = rows.iter().map(|r| r.daily_return).collect();
    let report = RiskReport::compute(
        &daily,
        Some((&aligned.left, &aligned.right)),
        &RiskParams::default(),
    );

    assert_eq!(report.observations, 251);
    assert!(report.var_99 >= report.var_95);
    assert!(report.annualized_volatility > 0.0);
    let relative = report.relative.expect("enough overlap for beta");
    // DHHF 0.8 × 0.6 + CBA 1.2 × 0.3 = 0.84 before idiosyncratic noise.
    let beta = relative.beta.unwrap();
    assert!(beta > 0.0 && beta < 2.0, "beta {beta}");
}

#[test]
fn synthetic_pipeline_is_reproducible() {
    let dates = calendar_dates(anchor(), 60);
    let run = || {
        let bench = BenchmarkModel::default().generate(&dates).unwrap();
        let by_date: HashMap<NaiveDate, f64> =
            bench.returns.iter().map(|r| (r.date, r.value)).collect();
        let panel = build_panel(&[(SecurityId(7), "STW")], &dates, &by_date);
        portfolio_returns(&[(SecurityId(7), 1.0)], &panel, 1.0)
    };
    assert_eq!(run(), run());
}

#[test]
fn short_overlap_omits_benchmark_statistics() {
    let returns = vec![0.01, -0.02, 0.005];
    let report = RiskReport::compute(&returns, Some((&returns, &returns)), &RiskParams::default());
    assert!(report.relative.is_none());
}

// ── Mock provider ────────────────────────────────────────────────────

struct MockProvider {
    closes: HashMap<String, Vec<(NaiveDate, f64)>>,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl DataProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bars: Vec<RawBar> = self
            .closes
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?
            .iter()
            .filter(|(d, _)| *d >= start && *d <= end)
            .map(|&(d, c)| RawBar::close_only(d, c))
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
        true
    }
}

#[tokio::test]
async fn incremental_fetch_continues_benchmark_returns() {
    let d = |day| NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
    let mut closes = HashMap::new();
    closes.insert(
        "^AXJO".to_string(),
        vec![(d(1), 100.0), (d(2), 101.0), (d(3), 99.0), (d(6), 102.0)],
    );
    let provider = MockProvider {
        closes,
        calls: AtomicUsize::new(0),
    };

    // First load: nothing on file.
    let window = FetchWindow::plan(None, d(1), d(3)).unwrap();
    let first = provider.fetch("^AXJO", window.start, window.end).await.unwrap();
    let first_rows = benchmark_return_rows(&first.closes(), None);
    assert_eq!(first_rows.len(), 2);

    // Update: watermark is the last stored date; the previous close links the series.
    let watermark = first.bars.last().map(|b| b.date);
    let prev_close = first.bars.last().map(|b| b.close);
    let window = FetchWindow::plan(watermark, d(1), d(6)).unwrap();
    assert_eq!(window.start, d(4));
    let update = provider.fetch("^AXJO", window.start, window.end).await.unwrap();
    let update_rows = benchmark_return_rows(&update.closes(), prev_close);
    assert_eq!(update_rows.len(), 1);
    assert_eq!(update_rows[0].date, d(6));
    assert!((update_rows[0].value - (102.0 - 99.0) / 99.0).abs() < 1e-12);

    // Up to date: no further request is planned.
    assert!(FetchWindow::plan(Some(d(6)), d(1), d(6)).is_none());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_symbol_is_reported() {
    let provider = MockProvider {
        closes: HashMap::new(),
        calls: AtomicUsize::new(0),
    };
    let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let err = provider.fetch("NOPE", d, d).await.unwrap_err();
    assert!(matches!(err, DataError::SymbolNotFound { .. }));
    assert!(!err.is_fatal());
}
