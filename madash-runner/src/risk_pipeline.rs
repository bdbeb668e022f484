//! Synthetic data and risk pipeline.
//!
//! One run: make sure the benchmark and every security have a price history
//! (generating synthetic series where no real data exists), derive the
//! portfolio's daily returns from its current holdings, store them with the
//! aligned benchmark returns, compute the risk report and store it.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::fmt;

use madash_core::domain::{
    Benchmark, BenchmarkId, DatedValue, PortfolioId, PriceObservation, PriceSource, Security,
    SecurityId,
};
use madash_core::returns::{portfolio_returns, PortfolioReturn};
use madash_core::risk::{RiskParams, RiskReport};
use madash_core::synthetic::{beta_profile, calendar_dates, security_history};

use crate::config::{ConfigError, DashboardConfig, SyntheticConfig};
use crate::format::{money, opt_f64, pct, rule, truncate};
use crate::job::JobError;
use crate::loader::PriceStore;
use crate::store::{HeldSecurity, PortfolioReturnRow, Store, StoreError};

/// What generation reads on top of the loader's price writes.
#[async_trait]
pub trait SyntheticStore: PriceStore {
    async fn securities(&self) -> Result<Vec<Security>, StoreError>;
    async fn require_benchmark(&self, code: &str) -> Result<Benchmark, StoreError>;
    async fn benchmark_returns_between(
        &self,
        benchmark: BenchmarkId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedValue>, StoreError>;
    async fn security_price_on(
        &self,
        security: SecurityId,
        date: NaiveDate,
    ) -> Result<Option<f64>, StoreError>;
    /// Returns true when the row was inserted.
    async fn insert_security_price_if_missing(
        &self,
        security: SecurityId,
        row: &PriceObservation,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl SyntheticStore for Store {
    async fn securities(&self) -> Result<Vec<Security>, StoreError> {
        Store::securities(self).await
    }

    async fn require_benchmark(&self, code: &str) -> Result<Benchmark, StoreError> {
        Store::require_benchmark(self, code).await
    }

    async fn benchmark_returns_between(
        &self,
        benchmark: BenchmarkId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedValue>, StoreError> {
        Store::benchmark_returns_between(self, benchmark, from, to).await
    }

    async fn security_price_on(
        &self,
        security: SecurityId,
        date: NaiveDate,
    ) -> Result<Option<f64>, StoreError> {
        Store::security_price_on(self, security, date).await
    }

    async fn insert_security_price_if_missing(
        &self,
        security: SecurityId,
        row: &PriceObservation,
    ) -> Result<bool, StoreError> {
        Store::insert_security_price_if_missing(self, security, row).await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RiskOptions {
    pub portfolio: PortfolioId,
    /// Length of the generated series, in calendar days ending `today`.
    pub days: usize,
    pub skip_generate: bool,
    pub today: NaiveDate,
}

/// What the generation phase wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationSummary {
    pub benchmark_code: String,
    /// False when the benchmark already had real data and was left alone.
    pub benchmark_generated: bool,
    pub benchmark_rows: u64,
    pub anchors_inserted: usize,
    pub securities_generated: usize,
    pub securities_with_real_data: usize,
    pub security_rows: u64,
}

#[derive(Debug, Clone)]
pub struct RiskRun {
    pub portfolio: PortfolioId,
    pub calculation_date: NaiveDate,
    pub method: String,
    pub benchmark_code: String,
    pub generation: Option<GenerationSummary>,
    pub holdings: Vec<HeldSecurity>,
    pub returns: Vec<PortfolioReturnRow>,
    pub report: RiskReport,
}

impl RiskRun {
    pub fn latest_value(&self) -> Option<f64> {
        self.returns.last().map(|r| r.portfolio_value)
    }
}

pub async fn run(
    store: &Store,
    config: &DashboardConfig,
    opts: RiskOptions,
) -> Result<RiskRun, JobError> {
    let generation = if opts.skip_generate {
        tracing::info!("skipping synthetic generation");
        None
    } else {
        Some(generate(store, &config.synthetic, opts.today, opts.days).await?)
    };

    let holdings = store.holdings_as_of(opts.portfolio, opts.today).await?;
    if holdings.is_empty() {
        return Err(JobError::NoHoldings {
            portfolio: opts.portfolio,
            as_of: opts.today,
        });
    }

    let from = opts.today - Duration::days(i64::from(config.risk.lookback_days));
    let ids: Vec<SecurityId> = holdings.iter().map(|h| h.security_id).collect();
    let weights: Vec<(SecurityId, f64)> =
        holdings.iter().map(|h| (h.security_id, h.weight)).collect();
    let prices = store.security_prices_between(&ids, from, opts.today).await?;
    tracing::debug!(holdings = holdings.len(), prices = prices.len(), %from, "loaded price panel");

    let daily = portfolio_returns(&weights, &prices, config.risk.initial_value);
    if daily.is_empty() {
        return Err(JobError::NoReturns(opts.portfolio));
    }

    let benchmark = store
        .require_benchmark(&config.synthetic.benchmark_code)
        .await?;
    let benchmark_returns = store
        .benchmark_returns_between(benchmark.id, from, opts.today)
        .await?;

    let rows = attach_benchmark(&daily, &benchmark_returns);
    let written = store.upsert_portfolio_returns(opts.portfolio, &rows).await?;
    tracing::info!(rows = written, "portfolio returns stored");

    let report = compute_report(&rows, &config.risk.params());
    store
        .upsert_risk_calculation(opts.portfolio, opts.today, &config.risk.method, &report)
        .await?;
    tracing::info!(
        portfolio = %opts.portfolio,
        observations = report.observations,
        beta = ?report.relative.and_then(|r| r.beta),
        "risk calculation stored"
    );

    Ok(RiskRun {
        portfolio: opts.portfolio,
        calculation_date: opts.today,
        method: config.risk.method.clone(),
        benchmark_code: benchmark.code,
        generation,
        holdings,
        returns: rows,
        report,
    })
}

/// Ensure benchmark, anchor prices and security histories exist.
///
/// Entities that already carry real data are not generated and get no anchor
/// row; the benchmark's stored returns still drive the securities that are.
pub async fn generate(
    store: &dyn SyntheticStore,
    config: &SyntheticConfig,
    today: NaiveDate,
    days: usize,
) -> Result<GenerationSummary, JobError> {
    if days < 2 {
        return Err(ConfigError::Invalid(format!("days must be at least 2, got {days}")).into());
    }
    let dates = calendar_dates(today, days);
    let first = dates.first().copied().unwrap_or(today);
    let mut summary = GenerationSummary {
        benchmark_code: config.benchmark_code.clone(),
        ..GenerationSummary::default()
    };

    // Benchmark
    let benchmark = store.require_benchmark(&config.benchmark_code).await?;
    let benchmark_returns: Vec<DatedValue> =
        if store.last_real_benchmark_close(benchmark.id).await?.is_some() {
            tracing::info!(benchmark = %benchmark.code, "benchmark has real data, not generating");
            store
                .benchmark_returns_between(benchmark.id, first, today)
                .await?
        } else {
            let series = config.benchmark.generate(&dates)?;
            let levels: Vec<PriceObservation> = series
                .levels
                .iter()
                .map(|l| PriceObservation::new(l.date, l.value, PriceSource::Synthetic))
                .collect();
            summary.benchmark_rows = store.upsert_benchmark_prices(benchmark.id, &levels).await?;
            store
                .upsert_benchmark_returns(benchmark.id, &series.returns)
                .await?;
            summary.benchmark_generated = true;
            tracing::info!(benchmark = %benchmark.code, rows = summary.benchmark_rows, "benchmark generated");
            series.returns
        };
    let by_date: HashMap<NaiveDate, f64> =
        benchmark_returns.iter().map(|r| (r.date, r.value)).collect();

    // Anchor prices and security histories
    let securities = store.securities().await?;
    for security in &securities {
        if store.last_real_security_date(security.id).await?.is_some() {
            summary.securities_with_real_data += 1;
            continue;
        }
        let default_anchor = config.anchor_price(&security.ticker);
        let anchor_row = PriceObservation::new(today, default_anchor, PriceSource::Synthetic);
        if store
            .insert_security_price_if_missing(security.id, &anchor_row)
            .await?
        {
            summary.anchors_inserted += 1;
            tracing::debug!(ticker = %security.ticker, price = default_anchor, "anchor price inserted");
        }
        let anchor = store
            .security_price_on(security.id, today)
            .await?
            .unwrap_or(default_anchor);
        let profile = beta_profile(&security.ticker, &config.profiles);
        let seed = config
            .security_seed
            .wrapping_add(u64::from(security.id.0.unsigned_abs()));
        let history = security_history(anchor, &dates, &by_date, profile, seed)?;
        let rows: Vec<PriceObservation> = history
            .iter()
            .map(|p| PriceObservation::new(p.date, p.value, PriceSource::Synthetic))
            .collect();
        summary.security_rows += store.upsert_security_prices(security.id, &rows).await?;
        summary.securities_generated += 1;
    }

    tracing::info!(
        securities = summary.securities_generated,
        skipped_real = summary.securities_with_real_data,
        rows = summary.security_rows,
        "security histories generated"
    );
    Ok(summary)
}

/// Pair each portfolio return with the benchmark return on the same date.
pub fn attach_benchmark(
    daily: &[PortfolioReturn],
    benchmark: &[DatedValue],
) -> Vec<PortfolioReturnRow> {
    let by_date: HashMap<NaiveDate, f64> = benchmark.iter().map(|b| (b.date, b.value)).collect();
    daily
        .iter()
        .map(|p| {
            let benchmark_return = by_date.get(&p.date).copied();
            PortfolioReturnRow {
                date: p.date,
                daily_return: p.daily_return,
                portfolio_value: p.portfolio_value,
                benchmark_return,
                active_return: benchmark_return.map(|b| p.daily_return - b),
            }
        })
        .collect()
}

/// Risk statistics over all rows; benchmark-relative ones over the rows that
/// have a benchmark return.
pub fn compute_report(rows: &[PortfolioReturnRow], params: &RiskParams) -> RiskReport {
    let daily: Vec<f64> = rows.iter().map(|r| r.daily_return).collect();
    let (left, right): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|r| r.benchmark_return.map(|b| (r.daily_return, b)))
        .unzip();
    RiskReport::compute(&daily, Some((&left, &right)), params)
}

impl fmt::Display for RiskRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(g) = &self.generation {
            writeln!(f, "Synthetic data")?;
            if g.benchmark_generated {
                writeln!(f, "  benchmark {}: {} rows generated", g.benchmark_code, g.benchmark_rows)?;
            } else {
                writeln!(f, "  benchmark {}: real data kept", g.benchmark_code)?;
            }
            writeln!(f, "  anchor prices inserted: {}", g.anchors_inserted)?;
            writeln!(
                f,
                "  securities generated: {} ({} rows), kept real: {}",
                g.securities_generated, g.security_rows, g.securities_with_real_data
            )?;
            writeln!(f)?;
        }

        writeln!(f, "Portfolio {} holdings", self.portfolio)?;
        writeln!(f, "{:<10} {:<32} {:>8}", "Ticker", "Name", "Weight")?;
        writeln!(f, "{}", rule(52))?;
        for h in &self.holdings {
            writeln!(
                f,
                "{:<10} {:<32} {:>8}",
                truncate(&h.ticker, 10),
                truncate(&h.name, 32),
                pct(h.weight, 1)
            )?;
        }
        writeln!(f)?;

        let r = &self.report;
        let value = self.latest_value().unwrap_or(0.0);
        let first = self.returns.first().map(|r| r.date);
        let last = self.returns.last().map(|r| r.date);
        writeln!(
            f,
            "Risk ({}, {}) as of {}",
            self.method, self.benchmark_code, self.calculation_date
        )?;
        if let (Some(first), Some(last)) = (first, last) {
            writeln!(f, "  returns {first} to {last}, {} observations", r.observations)?;
        }
        writeln!(f, "{}", rule(44))?;
        writeln!(f, "{:<26} {:>8} {:>9}", "1-day VaR 95%", pct(r.var_95, 2), money(r.var_95 * value))?;
        writeln!(f, "{:<26} {:>8} {:>9}", "1-day VaR 99%", pct(r.var_99, 2), money(r.var_99 * value))?;
        writeln!(f, "{:<26} {:>8}", "Daily volatility", pct(r.daily_volatility, 2))?;
        writeln!(f, "{:<26} {:>8}", "Annualized volatility", pct(r.annualized_volatility, 2))?;
        writeln!(f, "{:<26} {:>8}", "Annualized return", pct(r.annualized_return, 2))?;
        writeln!(f, "{:<26} {:>8.3}", "Sharpe ratio", r.sharpe_ratio)?;
        writeln!(f, "{:<26} {:>8}", "Max drawdown", pct(r.max_drawdown, 2))?;
        match &r.relative {
            Some(rel) => {
                writeln!(f, "{:<26} {:>8}", "Beta", opt_f64(rel.beta, 3))?;
                writeln!(f, "{:<26} {:>8}", "Correlation", opt_f64(rel.correlation, 3))?;
                writeln!(f, "{:<26} {:>8}", "Tracking error", pct(rel.tracking_error, 2))?;
                writeln!(f, "{:<26} {:>8}", "Aligned observations", rel.overlap)?;
            }
            None => writeln!(f, "Benchmark statistics: insufficient overlap")?,
        }
        writeln!(f, "{:<26} {:>18}", "Portfolio value", money(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn daily(values: &[(u32, f64)]) -> Vec<PortfolioReturn> {
        let mut value = 100.0;
        values
            .iter()
            .map(|&(day, r)| {
                value *= 1.0 + r;
                PortfolioReturn {
                    date: d(day),
                    daily_return: r,
                    portfolio_value: value,
                }
            })
            .collect()
    }

    #[test]
    fn benchmark_attached_by_date() {
        let p = daily(&[(1, 0.01), (2, -0.02), (3, 0.005)]);
        let b = vec![DatedValue::new(d(1), 0.008), DatedValue::new(d(3), 0.002)];
        let rows = attach_benchmark(&p, &b);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].benchmark_return, Some(0.008));
        assert!((rows[0].active_return.unwrap() - 0.002).abs() < 1e-12);
        assert_eq!(rows[1].benchmark_return, None);
        assert_eq!(rows[1].active_return, None);
        assert!((rows[2].active_return.unwrap() - 0.003).abs() < 1e-12);
    }

    #[test]
    fn report_uses_only_aligned_rows_for_beta() {
        let returns: Vec<(u32, f64)> = (1..=31)
            .map(|day| (day, if day % 2 == 0 { 0.01 } else { -0.008 }))
            .collect();
        let p = daily(&returns);
        // Benchmark on every date but the last, moving half as much.
        let b: Vec<DatedValue> = returns[..30]
            .iter()
            .map(|&(day, r)| DatedValue::new(d(day), r / 2.0))
            .collect();
        let rows = attach_benchmark(&p, &b);
        let report = compute_report(&rows, &RiskParams::default());

        assert_eq!(report.observations, 31);
        let rel = report.relative.expect("30 aligned rows meet the default overlap");
        assert_eq!(rel.overlap, 30);
        assert!((rel.beta.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn report_without_benchmark_has_no_relative_section() {
        let p = daily(&[(1, 0.01), (2, -0.01)]);
        let report = compute_report(&attach_benchmark(&p, &[]), &RiskParams::default());
        assert!(report.relative.is_none());
        assert_eq!(report.observations, 2);
    }
}
