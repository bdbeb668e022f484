//! Data-quality jobs: rebuild the status table, and report data provenance.

use chrono::NaiveDate;
use std::fmt;

use madash_core::domain::{EntityKind, PortfolioId};
use madash_core::quality::{PortfolioCoverage, QualityRating};

use crate::format::{or_na, pct, rule, truncate};
use crate::store::{QualityStatusRow, SourceBreakdown, Store, StoreError};

/// Result of `quality populate`: every status row just written.
#[derive(Debug, Clone)]
pub struct PopulateReport {
    pub rows: Vec<QualityStatusRow>,
}

/// Rollup of status rows for one entity kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindSummary {
    pub kind: EntityKind,
    pub entities: usize,
    pub with_real_data: usize,
    pub average_score: f64,
}

impl PopulateReport {
    pub async fn run(store: &Store) -> Result<Self, StoreError> {
        let rows = store.rebuild_quality_status().await?;
        tracing::info!(entities = rows.len(), "data quality status rebuilt");
        Ok(Self { rows })
    }

    pub fn summary(&self, kind: EntityKind) -> KindSummary {
        let of_kind: Vec<&QualityStatusRow> =
            self.rows.iter().filter(|r| r.entity_kind == kind).collect();
        let entities = of_kind.len();
        let average_score = if entities == 0 {
            0.0
        } else {
            of_kind.iter().map(|r| r.score).sum::<f64>() / entities as f64
        };
        KindSummary {
            kind,
            entities,
            with_real_data: of_kind.iter().filter(|r| r.stats.has_real_data()).count(),
            average_score,
        }
    }
}

impl fmt::Display for PopulateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.rows {
            let mark = if r.stats.has_real_data() { "+" } else { "-" };
            writeln!(
                f,
                "{mark} {:<10} {:<10} {:>5}/{:<5} real  score {:.3}  [{}]",
                r.entity_kind.as_tag(),
                truncate(&r.identifier, 10),
                r.stats.real,
                r.stats.total,
                r.score,
                r.source.as_tag()
            )?;
        }
        writeln!(f)?;
        for kind in [EntityKind::Security, EntityKind::Benchmark] {
            let s = self.summary(kind);
            writeln!(
                f,
                "{:<10} {}/{} with real data, average score {:.3}",
                kind.as_tag(),
                s.with_real_data,
                s.entities,
                s.average_score
            )?;
        }
        Ok(())
    }
}

/// Everything `quality report` prints.
#[derive(Debug, Clone)]
pub struct QualityReport {
    pub securities: Vec<SourceBreakdown>,
    pub benchmarks: Vec<SourceBreakdown>,
    pub portfolio: PortfolioId,
    pub as_of: NaiveDate,
    pub coverage: PortfolioCoverage,
    pub status: Option<Vec<QualityStatusRow>>,
}

impl QualityReport {
    pub async fn collect(
        store: &Store,
        portfolio: PortfolioId,
        as_of: NaiveDate,
        with_status: bool,
    ) -> Result<Self, StoreError> {
        let securities = store.source_breakdown(EntityKind::Security).await?;
        let benchmarks = store.source_breakdown(EntityKind::Benchmark).await?;
        let coverage =
            PortfolioCoverage::from_holdings(store.holding_coverage(portfolio, as_of).await?);
        let status = if with_status {
            Some(store.quality_status().await?)
        } else {
            None
        };
        Ok(Self {
            securities,
            benchmarks,
            portfolio,
            as_of,
            coverage,
            status,
        })
    }
}

fn write_breakdown(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    header: &str,
    rows: &[SourceBreakdown],
) -> fmt::Result {
    writeln!(f, "{title}")?;
    writeln!(
        f,
        "{:<10} {:<28} {:<10} {:>7} {:<11} {:<11}",
        header, "Name", "Source", "Records", "First", "Last"
    )?;
    writeln!(f, "{}", rule(82))?;
    if rows.is_empty() {
        writeln!(f, "(no price data)")?;
    }
    for r in rows {
        let first = r.first_date.map(|d| d.to_string());
        let last = r.last_date.map(|d| d.to_string());
        writeln!(
            f,
            "{:<10} {:<28} {:<10} {:>7} {:<11} {:<11}",
            truncate(&r.identifier, 10),
            truncate(&r.name, 28),
            or_na(r.source_tag.as_deref()),
            r.records,
            or_na(first.as_deref()),
            or_na(last.as_deref())
        )?;
    }
    Ok(())
}

fn write_status(f: &mut fmt::Formatter<'_>, rows: &[QualityStatusRow]) -> fmt::Result {
    writeln!(f, "Data quality status")?;
    writeln!(
        f,
        "{:<10} {:<10} {:<10} {:>6} {:>6} {:>6} {:<11} {:<11} {:>6} {:<9}",
        "Kind", "Entity", "Source", "Total", "Real", "Synth", "First real", "Last real", "Score", "Rating"
    )?;
    writeln!(f, "{}", rule(100))?;
    if rows.is_empty() {
        writeln!(f, "(status table is empty, run `quality populate`)")?;
    }
    for r in rows {
        let first = r.stats.first_real.map(|d| d.to_string());
        let last = r.stats.last_real.map(|d| d.to_string());
        writeln!(
            f,
            "{:<10} {:<10} {:<10} {:>6} {:>6} {:>6} {:<11} {:<11} {:>6.3} {:<9}",
            r.entity_kind.as_tag(),
            truncate(&r.identifier, 10),
            r.source.as_tag(),
            r.stats.total,
            r.stats.real,
            r.stats.synthetic,
            or_na(first.as_deref()),
            or_na(last.as_deref()),
            r.score,
            QualityRating::from_score(r.score)
        )?;
    }
    Ok(())
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_breakdown(f, "Security prices by source", "Ticker", &self.securities)?;
        writeln!(f)?;
        write_breakdown(f, "Benchmark prices by source", "Code", &self.benchmarks)?;
        writeln!(f)?;

        writeln!(
            f,
            "Portfolio {} coverage (holdings as of {})",
            self.portfolio, self.as_of
        )?;
        writeln!(
            f,
            "{:<10} {:>8} {:>8} {:>8} {:<10}",
            "Ticker", "Weight", "Real", "Synth", "Source"
        )?;
        writeln!(f, "{}", rule(48))?;
        if self.coverage.holdings.is_empty() {
            writeln!(f, "(no holdings)")?;
        }
        for h in &self.coverage.holdings {
            writeln!(
                f,
                "{:<10} {:>8} {:>8} {:>8} {:<10}",
                truncate(&h.ticker, 10),
                pct(h.weight, 1),
                h.real_records,
                h.synthetic_records,
                h.source().as_tag()
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Real data: {:.1}%  Synthetic: {:.1}%",
            self.coverage.real_pct, self.coverage.synthetic_pct
        )?;
        writeln!(f, "Verdict: {}", self.coverage.verdict().message())?;

        if let Some(status) = &self.status {
            writeln!(f)?;
            write_status(f, status)?;
        }
        Ok(())
    }
}
