//! Row shapes returned by the store.

use chrono::{DateTime, NaiveDate, Utc};
use madash_core::domain::{Benchmark, BenchmarkId, EntityKind, PriceSource, Security, SecurityId};
use madash_core::quality::QualityStats;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub(crate) struct SecurityRecord {
    pub security_id: i32,
    pub ticker: String,
    pub name: String,
    pub security_type: Option<String>,
    pub exchange: Option<String>,
    pub isin: Option<String>,
    pub sedol: Option<String>,
    pub cusip: Option<String>,
    pub country_of_domicile: Option<String>,
    pub expense_ratio: Option<f64>,
}

impl From<SecurityRecord> for Security {
    fn from(r: SecurityRecord) -> Self {
        Security {
            id: SecurityId(r.security_id),
            ticker: r.ticker,
            name: r.name,
            security_type: r.security_type,
            exchange: r.exchange,
            isin: r.isin,
            sedol: r.sedol,
            cusip: r.cusip,
            country_of_domicile: r.country_of_domicile,
            expense_ratio: r.expense_ratio,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct BenchmarkRecord {
    pub benchmark_id: i32,
    pub code: String,
    pub name: String,
}

impl From<BenchmarkRecord> for Benchmark {
    fn from(r: BenchmarkRecord) -> Self {
        Benchmark {
            id: BenchmarkId(r.benchmark_id),
            code: r.code,
            name: r.name,
        }
    }
}

/// A direct portfolio position joined with its security.
#[derive(Debug, Clone, PartialEq)]
pub struct HeldSecurity {
    pub security_id: SecurityId,
    pub ticker: String,
    pub name: String,
    pub security_type: String,
    pub weight: f64,
    pub market_value: Option<f64>,
    pub date: NaiveDate,
}

/// One constituent of a fund, with both sides' descriptive columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FundConstituent {
    pub fund_id: SecurityId,
    pub fund_ticker: String,
    pub fund_name: String,
    pub security_id: SecurityId,
    pub ticker: String,
    pub name: String,
    pub security_type: String,
    pub exchange: Option<String>,
    pub sedol: Option<String>,
    pub country_of_domicile: Option<String>,
    pub weight: f64,
}

/// Row of `portfolio_returns`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioReturnRow {
    pub date: NaiveDate,
    pub daily_return: f64,
    pub portfolio_value: f64,
    pub benchmark_return: Option<f64>,
    pub active_return: Option<f64>,
}

/// Rows for one entity grouped by their source tag.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBreakdown {
    pub identifier: String,
    pub name: String,
    /// Raw tag as stored; `None` for untagged rows.
    pub source_tag: Option<String>,
    pub records: u64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl SourceBreakdown {
    pub fn source(&self) -> PriceSource {
        PriceSource::from_tag(self.source_tag.as_deref())
    }
}

/// Real-data coverage of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RealDataSummary {
    pub identifier: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub records: u64,
}

/// Row of `data_quality_status` joined with the entity's identifier and name.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityStatusRow {
    pub entity_kind: EntityKind,
    pub entity_id: i32,
    pub identifier: String,
    pub name: String,
    pub source: PriceSource,
    pub stats: QualityStats,
    pub score: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl QualityStatusRow {
    /// Build a status row from freshly aggregated counts.
    pub fn from_stats(
        entity_kind: EntityKind,
        entity_id: i32,
        identifier: String,
        name: String,
        stats: QualityStats,
    ) -> Self {
        Self {
            entity_kind,
            entity_id,
            identifier,
            name,
            source: stats.primary_source(),
            score: stats.score(),
            stats,
            last_updated: None,
        }
    }
}

/// Identifier coverage for one security type.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentifierCoverage {
    pub security_type: String,
    pub total: u64,
    pub isin: u64,
    pub sedol: u64,
    pub cusip: u64,
    pub global_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSummary {
    pub code: String,
    pub name: String,
    pub holdings: u64,
    pub total_value: f64,
    pub as_of: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_row_derives_score_and_source() {
        let stats = QualityStats {
            total: 10,
            real: 8,
            synthetic: 2,
            first_real: None,
            last_real: None,
        };
        let row = QualityStatusRow::from_stats(
            EntityKind::Security,
            5,
            "CBA.AX".into(),
            "Commonwealth Bank".into(),
            stats,
        );
        assert_eq!(row.source, PriceSource::YahooFinance);
        assert!((row.score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn untagged_rows_are_synthetic() {
        let row = SourceBreakdown {
            identifier: "STW".into(),
            name: "SPDR".into(),
            source_tag: None,
            records: 3,
            first_date: None,
            last_date: None,
        };
        assert_eq!(row.source(), PriceSource::Synthetic);
    }
}
