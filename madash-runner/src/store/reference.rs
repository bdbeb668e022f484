//! Securities, benchmarks, portfolios and schema metadata.

use super::records::{BenchmarkRecord, IdentifierCoverage, PortfolioSummary, SecurityRecord};
use super::{count, Store, StoreError};
use chrono::NaiveDate;
use madash_core::domain::{Benchmark, PortfolioId, Security};
use sqlx::Row;

const SECURITY_COLUMNS: &str = "security_id, ticker, name, security_type, exchange, isin, sedol, \
                                cusip, country_of_domicile, expense_ratio";

impl Store {
    /// Base tables in the public schema, by name.
    pub async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT table_name::TEXT AS table_name
            FROM information_schema.tables
            WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
            ORDER BY table_name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get("table_name").map_err(StoreError::from))
            .collect()
    }

    pub async fn securities(&self) -> Result<Vec<Security>, StoreError> {
        let sql = format!("SELECT {SECURITY_COLUMNS} FROM securities ORDER BY security_id");
        let rows: Vec<SecurityRecord> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Security::from).collect())
    }

    pub async fn securities_by_tickers(
        &self,
        tickers: &[String],
    ) -> Result<Vec<Security>, StoreError> {
        let sql = format!(
            "SELECT {SECURITY_COLUMNS} FROM securities WHERE ticker = ANY($1) ORDER BY ticker"
        );
        let rows: Vec<SecurityRecord> = sqlx::query_as(&sql)
            .bind(tickers)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Security::from).collect())
    }

    pub async fn security_by_ticker(&self, ticker: &str) -> Result<Option<Security>, StoreError> {
        let sql = format!("SELECT {SECURITY_COLUMNS} FROM securities WHERE ticker = $1");
        let row: Option<SecurityRecord> = sqlx::query_as(&sql)
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Security::from))
    }

    pub async fn benchmark_by_code(&self, code: &str) -> Result<Option<Benchmark>, StoreError> {
        let row: Option<BenchmarkRecord> =
            sqlx::query_as("SELECT benchmark_id, code, name FROM benchmarks WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Benchmark::from))
    }

    /// Like [`Store::benchmark_by_code`], but a missing benchmark is an error.
    pub async fn require_benchmark(&self, code: &str) -> Result<Benchmark, StoreError> {
        self.benchmark_by_code(code)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                kind: "benchmark",
                key: code.to_string(),
            })
    }

    /// Identifier coverage grouped by security type.
    pub async fn identifier_coverage(&self) -> Result<Vec<IdentifierCoverage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT security_type,
                   COUNT(*) AS total,
                   COUNT(isin) AS has_isin,
                   COUNT(sedol) AS has_sedol,
                   COUNT(cusip) AS has_cusip,
                   COUNT(CASE WHEN isin IS NOT NULL OR sedol IS NOT NULL THEN 1 END) AS has_global_id
            FROM securities
            GROUP BY security_type
            ORDER BY security_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<IdentifierCoverage, StoreError> {
                Ok(IdentifierCoverage {
                    security_type: r.try_get("security_type")?,
                    total: count(r.try_get("total")?),
                    isin: count(r.try_get("has_isin")?),
                    sedol: count(r.try_get("has_sedol")?),
                    cusip: count(r.try_get("has_cusip")?),
                    global_id: count(r.try_get("has_global_id")?),
                })
            })
            .collect()
    }

    /// Header figures for a portfolio's latest snapshot on or before `as_of`.
    pub async fn portfolio_summary(
        &self,
        portfolio: PortfolioId,
        as_of: NaiveDate,
    ) -> Result<Option<PortfolioSummary>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT p.code, p.name,
                   COUNT(h.security_id) AS holdings,
                   COALESCE(SUM(h.market_value), 0)::DOUBLE PRECISION AS total_value,
                   h.date AS as_of
            FROM portfolios p
            JOIN portfolio_holdings h ON h.portfolio_id = p.portfolio_id
            WHERE p.portfolio_id = $1
              AND h.date = (SELECT MAX(date) FROM portfolio_holdings
                            WHERE portfolio_id = $1 AND date <= $2)
            GROUP BY p.code, p.name, h.date
            "#,
        )
        .bind(portfolio.0)
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<PortfolioSummary, StoreError> {
            Ok(PortfolioSummary {
                code: r.try_get("code")?,
                name: r.try_get("name")?,
                holdings: count(r.try_get("holdings")?),
                total_value: r.try_get("total_value")?,
                as_of: r.try_get("as_of")?,
            })
        })
        .transpose()
    }
}
