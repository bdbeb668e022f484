//! Security and benchmark price tables, benchmark returns.
//!
//! Bulk writes bind whole columns as arrays and expand them with `UNNEST`,
//! so a year of prices is one statement rather than one per row.

use super::records::{RealDataSummary, SourceBreakdown};
use super::{count, Store, StoreError};
use chrono::NaiveDate;
use madash_core::domain::{
    BenchmarkId, DatedValue, EntityKind, PriceObservation, SecurityId, REAL_SOURCE_TAG,
};
use sqlx::Row;

fn columns(rows: &[PriceObservation]) -> (Vec<NaiveDate>, Vec<f64>, Vec<String>) {
    let dates = rows.iter().map(|r| r.date).collect();
    let closes = rows.iter().map(|r| r.close).collect();
    let sources = rows.iter().map(|r| r.source.as_tag().to_string()).collect();
    (dates, closes, sources)
}

impl Store {
    // ─── Writes ─────────────────────────────────────────────────────

    /// Upsert closes. A synthetic row never replaces a real one.
    pub async fn upsert_security_prices(
        &self,
        security: SecurityId,
        rows: &[PriceObservation],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let (dates, closes, sources) = columns(rows);
        let result = sqlx::query(
            r#"
            INSERT INTO security_prices (security_id, date, close_price, data_source)
            SELECT $1, t.date, t.close_price, t.data_source
            FROM UNNEST($2::DATE[], $3::DOUBLE PRECISION[], $4::TEXT[])
                 AS t(date, close_price, data_source)
            ON CONFLICT (security_id, date) DO UPDATE SET
                close_price = EXCLUDED.close_price,
                data_source = EXCLUDED.data_source
            WHERE security_prices.data_source IS DISTINCT FROM $5
               OR EXCLUDED.data_source = $5
            "#,
        )
        .bind(security.0)
        .bind(dates)
        .bind(closes)
        .bind(sources)
        .bind(REAL_SOURCE_TAG)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Insert a price only when none exists for that date. Returns whether a
    /// row was written.
    pub async fn insert_security_price_if_missing(
        &self,
        security: SecurityId,
        row: &PriceObservation,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO security_prices (security_id, date, close_price, data_source)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (security_id, date) DO NOTHING
            "#,
        )
        .bind(security.0)
        .bind(row.date)
        .bind(row.close)
        .bind(row.source.as_tag())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Benchmark closes; the total return index is stored equal to the close.
    /// A synthetic row never replaces a real one.
    pub async fn upsert_benchmark_prices(
        &self,
        benchmark: BenchmarkId,
        rows: &[PriceObservation],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let (dates, closes, sources) = columns(rows);
        let result = sqlx::query(
            r#"
            INSERT INTO benchmark_prices (benchmark_id, date, close_price, total_return_index, data_source)
            SELECT $1, t.date, t.close_price, t.close_price, t.data_source
            FROM UNNEST($2::DATE[], $3::DOUBLE PRECISION[], $4::TEXT[])
                 AS t(date, close_price, data_source)
            ON CONFLICT (benchmark_id, date) DO UPDATE SET
                close_price = EXCLUDED.close_price,
                total_return_index = EXCLUDED.total_return_index,
                data_source = EXCLUDED.data_source
            WHERE benchmark_prices.data_source IS DISTINCT FROM $5
               OR EXCLUDED.data_source = $5
            "#,
        )
        .bind(benchmark.0)
        .bind(dates)
        .bind(closes)
        .bind(sources)
        .bind(REAL_SOURCE_TAG)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn upsert_benchmark_returns(
        &self,
        benchmark: BenchmarkId,
        rows: &[DatedValue],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        let values: Vec<f64> = rows.iter().map(|r| r.value).collect();
        let result = sqlx::query(
            r#"
            INSERT INTO benchmark_returns (benchmark_id, date, daily_return)
            SELECT $1, t.date, t.daily_return
            FROM UNNEST($2::DATE[], $3::DOUBLE PRECISION[]) AS t(date, daily_return)
            ON CONFLICT (benchmark_id, date) DO UPDATE SET
                daily_return = EXCLUDED.daily_return
            "#,
        )
        .bind(benchmark.0)
        .bind(dates)
        .bind(values)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ─── Watermarks ─────────────────────────────────────────────────

    /// Latest date holding a real (`yfinance`) price for the security.
    pub async fn last_real_security_date(
        &self,
        security: SecurityId,
    ) -> Result<Option<NaiveDate>, StoreError> {
        let date: Option<NaiveDate> = sqlx::query_scalar(
            "SELECT MAX(date) FROM security_prices WHERE security_id = $1 AND data_source = $2",
        )
        .bind(security.0)
        .bind(REAL_SOURCE_TAG)
        .fetch_one(&self.pool)
        .await?;
        Ok(date)
    }

    /// Latest real benchmark close and its date.
    pub async fn last_real_benchmark_close(
        &self,
        benchmark: BenchmarkId,
    ) -> Result<Option<(NaiveDate, f64)>, StoreError> {
        let row: Option<(NaiveDate, f64)> = sqlx::query_as(
            r#"
            SELECT date, close_price FROM benchmark_prices
            WHERE benchmark_id = $1 AND data_source = $2
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(benchmark.0)
        .bind(REAL_SOURCE_TAG)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // ─── Reads ──────────────────────────────────────────────────────

    pub async fn security_price_on(
        &self,
        security: SecurityId,
        date: NaiveDate,
    ) -> Result<Option<f64>, StoreError> {
        let price: Option<f64> = sqlx::query_scalar(
            "SELECT close_price FROM security_prices WHERE security_id = $1 AND date = $2",
        )
        .bind(security.0)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(price)
    }

    /// Price panel for `securities` over `from..=to`, ordered by date.
    pub async fn security_prices_between(
        &self,
        securities: &[SecurityId],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(SecurityId, NaiveDate, f64)>, StoreError> {
        let ids: Vec<i32> = securities.iter().map(|s| s.0).collect();
        let rows: Vec<(i32, NaiveDate, f64)> = sqlx::query_as(
            r#"
            SELECT security_id, date, close_price
            FROM security_prices
            WHERE security_id = ANY($1) AND date BETWEEN $2 AND $3
            ORDER BY date, security_id
            "#,
        )
        .bind(ids)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, date, close)| (SecurityId(id), date, close))
            .collect())
    }

    pub async fn benchmark_returns_between(
        &self,
        benchmark: BenchmarkId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DatedValue>, StoreError> {
        let rows: Vec<(NaiveDate, f64)> = sqlx::query_as(
            r#"
            SELECT date, daily_return FROM benchmark_returns
            WHERE benchmark_id = $1 AND date BETWEEN $2 AND $3
            ORDER BY date
            "#,
        )
        .bind(benchmark.0)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(date, value)| DatedValue::new(date, value))
            .collect())
    }

    // ─── Summaries ──────────────────────────────────────────────────

    /// Row counts and date ranges per entity and source tag.
    pub async fn source_breakdown(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<SourceBreakdown>, StoreError> {
        let sql = match kind {
            EntityKind::Security => {
                r#"
                SELECT s.ticker AS identifier, s.name, sp.data_source,
                       COUNT(*) AS records, MIN(sp.date) AS first_date, MAX(sp.date) AS last_date
                FROM security_prices sp
                JOIN securities s ON sp.security_id = s.security_id
                GROUP BY s.security_id, s.ticker, s.name, sp.data_source
                ORDER BY s.ticker, sp.data_source
                "#
            }
            EntityKind::Benchmark => {
                r#"
                SELECT b.code AS identifier, b.name, bp.data_source,
                       COUNT(*) AS records, MIN(bp.date) AS first_date, MAX(bp.date) AS last_date
                FROM benchmark_prices bp
                JOIN benchmarks b ON bp.benchmark_id = b.benchmark_id
                GROUP BY b.benchmark_id, b.code, b.name, bp.data_source
                ORDER BY b.code, bp.data_source
                "#
            }
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| -> Result<SourceBreakdown, StoreError> {
                Ok(SourceBreakdown {
                    identifier: r.try_get("identifier")?,
                    name: r.try_get("name")?,
                    source_tag: r.try_get("data_source")?,
                    records: count(r.try_get("records")?),
                    first_date: r.try_get("first_date")?,
                    last_date: r.try_get("last_date")?,
                })
            })
            .collect()
    }

    /// First/last date and count of real rows per entity that has any.
    pub async fn real_data_summary(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<RealDataSummary>, StoreError> {
        let sql = match kind {
            EntityKind::Security => {
                r#"
                SELECT s.ticker AS identifier, MIN(sp.date) AS first_date,
                       MAX(sp.date) AS last_date, COUNT(*) AS records
                FROM security_prices sp
                JOIN securities s ON sp.security_id = s.security_id
                WHERE sp.data_source = $1
                GROUP BY s.security_id, s.ticker
                ORDER BY s.ticker
                "#
            }
            EntityKind::Benchmark => {
                r#"
                SELECT b.code AS identifier, MIN(bp.date) AS first_date,
                       MAX(bp.date) AS last_date, COUNT(*) AS records
                FROM benchmark_prices bp
                JOIN benchmarks b ON bp.benchmark_id = b.benchmark_id
                WHERE bp.data_source = $1
                GROUP BY b.benchmark_id, b.code
                ORDER BY b.code
                "#
            }
        };

        let rows = sqlx::query(sql)
            .bind(REAL_SOURCE_TAG)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| -> Result<RealDataSummary, StoreError> {
                Ok(RealDataSummary {
                    identifier: r.try_get("identifier")?,
                    first_date: r.try_get("first_date")?,
                    last_date: r.try_get("last_date")?,
                    records: count(r.try_get("records")?),
                })
            })
            .collect()
    }
}
