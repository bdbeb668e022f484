//! `data_quality_status`: rebuilt wholesale from the price tables.

use super::records::QualityStatusRow;
use super::{count, Store, StoreError};
use madash_core::domain::{EntityKind, PriceSource, REAL_SOURCE_TAG};
use madash_core::quality::QualityStats;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};

const SECURITY_AGGREGATE: &str = r#"
    SELECT s.security_id AS entity_id, s.ticker AS identifier, s.name,
           COUNT(sp.date) AS total_records,
           COUNT(sp.date) FILTER (WHERE sp.data_source = $1) AS real_records,
           COUNT(sp.date) FILTER (WHERE sp.data_source IS DISTINCT FROM $1) AS synthetic_records,
           MIN(sp.date) FILTER (WHERE sp.data_source = $1) AS first_real_date,
           MAX(sp.date) FILTER (WHERE sp.data_source = $1) AS last_real_date
    FROM securities s
    LEFT JOIN security_prices sp ON sp.security_id = s.security_id
    GROUP BY s.security_id, s.ticker, s.name
    ORDER BY s.ticker
"#;

const BENCHMARK_AGGREGATE: &str = r#"
    SELECT b.benchmark_id AS entity_id, b.code AS identifier, b.name,
           COUNT(bp.date) AS total_records,
           COUNT(bp.date) FILTER (WHERE bp.data_source = $1) AS real_records,
           COUNT(bp.date) FILTER (WHERE bp.data_source IS DISTINCT FROM $1) AS synthetic_records,
           MIN(bp.date) FILTER (WHERE bp.data_source = $1) AS first_real_date,
           MAX(bp.date) FILTER (WHERE bp.data_source = $1) AS last_real_date
    FROM benchmarks b
    LEFT JOIN benchmark_prices bp ON bp.benchmark_id = b.benchmark_id
    GROUP BY b.benchmark_id, b.code, b.name
    ORDER BY b.code
"#;

fn stats_from_row(r: &PgRow) -> Result<QualityStats, StoreError> {
    Ok(QualityStats {
        total: count(r.try_get("total_records")?),
        real: count(r.try_get("real_records")?),
        synthetic: count(r.try_get("synthetic_records")?),
        first_real: r.try_get("first_real_date")?,
        last_real: r.try_get("last_real_date")?,
    })
}

async fn aggregate(
    tx: &mut Transaction<'_, Postgres>,
    kind: EntityKind,
) -> Result<Vec<QualityStatusRow>, StoreError> {
    let sql = match kind {
        EntityKind::Security => SECURITY_AGGREGATE,
        EntityKind::Benchmark => BENCHMARK_AGGREGATE,
    };
    let rows = sqlx::query(sql)
        .bind(REAL_SOURCE_TAG)
        .fetch_all(&mut **tx)
        .await?;
    rows.iter()
        .map(|r| -> Result<QualityStatusRow, StoreError> {
            Ok(QualityStatusRow::from_stats(
                kind,
                r.try_get("entity_id")?,
                r.try_get("identifier")?,
                r.try_get("name")?,
                stats_from_row(r)?,
            ))
        })
        .collect()
}

async fn insert_status(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[QualityStatusRow],
) -> Result<(), StoreError> {
    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO data_quality_status (
                entity_type, entity_id, data_source, first_real_date, last_real_date,
                total_records, real_records, synthetic_records, data_quality_score, last_updated
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (entity_type, entity_id) DO UPDATE SET
                data_source = EXCLUDED.data_source,
                first_real_date = EXCLUDED.first_real_date,
                last_real_date = EXCLUDED.last_real_date,
                total_records = EXCLUDED.total_records,
                real_records = EXCLUDED.real_records,
                synthetic_records = EXCLUDED.synthetic_records,
                data_quality_score = EXCLUDED.data_quality_score,
                last_updated = NOW()
            "#,
        )
        .bind(row.entity_kind.as_tag())
        .bind(row.entity_id)
        .bind(row.source.as_tag())
        .bind(row.stats.first_real)
        .bind(row.stats.last_real)
        .bind(row.stats.total as i64)
        .bind(row.stats.real as i64)
        .bind(row.stats.synthetic as i64)
        .bind(row.score)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

impl Store {
    /// Recompute every status row in one transaction: clear the table, then
    /// aggregate securities and benchmarks (entities without prices get zero
    /// counts). Nothing is written if any step fails.
    pub async fn rebuild_quality_status(&self) -> Result<Vec<QualityStatusRow>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let cleared = sqlx::query("DELETE FROM data_quality_status")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tracing::debug!(cleared, "cleared data quality status");

        let mut rows = aggregate(&mut tx, EntityKind::Security).await?;
        rows.extend(aggregate(&mut tx, EntityKind::Benchmark).await?);
        insert_status(&mut tx, &rows).await?;

        tx.commit().await?;
        Ok(rows)
    }

    /// The persisted status table, joined with identifiers, best score first.
    pub async fn quality_status(&self) -> Result<Vec<QualityStatusRow>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT q.entity_type, q.entity_id,
                   COALESCE(s.ticker, b.code, '?') AS identifier,
                   COALESCE(s.name, b.name, '') AS name,
                   q.data_source, q.first_real_date, q.last_real_date,
                   q.total_records, q.real_records, q.synthetic_records,
                   q.data_quality_score, q.last_updated
            FROM data_quality_status q
            LEFT JOIN securities s ON q.entity_type = 'security' AND s.security_id = q.entity_id
            LEFT JOIN benchmarks b ON q.entity_type = 'benchmark' AND b.benchmark_id = q.entity_id
            ORDER BY q.entity_type, q.data_quality_score DESC, identifier
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<QualityStatusRow, StoreError> {
                let tag: String = r.try_get("entity_type")?;
                let entity_kind = EntityKind::from_tag(&tag).ok_or(StoreError::Decode {
                    column: "entity_type",
                    value: tag,
                })?;
                let source: Option<String> = r.try_get("data_source")?;
                Ok(QualityStatusRow {
                    entity_kind,
                    entity_id: r.try_get("entity_id")?,
                    identifier: r.try_get("identifier")?,
                    name: r.try_get("name")?,
                    source: PriceSource::from_tag(source.as_deref()),
                    stats: stats_from_row(r)?,
                    score: r.try_get("data_quality_score")?,
                    last_updated: r.try_get("last_updated")?,
                })
            })
            .collect()
    }
}
