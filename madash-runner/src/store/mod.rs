//! PostgreSQL store.
//!
//! One [`Store`] wraps the job's connection pool. Queries are grouped by
//! table family across the submodules, each adding an `impl Store` block.
//! Every write is an `INSERT … ON CONFLICT … DO UPDATE` upsert, so jobs can be
//! rerun without duplicating rows.

mod analytics;
mod holdings;
mod prices;
mod quality;
mod records;
mod reference;

pub use records::{
    FundConstituent, HeldSecurity, IdentifierCoverage, PortfolioReturnRow, PortfolioSummary,
    QualityStatusRow, RealDataSummary, SourceBreakdown,
};

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("unexpected value in {column}: {value}")]
    Decode { column: &'static str, value: String },
}

pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        tracing::info!(url = %config.redacted_url(), "connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.connection_url())
            .await?;
        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Counts come back as BIGINT; negative values cannot occur.
pub(crate) fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_clamp_at_zero() {
        assert_eq!(count(12), 12);
        assert_eq!(count(-1), 0);
    }

    #[test]
    fn not_found_message() {
        let err = StoreError::NotFound {
            kind: "benchmark",
            key: "ASX200".into(),
        };
        assert_eq!(err.to_string(), "benchmark 'ASX200' not found");
    }
}
