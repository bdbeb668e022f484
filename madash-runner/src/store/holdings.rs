//! Portfolio and fund holdings.
//!
//! Holdings are point-in-time snapshots. Reads pick the latest snapshot on or
//! before the requested date, per portfolio and per fund.

use super::records::{FundConstituent, HeldSecurity};
use super::{Store, StoreError};
use chrono::NaiveDate;
use madash_core::domain::{PortfolioId, SecurityId};
use madash_core::quality::HoldingCoverage;
use sqlx::Row;

impl Store {
    pub async fn holdings_as_of(
        &self,
        portfolio: PortfolioId,
        as_of: NaiveDate,
    ) -> Result<Vec<HeldSecurity>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT h.security_id, s.ticker, s.name, s.security_type,
                   h.weight, h.market_value, h.date
            FROM portfolio_holdings h
            JOIN securities s ON h.security_id = s.security_id
            WHERE h.portfolio_id = $1
              AND h.date = (SELECT MAX(date) FROM portfolio_holdings
                            WHERE portfolio_id = $1 AND date <= $2)
            ORDER BY h.weight DESC, s.ticker
            "#,
        )
        .bind(portfolio.0)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<HeldSecurity, StoreError> {
                Ok(HeldSecurity {
                    security_id: SecurityId(r.try_get("security_id")?),
                    ticker: r.try_get("ticker")?,
                    name: r.try_get("name")?,
                    security_type: r.try_get("security_type")?,
                    weight: r.try_get("weight")?,
                    market_value: r.try_get("market_value")?,
                    date: r.try_get("date")?,
                })
            })
            .collect()
    }

    /// Every fund's latest constituent list on or before `as_of`.
    pub async fn fund_constituents_as_of(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<FundConstituent>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT fh.fund_security_id, f.ticker AS fund_ticker, f.name AS fund_name,
                   fh.underlying_security_id, u.ticker, u.name, u.security_type,
                   u.exchange, u.sedol, u.country_of_domicile, fh.weight
            FROM fund_holdings fh
            JOIN securities f ON fh.fund_security_id = f.security_id
            JOIN securities u ON fh.underlying_security_id = u.security_id
            WHERE fh.date = (SELECT MAX(x.date) FROM fund_holdings x
                             WHERE x.fund_security_id = fh.fund_security_id AND x.date <= $1)
            ORDER BY f.ticker, fh.weight DESC, u.ticker
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<FundConstituent, StoreError> {
                Ok(FundConstituent {
                    fund_id: SecurityId(r.try_get("fund_security_id")?),
                    fund_ticker: r.try_get("fund_ticker")?,
                    fund_name: r.try_get("fund_name")?,
                    security_id: SecurityId(r.try_get("underlying_security_id")?),
                    ticker: r.try_get("ticker")?,
                    name: r.try_get("name")?,
                    security_type: r.try_get("security_type")?,
                    exchange: r.try_get("exchange")?,
                    sedol: r.try_get("sedol")?,
                    country_of_domicile: r.try_get("country_of_domicile")?,
                    weight: r.try_get("weight")?,
                })
            })
            .collect()
    }

    /// Real and synthetic row counts for each current holding.
    pub async fn holding_coverage(
        &self,
        portfolio: PortfolioId,
        as_of: NaiveDate,
    ) -> Result<Vec<HoldingCoverage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT s.ticker, h.weight,
                   COUNT(sp.date) FILTER (WHERE sp.data_source = $3) AS real_records,
                   COUNT(sp.date) FILTER (WHERE sp.data_source IS DISTINCT FROM $3) AS synthetic_records
            FROM portfolio_holdings h
            JOIN securities s ON h.security_id = s.security_id
            LEFT JOIN security_prices sp ON sp.security_id = s.security_id
            WHERE h.portfolio_id = $1
              AND h.date = (SELECT MAX(date) FROM portfolio_holdings
                            WHERE portfolio_id = $1 AND date <= $2)
            GROUP BY s.security_id, s.ticker, h.weight
            ORDER BY h.weight DESC
            "#,
        )
        .bind(portfolio.0)
        .bind(as_of)
        .bind(madash_core::domain::REAL_SOURCE_TAG)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<HoldingCoverage, StoreError> {
                Ok(HoldingCoverage {
                    ticker: r.try_get("ticker")?,
                    weight: r.try_get("weight")?,
                    real_records: super::count(r.try_get("real_records")?),
                    synthetic_records: super::count(r.try_get("synthetic_records")?),
                })
            })
            .collect()
    }
}
