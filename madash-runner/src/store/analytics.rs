//! Derived tables: portfolio returns and risk calculations.

use super::records::PortfolioReturnRow;
use super::{Store, StoreError};
use chrono::NaiveDate;
use madash_core::domain::PortfolioId;
use madash_core::risk::RiskReport;

impl Store {
    pub async fn upsert_portfolio_returns(
        &self,
        portfolio: PortfolioId,
        rows: &[PortfolioReturnRow],
    ) -> Result<u64, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.date).collect();
        let returns: Vec<f64> = rows.iter().map(|r| r.daily_return).collect();
        let values: Vec<f64> = rows.iter().map(|r| r.portfolio_value).collect();
        let bench: Vec<Option<f64>> = rows.iter().map(|r| r.benchmark_return).collect();
        let active: Vec<Option<f64>> = rows.iter().map(|r| r.active_return).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO portfolio_returns (
                portfolio_id, date, daily_return, portfolio_value, benchmark_return, active_return
            )
            SELECT $1, t.date, t.daily_return, t.portfolio_value, t.benchmark_return, t.active_return
            FROM UNNEST(
                $2::DATE[], $3::DOUBLE PRECISION[], $4::DOUBLE PRECISION[],
                $5::DOUBLE PRECISION[], $6::DOUBLE PRECISION[]
            ) AS t(date, daily_return, portfolio_value, benchmark_return, active_return)
            ON CONFLICT (portfolio_id, date) DO UPDATE SET
                daily_return = EXCLUDED.daily_return,
                portfolio_value = EXCLUDED.portfolio_value,
                benchmark_return = EXCLUDED.benchmark_return,
                active_return = EXCLUDED.active_return
            "#,
        )
        .bind(portfolio.0)
        .bind(dates)
        .bind(returns)
        .bind(values)
        .bind(bench)
        .bind(active)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Beta and correlation are stored NULL when the report has no
    /// benchmark-relative section.
    pub async fn upsert_risk_calculation(
        &self,
        portfolio: PortfolioId,
        calculation_date: NaiveDate,
        method: &str,
        report: &RiskReport,
    ) -> Result<(), StoreError> {
        let relative = report.relative.as_ref();
        sqlx::query(
            r#"
            INSERT INTO portfolio_risk_calculations (
                portfolio_id, calculation_date, calculation_method,
                var_1d_95, var_1d_99, daily_volatility, annualized_volatility,
                sharpe_ratio, max_drawdown, tracking_error, beta, correlation
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (portfolio_id, calculation_date, calculation_method) DO UPDATE SET
                var_1d_95 = EXCLUDED.var_1d_95,
                var_1d_99 = EXCLUDED.var_1d_99,
                daily_volatility = EXCLUDED.daily_volatility,
                annualized_volatility = EXCLUDED.annualized_volatility,
                sharpe_ratio = EXCLUDED.sharpe_ratio,
                max_drawdown = EXCLUDED.max_drawdown,
                tracking_error = EXCLUDED.tracking_error,
                beta = EXCLUDED.beta,
                correlation = EXCLUDED.correlation,
                created_at = NOW()
            "#,
        )
        .bind(portfolio.0)
        .bind(calculation_date)
        .bind(method)
        .bind(report.var_95)
        .bind(report.var_99)
        .bind(report.daily_volatility)
        .bind(report.annualized_volatility)
        .bind(report.sharpe_ratio)
        .bind(report.max_drawdown)
        .bind(relative.map(|r| r.tracking_error))
        .bind(relative.and_then(|r| r.beta))
        .bind(relative.and_then(|r| r.correlation))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
