//! Shared job plumbing: the job error type and the run date.

use chrono::NaiveDate;
use madash_core::data::DataError;
use madash_core::domain::PortfolioId;
use madash_core::synthetic::SyntheticError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("market data error: {0}")]
    Data(#[from] DataError),

    #[error("synthetic data error: {0}")]
    Synthetic(#[from] SyntheticError),

    #[error("portfolio {portfolio} has no holdings on or before {as_of}")]
    NoHoldings {
        portfolio: PortfolioId,
        as_of: NaiveDate,
    },

    #[error("no portfolio returns could be computed for portfolio {0}")]
    NoReturns(PortfolioId),

    #[error("security '{0}' not found")]
    UnknownSecurity(String),
}

/// The date a job treats as "today".
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
