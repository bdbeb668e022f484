//! Domain types shared by every job.

pub mod ids;
pub mod price;
pub mod security;

pub use ids::{BenchmarkId, EntityKind, PortfolioId, SecurityId};
pub use price::{DatedValue, PriceObservation, PriceSource, REAL_SOURCE_TAG, SYNTHETIC_SOURCE_TAG};
pub use security::{Benchmark, Security};

/// Trading days per year used for annualisation.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
