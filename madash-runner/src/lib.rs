//! MADash runner — the batch jobs behind the dashboard.
//!
//! This crate builds on `madash-core` to provide:
//! - TOML configuration with built-in defaults
//! - The PostgreSQL store (sqlx) and embedded schema migrations
//! - Market-data loader (backfill, incremental update, summary)
//! - Data-quality populator and reporter
//! - Synthetic data and risk pipeline
//! - Structure validation report

pub mod config;
pub mod format;
pub mod job;
pub mod loader;
pub mod quality_report;
pub mod risk_pipeline;
pub mod store;
pub mod structure_report;

pub use config::{ConfigError, DashboardConfig, DATABASE_URL_ENV, DEFAULT_CONFIG_FILE};
pub use job::{today, JobError};
pub use loader::{LoadMode, LoadOutcome, LoadSummary, Loader, PriceStore, RealDataReport};
pub use quality_report::{PopulateReport, QualityReport};
pub use risk_pipeline::{GenerationSummary, RiskOptions, RiskRun, SyntheticStore};
pub use store::{Store, StoreError};
pub use structure_report::{FundAnalysis, StructureReport};
