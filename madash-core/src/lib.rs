//! MADash core: domain types and the pure computations behind the batch jobs.
//!
//! - Domain types (securities, benchmarks, price observations)
//! - Risk statistics over daily return series
//! - Return derivation and date alignment
//! - Seeded synthetic benchmark and security price generation
//! - Data-quality scoring and portfolio coverage
//! - Fund-of-funds lookthrough
//! - Market-data provider trait, Yahoo Finance provider, fetch planning
//!
//! Nothing in this crate touches the database.

pub mod data;
pub mod domain;
pub mod lookthrough;
pub mod quality;
pub mod returns;
pub mod risk;
pub mod synthetic;
