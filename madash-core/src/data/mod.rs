//! Market data: provider trait, Yahoo Finance provider, circuit breaker and
//! incremental fetch planning.

pub mod circuit_breaker;
pub mod provider;
pub mod window;
pub mod yahoo;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use provider::{DataError, DataProvider, FetchResult, RawBar};
pub use window::FetchWindow;
pub use yahoo::YahooProvider;
