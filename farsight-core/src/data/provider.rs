//! Market data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over data sources (Yahoo Finance,
//! CSV import) so the pipeline can swap implementations and mock for tests.

use crate::domain::Bar;
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider returned a server error: {0}")]
    ServerError(String),

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("ticker not found: {ticker}")]
    TickerNotFound { ticker: String },

    #[error("no rows returned for ticker '{ticker}'")]
    NoData { ticker: String },

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("no cached data for ticker '{ticker}'")]
    NoCachedData { ticker: String },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Timeouts, rate limits, and server errors are transient; an unknown
    /// ticker or a changed response format is not and fails immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DataError::NetworkUnreachable(_)
                | DataError::RateLimited { .. }
                | DataError::ServerError(_)
        )
    }
}

/// Trait for daily OHLCV data providers.
///
/// Implementations handle the specifics of one source. Retry policy lives in
/// the implementation; the cache layer sits above this trait.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily OHLCV bars for a ticker over a date range, ascending by
    /// date. An empty result is an error (`NoData`), never an empty Vec.
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Bar>, DataError>;
}
