//! Market data gateway: providers, price cache, context series, CSV ingest.

pub mod cache;
pub mod context;
pub mod gateway;
pub mod ingest;
pub mod provider;
pub mod yahoo;

pub use cache::{CacheMeta, PriceCache, FRESHNESS_HOURS};
pub use context::{ContextSeries, MarketContext};
pub use gateway::load_history;
pub use ingest::{import_csv, read_csv};
pub use provider::{DataError, MarketDataProvider};
pub use yahoo::YahooProvider;
