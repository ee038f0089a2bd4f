//! Farsight Core — multi-horizon price forecasting engine.
//!
//! This crate contains the forecasting pipeline's building blocks:
//! - Domain types (bars, price series, horizons, forecast results)
//! - Market data gateway (provider trait, Yahoo implementation, Parquet
//!   price cache, market-context series, CSV ingest)
//! - Feature engine (fixed-schema technical indicators + context scalars)
//! - Trend model (additive trend + seasonality decomposition)
//! - Residual model (GRU sequence corrector with walk-forward training)
//! - Ensemble blender (horizon-weighted combination with calibrated bands)
//! - Monte Carlo scenario engine (GBM terminal-price percentiles)
//! - Deterministic RNG hierarchy

pub mod data;
pub mod domain;
pub mod features;
pub mod models;
pub mod rng;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: pipeline types cross the orchestrator's worker
    /// thread boundary, so they must be Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::Horizon>();
        require_sync::<domain::Horizon>();
        require_send::<domain::EnsembleForecast>();
        require_sync::<domain::EnsembleForecast>();
        require_send::<domain::ScenarioBand>();
        require_sync::<domain::ScenarioBand>();
        require_send::<domain::ForecastPoint>();
        require_sync::<domain::ForecastPoint>();

        require_send::<features::FeatureFrame>();
        require_sync::<features::FeatureFrame>();
        require_send::<features::FeatureSpec>();
        require_sync::<features::FeatureSpec>();

        require_send::<models::TrendModel>();
        require_sync::<models::TrendModel>();
        require_send::<models::ResidualModel>();
        require_sync::<models::ResidualModel>();
        require_send::<models::GbmParams>();
        require_sync::<models::GbmParams>();

        require_send::<rng::RngHierarchy>();
        require_sync::<rng::RngHierarchy>();

        require_send::<data::PriceCache>();
        require_sync::<data::PriceCache>();
    }
}
