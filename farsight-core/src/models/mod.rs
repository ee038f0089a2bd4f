//! Forecasting models: trend decomposition, GRU residual corrector,
//! ensemble blending, and GBM scenario simulation.
//!
//! The trend and residual models are independent components behind narrow
//! fit/predict surfaces; they meet only at the blender.

pub mod blend;
pub mod gru;
pub mod monte_carlo;
pub mod residual;
pub mod scaler;
pub mod trend;

pub use blend::{assemble_forecasts, blend_horizon, residual_weight, BlendConfig};
pub use gru::Gru;
pub use monte_carlo::{
    calibrate_gbm, percentile_sorted, simulate_scenarios, widen_with_scenarios, GbmParams,
    ScenarioConfig,
};
pub use residual::{ResidualConfig, ResidualModel};
pub use scaler::MinMaxScaler;
pub use trend::{TrendConfig, TrendModel, TrendPoint};

use thiserror::Error;

/// Errors from model fitting and inference.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("insufficient history: {got} observations, need at least {min}")]
    InsufficientHistory { got: usize, min: usize },

    #[error("residual model not ready: {0}")]
    NotReady(String),

    #[error("numeric failure: {0}")]
    Numeric(String),
}
