//! Ensemble blender — combines the trend baseline with the residual
//! model's cumulative correction.
//!
//! The residual contribution decays smoothly with horizon length:
//! `w(d) = scale * exp(-d / tau)`. Short horizons lean on the residual
//! corrector (high-frequency patterns are informative close in); long
//! horizons lean on trend/seasonality because rollout error compounds.
//! The default constants put the weight near 0.6 at one month and near
//! 0.1 at five years, with no jumps between adjacent horizons.

use super::ModelError;
use crate::domain::{EnsembleForecast, Horizon, ResidualForecast, TrendForecast};
use serde::{Deserialize, Serialize};

/// Blender parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendConfig {
    /// Residual weight at horizon zero.
    pub weight_scale: f64,
    /// Exponential decay constant in trading days.
    pub weight_tau_days: f64,
    /// Confidence at horizon zero.
    pub base_confidence: f64,
    /// Confidence never reported below this.
    pub confidence_floor: f64,
    /// Horizon (trading days) at which base confidence would reach zero.
    pub max_horizon_days: f64,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            weight_scale: 0.62,
            weight_tau_days: 700.0,
            base_confidence: 0.85,
            confidence_floor: 0.1,
            max_horizon_days: 2520.0,
        }
    }
}

/// Horizon-dependent residual weight, monotone decreasing and continuous.
pub fn residual_weight(config: &BlendConfig, days: usize) -> f64 {
    config.weight_scale * (-(days as f64) / config.weight_tau_days).exp()
}

/// Blend one horizon's trend forecast with the residual rollout.
///
/// `predicted = trend_point + w(d) * Σ increments`; the interval is the
/// trend interval shifted by the weighted correction and widened by the
/// weighted terminal rollout error, so `lower <= predicted <= upper` holds
/// by construction. The lower bound is floored at zero (prices cannot go
/// negative).
pub fn blend_horizon(
    config: &BlendConfig,
    horizon: Horizon,
    trend: &TrendForecast,
    residual: &ResidualForecast,
    last_close: f64,
) -> Result<EnsembleForecast, ModelError> {
    let days = horizon.trading_days();
    let w = residual_weight(config, days);
    let correction = w * residual.cumulative();
    let spread = w * residual.terminal_error();

    let predicted = trend.point + correction;
    let lower = (trend.lower + correction - spread).max(0.0);
    let upper = trend.upper + correction + spread;

    if !predicted.is_finite() || !lower.is_finite() || !upper.is_finite() {
        return Err(ModelError::Numeric(format!(
            "non-finite blended forecast at horizon {horizon}"
        )));
    }

    let change_percent = if last_close.abs() > 1e-9 {
        (predicted - last_close) / last_close * 100.0
    } else {
        0.0
    };

    let base = (config.base_confidence * (1.0 - days as f64 / config.max_horizon_days))
        .clamp(config.confidence_floor, config.base_confidence);
    let rel_width = (upper - lower) / predicted.max(1e-9);
    let confidence = (base / (1.0 + rel_width)).clamp(0.0, 1.0);

    Ok(EnsembleForecast {
        horizon,
        predicted_price: predicted,
        lower_bound: lower,
        upper_bound: upper,
        change_percent,
        confidence,
        monte_carlo: None,
    })
}

/// Order forecasts by horizon and enforce the cross-horizon invariants:
/// interval width never shrinks and confidence never rises as the horizon
/// grows. Widths are expanded symmetrically so point containment is kept.
pub fn assemble_forecasts(mut forecasts: Vec<EnsembleForecast>) -> Vec<EnsembleForecast> {
    forecasts.sort_by_key(|f| f.horizon);

    let mut prev_width = 0.0_f64;
    let mut prev_confidence = f64::INFINITY;

    for fc in &mut forecasts {
        let width = fc.upper_bound - fc.lower_bound;
        if width < prev_width {
            let pad = (prev_width - width) / 2.0;
            fc.lower_bound -= pad;
            fc.upper_bound += pad;
            if fc.lower_bound < 0.0 {
                // Keep the floor without giving back the width
                fc.upper_bound -= fc.lower_bound;
                fc.lower_bound = 0.0;
            }
        }
        prev_width = fc.upper_bound - fc.lower_bound;

        fc.confidence = fc.confidence.min(prev_confidence);
        prev_confidence = fc.confidence;
    }

    forecasts
}
