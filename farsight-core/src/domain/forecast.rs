//! Forecast result types: trend baseline, residual corrections, blended
//! ensemble, and Monte Carlo scenario bands.
//!
//! The serialized field names are camelCase — these documents are what the
//! job store persists and what pollers read back.

use super::horizon::Horizon;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Baseline trend-model forecast at a single horizon, in price units.
///
/// Produced independently of the residual model; the interval is the trend
/// model's own uncertainty quantification, not recalibrated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendForecast {
    pub days: usize,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

/// One step of the residual model's autoregressive rollout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualStep {
    /// Predicted residual increment for this step, in price units.
    pub increment: f64,
    /// Estimated error magnitude accumulated up to this step.
    pub error: f64,
}

/// Per-step residual corrections over a horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidualForecast {
    pub steps: Vec<ResidualStep>,
    /// Single-step validation RMSE of the underlying model.
    pub step_rmse: f64,
}

impl ResidualForecast {
    /// Cumulative correction over all steps.
    pub fn cumulative(&self) -> f64 {
        self.steps.iter().map(|s| s.increment).sum()
    }

    /// Accumulated error magnitude at the final step (0 for an empty rollout).
    pub fn terminal_error(&self) -> f64 {
        self.steps.last().map(|s| s.error).unwrap_or(0.0)
    }
}

/// Percentile band over simulated terminal prices (long horizons only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioBand {
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

impl ScenarioBand {
    /// Percentiles must be non-decreasing.
    pub fn is_ordered(&self) -> bool {
        self.p10 <= self.p25 && self.p25 <= self.p50 && self.p50 <= self.p75 && self.p75 <= self.p90
    }
}

/// Blended point forecast and interval for one horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsembleForecast {
    pub horizon: Horizon,
    pub predicted_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Percent change vs. the last observed close.
    pub change_percent: f64,
    /// Scalar in [0, 1], non-increasing with horizon length.
    pub confidence: f64,
    /// Present only for horizons at or beyond the scenario threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<ScenarioBand>,
}

impl EnsembleForecast {
    /// Interval containment invariant: `lower <= point <= upper`.
    pub fn is_well_formed(&self) -> bool {
        self.lower_bound <= self.predicted_price
            && self.predicted_price <= self.upper_bound
            && (0.0..=1.0).contains(&self.confidence)
            && self.predicted_price.is_finite()
            && self.lower_bound.is_finite()
            && self.upper_bound.is_finite()
    }
}

/// One point of the daily forecast series kept for charting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}
