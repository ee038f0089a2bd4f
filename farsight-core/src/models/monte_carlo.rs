//! Monte Carlo scenario engine — geometric random-walk terminal prices.
//!
//! For long horizons the ensemble's parametric interval is augmented with
//! percentile bands over simulated terminal prices. Drift and volatility
//! are calibrated from the historical log-return series (annualized over
//! 252 trading days). Paths are independent, each seeded from the RNG
//! hierarchy, so results are identical for any thread count and fully
//! reproducible from the master seed.

use super::ModelError;
use crate::domain::{EnsembleForecast, ScenarioBand};
use crate::rng::RngHierarchy;
use rand::Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Scenario engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Number of independent simulated paths.
    pub n_paths: usize,
    /// Horizons at or beyond this many trading days get scenario bands.
    pub threshold_days: usize,
    pub trading_days_per_year: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            n_paths: 2000,
            threshold_days: 756,
            trading_days_per_year: 252.0,
        }
    }
}

/// Calibrated geometric random-walk parameters.
#[derive(Debug, Clone, Copy)]
pub struct GbmParams {
    pub last_price: f64,
    pub annual_drift: f64,
    pub annual_vol: f64,
}

/// Calibrate drift and volatility from one-day log returns.
pub fn calibrate_gbm(
    log_returns: &[f64],
    last_price: f64,
    config: &ScenarioConfig,
) -> Result<GbmParams, ModelError> {
    let n = log_returns.len();
    if n < 2 {
        return Err(ModelError::Numeric(
            "need at least 2 returns to calibrate scenario drift".into(),
        ));
    }
    if log_returns.iter().any(|r| !r.is_finite()) || !last_price.is_finite() || last_price <= 0.0 {
        return Err(ModelError::Numeric(
            "non-finite inputs in scenario calibration".into(),
        ));
    }

    let mean = log_returns.iter().sum::<f64>() / n as f64;
    let var = log_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);

    Ok(GbmParams {
        last_price,
        annual_drift: mean * config.trading_days_per_year,
        annual_vol: var.sqrt() * config.trading_days_per_year.sqrt(),
    })
}

/// Simulate terminal prices over `days` trading days and summarize the
/// distribution as 10/25/50/75/90 percentiles.
///
/// Each path accumulates daily log-steps and exponentiates once; paths run
/// in parallel with per-path sub-seeds, so the result is independent of
/// rayon's scheduling.
pub fn simulate_scenarios(
    params: &GbmParams,
    days: usize,
    config: &ScenarioConfig,
    rng: &RngHierarchy,
    key: &str,
) -> ScenarioBand {
    let dt = 1.0 / config.trading_days_per_year;
    let step_drift = (params.annual_drift - 0.5 * params.annual_vol.powi(2)) * dt;
    let step_vol = params.annual_vol * dt.sqrt();

    let mut terminals: Vec<f64> = (0..config.n_paths)
        .into_par_iter()
        .map(|path| {
            let mut path_rng = rng.rng_for(key, "scenario", path as u64);
            let mut log_sum = 0.0;
            for _ in 0..days {
                let z: f64 = path_rng.sample(StandardNormal);
                log_sum += step_drift + step_vol * z;
            }
            params.last_price * log_sum.exp()
        })
        .collect();

    terminals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    ScenarioBand {
        p10: percentile_sorted(&terminals, 10.0),
        p25: percentile_sorted(&terminals, 25.0),
        p50: percentile_sorted(&terminals, 50.0),
        p75: percentile_sorted(&terminals, 75.0),
        p90: percentile_sorted(&terminals, 90.0),
    }
}

/// Attach a scenario band to a forecast, widening its interval to cover
/// p10..p90. The band never narrows the interval.
pub fn widen_with_scenarios(forecast: &mut EnsembleForecast, band: ScenarioBand) {
    forecast.lower_bound = forecast.lower_bound.min(band.p10);
    forecast.upper_bound = forecast.upper_bound.max(band.p90);
    forecast.monte_carlo = Some(band);
}

/// Percentile of a sorted slice using linear interpolation.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
