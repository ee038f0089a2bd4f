//! The forecast pipeline — data through features, models, blending, and
//! scenario simulation, with per-stage error attribution.
//!
//! Stages run sequentially within one job. Failures carry the failing stage
//! so operator logs can distinguish a data outage from a model problem; the
//! client-facing job projection never sees this detail.

use crate::config::PipelineConfig;
use farsight_core::data::{load_history, DataError, MarketContext, MarketDataProvider, PriceCache};
use farsight_core::domain::{EnsembleForecast, ForecastPoint, Horizon, ResidualForecast};
use farsight_core::features::{build_features, FeatureError};
use farsight_core::models::{
    assemble_forecasts, blend_horizon, calibrate_gbm, simulate_scenarios, widen_with_scenarios,
    ModelError, ResidualModel, TrendModel,
};
use farsight_core::rng::RngHierarchy;
use thiserror::Error;

/// Charting series length cap on the persisted job document.
pub const FORECAST_TIMESERIES_CAP: usize = 500;

/// Pipeline stages, used for error attribution and observer events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchData,
    BuildFeatures,
    FitTrend,
    TrainResidual,
    Blend,
    Scenario,
    Internal,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::FetchData => "fetch_data",
            Stage::BuildFeatures => "build_features",
            Stage::FitTrend => "fit_trend",
            Stage::TrainResidual => "train_residual",
            Stage::Blend => "blend",
            Stage::Scenario => "scenario",
            Stage::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Terminal pipeline failures.
///
/// Transient provider errors are retried inside the gateway; everything that
/// reaches this enum fails the job.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("insufficient history: {got} observations, need at least {min}")]
    InsufficientHistory { got: usize, min: usize },

    #[error("residual model not ready: {0}")]
    ModelNotReady(String),

    #[error("computation failed in stage {stage}: {detail}")]
    Computation { stage: Stage, detail: String },
}

impl PipelineError {
    /// The stage this error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::DataUnavailable(_) => Stage::FetchData,
            PipelineError::InsufficientHistory { .. } => Stage::FitTrend,
            PipelineError::ModelNotReady(_) => Stage::TrainResidual,
            PipelineError::Computation { stage, .. } => *stage,
        }
    }

    /// Stable kind tag for operator-facing records.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::DataUnavailable(_) => "data_unavailable",
            PipelineError::InsufficientHistory { .. } => "insufficient_history",
            PipelineError::ModelNotReady(_) => "model_not_ready",
            PipelineError::Computation { .. } => "computation_error",
        }
    }
}

fn model_error(stage: Stage, e: ModelError) -> PipelineError {
    match e {
        ModelError::InsufficientHistory { got, min } => {
            PipelineError::InsufficientHistory { got, min }
        }
        ModelError::NotReady(detail) => PipelineError::ModelNotReady(detail),
        ModelError::Numeric(detail) => PipelineError::Computation { stage, detail },
    }
}

impl From<DataError> for PipelineError {
    fn from(e: DataError) -> Self {
        PipelineError::DataUnavailable(e.to_string())
    }
}

impl From<FeatureError> for PipelineError {
    fn from(e: FeatureError) -> Self {
        match e {
            FeatureError::InsufficientHistory { rows, min_rows } => {
                PipelineError::InsufficientHistory {
                    got: rows,
                    min: min_rows,
                }
            }
            FeatureError::NonFinite { .. } => PipelineError::Computation {
                stage: Stage::BuildFeatures,
                detail: e.to_string(),
            },
        }
    }
}

/// Receives stage lifecycle events. The CLI prints them; tests collect them.
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, job_key: &str, stage: Stage);
    fn stage_finished(&self, job_key: &str, stage: Stage);
    fn stage_warning(&self, job_key: &str, stage: Stage, message: &str);
}

/// Observer that stays quiet. Default for embedded use.
pub struct SilentObserver;

impl PipelineObserver for SilentObserver {
    fn stage_started(&self, _job_key: &str, _stage: Stage) {}
    fn stage_finished(&self, _job_key: &str, _stage: Stage) {}
    fn stage_warning(&self, _job_key: &str, _stage: Stage, _message: &str) {}
}

/// Observer that prints stage events to stderr.
pub struct StderrObserver;

impl PipelineObserver for StderrObserver {
    fn stage_started(&self, job_key: &str, stage: Stage) {
        eprintln!("[{job_key}] {stage} ...");
    }

    fn stage_finished(&self, job_key: &str, stage: Stage) {
        eprintln!("[{job_key}] {stage} done");
    }

    fn stage_warning(&self, job_key: &str, stage: Stage, message: &str) {
        eprintln!("[{job_key}] {stage} WARNING: {message}");
    }
}

/// External collaborators the pipeline reads from.
pub struct PipelineContext<'a> {
    pub provider: &'a dyn MarketDataProvider,
    pub cache: &'a PriceCache,
}

/// Everything a completed job persists.
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub results: Vec<EnsembleForecast>,
    pub forecast_timeseries: Vec<ForecastPoint>,
}

/// Run the full pipeline for one ticker and horizon set.
///
/// `job_key` scopes RNG sub-seeds and observer events to this run.
/// The horizon slice must be non-empty, sorted, and deduplicated
/// (`parse_horizons` guarantees this for wire input).
pub fn run_forecast(
    job_key: &str,
    ticker: &str,
    horizons: &[Horizon],
    ctx: &PipelineContext,
    config: &PipelineConfig,
    observer: &dyn PipelineObserver,
) -> Result<ForecastOutcome, PipelineError> {
    if horizons.is_empty() {
        return Err(PipelineError::Computation {
            stage: Stage::Internal,
            detail: "no horizons requested".into(),
        });
    }
    let rng = RngHierarchy::new(config.seed);
    let today = chrono::Local::now().date_naive();

    // 1. Market data
    observer.stage_started(job_key, Stage::FetchData);
    let series = load_history(ticker, ctx.cache, ctx.provider, today)?;
    let (context, context_errors) = MarketContext::fetch(
        ctx.provider,
        series.dates()[0],
        series.last_date(),
    );
    for e in &context_errors {
        observer.stage_warning(job_key, Stage::FetchData, &e.to_string());
    }
    if context.is_none() {
        observer.stage_warning(
            job_key,
            Stage::FetchData,
            "market context unavailable, continuing on indicator-only schema",
        );
    }
    observer.stage_finished(job_key, Stage::FetchData);

    // 2. Features
    observer.stage_started(job_key, Stage::BuildFeatures);
    let frame = build_features(&series, context.as_ref(), &config.features)?;
    observer.stage_finished(job_key, Stage::BuildFeatures);

    // 3. Trend model, fit on the warmup-trimmed frame
    observer.stage_started(job_key, Stage::FitTrend);
    let trend = TrendModel::fit(&frame.dates, &frame.closes, &config.trend)
        .map_err(|e| model_error(Stage::FitTrend, e))?;
    observer.stage_finished(job_key, Stage::FitTrend);

    // 4. Residual model on trend residuals
    observer.stage_started(job_key, Stage::TrainResidual);
    let residuals = trend.residuals(&frame.dates, &frame.closes);
    let mut residual_rng = rng.rng_for(job_key, "residual-init", 0);
    let residual_model =
        ResidualModel::train(&frame, &residuals, &config.residual, &mut residual_rng)
            .map_err(|e| model_error(Stage::TrainResidual, e))?;
    observer.stage_finished(job_key, Stage::TrainResidual);

    // 5. Blend per horizon, one rollout covering the longest request
    observer.stage_started(job_key, Stage::Blend);
    let last_close = series.last_close();
    let max_days = horizons.iter().map(|h| h.trading_days()).max().unwrap();
    let rollout = residual_model
        .rollout(&frame, last_close, max_days)
        .map_err(|e| model_error(Stage::Blend, e))?;

    let mut forecasts = Vec::with_capacity(horizons.len());
    for &horizon in horizons {
        let days = horizon.trading_days();
        let trend_fc = trend
            .forecast_at(days)
            .map_err(|e| model_error(Stage::Blend, e))?;
        let residual_fc = ResidualForecast {
            steps: rollout.steps[..days].to_vec(),
            step_rmse: rollout.step_rmse,
        };
        let blended = blend_horizon(&config.blend, horizon, &trend_fc, &residual_fc, last_close)
            .map_err(|e| model_error(Stage::Blend, e))?;
        forecasts.push(blended);
    }
    let mut forecasts = assemble_forecasts(forecasts);
    observer.stage_finished(job_key, Stage::Blend);

    // 6. Scenario bands for long horizons
    if forecasts
        .iter()
        .any(|f| f.horizon.trading_days() >= config.scenario.threshold_days)
    {
        observer.stage_started(job_key, Stage::Scenario);
        let params = calibrate_gbm(&series.log_returns(), last_close, &config.scenario)
            .map_err(|e| model_error(Stage::Scenario, e))?;
        for fc in &mut forecasts {
            let days = fc.horizon.trading_days();
            if days >= config.scenario.threshold_days {
                let key = format!("{job_key}/{}", fc.horizon);
                let band = simulate_scenarios(&params, days, &config.scenario, &rng, &key);
                widen_with_scenarios(fc, band);
            }
        }
        observer.stage_finished(job_key, Stage::Scenario);
    }

    // Final numeric sanity gate: nothing non-finite leaves the pipeline
    for fc in &forecasts {
        if !fc.is_well_formed() {
            return Err(PipelineError::Computation {
                stage: Stage::Blend,
                detail: format!("malformed forecast at horizon {}", fc.horizon),
            });
        }
        if let Some(band) = &fc.monte_carlo {
            if !band.is_ordered() {
                return Err(PipelineError::Computation {
                    stage: Stage::Scenario,
                    detail: format!("unordered scenario band at horizon {}", fc.horizon),
                });
            }
        }
    }

    // 7. Daily charting series over the longest horizon
    let forecast_timeseries: Vec<ForecastPoint> = trend
        .forecast_path(max_days)
        .into_iter()
        .take(FORECAST_TIMESERIES_CAP)
        .map(|p| ForecastPoint {
            date: p.date,
            value: p.point,
            lower: p.lower,
            upper: p.upper,
        })
        .collect();

    Ok(ForecastOutcome {
        results: forecasts,
        forecast_timeseries,
    })
}
