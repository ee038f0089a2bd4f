//! Farsight Runner — forecast pipeline orchestration.
//!
//! This crate builds on `farsight-core` to provide:
//! - The end-to-end forecast pipeline with per-stage error attribution
//! - The prediction job record and its state machine
//! - Job stores (in-memory and JSON-document) with compare-and-set
//!   transitions
//! - The orchestrator: background dispatch, at-most-once execution per job
//!   id, and polling-based status
//! - TOML pipeline configuration

pub mod config;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod store;

pub use config::{ConfigError, DataConfig, PipelineConfig};
pub use job::{FailureRecord, JobStatus, JobView, PredictionJob};
pub use orchestrator::{JobRequest, Orchestrator, OrchestratorError};
pub use pipeline::{
    run_forecast, ForecastOutcome, PipelineContext, PipelineError, PipelineObserver,
    SilentObserver, Stage, StderrObserver, FORECAST_TIMESERIES_CAP,
};
pub use store::{JobStore, JsonJobStore, MemoryJobStore, StoreError};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn job_types_are_send_sync() {
        assert_send::<PredictionJob>();
        assert_sync::<PredictionJob>();
        assert_send::<JobView>();
        assert_sync::<JobView>();
        assert_send::<JobStatus>();
        assert_sync::<JobStatus>();
    }

    #[test]
    fn stores_are_send_sync() {
        assert_send::<MemoryJobStore>();
        assert_sync::<MemoryJobStore>();
        assert_send::<JsonJobStore>();
        assert_sync::<JsonJobStore>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<PipelineConfig>();
        assert_sync::<PipelineConfig>();
    }

    #[test]
    fn outcome_is_send_sync() {
        assert_send::<ForecastOutcome>();
        assert_sync::<ForecastOutcome>();
    }
}
