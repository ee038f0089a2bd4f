//! Prediction job record and its state machine.
//!
//! States: `pending → running → {completed, failed}`. Terminal states are
//! absorbing. There is no pending→failed shortcut: a job is always marked
//! in-flight before any terminal state, so a poller seeing `pending` knows
//! the pipeline has not started, not that the job was lost.

use chrono::NaiveDateTime;
use farsight_core::domain::{EnsembleForecast, ForecastPoint, Horizon};
use serde::{Deserialize, Serialize};

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether the state machine allows `self → to`.
    pub fn can_transition(&self, to: JobStatus) -> bool {
        matches!(
            (self, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Operator-facing failure record. Never included in the client projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stable error kind tag (e.g. "data_unavailable").
    pub kind: String,
    /// Pipeline stage the failure is attributed to.
    pub stage: String,
    pub detail: String,
}

/// The persisted job document.
///
/// Mutated only through the store's guarded transitions; results are written
/// exactly once per job id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionJob {
    pub id: String,
    pub ticker: String,
    pub horizons: Vec<Horizon>,
    pub status: JobStatus,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
    /// One entry per requested horizon, ascending, populated on completion.
    #[serde(default)]
    pub results: Vec<EnsembleForecast>,
    #[serde(default)]
    pub forecast_timeseries: Vec<ForecastPoint>,
    /// Internal failure detail; stripped from the client view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

impl PredictionJob {
    /// A fresh pending job.
    pub fn new(
        id: String,
        ticker: String,
        horizons: Vec<Horizon>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            ticker,
            horizons,
            status: JobStatus::Pending,
            created_at,
            completed_at: None,
            results: Vec::new(),
            forecast_timeseries: Vec::new(),
            failure: None,
        }
    }

    /// Client-facing projection: raw internal error detail never leaks.
    pub fn view(&self) -> JobView {
        JobView {
            id: self.id.clone(),
            ticker: self.ticker.clone(),
            horizons: self.horizons.clone(),
            status: self.status,
            created_at: self.created_at,
            completed_at: self.completed_at,
            results: self.results.clone(),
            forecast_timeseries: self.forecast_timeseries.clone(),
        }
    }
}

/// What a polling client sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub ticker: String,
    pub horizons: Vec<Horizon>,
    pub status: JobStatus,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub results: Vec<EnsembleForecast>,
    #[serde(default)]
    pub forecast_timeseries: Vec<ForecastPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> PredictionJob {
        PredictionJob::new(
            "job-1".into(),
            "SPY".into(),
            vec![Horizon::OneMonth],
            chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        )
    }

    #[test]
    fn fresh_job_is_pending() {
        assert_eq!(sample_job().status, JobStatus::Pending);
    }

    #[test]
    fn allowed_transitions() {
        assert!(JobStatus::Pending.can_transition(JobStatus::Running));
        assert!(JobStatus::Running.can_transition(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition(JobStatus::Failed));
    }

    #[test]
    fn forbidden_transitions() {
        // No pending→failed shortcut, and terminals are absorbing
        assert!(!JobStatus::Pending.can_transition(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition(JobStatus::Running));
        assert!(!JobStatus::Completed.can_transition(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition(JobStatus::Running));
        assert!(!JobStatus::Failed.can_transition(JobStatus::Completed));
        assert!(!JobStatus::Running.can_transition(JobStatus::Pending));
    }

    #[test]
    fn terminal_detection() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Failed).unwrap(),
            "\"failed\""
        );
    }

    #[test]
    fn view_strips_failure_detail() {
        let mut job = sample_job();
        job.status = JobStatus::Failed;
        job.failure = Some(FailureRecord {
            kind: "data_unavailable".into(),
            stage: "fetch_data".into(),
            detail: "provider exploded".into(),
        });

        let view_json = serde_json::to_string(&job.view()).unwrap();
        assert!(!view_json.contains("provider exploded"));
        assert!(!view_json.contains("failure"));
        assert!(view_json.contains("\"status\":\"failed\""));
    }
}
