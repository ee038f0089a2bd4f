//! Job persistence behind a narrow key-value contract.
//!
//! The store never assumes multi-key transactions: each job id maps to one
//! independently consistent document. Status changes go through a
//! compare-and-set transition so that at most one dispatch per job id can
//! claim `pending → running`, and results are written exactly once.

use crate::job::{FailureRecord, JobStatus, PredictionJob};
use farsight_core::domain::{EnsembleForecast, ForecastPoint};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Store failures (I/O, serialization, contract violations).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job '{0}' already exists")]
    AlreadyExists(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value job store.
///
/// `transition`, `complete`, and `fail` are compare-and-set operations:
/// they return `Ok(false)` when the current status does not match the
/// expected source state, and never partially apply.
pub trait JobStore: Send + Sync {
    /// Persist a new job document. Fails if the id already exists.
    fn create(&self, job: &PredictionJob) -> Result<(), StoreError>;

    /// Load a job document by id.
    fn get(&self, id: &str) -> Result<Option<PredictionJob>, StoreError>;

    /// CAS: `from → to` if the job is currently in `from` and the state
    /// machine allows it.
    fn transition(&self, id: &str, from: JobStatus, to: JobStatus) -> Result<bool, StoreError>;

    /// Atomically write results and move `running → completed`.
    /// Returns false (writing nothing) unless the job is currently running.
    fn complete(
        &self,
        id: &str,
        results: Vec<EnsembleForecast>,
        forecast_timeseries: Vec<ForecastPoint>,
        completed_at: chrono::NaiveDateTime,
    ) -> Result<bool, StoreError>;

    /// Atomically record a failure and move `running → failed`.
    fn fail(
        &self,
        id: &str,
        failure: FailureRecord,
        failed_at: chrono::NaiveDateTime,
    ) -> Result<bool, StoreError>;
}

// ── In-memory store ─────────────────────────────────────────────────

/// HashMap-backed store for tests and embedded use.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, PredictionJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, job: &PredictionJob) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PredictionJob>, StoreError> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }

    fn transition(&self, id: &str, from: JobStatus, to: JobStatus) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(id) {
            Some(job) if job.status == from && from.can_transition(to) => {
                job.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn complete(
        &self,
        id: &str,
        results: Vec<EnsembleForecast>,
        forecast_timeseries: Vec<ForecastPoint>,
        completed_at: chrono::NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Running => {
                job.status = JobStatus::Completed;
                job.results = results;
                job.forecast_timeseries = forecast_timeseries;
                job.completed_at = Some(completed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn fail(
        &self,
        id: &str,
        failure: FailureRecord,
        failed_at: chrono::NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(id) {
            Some(job) if job.status == JobStatus::Running => {
                job.status = JobStatus::Failed;
                job.failure = Some(failure);
                job.completed_at = Some(failed_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ── JSON document store ─────────────────────────────────────────────

/// One JSON document per job id under a directory, written atomically
/// (tmp then rename). A process-wide mutex serializes read-modify-write
/// cycles; cross-process single-dispatch is the orchestrator's contract.
pub struct JsonJobStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn job_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read(&self, id: &str) -> Result<Option<PredictionJob>, StoreError> {
        let path = self.job_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write(&self, job: &PredictionJob) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.job_path(&job.id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(job)?)?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io(e)
        })?;
        Ok(())
    }

    /// Apply a guarded mutation under the write lock.
    fn update<F>(&self, id: &str, mutate: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut PredictionJob) -> bool,
    {
        let _guard = self.write_lock.lock().unwrap();
        let Some(mut job) = self.read(id)? else {
            return Ok(false);
        };
        if !mutate(&mut job) {
            return Ok(false);
        }
        self.write(&job)?;
        Ok(true)
    }
}

impl JobStore for JsonJobStore {
    fn create(&self, job: &PredictionJob) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap();
        if self.job_path(&job.id).exists() {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }
        self.write(job)
    }

    fn get(&self, id: &str) -> Result<Option<PredictionJob>, StoreError> {
        self.read(id)
    }

    fn transition(&self, id: &str, from: JobStatus, to: JobStatus) -> Result<bool, StoreError> {
        self.update(id, |job| {
            if job.status == from && from.can_transition(to) {
                job.status = to;
                true
            } else {
                false
            }
        })
    }

    fn complete(
        &self,
        id: &str,
        results: Vec<EnsembleForecast>,
        forecast_timeseries: Vec<ForecastPoint>,
        completed_at: chrono::NaiveDateTime,
    ) -> Result<bool, StoreError> {
        self.update(id, |job| {
            if job.status != JobStatus::Running {
                return false;
            }
            job.status = JobStatus::Completed;
            job.results = results;
            job.forecast_timeseries = forecast_timeseries;
            job.completed_at = Some(completed_at);
            true
        })
    }

    fn fail(
        &self,
        id: &str,
        failure: FailureRecord,
        failed_at: chrono::NaiveDateTime,
    ) -> Result<bool, StoreError> {
        self.update(id, |job| {
            if job.status != JobStatus::Running {
                return false;
            }
            job.status = JobStatus::Failed;
            job.failure = Some(failure);
            job.completed_at = Some(failed_at);
            true
        })
    }
}
