//! Prediction job orchestrator.
//!
//! Job creation and pipeline execution are decoupled: `submit` persists a
//! pending record and returns the job id immediately; a background worker
//! thread claims the job (compare-and-set pending→running, so at most one
//! execution per id), runs the pipeline, and lands the record in exactly one
//! terminal state. Polling `status` is the only observation mechanism —
//! there is deliberately no blocking wait or callback in the contract.
//!
//! Cancellation is not supported once a job is running.

use crate::config::PipelineConfig;
use crate::job::{FailureRecord, JobStatus, JobView, PredictionJob};
use crate::pipeline::{run_forecast, PipelineContext, PipelineObserver, SilentObserver, Stage};
use crate::store::{JobStore, StoreError};
use farsight_core::data::{MarketDataProvider, PriceCache};
use farsight_core::domain::{parse_horizons, Horizon};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Orchestrator-level errors. Pipeline errors never surface here — they are
/// recorded on the failed job document instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("dispatch failed: worker is not running")]
    Dispatch,
}

/// Inbound job request: ticker plus horizon labels from the fixed
/// vocabulary.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub ticker: String,
    pub horizons: Vec<String>,
}

struct DispatchMsg {
    job_id: String,
    ticker: String,
    horizons: Vec<Horizon>,
}

/// Owns the worker thread and the store handle.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    tx: Option<Sender<DispatchMsg>>,
    handle: Option<JoinHandle<()>>,
}

impl Orchestrator {
    /// Spawn the orchestrator with its background worker.
    pub fn new(
        store: Arc<dyn JobStore>,
        provider: Arc<dyn MarketDataProvider>,
        cache: Arc<PriceCache>,
        config: PipelineConfig,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let worker_store = Arc::clone(&store);

        let handle = std::thread::Builder::new()
            .name("farsight-worker".into())
            .spawn(move || {
                worker_loop(rx, worker_store, provider, cache, config, observer);
            })
            .expect("failed to spawn worker thread");

        Self {
            store,
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Convenience constructor with a silent observer.
    pub fn with_silent_observer(
        store: Arc<dyn JobStore>,
        provider: Arc<dyn MarketDataProvider>,
        cache: Arc<PriceCache>,
        config: PipelineConfig,
    ) -> Self {
        Self::new(store, provider, cache, config, Arc::new(SilentObserver))
    }

    /// Create a job and hand it to the worker. Returns the job id as soon
    /// as the pending record is persisted.
    pub fn submit(&self, request: JobRequest) -> Result<String, OrchestratorError> {
        let ticker = request.ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(OrchestratorError::InvalidRequest("empty ticker".into()));
        }
        let horizons = parse_horizons(&request.horizons)
            .map_err(|e| OrchestratorError::InvalidRequest(e.to_string()))?;
        if horizons.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "no horizons requested".into(),
            ));
        }

        let id = new_job_id(&ticker);
        let job = PredictionJob::new(
            id.clone(),
            ticker.clone(),
            horizons.clone(),
            chrono::Local::now().naive_local(),
        );
        self.store.create(&job)?;

        let msg = DispatchMsg {
            job_id: id.clone(),
            ticker,
            horizons,
        };
        self.tx
            .as_ref()
            .ok_or(OrchestratorError::Dispatch)?
            .send(msg)
            .map_err(|_| OrchestratorError::Dispatch)?;

        Ok(id)
    }

    /// Current job projection, if the id exists.
    pub fn status(&self, id: &str) -> Result<Option<JobView>, OrchestratorError> {
        Ok(self.store.get(id)?.map(|job| job.view()))
    }

    /// Poll until the job reaches a terminal state or the timeout elapses.
    ///
    /// Purely a poller convenience over `status` — the orchestrator itself
    /// never pushes completion.
    pub fn poll_until_terminal(
        &self,
        id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<Option<JobView>, OrchestratorError> {
        let deadline = Instant::now() + timeout;
        loop {
            let view = self.status(id)?;
            match &view {
                Some(v) if v.status.is_terminal() => return Ok(view),
                None => return Ok(None),
                _ => {}
            }
            if Instant::now() >= deadline {
                return Ok(view);
            }
            std::thread::sleep(interval);
        }
    }

    /// Stop accepting work and wait for the worker to drain.
    pub fn shutdown(mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    rx: Receiver<DispatchMsg>,
    store: Arc<dyn JobStore>,
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<PriceCache>,
    config: PipelineConfig,
    observer: Arc<dyn PipelineObserver>,
) {
    while let Ok(msg) = rx.recv() {
        handle_dispatch(msg, &*store, &*provider, &cache, &config, &*observer);
    }
}

fn handle_dispatch(
    msg: DispatchMsg,
    store: &dyn JobStore,
    provider: &dyn MarketDataProvider,
    cache: &PriceCache,
    config: &PipelineConfig,
    observer: &dyn PipelineObserver,
) {
    let id = msg.job_id;

    // At-most-one execution per job id: only the claimant proceeds.
    match store.transition(&id, JobStatus::Pending, JobStatus::Running) {
        Ok(true) => {}
        Ok(false) => return,
        Err(e) => {
            eprintln!("[{id}] failed to claim job: {e}");
            return;
        }
    }

    let ctx = PipelineContext { provider, cache };
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        run_forecast(&id, &msg.ticker, &msg.horizons, &ctx, config, observer)
    }));

    let now = chrono::Local::now().naive_local();
    let result = match outcome {
        Ok(Ok(outcome)) => store.complete(&id, outcome.results, outcome.forecast_timeseries, now),
        Ok(Err(e)) => {
            observer.stage_warning(&id, e.stage(), &e.to_string());
            store.fail(
                &id,
                FailureRecord {
                    kind: e.kind().to_string(),
                    stage: e.stage().to_string(),
                    detail: e.to_string(),
                },
                now,
            )
        }
        Err(_panic) => store.fail(
            &id,
            FailureRecord {
                kind: "computation_error".to_string(),
                stage: Stage::Internal.to_string(),
                detail: "pipeline panicked".to_string(),
            },
            now,
        ),
    };

    match result {
        Ok(true) => {}
        Ok(false) => eprintln!("[{id}] terminal write skipped: job no longer running"),
        Err(e) => eprintln!("[{id}] failed to persist terminal state: {e}"),
    }
}

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Collision-free job id: hash of ticker, wall clock, process id, and a
/// process-local counter.
fn new_job_id(ticker: &str) -> String {
    let n = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(ticker.as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&n.to_le_bytes());
    hasher.finalize().to_hex()[..32].to_string()
}
