//! Analysis workflow: Input → Scanning → Verdict.
//!
//! Submitting text starts two activities that race each other: a progress
//! simulator ticking towards a ceiling below 100, and the real prediction
//! request. The request alone decides when the phase ends. On success the
//! simulator is stopped, progress jumps to 100, and after a short pause the
//! verdict is shown. On failure the workflow returns to Input.
//!
//! Every exit from Scanning (success, failure, reset, or the submitting
//! future being dropped) stops the simulator. A generation counter makes
//! sure a stale simulator tick or a stale response never touches a newer
//! phase.

use crate::models::{
    AnalysisResult, FlagAck, FlagRequest, PredictRequest, PredictResponse, PredictionHistory,
    PredictionLog, Verdict, clamp_percentage,
};
use crate::services::api_client::{ApiClient, RequestFailure, RequestOptions};
use crate::services::session::SessionManager;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const PREDICT_PATH: &str = "/api/predict";
pub const HISTORY_PATH: &str = "/api/my-predictions";
pub const FLAG_PATH: &str = "/api/flag";

/// Progress value reserved for real completion
pub const COMPLETE: f64 = 100.0;

/// Highest ceiling the simulator may be configured with
pub const MAX_SCAN_CEILING: f64 = 99.0;

/// Longest posting accepted by the prediction endpoint
pub const MAX_JOB_TEXT_CHARS: usize = 50_000;

/// Reason sent when flagging without one
pub const DEFAULT_FLAG_REASON: &str = "Flagged by user review";

/// Timing of the scanning phase
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Interval between simulated progress ticks
    pub scan_interval: Duration,

    /// Upper bound of the random increment per tick
    pub max_increment: f64,

    /// Progress at which the simulator stops and holds
    pub ceiling: f64,

    /// Pause between the response arriving and the verdict being shown
    pub verdict_pause: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(120),
            max_increment: 15.0,
            ceiling: 95.0,
            verdict_pause: Duration::from_millis(600),
        }
    }
}

/// Phase of the workflow. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Input,
    Scanning,
    Verdict,
}

/// Everything a renderer needs to draw the current phase
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub progress: f64,
    pub job_text: String,
    pub result: Option<AnalysisResult>,
}

/// Errors reported to the caller of a workflow operation
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Request(#[from] RequestFailure),

    #[error("Invalid job text: {0}")]
    InvalidInput(String),

    #[error("Flagging is not available: {0}")]
    FlagUnavailable(&'static str),
}

impl WorkflowError {
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Request(failure) => failure.user_message(),
            WorkflowError::InvalidInput(msg) => msg.clone(),
            WorkflowError::FlagUnavailable(reason) => format!("Cannot flag this result: {reason}"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: WorkflowState,
    job_text: String,
    result: Option<AnalysisResult>,
    simulator: Option<AbortHandle>,
    history_task: Option<JoinHandle<()>>,
}

/// Last fetched history, tagged with the token it was fetched under
#[derive(Debug, Default)]
struct HistoryCache {
    token: Option<String>,
    entries: Vec<PredictionLog>,
}

/// The analysis state machine, bound to a session
pub struct AnalysisWorkflow {
    session: Arc<SessionManager>,
    config: WorkflowConfig,
    inner: Mutex<Inner>,
    history: Arc<Mutex<HistoryCache>>,
    progress: Arc<watch::Sender<f64>>,
    generation: Arc<AtomicU64>,
}

impl AnalysisWorkflow {
    pub fn new(session: Arc<SessionManager>, config: WorkflowConfig) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            session,
            config,
            inner: Mutex::new(Inner {
                state: WorkflowState::Input,
                job_text: String::new(),
                result: None,
                simulator: None,
                history_task: None,
            }),
            history: Arc::new(Mutex::new(HistoryCache::default())),
            progress: Arc::new(progress),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn state(&self) -> WorkflowState {
        self.lock().state
    }

    /// Current progress, clamped to `[0, 100]`
    pub fn progress(&self) -> f64 {
        clamp_percentage(*self.progress.borrow())
    }

    /// Watch progress updates
    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    pub fn result(&self) -> Option<AnalysisResult> {
        self.lock().result.clone()
    }

    pub fn job_text(&self) -> String {
        self.lock().job_text.clone()
    }

    /// Predictions fetched by the last successful history refresh.
    ///
    /// Empty once the session that fetched them has ended.
    pub fn history(&self) -> Vec<PredictionLog> {
        let token = self.session.token();
        let cache = lock_history(&self.history);
        if token.is_some() && cache.token == token {
            cache.entries.clone()
        } else {
            Vec::new()
        }
    }

    /// Wait for the history refresh started by the last verdict, if one is
    /// still running
    pub async fn history_settled(&self) {
        let task = self.lock().history_task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(error = %e, "History refresh panicked");
                }
            }
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let inner = self.lock();
        WorkflowSnapshot {
            state: inner.state,
            progress: self.progress(),
            job_text: inner.job_text.clone(),
            result: inner.result.clone(),
        }
    }

    /// Analyze a job posting.
    ///
    /// Blank text, or a call while a scan or verdict is active, is a no-op
    /// returning `Ok(None)`. A discarded run (reset during the scan) also
    /// yields `Ok(None)`. A failed request returns the workflow to Input and
    /// the failure to the caller.
    ///
    /// When signed in, the history refresh runs in the background once the
    /// verdict is shown; [`AnalysisWorkflow::history_settled`] waits for it.
    pub async fn submit(&self, job_text: &str) -> Result<Option<AnalysisResult>, WorkflowError> {
        if job_text.trim().is_empty() {
            debug!("Ignoring blank submission");
            return Ok(None);
        }

        let mut phase = {
            let mut inner = self.lock();
            if inner.state != WorkflowState::Input {
                debug!(state = ?inner.state, "Ignoring submission outside the input phase");
                return Ok(None);
            }

            let chars = job_text.chars().count();
            if chars > MAX_JOB_TEXT_CHARS {
                return Err(WorkflowError::InvalidInput(format!(
                    "Job text is too long ({chars} characters, maximum {MAX_JOB_TEXT_CHARS})"
                )));
            }

            if let Some(task) = inner.history_task.take() {
                task.abort();
            }

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            inner.state = WorkflowState::Scanning;
            inner.job_text = job_text.to_string();
            inner.result = None;
            self.progress.send_replace(0.0);

            let simulator = spawn_progress_simulator(
                self.progress.clone(),
                self.generation.clone(),
                generation,
                self.config.clone(),
            );
            inner.simulator = Some(simulator.abort_handle());

            ScanPhase {
                workflow: self,
                generation,
                simulator: Some(simulator),
            }
        };

        info!(
            chars = job_text.chars().count(),
            authenticated = self.session.is_authenticated(),
            "Scanning job posting"
        );

        let outcome = self.request_prediction(job_text).await;
        phase.stop_simulator().await;

        let result = match outcome {
            Ok(result) => result,
            Err(failure) => {
                warn!(error = %failure, "Analysis failed, returning to input");
                self.update_scan(phase.generation, |inner| {
                    inner.state = WorkflowState::Input;
                    self.progress.send_replace(0.0);
                });
                return Err(failure.into());
            }
        };

        let completed = self.update_scan(phase.generation, |_| {
            self.progress.send_replace(COMPLETE);
        });
        if !completed {
            debug!(prediction_id = result.prediction_id, "Discarding result of a reset scan");
            return Ok(None);
        }
        tokio::time::sleep(self.config.verdict_pause).await;

        let shown = self.update_scan(phase.generation, |inner| {
            inner.result = Some(result.clone());
            inner.state = WorkflowState::Verdict;
        });
        if !shown {
            debug!(prediction_id = result.prediction_id, "Discarding result of a reset scan");
            return Ok(None);
        }

        info!(
            prediction_id = result.prediction_id,
            verdict = %result.verdict,
            confidence = result.confidence,
            "Verdict ready"
        );

        if self.session.is_authenticated() {
            self.spawn_history_refresh();
        }
        Ok(Some(result))
    }

    /// Return to Input, clearing result, text and progress. Safe from any
    /// state and safe to repeat; an active scan is abandoned.
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(simulator) = inner.simulator.take() {
            simulator.abort();
        }
        if let Some(task) = inner.history_task.take() {
            task.abort();
        }
        inner.state = WorkflowState::Input;
        inner.result = None;
        inner.job_text.clear();
        self.progress.send_replace(0.0);
        debug!("Workflow reset");
    }

    /// Whether the flag action is offered for the current verdict
    pub fn can_flag(&self) -> bool {
        self.flag_target().is_ok()
    }

    /// Report the current fraudulent verdict for review.
    ///
    /// The outcome is returned to the caller; workflow state never changes.
    pub async fn flag(&self, reason: &str) -> Result<FlagAck, WorkflowError> {
        let prediction_id = self.flag_target().map_err(WorkflowError::FlagUnavailable)?;
        let reason = if reason.trim().is_empty() {
            DEFAULT_FLAG_REASON.to_string()
        } else {
            reason.trim().to_string()
        };

        let options = RequestOptions::post(&FlagRequest { prediction_id, reason })?;
        let response = self.session.authorized_fetch(FLAG_PATH, options).await?;
        if !response.status().is_success() {
            let failure = ApiClient::failure(response).await;
            warn!(prediction_id, error = %failure, "Flagging failed");
            return Err(failure.into());
        }

        let body = response.text().await.map_err(RequestFailure::Network)?;
        let ack = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
        info!(prediction_id, "Prediction flagged for review");
        Ok(FlagAck(ack))
    }

    /// Fetch the signed-in user's recent predictions.
    ///
    /// Failures are logged and swallowed; the previous history is kept.
    /// Without a session the cached history is dropped.
    pub async fn refresh_history(&self) {
        load_history(&self.session, &self.history).await;
    }

    /// Refresh history in the background so the verdict is not held up.
    /// A refresh still running from an earlier verdict is cancelled.
    fn spawn_history_refresh(&self) {
        let session = self.session.clone();
        let cache = self.history.clone();
        let task = tokio::spawn(async move {
            load_history(&session, &cache).await;
        });
        if let Some(previous) = self.lock().history_task.replace(task) {
            previous.abort();
        }
    }

    async fn request_prediction(&self, job_text: &str) -> Result<AnalysisResult, RequestFailure> {
        let options = RequestOptions::post(&PredictRequest {
            job_text: job_text.to_string(),
        })?;
        let response = self.session.authorized_fetch(PREDICT_PATH, options).await?;
        let body: PredictResponse = ApiClient::json(response).await?;
        Ok(body.into())
    }

    fn flag_target(&self) -> Result<i64, &'static str> {
        let inner = self.lock();
        if inner.state != WorkflowState::Verdict {
            return Err("no verdict is shown");
        }
        let Some(result) = inner.result.as_ref() else {
            return Err("no verdict is shown");
        };
        if result.verdict != Verdict::Fraudulent {
            return Err("only fraudulent verdicts can be flagged");
        }
        if !self.session.is_authenticated() {
            return Err("sign in to flag postings");
        }
        Ok(result.prediction_id)
    }

    /// Apply `update` under the lock if scan `generation` is still the
    /// active one. Returns whether it was applied.
    fn update_scan(&self, generation: u64, update: impl FnOnce(&mut Inner)) -> bool {
        let mut inner = self.lock();
        let current = self.generation.load(Ordering::SeqCst) == generation;
        if !current || inner.state != WorkflowState::Scanning {
            return false;
        }
        update(&mut *inner);
        if inner.state != WorkflowState::Scanning {
            inner.simulator = None;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn load_history(session: &SessionManager, cache: &Mutex<HistoryCache>) {
    let Some(token) = session.token() else {
        debug!("Skipping history refresh without a session");
        *lock_history(cache) = HistoryCache::default();
        return;
    };

    let fetched = match session.authorized_fetch(HISTORY_PATH, RequestOptions::get()).await {
        Ok(response) => ApiClient::json::<PredictionHistory>(response).await,
        Err(failure) => Err(failure),
    };

    match fetched {
        Ok(history) => {
            // Signed out or switched user while the request was in flight
            if session.token().as_deref() != Some(token.as_str()) {
                debug!("Discarding history fetched for an ended session");
                return;
            }
            debug!(entries = history.predictions.len(), "History refreshed");
            *lock_history(cache) = HistoryCache {
                token: Some(token),
                entries: history.predictions,
            };
        }
        Err(failure) => warn!(error = %failure, "Failed to refresh history"),
    }
}

fn lock_history(cache: &Mutex<HistoryCache>) -> MutexGuard<'_, HistoryCache> {
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the simulator for one scan. Dropping it stops the simulator and,
/// if the scan never finished, puts the workflow back to Input.
struct ScanPhase<'a> {
    workflow: &'a AnalysisWorkflow,
    generation: u64,
    simulator: Option<JoinHandle<()>>,
}

impl ScanPhase<'_> {
    async fn stop_simulator(&mut self) {
        if let Some(simulator) = self.simulator.take() {
            simulator.abort();
            // Wait until the task is gone so no tick lands after this point
            if let Err(e) = simulator.await {
                if e.is_panic() {
                    warn!(error = %e, "Progress simulator panicked");
                }
            }
        }
    }
}

impl Drop for ScanPhase<'_> {
    fn drop(&mut self) {
        if let Some(simulator) = self.simulator.take() {
            simulator.abort();
        }
        let workflow = self.workflow;
        let abandoned = workflow.update_scan(self.generation, |inner| {
            inner.state = WorkflowState::Input;
            workflow.progress.send_replace(0.0);
        });
        if abandoned {
            warn!("Scan abandoned before completion");
        }
    }
}

/// Spawn the progress simulator for scan `generation`.
///
/// Each tick adds a random increment, never passing `config.ceiling`; once
/// the ceiling is reached the task ends and progress holds there. Ticks
/// belonging to a superseded generation are ignored. Non-finite or
/// non-positive settings fall back to the defaults.
fn spawn_progress_simulator(
    progress: Arc<watch::Sender<f64>>,
    current: Arc<AtomicU64>,
    generation: u64,
    config: WorkflowConfig,
) -> JoinHandle<()> {
    let defaults = WorkflowConfig::default();
    let ceiling = if config.ceiling.is_finite() {
        config.ceiling.clamp(0.0, MAX_SCAN_CEILING)
    } else {
        defaults.ceiling
    };
    let max_increment = if config.max_increment.is_finite() && config.max_increment > 0.0 {
        config.max_increment
    } else {
        defaults.max_increment
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.scan_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let step = rand::rng().random_range(0.0..max_increment);

            let mut held = false;
            progress.send_if_modified(|value| {
                if current.load(Ordering::SeqCst) != generation {
                    held = true;
                    return false;
                }
                if *value >= ceiling {
                    held = true;
                    return false;
                }
                *value = (*value + step).min(ceiling);
                held = *value >= ceiling;
                true
            });

            if held {
                break;
            }
        }
    })
}
