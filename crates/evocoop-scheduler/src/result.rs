//! The aggregation root shared by all runs of one simulation.
//!
//! A [`SimulationResult`] is handed back as soon as a simulation is
//! submitted. Worker tasks append their [`IterationResult`]s to it as runs
//! complete, in completion order. Appends and counter updates happen under
//! the state lock, so every [`Progress`] is consistent. Observer calls are
//! serialized by a separate notification lock and run after the state lock
//! is released, so an observer may query or cancel the simulation it is
//! watching.
//!
//! Once the status leaves [`SimulationStatus::Running`] the result is
//! frozen: results from runs that finish after a cancellation are
//! discarded.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use evocoop_core::{FailureCause, IterationResult};
use evocoop_types::SimulationId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle status of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationStatus {
    /// Runs are pending or executing.
    Running,
    /// Every run completed or failed.
    Finished,
    /// The simulation was canceled.
    Canceled,
}

impl SimulationStatus {
    /// Whether the status is final.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Point-in-time view of a simulation handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// The simulation this progress belongs to.
    pub simulation: SimulationId,
    /// Status after the triggering event.
    pub status: SimulationStatus,
    /// Runs completed or failed so far.
    pub finished: usize,
    /// Runs failed so far.
    pub failed: usize,
    /// Total runs of the simulation.
    pub total: usize,
    /// Configuration index of the run that triggered the event.
    pub configuration_index: Option<usize>,
}

/// Called with every successfully finished run.
pub type IterationObserver = Arc<dyn Fn(&Progress, &IterationResult) + Send + Sync>;

/// Called with the cause of every failed run.
pub type ExceptionObserver = Arc<dyn Fn(&Progress, &FailureCause) + Send + Sync>;

/// Observers collected before a simulation is submitted.
///
/// Passing them to [`RunScheduler::submit_with`](crate::RunScheduler::submit_with)
/// installs them before the first run is dispatched, so no event is missed.
#[derive(Clone, Default)]
pub struct Observers {
    iteration: Vec<IterationObserver>,
    exception: Vec<ExceptionObserver>,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("iteration", &self.iteration.len())
            .field("exception", &self.exception.len())
            .finish()
    }
}

impl Observers {
    /// An empty observer set.
    pub const fn new() -> Self {
        Self {
            iteration: Vec::new(),
            exception: Vec::new(),
        }
    }

    /// Add an observer for finished runs.
    #[must_use]
    pub fn on_iteration_finished<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Progress, &IterationResult) + Send + Sync + 'static,
    {
        self.iteration.push(Arc::new(observer));
        self
    }

    /// Add an observer for failed runs.
    #[must_use]
    pub fn on_exception<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Progress, &FailureCause) + Send + Sync + 'static,
    {
        self.exception.push(Arc::new(observer));
        self
    }

    fn wants(&self, result: &IterationResult) -> bool {
        if result.failure.is_some() {
            !self.exception.is_empty()
        } else {
            !self.iteration.is_empty()
        }
    }
}

/// Whether an iteration result was kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Appended to the results.
    Recorded,
    /// Dropped because the simulation had already ended.
    Discarded,
}

struct ResultState {
    status: SimulationStatus,
    results: BTreeMap<usize, Vec<IterationResult>>,
    finished: usize,
    failed: usize,
    finished_at: Option<DateTime<Utc>>,
}

/// Shared, lock-protected record of one submitted simulation.
pub struct SimulationResult {
    id: SimulationId,
    total: usize,
    base_seed: u64,
    started_at: DateTime<Utc>,
    state: Mutex<ResultState>,
    observers: Mutex<Observers>,
    // Held for the whole of `record`; lock order is `notify` then `state`.
    notify: Mutex<()>,
    status_tx: watch::Sender<SimulationStatus>,
}

impl std::fmt::Debug for SimulationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let progress = self.progress();
        f.debug_struct("SimulationResult")
            .field("id", &self.id)
            .field("status", &progress.status)
            .field("finished", &progress.finished)
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

impl SimulationResult {
    /// Create a running result expecting `total` runs.
    ///
    /// A simulation with no runs is finished immediately.
    pub fn new(total: usize, base_seed: u64) -> Self {
        Self::with_observers(total, base_seed, Observers::new())
    }

    /// Create a running result with `observers` already installed.
    pub fn with_observers(total: usize, base_seed: u64, observers: Observers) -> Self {
        let status = if total == 0 {
            SimulationStatus::Finished
        } else {
            SimulationStatus::Running
        };
        let now = Utc::now();
        let (status_tx, _) = watch::channel(status);
        Self {
            id: SimulationId::new(),
            total,
            base_seed,
            started_at: now,
            state: Mutex::new(ResultState {
                status,
                results: BTreeMap::new(),
                finished: 0,
                failed: 0,
                finished_at: (total == 0).then_some(now),
            }),
            observers: Mutex::new(observers),
            notify: Mutex::new(()),
            status_tx,
        }
    }

    /// Unique id of the simulation.
    pub const fn id(&self) -> SimulationId {
        self.id
    }

    /// Base seed all run seeds were derived from.
    pub const fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Total number of runs.
    pub const fn total(&self) -> usize {
        self.total
    }

    /// When the simulation was accepted.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// When the simulation finished or was canceled.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().finished_at
    }

    /// Current status.
    pub fn status(&self) -> SimulationStatus {
        self.state.lock().status
    }

    /// Current progress counters.
    pub fn progress(&self) -> Progress {
        let state = self.state.lock();
        self.progress_of(&state, None)
    }

    fn progress_of(&self, state: &ResultState, configuration_index: Option<usize>) -> Progress {
        Progress {
            simulation: self.id,
            status: state.status,
            finished: state.finished,
            failed: state.failed,
            total: self.total,
            configuration_index,
        }
    }

    /// Snapshot of all results, keyed by configuration index.
    pub fn results(&self) -> BTreeMap<usize, Vec<IterationResult>> {
        self.state.lock().results.clone()
    }

    /// Results recorded for one configuration, in completion order.
    pub fn configuration_results(&self, index: usize) -> Vec<IterationResult> {
        self.state
            .lock()
            .results
            .get(&index)
            .cloned()
            .unwrap_or_default()
    }

    /// Register an observer for finished runs.
    ///
    /// The observer only sees runs recorded after registration; use
    /// [`Observers`] to be notified of every run. It may call any method of
    /// this result except [`record`](Self::record).
    pub fn on_iteration_finished<F>(&self, observer: F)
    where
        F: Fn(&Progress, &IterationResult) + Send + Sync + 'static,
    {
        self.observers.lock().iteration.push(Arc::new(observer));
    }

    /// Register an observer for failed runs.
    ///
    /// Same rules as [`on_iteration_finished`](Self::on_iteration_finished).
    pub fn on_exception<F>(&self, observer: F)
    where
        F: Fn(&Progress, &FailureCause) + Send + Sync + 'static,
    {
        self.observers.lock().exception.push(Arc::new(observer));
    }

    /// Stop dispatching pending runs and mark the simulation canceled.
    ///
    /// Returns `false` if the simulation had already ended.
    pub fn cancel(&self) -> bool {
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        state.status = SimulationStatus::Canceled;
        state.finished_at = Some(Utc::now());
        self.status_tx.send_replace(SimulationStatus::Canceled);
        info!(
            simulation = %self.id,
            finished = state.finished,
            total = self.total,
            "Simulation canceled"
        );
        true
    }

    /// Whether the simulation was canceled.
    pub fn is_canceled(&self) -> bool {
        self.status() == SimulationStatus::Canceled
    }

    /// Wait until the simulation finishes or is canceled.
    pub async fn wait(&self) -> SimulationStatus {
        let mut rx = self.status_tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close.
        rx.wait_for(|status| status.is_terminal())
            .await
            .map_or_else(|_| self.status(), |status| *status)
    }

    /// Append the result of a run and notify observers.
    ///
    /// Results arriving after the simulation ended are discarded. Observers
    /// run after the state lock is released, one record at a time, and
    /// [`wait`](Self::wait) returns only after the last of them.
    pub fn record(&self, result: IterationResult) -> RecordOutcome {
        let _notify = self.notify.lock();
        let (progress, observed) = {
            let mut state = self.state.lock();
            if state.status.is_terminal() {
                debug!(
                    simulation = %self.id,
                    configuration = result.configuration_index,
                    iteration = result.iteration,
                    status = ?state.status,
                    "Discarding late iteration result"
                );
                return RecordOutcome::Discarded;
            }

            let index = result.configuration_index;
            state.finished = state.finished.saturating_add(1).min(self.total);
            if result.failure.is_some() {
                state.failed = state.failed.saturating_add(1);
            }
            if state.finished >= self.total {
                state.status = SimulationStatus::Finished;
                state.finished_at = Some(Utc::now());
            }

            let progress = self.progress_of(&state, Some(index));
            debug!(
                simulation = %self.id,
                configuration = index,
                iteration = result.iteration,
                finished = state.finished,
                total = self.total,
                "Iteration recorded"
            );
            let observed = self.observers.lock().wants(&result).then(|| result.clone());
            state.results.entry(index).or_default().push(result);
            (progress, observed)
        };

        if let Some(result) = observed {
            self.notify_observers(&progress, &result);
        }

        if progress.status == SimulationStatus::Finished {
            self.status_tx.send_replace(SimulationStatus::Finished);
            info!(
                simulation = %self.id,
                runs = self.total,
                failed = progress.failed,
                "Simulation finished"
            );
        }
        RecordOutcome::Recorded
    }

    fn notify_observers(&self, progress: &Progress, result: &IterationResult) {
        // Snapshot so observers can register further observers.
        let observers = self.observers.lock().clone();
        match &result.failure {
            Some(cause) => {
                for observer in &observers.exception {
                    notify(self.id, || observer(progress, cause));
                }
            }
            None => {
                for observer in &observers.iteration {
                    notify(self.id, || observer(progress, result));
                }
            }
        }
    }
}

fn notify(simulation: SimulationId, call: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!(simulation = %simulation, "Observer panicked");
    }
}
