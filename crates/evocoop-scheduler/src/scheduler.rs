//! Dispatch of independent runs onto a bounded worker pool.
//!
//! [`RunScheduler::submit`] expands a configuration, returns the
//! [`SimulationResult`] handle immediately, and hands the runs to a
//! dispatcher task. The dispatcher waits for a worker permit before each
//! run and executes the run on Tokio's blocking pool, so at most
//! `effective_workers` runs execute at once across all submissions.
//! Cancellation stops the dispatcher before the next run starts; runs
//! already executing are left to finish and their results are discarded.

use std::sync::Arc;

use evocoop_core::configuration::derive_seed;
use evocoop_core::{IterationResult, RunConfiguration, SimulationConfiguration, run_iteration};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::result::{Observers, SimulationResult};

/// One pending run.
#[derive(Debug, Clone)]
struct Job {
    run: Arc<RunConfiguration>,
    iteration: u32,
    seed: u64,
}

impl Job {
    /// Panics inside the run come back as a failed result.
    fn execute(&self) -> IterationResult {
        run_iteration(&self.run, self.iteration, self.seed)
    }
}

/// Executes simulations on a bounded pool of workers.
#[derive(Debug, Clone)]
pub struct RunScheduler {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl RunScheduler {
    /// Create a scheduler sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::WorkerCount`] if the pool would be empty.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let workers = config.effective_workers();
        if workers == 0 {
            return Err(SchedulerError::WorkerCount {
                count: config.worker_count,
            });
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        })
    }

    /// Number of runs allowed to execute at once.
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Accept a simulation and start dispatching its runs.
    ///
    /// Configuration problems are reported here, before anything is
    /// scheduled. Must be called from within a Tokio runtime. Observers
    /// registered on the returned result may miss runs that finish first;
    /// use [`submit_with`](Self::submit_with) to observe every run.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Configuration`] if the configuration cannot
    /// be expanded, and [`SchedulerError::NoRuntime`] outside a runtime.
    pub fn submit(
        &self,
        config: &SimulationConfiguration,
    ) -> Result<Arc<SimulationResult>, SchedulerError> {
        self.submit_with(config, Observers::new())
    }

    /// Like [`submit`](Self::submit), with `observers` installed before the
    /// first run is dispatched.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub fn submit_with(
        &self,
        config: &SimulationConfiguration,
        observers: Observers,
    ) -> Result<Arc<SimulationResult>, SchedulerError> {
        let runtime = Handle::try_current()?;
        let runs = config.expand()?;
        let configurations = runs.len();
        let too_many = || SchedulerError::TooManyRuns {
            configurations,
            iterations: config.iterations,
        };
        let total = usize::try_from(config.iterations)
            .ok()
            .and_then(|i| configurations.checked_mul(i))
            .ok_or_else(too_many)?;

        let base_seed = config.seed.unwrap_or_else(rand::random);
        let jobs: Vec<Job> = runs
            .into_iter()
            .map(Arc::new)
            .flat_map(|run| {
                (0..config.iterations).map(move |iteration| Job {
                    seed: derive_seed(base_seed, run.index, iteration),
                    run: Arc::clone(&run),
                    iteration,
                })
            })
            .collect();

        let result = Arc::new(SimulationResult::with_observers(total, base_seed, observers));
        info!(
            simulation = %result.id(),
            configurations,
            iterations = config.iterations,
            runs = total,
            base_seed,
            workers = self.workers,
            "Simulation submitted"
        );

        runtime.spawn(dispatch(
            jobs,
            Arc::clone(&self.permits),
            Arc::clone(&result),
        ));
        Ok(result)
    }
}

async fn dispatch(jobs: Vec<Job>, permits: Arc<Semaphore>, result: Arc<SimulationResult>) {
    let mut running = JoinSet::new();

    for job in jobs {
        if result.is_canceled() {
            break;
        }
        let permit = tokio::select! {
            permit = Arc::clone(&permits).acquire_owned() => permit,
            _ = result.wait() => break,
        };
        let Ok(permit) = permit else {
            warn!(simulation = %result.id(), "Worker pool closed");
            break;
        };
        if result.is_canceled() {
            break;
        }

        let result = Arc::clone(&result);
        running.spawn_blocking(move || {
            let _permit = permit;
            debug!(
                simulation = %result.id(),
                configuration = job.run.index,
                iteration = job.iteration,
                "Run dispatched"
            );
            result.record(job.execute());
        });
    }

    while let Some(joined) = running.join_next().await {
        if let Err(err) = joined {
            warn!(simulation = %result.id(), error = %err, "Worker task failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};
    use std::time::Duration;

    use evocoop_core::FailureStage;
    use evocoop_core::population::{GroupSize, GroupSpec, InitialCapital, PopulationSpec, Segment};
    use evocoop_core::{Sweep, SweepTarget};
    use evocoop_strategy::builtin;

    use super::*;
    use crate::result::SimulationStatus;

    fn configuration(iterations: u32) -> SimulationConfiguration {
        SimulationConfiguration {
            rounds: 3,
            iterations,
            max_adapts: 5,
            seed: Some(11),
            population: PopulationSpec {
                groups: vec![GroupSpec {
                    name: "main".to_owned(),
                    size: GroupSize::Fixed(6),
                    capital: InitialCapital::Fixed(0.0),
                    segments: vec![
                        Segment {
                            strategy: builtin::tit_for_tat(),
                            weight: 1.0,
                        },
                        Segment {
                            strategy: builtin::always_defect(),
                            weight: 1.0,
                        },
                    ],
                }],
            },
            ..SimulationConfiguration::default()
        }
    }

    fn scheduler(worker_count: usize) -> RunScheduler {
        RunScheduler::new(SchedulerConfig {
            worker_count,
            reserve_interactive_thread: false,
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sweep_produces_every_result() {
        let mut config = configuration(3);
        config.sweep = Some(Sweep::Numeric {
            target: SweepTarget::MaxAdapts,
            start: 2.0,
            end: 5.0,
            step: 1.0,
        });
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let observers = Observers::new().on_iteration_finished(move |progress, _| {
            assert!(progress.finished <= progress.total);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let result = scheduler(3).submit_with(&config, observers).unwrap();

        assert_eq!(result.wait().await, SimulationStatus::Finished);
        assert_eq!(seen.load(Ordering::SeqCst), 12);
        let results = result.results();
        assert_eq!(results.len(), 4);
        assert!(results.values().all(|runs| runs.len() == 3));
        assert_eq!(result.progress().finished, 12);
        assert_eq!(result.total(), 12);
    }

    #[tokio::test]
    async fn cancel_before_start_yields_nothing() {
        let result = scheduler(2).submit(&configuration(4)).unwrap();
        assert!(result.cancel());
        tokio::task::yield_now().await;
        assert_eq!(result.wait().await, SimulationStatus::Canceled);
        assert!(result.results().is_empty());
        assert_eq!(result.progress().finished, 0);
    }

    #[tokio::test]
    async fn seeded_submissions_agree() {
        let scheduler = scheduler(1);
        let a = scheduler.submit(&configuration(2)).unwrap();
        let b = scheduler.submit(&configuration(2)).unwrap();
        a.wait().await;
        b.wait().await;
        let mut left = a.configuration_results(0);
        let mut right = b.configuration_results(0);
        left.sort_by_key(|r| r.iteration);
        right.sort_by_key(|r| r.iteration);
        assert_eq!(left, right);
        assert_eq!(a.base_seed(), 11);
    }

    #[tokio::test]
    async fn invalid_configuration_is_rejected_synchronously() {
        let mut config = configuration(1);
        config.rounds = 0;
        assert!(matches!(
            scheduler(1).submit(&config),
            Err(SchedulerError::Configuration { .. })
        ));
    }

    #[test]
    fn submit_requires_a_runtime() {
        assert!(matches!(
            scheduler(1).submit(&configuration(1)),
            Err(SchedulerError::NoRuntime { .. })
        ));
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            RunScheduler::new(SchedulerConfig {
                worker_count: 0,
                reserve_interactive_thread: false,
            }),
            Err(SchedulerError::WorkerCount { count: 0 })
        ));
    }

    #[derive(Debug)]
    struct Exploding;

    impl evocoop_strategy::Condition for Exploding {
        fn cooperates(
            &self,
            _: &evocoop_strategy::Encounter<'_>,
            _: &mut dyn rand::RngCore,
        ) -> bool {
            panic!("strategy exploded")
        }

        fn cooperation_probability(&self, _: &evocoop_strategy::Encounter<'_>) -> f64 {
            0.5
        }
    }

    #[tokio::test]
    async fn panicking_runs_are_reported_as_failures() {
        let mut config = configuration(2);
        if let Some(group) = config.population.groups.first_mut() {
            group.segments = vec![Segment {
                strategy: evocoop_strategy::PureStrategy::new("exploding", Arc::new(Exploding))
                    .into(),
                weight: 1.0,
            }];
        }
        let result = scheduler(2).submit(&config).unwrap();
        assert_eq!(result.wait().await, SimulationStatus::Finished);
        let runs = result.configuration_results(0);
        assert_eq!(runs.len(), 2);
        for run in runs {
            assert!(!run.finished);
            assert_eq!(run.failure.unwrap().stage, FailureStage::Panic);
        }
        assert_eq!(result.progress().failed, 2);
    }

    /// Cooperates after a short pause, so each run takes measurable time.
    #[derive(Debug)]
    struct Sluggish;

    impl evocoop_strategy::Condition for Sluggish {
        fn cooperates(
            &self,
            _: &evocoop_strategy::Encounter<'_>,
            _: &mut dyn rand::RngCore,
        ) -> bool {
            std::thread::sleep(Duration::from_micros(200));
            true
        }

        fn cooperation_probability(&self, _: &evocoop_strategy::Encounter<'_>) -> f64 {
            1.0
        }
    }

    fn sluggish_configuration(iterations: u32) -> SimulationConfiguration {
        let mut config = configuration(iterations);
        if let Some(group) = config.population.groups.first_mut() {
            group.segments = vec![Segment {
                strategy: evocoop_strategy::PureStrategy::new("sluggish", Arc::new(Sluggish))
                    .into(),
                weight: 1.0,
            }];
        }
        config
    }

    fn recorded(result: &SimulationResult) -> usize {
        result.results().values().map(Vec::len).sum()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn observers_passed_at_submit_see_every_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let observers = Observers::new().on_iteration_finished(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let result = scheduler(4).submit_with(&configuration(20), observers).unwrap();
        // Runs complete while the caller is still busy elsewhere.
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(result.wait().await, SimulationStatus::Finished);
        assert_eq!(calls.load(Ordering::SeqCst), 20);
        assert_eq!(recorded(&result), 20);
    }

    #[tokio::test]
    async fn observer_can_cancel_its_own_simulation() {
        let handle: Arc<OnceLock<Weak<SimulationResult>>> = Arc::new(OnceLock::new());
        let target = Arc::clone(&handle);
        let observers = Observers::new().on_iteration_finished(move |progress, _| {
            if progress.finished >= 1 {
                if let Some(result) = target.get().and_then(Weak::upgrade) {
                    result.cancel();
                }
            }
        });
        let result = scheduler(2).submit_with(&configuration(8), observers).unwrap();
        handle.set(Arc::downgrade(&result)).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), result.wait())
            .await
            .unwrap();
        assert_eq!(status, SimulationStatus::Canceled);
        assert!(recorded(&result) < 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancel_mid_simulation_stops_dispatch() {
        let scheduler = scheduler(1);
        let result = scheduler.submit(&sluggish_configuration(10)).unwrap();
        while result.progress().finished == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(result.cancel());
        let at_cancel = recorded(&result);

        // The single permit comes back once the in-flight run has reported.
        let permit = scheduler.permits.acquire().await.unwrap();
        drop(permit);
        assert_eq!(result.status(), SimulationStatus::Canceled);
        assert!(at_cancel < result.total());
        assert_eq!(recorded(&result), at_cancel);
        assert_eq!(result.progress().finished, at_cancel);
    }
}
