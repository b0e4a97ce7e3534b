//! The adaptation engine: one run of the pairing, play, quantify, adjust and
//! equilibrium-check loop.
//!
//! # State machine
//!
//! ```text
//! Initialized -> Adapting { step } -> ... -> Terminated(reason)
//! ```
//!
//! Each call to [`AdaptationEngine::step`] runs one full adaptation step in
//! strictly sequential phases:
//!
//! 1. **Pair** -- the pair builder matches agents (seeing the previous
//!    step's history).
//! 2. **Play** -- every pair plays `rounds` games into a fresh history;
//!    payoffs are added to both agents' capital.
//! 3. **Quantify** -- step totals go into the ledger and the success
//!    quantifier scores every agent.
//! 4. **Adjust** -- the strategy adjuster revises strategies.
//! 5. **Check equilibrium** -- the monitor compares the step with the
//!    previous one.
//!
//! The run ends with [`TerminationReason::Equilibrium`] once the monitor
//! reports a stable streak, with [`TerminationReason::MaxAdapts`] after the
//! step budget, or with [`TerminationReason::Failure`] if a phase fails.
//! Given the same configuration and seed, a run is fully reproducible.

use std::panic::{AssertUnwindSafe, catch_unwind};

use evocoop_strategy::Encounter;
use evocoop_types::{GameResult, SimulationHistory};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adjustment::normalized_ranks;
use crate::agent::{Agent, AgentPair, AgentSnapshot};
use crate::configuration::RunConfiguration;
use crate::equilibrium::{EquilibriumMonitor, StepSnapshot, changed_share};
use crate::error::{EngineError, FailureCause, FailureStage};
use crate::success::PayoffLedger;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The equilibrium criterion was met.
    Equilibrium,
    /// The step budget was exhausted.
    MaxAdapts,
    /// A phase failed.
    Failure,
}

/// Lifecycle state of an [`AdaptationEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Population assembled, no step run yet.
    Initialized,
    /// Inside or between adaptation steps.
    Adapting {
        /// The step most recently entered (1-based).
        step: u32,
    },
    /// The run is over.
    Terminated(TerminationReason),
}

/// Summary of one completed adaptation step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Step number (1-based).
    pub step: u32,
    /// Number of pairs formed.
    pub pairs: usize,
    /// Number of games played.
    pub games: usize,
    /// Agents whose strategy changed.
    pub changed: usize,
    /// Displacement measured against the previous step.
    pub displacement: Option<f64>,
    /// State after the step.
    pub state: EngineState,
}

/// Outcome of one run, complete or aborted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    /// Index of the run configuration within the sweep.
    pub configuration_index: usize,
    /// Iteration number within the configuration.
    pub iteration: u32,
    /// Seed the run used.
    pub seed: u64,
    /// Whether the run terminated normally.
    pub finished: bool,
    /// Adaptation steps fully completed.
    pub adaptation_steps: u32,
    /// Adaptation steps entered, including a failed one.
    pub elapsed_steps: u32,
    /// Why the run stopped.
    pub termination: TerminationReason,
    /// Final population.
    pub agents: Vec<AgentSnapshot>,
    /// Games of the last completed step.
    pub history: SimulationHistory,
    /// Why the run aborted, if it did.
    pub failure: Option<FailureCause>,
}

/// One run of the adaptation loop.
#[derive(Debug)]
pub struct AdaptationEngine {
    config: RunConfiguration,
    state: EngineState,
    agents: Vec<Agent>,
    history: SimulationHistory,
    ledger: PayoffLedger,
    monitor: EquilibriumMonitor,
    previous_strategies: Option<StepSnapshot>,
    rng: StdRng,
    seed: u64,
    adaptation_steps: u32,
    elapsed_steps: u32,
}

impl AdaptationEngine {
    /// Assemble the population and enter [`EngineState::Initialized`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Population`] or [`EngineError::Sampling`] if
    /// the population cannot be built.
    pub fn new(config: RunConfiguration, seed: u64) -> Result<Self, EngineError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let agents = config.population.assemble(&mut rng)?;
        let ledger = PayoffLedger::with_depth(config.components.success.ledger_depth());
        Ok(Self {
            config,
            state: EngineState::Initialized,
            agents,
            history: SimulationHistory::new(),
            ledger,
            monitor: EquilibriumMonitor::new(),
            previous_strategies: None,
            rng,
            seed,
            adaptation_steps: 0,
            elapsed_steps: 0,
        })
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Current agents.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Games of the last completed step.
    pub const fn history(&self) -> &SimulationHistory {
        &self.history
    }

    /// Number of completed adaptation steps.
    pub const fn adaptation_steps(&self) -> u32 {
        self.adaptation_steps
    }

    /// Run one adaptation step.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyTerminated`] after termination, or the
    /// error of the failing phase. A failure moves the engine to
    /// `Terminated(Failure)`.
    pub fn step(&mut self) -> Result<StepOutcome, EngineError> {
        if let EngineState::Terminated(_) = self.state {
            return Err(EngineError::AlreadyTerminated);
        }
        let step = self
            .adaptation_steps
            .checked_add(1)
            .ok_or(EngineError::StepOverflow)?;
        self.state = EngineState::Adapting { step };
        self.elapsed_steps = step;

        match self.run_step(step) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.state = EngineState::Terminated(TerminationReason::Failure);
                Err(err)
            }
        }
    }

    fn run_step(&mut self, step: u32) -> Result<StepOutcome, EngineError> {
        // --- Pair ---
        let pairs =
            self.config
                .components
                .pair_builder
                .build_pairs(&self.agents, &self.history, &mut self.rng)?;
        validate_pairs(&pairs, self.agents.len())?;

        // --- Play ---
        let history = self.play(&pairs);

        // --- Quantify ---
        self.ledger.record_step(&self.agents, &history);
        let success = self
            .config
            .components
            .success
            .quantify(&self.agents, &history, &self.ledger);
        check_success(&success, &self.agents)?;
        let ranks = normalized_ranks(&success);

        // --- Adjust ---
        let changed = self.config.components.adjuster.adjust(
            &mut self.agents,
            &success,
            &history,
            self.config.mixed_strategies,
            &mut self.rng,
        )?;

        // --- Check equilibrium ---
        let snapshot = StepSnapshot {
            ranks,
            strategies: self.agents.iter().map(|a| a.strategy.clone()).collect(),
        };
        if let Some(previous) = &self.previous_strategies {
            debug!(
                step,
                changed_share = changed_share(previous, &snapshot),
                "Strategy turnover"
            );
        }
        self.previous_strategies = Some(snapshot.clone());
        let equilibrium = self
            .monitor
            .observe(self.config.components.equilibrium.as_ref(), snapshot)?;

        let games = history.len();
        self.history = history;
        self.adaptation_steps = step;

        if equilibrium {
            self.state = EngineState::Terminated(TerminationReason::Equilibrium);
        } else if step >= self.config.max_adapts {
            self.state = EngineState::Terminated(TerminationReason::MaxAdapts);
        }

        debug!(
            step,
            pairs = pairs.len(),
            games,
            changed,
            streak = self.monitor.streak(),
            "Adaptation step complete"
        );

        Ok(StepOutcome {
            step,
            pairs: pairs.len(),
            games,
            changed,
            displacement: self.monitor.last_displacement(),
            state: self.state,
        })
    }

    fn play(&mut self, pairs: &[AgentPair]) -> SimulationHistory {
        let mut history = SimulationHistory::new();
        let payoff = self.config.payoff;

        for _ in 0..self.config.rounds {
            for pair in pairs {
                let (Some(a), Some(b)) = (self.agents.get(pair.first), self.agents.get(pair.second))
                else {
                    continue;
                };
                let encounter = Encounter::new(a.id, b.id, &history);
                let a_cooperates = a.strategy.cooperates(&encounter, &mut self.rng);
                let b_cooperates = b.strategy.cooperates(&encounter.reversed(), &mut self.rng);
                let (a_payoff, b_payoff) = payoff.payoffs(a_cooperates, b_cooperates);
                let game = GameResult {
                    player: a.id,
                    opponent: b.id,
                    player_cooperated: a_cooperates,
                    opponent_cooperated: b_cooperates,
                    player_payoff: a_payoff,
                    opponent_payoff: b_payoff,
                };
                history.push(game);
                if let Some(a) = self.agents.get_mut(pair.first) {
                    a.capital += a_payoff;
                }
                if let Some(b) = self.agents.get_mut(pair.second) {
                    b.capital += b_payoff;
                }
            }
        }
        history
    }

    /// Step until termination and produce the run's result.
    pub fn run(mut self, iteration: u32) -> IterationResult {
        info!(
            configuration = self.config.index,
            iteration,
            seed = self.seed,
            agents = self.agents.len(),
            "Run starting"
        );

        let mut failure = None;
        while !matches!(self.state, EngineState::Terminated(_)) {
            if let Err(err) = self.step() {
                warn!(
                    configuration = self.config.index,
                    iteration,
                    step = self.elapsed_steps,
                    error = %err,
                    "Run failed"
                );
                failure = Some(err.to_cause());
                break;
            }
        }

        let termination = match self.state {
            EngineState::Terminated(reason) => reason,
            EngineState::Initialized | EngineState::Adapting { .. } => TerminationReason::Failure,
        };
        info!(
            configuration = self.config.index,
            iteration,
            steps = self.adaptation_steps,
            reason = ?termination,
            "Run terminated"
        );

        IterationResult {
            configuration_index: self.config.index,
            iteration,
            seed: self.seed,
            finished: failure.is_none(),
            adaptation_steps: self.adaptation_steps,
            elapsed_steps: self.elapsed_steps,
            termination,
            agents: self.agents.iter().map(Agent::snapshot).collect(),
            history: self.history,
            failure,
        }
    }
}

fn validate_pairs(pairs: &[AgentPair], agent_count: usize) -> Result<(), EngineError> {
    let mut used = vec![false; agent_count];
    for pair in pairs {
        if pair.first == pair.second {
            return Err(EngineError::Pairing {
                reason: format!("agent {} paired with itself", pair.first),
            });
        }
        for idx in [pair.first, pair.second] {
            match used.get_mut(idx) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => {
                    return Err(EngineError::Pairing {
                        reason: format!("agent {idx} paired twice"),
                    });
                }
                None => {
                    return Err(EngineError::Pairing {
                        reason: format!("agent index {idx} out of range"),
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_success(success: &[f64], agents: &[Agent]) -> Result<(), EngineError> {
    if success.len() != agents.len() {
        return Err(EngineError::Quantification {
            reason: format!(
                "expected {} success values, got {}",
                agents.len(),
                success.len()
            ),
        });
    }
    match success
        .iter()
        .zip(agents)
        .find(|(value, _)| !value.is_finite())
    {
        Some((value, agent)) => Err(EngineError::Quantification {
            reason: format!("success of {} is {value}", agent.id),
        }),
        None => Ok(()),
    }
}

impl IterationResult {
    /// Result of a run that aborted before completing a step.
    pub const fn aborted(
        configuration_index: usize,
        iteration: u32,
        seed: u64,
        failure: FailureCause,
    ) -> Self {
        Self {
            configuration_index,
            iteration,
            seed,
            finished: false,
            adaptation_steps: 0,
            elapsed_steps: 0,
            termination: TerminationReason::Failure,
            agents: Vec::new(),
            history: SimulationHistory::new(),
            failure: Some(failure),
        }
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}

/// Execute one complete run, converting every failure into a result.
///
/// Errors from population assembly and from any step, as well as panics
/// escaping a component, yield an [`IterationResult`] with
/// `finished == false` and a tagged [`FailureCause`].
pub fn run_iteration(config: &RunConfiguration, iteration: u32, seed: u64) -> IterationResult {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        AdaptationEngine::new(config.clone(), seed).map(|engine| engine.run(iteration))
    }));

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => {
            warn!(configuration = config.index, iteration, error = %err, "Run could not start");
            IterationResult::aborted(config.index, iteration, seed, err.to_cause())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(configuration = config.index, iteration, %message, "Run panicked");
            IterationResult::aborted(
                config.index,
                iteration,
                seed,
                FailureCause {
                    stage: FailureStage::Panic,
                    message,
                },
            )
        }
    }
}
