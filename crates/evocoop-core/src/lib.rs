//! Population assembly, adaptation engine, and configuration sweeps for the
//! evocoop simulation.
//!
//! A run assembles a population of agents, then repeats adaptation steps
//! (pair, play, quantify, adjust, check equilibrium) until the population
//! is stable or the step budget runs out. Each phase is a pluggable
//! [`Component`] chosen by the [`SimulationConfiguration`].
//!
//! # Modules
//!
//! - [`agent`] -- Agents, snapshots, and pairs.
//! - [`component`] -- The [`Component`] trait shared by pluggable phases.
//! - [`population`] -- Group specifications and population assembly.
//! - [`pairing`] -- Pair builders (random, cooperation, hybrid).
//! - [`success`] -- Success quantifiers and the payoff ledger.
//! - [`adjustment`] -- Strategy adjusters (replicator, preferential).
//! - [`equilibrium`] -- Equilibrium criteria and the streak monitor.
//! - [`configuration`] -- Simulation configuration, sweeps, and seeds.
//! - [`engine`] -- The [`AdaptationEngine`] state machine and
//!   [`run_iteration`].
//! - [`error`] -- Error types and failure causes.
//!
//! [`AdaptationEngine`]: engine::AdaptationEngine
//! [`run_iteration`]: engine::run_iteration

pub mod adjustment;
pub mod agent;
pub mod component;
pub mod configuration;
pub mod engine;
pub mod equilibrium;
pub mod error;
mod numeric;
pub mod pairing;
pub mod population;
pub mod success;

pub use agent::{Agent, AgentPair, AgentSnapshot};
pub use component::Component;
pub use configuration::{RunConfiguration, SimulationConfiguration, Sweep, SweepTarget};
pub use engine::{AdaptationEngine, EngineState, IterationResult, TerminationReason, run_iteration};
pub use error::{ConfigurationError, EngineError, FailureCause, FailureStage};
