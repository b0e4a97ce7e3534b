//! Shared type definitions for the evocoop simulation.
//!
//! This crate is the single source of truth for the vocabulary shared by
//! every other crate in the workspace: identifiers, configuration
//! parameters, the payoff matrix, and the record of played games.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier newtypes ([`AgentId`], [`SimulationId`]).
//! - [`parameter`] -- Bounded, stepped configuration slots ([`Parameter`]).
//! - [`game`] -- Payoffs, game records, and per-step history.

pub mod game;
pub mod ids;
pub mod parameter;

pub use game::{GameResult, PayoffEntry, PayoffMatrix, SimulationHistory};
pub use ids::{AgentId, SimulationId};
pub use parameter::{Parameter, ParameterError, check_values};
