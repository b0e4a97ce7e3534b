//! Agents and their serializable snapshots.

use evocoop_strategy::Strategy;
use evocoop_types::AgentId;
use serde::{Deserialize, Serialize};

/// A simulated participant.
///
/// Agents are owned by exactly one engine. Within a step each phase runs to
/// completion before the next one reads the agents, so every field has a
/// single writer at any time.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    /// Identity, unique within a run.
    pub id: AgentId,
    /// Current strategy; replaced or blended during adjustment.
    pub strategy: Strategy,
    /// Accumulated payoff since the run started.
    pub capital: f64,
    /// Name of the population group the agent was created in.
    pub group: String,
}

impl Agent {
    /// Create an agent.
    pub fn new(id: AgentId, strategy: Strategy, capital: f64, group: impl Into<String>) -> Self {
        Self {
            id,
            strategy,
            capital,
            group: group.into(),
        }
    }

    /// Serializable view of the agent.
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            strategy: self.strategy.name(),
            capital: self.capital,
            group: self.group.clone(),
        }
    }
}

/// Serializable view of an [`Agent`] at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent identity.
    pub id: AgentId,
    /// Display name of the final strategy.
    pub strategy: String,
    /// Final capital.
    pub capital: f64,
    /// Originating group.
    pub group: String,
}

/// Two agents paired for one step, as indices into the agent list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPair {
    /// Index of the first agent.
    pub first: usize,
    /// Index of the second agent.
    pub second: usize,
}

impl AgentPair {
    /// Pair two agent indices.
    pub const fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }

    /// Whether the pair contains `index`.
    pub const fn contains(&self, index: usize) -> bool {
        self.first == index || self.second == index
    }
}
