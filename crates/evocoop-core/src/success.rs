//! Success quantifiers and the per-agent payoff ledger.
//!
//! After the games of a step are played, the engine records each agent's
//! step total in the [`PayoffLedger`] and asks the configured
//! [`SuccessQuantifier`] for one success value per agent. Adjusters and
//! the ranking criterion only ever compare these values.

use std::collections::VecDeque;
use std::sync::Arc;

use evocoop_types::{Parameter, ParameterError, SimulationHistory};

use crate::agent::Agent;
use crate::component::{Component, check_component, value_or};
use crate::numeric::{floor_to_count, mean};

/// Per-agent payoff totals of the most recent steps, indexed like the agents.
///
/// Only the last `depth` totals of each agent are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoffLedger {
    depth: usize,
    totals: Vec<VecDeque<f64>>,
}

impl Default for PayoffLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PayoffLedger {
    /// Create an empty ledger keeping only the latest step.
    pub const fn new() -> Self {
        Self::with_depth(1)
    }

    /// Create an empty ledger keeping the latest `depth` steps.
    pub const fn with_depth(depth: usize) -> Self {
        Self {
            depth: if depth == 0 { 1 } else { depth },
            totals: Vec::new(),
        }
    }

    /// Number of steps kept per agent.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Append the step totals found in `history` for every agent.
    pub fn record_step(&mut self, agents: &[Agent], history: &SimulationHistory) {
        if self.totals.len() < agents.len() {
            self.totals.resize_with(agents.len(), VecDeque::new);
        }
        for (agent, totals) in agents.iter().zip(&mut self.totals) {
            if totals.len() >= self.depth {
                totals.pop_front();
            }
            totals.push_back(history.total_payoff_of(agent.id));
        }
    }

    /// Number of steps currently kept for agent `index`.
    pub fn steps(&self, index: usize) -> usize {
        self.totals.get(index).map_or(0, VecDeque::len)
    }

    /// Total of the most recent step for agent `index`.
    pub fn last(&self, index: usize) -> f64 {
        self.totals
            .get(index)
            .and_then(|t| t.back().copied())
            .unwrap_or(0.0)
    }

    /// Mean of the last `window` step totals for agent `index`.
    ///
    /// At most [`depth`](Self::depth) totals are available.
    pub fn window_mean(&self, index: usize, window: usize) -> f64 {
        self.totals
            .get(index)
            .map_or(0.0, |t| mean(t.iter().rev().take(window).copied()))
    }
}

/// Maps the outcome of a step to one success value per agent.
pub trait SuccessQuantifier: Component {
    /// Success of every agent, in agent order.
    fn quantify(
        &self,
        agents: &[Agent],
        history: &SimulationHistory,
        ledger: &PayoffLedger,
    ) -> Vec<f64>;

    /// How many recent steps per agent the ledger must keep.
    fn ledger_depth(&self) -> usize {
        1
    }

    /// A copy of this quantifier with new parameter values.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] if the values are rejected.
    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn SuccessQuantifier>, ParameterError>;
}

/// Payoff earned during the current step.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepPayoff;

impl Component for StepPayoff {
    fn name(&self) -> &'static str {
        "step-payoff"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    fn parameter_values(&self) -> Vec<f64> {
        Vec::new()
    }
}

impl SuccessQuantifier for StepPayoff {
    fn quantify(&self, agents: &[Agent], _: &SimulationHistory, ledger: &PayoffLedger) -> Vec<f64> {
        (0..agents.len()).map(|i| ledger.last(i)).collect()
    }

    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn SuccessQuantifier>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self))
    }
}

/// Capital accumulated since the run started.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capital;

impl Component for Capital {
    fn name(&self) -> &'static str {
        "capital"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    fn parameter_values(&self) -> Vec<f64> {
        Vec::new()
    }
}

impl SuccessQuantifier for Capital {
    fn quantify(&self, agents: &[Agent], _: &SimulationHistory, _: &PayoffLedger) -> Vec<f64> {
        agents.iter().map(|a| a.capital).collect()
    }

    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn SuccessQuantifier>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self))
    }
}

/// Payoff of the agent's most recent game; `0` if it sat the step out.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastGamePayoff;

impl Component for LastGamePayoff {
    fn name(&self) -> &'static str {
        "last-game-payoff"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    fn parameter_values(&self) -> Vec<f64> {
        Vec::new()
    }
}

impl SuccessQuantifier for LastGamePayoff {
    fn quantify(&self, agents: &[Agent], history: &SimulationHistory, _: &PayoffLedger) -> Vec<f64> {
        agents
            .iter()
            .map(|a| {
                history
                    .last_game_of(a.id)
                    .and_then(|g| g.payoff_of(a.id))
                    .unwrap_or(0.0)
            })
            .collect()
    }

    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn SuccessQuantifier>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self))
    }
}

/// Mean step payoff over the last `window` steps.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindow {
    /// Number of steps averaged; at least one.
    pub window: usize,
}

impl Default for SlidingWindow {
    fn default() -> Self {
        Self { window: 5 }
    }
}

impl Component for SlidingWindow {
    fn name(&self) -> &'static str {
        "sliding-window"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        vec![Parameter::count("window", 1)]
    }

    fn parameter_values(&self) -> Vec<f64> {
        vec![crate::numeric::count_to_f64(self.window)]
    }
}

impl SuccessQuantifier for SlidingWindow {
    fn quantify(&self, agents: &[Agent], _: &SimulationHistory, ledger: &PayoffLedger) -> Vec<f64> {
        (0..agents.len())
            .map(|i| ledger.window_mean(i, self.window.max(1)))
            .collect()
    }

    fn ledger_depth(&self) -> usize {
        self.window.max(1)
    }

    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn SuccessQuantifier>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self {
            window: floor_to_count(value_or(values, 0, 1.0)).max(1),
        }))
    }
}
