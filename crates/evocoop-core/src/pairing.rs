//! Pair builders: how agents are matched for one adaptation step.
//!
//! Every builder returns disjoint pairs of agent indices. With an odd number
//! of agents one agent sits the step out.
//!
//! - [`RandomPairBuilder`] -- uniform random matching.
//! - [`CooperationPairBuilder`] -- greedy matching that prefers pairs with
//!   high mutual cooperation probability.
//! - [`HybridPairBuilder`] -- per pair, random with a configurable
//!   probability and cooperation-seeking otherwise.

use std::sync::Arc;

use evocoop_strategy::Encounter;
use evocoop_types::{Parameter, ParameterError, SimulationHistory};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentPair};
use crate::component::{Component, check_component, value_or};
use crate::error::EngineError;

/// Builds the pairs of one adaptation step.
pub trait PairBuilder: Component {
    /// Match agents into disjoint pairs.
    ///
    /// `history` holds the games of the previous step (empty on the first
    /// step) and may inform cooperation estimates.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Pairing`] if no valid pairing can be built.
    fn build_pairs(
        &self,
        agents: &[Agent],
        history: &SimulationHistory,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<AgentPair>, EngineError>;

    /// A copy of this builder with new parameter values.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] if the values are rejected.
    fn with_parameters(&self, values: &[f64]) -> Result<Arc<dyn PairBuilder>, ParameterError>;
}

/// How the cooperation probabilities of both agents are combined into a
/// pair score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooperationScore {
    /// `p(a -> b) * p(b -> a)`.
    #[default]
    Product,
    /// `p(a -> b) + p(b -> a)`.
    Sum,
}

impl CooperationScore {
    /// Score of pairing agents `a` and `b`.
    pub fn score(self, a: &Agent, b: &Agent, history: &SimulationHistory) -> f64 {
        let forward = Encounter::new(a.id, b.id, history);
        let pa = a.strategy.cooperation_probability(&forward);
        let pb = b.strategy.cooperation_probability(&forward.reversed());
        match self {
            Self::Product => pa * pb,
            Self::Sum => pa + pb,
        }
    }

    const fn as_value(self) -> f64 {
        match self {
            Self::Product => 0.0,
            Self::Sum => 1.0,
        }
    }

    fn from_value(value: f64) -> Self {
        if value >= 0.5 { Self::Sum } else { Self::Product }
    }

    fn parameter() -> Parameter {
        Parameter::flag("use_sum")
    }
}

fn shuffled_indices(len: usize, rng: &mut dyn RngCore) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    order.shuffle(rng);
    order
}

// ---------------------------------------------------------------------------
// Random
// ---------------------------------------------------------------------------

/// Uniform random matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPairBuilder;

impl Component for RandomPairBuilder {
    fn name(&self) -> &'static str {
        "random"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }

    fn parameter_values(&self) -> Vec<f64> {
        Vec::new()
    }
}

impl PairBuilder for RandomPairBuilder {
    fn build_pairs(
        &self,
        agents: &[Agent],
        _history: &SimulationHistory,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<AgentPair>, EngineError> {
        let order = shuffled_indices(agents.len(), rng);
        Ok(order
            .chunks_exact(2)
            .filter_map(|c| match c {
                [a, b] => Some(AgentPair::new(*a, *b)),
                _ => None,
            })
            .collect())
    }

    fn with_parameters(&self, values: &[f64]) -> Result<Arc<dyn PairBuilder>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self))
    }
}

// ---------------------------------------------------------------------------
// Cooperation-maximizing
// ---------------------------------------------------------------------------

/// Greedy matching on mutual cooperation probability.
///
/// Agents are shuffled first so ties fall in seeded random order; candidate
/// pairs are then stably sorted by descending score and taken whenever both
/// agents are still free.
#[derive(Debug, Clone, Copy, Default)]
pub struct CooperationPairBuilder {
    /// Score combination.
    pub score: CooperationScore,
}

impl Component for CooperationPairBuilder {
    fn name(&self) -> &'static str {
        "cooperation"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        vec![CooperationScore::parameter()]
    }

    fn parameter_values(&self) -> Vec<f64> {
        vec![self.score.as_value()]
    }
}

impl PairBuilder for CooperationPairBuilder {
    fn build_pairs(
        &self,
        agents: &[Agent],
        history: &SimulationHistory,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<AgentPair>, EngineError> {
        let order = shuffled_indices(agents.len(), rng);

        let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
        for (pos, &a) in order.iter().enumerate() {
            for &b in order.iter().skip(pos.saturating_add(1)) {
                let (Some(agent_a), Some(agent_b)) = (agents.get(a), agents.get(b)) else {
                    continue;
                };
                candidates.push((a, b, self.score.score(agent_a, agent_b, history)));
            }
        }
        candidates.sort_by(|x, y| y.2.total_cmp(&x.2));

        let mut matched = vec![false; agents.len()];
        let mut pairs = Vec::with_capacity(agents.len() / 2);
        for (a, b, _) in candidates {
            if matched.get(a) == Some(&false) && matched.get(b) == Some(&false) {
                if let Some(m) = matched.get_mut(a) {
                    *m = true;
                }
                if let Some(m) = matched.get_mut(b) {
                    *m = true;
                }
                pairs.push(AgentPair::new(a, b));
            }
        }
        Ok(pairs)
    }

    fn with_parameters(&self, values: &[f64]) -> Result<Arc<dyn PairBuilder>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self {
            score: CooperationScore::from_value(value_or(values, 0, 0.0)),
        }))
    }
}

// ---------------------------------------------------------------------------
// Hybrid
// ---------------------------------------------------------------------------

/// Per pair, a random partner with probability `random_probability`,
/// otherwise the free partner with the highest cooperation score.
#[derive(Debug, Clone, Copy)]
pub struct HybridPairBuilder {
    /// Probability of picking a random partner for a pair.
    pub random_probability: f64,
    /// Score used for the cooperation-seeking choice.
    pub score: CooperationScore,
}

impl Default for HybridPairBuilder {
    fn default() -> Self {
        Self {
            random_probability: 0.5,
            score: CooperationScore::Product,
        }
    }
}

impl Component for HybridPairBuilder {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::probability("random_probability"),
            CooperationScore::parameter(),
        ]
    }

    fn parameter_values(&self) -> Vec<f64> {
        vec![self.random_probability, self.score.as_value()]
    }
}

impl PairBuilder for HybridPairBuilder {
    fn build_pairs(
        &self,
        agents: &[Agent],
        history: &SimulationHistory,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<AgentPair>, EngineError> {
        let random_probability = if self.random_probability.is_finite() {
            self.random_probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut free = shuffled_indices(agents.len(), rng);
        let mut pairs = Vec::with_capacity(agents.len() / 2);

        while free.len() >= 2 {
            let a = free.swap_remove(0);
            let partner_pos = if rng.random_bool(random_probability) {
                rng.random_range(0..free.len())
            } else {
                let agent_a = agents.get(a).ok_or_else(|| EngineError::Pairing {
                    reason: format!("agent index {a} out of range"),
                })?;
                let mut best = (0, f64::NEG_INFINITY);
                for (pos, &b) in free.iter().enumerate() {
                    let Some(agent_b) = agents.get(b) else {
                        continue;
                    };
                    let score = self.score.score(agent_a, agent_b, history);
                    if score > best.1 {
                        best = (pos, score);
                    }
                }
                best.0
            };
            let b = free.swap_remove(partner_pos);
            pairs.push(AgentPair::new(a, b));
        }
        Ok(pairs)
    }

    fn with_parameters(&self, values: &[f64]) -> Result<Arc<dyn PairBuilder>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self {
            random_probability: value_or(values, 0, self.random_probability),
            score: CooperationScore::from_value(value_or(values, 1, 0.0)),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use evocoop_strategy::builtin;
    use evocoop_types::AgentId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn agents(strategies: Vec<evocoop_strategy::Strategy>) -> Vec<Agent> {
        strategies
            .into_iter()
            .enumerate()
            .map(|(i, s)| Agent::new(AgentId(u32::try_from(i).unwrap()), s, 0.0, "g"))
            .collect()
    }

    fn assert_disjoint(pairs: &[AgentPair], n: usize) {
        let mut seen = HashSet::new();
        for p in pairs {
            assert!(p.first < n && p.second < n);
            assert!(seen.insert(p.first), "{} paired twice", p.first);
            assert!(seen.insert(p.second), "{} paired twice", p.second);
        }
        assert_eq!(pairs.len(), n / 2);
    }

    #[test]
    fn random_pairs_are_disjoint() {
        let pop = agents(vec![builtin::grim(); 7]);
        let mut rng = StdRng::seed_from_u64(3);
        let pairs = RandomPairBuilder
            .build_pairs(&pop, &SimulationHistory::new(), &mut rng)
            .unwrap();
        assert_disjoint(&pairs, 7);
    }

    #[test]
    fn cooperation_pairs_cooperators_together() {
        let pop = agents(vec![
            builtin::always_defect(),
            builtin::always_cooperate(),
            builtin::always_defect(),
            builtin::always_cooperate(),
        ]);
        let mut rng = StdRng::seed_from_u64(11);
        let pairs = CooperationPairBuilder::default()
            .build_pairs(&pop, &SimulationHistory::new(), &mut rng)
            .unwrap();
        assert_disjoint(&pairs, 4);
        assert!(
            pairs.iter().any(|p| p.contains(1) && p.contains(3)),
            "cooperators should be matched: {pairs:?}"
        );
    }

    #[test]
    fn cooperation_pairing_is_reproducible() {
        let pop = agents(vec![builtin::tit_for_tat(); 10]);
        let h = SimulationHistory::new();
        let a = CooperationPairBuilder::default()
            .build_pairs(&pop, &h, &mut StdRng::seed_from_u64(5))
            .unwrap();
        let b = CooperationPairBuilder::default()
            .build_pairs(&pop, &h, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn hybrid_without_randomness_seeks_cooperation() {
        let pop = agents(vec![
            builtin::always_cooperate(),
            builtin::always_defect(),
            builtin::always_cooperate(),
            builtin::always_defect(),
        ]);
        let builder = HybridPairBuilder {
            random_probability: 0.0,
            score: CooperationScore::Sum,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let pairs = builder
            .build_pairs(&pop, &SimulationHistory::new(), &mut rng)
            .unwrap();
        assert_disjoint(&pairs, 4);
    }

    #[test]
    fn with_parameters_validates() {
        assert!(RandomPairBuilder.with_parameters(&[1.0]).is_err());
        assert!(HybridPairBuilder::default().with_parameters(&[1.5, 0.0]).is_err());
        let built = HybridPairBuilder::default().with_parameters(&[0.25, 1.0]).unwrap();
        assert_eq!(built.parameter_values(), vec![0.25, 1.0]);
        assert_eq!(built.name(), "hybrid");
    }

    #[test]
    fn score_combinations() {
        let pop = agents(vec![builtin::always_cooperate(), builtin::random(0.5).unwrap()]);
        let h = SimulationHistory::new();
        let (a, b) = (pop.first().unwrap(), pop.get(1).unwrap());
        assert!((CooperationScore::Product.score(a, b, &h) - 0.5).abs() < 1e-12);
        assert!((CooperationScore::Sum.score(a, b, &h) - 1.5).abs() < 1e-12);
    }
}
