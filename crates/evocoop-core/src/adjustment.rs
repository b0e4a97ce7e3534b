//! Strategy adjusters: imitation of more successful agents.
//!
//! Each agent, with probability `comparing_probability`, samples one other
//! agent and compares normalized success ranks. If the other agent ranks
//! higher, the agent adopts its strategy with probability
//! `min(1, adjusting_factor * rank_gap)`. With mixed strategies enabled the
//! agent instead moves its strategy vector towards the other's by that
//! probability.
//!
//! Updates are synchronous: every decision reads the strategies as they were
//! before the adjustment began.
//!
//! The two adjusters differ only in how the comparison partner is sampled:
//!
//! - [`ReplicatorDynamic`] -- uniformly among the other agents.
//! - [`PreferentialAdaption`] -- proportionally to the agent's own
//!   cooperation probability against each candidate.

use std::sync::Arc;

use evocoop_strategy::{Encounter, Strategy};
use evocoop_types::{Parameter, ParameterError, SimulationHistory};
use rand::{Rng, RngCore};

use crate::agent::Agent;
use crate::component::{Component, check_component, value_or};
use crate::error::EngineError;
use crate::numeric::count_to_f64;

/// Revises agent strategies after success has been quantified.
pub trait StrategyAdjuster: Component {
    /// Adjust strategies in place and return how many agents changed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Adjustment`] if interpolating two strategies
    /// fails, or [`EngineError::Quantification`] if `success` does not
    /// match the agents.
    fn adjust(
        &self,
        agents: &mut [Agent],
        success: &[f64],
        history: &SimulationHistory,
        mixed_strategies: bool,
        rng: &mut dyn RngCore,
    ) -> Result<usize, EngineError>;

    /// A copy of this adjuster with new parameter values.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] if the values are rejected.
    fn with_parameters(&self, values: &[f64])
    -> Result<Arc<dyn StrategyAdjuster>, ParameterError>;
}

/// Normalized success ranks in `[0, 1]`.
///
/// The rank of an agent is the share of the other agents with strictly
/// lower success, so equal success yields equal rank.
pub fn normalized_ranks(success: &[f64]) -> Vec<f64> {
    let others = count_to_f64(success.len().saturating_sub(1));
    success
        .iter()
        .map(|s| {
            if others <= 0.0 {
                return 0.0;
            }
            let lower = success.iter().filter(|o| *o < s).count();
            count_to_f64(lower) / others
        })
        .collect()
}

/// Settings shared by both adjusters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustmentSettings {
    /// Probability that an agent compares itself at all this step.
    pub comparing_probability: f64,
    /// Scale of the adoption probability per unit of rank gap.
    pub adjusting_factor: f64,
}

impl Default for AdjustmentSettings {
    fn default() -> Self {
        Self {
            comparing_probability: 1.0,
            adjusting_factor: 1.0,
        }
    }
}

impl AdjustmentSettings {
    fn declared() -> Vec<Parameter> {
        vec![
            Parameter::probability("comparing_probability"),
            Parameter::at_least("adjusting_factor", 0.0),
        ]
    }

    fn values(self) -> Vec<f64> {
        vec![self.comparing_probability, self.adjusting_factor]
    }

    fn from_values(values: &[f64]) -> Self {
        let defaults = Self::default();
        Self {
            comparing_probability: value_or(values, 0, defaults.comparing_probability),
            adjusting_factor: value_or(values, 1, defaults.adjusting_factor),
        }
    }

    fn comparing_probability(self) -> f64 {
        if self.comparing_probability.is_finite() {
            self.comparing_probability.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn adoption_probability(self, rank_gap: f64) -> f64 {
        let p = self.adjusting_factor * rank_gap;
        if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartnerSampling {
    Uniform,
    Preferential,
}

/// Pick the comparison partner of agent `me`, or `None` if it is alone.
fn sample_partner(
    sampling: PartnerSampling,
    agents: &[Agent],
    me: usize,
    history: &SimulationHistory,
    rng: &mut dyn RngCore,
) -> Option<usize> {
    let candidates: Vec<usize> = (0..agents.len()).filter(|&j| j != me).collect();
    if candidates.is_empty() {
        return None;
    }

    if sampling == PartnerSampling::Preferential {
        let agent = agents.get(me)?;
        let weights: Vec<f64> = candidates
            .iter()
            .map(|&j| {
                agents.get(j).map_or(0.0, |other| {
                    let p = agent
                        .strategy
                        .cooperation_probability(&Encounter::new(agent.id, other.id, history));
                    if p.is_finite() { p.max(0.0) } else { 0.0 }
                })
            })
            .collect();
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            let u = rng.random::<f64>() * total;
            let mut acc = 0.0;
            for (&j, w) in candidates.iter().zip(&weights) {
                acc += w;
                if u < acc {
                    return Some(j);
                }
            }
            return candidates.last().copied();
        }
    }

    candidates.get(rng.random_range(0..candidates.len())).copied()
}

fn adjust_with(
    sampling: PartnerSampling,
    settings: AdjustmentSettings,
    agents: &mut [Agent],
    success: &[f64],
    history: &SimulationHistory,
    mixed_strategies: bool,
    rng: &mut dyn RngCore,
) -> Result<usize, EngineError> {
    if success.len() != agents.len() {
        return Err(EngineError::Quantification {
            reason: format!(
                "{} success values for {} agents",
                success.len(),
                agents.len()
            ),
        });
    }
    let ranks = normalized_ranks(success);

    let mut updates: Vec<Option<Strategy>> = vec![None; agents.len()];
    for (me, update) in updates.iter_mut().enumerate() {
        if !rng.random_bool(settings.comparing_probability()) {
            continue;
        }
        let Some(other) = sample_partner(sampling, agents, me, history, rng) else {
            continue;
        };
        let (Some(my_rank), Some(other_rank)) = (ranks.get(me), ranks.get(other)) else {
            continue;
        };
        if other_rank <= my_rank {
            continue;
        }
        let (Some(mine), Some(theirs)) = (agents.get(me), agents.get(other)) else {
            continue;
        };

        let p = settings.adoption_probability(other_rank - my_rank);
        if mixed_strategies {
            // A zero weight would still wrap a pure strategy in a mixture.
            if p > 0.0 {
                *update = Some(mine.strategy.interpolate(&theirs.strategy, p)?);
            }
        } else if rng.random_bool(p) {
            *update = Some(theirs.strategy.clone());
        }
    }

    let mut changed: usize = 0;
    for (agent, update) in agents.iter_mut().zip(updates) {
        if let Some(strategy) = update {
            if strategy != agent.strategy {
                changed = changed.saturating_add(1);
            }
            agent.strategy = strategy;
        }
    }
    Ok(changed)
}

// ---------------------------------------------------------------------------
// Replicator dynamic
// ---------------------------------------------------------------------------

/// Imitation with uniformly sampled comparison partners.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicatorDynamic {
    /// Shared settings.
    pub settings: AdjustmentSettings,
}

impl Component for ReplicatorDynamic {
    fn name(&self) -> &'static str {
        "replicator-dynamic"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        AdjustmentSettings::declared()
    }

    fn parameter_values(&self) -> Vec<f64> {
        self.settings.values()
    }
}

impl StrategyAdjuster for ReplicatorDynamic {
    fn adjust(
        &self,
        agents: &mut [Agent],
        success: &[f64],
        history: &SimulationHistory,
        mixed_strategies: bool,
        rng: &mut dyn RngCore,
    ) -> Result<usize, EngineError> {
        adjust_with(
            PartnerSampling::Uniform,
            self.settings,
            agents,
            success,
            history,
            mixed_strategies,
            rng,
        )
    }

    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn StrategyAdjuster>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self {
            settings: AdjustmentSettings::from_values(values),
        }))
    }
}

// ---------------------------------------------------------------------------
// Preferential adaption
// ---------------------------------------------------------------------------

/// Imitation biased towards partners the agent would cooperate with.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferentialAdaption {
    /// Shared settings.
    pub settings: AdjustmentSettings,
}

impl Component for PreferentialAdaption {
    fn name(&self) -> &'static str {
        "preferential-adaption"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        AdjustmentSettings::declared()
    }

    fn parameter_values(&self) -> Vec<f64> {
        self.settings.values()
    }
}

impl StrategyAdjuster for PreferentialAdaption {
    fn adjust(
        &self,
        agents: &mut [Agent],
        success: &[f64],
        history: &SimulationHistory,
        mixed_strategies: bool,
        rng: &mut dyn RngCore,
    ) -> Result<usize, EngineError> {
        adjust_with(
            PartnerSampling::Preferential,
            self.settings,
            agents,
            success,
            history,
            mixed_strategies,
            rng,
        )
    }

    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn StrategyAdjuster>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self {
            settings: AdjustmentSettings::from_values(values),
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evocoop_strategy::builtin;
    use evocoop_types::AgentId;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn two_agents() -> Vec<Agent> {
        vec![
            Agent::new(AgentId(0), builtin::always_cooperate(), 0.0, "g"),
            Agent::new(AgentId(1), builtin::always_defect(), 0.0, "g"),
        ]
    }

    fn eager() -> AdjustmentSettings {
        AdjustmentSettings {
            comparing_probability: 1.0,
            adjusting_factor: 1.0,
        }
    }

    #[test]
    fn ranks_are_normalized() {
        let ranks = normalized_ranks(&[1.0, 5.0, 3.0, 5.0]);
        let expected = [0.0, 2.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0];
        for (r, e) in ranks.iter().zip(expected) {
            assert!((r - e).abs() < 1e-12);
        }
        assert_eq!(normalized_ranks(&[7.0]), vec![0.0]);
        assert!(normalized_ranks(&[]).is_empty());
    }

    #[test]
    fn loser_adopts_winner_strategy() {
        let mut agents = two_agents();
        let adjuster = ReplicatorDynamic { settings: eager() };
        let mut rng = StdRng::seed_from_u64(4);
        let changed = adjuster
            .adjust(&mut agents, &[0.0, 5.0], &SimulationHistory::new(), false, &mut rng)
            .unwrap();
        assert_eq!(changed, 1);
        assert!(agents.iter().all(|a| a.strategy.name() == "always-defect"));
    }

    #[test]
    fn adoptions_come_from_pre_adjustment_strategies() {
        let before = ["always-defect", "grim", "always-cooperate"];
        for seed in 0..10 {
            let mut agents = vec![
                Agent::new(AgentId(0), builtin::always_defect(), 0.0, "g"),
                Agent::new(AgentId(1), builtin::grim(), 0.0, "g"),
                Agent::new(AgentId(2), builtin::always_cooperate(), 0.0, "g"),
            ];
            let adjuster = ReplicatorDynamic { settings: eager() };
            let mut rng = StdRng::seed_from_u64(seed);
            adjuster
                .adjust(&mut agents, &[2.0, 1.0, 0.0], &SimulationHistory::new(), false, &mut rng)
                .unwrap();
            assert_eq!(agents.first().unwrap().strategy.name(), "always-defect");
            let grim_holder = agents.get(1).unwrap().strategy.name();
            assert!(grim_holder == "grim" || grim_holder == "always-defect");
            assert!(before.contains(&agents.get(2).unwrap().strategy.name().as_str()));
        }
    }

    #[test]
    fn winner_never_changes() {
        let mut agents = two_agents();
        let adjuster = PreferentialAdaption { settings: eager() };
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            adjuster
                .adjust(&mut agents, &[0.0, 5.0], &SimulationHistory::new(), false, &mut rng)
                .unwrap();
            assert_eq!(agents.get(1).unwrap().strategy.name(), "always-defect");
        }
    }

    #[test]
    fn mixed_mode_interpolates() {
        let mut agents = two_agents();
        let adjuster = ReplicatorDynamic {
            settings: AdjustmentSettings {
                comparing_probability: 1.0,
                adjusting_factor: 0.5,
            },
        };
        let mut rng = StdRng::seed_from_u64(0);
        adjuster
            .adjust(&mut agents, &[0.0, 5.0], &SimulationHistory::new(), true, &mut rng)
            .unwrap();
        let Strategy::Mixed(m) = &agents.first().unwrap().strategy else {
            panic!("expected a mixed strategy");
        };
        assert!((m.probability_of("always-cooperate") - 0.5).abs() < 1e-12);
        assert!((m.probability_of("always-defect") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mixed_mode_without_adjustment_keeps_pure_strategies() {
        let mut agents = two_agents();
        let adjuster = ReplicatorDynamic {
            settings: AdjustmentSettings {
                comparing_probability: 1.0,
                adjusting_factor: 0.0,
            },
        };
        let mut rng = StdRng::seed_from_u64(0);
        let changed = adjuster
            .adjust(&mut agents, &[0.0, 5.0], &SimulationHistory::new(), true, &mut rng)
            .unwrap();
        assert_eq!(changed, 0);
        assert!(agents.iter().all(|a| matches!(a.strategy, Strategy::Pure(_))));
        assert_eq!(agents.first().unwrap().strategy.name(), "always-cooperate");
    }

    #[test]
    fn never_comparing_changes_nothing() {
        let mut agents = two_agents();
        let adjuster = ReplicatorDynamic {
            settings: AdjustmentSettings {
                comparing_probability: 0.0,
                adjusting_factor: 1.0,
            },
        };
        let mut rng = StdRng::seed_from_u64(0);
        let changed = adjuster
            .adjust(&mut agents, &[0.0, 5.0], &SimulationHistory::new(), false, &mut rng)
            .unwrap();
        assert_eq!(changed, 0);
    }

    #[test]
    fn success_length_must_match() {
        let mut agents = two_agents();
        let mut rng = StdRng::seed_from_u64(0);
        let err = ReplicatorDynamic::default()
            .adjust(&mut agents, &[1.0], &SimulationHistory::new(), false, &mut rng)
            .unwrap_err();
        assert!(matches!(err, EngineError::Quantification { .. }));
    }

    #[test]
    fn parameters_round_trip_through_with_parameters() {
        let adjuster = PreferentialAdaption::default()
            .with_parameters(&[0.3, 2.0])
            .unwrap();
        assert_eq!(adjuster.parameter_values(), vec![0.3, 2.0]);
        assert!(ReplicatorDynamic::default().with_parameters(&[1.2, 1.0]).is_err());
        assert!(ReplicatorDynamic::default().with_parameters(&[0.5, -1.0]).is_err());
    }
}
