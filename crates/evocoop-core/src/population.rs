//! Population assembly from group specifications.
//!
//! Each group contributes a number of agents (fixed or drawn from a
//! distribution) with an initial capital (fixed or drawn per agent). The
//! group's weighted segments are turned into exactly `size` strategy slots
//! by largest-remainder apportionment, and the slots are dealt to agents by
//! destructive draws so every slot is used exactly once.

use std::sync::Arc;

use evocoop_sampling::{DiscreteDistribution, FiniteDistribution};
use evocoop_strategy::Strategy;
use evocoop_types::AgentId;
use rand::RngCore;
use tracing::debug;

use crate::agent::Agent;
use crate::error::EngineError;
use crate::numeric::{count_to_f64, floor_to_count, int_to_f64};

/// How many agents a group contributes.
#[derive(Debug, Clone)]
pub enum GroupSize {
    /// Exactly this many agents.
    Fixed(usize),
    /// A value drawn once per run; negative draws yield an empty group.
    Drawn(Arc<dyn DiscreteDistribution>),
}

/// The initial capital of each agent in a group.
#[derive(Debug, Clone)]
pub enum InitialCapital {
    /// The same capital for every agent.
    Fixed(f64),
    /// A value drawn independently for every agent.
    Drawn(Arc<dyn DiscreteDistribution>),
}

impl Default for InitialCapital {
    fn default() -> Self {
        Self::Fixed(0.0)
    }
}

/// A share of a group playing one strategy.
#[derive(Debug, Clone)]
pub struct Segment {
    /// The strategy played by this share.
    pub strategy: Strategy,
    /// Relative weight; weights within a group need not sum to one.
    pub weight: f64,
}

/// A named group of agents.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    /// Group name, used by group-size sweeps.
    pub name: String,
    /// Number of agents.
    pub size: GroupSize,
    /// Initial capital.
    pub capital: InitialCapital,
    /// Weighted strategy segments.
    pub segments: Vec<Segment>,
}

/// The full population description.
#[derive(Debug, Clone, Default)]
pub struct PopulationSpec {
    /// Groups in assembly order.
    pub groups: Vec<GroupSpec>,
}

impl PopulationSpec {
    /// Look up a group by name.
    pub fn group_mut(&mut self, name: &str) -> Option<&mut GroupSpec> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Build the agents of one run.
    ///
    /// Agent ids are assigned sequentially from zero in group order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Population`] for a group with agents but no
    /// usable segments, and [`EngineError::Sampling`] if a draw fails.
    pub fn assemble(&self, rng: &mut dyn RngCore) -> Result<Vec<Agent>, EngineError> {
        let mut agents = Vec::new();
        let mut next_id: u32 = 0;

        for group in &self.groups {
            let size = match &group.size {
                GroupSize::Fixed(n) => *n,
                GroupSize::Drawn(dist) => {
                    usize::try_from(dist.picker()?.pick(rng).max(0)).unwrap_or(usize::MAX)
                }
            };
            if size == 0 {
                continue;
            }

            let slots = apportion(&group.segments, size).ok_or_else(|| EngineError::Population {
                reason: format!("group {} has no segment with positive weight", group.name),
            })?;
            let mut deck: FiniteDistribution<Strategy> = group
                .segments
                .iter()
                .zip(slots)
                .flat_map(|(segment, count)| std::iter::repeat_n(segment.strategy.clone(), count))
                .collect();

            let capital_picker = match &group.capital {
                InitialCapital::Drawn(dist) => Some(dist.picker()?),
                InitialCapital::Fixed(_) => None,
            };

            for _ in 0..size {
                let strategy = deck.pick_and_remove(rng)?;
                let capital = match (&group.capital, &capital_picker) {
                    (_, Some(picker)) => int_to_f64(picker.pick(rng)),
                    (InitialCapital::Fixed(c), None) => *c,
                    (InitialCapital::Drawn(_), None) => 0.0,
                };
                agents.push(Agent::new(
                    AgentId(next_id),
                    strategy,
                    capital,
                    group.name.clone(),
                ));
                next_id = next_id.checked_add(1).ok_or_else(|| EngineError::Population {
                    reason: "too many agents".to_owned(),
                })?;
            }

            debug!(group = %group.name, size, "Group assembled");
        }

        Ok(agents)
    }
}

/// Split `size` slots across segments proportionally to their weights.
///
/// Floors of the exact quotas are assigned first; the remaining slots go to
/// the largest fractional parts, earlier segments first on ties. Returns
/// `None` if no segment has a positive finite weight.
pub fn apportion(segments: &[Segment], size: usize) -> Option<Vec<usize>> {
    let weights: Vec<f64> = segments
        .iter()
        .map(|s| {
            if s.weight.is_finite() && s.weight > 0.0 {
                s.weight
            } else {
                0.0
            }
        })
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let size_f = count_to_f64(size);
    let quotas: Vec<f64> = weights.iter().map(|w| w / total * size_f).collect();
    let mut counts: Vec<usize> = quotas.iter().map(|q| floor_to_count(*q)).collect();

    let assigned: usize = counts.iter().sum();
    let mut order: Vec<usize> = (0..segments.len()).collect();
    order.sort_by(|&a, &b| {
        let fa = quotas.get(a).map_or(0.0, |q| q - q.floor());
        let fb = quotas.get(b).map_or(0.0, |q| q - q.floor());
        fb.total_cmp(&fa)
    });
    for idx in order
        .into_iter()
        .filter(|&i| weights.get(i).is_some_and(|w| *w > 0.0))
        .cycle()
        .take(size.saturating_sub(assigned))
    {
        if let Some(count) = counts.get_mut(idx) {
            *count = count.saturating_add(1);
        }
    }

    Some(counts)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evocoop_sampling::UniformDiscrete;
    use evocoop_strategy::builtin;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn segment(strategy: Strategy, weight: f64) -> Segment {
        Segment { strategy, weight }
    }

    #[test]
    fn largest_remainder_apportionment() {
        let segments = vec![
            segment(builtin::grim(), 1.0),
            segment(builtin::tit_for_tat(), 1.0),
            segment(builtin::pavlov(), 1.0),
        ];
        let counts = apportion(&segments, 10).unwrap();
        assert_eq!(counts.iter().sum::<usize>(), 10);
        assert_eq!(counts, vec![4, 3, 3]);

        let skewed = vec![
            segment(builtin::grim(), 3.0),
            segment(builtin::always_defect(), 1.0),
        ];
        assert_eq!(apportion(&skewed, 6).unwrap(), vec![5, 1]);
    }

    #[test]
    fn zero_weights_are_rejected() {
        let segments = vec![segment(builtin::grim(), 0.0)];
        assert!(apportion(&segments, 3).is_none());
        assert!(apportion(&[], 3).is_none());
    }

    #[test]
    fn assemble_deals_every_slot() {
        let spec = PopulationSpec {
            groups: vec![GroupSpec {
                name: "mixed".to_owned(),
                size: GroupSize::Fixed(9),
                capital: InitialCapital::Fixed(2.5),
                segments: vec![
                    segment(builtin::always_cooperate(), 2.0),
                    segment(builtin::always_defect(), 1.0),
                ],
            }],
        };
        let mut rng = StdRng::seed_from_u64(42);
        let agents = spec.assemble(&mut rng).unwrap();
        assert_eq!(agents.len(), 9);
        let cooperators = agents
            .iter()
            .filter(|a| a.strategy.name() == "always-cooperate")
            .count();
        assert_eq!(cooperators, 6);
        assert!(agents.iter().all(|a| (a.capital - 2.5).abs() < f64::EPSILON));
        let ids: Vec<u32> = agents.iter().map(|a| a.id.value()).collect();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn drawn_size_and_capital() {
        let spec = PopulationSpec {
            groups: vec![
                GroupSpec {
                    name: "a".to_owned(),
                    size: GroupSize::Drawn(Arc::new(UniformDiscrete::new(3, 6).unwrap())),
                    capital: InitialCapital::Drawn(Arc::new(UniformDiscrete::new(10, 20).unwrap())),
                    segments: vec![segment(builtin::grim(), 1.0)],
                },
                GroupSpec {
                    name: "b".to_owned(),
                    size: GroupSize::Fixed(2),
                    capital: InitialCapital::default(),
                    segments: vec![segment(builtin::pavlov(), 1.0)],
                },
            ],
        };
        let mut rng = StdRng::seed_from_u64(1);
        let agents = spec.assemble(&mut rng).unwrap();
        let in_a: Vec<&Agent> = agents.iter().filter(|a| a.group == "a").collect();
        assert!((3..=6).contains(&in_a.len()));
        assert!(in_a.iter().all(|a| (10.0..=20.0).contains(&a.capital)));
        assert_eq!(agents.len(), in_a.len() + 2);
    }

    #[test]
    fn assembly_is_reproducible() {
        let spec = PopulationSpec {
            groups: vec![GroupSpec {
                name: "g".to_owned(),
                size: GroupSize::Fixed(12),
                capital: InitialCapital::Fixed(0.0),
                segments: vec![
                    segment(builtin::grim(), 1.0),
                    segment(builtin::tit_for_tat(), 1.0),
                ],
            }],
        };
        let a = spec.assemble(&mut StdRng::seed_from_u64(8)).unwrap();
        let b = spec.assemble(&mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn group_without_segments_fails() {
        let spec = PopulationSpec {
            groups: vec![GroupSpec {
                name: "empty".to_owned(),
                size: GroupSize::Fixed(3),
                capital: InitialCapital::default(),
                segments: Vec::new(),
            }],
        };
        let err = spec.assemble(&mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, EngineError::Population { .. }));
    }
}
