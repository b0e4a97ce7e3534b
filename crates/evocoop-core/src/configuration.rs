//! Resolved simulation configurations and sweep expansion.
//!
//! A [`SimulationConfiguration`] holds already-resolved components and
//! validated values. [`SimulationConfiguration::expand`] turns it into one
//! or more [`RunConfiguration`]s: exactly one without a sweep, otherwise one
//! per sweep value. Each run configuration is executed `iterations` times
//! with seeds from [`derive_seed`].

use std::fmt;
use std::sync::Arc;

use evocoop_types::{ParameterError, PayoffEntry, PayoffMatrix};

use crate::adjustment::{ReplicatorDynamic, StrategyAdjuster};
use crate::component::replace_value;
use crate::equilibrium::{EquilibriumCriterion, StrategyCriterion};
use crate::error::ConfigurationError;
use crate::numeric::{count_to_f64, floor_to_count};
use crate::pairing::{PairBuilder, RandomPairBuilder};
use crate::population::{GroupSize, PopulationSpec};
use crate::success::{StepPayoff, SuccessQuantifier};

/// Upper bound on the number of configurations one sweep may produce.
pub const MAX_SWEEP_VALUES: usize = 10_000;

/// Slack added before flooring the sweep value count.
const SWEEP_TOLERANCE: f64 = 1e-9;

/// The four pluggable components of a run.
#[derive(Debug, Clone)]
pub struct Components {
    /// Matches agents for each step.
    pub pair_builder: Arc<dyn PairBuilder>,
    /// Turns step outcomes into success values.
    pub success: Arc<dyn SuccessQuantifier>,
    /// Revises strategies.
    pub adjuster: Arc<dyn StrategyAdjuster>,
    /// Ends the run once the population is stable.
    pub equilibrium: Arc<dyn EquilibriumCriterion>,
}

impl Default for Components {
    fn default() -> Self {
        Self {
            pair_builder: Arc::new(RandomPairBuilder),
            success: Arc::new(StepPayoff),
            adjuster: Arc::new(ReplicatorDynamic::default()),
            equilibrium: Arc::new(StrategyCriterion::default()),
        }
    }
}

/// What a numeric sweep varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTarget {
    /// Game rounds per pair and step.
    Rounds,
    /// Maximum number of adaptation steps.
    MaxAdapts,
    /// One payoff matrix entry.
    Payoff(PayoffEntry),
    /// The `i`-th pair builder parameter.
    PairBuilder(usize),
    /// The `i`-th success quantifier parameter.
    SuccessQuantifier(usize),
    /// The `i`-th strategy adjuster parameter.
    StrategyAdjuster(usize),
    /// The `i`-th equilibrium criterion parameter.
    EquilibriumCriterion(usize),
}

impl fmt::Display for SweepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rounds => f.write_str("rounds"),
            Self::MaxAdapts => f.write_str("max_adapts"),
            Self::Payoff(entry) => write!(f, "payoff.{}", entry.name()),
            Self::PairBuilder(i) => write!(f, "pair_builder[{i}]"),
            Self::SuccessQuantifier(i) => write!(f, "success_quantifier[{i}]"),
            Self::StrategyAdjuster(i) => write!(f, "strategy_adjuster[{i}]"),
            Self::EquilibriumCriterion(i) => write!(f, "equilibrium_criterion[{i}]"),
        }
    }
}

/// One varying dimension of a multi-configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Sweep {
    /// `start, start + step, ...` up to and including `end`.
    Numeric {
        /// The varied setting.
        target: SweepTarget,
        /// First value.
        start: f64,
        /// Last value (inclusive, within tolerance).
        end: f64,
        /// Increment; must be positive.
        step: f64,
    },
    /// An enumerated list of sizes for one named group.
    GroupSize {
        /// Name of the group.
        group: String,
        /// Sizes to run, in order.
        sizes: Vec<usize>,
    },
}

impl Sweep {
    /// Numeric values of a [`Sweep::Numeric`] range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSweep`] for a non-positive step,
    /// an inverted range, or too many values.
    pub fn numeric_values(start: f64, end: f64, step: f64) -> Result<Vec<f64>, ConfigurationError> {
        if !(start.is_finite() && end.is_finite() && step.is_finite()) {
            return Err(ConfigurationError::InvalidSweep {
                reason: "range bounds and step must be finite".to_owned(),
            });
        }
        if step <= 0.0 {
            return Err(ConfigurationError::InvalidSweep {
                reason: format!("step {step} must be positive"),
            });
        }
        if start > end {
            return Err(ConfigurationError::InvalidSweep {
                reason: format!("start {start} exceeds end {end}"),
            });
        }
        let count = floor_to_count((end - start) / step + SWEEP_TOLERANCE).saturating_add(1);
        if count > MAX_SWEEP_VALUES {
            return Err(ConfigurationError::InvalidSweep {
                reason: format!("{count} values exceed the limit of {MAX_SWEEP_VALUES}"),
            });
        }
        Ok((0..count).map(|k| start + count_to_f64(k) * step).collect())
    }
}

/// A fully resolved simulation request, possibly with a sweep.
#[derive(Debug, Clone)]
pub struct SimulationConfiguration {
    /// Game rounds per pair and step.
    pub rounds: u32,
    /// Runs per concrete configuration.
    pub iterations: u32,
    /// Maximum number of adaptation steps per run.
    pub max_adapts: u32,
    /// Whether adoption blends strategy vectors instead of replacing them.
    pub mixed_strategies: bool,
    /// Payoffs of the four game outcomes.
    pub payoff: PayoffMatrix,
    /// Base seed; `None` picks one at submission.
    pub seed: Option<u64>,
    /// Initial population description.
    pub population: PopulationSpec,
    /// Pluggable components.
    pub components: Components,
    /// Optional multi-configuration.
    pub sweep: Option<Sweep>,
}

impl Default for SimulationConfiguration {
    fn default() -> Self {
        Self {
            rounds: 10,
            iterations: 1,
            max_adapts: 100,
            mixed_strategies: false,
            payoff: PayoffMatrix::default(),
            seed: None,
            population: PopulationSpec::default(),
            components: Components::default(),
            sweep: None,
        }
    }
}

fn whole(target: &'static str, value: f64) -> Result<u32, ConfigurationError> {
    let error = ConfigurationError::NonIntegral { target, value };
    if value < 0.0 || value.fract().abs() > 0.0 || value > f64::from(u32::MAX) {
        return Err(error);
    }
    u32::try_from(floor_to_count(value)).map_err(|_err| error)
}

fn component_error(name: &'static str) -> impl FnOnce(ParameterError) -> ConfigurationError {
    move |source| ConfigurationError::Parameter {
        component: name.to_owned(),
        source,
    }
}

impl SimulationConfiguration {
    /// Check settings that are independent of the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSetting`] for a zero round,
    /// iteration or step budget, or an empty population.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let positive = [
            ("rounds", self.rounds),
            ("iterations", self.iterations),
            ("max_adapts", self.max_adapts),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigurationError::InvalidSetting {
                    field,
                    reason: "must be at least 1".to_owned(),
                });
            }
        }
        if self.population.groups.is_empty() {
            return Err(ConfigurationError::InvalidSetting {
                field: "population",
                reason: "at least one group is required".to_owned(),
            });
        }
        let payoffs = [
            self.payoff.reward,
            self.payoff.sucker,
            self.payoff.temptation,
            self.payoff.punishment,
        ];
        if payoffs.iter().any(|p| !p.is_finite()) {
            return Err(ConfigurationError::InvalidSetting {
                field: "payoff",
                reason: "payoffs must be finite".to_owned(),
            });
        }
        Ok(())
    }

    /// Expand into concrete run configurations, indexed from zero.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if validation fails, the sweep is
    /// malformed, or a swept value is rejected by its target.
    pub fn expand(&self) -> Result<Vec<RunConfiguration>, ConfigurationError> {
        self.validate()?;
        let base = RunConfiguration {
            index: 0,
            label: "base".to_owned(),
            rounds: self.rounds,
            max_adapts: self.max_adapts,
            mixed_strategies: self.mixed_strategies,
            payoff: self.payoff,
            population: self.population.clone(),
            components: self.components.clone(),
        };

        match &self.sweep {
            None => Ok(vec![base]),
            Some(Sweep::Numeric {
                target,
                start,
                end,
                step,
            }) => Sweep::numeric_values(*start, *end, *step)?
                .into_iter()
                .enumerate()
                .map(|(index, value)| {
                    let mut run = base.clone();
                    run.index = index;
                    run.label = format!("{target}={value}");
                    run.apply(*target, value)?;
                    Ok::<_, ConfigurationError>(run)
                })
                .collect(),
            Some(Sweep::GroupSize { group, sizes }) => {
                if sizes.is_empty() {
                    return Err(ConfigurationError::InvalidSweep {
                        reason: "group-size sweep has no sizes".to_owned(),
                    });
                }
                sizes
                    .iter()
                    .enumerate()
                    .map(|(index, &size)| {
                        let mut run = base.clone();
                        run.index = index;
                        run.label = format!("{group}.size={size}");
                        run.population
                            .group_mut(group)
                            .ok_or_else(|| ConfigurationError::UnknownGroup {
                                name: group.clone(),
                            })?
                            .size = GroupSize::Fixed(size);
                        Ok::<_, ConfigurationError>(run)
                    })
                    .collect()
            }
        }
    }

    /// Total number of runs the configuration produces.
    ///
    /// # Errors
    ///
    /// See [`expand`](Self::expand).
    pub fn total_runs(&self) -> Result<usize, ConfigurationError> {
        let configurations = self.expand()?.len();
        usize::try_from(self.iterations)
            .ok()
            .and_then(|i| configurations.checked_mul(i))
            .ok_or_else(|| ConfigurationError::InvalidSetting {
                field: "iterations",
                reason: "total run count overflows".to_owned(),
            })
    }
}

/// One concrete configuration, free of sweeps.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Position within the expanded sweep.
    pub index: usize,
    /// Human-readable description of the swept value.
    pub label: String,
    /// Game rounds per pair and step.
    pub rounds: u32,
    /// Maximum number of adaptation steps.
    pub max_adapts: u32,
    /// Whether adoption blends strategy vectors.
    pub mixed_strategies: bool,
    /// Payoffs of the four game outcomes.
    pub payoff: PayoffMatrix,
    /// Initial population description.
    pub population: PopulationSpec,
    /// Pluggable components.
    pub components: Components,
}

impl RunConfiguration {
    /// Set the swept value on this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::NonIntegral`] for fractional counts and
    /// [`ConfigurationError::Parameter`] when a component rejects the value.
    pub fn apply(&mut self, target: SweepTarget, value: f64) -> Result<(), ConfigurationError> {
        match target {
            SweepTarget::Rounds => {
                self.rounds = whole("rounds", value)?;
                if self.rounds == 0 {
                    return Err(ConfigurationError::InvalidSetting {
                        field: "rounds",
                        reason: "must be at least 1".to_owned(),
                    });
                }
            }
            SweepTarget::MaxAdapts => {
                self.max_adapts = whole("max_adapts", value)?;
                if self.max_adapts == 0 {
                    return Err(ConfigurationError::InvalidSetting {
                        field: "max_adapts",
                        reason: "must be at least 1".to_owned(),
                    });
                }
            }
            SweepTarget::Payoff(entry) => {
                self.payoff = self.payoff.with_entry(entry, value);
            }
            SweepTarget::PairBuilder(i) => {
                let c = &self.components.pair_builder;
                let values = replace_value(&c.parameter_values(), i, value)
                    .map_err(component_error(c.name()))?;
                self.components.pair_builder =
                    c.with_parameters(&values).map_err(component_error(c.name()))?;
            }
            SweepTarget::SuccessQuantifier(i) => {
                let c = &self.components.success;
                let values = replace_value(&c.parameter_values(), i, value)
                    .map_err(component_error(c.name()))?;
                self.components.success =
                    c.with_parameters(&values).map_err(component_error(c.name()))?;
            }
            SweepTarget::StrategyAdjuster(i) => {
                let c = &self.components.adjuster;
                let values = replace_value(&c.parameter_values(), i, value)
                    .map_err(component_error(c.name()))?;
                self.components.adjuster =
                    c.with_parameters(&values).map_err(component_error(c.name()))?;
            }
            SweepTarget::EquilibriumCriterion(i) => {
                let c = &self.components.equilibrium;
                let values = replace_value(&c.parameter_values(), i, value)
                    .map_err(component_error(c.name()))?;
                self.components.equilibrium =
                    c.with_parameters(&values).map_err(component_error(c.name()))?;
            }
        }
        Ok(())
    }
}

/// Seed of one run, derived from the base seed and the run's coordinates.
///
/// Uses the `SplitMix64` finalizer so neighbouring coordinates produce
/// unrelated seeds.
pub fn derive_seed(base: u64, configuration: usize, iteration: u32) -> u64 {
    let configuration = u64::try_from(configuration).unwrap_or(u64::MAX);
    let mut z = base
        .wrapping_add(configuration.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(u64::from(iteration).wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evocoop_strategy::builtin;

    use super::*;
    use crate::population::{GroupSpec, InitialCapital, Segment};

    fn config() -> SimulationConfiguration {
        SimulationConfiguration {
            population: PopulationSpec {
                groups: vec![GroupSpec {
                    name: "main".to_owned(),
                    size: GroupSize::Fixed(4),
                    capital: InitialCapital::default(),
                    segments: vec![Segment {
                        strategy: builtin::grim(),
                        weight: 1.0,
                    }],
                }],
            },
            ..SimulationConfiguration::default()
        }
    }

    #[test]
    fn no_sweep_yields_one_configuration() {
        let runs = config().expand().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs.first().unwrap().index, 0);
    }

    #[test]
    fn numeric_values_include_end() {
        let v = Sweep::numeric_values(0.1, 0.5, 0.1).unwrap();
        assert_eq!(v.len(), 5);
        assert!((v.last().unwrap() - 0.5).abs() < 1e-9);
        assert!(Sweep::numeric_values(1.0, 0.0, 0.1).is_err());
        assert!(Sweep::numeric_values(0.0, 1.0, 0.0).is_err());
        assert!(Sweep::numeric_values(0.0, 1e9, 1.0).is_err());
    }

    #[test]
    fn rounds_sweep_sets_rounds() {
        let mut c = config();
        c.sweep = Some(Sweep::Numeric {
            target: SweepTarget::Rounds,
            start: 1.0,
            end: 3.0,
            step: 1.0,
        });
        let runs = c.expand().unwrap();
        let rounds: Vec<u32> = runs.iter().map(|r| r.rounds).collect();
        assert_eq!(rounds, vec![1, 2, 3]);
        let indices: Vec<usize> = runs.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn fractional_rounds_rejected() {
        let mut c = config();
        c.sweep = Some(Sweep::Numeric {
            target: SweepTarget::Rounds,
            start: 1.0,
            end: 2.0,
            step: 0.5,
        });
        assert!(matches!(
            c.expand(),
            Err(ConfigurationError::NonIntegral { .. })
        ));
    }

    #[test]
    fn component_parameter_sweep() {
        let mut c = config();
        c.components.adjuster = Arc::new(ReplicatorDynamic::default());
        c.sweep = Some(Sweep::Numeric {
            target: SweepTarget::StrategyAdjuster(1),
            start: 0.5,
            end: 1.5,
            step: 0.5,
        });
        let runs = c.expand().unwrap();
        let factors: Vec<f64> = runs
            .iter()
            .map(|r| *r.components.adjuster.parameter_values().get(1).unwrap())
            .collect();
        assert_eq!(factors, vec![0.5, 1.0, 1.5]);

        c.sweep = Some(Sweep::Numeric {
            target: SweepTarget::StrategyAdjuster(0),
            start: 0.5,
            end: 1.5,
            step: 0.5,
        });
        assert!(matches!(
            c.expand(),
            Err(ConfigurationError::Parameter { .. })
        ));
    }

    #[test]
    fn payoff_sweep() {
        let mut c = config();
        c.sweep = Some(Sweep::Numeric {
            target: SweepTarget::Payoff(PayoffEntry::Temptation),
            start: 4.0,
            end: 6.0,
            step: 1.0,
        });
        let runs = c.expand().unwrap();
        assert!((runs.last().unwrap().payoff.temptation - 6.0).abs() < 1e-12);
    }

    #[test]
    fn group_size_sweep() {
        let mut c = config();
        c.sweep = Some(Sweep::GroupSize {
            group: "main".to_owned(),
            sizes: vec![2, 6],
        });
        let runs = c.expand().unwrap();
        assert_eq!(runs.len(), 2);
        assert!(matches!(
            runs.get(1).unwrap().population.groups.first().unwrap().size,
            GroupSize::Fixed(6)
        ));

        c.sweep = Some(Sweep::GroupSize {
            group: "missing".to_owned(),
            sizes: vec![2],
        });
        assert!(matches!(
            c.expand(),
            Err(ConfigurationError::UnknownGroup { .. })
        ));
    }

    #[test]
    fn validation_rejects_zero_budgets() {
        let mut c = config();
        c.iterations = 0;
        assert!(c.validate().is_err());
        let mut c = config();
        c.population.groups.clear();
        assert!(c.validate().is_err());
    }

    #[test]
    fn total_runs_multiplies() {
        let mut c = config();
        c.iterations = 4;
        c.sweep = Some(Sweep::GroupSize {
            group: "main".to_owned(),
            sizes: vec![2, 4, 6],
        });
        assert_eq!(c.total_runs().unwrap(), 12);
    }

    #[test]
    fn derived_seeds_differ() {
        let a = derive_seed(7, 0, 0);
        assert_eq!(a, derive_seed(7, 0, 0));
        assert_ne!(a, derive_seed(7, 0, 1));
        assert_ne!(a, derive_seed(7, 1, 0));
        assert_ne!(a, derive_seed(8, 0, 0));
    }
}
