//! The strategy model: pure conditions and probability-weighted mixtures.
//!
//! Every strategy answers two questions about an [`Encounter`]:
//!
//! - [`Strategy::cooperates`] -- the sampled decision for this round.
//! - [`Strategy::cooperation_probability`] -- how likely cooperation is,
//!   used by cooperation-maximizing pairing and preferential adaption.
//!
//! Pure strategies are identified by name: two pure strategies with the
//! same name are the same basis vector when a strategy is viewed as a
//! probability vector. A pure strategy maps to the unit vector of its own
//! name, so pure and mixed strategies share one vector space and can be
//! compared and interpolated.

use std::fmt;
use std::sync::Arc;

use evocoop_types::{AgentId, SimulationHistory};
use rand::{Rng, RngCore};

use crate::error::StrategyError;

/// Tolerance for the sum-to-one invariant of mixed strategies.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Largest Euclidean distance between two probability vectors.
const MAX_DISTANCE: f64 = std::f64::consts::SQRT_2;

/// The situation a strategy decides on: who plays whom, and what happened
/// so far in the current adaptation step.
#[derive(Debug, Clone, Copy)]
pub struct Encounter<'a> {
    /// The deciding agent.
    pub player: AgentId,
    /// The agent it faces.
    pub opponent: AgentId,
    /// Games of the current adaptation step.
    pub history: &'a SimulationHistory,
}

impl<'a> Encounter<'a> {
    /// Create an encounter.
    pub const fn new(player: AgentId, opponent: AgentId, history: &'a SimulationHistory) -> Self {
        Self {
            player,
            opponent,
            history,
        }
    }

    /// The same encounter seen from the opponent's seat.
    #[must_use]
    pub const fn reversed(&self) -> Self {
        Self {
            player: self.opponent,
            opponent: self.player,
            history: self.history,
        }
    }
}

/// A (possibly probabilistic) cooperation predicate.
pub trait Condition: Send + Sync + fmt::Debug {
    /// Sample a cooperation decision.
    fn cooperates(&self, encounter: &Encounter<'_>, rng: &mut dyn RngCore) -> bool;

    /// Probability that [`cooperates`](Self::cooperates) returns `true`.
    fn cooperation_probability(&self, encounter: &Encounter<'_>) -> f64;
}

/// A named strategy wrapping one [`Condition`].
#[derive(Clone)]
pub struct PureStrategy {
    name: Arc<str>,
    condition: Arc<dyn Condition>,
}

impl PureStrategy {
    /// Wrap a condition under a name.
    pub fn new(name: impl Into<Arc<str>>, condition: Arc<dyn Condition>) -> Self {
        Self {
            name: name.into(),
            condition,
        }
    }

    /// The strategy name, which is also its identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sample a cooperation decision.
    pub fn cooperates(&self, encounter: &Encounter<'_>, rng: &mut dyn RngCore) -> bool {
        self.condition.cooperates(encounter, rng)
    }

    /// Probability of cooperating in this encounter.
    pub fn cooperation_probability(&self, encounter: &Encounter<'_>) -> f64 {
        self.condition.cooperation_probability(encounter)
    }
}

impl PartialEq for PureStrategy {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for PureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PureStrategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A probability-weighted blend of pure strategies.
///
/// Invariant after construction or [`normalize`](Self::normalize):
/// probabilities are non-negative and sum to one within
/// [`PROBABILITY_TOLERANCE`]. The vector operations
/// ([`add`](Self::add), [`multiply_by`](Self::multiply_by)) may leave the
/// vector unnormalized on purpose; callers renormalize afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedStrategy {
    components: Vec<(PureStrategy, f64)>,
}

impl MixedStrategy {
    /// Build a mixture from `(strategy, probability)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::EmptyMixture`], [`StrategyError::InvalidProbability`],
    /// [`StrategyError::DuplicateComponent`] or [`StrategyError::NotNormalized`]
    /// when the invariant does not hold.
    pub fn new(components: Vec<(PureStrategy, f64)>) -> Result<Self, StrategyError> {
        if components.is_empty() {
            return Err(StrategyError::EmptyMixture);
        }
        for (idx, (strategy, probability)) in components.iter().enumerate() {
            if !probability.is_finite() || *probability < 0.0 {
                return Err(StrategyError::InvalidProbability {
                    name: strategy.name().to_owned(),
                    probability: *probability,
                });
            }
            if components
                .iter()
                .take(idx)
                .any(|(earlier, _)| earlier == strategy)
            {
                return Err(StrategyError::DuplicateComponent {
                    name: strategy.name().to_owned(),
                });
            }
        }
        let mixed = Self { components };
        let sum = mixed.sum_norm();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(StrategyError::NotNormalized { sum });
        }
        Ok(mixed)
    }

    /// A mixture putting all weight on one pure strategy.
    pub fn from_pure(strategy: PureStrategy) -> Self {
        Self {
            components: vec![(strategy, 1.0)],
        }
    }

    /// The `(strategy, probability)` pairs in order.
    pub fn components(&self) -> &[(PureStrategy, f64)] {
        &self.components
    }

    /// Weight of the pure strategy named `name` (`0` if absent).
    pub fn probability_of(&self, name: &str) -> f64 {
        self.components
            .iter()
            .filter(|(s, _)| s.name() == name)
            .map(|(_, p)| *p)
            .sum()
    }

    /// Euclidean length of the probability vector.
    pub fn euclidean_norm(&self) -> f64 {
        self.components
            .iter()
            .map(|(_, p)| p * p)
            .sum::<f64>()
            .sqrt()
    }

    /// Sum of absolute probabilities.
    pub fn sum_norm(&self) -> f64 {
        self.components.iter().map(|(_, p)| p.abs()).sum()
    }

    /// Scale every probability by `factor`.
    pub fn multiply_by(&mut self, factor: f64) {
        for (_, p) in &mut self.components {
            *p *= factor;
        }
    }

    /// Add `other` component-wise; components missing here are appended.
    pub fn add(&mut self, other: &Self) {
        for (strategy, p) in &other.components {
            match self.components.iter_mut().find(|(s, _)| s == strategy) {
                Some((_, mine)) => *mine += p,
                None => self.components.push((strategy.clone(), *p)),
            }
        }
    }

    /// Whether the probabilities sum to one within tolerance.
    pub fn is_normalized(&self) -> bool {
        (self.sum_norm() - 1.0).abs() <= PROBABILITY_TOLERANCE
    }

    /// Rescale to sum to one and drop zero-weight components.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::NotNormalized`] if the vector sums to zero.
    pub fn normalize(&mut self) -> Result<(), StrategyError> {
        let sum = self.sum_norm();
        if sum <= 0.0 || !sum.is_finite() {
            return Err(StrategyError::NotNormalized { sum });
        }
        self.multiply_by(1.0 / sum);
        self.components.retain(|(_, p)| *p > 0.0);
        Ok(())
    }

    /// Euclidean distance between the two probability vectors.
    pub fn distance(&self, other: &Self) -> f64 {
        let mut squared: f64 = self
            .components
            .iter()
            .map(|(s, p)| {
                let d = p - other.probability_of(s.name());
                d * d
            })
            .sum();
        squared += other
            .components
            .iter()
            .filter(|(s, _)| !self.components.iter().any(|(mine, _)| mine == s))
            .map(|(_, p)| p * p)
            .sum::<f64>();
        squared.sqrt()
    }

    /// Linear interpolation `(1 - weight) * self + weight * other`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::InvalidWeight`] if `weight` is outside
    /// `[0, 1]`.
    pub fn interpolate(&self, other: &Self, weight: f64) -> Result<Self, StrategyError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(StrategyError::InvalidWeight { weight });
        }
        let mut mine = self.clone();
        mine.multiply_by(1.0 - weight);
        let mut theirs = other.clone();
        theirs.multiply_by(weight);
        mine.add(&theirs);
        mine.normalize()?;
        Ok(mine)
    }

    /// Sample a component, then let it decide.
    pub fn cooperates(&self, encounter: &Encounter<'_>, rng: &mut dyn RngCore) -> bool {
        let u: f64 = rng.random::<f64>() * self.sum_norm();
        let mut acc = 0.0;
        for (strategy, p) in &self.components {
            acc += p;
            if u < acc {
                return strategy.cooperates(encounter, rng);
            }
        }
        self.components
            .last()
            .is_some_and(|(strategy, _)| strategy.cooperates(encounter, rng))
    }

    /// Weighted cooperation probability of the components.
    pub fn cooperation_probability(&self, encounter: &Encounter<'_>) -> f64 {
        self.components
            .iter()
            .map(|(s, p)| p * s.cooperation_probability(encounter))
            .sum()
    }
}

impl fmt::Display for MixedStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MIXED[")?;
        for (idx, (strategy, p)) in self.components.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{strategy}:{p:.3}")?;
        }
        f.write_str("]")
    }
}

/// A strategy an agent plays: pure or mixed.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// A single named condition.
    Pure(PureStrategy),
    /// A probability-weighted blend.
    Mixed(MixedStrategy),
}

impl Strategy {
    /// Display name.
    pub fn name(&self) -> String {
        match self {
            Self::Pure(p) => p.name().to_owned(),
            Self::Mixed(m) => m.to_string(),
        }
    }

    /// Sample a cooperation decision.
    pub fn cooperates(&self, encounter: &Encounter<'_>, rng: &mut dyn RngCore) -> bool {
        match self {
            Self::Pure(p) => p.cooperates(encounter, rng),
            Self::Mixed(m) => m.cooperates(encounter, rng),
        }
    }

    /// Probability of cooperating in this encounter.
    pub fn cooperation_probability(&self, encounter: &Encounter<'_>) -> f64 {
        match self {
            Self::Pure(p) => p.cooperation_probability(encounter),
            Self::Mixed(m) => m.cooperation_probability(encounter),
        }
    }

    /// This strategy as a probability vector over pure strategies.
    pub fn to_mixed(&self) -> MixedStrategy {
        match self {
            Self::Pure(p) => MixedStrategy::from_pure(p.clone()),
            Self::Mixed(m) => m.clone(),
        }
    }

    /// Interpolate towards `other` by `weight`, producing a mixed strategy.
    ///
    /// # Errors
    ///
    /// See [`MixedStrategy::interpolate`].
    pub fn interpolate(&self, other: &Self, weight: f64) -> Result<Self, StrategyError> {
        self.to_mixed()
            .interpolate(&other.to_mixed(), weight)
            .map(Self::Mixed)
    }

    /// Distance to `other` in `[0, 1]`, comparable across pure and mixed
    /// strategies.
    pub fn displacement(&self, other: &Self) -> f64 {
        (self.to_mixed().distance(&other.to_mixed()) / MAX_DISTANCE).clamp(0.0, 1.0)
    }
}

impl From<PureStrategy> for Strategy {
    fn from(strategy: PureStrategy) -> Self {
        Self::Pure(strategy)
    }
}

impl From<MixedStrategy> for Strategy {
    fn from(strategy: MixedStrategy) -> Self {
        Self::Mixed(strategy)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pure(p) => fmt::Display::fmt(p, f),
            Self::Mixed(m) => fmt::Display::fmt(m, f),
        }
    }
}
