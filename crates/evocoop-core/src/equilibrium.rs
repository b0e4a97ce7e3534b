//! Equilibrium criteria and the streak monitor.
//!
//! After every step the engine takes a [`StepSnapshot`] (success ranks and
//! strategies) and hands it to the [`EquilibriumMonitor`]. The criterion
//! measures the displacement between consecutive snapshots; a step counts
//! towards equilibrium when the displacement is at most `strictness`, and
//! `required_steps` consecutive counting steps end the run. The first step
//! has no predecessor and never counts.

use std::sync::Arc;

use evocoop_strategy::Strategy;
use evocoop_types::{Parameter, ParameterError};

use crate::component::{Component, check_component, value_or};
use crate::error::EngineError;
use crate::numeric::{count_to_f64, floor_to_count, mean};

/// Population state at the end of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSnapshot {
    /// Normalized success ranks, in agent order.
    pub ranks: Vec<f64>,
    /// Strategies after adjustment, in agent order.
    pub strategies: Vec<Strategy>,
}

/// Decides when the population has stopped changing.
pub trait EquilibriumCriterion: Component {
    /// Mean displacement between two consecutive snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Equilibrium`] if the snapshots describe
    /// different population sizes.
    fn displacement(
        &self,
        previous: &StepSnapshot,
        current: &StepSnapshot,
    ) -> Result<f64, EngineError>;

    /// Largest displacement that still counts as stable.
    fn strictness(&self) -> f64;

    /// Number of consecutive stable steps needed.
    fn required_steps(&self) -> u32;

    /// A copy of this criterion with new parameter values.
    ///
    /// # Errors
    ///
    /// Returns a [`ParameterError`] if the values are rejected.
    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn EquilibriumCriterion>, ParameterError>;
}

fn same_size(previous: usize, current: usize) -> Result<(), EngineError> {
    if previous == current {
        Ok(())
    } else {
        Err(EngineError::Equilibrium {
            reason: format!("population size changed from {previous} to {current}"),
        })
    }
}

/// Settings shared by both criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumSettings {
    /// Largest displacement counted as stable.
    pub strictness: f64,
    /// Consecutive stable steps needed.
    pub required_steps: u32,
}

impl Default for EquilibriumSettings {
    fn default() -> Self {
        Self {
            strictness: 0.01,
            required_steps: 3,
        }
    }
}

impl EquilibriumSettings {
    fn declared() -> Vec<Parameter> {
        vec![
            Parameter::probability("strictness"),
            Parameter::count("required_steps", 1),
        ]
    }

    fn values(self) -> Vec<f64> {
        vec![self.strictness, f64::from(self.required_steps)]
    }

    fn from_values(values: &[f64]) -> Self {
        let defaults = Self::default();
        let steps = floor_to_count(value_or(values, 1, f64::from(defaults.required_steps)));
        Self {
            strictness: value_or(values, 0, defaults.strictness),
            required_steps: u32::try_from(steps).unwrap_or(u32::MAX).max(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Mean absolute change of normalized success ranks.
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingCriterion {
    /// Shared settings.
    pub settings: EquilibriumSettings,
}

impl Component for RankingCriterion {
    fn name(&self) -> &'static str {
        "ranking"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        EquilibriumSettings::declared()
    }

    fn parameter_values(&self) -> Vec<f64> {
        self.settings.values()
    }
}

impl EquilibriumCriterion for RankingCriterion {
    fn displacement(
        &self,
        previous: &StepSnapshot,
        current: &StepSnapshot,
    ) -> Result<f64, EngineError> {
        same_size(previous.ranks.len(), current.ranks.len())?;
        Ok(mean(
            previous
                .ranks
                .iter()
                .zip(&current.ranks)
                .map(|(a, b)| (a - b).abs()),
        ))
    }

    fn strictness(&self) -> f64 {
        self.settings.strictness
    }

    fn required_steps(&self) -> u32 {
        self.settings.required_steps
    }

    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn EquilibriumCriterion>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self {
            settings: EquilibriumSettings::from_values(values),
        }))
    }
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Mean normalized strategy displacement, comparable across pure and mixed
/// strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyCriterion {
    /// Shared settings.
    pub settings: EquilibriumSettings,
}

impl Component for StrategyCriterion {
    fn name(&self) -> &'static str {
        "strategy"
    }

    fn declared_parameters(&self) -> Vec<Parameter> {
        EquilibriumSettings::declared()
    }

    fn parameter_values(&self) -> Vec<f64> {
        self.settings.values()
    }
}

impl EquilibriumCriterion for StrategyCriterion {
    fn displacement(
        &self,
        previous: &StepSnapshot,
        current: &StepSnapshot,
    ) -> Result<f64, EngineError> {
        same_size(previous.strategies.len(), current.strategies.len())?;
        Ok(mean(
            previous
                .strategies
                .iter()
                .zip(&current.strategies)
                .map(|(a, b)| a.displacement(b)),
        ))
    }

    fn strictness(&self) -> f64 {
        self.settings.strictness
    }

    fn required_steps(&self) -> u32 {
        self.settings.required_steps
    }

    fn with_parameters(
        &self,
        values: &[f64],
    ) -> Result<Arc<dyn EquilibriumCriterion>, ParameterError> {
        check_component(self, values)?;
        Ok(Arc::new(Self {
            settings: EquilibriumSettings::from_values(values),
        }))
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Tracks consecutive stable steps for one run.
#[derive(Debug, Clone, Default)]
pub struct EquilibriumMonitor {
    previous: Option<StepSnapshot>,
    streak: u32,
    last_displacement: Option<f64>,
}

impl EquilibriumMonitor {
    /// Create a monitor with no history.
    pub const fn new() -> Self {
        Self {
            previous: None,
            streak: 0,
            last_displacement: None,
        }
    }

    /// Record a step and report whether equilibrium has been reached.
    ///
    /// # Errors
    ///
    /// Propagates [`EquilibriumCriterion::displacement`] errors.
    pub fn observe(
        &mut self,
        criterion: &dyn EquilibriumCriterion,
        snapshot: StepSnapshot,
    ) -> Result<bool, EngineError> {
        if let Some(previous) = &self.previous {
            let d = criterion.displacement(previous, &snapshot)?;
            self.last_displacement = Some(d);
            if d <= criterion.strictness() {
                self.streak = self.streak.saturating_add(1);
            } else {
                self.streak = 0;
            }
        }
        self.previous = Some(snapshot);
        Ok(self.streak >= criterion.required_steps().max(1))
    }

    /// Current number of consecutive stable steps.
    pub const fn streak(&self) -> u32 {
        self.streak
    }

    /// Displacement measured at the last step, if any.
    pub const fn last_displacement(&self) -> Option<f64> {
        self.last_displacement
    }
}

/// Share of strategies that differ between two snapshots.
pub fn changed_share(previous: &StepSnapshot, current: &StepSnapshot) -> f64 {
    let n = previous.strategies.len().min(current.strategies.len());
    if n == 0 {
        return 0.0;
    }
    let changed = previous
        .strategies
        .iter()
        .zip(&current.strategies)
        .filter(|(a, b)| a != b)
        .count();
    count_to_f64(changed) / count_to_f64(n)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evocoop_strategy::builtin;

    use super::*;

    fn snapshot(ranks: Vec<f64>, strategies: Vec<Strategy>) -> StepSnapshot {
        StepSnapshot { ranks, strategies }
    }

    #[test]
    fn ranking_displacement_is_mean_abs_difference() {
        let c = RankingCriterion::default();
        let a = snapshot(vec![0.0, 1.0], Vec::new());
        let b = snapshot(vec![1.0, 0.5], Vec::new());
        assert!((c.displacement(&a, &b).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn strategy_displacement_compares_pure_strategies() {
        let c = StrategyCriterion::default();
        let a = snapshot(Vec::new(), vec![builtin::grim(), builtin::grim()]);
        let b = snapshot(Vec::new(), vec![builtin::grim(), builtin::pavlov()]);
        assert!((c.displacement(&a, &b).unwrap() - 0.5).abs() < 1e-12);
        assert!((changed_share(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let c = RankingCriterion::default();
        let a = snapshot(vec![0.0], Vec::new());
        let b = snapshot(vec![0.0, 1.0], Vec::new());
        assert!(matches!(
            c.displacement(&a, &b),
            Err(EngineError::Equilibrium { .. })
        ));
    }

    #[test]
    fn monitor_requires_consecutive_stable_steps() {
        let c = StrategyCriterion {
            settings: EquilibriumSettings {
                strictness: 0.0,
                required_steps: 2,
            },
        };
        let stable = || snapshot(Vec::new(), vec![builtin::grim()]);
        let mut m = EquilibriumMonitor::new();
        assert!(!m.observe(&c, stable()).unwrap());
        assert!(m.last_displacement().is_none());
        assert!(!m.observe(&c, stable()).unwrap());
        assert_eq!(m.streak(), 1);
        assert!(m.observe(&c, stable()).unwrap());
    }

    #[test]
    fn monitor_resets_on_change() {
        let c = StrategyCriterion {
            settings: EquilibriumSettings {
                strictness: 0.1,
                required_steps: 2,
            },
        };
        let mut m = EquilibriumMonitor::new();
        m.observe(&c, snapshot(Vec::new(), vec![builtin::grim()])).unwrap();
        m.observe(&c, snapshot(Vec::new(), vec![builtin::grim()])).unwrap();
        assert_eq!(m.streak(), 1);
        m.observe(&c, snapshot(Vec::new(), vec![builtin::pavlov()])).unwrap();
        assert_eq!(m.streak(), 0);
    }

    #[test]
    fn settings_round_trip() {
        let c = RankingCriterion::default().with_parameters(&[0.05, 4.0]).unwrap();
        assert_eq!(c.required_steps(), 4);
        assert!((c.strictness() - 0.05).abs() < 1e-12);
        assert!(RankingCriterion::default().with_parameters(&[0.05, 0.0]).is_err());
    }
}
