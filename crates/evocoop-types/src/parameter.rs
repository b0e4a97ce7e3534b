//! Named, optionally bounded, optionally stepped configuration slots.
//!
//! Every pluggable component (pair builder, success quantifier, strategy
//! adjuster, equilibrium criterion, distribution) declares the numeric
//! values it accepts as a list of [`Parameter`]s. A flat list of values is
//! checked against that declaration with [`check_values`] before the
//! component is constructed.
//!
//! A step of `0` means the parameter is continuous. A positive step means
//! accepted values lie on the grid `origin + k * step`, where the origin is
//! the lower bound (or `0` for an unbounded parameter).

use serde::{Deserialize, Serialize};

/// Relative tolerance used when checking grid membership.
const GRID_TOLERANCE: f64 = 1e-9;

/// Errors raised when declaring or checking parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    /// The declared bounds are inverted.
    #[error("parameter {name}: min {min} exceeds max {max}")]
    InvertedBounds {
        /// Parameter name.
        name: String,
        /// Declared lower bound.
        min: f64,
        /// Declared upper bound.
        max: f64,
    },

    /// The declared step is negative or not finite.
    #[error("parameter {name}: step {step} must be a finite value >= 0")]
    InvalidStep {
        /// Parameter name.
        name: String,
        /// Declared step.
        step: f64,
    },

    /// A value is NaN or infinite.
    #[error("parameter {name}: value {value} is not finite")]
    NotFinite {
        /// Parameter name.
        name: String,
        /// Offending value.
        value: f64,
    },

    /// A value lies outside the declared bounds.
    #[error("parameter {name}: value {value} outside [{min}, {max}]")]
    OutOfRange {
        /// Parameter name.
        name: String,
        /// Offending value.
        value: f64,
        /// Effective lower bound.
        min: f64,
        /// Effective upper bound.
        max: f64,
    },

    /// A value does not lie on the declared step grid.
    #[error("parameter {name}: value {value} is not a multiple of step {step}")]
    OffGrid {
        /// Parameter name.
        name: String,
        /// Offending value.
        value: f64,
        /// Declared step.
        step: f64,
    },

    /// The number of supplied values does not match the declaration.
    #[error("expected {expected} parameter values, got {actual}")]
    WrongCount {
        /// Number of declared parameters.
        expected: usize,
        /// Number of supplied values.
        actual: usize,
    },

    /// A parameter index is out of range for the component.
    #[error("parameter index {index} out of range for {count} parameters")]
    UnknownIndex {
        /// Requested index.
        index: usize,
        /// Number of declared parameters.
        count: usize,
    },
}

/// A named configuration slot with optional bounds and granularity.
///
/// Invariants (enforced by the constructors): `min <= max` when both are
/// present, and `step >= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    name: String,
    min: Option<f64>,
    max: Option<f64>,
    step: f64,
}

impl Parameter {
    /// Declare a parameter with explicit bounds and step.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::InvertedBounds`] if `min > max`, or
    /// [`ParameterError::InvalidStep`] if `step` is negative or not finite.
    pub fn new(
        name: &str,
        min: Option<f64>,
        max: Option<f64>,
        step: f64,
    ) -> Result<Self, ParameterError> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ParameterError::InvertedBounds {
                    name: name.to_owned(),
                    min: lo,
                    max: hi,
                });
            }
        }
        if !step.is_finite() || step < 0.0 {
            return Err(ParameterError::InvalidStep {
                name: name.to_owned(),
                step,
            });
        }
        Ok(Self {
            name: name.to_owned(),
            min,
            max,
            step,
        })
    }

    /// A continuous parameter restricted to `[0, 1]`.
    pub fn probability(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            min: Some(0.0),
            max: Some(1.0),
            step: 0.0,
        }
    }

    /// A whole-number parameter with the given lower bound and no upper bound.
    pub fn count(name: &str, min: u32) -> Self {
        Self {
            name: name.to_owned(),
            min: Some(f64::from(min)),
            max: None,
            step: 1.0,
        }
    }

    /// A switch taking the values `0` or `1`.
    pub fn flag(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            min: Some(0.0),
            max: Some(1.0),
            step: 1.0,
        }
    }

    /// A continuous parameter with only a lower bound.
    pub fn at_least(name: &str, min: f64) -> Self {
        Self {
            name: name.to_owned(),
            min: Some(min),
            max: None,
            step: 0.0,
        }
    }

    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The lower bound, if any.
    pub const fn min(&self) -> Option<f64> {
        self.min
    }

    /// The upper bound, if any.
    pub const fn max(&self) -> Option<f64> {
        self.max
    }

    /// The granularity; `0` means continuous.
    pub const fn step(&self) -> f64 {
        self.step
    }

    /// Whether any value in range is accepted.
    pub fn is_continuous(&self) -> bool {
        self.step <= 0.0
    }

    /// Check a single value against this declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::NotFinite`], [`ParameterError::OutOfRange`]
    /// or [`ParameterError::OffGrid`] when the value is rejected.
    pub fn check(&self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::NotFinite {
                name: self.name.clone(),
                value,
            });
        }

        let lo = self.min.unwrap_or(f64::NEG_INFINITY);
        let hi = self.max.unwrap_or(f64::INFINITY);
        if value < lo || value > hi {
            return Err(ParameterError::OutOfRange {
                name: self.name.clone(),
                value,
                min: lo,
                max: hi,
            });
        }

        if !self.is_continuous() {
            let origin = self.min.unwrap_or(0.0);
            let k = (value - origin) / self.step;
            if (k - k.round()).abs() > GRID_TOLERANCE * k.abs().max(1.0) {
                return Err(ParameterError::OffGrid {
                    name: self.name.clone(),
                    value,
                    step: self.step,
                });
            }
        }

        Ok(())
    }
}

/// Check a flat value list against a component's declared parameters.
///
/// # Errors
///
/// Returns [`ParameterError::WrongCount`] if the lengths differ, or the
/// first per-value error in declaration order.
pub fn check_values(parameters: &[Parameter], values: &[f64]) -> Result<(), ParameterError> {
    if parameters.len() != values.len() {
        return Err(ParameterError::WrongCount {
            expected: parameters.len(),
            actual: values.len(),
        });
    }
    parameters
        .iter()
        .zip(values)
        .try_for_each(|(parameter, &value)| parameter.check(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn inverted_bounds_rejected() {
        let err = Parameter::new("x", Some(2.0), Some(1.0), 0.0).unwrap_err();
        assert!(matches!(err, ParameterError::InvertedBounds { .. }));
    }

    #[test]
    fn negative_step_rejected() {
        let err = Parameter::new("x", None, None, -1.0).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidStep { .. }));
    }

    #[test]
    fn probability_bounds() {
        let p = Parameter::probability("p");
        assert!(p.check(0.0).is_ok());
        assert!(p.check(1.0).is_ok());
        assert!(matches!(
            p.check(1.5),
            Err(ParameterError::OutOfRange { .. })
        ));
        assert!(matches!(
            p.check(f64::NAN),
            Err(ParameterError::NotFinite { .. })
        ));
    }

    #[test]
    fn stepped_values_must_lie_on_grid() {
        let p = Parameter::new("w", Some(1.0), Some(10.0), 0.5).unwrap();
        assert!(p.check(3.5).is_ok());
        assert!(matches!(p.check(3.7), Err(ParameterError::OffGrid { .. })));
    }

    #[test]
    fn count_parameter_is_whole() {
        let p = Parameter::count("window", 1);
        assert!(p.check(4.0).is_ok());
        assert!(p.check(0.0).is_err());
        assert!(p.check(2.5).is_err());
    }

    #[test]
    fn flag_accepts_only_zero_and_one() {
        let p = Parameter::flag("use_sum");
        assert!(p.check(0.0).is_ok());
        assert!(p.check(1.0).is_ok());
        assert!(p.check(0.5).is_err());
        assert!(p.check(2.0).is_err());
    }

    #[test]
    fn check_values_counts() {
        let params = vec![Parameter::probability("a"), Parameter::probability("b")];
        assert!(check_values(&params, &[0.1, 0.2]).is_ok());
        assert_eq!(
            check_values(&params, &[0.1]),
            Err(ParameterError::WrongCount {
                expected: 2,
                actual: 1
            })
        );
    }
}
