//! The shared shape of pluggable components.
//!
//! Pair builders, success quantifiers, strategy adjusters and equilibrium
//! criteria all declare their numeric settings as a list of [`Parameter`]s
//! and can be rebuilt from a flat value list. Sweeps rely on this to vary
//! the `i`-th parameter of any component.

use evocoop_types::{Parameter, ParameterError, check_values};

/// Behaviour common to every pluggable component.
pub trait Component: Send + Sync + std::fmt::Debug {
    /// Catalog name of the component.
    fn name(&self) -> &'static str;

    /// The parameters this component accepts, in order.
    fn declared_parameters(&self) -> Vec<Parameter>;

    /// The values currently in use, matching [`declared_parameters`](Self::declared_parameters).
    fn parameter_values(&self) -> Vec<f64>;
}

/// Check `values` against a component's declaration.
///
/// # Errors
///
/// Returns the first [`ParameterError`] found.
pub fn check_component(
    component: &dyn Component,
    values: &[f64],
) -> Result<(), ParameterError> {
    check_values(&component.declared_parameters(), values)
}

/// Copy of `values` with entry `index` replaced.
///
/// # Errors
///
/// Returns [`ParameterError::UnknownIndex`] if `index` is out of range.
pub fn replace_value(values: &[f64], index: usize, value: f64) -> Result<Vec<f64>, ParameterError> {
    let mut updated = values.to_vec();
    let slot = updated
        .get_mut(index)
        .ok_or(ParameterError::UnknownIndex {
            index,
            count: values.len(),
        })?;
    *slot = value;
    Ok(updated)
}

/// Value at `index`, or `default` when absent.
pub(crate) fn value_or(values: &[f64], index: usize, default: f64) -> f64 {
    values.get(index).copied().unwrap_or(default)
}
