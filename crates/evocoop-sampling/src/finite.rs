//! Uniform distribution over an arbitrary finite set of elements.
//!
//! Population assembly deals strategy slots to agents with destructive
//! draws ([`FiniteDistribution::pick_and_remove`]) so every slot is used
//! exactly once. Probabilities are always derived from the current support
//! size, so they stay normalized after any insertion or removal.

use rand::Rng;

use crate::error::SamplingError;

/// Uniform distribution over a mutable multiset of elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiniteDistribution<T> {
    support: Vec<T>,
}

impl<T> Default for FiniteDistribution<T> {
    fn default() -> Self {
        Self {
            support: Vec::new(),
        }
    }
}

impl<T> FromIterator<T> for FiniteDistribution<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            support: iter.into_iter().collect(),
        }
    }
}

impl<T> FiniteDistribution<T> {
    /// Create a distribution over the given elements.
    pub const fn new(support: Vec<T>) -> Self {
        Self { support }
    }

    /// Number of elements in the support.
    pub fn len(&self) -> usize {
        self.support.len()
    }

    /// Whether the support is empty.
    pub fn is_empty(&self) -> bool {
        self.support.is_empty()
    }

    /// The current support.
    pub fn support(&self) -> &[T] {
        &self.support
    }

    /// Probability of each single support slot, `1 / |support|`.
    ///
    /// Returns `0` for an empty support.
    pub fn uniform_probability(&self) -> f64 {
        match u32::try_from(self.support.len()) {
            Ok(0) => 0.0,
            Ok(n) => 1.0 / f64::from(n),
            Err(_) => 1.0 / f64::from(u32::MAX),
        }
    }

    /// Add an element to the support.
    pub fn insert(&mut self, element: T) {
        self.support.push(element);
    }

    /// Draw one element without removing it.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::EmptySupport`] if the support is empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&T, SamplingError> {
        if self.support.is_empty() {
            return Err(SamplingError::EmptySupport);
        }
        let idx = rng.random_range(0..self.support.len());
        self.support.get(idx).ok_or(SamplingError::EmptySupport)
    }

    /// Draw one element and remove it from the support.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::EmptySupport`] if the support is empty.
    pub fn pick_and_remove<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<T, SamplingError> {
        if self.support.is_empty() {
            return Err(SamplingError::EmptySupport);
        }
        let idx = rng.random_range(0..self.support.len());
        Ok(self.support.swap_remove(idx))
    }
}

impl<T: PartialEq> FiniteDistribution<T> {
    /// Probability of drawing `element`.
    ///
    /// For a support of `n` distinct elements this is `1 / n` for every
    /// member and `0` for anything else; duplicates add up.
    pub fn probability(&self, element: &T) -> f64 {
        let count = self.support.iter().filter(|e| *e == element).count();
        match u32::try_from(count) {
            Ok(c) => f64::from(c) * self.uniform_probability(),
            Err(_) => 1.0,
        }
    }

    /// Whether `element` is in the support.
    pub fn contains(&self, element: &T) -> bool {
        self.support.contains(element)
    }

    /// Remove the first occurrence of `element`. Returns whether one was found.
    pub fn remove(&mut self, element: &T) -> bool {
        match self.support.iter().position(|e| e == element) {
            Some(idx) => {
                self.support.swap_remove(idx);
                true
            }
            None => false,
        }
    }
}
