//! The discrete distribution trait, support intervals, and the [`Picker`].
//!
//! # Support intervals
//!
//! [`DiscreteDistribution::support_interval`] returns the smallest interval
//! `[support_min(q), support_max(q)]` that captures probability mass of at
//! least `q`. It is found by a greedy expansion from the mode that always
//! adds the more probable neighbour. For the unimodal distributions in this
//! crate that adds values in non-increasing probability order, so dropping
//! either endpoint takes the mass back below `q`. Intervals are nested: a
//! larger `q` never yields a narrower interval.
//!
//! Quantiles must lie in `[0, 1)`. A request at `q >= 1` is rejected since
//! unbounded distributions never capture the full mass.

use rand::Rng;

use crate::error::SamplingError;

/// Upper bound on the number of expansion steps of one interval search.
const MAX_EXPANSION_STEPS: u64 = 50_000_000;

/// Largest table a [`Picker`] will allocate.
const MAX_PICKER_TABLE: u64 = 10_000_000;

/// Mass covered by the table of a [`Picker`]; the remainder is renormalized.
const PICKER_COVERAGE: f64 = 1.0 - 1e-12;

/// A discrete distribution over (a subset of) the integers.
pub trait DiscreteDistribution: Send + Sync + core::fmt::Debug {
    /// Short name of the distribution family.
    fn name(&self) -> &'static str;

    /// Point mass `P(X = k)`.
    fn probability(&self, k: i64) -> f64;

    /// A most probable value.
    fn mode(&self) -> i64;

    /// Smallest value of the support, if bounded below.
    fn lower_limit(&self) -> Option<i64>;

    /// Largest value of the support, if bounded above.
    fn upper_limit(&self) -> Option<i64>;

    /// Smallest interval capturing probability mass `>= q`.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidQuantile`] if `q` is outside `[0, 1)`
    /// and [`SamplingError::NoConvergence`] if the expansion never reaches
    /// `q`.
    fn support_interval(&self, q: f64) -> Result<(i64, i64), SamplingError> {
        central_interval(self, q)
    }

    /// Lower end of [`support_interval`](Self::support_interval).
    ///
    /// # Errors
    ///
    /// See [`support_interval`](Self::support_interval).
    fn support_min(&self, q: f64) -> Result<i64, SamplingError> {
        self.support_interval(q).map(|(lo, _)| lo)
    }

    /// Upper end of [`support_interval`](Self::support_interval).
    ///
    /// # Errors
    ///
    /// See [`support_interval`](Self::support_interval).
    fn support_max(&self, q: f64) -> Result<i64, SamplingError> {
        self.support_interval(q).map(|(_, hi)| hi)
    }

    /// Build a reusable sampler for this distribution.
    ///
    /// # Errors
    ///
    /// See [`Picker::new`].
    fn picker(&self) -> Result<Picker, SamplingError> {
        Picker::new(self)
    }
}

/// Greedy mode-centred interval search shared by all distributions.
fn central_interval<D>(dist: &D, q: f64) -> Result<(i64, i64), SamplingError>
where
    D: DiscreteDistribution + ?Sized,
{
    if !(0.0..1.0).contains(&q) {
        return Err(SamplingError::InvalidQuantile { q });
    }

    let mode = dist.mode();
    let (mut lo, mut hi) = (mode, mode);
    let mut mass = dist.probability(mode);
    let mut steps: u64 = 0;

    while mass < q {
        let left = lo
            .checked_sub(1)
            .filter(|&k| dist.lower_limit().is_none_or(|limit| k >= limit));
        let right = hi
            .checked_add(1)
            .filter(|&k| dist.upper_limit().is_none_or(|limit| k <= limit));

        match (left, right) {
            (None, None) => break,
            (Some(l), Some(r)) => {
                let pl = dist.probability(l);
                let pr = dist.probability(r);
                if pl >= pr {
                    lo = l;
                    mass += pl;
                } else {
                    hi = r;
                    mass += pr;
                }
            }
            (Some(l), None) => {
                lo = l;
                mass += dist.probability(l);
            }
            (None, Some(r)) => {
                hi = r;
                mass += dist.probability(r);
            }
        }

        steps = steps.saturating_add(1);
        if steps > MAX_EXPANSION_STEPS {
            return Err(SamplingError::NoConvergence { q });
        }
    }

    Ok((lo, hi))
}

/// A reusable sampler bound to one distribution.
///
/// The cumulative table over the `1 - 1e-12` support interval is built once;
/// each draw is a binary search over it (inverse CDF).
#[derive(Debug, Clone, PartialEq)]
pub struct Picker {
    offset: i64,
    cumulative: Vec<f64>,
}

impl Picker {
    /// Tabulate the distribution.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::SupportTooWide`] if the table would be too
    /// large, and [`SamplingError::EmptySupport`] if the tabulated mass is
    /// zero.
    pub fn new<D>(dist: &D) -> Result<Self, SamplingError>
    where
        D: DiscreteDistribution + ?Sized,
    {
        let (lo, hi) = dist.support_interval(PICKER_COVERAGE)?;
        let width = hi.abs_diff(lo).saturating_add(1);
        if width > MAX_PICKER_TABLE {
            return Err(SamplingError::SupportTooWide { width });
        }

        let mut cumulative = Vec::with_capacity(usize::try_from(width).unwrap_or(0));
        let mut total = 0.0;
        for k in lo..=hi {
            total += dist.probability(k);
            cumulative.push(total);
        }

        if total <= 0.0 || !total.is_finite() {
            return Err(SamplingError::EmptySupport);
        }
        for c in &mut cumulative {
            *c /= total;
        }

        Ok(Self {
            offset: lo,
            cumulative,
        })
    }

    /// The tabulated support `(min, max)`.
    pub fn support(&self) -> (i64, i64) {
        let width = i64::try_from(self.cumulative.len()).unwrap_or(i64::MAX);
        (self.offset, self.offset.saturating_add(width.saturating_sub(1)))
    }

    /// Draw one value.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let u: f64 = rng.random();
        let idx = self
            .cumulative
            .partition_point(|&c| c <= u)
            .min(self.cumulative.len().saturating_sub(1));
        self.offset
            .saturating_add(i64::try_from(idx).unwrap_or(i64::MAX))
    }

    /// Draw `count` values.
    pub fn pick_many<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<i64> {
        (0..count).map(|_| self.pick(rng)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::parametric::{Binomial, Geometric, Poisson, UniformDiscrete};

    fn mass<D: DiscreteDistribution + ?Sized>(dist: &D, lo: i64, hi: i64) -> f64 {
        (lo..=hi).map(|k| dist.probability(k)).sum()
    }

    fn check_interval_properties(dist: &dyn DiscreteDistribution) {
        for &q in &[0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 0.99, 0.999] {
            let (lo, hi) = dist.support_interval(q).unwrap();
            assert!(lo <= hi);
            assert!(mass(dist, lo, hi) >= q - 1e-12, "{dist:?} q={q}");
            if q > 0.0 && lo < hi {
                assert!(mass(dist, lo + 1, hi) < q, "{dist:?} q={q} min not tight");
                assert!(mass(dist, lo, hi - 1) < q, "{dist:?} q={q} max not tight");
            }
        }
    }

    #[test]
    fn interval_properties_hold_for_all_families() {
        check_interval_properties(&Binomial::new(20, 0.3).unwrap());
        check_interval_properties(&Poisson::new(4.5).unwrap());
        check_interval_properties(&Geometric::new(0.2).unwrap());
        check_interval_properties(&UniformDiscrete::new(-3, 7).unwrap());
    }

    #[test]
    fn intervals_are_nested() {
        let dist = Poisson::new(12.0).unwrap();
        let mut previous = dist.support_interval(0.05).unwrap();
        for &q in &[0.2, 0.4, 0.6, 0.8, 0.95, 0.999] {
            let current = dist.support_interval(q).unwrap();
            assert!(current.0 <= previous.0);
            assert!(current.1 >= previous.1);
            previous = current;
        }
    }

    #[test]
    fn quantile_at_one_is_rejected() {
        let dist = Poisson::new(2.0).unwrap();
        assert_eq!(
            dist.support_min(1.0),
            Err(SamplingError::InvalidQuantile { q: 1.0 })
        );
        assert!(dist.support_max(-0.1).is_err());
        assert!(dist.support_max(f64::NAN).is_err());
    }

    #[test]
    fn picker_stays_in_support() {
        let dist = Binomial::new(10, 0.5).unwrap();
        let picker = dist.picker().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for k in picker.pick_many(&mut rng, 1000) {
            assert!((0..=10).contains(&k));
        }
    }

    #[test]
    fn picker_matches_mean() {
        let dist = Poisson::new(3.0).unwrap();
        let picker = dist.picker().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let draws = picker.pick_many(&mut rng, 20_000);
        let sum: i64 = draws.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum as f64 / 20_000.0;
        assert!((mean - 3.0).abs() < 0.1, "mean was {mean}");
    }

    #[test]
    fn picker_is_reproducible() {
        let picker = Geometric::new(0.3).unwrap().picker().unwrap();
        let a = picker.pick_many(&mut StdRng::seed_from_u64(5), 50);
        let b = picker.pick_many(&mut StdRng::seed_from_u64(5), 50);
        assert_eq!(a, b);
    }

    #[test]
    fn point_mass_picker() {
        let picker = UniformDiscrete::new(4, 4).unwrap().picker().unwrap();
        assert_eq!(picker.support(), (4, 4));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(picker.pick(&mut rng), 4);
    }
}
