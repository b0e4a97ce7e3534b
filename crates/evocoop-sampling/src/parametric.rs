//! Parametric discrete distributions.
//!
//! Each family declares its parameters as [`Parameter`]s so a flat value
//! list coming from configuration can be checked before construction with
//! `from_parameters`. Point masses are computed in log space to stay finite
//! for large counts.

use evocoop_types::{Parameter, check_values};

use crate::distribution::DiscreteDistribution;
use crate::error::SamplingError;

/// Lanczos coefficients (g = 7, n = 9).
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural logarithm of the gamma function for `x >= 1`.
fn ln_gamma(x: f64) -> f64 {
    let x = x - 1.0;
    let mut sum = LANCZOS[0];
    let mut denom = x;
    for &c in LANCZOS.iter().skip(1) {
        denom += 1.0;
        sum += c / denom;
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}

/// `ln(n!)` for a non-negative integer given as `f64`.
fn ln_factorial(n: f64) -> f64 {
    ln_gamma(n + 1.0)
}

fn invalid(distribution: &'static str, source: evocoop_types::ParameterError) -> SamplingError {
    SamplingError::InvalidParameters {
        distribution,
        source,
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(k: i64) -> f64 {
    k as f64
}

/// Read the value at `idx` from an already length-checked slice.
fn value_at(values: &[f64], idx: usize) -> f64 {
    values.get(idx).copied().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Binomial
// ---------------------------------------------------------------------------

/// Number of successes in `n` independent trials with success probability `p`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binomial {
    n: u32,
    p: f64,
}

impl Binomial {
    const NAME: &'static str = "binomial";

    /// Declared parameters: `n` (whole, `>= 0`) and `p` (in `[0, 1]`).
    pub fn parameters() -> Vec<Parameter> {
        vec![Parameter::count("n", 0), Parameter::probability("p")]
    }

    /// Create a binomial distribution.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidParameters`] if `p` is outside `[0, 1]`.
    pub fn new(n: u32, p: f64) -> Result<Self, SamplingError> {
        Parameter::probability("p")
            .check(p)
            .map_err(|e| invalid(Self::NAME, e))?;
        Ok(Self { n, p })
    }

    /// Create from a flat `[n, p]` value list.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidParameters`] if the values do not
    /// match [`Binomial::parameters`].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_parameters(values: &[f64]) -> Result<Self, SamplingError> {
        check_values(&Self::parameters(), values).map_err(|e| invalid(Self::NAME, e))?;
        let n = value_at(values, 0).round().min(f64::from(u32::MAX)) as u32;
        Self::new(n, value_at(values, 1))
    }
}

impl DiscreteDistribution for Binomial {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn probability(&self, k: i64) -> f64 {
        let n = i64::from(self.n);
        if k < 0 || k > n {
            return 0.0;
        }
        if self.p <= 0.0 {
            return if k == 0 { 1.0 } else { 0.0 };
        }
        if self.p >= 1.0 {
            return if k == n { 1.0 } else { 0.0 };
        }
        let (nf, kf) = (f64::from(self.n), as_f64(k));
        let ln_choose = ln_factorial(nf) - ln_factorial(kf) - ln_factorial(nf - kf);
        (ln_choose + kf * self.p.ln() + (nf - kf) * (1.0 - self.p).ln()).exp()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn mode(&self) -> i64 {
        let m = ((f64::from(self.n) + 1.0) * self.p).floor() as i64;
        m.clamp(0, i64::from(self.n))
    }

    fn lower_limit(&self) -> Option<i64> {
        Some(0)
    }

    fn upper_limit(&self) -> Option<i64> {
        Some(i64::from(self.n))
    }
}

// ---------------------------------------------------------------------------
// Poisson
// ---------------------------------------------------------------------------

/// Number of events in a fixed interval with mean rate `lambda`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poisson {
    lambda: f64,
}

impl Poisson {
    const NAME: &'static str = "poisson";

    /// Declared parameters: `lambda` (`>= 0`).
    pub fn parameters() -> Vec<Parameter> {
        vec![Parameter::at_least("lambda", 0.0)]
    }

    /// Create a Poisson distribution.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidParameters`] if `lambda` is negative
    /// or not finite.
    pub fn new(lambda: f64) -> Result<Self, SamplingError> {
        Parameter::at_least("lambda", 0.0)
            .check(lambda)
            .map_err(|e| invalid(Self::NAME, e))?;
        Ok(Self { lambda })
    }

    /// Create from a flat `[lambda]` value list.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidParameters`] if the values do not
    /// match [`Poisson::parameters`].
    pub fn from_parameters(values: &[f64]) -> Result<Self, SamplingError> {
        check_values(&Self::parameters(), values).map_err(|e| invalid(Self::NAME, e))?;
        Self::new(value_at(values, 0))
    }
}

impl DiscreteDistribution for Poisson {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn probability(&self, k: i64) -> f64 {
        if k < 0 {
            return 0.0;
        }
        if self.lambda <= 0.0 {
            return if k == 0 { 1.0 } else { 0.0 };
        }
        let kf = as_f64(k);
        (kf * self.lambda.ln() - self.lambda - ln_factorial(kf)).exp()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn mode(&self) -> i64 {
        self.lambda.floor() as i64
    }

    fn lower_limit(&self) -> Option<i64> {
        Some(0)
    }

    fn upper_limit(&self) -> Option<i64> {
        None
    }
}

// ---------------------------------------------------------------------------
// Geometric
// ---------------------------------------------------------------------------

/// Number of failures before the first success with success probability `p`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometric {
    p: f64,
}

impl Geometric {
    const NAME: &'static str = "geometric";

    /// Declared parameters: `p` (in `(0, 1]`).
    pub fn parameters() -> Vec<Parameter> {
        vec![Parameter::probability("p")]
    }

    /// Create a geometric distribution.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidParameters`] if `p` is outside
    /// `[0, 1]`, and [`SamplingError::EmptySupport`] if `p` is zero (no
    /// success ever happens).
    pub fn new(p: f64) -> Result<Self, SamplingError> {
        Parameter::probability("p")
            .check(p)
            .map_err(|e| invalid(Self::NAME, e))?;
        if p <= 0.0 {
            return Err(SamplingError::EmptySupport);
        }
        Ok(Self { p })
    }

    /// Create from a flat `[p]` value list.
    ///
    /// # Errors
    ///
    /// See [`Geometric::new`].
    pub fn from_parameters(values: &[f64]) -> Result<Self, SamplingError> {
        check_values(&Self::parameters(), values).map_err(|e| invalid(Self::NAME, e))?;
        Self::new(value_at(values, 0))
    }
}

impl DiscreteDistribution for Geometric {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn probability(&self, k: i64) -> f64 {
        if k < 0 {
            return 0.0;
        }
        if self.p >= 1.0 {
            return if k == 0 { 1.0 } else { 0.0 };
        }
        (as_f64(k) * (1.0 - self.p).ln()).exp() * self.p
    }

    fn mode(&self) -> i64 {
        0
    }

    fn lower_limit(&self) -> Option<i64> {
        Some(0)
    }

    fn upper_limit(&self) -> Option<i64> {
        None
    }
}

// ---------------------------------------------------------------------------
// Discrete uniform
// ---------------------------------------------------------------------------

/// Uniform distribution over the integers `min..=max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDiscrete {
    min: i64,
    max: i64,
}

impl UniformDiscrete {
    const NAME: &'static str = "uniform";

    /// Declared parameters: `min` and `max` (whole numbers).
    pub fn parameters() -> Vec<Parameter> {
        vec![
            Parameter::count("min", 0),
            Parameter::count("max", 0),
        ]
    }

    /// Create a uniform distribution.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::EmptySupport`] if `min > max`.
    pub const fn new(min: i64, max: i64) -> Result<Self, SamplingError> {
        if min > max {
            return Err(SamplingError::EmptySupport);
        }
        Ok(Self { min, max })
    }

    /// Create from a flat `[min, max]` value list.
    ///
    /// # Errors
    ///
    /// Returns [`SamplingError::InvalidParameters`] if the values are not
    /// whole non-negative numbers, and [`SamplingError::EmptySupport`] if
    /// `min > max`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_parameters(values: &[f64]) -> Result<Self, SamplingError> {
        check_values(&Self::parameters(), values).map_err(|e| invalid(Self::NAME, e))?;
        Self::new(
            value_at(values, 0).round() as i64,
            value_at(values, 1).round() as i64,
        )
    }

    fn width(&self) -> f64 {
        as_f64(self.max.saturating_sub(self.min).saturating_add(1))
    }
}

impl DiscreteDistribution for UniformDiscrete {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn probability(&self, k: i64) -> f64 {
        if k < self.min || k > self.max {
            return 0.0;
        }
        1.0 / self.width()
    }

    fn mode(&self) -> i64 {
        self.min
    }

    fn lower_limit(&self) -> Option<i64> {
        Some(self.min)
    }

    fn upper_limit(&self) -> Option<i64> {
        Some(self.max)
    }
}
