//! Error types for the evocoop-sampling crate.
//!
//! Numerical edge cases fail predictably with one of these variants rather
//! than looping or dividing by zero.

use evocoop_types::ParameterError;

/// Errors that can occur while building or sampling a distribution.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    /// A quantile outside `[0, 1)` was requested.
    #[error("quantile {q} outside [0, 1)")]
    InvalidQuantile {
        /// The requested quantile.
        q: f64,
    },

    /// A draw was requested from a distribution without support.
    #[error("distribution has empty support")]
    EmptySupport,

    /// Distribution parameters were rejected.
    #[error("invalid parameters for {distribution}: {source}")]
    InvalidParameters {
        /// Name of the distribution.
        distribution: &'static str,
        /// The underlying parameter error.
        source: ParameterError,
    },

    /// The support interval expansion did not reach the requested mass.
    #[error("support interval for quantile {q} did not converge")]
    NoConvergence {
        /// The requested quantile.
        q: f64,
    },

    /// The picker table would exceed the allowed size.
    #[error("support of width {width} is too wide to tabulate")]
    SupportTooWide {
        /// Number of values in the support interval.
        width: u64,
    },
}
