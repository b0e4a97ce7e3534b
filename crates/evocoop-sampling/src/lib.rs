//! Distribution sampling for the evocoop simulation.
//!
//! Population assembly draws group sizes, initial capital, and strategy
//! slots from the distributions defined here.
//!
//! # Modules
//!
//! - [`distribution`] -- The [`DiscreteDistribution`] trait, support
//!   intervals, and the inverse-CDF [`Picker`].
//! - [`parametric`] -- Binomial, Poisson, geometric, and discrete uniform
//!   distributions.
//! - [`finite`] -- Uniform distribution over an arbitrary finite set with
//!   destructive draws ([`FiniteDistribution`]).
//! - [`error`] -- Error types ([`SamplingError`]).

pub mod distribution;
pub mod error;
pub mod finite;
pub mod parametric;

pub use distribution::{DiscreteDistribution, Picker};
pub use error::SamplingError;
pub use finite::FiniteDistribution;
pub use parametric::{Binomial, Geometric, Poisson, UniformDiscrete};
