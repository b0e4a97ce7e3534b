//! Bounded worker pool and result aggregation for evocoop simulations.
//!
//! A submitted simulation is expanded into independent runs (one per swept
//! configuration and iteration). Runs execute concurrently on a bounded
//! pool; each owns its engine and random state and shares nothing with its
//! siblings except the [`SimulationResult`] it reports into.
//!
//! # Modules
//!
//! - [`config`] -- [`SchedulerConfig`] worker pool sizing.
//! - [`result`] -- [`SimulationResult`], [`Progress`], observers, status.
//! - [`scheduler`] -- [`RunScheduler`] submission and dispatch.
//! - [`error`] -- [`SchedulerError`].

pub mod config;
pub mod error;
pub mod result;
pub mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use result::{Observers, Progress, RecordOutcome, SimulationResult, SimulationStatus};
pub use scheduler::RunScheduler;
