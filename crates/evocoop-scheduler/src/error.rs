//! Error types for the run scheduler.

use evocoop_core::ConfigurationError;

/// Errors reported synchronously when a simulation is submitted.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The configuration could not be expanded into runs.
    #[error("invalid configuration: {source}")]
    Configuration {
        /// The underlying configuration error.
        #[from]
        source: ConfigurationError,
    },

    /// `submit` was called outside a Tokio runtime.
    #[error("no async runtime available: {source}")]
    NoRuntime {
        /// The underlying runtime lookup error.
        #[from]
        source: tokio::runtime::TryCurrentError,
    },

    /// The worker pool would have no workers.
    #[error("invalid worker count {count}: at least one worker is required")]
    WorkerCount {
        /// The rejected count.
        count: usize,
    },

    /// The total number of runs does not fit in memory.
    #[error("too many runs: {configurations} configurations x {iterations} iterations")]
    TooManyRuns {
        /// Number of expanded configurations.
        configurations: usize,
        /// Iterations per configuration.
        iterations: u32,
    },
}
