//! Error types for the evocoop engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup, submission, and
//! reporting so `main` can propagate them with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crate::config::ConfigError,
    },

    /// A component, strategy, or distribution name could not be resolved.
    #[error("catalog error: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: crate::catalog::CatalogError,
    },

    /// The scheduler rejected the simulation.
    #[error("scheduler error: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: evocoop_scheduler::SchedulerError,
    },

    /// The final report could not be rendered.
    #[error("report error: {source}")]
    Report {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}
