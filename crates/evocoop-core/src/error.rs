//! Error types for the evocoop-core crate.
//!
//! Two families of failure exist:
//!
//! - [`ConfigurationError`] -- detected while validating or expanding a
//!   configuration, before any run starts.
//! - [`EngineError`] -- raised inside a run. The engine converts it into a
//!   [`FailureCause`] tagged with the [`FailureStage`] that failed, so one
//!   broken run never takes down its siblings.

use evocoop_sampling::SamplingError;
use evocoop_strategy::StrategyError;
use evocoop_types::ParameterError;
use serde::{Deserialize, Serialize};

/// Errors detected while validating or expanding a configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// A numeric setting is outside its accepted range.
    #[error("invalid setting {field}: {reason}")]
    InvalidSetting {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A component rejected its parameter values.
    #[error("component {component}: {source}")]
    Parameter {
        /// Name of the component.
        component: String,
        /// The underlying parameter error.
        source: ParameterError,
    },

    /// The sweep range is empty or malformed.
    #[error("invalid sweep: {reason}")]
    InvalidSweep {
        /// Why the sweep was rejected.
        reason: String,
    },

    /// A sweep value must be a whole number for its target.
    #[error("sweep value {value} for {target} is not a non-negative whole number")]
    NonIntegral {
        /// The sweep target.
        target: &'static str,
        /// The offending value.
        value: f64,
    },

    /// A group-size sweep names a group that does not exist.
    #[error("unknown population group: {name}")]
    UnknownGroup {
        /// The requested group name.
        name: String,
    },
}

/// The phase of an adaptation step in which a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Building the initial population.
    Population,
    /// Pairing agents.
    Pairing,
    /// Playing game rounds.
    Play,
    /// Computing success values.
    Quantification,
    /// Revising strategies.
    Adjustment,
    /// Checking for equilibrium.
    Equilibrium,
    /// A panic escaped a component.
    Panic,
}

/// Tagged description of why a run aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    /// Where the run failed.
    pub stage: FailureStage,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.stage, self.message)
    }
}

/// Errors raised while a run is executing.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The population could not be assembled.
    #[error("population assembly failed: {reason}")]
    Population {
        /// Description of the problem.
        reason: String,
    },

    /// Sampling failed during population assembly.
    #[error("sampling failed: {source}")]
    Sampling {
        /// The underlying sampling error.
        #[from]
        source: SamplingError,
    },

    /// The pair builder produced an invalid pairing.
    #[error("pairing failed: {reason}")]
    Pairing {
        /// Description of the problem.
        reason: String,
    },

    /// The success quantifier produced unusable values.
    #[error("success quantification failed: {reason}")]
    Quantification {
        /// Description of the problem.
        reason: String,
    },

    /// A strategy operation failed during adjustment.
    #[error("strategy adjustment failed: {source}")]
    Adjustment {
        /// The underlying strategy error.
        #[from]
        source: StrategyError,
    },

    /// The equilibrium criterion could not compare two steps.
    #[error("equilibrium check failed: {reason}")]
    Equilibrium {
        /// Description of the problem.
        reason: String,
    },

    /// The step counter overflowed.
    #[error("step counter overflow")]
    StepOverflow,

    /// The engine was stepped after it terminated.
    #[error("engine already terminated")]
    AlreadyTerminated,
}

impl EngineError {
    /// The step phase this error belongs to.
    pub const fn stage(&self) -> FailureStage {
        match self {
            Self::Population { .. } | Self::Sampling { .. } => FailureStage::Population,
            Self::Pairing { .. } => FailureStage::Pairing,
            Self::Quantification { .. } => FailureStage::Quantification,
            Self::Adjustment { .. } => FailureStage::Adjustment,
            Self::Equilibrium { .. } => FailureStage::Equilibrium,
            Self::StepOverflow | Self::AlreadyTerminated => FailureStage::Play,
        }
    }

    /// Convert into the tagged cause stored on an iteration result.
    pub fn to_cause(&self) -> FailureCause {
        FailureCause {
            stage: self.stage(),
            message: self.to_string(),
        }
    }
}
