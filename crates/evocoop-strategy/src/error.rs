//! Error types for the evocoop-strategy crate.

/// Errors raised when building, combining, or compiling strategies.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    /// A mixed strategy was built without components.
    #[error("mixed strategy has no components")]
    EmptyMixture,

    /// A mixed strategy component has a negative or non-finite probability.
    #[error("component {name} has invalid probability {probability}")]
    InvalidProbability {
        /// Name of the component strategy.
        name: String,
        /// The rejected probability.
        probability: f64,
    },

    /// Mixed strategy probabilities do not sum to one.
    #[error("mixed strategy probabilities sum to {sum}, expected 1")]
    NotNormalized {
        /// The actual sum.
        sum: f64,
    },

    /// The same pure strategy appears twice in one mixture.
    #[error("component {name} appears more than once")]
    DuplicateComponent {
        /// Name of the repeated component.
        name: String,
    },

    /// An operator was applied to the wrong number of operands.
    #[error("operator {operator} takes {expected} operands, got {actual}")]
    Arity {
        /// Operator name.
        operator: String,
        /// Declared operand count.
        expected: usize,
        /// Supplied operand count.
        actual: usize,
    },

    /// An operator was declared with an unsupported operand count.
    #[error("operator {operator} declares unsupported operand count {operand_count}")]
    UnsupportedArity {
        /// Operator name.
        operator: String,
        /// Declared operand count.
        operand_count: usize,
    },

    /// Compilation was attempted on a tree that fails the syntax check.
    #[error("syntax error at node {path:?}")]
    Syntax {
        /// Child-index path from the root to the faulty node.
        path: Vec<usize>,
    },

    /// An interpolation weight outside `[0, 1]` was supplied.
    #[error("interpolation weight {weight} outside [0, 1]")]
    InvalidWeight {
        /// The rejected weight.
        weight: f64,
    },
}
