//! Strategy syntax trees: validation, fault localization, compilation.
//!
//! A tree is valid when every leaf holds a strategy and every operation has
//! exactly as many children as its operator takes. Nodes are addressed by
//! their child-index path from the root (`[]` is the root, `[1, 0]` is the
//! first child of the second child).

use std::fmt;

use crate::error::StrategyError;
use crate::operator::Operator;
use crate::strategy::Strategy;

/// A node of a strategy composition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum SyntaxNode {
    /// A leaf slot; `None` while still unfilled.
    Leaf(Option<Strategy>),
    /// An operator applied to child nodes.
    Operation {
        /// The combining operator.
        operator: Operator,
        /// Operand subtrees, in order.
        children: Vec<SyntaxNode>,
    },
}

impl SyntaxNode {
    /// A filled leaf.
    pub const fn leaf(strategy: Strategy) -> Self {
        Self::Leaf(Some(strategy))
    }

    /// An unfilled leaf.
    pub const fn empty() -> Self {
        Self::Leaf(None)
    }

    /// An operator node.
    pub const fn operation(operator: Operator, children: Vec<Self>) -> Self {
        Self::Operation { operator, children }
    }

    /// Whether the node itself is malformed, ignoring its descendants.
    fn is_locally_faulty(&self) -> bool {
        match self {
            Self::Leaf(strategy) => strategy.is_none(),
            Self::Operation { operator, children } => children.len() != operator.operand_count(),
        }
    }

    /// Whether this subtree is well formed.
    pub fn check_syntax(&self) -> bool {
        if self.is_locally_faulty() {
            return false;
        }
        match self {
            Self::Leaf(_) => true,
            Self::Operation { children, .. } => children.iter().all(Self::check_syntax),
        }
    }

    /// Path to the faulty node, or `None` if the tree is valid.
    ///
    /// A node whose own shape is wrong is the fault regardless of its
    /// children. Otherwise the search descends into the first invalid child.
    pub fn faulty_path(&self) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut node = self;
        loop {
            if node.is_locally_faulty() {
                return Some(path);
            }
            let Self::Operation { children, .. } = node else {
                return None;
            };
            let (idx, child) = children
                .iter()
                .enumerate()
                .find(|(_, c)| !c.check_syntax())?;
            path.push(idx);
            node = child;
        }
    }

    /// The faulty node, or `None` if the tree is valid.
    pub fn faulty_node(&self) -> Option<&Self> {
        self.faulty_path().and_then(|p| self.node_at(&p))
    }

    /// The node at `path`, if it exists.
    pub fn node_at(&self, path: &[usize]) -> Option<&Self> {
        path.iter().try_fold(self, |node, &idx| match node {
            Self::Leaf(_) => None,
            Self::Operation { children, .. } => children.get(idx),
        })
    }

    /// Compile this tree into one strategy.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::Syntax`] with the faulty path if the tree is
    /// not well formed.
    pub fn compile(&self) -> Result<Strategy, StrategyError> {
        if let Some(path) = self.faulty_path() {
            return Err(StrategyError::Syntax { path });
        }
        self.compile_unchecked()
    }

    fn compile_unchecked(&self) -> Result<Strategy, StrategyError> {
        match self {
            Self::Leaf(Some(strategy)) => Ok(strategy.clone()),
            Self::Leaf(None) => Err(StrategyError::Syntax { path: Vec::new() }),
            Self::Operation { operator, children } => {
                let operands = children
                    .iter()
                    .map(Self::compile_unchecked)
                    .collect::<Result<Vec<_>, _>>()?;
                operator.apply(operands)
            }
        }
    }
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(Some(strategy)) => write!(f, "{strategy}"),
            Self::Leaf(None) => f.write_str("?"),
            Self::Operation { operator, children } => {
                write!(f, "{operator}(")?;
                for (idx, child) in children.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Compile a tree rooted at `root`.
///
/// # Errors
///
/// See [`SyntaxNode::compile`].
pub fn compile(root: &SyntaxNode) -> Result<Strategy, StrategyError> {
    root.compile()
}
