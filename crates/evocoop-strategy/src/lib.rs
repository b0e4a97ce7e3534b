//! Strategies and strategy composition for the evocoop simulation.
//!
//! A strategy decides, for one agent facing one opponent, whether to
//! cooperate given the games already played in the current adaptation
//! step. Strategies come in two shapes:
//!
//! - [`PureStrategy`] wraps a [`Condition`], a (possibly probabilistic)
//!   predicate over the [`Encounter`].
//! - [`MixedStrategy`] is a probability-weighted blend of pure strategies
//!   that doubles as a real-valued vector for interpolation.
//!
//! Trees of logical [`Operator`]s over leaf strategies ([`SyntaxNode`]) are
//! validated and compiled into a single composite strategy.
//!
//! # Modules
//!
//! - [`strategy`] -- [`Strategy`], [`PureStrategy`], [`MixedStrategy`],
//!   [`Condition`], [`Encounter`].
//! - [`builtin`] -- Leaf strategies (tit-for-tat, grim trigger, ...).
//! - [`operator`] -- Boolean operators combining strategy decisions.
//! - [`syntax`] -- Syntax tree validation, fault localization, compilation.
//! - [`error`] -- Error types ([`StrategyError`]).

pub mod builtin;
pub mod error;
pub mod operator;
pub mod strategy;
pub mod syntax;

pub use error::StrategyError;
pub use operator::Operator;
pub use strategy::{Condition, Encounter, MixedStrategy, PureStrategy, Strategy};
pub use syntax::{SyntaxNode, compile};
