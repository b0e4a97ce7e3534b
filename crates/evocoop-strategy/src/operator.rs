//! Boolean operators that combine strategy decisions.
//!
//! Applying an [`Operator`] to its operand strategies yields a new
//! [`PureStrategy`] whose condition evaluates every operand on the same
//! encounter and feeds the decisions through the operator's truth function.
//! Probability queries on the composite are degenerate (`1` or `0`): each
//! operand contributes its most likely decision.

use std::fmt;
use std::sync::Arc;

use rand::RngCore;

use crate::error::StrategyError;
use crate::strategy::{Condition, Encounter, PureStrategy, Strategy};

/// Truth function over operand decisions.
pub type TruthFunction = fn(&[bool]) -> bool;

/// A named boolean combinator of fixed arity (1 or 2).
#[derive(Clone, Copy)]
pub struct Operator {
    name: &'static str,
    operand_count: usize,
    function: TruthFunction,
}

impl Operator {
    /// Declare an operator.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::UnsupportedArity`] unless `operand_count`
    /// is 1 or 2.
    pub fn new(
        name: &'static str,
        operand_count: usize,
        function: TruthFunction,
    ) -> Result<Self, StrategyError> {
        if !(1..=2).contains(&operand_count) {
            return Err(StrategyError::UnsupportedArity {
                operator: name.to_owned(),
                operand_count,
            });
        }
        Ok(Self {
            name,
            operand_count,
            function,
        })
    }

    /// Operator name, e.g. `AND`.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Number of operands the operator takes.
    pub const fn operand_count(&self) -> usize {
        self.operand_count
    }

    /// Evaluate the truth function directly.
    pub fn evaluate(&self, decisions: &[bool]) -> bool {
        (self.function)(decisions)
    }

    /// Combine `operands` into one composite pure strategy.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError::Arity`] if the operand count does not match.
    pub fn apply(&self, operands: Vec<Strategy>) -> Result<Strategy, StrategyError> {
        if operands.len() != self.operand_count {
            return Err(StrategyError::Arity {
                operator: self.name.to_owned(),
                expected: self.operand_count,
                actual: operands.len(),
            });
        }
        let names: Vec<String> = operands.iter().map(Strategy::name).collect();
        let name = format!("{}({})", self.name, names.join(", "));
        let condition = OperatorCondition {
            operator: *self,
            operands,
        };
        Ok(Strategy::Pure(PureStrategy::new(name, Arc::new(condition))))
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.operand_count == other.operand_count
    }
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.name)
            .field("operand_count", &self.operand_count)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Debug)]
struct OperatorCondition {
    operator: Operator,
    operands: Vec<Strategy>,
}

impl Condition for OperatorCondition {
    fn cooperates(&self, encounter: &Encounter<'_>, rng: &mut dyn RngCore) -> bool {
        let decisions: Vec<bool> = self
            .operands
            .iter()
            .map(|s| s.cooperates(encounter, rng))
            .collect();
        self.operator.evaluate(&decisions)
    }

    fn cooperation_probability(&self, encounter: &Encounter<'_>) -> f64 {
        let decisions: Vec<bool> = self
            .operands
            .iter()
            .map(|s| s.cooperation_probability(encounter) >= 0.5)
            .collect();
        if self.operator.evaluate(&decisions) {
            1.0
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in operators
// ---------------------------------------------------------------------------

fn first(d: &[bool]) -> bool {
    d.first().copied().unwrap_or(false)
}

fn second(d: &[bool]) -> bool {
    d.get(1).copied().unwrap_or(false)
}

const fn binary(name: &'static str, function: TruthFunction) -> Operator {
    Operator {
        name,
        operand_count: 2,
        function,
    }
}

/// Cooperate iff both operands cooperate.
pub const AND: Operator = binary("AND", |d| first(d) && second(d));
/// Cooperate iff either operand cooperates.
pub const OR: Operator = binary("OR", |d| first(d) || second(d));
/// Negated [`AND`].
pub const NAND: Operator = binary("NAND", |d| !(first(d) && second(d)));
/// Negated [`OR`].
pub const NOR: Operator = binary("NOR", |d| !(first(d) || second(d)));
/// Cooperate iff exactly one operand cooperates.
pub const XOR: Operator = binary("XOR", |d| first(d) != second(d));
/// Material implication: defect only if the first cooperates and the second does not.
pub const IMPLIES: Operator = binary("IMPLIES", |d| !first(d) || second(d));
/// Invert the single operand.
pub const NOT: Operator = Operator {
    name: "NOT",
    operand_count: 1,
    function: |d| !first(d),
};

/// All built-in operators.
pub const fn builtins() -> [Operator; 7] {
    [AND, OR, NAND, NOR, XOR, IMPLIES, NOT]
}

/// Look up a built-in operator by (case-insensitive) name.
pub fn by_name(name: &str) -> Option<Operator> {
    builtins()
        .into_iter()
        .find(|op| op.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evocoop_types::{AgentId, SimulationHistory};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::builtin;

    #[test]
    fn truth_tables() {
        let cases = [(false, false), (false, true), (true, false), (true, true)];
        let expected = [
            (AND, [false, false, false, true]),
            (OR, [false, true, true, true]),
            (NAND, [true, true, true, false]),
            (NOR, [true, false, false, false]),
            (XOR, [false, true, true, false]),
            (IMPLIES, [true, true, false, true]),
        ];
        for (op, table) in expected {
            for ((a, b), want) in cases.iter().zip(table) {
                assert_eq!(op.evaluate(&[*a, *b]), want, "{op}({a}, {b})");
            }
        }
        assert!(NOT.evaluate(&[false]));
        assert!(!NOT.evaluate(&[true]));
    }

    #[test]
    fn apply_checks_arity() {
        let err = AND.apply(vec![builtin::grim()]).unwrap_err();
        assert_eq!(
            err,
            StrategyError::Arity {
                operator: "AND".to_owned(),
                expected: 2,
                actual: 1,
            }
        );
        assert!(NOT.apply(vec![builtin::grim(), builtin::grim()]).is_err());
    }

    #[test]
    fn unsupported_arity_rejected() {
        assert!(Operator::new("MAJ", 3, |_| true).is_err());
        assert!(Operator::new("ZERO", 0, |_| true).is_err());
        assert_eq!(Operator::new("ID", 1, first).unwrap().operand_count(), 1);
    }

    #[test]
    fn composite_name_and_decision() {
        let s = NOT.apply(vec![builtin::always_cooperate()]).unwrap();
        assert_eq!(s.name(), "NOT(always-cooperate)");
        let h = SimulationHistory::new();
        let e = Encounter::new(AgentId(0), AgentId(1), &h);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(!s.cooperates(&e, &mut rng));
        assert!(s.cooperation_probability(&e).abs() < f64::EPSILON);
    }

    #[test]
    fn composite_probability_uses_most_likely_decision() {
        let s = OR
            .apply(vec![
                builtin::random(0.7).unwrap(),
                builtin::always_defect(),
            ])
            .unwrap();
        let h = SimulationHistory::new();
        let e = Encounter::new(AgentId(0), AgentId(1), &h);
        assert!((s.cooperation_probability(&e) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(by_name("xor"), Some(XOR));
        assert_eq!(by_name("Implies"), Some(IMPLIES));
        assert!(by_name("MAYBE").is_none());
    }
}
