//! Name-keyed lookup table for pluggable components and strategies.
//!
//! The [`Catalog`] is built once at startup and passed explicitly to the
//! resolver; nothing is registered globally. It also parses strategy
//! expressions such as `OR(grim, NOT(pavlov))` or `random(0.3)` into a
//! [`SyntaxNode`] tree and compiles them.
//!
//! # Expression grammar
//!
//! ```text
//! expr  := name | name "(" [ expr { "," expr } ] ")" | "random(" number ")"
//! ```
//!
//! Operator names are case-insensitive. An operator applied to the wrong
//! number of operands still parses; compilation then reports the path of
//! the faulty node.

use std::collections::BTreeMap;
use std::sync::Arc;

use evocoop_core::adjustment::{PreferentialAdaption, ReplicatorDynamic, StrategyAdjuster};
use evocoop_core::equilibrium::{EquilibriumCriterion, RankingCriterion, StrategyCriterion};
use evocoop_core::pairing::{
    CooperationPairBuilder, HybridPairBuilder, PairBuilder, RandomPairBuilder,
};
use evocoop_core::success::{Capital, LastGamePayoff, SlidingWindow, StepPayoff, SuccessQuantifier};
use evocoop_sampling::{
    Binomial, DiscreteDistribution, Geometric, Poisson, SamplingError, UniformDiscrete,
};
use evocoop_strategy::{Operator, Strategy, StrategyError, SyntaxNode, builtin, operator};
use evocoop_types::ParameterError;

/// Errors raised while resolving names from the configuration.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No entry with this name exists.
    #[error("unknown {kind} `{name}`")]
    Unknown {
        /// What was looked up.
        kind: &'static str,
        /// The name that was not found.
        name: String,
    },

    /// A component rejected its parameter values.
    #[error("invalid parameters for `{component}`: {source}")]
    Parameter {
        /// Component name.
        component: String,
        /// The underlying parameter error.
        source: ParameterError,
    },

    /// A distribution could not be built.
    #[error("invalid distribution: {source}")]
    Distribution {
        /// The underlying sampling error.
        #[from]
        source: SamplingError,
    },

    /// A strategy expression is malformed.
    #[error("cannot parse strategy `{expression}`: {reason}")]
    Expression {
        /// The expression text.
        expression: String,
        /// Description of the problem.
        reason: String,
    },

    /// A strategy could not be built or compiled.
    #[error("invalid strategy: {source}")]
    Strategy {
        /// The underlying strategy error.
        #[from]
        source: StrategyError,
    },
}

type DistributionFactory = fn(&[f64]) -> Result<Arc<dyn DiscreteDistribution>, SamplingError>;

/// Read-only name table handed to the resolver.
#[derive(Debug)]
pub struct Catalog {
    strategies: BTreeMap<&'static str, Strategy>,
    operators: BTreeMap<String, Operator>,
    pair_builders: BTreeMap<&'static str, Arc<dyn PairBuilder>>,
    success_quantifiers: BTreeMap<&'static str, Arc<dyn SuccessQuantifier>>,
    adjusters: BTreeMap<&'static str, Arc<dyn StrategyAdjuster>>,
    criteria: BTreeMap<&'static str, Arc<dyn EquilibriumCriterion>>,
    distributions: BTreeMap<&'static str, DistributionFactory>,
}

impl Catalog {
    /// The catalog of every built-in component, strategy, and operator.
    pub fn builtin() -> Self {
        let strategies = builtin::NAMES
            .into_iter()
            .filter_map(|name| builtin::by_name(name).map(|s| (name, s)))
            .collect();
        let operators = operator::builtins()
            .into_iter()
            .map(|op| (op.name().to_ascii_lowercase(), op))
            .collect();

        let pair_builders: Vec<Arc<dyn PairBuilder>> = vec![
            Arc::new(RandomPairBuilder),
            Arc::new(CooperationPairBuilder::default()),
            Arc::new(HybridPairBuilder::default()),
        ];
        let success_quantifiers: Vec<Arc<dyn SuccessQuantifier>> = vec![
            Arc::new(StepPayoff),
            Arc::new(Capital),
            Arc::new(LastGamePayoff),
            Arc::new(SlidingWindow::default()),
        ];
        let adjusters: Vec<Arc<dyn StrategyAdjuster>> = vec![
            Arc::new(ReplicatorDynamic::default()),
            Arc::new(PreferentialAdaption::default()),
        ];
        let criteria: Vec<Arc<dyn EquilibriumCriterion>> = vec![
            Arc::new(RankingCriterion::default()),
            Arc::new(StrategyCriterion::default()),
        ];

        let mut distributions: BTreeMap<&'static str, DistributionFactory> = BTreeMap::new();
        distributions.insert("binomial", binomial);
        distributions.insert("poisson", poisson);
        distributions.insert("geometric", geometric);
        distributions.insert("uniform", uniform);

        Self {
            strategies,
            operators,
            pair_builders: pair_builders.into_iter().map(|c| (c.name(), c)).collect(),
            success_quantifiers: success_quantifiers
                .into_iter()
                .map(|c| (c.name(), c))
                .collect(),
            adjusters: adjusters.into_iter().map(|c| (c.name(), c)).collect(),
            criteria: criteria.into_iter().map(|c| (c.name(), c)).collect(),
            distributions,
        }
    }

    /// Names of every built-in leaf strategy.
    pub fn strategy_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.keys().copied()
    }

    /// Look up a pair builder and apply its parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unknown`] or [`CatalogError::Parameter`].
    pub fn pair_builder(
        &self,
        name: &str,
        parameters: &[f64],
    ) -> Result<Arc<dyn PairBuilder>, CatalogError> {
        let base = lookup(&self.pair_builders, "pair builder", name)?;
        if parameters.is_empty() {
            return Ok(base);
        }
        base.with_parameters(parameters)
            .map_err(parameter_error(name))
    }

    /// Look up a success quantifier and apply its parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unknown`] or [`CatalogError::Parameter`].
    pub fn success_quantifier(
        &self,
        name: &str,
        parameters: &[f64],
    ) -> Result<Arc<dyn SuccessQuantifier>, CatalogError> {
        let base = lookup(&self.success_quantifiers, "success quantifier", name)?;
        if parameters.is_empty() {
            return Ok(base);
        }
        base.with_parameters(parameters)
            .map_err(parameter_error(name))
    }

    /// Look up a strategy adjuster and apply its parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unknown`] or [`CatalogError::Parameter`].
    pub fn strategy_adjuster(
        &self,
        name: &str,
        parameters: &[f64],
    ) -> Result<Arc<dyn StrategyAdjuster>, CatalogError> {
        let base = lookup(&self.adjusters, "strategy adjuster", name)?;
        if parameters.is_empty() {
            return Ok(base);
        }
        base.with_parameters(parameters)
            .map_err(parameter_error(name))
    }

    /// Look up an equilibrium criterion and apply its parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unknown`] or [`CatalogError::Parameter`].
    pub fn equilibrium_criterion(
        &self,
        name: &str,
        parameters: &[f64],
    ) -> Result<Arc<dyn EquilibriumCriterion>, CatalogError> {
        let base = lookup(&self.criteria, "equilibrium criterion", name)?;
        if parameters.is_empty() {
            return Ok(base);
        }
        base.with_parameters(parameters)
            .map_err(parameter_error(name))
    }

    /// Build a parametric distribution by family name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Unknown`] or [`CatalogError::Distribution`].
    pub fn distribution(
        &self,
        name: &str,
        parameters: &[f64],
    ) -> Result<Arc<dyn DiscreteDistribution>, CatalogError> {
        let factory = self
            .distributions
            .get(name)
            .ok_or_else(|| CatalogError::Unknown {
                kind: "distribution",
                name: name.to_owned(),
            })?;
        Ok(factory(parameters)?)
    }

    /// Parse a strategy expression into a syntax tree.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Expression`] for malformed text and
    /// [`CatalogError::Unknown`] for unknown names.
    pub fn parse_strategy(&self, expression: &str) -> Result<SyntaxNode, CatalogError> {
        let tokens = tokenize(expression)?;
        let mut parser = Parser {
            catalog: self,
            expression,
            tokens: &tokens,
            position: 0,
        };
        let node = parser.node()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(&format!("unexpected {token} after expression")));
        }
        Ok(node)
    }

    /// Parse and compile a strategy expression.
    ///
    /// # Errors
    ///
    /// See [`parse_strategy`](Self::parse_strategy); also returns
    /// [`CatalogError::Strategy`] if the tree does not compile.
    pub fn strategy(&self, expression: &str) -> Result<Strategy, CatalogError> {
        Ok(self.parse_strategy(expression)?.compile()?)
    }

    fn leaf(&self, name: &str) -> Result<Strategy, CatalogError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::Unknown {
                kind: "strategy",
                name: name.to_owned(),
            })
    }

    fn operator(&self, name: &str) -> Result<Operator, CatalogError> {
        self.operators
            .get(&name.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| CatalogError::Unknown {
                kind: "operator",
                name: name.to_owned(),
            })
    }
}

fn binomial(values: &[f64]) -> Result<Arc<dyn DiscreteDistribution>, SamplingError> {
    Ok(Arc::new(Binomial::from_parameters(values)?))
}

fn poisson(values: &[f64]) -> Result<Arc<dyn DiscreteDistribution>, SamplingError> {
    Ok(Arc::new(Poisson::from_parameters(values)?))
}

fn geometric(values: &[f64]) -> Result<Arc<dyn DiscreteDistribution>, SamplingError> {
    Ok(Arc::new(Geometric::from_parameters(values)?))
}

fn uniform(values: &[f64]) -> Result<Arc<dyn DiscreteDistribution>, SamplingError> {
    Ok(Arc::new(UniformDiscrete::from_parameters(values)?))
}

fn lookup<T: ?Sized>(
    table: &BTreeMap<&'static str, Arc<T>>,
    kind: &'static str,
    name: &str,
) -> Result<Arc<T>, CatalogError> {
    table.get(name).cloned().ok_or_else(|| CatalogError::Unknown {
        kind,
        name: name.to_owned(),
    })
}

fn parameter_error(name: &str) -> impl FnOnce(ParameterError) -> CatalogError + '_ {
    move |source| CatalogError::Parameter {
        component: name.to_owned(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Expression parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Comma,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Word(w) => write!(f, "`{w}`"),
            Self::Open => f.write_str("`(`"),
            Self::Close => f.write_str("`)`"),
            Self::Comma => f.write_str("`,`"),
        }
    }
}

const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+')
}

fn tokenize(expression: &str) -> Result<Vec<Token>, CatalogError> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            ',' => tokens.push(Token::Comma),
            c if c.is_whitespace() => {}
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
                continue;
            }
            other => {
                return Err(CatalogError::Expression {
                    expression: expression.to_owned(),
                    reason: format!("unexpected character `{other}`"),
                });
            }
        }
        chars.next();
    }
    Ok(tokens)
}

struct Parser<'a> {
    catalog: &'a Catalog,
    expression: &'a str,
    tokens: &'a [Token],
    position: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position = self.position.saturating_add(1);
        }
        token
    }

    fn error(&self, reason: &str) -> CatalogError {
        CatalogError::Expression {
            expression: self.expression.to_owned(),
            reason: reason.to_owned(),
        }
    }

    fn expect_close(&mut self) -> Result<(), CatalogError> {
        match self.next() {
            Some(Token::Close) => Ok(()),
            Some(other) => {
                let reason = format!("expected `)`, found {other}");
                Err(self.error(&reason))
            }
            None => Err(self.error("expected `)`, found end of input")),
        }
    }

    fn node(&mut self) -> Result<SyntaxNode, CatalogError> {
        let name = match self.next() {
            Some(Token::Word(word)) => word.clone(),
            Some(other) => {
                let reason = format!("expected a name, found {other}");
                return Err(self.error(&reason));
            }
            None => return Err(self.error("expected a name, found end of input")),
        };

        if self.peek() != Some(&Token::Open) {
            return Ok(SyntaxNode::leaf(self.catalog.leaf(&name)?));
        }
        self.next();

        if name == "random" {
            let probability = match self.next() {
                Some(Token::Word(word)) => word.parse::<f64>().ok(),
                _ => None,
            };
            let Some(probability) = probability else {
                return Err(self.error("random(p) needs a numeric probability"));
            };
            self.expect_close()?;
            return Ok(SyntaxNode::leaf(builtin::random(probability)?));
        }

        let operator = self.catalog.operator(&name)?;
        let mut children = Vec::new();
        if self.peek() == Some(&Token::Close) {
            self.next();
        } else {
            loop {
                children.push(self.node()?);
                match self.next() {
                    Some(Token::Comma) => {}
                    Some(Token::Close) => break,
                    Some(other) => {
                        let reason = format!("expected `,` or `)`, found {other}");
                        return Err(self.error(&reason));
                    }
                    None => return Err(self.error("unclosed `(`")),
                }
            }
        }
        Ok(SyntaxNode::operation(operator, children))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evocoop_strategy::Encounter;
    use evocoop_types::{AgentId, GameResult, SimulationHistory};

    use super::*;

    #[test]
    fn builtin_catalog_knows_every_component() {
        let catalog = Catalog::builtin();
        for name in ["random", "cooperation", "hybrid"] {
            assert_eq!(catalog.pair_builder(name, &[]).unwrap().name(), name);
        }
        for name in ["step-payoff", "capital", "last-game-payoff", "sliding-window"] {
            assert_eq!(catalog.success_quantifier(name, &[]).unwrap().name(), name);
        }
        for name in ["replicator-dynamic", "preferential-adaption"] {
            assert_eq!(catalog.strategy_adjuster(name, &[]).unwrap().name(), name);
        }
        for name in ["ranking", "strategy"] {
            assert_eq!(catalog.equilibrium_criterion(name, &[]).unwrap().name(), name);
        }
        assert_eq!(catalog.strategy_names().count(), builtin::NAMES.len());
    }

    #[test]
    fn parameters_are_validated_on_lookup() {
        let catalog = Catalog::builtin();
        let window = catalog.success_quantifier("sliding-window", &[4.0]).unwrap();
        assert_eq!(window.parameter_values(), vec![4.0]);
        assert!(matches!(
            catalog.success_quantifier("sliding-window", &[0.0]),
            Err(CatalogError::Parameter { .. })
        ));
        assert!(matches!(
            catalog.pair_builder("stable-marriage", &[]),
            Err(CatalogError::Unknown { kind: "pair builder", .. })
        ));
    }

    #[test]
    fn distributions_are_built_by_family() {
        let catalog = Catalog::builtin();
        let d = catalog.distribution("poisson", &[4.0]).unwrap();
        assert_eq!(d.name(), "poisson");
        assert!(catalog.distribution("binomial", &[10.0, 1.5]).is_err());
        assert!(matches!(
            catalog.distribution("zipf", &[]),
            Err(CatalogError::Unknown { .. })
        ));
    }

    #[test]
    fn compiled_expression_matches_formula() {
        let catalog = Catalog::builtin();
        let strategy = catalog.strategy("and(grim, TIT-FOR-TAT)");
        assert!(matches!(strategy, Err(CatalogError::Unknown { kind: "strategy", .. })));

        let strategy = catalog.strategy("AND(grim, tit-for-tat)").unwrap();
        let mut history = SimulationHistory::new();
        history.push(GameResult {
            player: AgentId(0),
            opponent: AgentId(1),
            player_cooperated: true,
            opponent_cooperated: true,
            player_payoff: 3.0,
            opponent_payoff: 3.0,
        });
        let encounter = Encounter::new(AgentId(0), AgentId(1), &history);
        assert!((strategy.cooperation_probability(&encounter) - 1.0).abs() < 1e-12);

        let negated = catalog.strategy("not(AND(grim, tit-for-tat))").unwrap();
        assert!(negated.cooperation_probability(&encounter).abs() < 1e-12);
    }

    #[test]
    fn random_takes_a_probability() {
        let catalog = Catalog::builtin();
        let strategy = catalog.strategy("random(0.25)").unwrap();
        let history = SimulationHistory::new();
        let encounter = Encounter::new(AgentId(0), AgentId(1), &history);
        assert!((strategy.cooperation_probability(&encounter) - 0.25).abs() < 1e-12);
        assert!(catalog.strategy("random(1.5)").is_err());
        assert!(matches!(
            catalog.strategy("random(grim)"),
            Err(CatalogError::Expression { .. })
        ));
    }

    #[test]
    fn arity_errors_report_the_faulty_path() {
        let catalog = Catalog::builtin();
        let tree = catalog
            .parse_strategy("OR(grim, AND(pavlov))")
            .unwrap();
        assert!(!tree.check_syntax());
        assert_eq!(tree.faulty_path(), Some(vec![1]));
        assert!(matches!(
            catalog.strategy("OR(grim, AND(pavlov))"),
            Err(CatalogError::Strategy {
                source: StrategyError::Syntax { .. }
            })
        ));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        let catalog = Catalog::builtin();
        for text in ["", "AND(grim", "AND(grim,)", "grim)", "grim pavlov", "AND[grim]"] {
            assert!(catalog.parse_strategy(text).is_err(), "accepted `{text}`");
        }
        assert!(matches!(
            catalog.parse_strategy("FOO(grim)"),
            Err(CatalogError::Unknown { kind: "operator", .. })
        ));
    }
}
