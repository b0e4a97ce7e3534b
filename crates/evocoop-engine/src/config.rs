//! Configuration loading for the evocoop engine binary.
//!
//! The configuration lives in `evocoop-config.yaml` by default. Every
//! section is optional and falls back to its defaults, so an empty file
//! describes a small runnable simulation. Names in the file (components,
//! strategies, distributions) are resolved later against the
//! [`Catalog`](crate::catalog::Catalog).

use std::path::Path;

use evocoop_scheduler::SchedulerConfig;
use evocoop_types::PayoffMatrix;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationFileConfig {
    /// Loop settings and payoffs.
    #[serde(default)]
    pub simulation: SimulationSection,

    /// Pluggable component selection.
    #[serde(default)]
    pub components: ComponentsSection,

    /// Initial population.
    #[serde(default)]
    pub population: PopulationSection,

    /// Optional parameter sweep.
    #[serde(default)]
    pub sweep: Option<SweepSection>,

    /// Worker pool sizing.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Output of the final summary.
    #[serde(default)]
    pub report: ReportConfig,
}

impl SimulationFileConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Settings of the adaptation loop.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulationSection {
    /// Game rounds per pair and adaptation step.
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// Independent runs per configuration.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Maximum adaptation steps per run.
    #[serde(default = "default_max_adapts")]
    pub max_adapts: u32,

    /// Interpolate strategies instead of replacing them.
    #[serde(default)]
    pub mixed_strategies: bool,

    /// Base seed; drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Payoff matrix.
    #[serde(default)]
    pub payoff: PayoffMatrix,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            iterations: default_iterations(),
            max_adapts: default_max_adapts(),
            mixed_strategies: false,
            seed: None,
            payoff: PayoffMatrix::default(),
        }
    }
}

const fn default_rounds() -> u32 {
    10
}

const fn default_iterations() -> u32 {
    1
}

const fn default_max_adapts() -> u32 {
    100
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// A catalog name plus an optional flat parameter list.
///
/// An empty parameter list selects the component's defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentRef {
    /// Catalog name.
    pub name: String,

    /// Parameter values in declaration order.
    #[serde(default)]
    pub parameters: Vec<f64>,
}

impl ComponentRef {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            parameters: Vec::new(),
        }
    }
}

/// Selection of the four pluggable phases.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentsSection {
    /// Pair builder.
    #[serde(default = "default_pair_builder")]
    pub pair_builder: ComponentRef,

    /// Success quantifier.
    #[serde(default = "default_success_quantifier")]
    pub success_quantifier: ComponentRef,

    /// Strategy adjuster.
    #[serde(default = "default_strategy_adjuster")]
    pub strategy_adjuster: ComponentRef,

    /// Equilibrium criterion.
    #[serde(default = "default_equilibrium_criterion")]
    pub equilibrium_criterion: ComponentRef,
}

impl Default for ComponentsSection {
    fn default() -> Self {
        Self {
            pair_builder: default_pair_builder(),
            success_quantifier: default_success_quantifier(),
            strategy_adjuster: default_strategy_adjuster(),
            equilibrium_criterion: default_equilibrium_criterion(),
        }
    }
}

fn default_pair_builder() -> ComponentRef {
    ComponentRef::named("random")
}

fn default_success_quantifier() -> ComponentRef {
    ComponentRef::named("step-payoff")
}

fn default_strategy_adjuster() -> ComponentRef {
    ComponentRef::named("replicator-dynamic")
}

fn default_equilibrium_criterion() -> ComponentRef {
    ComponentRef::named("strategy")
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// The initial population.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationSection {
    /// Agent groups, assembled in order.
    #[serde(default = "default_groups")]
    pub groups: Vec<GroupConfig>,
}

impl Default for PopulationSection {
    fn default() -> Self {
        Self {
            groups: default_groups(),
        }
    }
}

fn default_groups() -> Vec<GroupConfig> {
    vec![GroupConfig {
        name: String::from("main"),
        size: SizeConfig::Fixed(20),
        capital: CapitalConfig::default(),
        segments: vec![
            SegmentConfig::strategy("tit-for-tat"),
            SegmentConfig::strategy("always-defect"),
            SegmentConfig::strategy("always-cooperate"),
        ],
    }]
}

/// One agent group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GroupConfig {
    /// Group name, referenced by group-size sweeps.
    pub name: String,

    /// Number of agents.
    pub size: SizeConfig,

    /// Initial capital of each agent.
    #[serde(default)]
    pub capital: CapitalConfig,

    /// Weighted strategy shares.
    pub segments: Vec<SegmentConfig>,
}

/// A named parametric distribution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DistributionConfig {
    /// Catalog name of the distribution family.
    pub distribution: String,

    /// Parameter values in declaration order.
    #[serde(default)]
    pub parameters: Vec<f64>,
}

/// Group size: a number, or a distribution to draw from per run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeConfig {
    /// Fixed size.
    Fixed(usize),
    /// Drawn once per run.
    Drawn(DistributionConfig),
}

/// Initial capital: a number, or a distribution to draw from per agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CapitalConfig {
    /// Same capital for every agent.
    Fixed(f64),
    /// Drawn per agent.
    Drawn(DistributionConfig),
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self::Fixed(0.0)
    }
}

/// A share of a group playing one strategy.
///
/// Either `strategy` (an expression such as `AND(grim, tit-for-tat)`) or
/// `mixed` (a probability blend of expressions) must be given.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentConfig {
    /// Strategy expression.
    #[serde(default)]
    pub strategy: Option<String>,

    /// Mixed strategy components.
    #[serde(default)]
    pub mixed: Vec<MixtureEntry>,

    /// Relative weight within the group.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl SegmentConfig {
    fn strategy(expression: &str) -> Self {
        Self {
            strategy: Some(expression.to_owned()),
            mixed: Vec::new(),
            weight: default_weight(),
        }
    }
}

const fn default_weight() -> f64 {
    1.0
}

/// One component of a mixed strategy.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MixtureEntry {
    /// Strategy expression of the component.
    pub strategy: String,

    /// Probability of playing this component.
    pub probability: f64,
}

// ---------------------------------------------------------------------------
// Sweep
// ---------------------------------------------------------------------------

/// One varying dimension.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SweepSection {
    /// Numeric range over one target, e.g. `payoff.temptation` or
    /// `strategy_adjuster[1]`.
    Numeric {
        /// Target name.
        target: String,
        /// First value.
        start: f64,
        /// Last value (inclusive).
        end: f64,
        /// Increment.
        step: f64,
    },
    /// Enumerated sizes for one named group.
    GroupSize {
        /// Group name.
        group: String,
        /// Sizes, one configuration each.
        sizes: Vec<usize>,
    },
}

// ---------------------------------------------------------------------------
// Logging and report
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    String::from("info")
}

/// Output of the final summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReportConfig {
    /// Pretty-print the JSON summary.
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            pretty: default_true(),
        }
    }
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = SimulationFileConfig::parse("").unwrap();
        assert_eq!(config, SimulationFileConfig::default());
        assert_eq!(config.simulation.rounds, 10);
        assert_eq!(config.simulation.max_adapts, 100);
        assert_eq!(config.components.pair_builder.name, "random");
        assert_eq!(config.population.groups.len(), 1);
        assert!(config.sweep.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
simulation:
  rounds: 5
  iterations: 4
  max_adapts: 50
  mixed_strategies: true
  seed: 7
  payoff:
    reward: 3
    sucker: -1
    temptation: 4
    punishment: 0

components:
  pair_builder:
    name: hybrid
    parameters: [0.25, 1]
  success_quantifier:
    name: sliding-window
    parameters: [3]
  strategy_adjuster:
    name: preferential-adaption
  equilibrium_criterion:
    name: ranking
    parameters: [0.05, 4]

population:
  groups:
    - name: natives
      size: 12
      capital:
        distribution: poisson
        parameters: [5]
      segments:
        - strategy: AND(grim, tit-for-tat)
          weight: 2
        - mixed:
            - strategy: always-cooperate
              probability: 0.3
            - strategy: always-defect
              probability: 0.7
    - name: visitors
      size:
        distribution: binomial
        parameters: [10, 0.5]
      segments:
        - strategy: random(0.4)

sweep:
  kind: numeric
  target: payoff.temptation
  start: 4
  end: 6
  step: 0.5

scheduler:
  worker_count: 3
  reserve_interactive_thread: true

logging:
  level: debug
";
        let config = SimulationFileConfig::parse(yaml).unwrap();
        assert_eq!(config.simulation.iterations, 4);
        assert_eq!(config.simulation.seed, Some(7));
        assert!((config.simulation.payoff.sucker + 1.0).abs() < 1e-12);
        assert_eq!(config.components.pair_builder.parameters, vec![0.25, 1.0]);
        assert!(config.components.strategy_adjuster.parameters.is_empty());

        let natives = config.population.groups.first().unwrap();
        assert_eq!(natives.size, SizeConfig::Fixed(12));
        assert!(matches!(natives.capital, CapitalConfig::Drawn(_)));
        assert_eq!(natives.segments.len(), 2);
        assert_eq!(natives.segments.get(1).unwrap().mixed.len(), 2);

        let visitors = config.population.groups.get(1).unwrap();
        assert!(matches!(visitors.size, SizeConfig::Drawn(_)));
        assert_eq!(visitors.capital, CapitalConfig::Fixed(0.0));

        assert!(matches!(
            config.sweep,
            Some(SweepSection::Numeric { ref target, .. }) if target == "payoff.temptation"
        ));
        assert_eq!(config.scheduler.worker_count, 3);
        assert!(config.scheduler.reserve_interactive_thread);
        assert_eq!(config.logging.level, "debug");
        assert!(config.report.pretty);
    }

    #[test]
    fn group_size_sweep_parses() {
        let yaml = r"
sweep:
  kind: group_size
  group: main
  sizes: [10, 20, 40]
";
        let config = SimulationFileConfig::parse(yaml).unwrap();
        assert_eq!(
            config.sweep,
            Some(SweepSection::GroupSize {
                group: "main".to_owned(),
                sizes: vec![10, 20, 40],
            })
        );
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            SimulationFileConfig::parse("simulation: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
