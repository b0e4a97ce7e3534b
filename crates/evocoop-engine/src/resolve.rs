//! Resolution of the file configuration into core building blocks.
//!
//! Every name is looked up in the [`Catalog`] and every parameter list is
//! checked here, so the core only ever receives resolved, validated
//! components.

use evocoop_core::SweepTarget;
use evocoop_core::configuration::{Components, SimulationConfiguration, Sweep};
use evocoop_core::population::{GroupSize, GroupSpec, InitialCapital, PopulationSpec, Segment};
use evocoop_strategy::{MixedStrategy, Strategy};
use evocoop_types::PayoffEntry;

use crate::catalog::{Catalog, CatalogError};
use crate::config::{
    CapitalConfig, ComponentsSection, GroupConfig, SegmentConfig, SimulationFileConfig,
    SizeConfig, SweepSection,
};

/// Build the simulation described by `config`.
///
/// # Errors
///
/// Returns the first [`CatalogError`] met while resolving names,
/// parameters, or strategy expressions.
pub fn resolve(
    config: &SimulationFileConfig,
    catalog: &Catalog,
) -> Result<SimulationConfiguration, CatalogError> {
    let simulation = &config.simulation;
    Ok(SimulationConfiguration {
        rounds: simulation.rounds,
        iterations: simulation.iterations,
        max_adapts: simulation.max_adapts,
        mixed_strategies: simulation.mixed_strategies,
        payoff: simulation.payoff,
        seed: simulation.seed,
        population: PopulationSpec {
            groups: config
                .population
                .groups
                .iter()
                .map(|group| resolve_group(group, catalog))
                .collect::<Result<_, _>>()?,
        },
        components: resolve_components(&config.components, catalog)?,
        sweep: config.sweep.as_ref().map(resolve_sweep).transpose()?,
    })
}

fn resolve_components(
    section: &ComponentsSection,
    catalog: &Catalog,
) -> Result<Components, CatalogError> {
    Ok(Components {
        pair_builder: catalog
            .pair_builder(&section.pair_builder.name, &section.pair_builder.parameters)?,
        success: catalog.success_quantifier(
            &section.success_quantifier.name,
            &section.success_quantifier.parameters,
        )?,
        adjuster: catalog.strategy_adjuster(
            &section.strategy_adjuster.name,
            &section.strategy_adjuster.parameters,
        )?,
        equilibrium: catalog.equilibrium_criterion(
            &section.equilibrium_criterion.name,
            &section.equilibrium_criterion.parameters,
        )?,
    })
}

fn resolve_group(group: &GroupConfig, catalog: &Catalog) -> Result<GroupSpec, CatalogError> {
    let size = match &group.size {
        SizeConfig::Fixed(n) => GroupSize::Fixed(*n),
        SizeConfig::Drawn(d) => {
            GroupSize::Drawn(catalog.distribution(&d.distribution, &d.parameters)?)
        }
    };
    let capital = match &group.capital {
        CapitalConfig::Fixed(c) => InitialCapital::Fixed(*c),
        CapitalConfig::Drawn(d) => {
            InitialCapital::Drawn(catalog.distribution(&d.distribution, &d.parameters)?)
        }
    };
    let segments = group
        .segments
        .iter()
        .map(|segment| {
            Ok(Segment {
                strategy: resolve_segment(segment, catalog)?,
                weight: segment.weight,
            })
        })
        .collect::<Result<_, CatalogError>>()?;

    Ok(GroupSpec {
        name: group.name.clone(),
        size,
        capital,
        segments,
    })
}

fn resolve_segment(segment: &SegmentConfig, catalog: &Catalog) -> Result<Strategy, CatalogError> {
    if segment.mixed.is_empty() {
        let expression = segment.strategy.as_deref().ok_or_else(|| CatalogError::Expression {
            expression: String::new(),
            reason: "segment needs `strategy` or `mixed`".to_owned(),
        })?;
        return catalog.strategy(expression);
    }

    let components = segment
        .mixed
        .iter()
        .map(|entry| match catalog.strategy(&entry.strategy)? {
            Strategy::Pure(pure) => Ok((pure, entry.probability)),
            Strategy::Mixed(_) => Err(CatalogError::Expression {
                expression: entry.strategy.clone(),
                reason: "mixed strategy components must be pure".to_owned(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Strategy::Mixed(MixedStrategy::new(components)?))
}

fn resolve_sweep(section: &SweepSection) -> Result<Sweep, CatalogError> {
    match section {
        SweepSection::Numeric {
            target,
            start,
            end,
            step,
        } => Ok(Sweep::Numeric {
            target: parse_sweep_target(target)?,
            start: *start,
            end: *end,
            step: *step,
        }),
        SweepSection::GroupSize { group, sizes } => Ok(Sweep::GroupSize {
            group: group.clone(),
            sizes: sizes.clone(),
        }),
    }
}

/// Parse a sweep target such as `rounds`, `payoff.temptation`, or
/// `strategy_adjuster[1]`.
///
/// # Errors
///
/// Returns [`CatalogError::Unknown`] for an unrecognised target.
pub fn parse_sweep_target(text: &str) -> Result<SweepTarget, CatalogError> {
    let unknown = || CatalogError::Unknown {
        kind: "sweep target",
        name: text.to_owned(),
    };
    match text {
        "rounds" => return Ok(SweepTarget::Rounds),
        "max_adapts" => return Ok(SweepTarget::MaxAdapts),
        _ => {}
    }
    if let Some(entry) = text.strip_prefix("payoff.") {
        return PayoffEntry::from_name(entry)
            .map(SweepTarget::Payoff)
            .ok_or_else(unknown);
    }

    let (component, rest) = text.split_once('[').ok_or_else(unknown)?;
    let index: usize = rest
        .strip_suffix(']')
        .and_then(|i| i.parse().ok())
        .ok_or_else(unknown)?;
    match component {
        "pair_builder" => Ok(SweepTarget::PairBuilder(index)),
        "success_quantifier" => Ok(SweepTarget::SuccessQuantifier(index)),
        "strategy_adjuster" => Ok(SweepTarget::StrategyAdjuster(index)),
        "equilibrium_criterion" => Ok(SweepTarget::EquilibriumCriterion(index)),
        _ => Err(unknown()),
    }
}
