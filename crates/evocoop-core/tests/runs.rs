//! End-to-end runs of the adaptation loop through the public API.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_panics_doc
)]

use std::sync::Arc;

use evocoop_core::adjustment::{AdjustmentSettings, PreferentialAdaption};
use evocoop_core::configuration::derive_seed;
use evocoop_core::equilibrium::{EquilibriumSettings, StrategyCriterion};
use evocoop_core::pairing::HybridPairBuilder;
use evocoop_core::population::{GroupSize, GroupSpec, InitialCapital, PopulationSpec, Segment};
use evocoop_core::success::SlidingWindow;
use evocoop_core::{
    Component, IterationResult, SimulationConfiguration, Sweep, SweepTarget, TerminationReason,
    run_iteration,
};
use evocoop_sampling::Poisson;
use evocoop_strategy::builtin;

fn configuration() -> SimulationConfiguration {
    let mut config = SimulationConfiguration {
        rounds: 4,
        iterations: 2,
        max_adapts: 30,
        mixed_strategies: true,
        seed: Some(2024),
        population: PopulationSpec {
            groups: vec![
                GroupSpec {
                    name: "reciprocators".to_owned(),
                    size: GroupSize::Fixed(8),
                    capital: InitialCapital::Fixed(10.0),
                    segments: vec![
                        Segment {
                            strategy: builtin::tit_for_tat(),
                            weight: 1.0,
                        },
                        Segment {
                            strategy: builtin::pavlov(),
                            weight: 1.0,
                        },
                    ],
                },
                GroupSpec {
                    name: "defectors".to_owned(),
                    size: GroupSize::Fixed(4),
                    capital: InitialCapital::Drawn(Arc::new(Poisson::new(3.0).unwrap())),
                    segments: vec![Segment {
                        strategy: builtin::always_defect(),
                        weight: 1.0,
                    }],
                },
            ],
        },
        ..SimulationConfiguration::default()
    };
    config.components.pair_builder = Arc::new(HybridPairBuilder::default());
    config.components.success = Arc::new(SlidingWindow { window: 3 });
    config.components.adjuster = Arc::new(PreferentialAdaption {
        settings: AdjustmentSettings {
            comparing_probability: 0.8,
            adjusting_factor: 1.0,
        },
    });
    config.components.equilibrium = Arc::new(StrategyCriterion {
        settings: EquilibriumSettings {
            strictness: 0.01,
            required_steps: 3,
        },
    });
    config
}

fn run_all(config: &SimulationConfiguration) -> Vec<IterationResult> {
    let base = config.seed.unwrap();
    config
        .expand()
        .unwrap()
        .iter()
        .flat_map(|run| {
            (0..config.iterations)
                .map(move |i| run_iteration(run, i, derive_seed(base, run.index, i)))
        })
        .collect()
}

#[test]
fn runs_terminate_with_complete_populations() {
    let results = run_all(&configuration());
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.finished, "run failed: {:?}", result.failure);
        assert!(result.adaptation_steps >= 1);
        assert!(result.adaptation_steps <= 30);
        assert_eq!(result.adaptation_steps, result.elapsed_steps);
        assert_eq!(result.agents.len(), 12);
        assert!(matches!(
            result.termination,
            TerminationReason::Equilibrium | TerminationReason::MaxAdapts
        ));
    }
}

#[test]
fn identical_seeds_reproduce_runs() {
    let config = configuration();
    let a = run_all(&config);
    let b = run_all(&config);
    assert_eq!(a, b);
}

#[test]
fn sweep_yields_one_result_per_value_and_iteration() {
    let mut config = configuration();
    config.sweep = Some(Sweep::Numeric {
        target: SweepTarget::Rounds,
        start: 1.0,
        end: 3.0,
        step: 1.0,
    });
    let results = run_all(&config);
    assert_eq!(results.len(), 6);
    for index in 0..3 {
        assert_eq!(
            results
                .iter()
                .filter(|r| r.configuration_index == index)
                .count(),
            2
        );
    }
}

#[test]
fn group_size_sweep_changes_population() {
    let mut config = configuration();
    config.iterations = 1;
    config.sweep = Some(Sweep::GroupSize {
        group: "defectors".to_owned(),
        sizes: vec![0, 2],
    });
    let results = run_all(&config);
    let sizes: Vec<usize> = results.iter().map(|r| r.agents.len()).collect();
    assert_eq!(sizes, vec![8, 10]);
}

#[test]
fn results_serialize_to_json() {
    let mut config = configuration();
    config.iterations = 1;
    let result = run_all(&config).remove(0);
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["configuration_index"], 0);
    assert!(json["termination"].is_string());
    assert_eq!(json["agents"].as_array().unwrap().len(), 12);
    let back: IterationResult = serde_json::from_value(json).unwrap();
    assert_eq!(back, result);
}

#[test]
fn component_parameters_are_exposed() {
    let config = configuration();
    assert_eq!(config.components.success.name(), "sliding-window");
    assert_eq!(config.components.success.parameter_values(), vec![3.0]);
    assert_eq!(
        config.components.adjuster.declared_parameters().len(),
        2
    );
}
