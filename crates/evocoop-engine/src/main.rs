//! Simulation runner binary for evocoop.
//!
//! Loads a YAML configuration, resolves it against the built-in component
//! catalog, submits it to the bounded run scheduler, and prints a JSON
//! summary once every run has reported or the simulation is canceled.
//!
//! # Startup Sequence
//!
//! 1. Locate the configuration: first CLI argument, then `EVOCOOP_CONFIG`,
//!    then `evocoop-config.yaml` (defaults when that file is absent)
//! 2. Initialize structured logging (tracing)
//! 3. Resolve components, strategies, and distributions by name
//! 4. Build progress observers, create the run scheduler, and submit
//! 5. Install the Ctrl-C cancel handler
//! 6. Wait for completion and print the report

mod catalog;
mod config;
mod error;
mod report;
mod resolve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use evocoop_scheduler::{Observers, RunScheduler};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::config::SimulationFileConfig;
use crate::error::EngineError;

/// Default configuration file name, relative to the working directory.
const DEFAULT_CONFIG: &str = "evocoop-config.yaml";

/// Environment variable naming an alternative configuration file.
const CONFIG_ENV: &str = "EVOCOOP_CONFIG";

/// Application entry point for the evocoop engine.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or resolved, or
/// if the scheduler rejects the simulation.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration (the log level lives in it).
    let config = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        rounds = config.simulation.rounds,
        iterations = config.simulation.iterations,
        max_adapts = config.simulation.max_adapts,
        groups = config.population.groups.len(),
        "evocoop-engine starting"
    );

    // 3. Resolve names against the catalog.
    let catalog = Catalog::builtin();
    debug!(
        strategies = ?catalog.strategy_names().collect::<Vec<_>>(),
        "Catalog loaded"
    );
    let simulation = resolve::resolve(&config, &catalog).map_err(EngineError::from)?;
    info!(
        pair_builder = %config.components.pair_builder.name,
        success_quantifier = %config.components.success_quantifier.name,
        strategy_adjuster = %config.components.strategy_adjuster.name,
        equilibrium_criterion = %config.components.equilibrium_criterion.name,
        "Components resolved"
    );

    // 4. Observers, then submit.
    let observers = Observers::new()
        .on_iteration_finished(|progress, run| {
            info!(
                configuration = run.configuration_index,
                iteration = run.iteration,
                termination = ?run.termination,
                adaptation_steps = run.adaptation_steps,
                finished = progress.finished,
                total = progress.total,
                "Run finished"
            );
        })
        .on_exception(|progress, cause| {
            warn!(
                configuration = ?progress.configuration_index,
                stage = ?cause.stage,
                message = %cause.message,
                failed = progress.failed,
                "Run failed"
            );
        });
    let scheduler = RunScheduler::new(config.scheduler).map_err(EngineError::from)?;
    let result = scheduler
        .submit_with(&simulation, observers)
        .map_err(EngineError::from)?;
    info!(
        simulation = %result.id(),
        runs = result.total(),
        base_seed = result.base_seed(),
        workers = scheduler.workers(),
        "Simulation submitted"
    );

    // 5. Cancellation.
    let canceler = Arc::clone(&result);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && canceler.cancel() {
            warn!(simulation = %canceler.id(), "Simulation canceled by signal");
        }
    });

    // 6. Wait and report.
    let status = result.wait().await;
    let report = report::build(&result);
    println!(
        "{}",
        report::render(&report, config.report.pretty).map_err(EngineError::from)?
    );
    info!(simulation = %result.id(), status = ?status, "evocoop-engine finished");

    Ok(())
}

/// Resolve the configuration path from the command line or environment.
fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV))
        .map(PathBuf::from)
}

/// Load the simulation configuration.
///
/// An explicitly named file must exist. When no file is named and
/// `evocoop-config.yaml` is absent, defaults are used.
fn load_config() -> Result<SimulationFileConfig, EngineError> {
    if let Some(path) = config_path() {
        return Ok(SimulationFileConfig::from_file(&path)?);
    }
    let path = Path::new(DEFAULT_CONFIG);
    if path.exists() {
        Ok(SimulationFileConfig::from_file(path)?)
    } else {
        Ok(SimulationFileConfig::default())
    }
}
