//! JSON summary of a finished (or canceled) simulation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use evocoop_core::{IterationResult, TerminationReason};
use evocoop_scheduler::{SimulationResult, SimulationStatus};
use evocoop_types::SimulationId;
use serde::Serialize;

/// Aggregate over all runs of one configuration index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigurationSummary {
    /// Configuration index within the sweep.
    pub configuration_index: usize,
    /// Runs recorded.
    pub runs: usize,
    /// Runs that terminated normally.
    pub finished: usize,
    /// Runs that aborted.
    pub failed: usize,
    /// Runs that reached equilibrium.
    pub equilibrium: usize,
    /// Mean adaptation steps over finished runs.
    pub mean_adaptation_steps: f64,
    /// Mean final capital over all agents of finished runs.
    pub mean_capital: f64,
    /// Share of each final strategy over all agents of finished runs.
    pub strategy_shares: BTreeMap<String, f64>,
}

/// The full report printed at the end of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Simulation id.
    pub simulation: SimulationId,
    /// Final status.
    pub status: SimulationStatus,
    /// Base seed of every run.
    pub base_seed: u64,
    /// Submission time.
    pub started_at: DateTime<Utc>,
    /// Completion or cancellation time.
    pub finished_at: Option<DateTime<Utc>>,
    /// Runs planned.
    pub total: usize,
    /// Per-configuration summaries, by index.
    pub configurations: Vec<ConfigurationSummary>,
}

#[allow(clippy::cast_precision_loss)]
const fn as_f64(n: usize) -> f64 {
    n as f64
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / as_f64(count)
    }
}

/// Summarize the runs of one configuration.
pub fn summarize(configuration_index: usize, runs: &[IterationResult]) -> ConfigurationSummary {
    let completed: Vec<&IterationResult> = runs.iter().filter(|r| r.finished).collect();
    let equilibrium = completed
        .iter()
        .filter(|r| r.termination == TerminationReason::Equilibrium)
        .count();
    let steps: f64 = completed
        .iter()
        .map(|r| f64::from(r.adaptation_steps))
        .sum();

    let mut agents = 0_usize;
    let mut capital = 0.0;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for agent in completed.iter().flat_map(|r| &r.agents) {
        agents = agents.saturating_add(1);
        capital += agent.capital;
        let count = counts.entry(agent.strategy.clone()).or_default();
        *count = count.saturating_add(1);
    }

    ConfigurationSummary {
        configuration_index,
        runs: runs.len(),
        finished: completed.len(),
        failed: runs.len().saturating_sub(completed.len()),
        equilibrium,
        mean_adaptation_steps: mean(steps, completed.len()),
        mean_capital: mean(capital, agents),
        strategy_shares: counts
            .into_iter()
            .map(|(name, count)| (name, mean(as_f64(count), agents)))
            .collect(),
    }
}

/// Build the report from the current state of a simulation.
pub fn build(result: &SimulationResult) -> SimulationReport {
    let progress = result.progress();
    SimulationReport {
        simulation: result.id(),
        status: progress.status,
        base_seed: result.base_seed(),
        started_at: result.started_at(),
        finished_at: result.finished_at(),
        total: result.total(),
        configurations: result
            .results()
            .iter()
            .map(|(index, runs)| summarize(*index, runs))
            .collect(),
    }
}

/// Render the report as JSON.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if serialization fails.
pub fn render(report: &SimulationReport, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use evocoop_core::{AgentSnapshot, FailureCause, FailureStage};
    use evocoop_types::{AgentId, SimulationHistory};

    use super::*;

    fn run(termination: TerminationReason, steps: u32, strategies: &[&str]) -> IterationResult {
        IterationResult {
            configuration_index: 0,
            iteration: 0,
            seed: 0,
            finished: true,
            adaptation_steps: steps,
            elapsed_steps: steps,
            termination,
            agents: strategies
                .iter()
                .zip(0_u32..)
                .map(|(s, id)| AgentSnapshot {
                    id: AgentId(id),
                    strategy: (*s).to_owned(),
                    capital: 10.0,
                    group: "main".to_owned(),
                })
                .collect(),
            history: SimulationHistory::new(),
            failure: None,
        }
    }

    #[test]
    fn summary_counts_outcomes() {
        let runs = vec![
            run(TerminationReason::Equilibrium, 4, &["grim", "grim"]),
            run(TerminationReason::MaxAdapts, 8, &["grim", "pavlov"]),
            IterationResult::aborted(
                0,
                2,
                0,
                FailureCause {
                    stage: FailureStage::Adjustment,
                    message: "bad".to_owned(),
                },
            ),
        ];
        let summary = summarize(0, &runs);
        assert_eq!(summary.runs, 3);
        assert_eq!(summary.finished, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.equilibrium, 1);
        assert!((summary.mean_adaptation_steps - 6.0).abs() < 1e-12);
        assert!((summary.mean_capital - 10.0).abs() < 1e-12);
        assert!((summary.strategy_shares.get("grim").unwrap() - 0.75).abs() < 1e-12);
        assert!((summary.strategy_shares.get("pavlov").unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_summary_has_zero_means() {
        let summary = summarize(3, &[]);
        assert_eq!(summary.configuration_index, 3);
        assert!(summary.mean_adaptation_steps.abs() < 1e-12);
        assert!(summary.strategy_shares.is_empty());
    }

    #[test]
    fn report_renders_status_and_summaries() {
        let result = SimulationResult::new(1, 9);
        result.record(run(TerminationReason::Equilibrium, 2, &["grim"]));
        let report = build(&result);
        assert_eq!(report.status, SimulationStatus::Finished);
        assert_eq!(report.configurations.len(), 1);

        let json: serde_json::Value =
            serde_json::from_str(&render(&report, false).unwrap()).unwrap();
        assert_eq!(json["status"], "FINISHED");
        assert_eq!(json["base_seed"], 9);
        assert_eq!(json["configurations"][0]["equilibrium"], 1);
    }
}
