//! Worker pool configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

/// Sizing of the run worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of runs executing at once.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Keep one worker slot idle so interactive work stays responsive.
    #[serde(default)]
    pub reserve_interactive_thread: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            reserve_interactive_thread: false,
        }
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

impl SchedulerConfig {
    /// Number of runs allowed to execute concurrently.
    ///
    /// The reserved slot is only taken when at least two workers are
    /// configured, so the pool never drops to zero.
    pub const fn effective_workers(&self) -> usize {
        if self.reserve_interactive_thread && self.worker_count > 1 {
            self.worker_count.saturating_sub(1)
        } else {
            self.worker_count
        }
    }
}
