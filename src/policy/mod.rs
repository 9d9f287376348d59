//! Run stop policy
//!
//! The worker checks its budgets before leasing every batch and again before
//! every leased item. Evaluation is a pure function of a counter snapshot
//! against budgets fixed at run start, with one winner chosen in priority
//! order:
//!
//! 1. elapsed runtime
//! 2. processed pages
//! 3. emitted results
//! 4. idle cycles against the configured ceiling
//! 5. idle cycles against the queue-drained threshold
//!
//! The queue-drained threshold is `min(2, maxIdleCycles)`, so short runs can
//! finish as `queue_drained` well before the idle ceiling, while a run whose
//! ceiling is lower than two reports the explicit idle reason first.

use std::time::Duration;

use crate::config::RunConfig;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxRuntimeReached,
    MaxPagesReached,
    MaxResultsReached,
    MaxIdleCyclesReached,
    QueueDrained,
}

impl StopReason {
    /// Wire name used in events and failure reasons
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::MaxRuntimeReached => "max_runtime_reached",
            StopReason::MaxPagesReached => "max_pages_reached",
            StopReason::MaxResultsReached => "max_results_reached",
            StopReason::MaxIdleCyclesReached => "max_idle_cycles_reached",
            StopReason::QueueDrained => "queue_drained",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Budgets a run is held to, fixed at run start
#[derive(Debug, Clone)]
pub struct StopBudgets {
    pub max_runtime: Duration,
    pub max_pages: u64,
    pub max_results: u64,
    pub max_idle_cycles: u32,
    pub queue_drained_threshold: u32,
}

impl StopBudgets {
    /// Derives the budgets from the run configuration
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            max_runtime: Duration::from_secs(config.max_runtime_seconds),
            max_pages: config.max_pages,
            max_results: config.max_results,
            max_idle_cycles: config.max_idle_cycles,
            queue_drained_threshold: config.max_idle_cycles.min(2),
        }
    }
}

/// Point-in-time view of the run counters
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetSnapshot {
    pub elapsed: Duration,
    pub processed_pages: u64,
    pub emitted_results: u64,
    pub idle_cycles: u32,
}

/// Evaluates the stop policy for one snapshot
///
/// Returns the first budget crossed in priority order, or `None` when the
/// run may continue.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use leafcutter::policy::{evaluate_stop, BudgetSnapshot, StopBudgets, StopReason};
///
/// let budgets = StopBudgets {
///     max_runtime: Duration::from_secs(3600),
///     max_pages: 500,
///     max_results: 50_000,
///     max_idle_cycles: 3,
///     queue_drained_threshold: 2,
/// };
/// let snapshot = BudgetSnapshot {
///     idle_cycles: 2,
///     ..Default::default()
/// };
/// assert_eq!(evaluate_stop(&budgets, &snapshot), Some(StopReason::QueueDrained));
/// ```
pub fn evaluate_stop(budgets: &StopBudgets, snapshot: &BudgetSnapshot) -> Option<StopReason> {
    if snapshot.elapsed >= budgets.max_runtime {
        return Some(StopReason::MaxRuntimeReached);
    }
    if snapshot.processed_pages >= budgets.max_pages {
        return Some(StopReason::MaxPagesReached);
    }
    if snapshot.emitted_results >= budgets.max_results {
        return Some(StopReason::MaxResultsReached);
    }
    if snapshot.idle_cycles >= budgets.max_idle_cycles {
        return Some(StopReason::MaxIdleCyclesReached);
    }
    if snapshot.idle_cycles >= budgets.queue_drained_threshold {
        return Some(StopReason::QueueDrained);
    }
    None
}
