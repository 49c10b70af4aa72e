//! Simulation loop runner.
//!
//! [`run_simulation`] runs the initialization pass, then cycles until one of
//! these holds:
//!
//! - **Finished**: a script called `declare_finished`.
//! - **Last scheduled tick passed**: the clock is past the last tick at
//!   which any bounded block is scheduled.
//! - **Tick cap**: `run.max_ticks` cycles have run (0 disables the cap).
//!
//! The finished flag is checked after every cycle; the other two before.

use serde::Serialize;
use stagehand_types::Tick;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::cycle::{self, CycleError, CycleSummary};
use crate::interpreter::Interpreter;
use crate::scheduler::Scheduler;

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A cycle failed.
    #[error("cycle error: {source}")]
    Cycle {
        /// The underlying cycle error.
        #[from]
        source: CycleError,
    },
}

/// Why the run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A script declared the simulation finished.
    Finished,
    /// No bounded block is scheduled at or after the current tick.
    LastScheduledTickPassed,
    /// Reached the configured `max_ticks` limit.
    MaxTicksReached,
}

/// Result of the simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: EndReason,
    /// First tick with an event scheduled, as seen after initialization.
    pub first_scheduled_tick: Option<Tick>,
    /// The last cycle summary, if any cycle completed.
    pub final_summary: Option<CycleSummary>,
    /// Total number of cycles executed.
    pub total_ticks: u64,
}

/// Callback invoked after each cycle completes.
pub trait CycleCallback {
    /// Called after a cycle completes successfully.
    fn on_cycle(&mut self, summary: &CycleSummary, scheduler: &Scheduler);
}

/// A no-op cycle callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl CycleCallback for NoOpCallback {
    fn on_cycle(&mut self, _summary: &CycleSummary, _scheduler: &Scheduler) {}
}

/// Run the simulation until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if initialization or a cycle fails.
pub fn run_simulation(
    scheduler: &mut Scheduler,
    interpreter: &mut dyn Interpreter,
    run: &RunConfig,
    callback: &mut dyn CycleCallback,
) -> Result<SimulationResult, RunnerError> {
    cycle::run_initialize(scheduler, interpreter)?;

    let first_scheduled_tick = scheduler.first_scheduled_tick();
    info!(
        max_ticks = run.max_ticks,
        first_tick = first_scheduled_tick,
        last_tick = scheduler.last_bounded_tick(),
        blocks = scheduler.block_count(),
        "Simulation starting"
    );

    let mut final_summary: Option<CycleSummary> = None;
    let mut total_ticks: u64 = 0;

    let end_reason = loop {
        if scheduler.is_finished() {
            break EndReason::Finished;
        }
        let tick = scheduler.clock().tick();
        let last_tick = scheduler.last_bounded_tick();
        if tick > last_tick {
            info!(tick, last_tick, "Last scheduled tick passed");
            break EndReason::LastScheduledTickPassed;
        }
        if run.max_ticks > 0 && total_ticks >= run.max_ticks {
            info!(tick, max_ticks = run.max_ticks, "Tick limit reached");
            break EndReason::MaxTicksReached;
        }

        let summary = cycle::run_cycle(scheduler, interpreter)?;
        total_ticks = total_ticks.saturating_add(1);
        callback.on_cycle(&summary, scheduler);
        final_summary = Some(summary);
    };

    Ok(SimulationResult {
        end_reason,
        first_scheduled_tick,
        final_summary,
        total_ticks,
    })
}

/// Log the simulation end sequence.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        "Simulation ended"
    );

    if let Some(ref summary) = result.final_summary {
        info!(
            tick = summary.tick,
            executed = summary.executed(),
            flushed = summary.flushed(),
            "Final cycle summary"
        );
    } else {
        warn!("Simulation ended with no ticks executed");
    }
}
