//! The per-tick cycle driver.
//!
//! [`run_initialize`] runs once at tick 0; [`run_cycle`] runs one tick by
//! walking the model's stage sequence:
//!
//! 1. Enter the stage on the clock.
//! 2. For `first()`/`early()`/`late()` stages, dispatch the stage's event
//!    kind and execute each block in order. Every other stage is handed to
//!    [`Interpreter::run_callback_stage`].
//! 3. Flush the ordinary pending-removal queue.
//! 4. At the end-of-tick stage, also flush the interaction queue.
//!
//! After the last stage the clock enters `PostCycle` and advances.

use serde::Serialize;
use stagehand_types::{BlockKind, CycleStage, Tick};
use tracing::{debug, info};

use crate::clock::ClockError;
use crate::dispatch::DispatchQuery;
use crate::error::{SchedulingError, ScriptError};
use crate::interpreter::{ExecutionRequest, Interpreter};
use crate::scheduler::Scheduler;

/// Errors that stop a cycle.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// Dispatch or a queue flush failed.
    #[error("scheduling error: {source}")]
    Scheduling {
        /// The underlying scheduling error.
        #[from]
        source: SchedulingError,
    },

    /// A script failed.
    #[error("script error: {source}")]
    Script {
        /// The underlying script error.
        #[from]
        source: ScriptError,
    },

    /// The clock refused a transition.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The clock was not at the start of a tick.
    #[error("cycle must start at the beginning of a tick, clock is at tick {tick} {stage:?}")]
    NotAtStart {
        /// Current tick.
        tick: Tick,
        /// Current stage.
        stage: CycleStage,
    },
}

/// What happened in one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageReport {
    /// The stage.
    pub stage: CycleStage,
    /// Blocks executed.
    pub executed: usize,
    /// Blocks removed by the flush at the end of the stage.
    pub flushed: usize,
}

/// What happened in one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// The tick that ran.
    pub tick: Tick,
    /// One report per stage, in execution order.
    pub stages: Vec<StageReport>,
}

impl CycleSummary {
    /// Total blocks executed across all stages.
    pub fn executed(&self) -> usize {
        self.stages.iter().map(|report| report.executed).sum()
    }

    /// Total blocks removed across all stages.
    pub fn flushed(&self) -> usize {
        self.stages.iter().map(|report| report.flushed).sum()
    }
}

/// Run the `initialize()` callbacks and move the clock to tick 1.
///
/// # Errors
///
/// Returns [`CycleError::NotAtStart`] unless the clock is at tick 0
/// `PreCycle`; otherwise any dispatch, script or clock error.
pub fn run_initialize(
    scheduler: &mut Scheduler,
    interpreter: &mut dyn Interpreter,
) -> Result<StageReport, CycleError> {
    let (tick, stage) = scheduler.now();
    if tick != 0 || stage != CycleStage::PreCycle {
        return Err(CycleError::NotAtStart { tick, stage });
    }
    scheduler.close_declarations();

    let executed = execute_kind(
        scheduler,
        interpreter,
        BlockKind::InitializeCallback,
        CycleStage::PreCycle,
    )?;
    let flushed = scheduler.flush_ordinary()?;
    scheduler.advance_tick()?;

    info!(executed, "initialization complete");
    Ok(StageReport {
        stage: CycleStage::PreCycle,
        executed,
        flushed,
    })
}

/// Run one full tick.
///
/// # Errors
///
/// Returns [`CycleError::NotAtStart`] if the clock is mid-tick or
/// initialization has not run; otherwise the first dispatch, script or
/// clock error. A failed cycle leaves the clock where the failure happened.
pub fn run_cycle(
    scheduler: &mut Scheduler,
    interpreter: &mut dyn Interpreter,
) -> Result<CycleSummary, CycleError> {
    let (tick, stage) = scheduler.now();
    if tick == 0 || stage != CycleStage::PreCycle {
        return Err(CycleError::NotAtStart { tick, stage });
    }
    debug!(tick, model = ?scheduler.model(), "tick started");
    scheduler.reactivate_all();

    let stages = scheduler.model().stages();
    let mut reports = Vec::with_capacity(stages.len());
    for &stage in stages {
        scheduler.enter_stage(stage)?;

        let executed = match stage.event_kind() {
            Some(kind) => execute_kind(scheduler, interpreter, kind, stage)?,
            None => interpreter.run_callback_stage(stage, scheduler)?,
        };

        let mut flushed = scheduler.flush_ordinary()?;
        if stage.invalidates_interactions() {
            flushed = flushed.saturating_add(scheduler.flush_interaction()?);
        }
        reports.push(StageReport {
            stage,
            executed,
            flushed,
        });
    }

    scheduler.enter_stage(CycleStage::PostCycle)?;
    scheduler.advance_tick()?;

    let summary = CycleSummary {
        tick,
        stages: reports,
    };
    info!(
        tick,
        executed = summary.executed(),
        flushed = summary.flushed(),
        "tick complete"
    );
    Ok(summary)
}

/// Dispatch `kind` at the current tick and execute each match.
///
/// The match list is fixed at dispatch time. A block flushed by an earlier
/// script in the same stage, or switched off this tick, is skipped.
fn execute_kind(
    scheduler: &mut Scheduler,
    interpreter: &mut dyn Interpreter,
    kind: BlockKind,
    stage: CycleStage,
) -> Result<usize, CycleError> {
    let tick = scheduler.clock().tick();
    let handles = scheduler.blocks_matching(&DispatchQuery::new(tick, kind))?;

    let mut executed: usize = 0;
    for handle in handles {
        let Ok(block) = scheduler.block(handle) else {
            continue;
        };
        if !block.is_active() {
            debug!(%handle, %kind, tick, "skipping inactive block");
            continue;
        }
        let request = ExecutionRequest::for_block(handle, block, tick, stage);
        debug!(%handle, %kind, tick, ?stage, "executing block");
        interpreter.execute(&request, scheduler)?;
        executed = executed.saturating_add(1);
    }
    Ok(executed)
}
