//! The script interpreter seam.
//!
//! The scheduler decides *which* blocks run; an [`Interpreter`] runs them.
//! Script evaluation is out of scope for this crate, so the only
//! implementation here is [`NoOpInterpreter`]. The interpreter receives the
//! scheduler mutably, which is how executing scripts register, deregister
//! and reschedule blocks mid-cycle.

use stagehand_types::{BlockHandle, BlockId, BlockKind, CycleStage, Tick};

use crate::block::{ScriptBlock, ScriptSource};
use crate::error::ScriptError;
use crate::scheduler::Scheduler;

/// Everything an interpreter needs to run one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Handle of the block being run.
    pub handle: BlockHandle,
    /// Kind of the block.
    pub kind: BlockKind,
    /// User-visible id, if any.
    pub id: Option<BlockId>,
    /// Tick being executed.
    pub tick: Tick,
    /// Stage being executed.
    pub stage: CycleStage,
    /// Script text; shares storage with the block.
    pub source: ScriptSource,
}

impl ExecutionRequest {
    /// Build a request for `block` at `(tick, stage)`.
    pub fn for_block(
        handle: BlockHandle,
        block: &ScriptBlock,
        tick: Tick,
        stage: CycleStage,
    ) -> Self {
        Self {
            handle,
            kind: block.kind(),
            id: block.id(),
            tick,
            stage,
            source: block.source().clone(),
        }
    }
}

/// Executes script blocks on behalf of the cycle driver.
pub trait Interpreter {
    /// Run one block.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] if the script fails; the cycle stops at the
    /// first failure.
    fn execute(
        &mut self,
        request: &ExecutionRequest,
        scheduler: &mut Scheduler,
    ) -> Result<(), ScriptError>;

    /// Handle a stage that has no event kind of its own.
    ///
    /// These are the stages where callbacks fire from inside population
    /// machinery (offspring generation, fitness, survival). Implementations
    /// that model that machinery query [`Scheduler::blocks_matching`] here
    /// and skip blocks for which [`Scheduler::is_active`] is false.
    /// Returns how many blocks were executed.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError`] if a callback fails.
    fn run_callback_stage(
        &mut self,
        _stage: CycleStage,
        _scheduler: &mut Scheduler,
    ) -> Result<usize, ScriptError> {
        Ok(0)
    }
}

/// An interpreter that accepts every block and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpInterpreter;

impl Interpreter for NoOpInterpreter {
    fn execute(
        &mut self,
        _request: &ExecutionRequest,
        _scheduler: &mut Scheduler,
    ) -> Result<(), ScriptError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stagehand_types::ModelType;

    use super::*;
    use crate::scheduler::SchedulerOptions;

    #[test]
    fn request_shares_block_source() {
        let mut scheduler = Scheduler::new(ModelType::Wf, SchedulerOptions::default());
        let handle = scheduler
            .register_early_event(Some(BlockId(4)), "sim.outputFull();", Some(2), None)
            .unwrap();
        let block = scheduler.block(handle).unwrap();
        let request = ExecutionRequest::for_block(handle, block, 2, CycleStage::WfEarly);

        assert_eq!(request.id, Some(BlockId(4)));
        assert_eq!(request.kind, BlockKind::EarlyEvent);
        assert!(request.source.shares_text_with(block.source()));
    }

    #[test]
    fn default_callback_stage_runs_nothing() {
        let mut scheduler = Scheduler::new(ModelType::Wf, SchedulerOptions::default());
        let ran = NoOpInterpreter
            .run_callback_stage(CycleStage::WfCalculateFitness, &mut scheduler)
            .unwrap();
        assert_eq!(ran, 0);
    }
}
