//! An interpreter that logs the blocks it is handed instead of running them.
//!
//! For callback stages it queries every callback kind that fires in the
//! stage, with no context filters, and logs the eligible blocks that are
//! switched on. That is enough to watch a model's schedule unfold without a
//! script runtime.

use stagehand_core::dispatch::DispatchQuery;
use stagehand_core::error::ScriptError;
use stagehand_core::interpreter::{ExecutionRequest, Interpreter};
use stagehand_core::scheduler::Scheduler;
use stagehand_types::{BlockKind, CycleStage, KindCategory};
use tracing::{debug, info};

/// Logs each block at `info` and each eligible callback at `debug`.
#[derive(Debug, Default)]
pub struct EchoInterpreter {
    executed: u64,
}

impl EchoInterpreter {
    /// Create a new echo interpreter.
    pub const fn new() -> Self {
        Self { executed: 0 }
    }

    /// Blocks executed so far, callbacks included.
    pub const fn executed(&self) -> u64 {
        self.executed
    }
}

impl Interpreter for EchoInterpreter {
    fn execute(
        &mut self,
        request: &ExecutionRequest,
        _scheduler: &mut Scheduler,
    ) -> Result<(), ScriptError> {
        self.executed = self.executed.saturating_add(1);
        info!(
            handle = %request.handle,
            kind = %request.kind,
            id = request.id.map(|id| id.to_string()),
            tick = request.tick,
            stage = ?request.stage,
            source = request.source.as_str(),
            "script block"
        );
        Ok(())
    }

    fn run_callback_stage(
        &mut self,
        stage: CycleStage,
        scheduler: &mut Scheduler,
    ) -> Result<usize, ScriptError> {
        let model = scheduler.model();
        let tick = scheduler.clock().tick();
        let mut eligible: usize = 0;

        for kind in BlockKind::ALL {
            if kind.category() != KindCategory::Callback
                || model.stage_for(kind) != Some(stage)
            {
                continue;
            }
            for handle in scheduler.blocks_matching(&DispatchQuery::new(tick, kind))? {
                if !scheduler.is_active(handle) {
                    continue;
                }
                debug!(%handle, %kind, tick, ?stage, "callback eligible");
                eligible = eligible.saturating_add(1);
            }
        }

        self.executed = self.executed.saturating_add(u64::try_from(eligible).unwrap_or(u64::MAX));
        Ok(eligible)
    }
}
