//! Error types for scheduling and script execution.
//!
//! Every mutating scheduler operation either applies fully or returns one
//! of these errors with no state changed.

use stagehand_types::{BlockHandle, BlockId, BlockKind, CycleStage, MAX_TICK, Tick};

use crate::clock::ClockError;

/// Errors raised by registration, deregistration, reschedule and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    /// The target tick is before the current tick.
    #[error("block scheduled for past tick {target} (current tick {current}) would not run")]
    PastTick {
        /// Requested tick.
        target: Tick,
        /// Current tick.
        current: Tick,
    },

    /// The target tick is the current tick but its stage has already run.
    #[error(
        "block scheduled for tick {tick} at {target:?}, but the clock is already at {current:?}; it would not run"
    )]
    PastStage {
        /// The current tick.
        tick: Tick,
        /// Stage the block would run in.
        target: CycleStage,
        /// Stage currently executing.
        current: CycleStage,
    },

    /// The target is the stage that is executing right now.
    #[error("block scheduled for the currently executing stage {stage:?} of tick {tick} would not run")]
    SelfSchedule {
        /// The current tick.
        tick: Tick,
        /// The current stage.
        stage: CycleStage,
    },

    /// A static declaration arrived after the initialization pass began.
    #[error(
        "static declarations are closed at tick {tick} {stage:?}; register the block instead"
    )]
    DeclarationsClosed {
        /// The current tick.
        tick: Tick,
        /// The current stage.
        stage: CycleStage,
    },

    /// A block with this id is already registered.
    #[error("script block id {id} is already in use")]
    DuplicateId {
        /// The conflicting id.
        id: BlockId,
    },

    /// A user-defined function with this name already exists.
    #[error("function {name}() is already defined")]
    DuplicateFunction {
        /// The conflicting name.
        name: String,
    },

    /// `start > end`.
    #[error("start tick {start} is after end tick {end}")]
    RangeOrder {
        /// Requested start.
        start: Tick,
        /// Requested end.
        end: Tick,
    },

    /// An explicit tick outside `0..=MAX_TICK`.
    #[error("tick {tick} is outside the legal range 0..={max}", max = MAX_TICK)]
    TickOutOfRange {
        /// The offending tick.
        tick: Tick,
    },

    /// A tick-set reschedule named the same tick twice.
    #[error("tick {tick} appears more than once; each tick may be used only once")]
    DuplicateTick {
        /// The repeated tick.
        tick: Tick,
    },

    /// A tick-set reschedule with no ticks.
    #[error("reschedule requires at least one tick; deregister the block to remove it")]
    EmptyTickSet,

    /// Both or neither of a range and a tick set were supplied.
    #[error("invalid parameter combination: {reason}")]
    InvalidParameterCombination {
        /// What was wrong with the combination.
        reason: &'static str,
    },

    /// The block is already queued for removal.
    #[error("block {handle} is already scheduled for deregistration")]
    AlreadyPending {
        /// The block's handle.
        handle: BlockHandle,
    },

    /// The operation or scope filter is not valid for this kind of block.
    #[error("unsupported operation on {kind} block: {reason}")]
    UnsupportedOperation {
        /// Kind of the block involved.
        kind: BlockKind,
        /// What was rejected.
        reason: String,
    },

    /// The handle does not name a block in the registry.
    #[error("unknown block handle {handle}")]
    UnknownHandle {
        /// The stale handle.
        handle: BlockHandle,
    },

    /// The clock refused a transition.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// An internal invariant was broken.
    #[error("internal scheduler error: {reason}")]
    Internal {
        /// Description of the broken invariant.
        reason: String,
    },
}

impl SchedulingError {
    /// Shorthand for [`SchedulingError::UnsupportedOperation`].
    pub(crate) fn unsupported(kind: BlockKind, reason: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            kind,
            reason: reason.into(),
        }
    }
}

/// Errors raised by an interpreter while executing a block.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// The script itself failed.
    #[error("script block {handle} failed at tick {tick}: {message}")]
    Execution {
        /// Block that was executing.
        handle: BlockHandle,
        /// Tick of the failure.
        tick: Tick,
        /// Interpreter-provided description.
        message: String,
    },

    /// A scheduler call made from inside the script failed.
    #[error("scheduler call from script failed: {source}")]
    Scheduling {
        /// The underlying scheduling error.
        #[from]
        source: SchedulingError,
    },
}
