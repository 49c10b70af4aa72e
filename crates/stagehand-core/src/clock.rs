//! Simulation clock: the current tick and cycle stage.
//!
//! The clock is the single source of "now" for every temporal check in the
//! scheduler. It advances only under the driver's control.
//!
//! # Design Principles
//!
//! - Tick arithmetic is checked; the clock never moves past [`MAX_TICK`].
//! - Within a tick the stage only moves forward, and only into stages the
//!   clock's model actually visits.
//! - Advancing the tick resets the stage to [`CycleStage::PreCycle`].

use stagehand_types::{CycleStage, MAX_TICK, ModelType, Tick, tick_in_range};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Tick counter would pass the largest representable tick.
    #[error("tick counter overflow: cannot advance beyond tick {tick}")]
    TickOverflow {
        /// The tick the clock was at.
        tick: Tick,
    },

    /// A tick outside `0..=MAX_TICK` was supplied.
    #[error("tick {tick} is outside the legal range 0..={max}", max = MAX_TICK)]
    TickOutOfRange {
        /// The offending tick.
        tick: Tick,
    },

    /// The requested stage is not part of this model's cycle.
    #[error("stage {stage:?} is not visited by {model:?} models")]
    StageNotInModel {
        /// The requested stage.
        stage: CycleStage,
        /// The clock's model type.
        model: ModelType,
    },

    /// The requested stage does not come after the current one.
    #[error("cannot move from stage {current:?} back to {requested:?} within tick {tick}")]
    StageRegression {
        /// Current tick.
        tick: Tick,
        /// Current stage.
        current: CycleStage,
        /// The stage that was requested.
        requested: CycleStage,
    },
}

/// Clock tracking the current `(tick, stage)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationClock {
    /// Model whose stage sequence this clock walks.
    model: ModelType,

    /// Current tick. Tick 0 is reserved for `initialize()` callbacks.
    tick: Tick,

    /// Current stage within the tick.
    stage: CycleStage,
}

impl SimulationClock {
    /// Create a clock at tick 0, [`CycleStage::PreCycle`].
    pub const fn new(model: ModelType) -> Self {
        Self {
            model,
            tick: 0,
            stage: CycleStage::PreCycle,
        }
    }

    /// Create a clock from explicit parameters (useful for testing and
    /// state restoration).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOutOfRange`] if `tick` is not a legal tick,
    /// or [`ClockError::StageNotInModel`] if `stage` is not visited by
    /// `model`.
    pub fn from_parts(model: ModelType, tick: Tick, stage: CycleStage) -> Result<Self, ClockError> {
        if !tick_in_range(tick) {
            return Err(ClockError::TickOutOfRange { tick });
        }
        if !model.visits(stage) {
            return Err(ClockError::StageNotInModel { stage, model });
        }
        Ok(Self { model, tick, stage })
    }

    /// Return the current `(tick, stage)` pair.
    pub const fn now(&self) -> (Tick, CycleStage) {
        (self.tick, self.stage)
    }

    /// Return the current tick.
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Return the current stage.
    pub const fn stage(&self) -> CycleStage {
        self.stage
    }

    /// Return the model type.
    pub const fn model(&self) -> ModelType {
        self.model
    }

    /// Move to `stage` within the current tick.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::StageNotInModel`] for a stage of the other
    /// model, or [`ClockError::StageRegression`] if `stage` is not strictly
    /// after the current stage.
    pub fn enter_stage(&mut self, stage: CycleStage) -> Result<(), ClockError> {
        if !self.model.visits(stage) {
            return Err(ClockError::StageNotInModel {
                stage,
                model: self.model,
            });
        }
        if stage <= self.stage {
            return Err(ClockError::StageRegression {
                tick: self.tick,
                current: self.stage,
                requested: stage,
            });
        }
        self.stage = stage;
        Ok(())
    }

    /// Advance to the next tick and reset the stage. Returns the new tick.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the new tick would exceed
    /// [`MAX_TICK`].
    pub fn advance_tick(&mut self) -> Result<Tick, ClockError> {
        let next = self
            .tick
            .checked_add(1)
            .filter(|next| *next <= MAX_TICK)
            .ok_or(ClockError::TickOverflow { tick: self.tick })?;
        self.tick = next;
        self.stage = CycleStage::PreCycle;
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_at_tick_zero_pre_cycle() {
        let clock = SimulationClock::new(ModelType::Wf);
        assert_eq!(clock.now(), (0, CycleStage::PreCycle));
        assert_eq!(clock.model(), ModelType::Wf);
    }

    #[test]
    fn advance_resets_stage() {
        let mut clock = SimulationClock::new(ModelType::Wf);
        clock.enter_stage(CycleStage::WfLate).unwrap();
        assert_eq!(clock.advance_tick().unwrap(), 1);
        assert_eq!(clock.now(), (1, CycleStage::PreCycle));
    }

    #[test]
    fn stages_only_move_forward() {
        let mut clock = SimulationClock::new(ModelType::NonWf);
        clock.enter_stage(CycleStage::NonWfEarly).unwrap();
        let back = clock.enter_stage(CycleStage::NonWfGenerateOffspring);
        assert!(matches!(back, Err(ClockError::StageRegression { .. })));
        let same = clock.enter_stage(CycleStage::NonWfEarly);
        assert!(same.is_err());
        clock.enter_stage(CycleStage::NonWfLate).unwrap();
        assert_eq!(clock.stage(), CycleStage::NonWfLate);
    }

    #[test]
    fn foreign_model_stage_rejected() {
        let mut clock = SimulationClock::new(ModelType::Wf);
        let result = clock.enter_stage(CycleStage::NonWfLate);
        assert!(matches!(result, Err(ClockError::StageNotInModel { .. })));
        assert_eq!(clock.stage(), CycleStage::PreCycle);
    }

    #[test]
    fn cannot_advance_past_max_tick() {
        let mut clock =
            SimulationClock::from_parts(ModelType::Wf, MAX_TICK, CycleStage::PostCycle).unwrap();
        let result = clock.advance_tick();
        assert!(matches!(result, Err(ClockError::TickOverflow { .. })));
        assert_eq!(clock.tick(), MAX_TICK);
    }

    #[test]
    fn from_parts_validates() {
        assert!(SimulationClock::from_parts(ModelType::Wf, -1, CycleStage::PreCycle).is_err());
        assert!(
            SimulationClock::from_parts(ModelType::Wf, 5, CycleStage::NonWfFirst).is_err()
        );
        let clock =
            SimulationClock::from_parts(ModelType::NonWf, 5, CycleStage::NonWfFirst).unwrap();
        assert_eq!(clock.now(), (5, CycleStage::NonWfFirst));
    }
}
