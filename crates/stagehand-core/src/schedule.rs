//! Reschedule modes and tick-run merging.
//!
//! [`tick_runs`] turns an arbitrary tick set into the minimal list of
//! contiguous `[start, end]` runs; the scheduler applies the first run to
//! the original block and clones the block for every later run.

use serde::{Deserialize, Serialize};
use stagehand_types::{DEFAULT_START, OPEN_END, Tick, tick_in_range};

use crate::error::SchedulingError;

/// One contiguous run of ticks, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRun {
    /// First tick of the run.
    pub start: Tick,
    /// Last tick of the run.
    pub end: Tick,
}

/// How to reschedule a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescheduleMode {
    /// Replace the block's range in place.
    Range {
        /// New start tick.
        start: Tick,
        /// New end tick; [`OPEN_END`] for open-ended.
        end: Tick,
    },
    /// Run exactly at these ticks, splitting into one block per run.
    Ticks(Vec<Tick>),
}

impl RescheduleMode {
    /// Build a mode from the optional arguments a script passes.
    ///
    /// A range with one side missing uses the registration default for that
    /// side.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidParameterCombination`] when both a
    /// range and a tick set are given, or neither is.
    pub fn from_parts(
        start: Option<Tick>,
        end: Option<Tick>,
        ticks: Option<Vec<Tick>>,
    ) -> Result<Self, SchedulingError> {
        let has_range = start.is_some() || end.is_some();
        match (has_range, ticks) {
            (true, None) => Ok(Self::Range {
                start: start.unwrap_or(DEFAULT_START),
                end: end.unwrap_or(OPEN_END),
            }),
            (false, Some(ticks)) => Ok(Self::Ticks(ticks)),
            (true, Some(_)) => Err(SchedulingError::InvalidParameterCombination {
                reason: "supply either start/end or a tick set, not both",
            }),
            (false, None) => Err(SchedulingError::InvalidParameterCombination {
                reason: "supply either start/end or a tick set",
            }),
        }
    }
}

/// Check an explicit start tick.
pub(crate) fn check_start(tick: Tick) -> Result<(), SchedulingError> {
    if tick_in_range(tick) {
        Ok(())
    } else {
        Err(SchedulingError::TickOutOfRange { tick })
    }
}

/// Check an explicit end tick; [`OPEN_END`] is allowed.
pub(crate) fn check_end(tick: Tick) -> Result<(), SchedulingError> {
    if tick == OPEN_END {
        Ok(())
    } else {
        check_start(tick)
    }
}

/// Validate a range: both ends legal and `start <= end`.
pub(crate) fn check_range(start: Tick, end: Tick) -> Result<(), SchedulingError> {
    check_start(start)?;
    check_end(end)?;
    if start > end {
        return Err(SchedulingError::RangeOrder { start, end });
    }
    Ok(())
}

/// Merge a tick set into ascending contiguous runs.
///
/// # Errors
///
/// Returns [`SchedulingError::EmptyTickSet`] for an empty set,
/// [`SchedulingError::DuplicateTick`] if any tick repeats, and
/// [`SchedulingError::TickOutOfRange`] if any tick is outside
/// `0..=MAX_TICK`, checked in that order.
pub fn tick_runs(ticks: &[Tick]) -> Result<Vec<TickRun>, SchedulingError> {
    if ticks.is_empty() {
        return Err(SchedulingError::EmptyTickSet);
    }

    let mut sorted = ticks.to_vec();
    sorted.sort_unstable();

    let mut runs: Vec<TickRun> = Vec::new();
    for tick in sorted {
        match runs.last_mut() {
            Some(run) if run.end == tick => return Err(SchedulingError::DuplicateTick { tick }),
            Some(run) if run.end.checked_add(1) == Some(tick) => run.end = tick,
            _ => runs.push(TickRun {
                start: tick,
                end: tick,
            }),
        }
    }

    // Sorted, so checking the outermost ticks covers every tick.
    if let Some(first) = runs.first() {
        check_start(first.start)?;
    }
    if let Some(last) = runs.last() {
        check_start(last.end)?;
    }
    Ok(runs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stagehand_types::MAX_TICK;

    use super::*;

    fn run(start: Tick, end: Tick) -> TickRun {
        TickRun { start, end }
    }

    #[test]
    fn gap_splits_runs() {
        let runs = tick_runs(&[3, 4, 5, 7, 8]).unwrap();
        assert_eq!(runs, vec![run(3, 5), run(7, 8)]);
    }

    #[test]
    fn contiguous_set_is_one_run() {
        let runs = tick_runs(&[3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(runs, vec![run(3, 8)]);
    }

    #[test]
    fn input_order_does_not_matter() {
        let runs = tick_runs(&[10, 2, 1, 12, 11, 5]).unwrap();
        assert_eq!(runs, vec![run(1, 2), run(5, 5), run(10, 12)]);
    }

    #[test]
    fn duplicates_rejected() {
        let result = tick_runs(&[3, 3, 4]);
        assert!(matches!(
            result,
            Err(SchedulingError::DuplicateTick { tick: 3 })
        ));
    }

    #[test]
    fn empty_rejected() {
        assert!(matches!(tick_runs(&[]), Err(SchedulingError::EmptyTickSet)));
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(matches!(
            tick_runs(&[-1, 4]),
            Err(SchedulingError::TickOutOfRange { tick: -1 })
        ));
        assert!(matches!(
            tick_runs(&[4, MAX_TICK + 1]),
            Err(SchedulingError::TickOutOfRange { .. })
        ));
    }

    #[test]
    fn from_parts_requires_exactly_one_form() {
        assert!(matches!(
            RescheduleMode::from_parts(None, None, None),
            Err(SchedulingError::InvalidParameterCombination { .. })
        ));
        assert!(matches!(
            RescheduleMode::from_parts(Some(1), None, Some(vec![2])),
            Err(SchedulingError::InvalidParameterCombination { .. })
        ));
        assert_eq!(
            RescheduleMode::from_parts(None, Some(9), None).unwrap(),
            RescheduleMode::Range {
                start: DEFAULT_START,
                end: 9
            }
        );
        assert_eq!(
            RescheduleMode::from_parts(Some(4), None, None).unwrap(),
            RescheduleMode::Range {
                start: 4,
                end: OPEN_END
            }
        );
    }

    #[test]
    fn range_checks() {
        assert!(check_range(1, OPEN_END).is_ok());
        assert!(matches!(
            check_range(5, 2),
            Err(SchedulingError::RangeOrder { start: 5, end: 2 })
        ));
        assert!(matches!(
            check_range(OPEN_END, OPEN_END),
            Err(SchedulingError::TickOutOfRange { .. })
        ));
    }
}
