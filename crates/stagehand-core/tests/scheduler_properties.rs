//! Integration tests for scheduler behaviour through the public API.
//!
//! Each test drives a [`Scheduler`] the way a script runtime would:
//! registering, deregistering and rescheduling blocks from inside a running
//! cycle, then checking what dispatch returns.

#![allow(clippy::unwrap_used)]

use stagehand_core::block::BlockRequest;
use stagehand_core::config::StagehandConfig;
use stagehand_core::cycle;
use stagehand_core::dispatch::DispatchQuery;
use stagehand_core::error::{SchedulingError, ScriptError};
use stagehand_core::interpreter::{ExecutionRequest, Interpreter, NoOpInterpreter};
use stagehand_core::runner::{self, EndReason, NoOpCallback};
use stagehand_core::schedule::{RescheduleMode, TickRun, tick_runs};
use stagehand_core::scheduler::{Scheduler, SchedulerOptions};
use stagehand_types::{
    BlockHandle, BlockId, BlockKind, CycleStage, LifecycleState, ModelType, SubpopId, Tick,
};

fn wf() -> Scheduler {
    Scheduler::new(ModelType::Wf, SchedulerOptions::default())
}

fn handles_at(scheduler: &mut Scheduler, tick: Tick, kind: BlockKind) -> Vec<BlockHandle> {
    scheduler
        .blocks_matching(&DispatchQuery::new(tick, kind))
        .unwrap()
}

/// Runs a closure for every executed block, recording what ran.
struct Scripted<F> {
    ran: Vec<(Tick, BlockHandle)>,
    on_execute: F,
}

impl<F> Scripted<F>
where
    F: FnMut(&ExecutionRequest, &mut Scheduler) -> Result<(), ScriptError>,
{
    const fn new(on_execute: F) -> Self {
        Self {
            ran: Vec::new(),
            on_execute,
        }
    }
}

impl<F> Interpreter for Scripted<F>
where
    F: FnMut(&ExecutionRequest, &mut Scheduler) -> Result<(), ScriptError>,
{
    fn execute(
        &mut self,
        request: &ExecutionRequest,
        scheduler: &mut Scheduler,
    ) -> Result<(), ScriptError> {
        self.ran.push((request.tick, request.handle));
        (self.on_execute)(request, scheduler)
    }
}

// ---------------------------------------------------------------------------
// Range containment
// ---------------------------------------------------------------------------

#[test]
fn dispatch_returns_exactly_the_covering_blocks() {
    let mut scheduler = wf();
    let ranges = [(1, 3), (2, 2), (4, 10), (5, 5), (1, 1), (7, 12)];
    let handles: Vec<BlockHandle> = ranges
        .iter()
        .map(|&(start, end)| {
            scheduler
                .register_early_event(None, "x", Some(start), Some(end))
                .unwrap()
        })
        .collect();

    for tick in 0..=13 {
        let expected: Vec<BlockHandle> = ranges
            .iter()
            .zip(&handles)
            .filter(|((start, end), _)| *start <= tick && tick <= *end)
            .map(|(_, handle)| *handle)
            .collect();
        assert_eq!(handles_at(&mut scheduler, tick, BlockKind::EarlyEvent), expected);
    }
}

#[test]
fn single_tick_fitness_callbacks_only_match_their_tick() {
    let mut scheduler = wf();
    let mut species = scheduler.for_species(None);
    let wide = species
        .register_fitness_effect_callback(None, "wide", None, Some(1), Some(20))
        .unwrap();
    let at_five = species
        .register_fitness_effect_callback(None, "five", Some(SubpopId(1)), Some(5), Some(5))
        .unwrap();
    let late_wide = species
        .register_fitness_effect_callback(None, "late", None, Some(3), None)
        .unwrap();

    let kind = BlockKind::FitnessEffectCallback;
    assert_eq!(handles_at(&mut scheduler, 4, kind), vec![wide, late_wide]);
    assert_eq!(handles_at(&mut scheduler, 5, kind), vec![wide, at_five, late_wide]);

    let other_subpop = DispatchQuery::new(5, kind).subpop(SubpopId(2));
    assert_eq!(
        scheduler.blocks_matching(&other_subpop).unwrap(),
        vec![wide, late_wide]
    );
}

// ---------------------------------------------------------------------------
// No past scheduling
// ---------------------------------------------------------------------------

#[test]
fn nothing_lands_in_the_past() {
    let mut scheduler = wf();
    let event = scheduler
        .register_late_event(Some(BlockId(1)), "x", Some(5), Some(30))
        .unwrap();
    for _ in 0..5 {
        scheduler.advance_tick().unwrap();
    }
    scheduler.enter_stage(CycleStage::WfLate).unwrap();
    let before = scheduler.summaries();

    assert!(matches!(
        scheduler.register_early_event(None, "x", Some(5), None),
        Err(SchedulingError::PastStage { .. })
    ));
    assert!(matches!(
        scheduler.register_late_event(None, "x", Some(5), None),
        Err(SchedulingError::SelfSchedule { .. })
    ));
    assert!(matches!(
        scheduler.register_first_event(None, "x", Some(2), Some(9)),
        Err(SchedulingError::PastTick { .. })
    ));
    assert!(matches!(
        scheduler.reschedule(event, RescheduleMode::Ticks(vec![4, 6])),
        Err(SchedulingError::PastTick { .. })
    ));
    assert!(matches!(
        scheduler.reschedule(event, RescheduleMode::Range { start: 5, end: 8 }),
        Err(SchedulingError::SelfSchedule { .. })
    ));
    assert_eq!(scheduler.summaries(), before);

    // Later stages of this tick are still reachable.
    let fitness = scheduler
        .for_species(None)
        .register_fitness_effect_callback(None, "x", None, Some(5), Some(5))
        .unwrap();
    assert_eq!(
        handles_at(&mut scheduler, 5, BlockKind::FitnessEffectCallback),
        vec![fitness]
    );
}

// ---------------------------------------------------------------------------
// Deferred removal
// ---------------------------------------------------------------------------

#[test]
fn deregistered_block_still_runs_in_the_current_stage() {
    let mut scheduler = wf();
    let first = scheduler.register_early_event(None, "a", None, None).unwrap();
    let second = scheduler.register_early_event(None, "b", None, None).unwrap();

    let on_execute = move |request: &ExecutionRequest,
                           scheduler: &mut Scheduler|
          -> Result<(), ScriptError> {
        if request.handle == first && request.tick == 1 {
            scheduler.deregister(&[second])?;
            assert_eq!(
                scheduler.block(second)?.state(),
                LifecycleState::PendingRemoval
            );
        }
        Ok(())
    };
    let mut interpreter = Scripted::new(on_execute);

    cycle::run_initialize(&mut scheduler, &mut interpreter).unwrap();
    cycle::run_cycle(&mut scheduler, &mut interpreter).unwrap();
    cycle::run_cycle(&mut scheduler, &mut interpreter).unwrap();

    assert_eq!(interpreter.ran, vec![(1, first), (1, second), (2, first)]);
    assert!(matches!(
        scheduler.block(second),
        Err(SchedulingError::UnknownHandle { .. })
    ));
}

#[test]
fn block_registered_mid_tick_runs_in_a_later_stage() {
    let mut scheduler = wf();
    let early = scheduler
        .register_early_event(None, "spawn", Some(1), Some(1))
        .unwrap();
    let mut spawned: Option<BlockHandle> = None;

    let on_execute = |request: &ExecutionRequest,
                      scheduler: &mut Scheduler|
     -> Result<(), ScriptError> {
        if request.handle == early {
            spawned = Some(scheduler.register_late_event(None, "spawned", Some(1), Some(1))?);
        }
        Ok(())
    };
    let mut interpreter = Scripted::new(on_execute);
    cycle::run_initialize(&mut scheduler, &mut interpreter).unwrap();
    let summary = cycle::run_cycle(&mut scheduler, &mut interpreter).unwrap();

    assert_eq!(summary.executed(), 2);
    let ran = interpreter.ran.clone();
    drop(interpreter);
    let spawned = spawned.unwrap();
    assert_eq!(ran, vec![(1, early), (1, spawned)]);
}

#[test]
fn running_scripts_cannot_use_static_declaration() {
    let mut scheduler = wf();
    let late = scheduler
        .declare(BlockRequest::new(BlockKind::LateEvent, "check").start(5).end(5))
        .unwrap();
    let mut checked = false;

    let on_execute = |request: &ExecutionRequest,
                      scheduler: &mut Scheduler|
     -> Result<(), ScriptError> {
        if request.handle != late {
            return Ok(());
        }
        let past = BlockRequest::new(BlockKind::EarlyEvent, "past").start(1).end(2);
        assert!(matches!(
            scheduler.declare(past),
            Err(SchedulingError::DeclarationsClosed { tick: 5, .. })
        ));
        let now = BlockRequest::new(BlockKind::LateEvent, "now").start(5).end(5);
        assert!(matches!(
            scheduler.declare(now),
            Err(SchedulingError::DeclarationsClosed { .. })
        ));
        assert!(matches!(
            scheduler.declare_all(&StagehandConfig::default()),
            Err(SchedulingError::DeclarationsClosed { .. })
        ));
        assert_eq!(
            scheduler.blocks_matching(&DispatchQuery::new(5, BlockKind::LateEvent))?,
            vec![late]
        );
        assert!(matches!(
            scheduler.register_late_event(None, "now", Some(5), Some(5)),
            Err(SchedulingError::SelfSchedule { .. })
        ));
        checked = true;
        Ok(())
    };
    let mut interpreter = Scripted::new(on_execute);
    cycle::run_initialize(&mut scheduler, &mut interpreter).unwrap();
    for _ in 0..5 {
        cycle::run_cycle(&mut scheduler, &mut interpreter).unwrap();
    }
    drop(interpreter);

    assert!(checked);
    assert_eq!(scheduler.block_count(), 1);
}

#[test]
fn switched_off_block_runs_again_next_tick() {
    let mut scheduler = wf();
    let first = scheduler
        .register_first_event(None, "first", Some(1), Some(2))
        .unwrap();
    let early = scheduler
        .register_early_event(None, "early", Some(1), Some(2))
        .unwrap();
    let late = scheduler
        .register_late_event(None, "late", Some(1), Some(2))
        .unwrap();

    let on_execute = move |request: &ExecutionRequest,
                           scheduler: &mut Scheduler|
          -> Result<(), ScriptError> {
        if request.tick != 1 {
            return Ok(());
        }
        if request.handle == first {
            scheduler.set_active(first, false)?;
            scheduler.set_active(early, false)?;
        }
        if request.handle == late {
            assert!(!scheduler.is_active(first));
            let summary = scheduler
                .summaries()
                .into_iter()
                .find(|summary| summary.handle == first)
                .unwrap();
            assert!(!summary.active);
            assert_eq!(summary.state, LifecycleState::Active);
        }
        Ok(())
    };
    let mut interpreter = Scripted::new(on_execute);
    cycle::run_initialize(&mut scheduler, &mut interpreter).unwrap();
    let tick_one = cycle::run_cycle(&mut scheduler, &mut interpreter).unwrap();
    let tick_two = cycle::run_cycle(&mut scheduler, &mut interpreter).unwrap();

    assert_eq!((tick_one.executed(), tick_two.executed()), (2, 3));
    assert_eq!(
        interpreter.ran,
        vec![(1, first), (1, late), (2, first), (2, early), (2, late)]
    );
    assert!(scheduler.is_active(first));
    assert!(scheduler.is_active(early));
}

// ---------------------------------------------------------------------------
// Reschedule
// ---------------------------------------------------------------------------

#[test]
fn tick_set_with_gap_becomes_two_blocks() {
    let mut scheduler = wf();
    let handle = scheduler
        .register_late_event(Some(BlockId(9)), "x", None, None)
        .unwrap();
    let affected = scheduler
        .reschedule(handle, RescheduleMode::Ticks(vec![3, 4, 5, 7, 8]))
        .unwrap();

    assert_eq!(affected.len(), 2);
    let ranges: Vec<(Tick, Tick)> = affected
        .iter()
        .map(|h| {
            let block = scheduler.block(*h).unwrap();
            (block.start(), block.end())
        })
        .collect();
    assert_eq!(ranges, vec![(3, 5), (7, 8)]);
    assert_eq!(
        scheduler.block_with_id(BlockId(9)).map(|(h, _)| h),
        Some(handle)
    );

    for tick in [3, 4, 5, 7, 8] {
        assert_eq!(handles_at(&mut scheduler, tick, BlockKind::LateEvent).len(), 1);
    }
    for tick in [1, 2, 6, 9] {
        assert!(handles_at(&mut scheduler, tick, BlockKind::LateEvent).is_empty());
    }
}

#[test]
fn contiguous_tick_set_stays_one_block() {
    let mut scheduler = wf();
    let handle = scheduler.register_late_event(None, "x", None, None).unwrap();
    let affected = scheduler
        .reschedule(handle, RescheduleMode::Ticks(vec![8, 7, 6, 5, 4, 3]))
        .unwrap();
    assert_eq!(affected, vec![handle]);
    assert_eq!(scheduler.block_count(), 1);
    assert_eq!(
        tick_runs(&[3, 4, 5, 6, 7, 8]).unwrap(),
        vec![TickRun { start: 3, end: 8 }]
    );
}

#[test]
fn duplicate_ticks_rejected_without_change() {
    let mut scheduler = wf();
    let handle = scheduler
        .register_late_event(None, "x", Some(2), Some(4))
        .unwrap();
    let before = scheduler.summaries();
    assert!(matches!(
        scheduler.reschedule(handle, RescheduleMode::Ticks(vec![3, 3, 4])),
        Err(SchedulingError::DuplicateTick { tick: 3 })
    ));
    assert!(matches!(
        scheduler.reschedule(handle, RescheduleMode::Ticks(Vec::new())),
        Err(SchedulingError::EmptyTickSet)
    ));
    assert_eq!(scheduler.summaries(), before);
}

#[test]
fn reschedule_arguments_must_pick_one_form() {
    assert!(matches!(
        RescheduleMode::from_parts(Some(3), Some(4), Some(vec![5])),
        Err(SchedulingError::InvalidParameterCombination { .. })
    ));
}

// ---------------------------------------------------------------------------
// Dispatch order
// ---------------------------------------------------------------------------

#[test]
fn repeated_queries_agree_and_reuse_the_cache() {
    let mut scheduler = wf();
    for i in 0..5 {
        scheduler
            .register_early_event(None, "x", Some(i + 1), None)
            .unwrap();
    }
    let first = handles_at(&mut scheduler, 4, BlockKind::EarlyEvent);
    let rebuilds = scheduler.cache_rebuilds();
    for _ in 0..3 {
        assert_eq!(handles_at(&mut scheduler, 4, BlockKind::EarlyEvent), first);
    }
    assert_eq!(scheduler.cache_rebuilds(), rebuilds);

    scheduler.register_late_event(None, "y", None, None).unwrap();
    assert_eq!(handles_at(&mut scheduler, 4, BlockKind::EarlyEvent), first);
    assert_eq!(scheduler.cache_rebuilds(), rebuilds + 1);
}

fn randomized(seed: u64) -> (Scheduler, Vec<BlockHandle>) {
    let options = SchedulerOptions {
        randomize_events: true,
        seed,
        ..SchedulerOptions::default()
    };
    let mut scheduler = Scheduler::new(ModelType::Wf, options);
    let handles = (0..10)
        .map(|_| scheduler.register_early_event(None, "x", None, None).unwrap())
        .collect();
    (scheduler, handles)
}

#[test]
fn randomized_order_is_a_reproducible_permutation() {
    let (mut a, registered) = randomized(7);
    let (mut b, _) = randomized(7);

    let mut any_shuffled = false;
    for tick in 1..=5 {
        let order_a = handles_at(&mut a, tick, BlockKind::EarlyEvent);
        let order_b = handles_at(&mut b, tick, BlockKind::EarlyEvent);
        assert_eq!(order_a, order_b);

        let mut sorted = order_a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, registered);
        any_shuffled |= order_a != registered;
    }
    assert!(any_shuffled);

    // Callbacks keep registration order when only events are randomized.
    let callbacks: Vec<BlockHandle> = (0..4)
        .map(|_| {
            a.for_species(None)
                .register_fitness_effect_callback(None, "x", None, None, None)
                .unwrap()
        })
        .collect();
    assert_eq!(handles_at(&mut a, 2, BlockKind::FitnessEffectCallback), callbacks);
}

// ---------------------------------------------------------------------------
// Whole runs
// ---------------------------------------------------------------------------

#[test]
fn yaml_model_runs_to_its_last_scheduled_tick() {
    let yaml = r#"
model:
  name: "declared model"
  model_type: wf
blocks:
  - kind: initialize_callback
    source: "initializeMutationRate(1e-7);"
  - kind: early_event
    id: 1
    start: 1
    end: 1
    source: "sim.addSubpop('p1', 500);"
  - kind: late_event
    id: 2
    start: 10
    end: 10
    source: "sim.outputFixedMutations();"
  - kind: fitness_effect_callback
    start: 3
    end: 6
    scope:
      subpop: 1
    source: "return 1.0;"
functions:
  - name: helper
    source: "return 2;"
"#;
    let mut config = StagehandConfig::parse(yaml).unwrap();
    config.run.max_ticks = 0;
    let mut scheduler = Scheduler::from_config(&config);
    scheduler.declare_all(&config).unwrap();
    assert_eq!(scheduler.block_count(), 5);
    assert!(scheduler.function_named("helper").is_some());

    let mut interpreter = Scripted::new(|_: &ExecutionRequest, _: &mut Scheduler| Ok(()));
    let result = runner::run_simulation(
        &mut scheduler,
        &mut interpreter,
        &config.run,
        &mut NoOpCallback,
    )
    .unwrap();

    assert_eq!(result.end_reason, EndReason::LastScheduledTickPassed);
    assert_eq!(result.total_ticks, 10);
    assert_eq!(result.first_scheduled_tick, Some(1));
    let ticks: Vec<Tick> = interpreter.ran.iter().map(|(tick, _)| *tick).collect();
    assert_eq!(ticks, vec![0, 1, 10]);
}

#[test]
fn script_can_end_the_run_early() {
    let mut scheduler = Scheduler::new(ModelType::NonWf, SchedulerOptions::default());
    scheduler
        .declare(BlockRequest::new(BlockKind::LateEvent, "x").start(1).end(1_000))
        .unwrap();
    let mut interpreter = Scripted::new(|request: &ExecutionRequest, scheduler: &mut Scheduler| {
        if request.tick == 3 {
            scheduler.declare_finished();
        }
        Ok(())
    });
    let result = runner::run_simulation(
        &mut scheduler,
        &mut interpreter,
        &StagehandConfig::default().run,
        &mut NoOpCallback,
    )
    .unwrap();
    assert_eq!(result.end_reason, EndReason::Finished);
    assert_eq!(result.total_ticks, 3);
}

#[test]
fn failing_script_stops_the_run() {
    let mut scheduler = wf();
    scheduler
        .declare(BlockRequest::new(BlockKind::EarlyEvent, "boom").start(2).end(2))
        .unwrap();
    let mut interpreter = Scripted::new(|request: &ExecutionRequest, _: &mut Scheduler| {
        Err(ScriptError::Execution {
            handle: request.handle,
            tick: request.tick,
            message: "boom".to_owned(),
        })
    });
    let result = runner::run_simulation(
        &mut scheduler,
        &mut interpreter,
        &StagehandConfig::default().run,
        &mut NoOpCallback,
    );
    assert!(result.is_err());
    assert_eq!(scheduler.now(), (2, CycleStage::WfEarly));

    let mut fresh = wf();
    assert!(cycle::run_cycle(&mut fresh, &mut NoOpInterpreter).is_err());
}
