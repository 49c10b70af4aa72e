//! The scheduler façade.
//!
//! Owns the clock, the registry, the dispatch cache and the pending-removal
//! queues. Everything outside this module works through [`BlockHandle`]s.
//!
//! # Rules enforced here
//!
//! - Registration and reschedule pass the temporal guard
//!   ([`Scheduler::check_scheduling`]) before anything is mutated; a
//!   rejected call leaves every structure untouched.
//! - Deregistration only queues a block. The block stays in the registry,
//!   and keeps matching dispatch, until the driver flushes its queue.
//! - Any registry change invalidates the dispatch cache; the next query
//!   rebuilds it.
//! - Static declaration bypasses the temporal guard, so it closes as soon
//!   as the initialization pass starts.

use stagehand_types::{
    BlockHandle, BlockId, BlockKind, BlockScope, BlockSummary, CycleStage, KindCategory,
    LifecycleState, ModelType, SpeciesId, Tick,
};
use tracing::debug;

use crate::block::{BlockRequest, ScriptBlock, ScriptSource};
use crate::cache::{DispatchCache, SingleTickClassifier, SingleTickRange};
use crate::clock::{ClockError, SimulationClock};
use crate::config::StagehandConfig;
use crate::dispatch::{self, DispatchQuery};
use crate::error::SchedulingError;
use crate::pending::{PendingRemovalQueues, RemovalQueue};
use crate::schedule::{self, RescheduleMode};

/// Settings that shape validation and dispatch order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Species-scoped callbacks must name a species.
    pub explicit_species: bool,
    /// Shuffle event dispatch results.
    pub randomize_events: bool,
    /// Shuffle callback dispatch results.
    pub randomize_callbacks: bool,
    /// Seed for the shuffles.
    pub seed: u64,
}

impl SchedulerOptions {
    /// Extract the scheduler-relevant settings from a model config.
    pub const fn from_config(config: &StagehandConfig) -> Self {
        Self {
            explicit_species: config.model.explicit_species,
            randomize_events: config.dispatch.randomize_events,
            randomize_callbacks: config.dispatch.randomize_callbacks,
            seed: config.model.seed,
        }
    }

    /// Whether dispatch results for `category` are shuffled.
    pub const fn randomizes(&self, category: KindCategory) -> bool {
        match category {
            KindCategory::Event => self.randomize_events,
            KindCategory::Callback => self.randomize_callbacks,
            KindCategory::Function => false,
        }
    }
}

/// Registration, deregistration, reschedule and dispatch for one model.
#[derive(Debug)]
pub struct Scheduler {
    clock: SimulationClock,
    options: SchedulerOptions,
    registry: crate::registry::BlockRegistry,
    cache: DispatchCache,
    pending: PendingRemovalQueues,
    declarations_closed: bool,
    finished: bool,
}

impl Scheduler {
    /// Create a scheduler for `model` with the default single-tick
    /// classifier.
    pub fn new(model: ModelType, options: SchedulerOptions) -> Self {
        Self::with_classifier(model, options, Box::new(SingleTickRange))
    }

    /// Create a scheduler with a custom fitness-effect classifier.
    pub fn with_classifier(
        model: ModelType,
        options: SchedulerOptions,
        classifier: Box<dyn SingleTickClassifier>,
    ) -> Self {
        Self {
            clock: SimulationClock::new(model),
            options,
            registry: crate::registry::BlockRegistry::new(),
            cache: DispatchCache::new(classifier),
            pending: PendingRemovalQueues::new(),
            declarations_closed: false,
            finished: false,
        }
    }

    /// Create a scheduler from a model config. Declarations are not
    /// applied; see [`Scheduler::declare_all`].
    pub fn from_config(config: &StagehandConfig) -> Self {
        Self::new(
            config.model.model_type,
            SchedulerOptions::from_config(config),
        )
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// The clock.
    pub const fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Current `(tick, stage)`.
    pub const fn now(&self) -> (Tick, CycleStage) {
        self.clock.now()
    }

    /// Model type.
    pub const fn model(&self) -> ModelType {
        self.clock.model()
    }

    /// Options in effect.
    pub const fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Move the clock to `stage` within the current tick.
    ///
    /// # Errors
    ///
    /// See [`SimulationClock::enter_stage`].
    pub fn enter_stage(&mut self, stage: CycleStage) -> Result<(), ClockError> {
        self.clock.enter_stage(stage)?;
        debug!(tick = self.clock.tick(), ?stage, "entered stage");
        Ok(())
    }

    /// Advance the clock to the next tick.
    ///
    /// # Errors
    ///
    /// See [`SimulationClock::advance_tick`].
    pub fn advance_tick(&mut self) -> Result<Tick, ClockError> {
        self.clock.advance_tick()
    }

    /// The temporal-consistency guard.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::PastTick`] if `target_tick` has passed.
    /// - [`SchedulingError::PastStage`] if it is the current tick and
    ///   `target_stage` has already run.
    /// - [`SchedulingError::SelfSchedule`] if it names the stage executing
    ///   right now.
    pub fn check_scheduling(
        &self,
        target_tick: Tick,
        target_stage: CycleStage,
    ) -> Result<(), SchedulingError> {
        let (tick, stage) = self.clock.now();
        if target_tick < tick {
            return Err(SchedulingError::PastTick {
                target: target_tick,
                current: tick,
            });
        }
        if target_tick == tick {
            if target_stage < stage {
                return Err(SchedulingError::PastStage {
                    tick,
                    target: target_stage,
                    current: stage,
                });
            }
            if target_stage == stage {
                return Err(SchedulingError::SelfSchedule { tick, stage });
            }
        }
        Ok(())
    }

    fn stage_of(&self, kind: BlockKind) -> Result<CycleStage, SchedulingError> {
        self.model().stage_for(kind).ok_or_else(|| {
            SchedulingError::unsupported(kind, "user-defined functions are not scheduled")
        })
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Whether [`declare`](Self::declare) still accepts blocks: the clock is
    /// at tick 0 `PreCycle` and the initialization pass has not started.
    pub fn declarations_open(&self) -> bool {
        !self.declarations_closed && self.clock.now() == (0, CycleStage::PreCycle)
    }

    fn ensure_declarations_open(&self) -> Result<(), SchedulingError> {
        if self.declarations_open() {
            return Ok(());
        }
        let (tick, stage) = self.clock.now();
        Err(SchedulingError::DeclarationsClosed { tick, stage })
    }

    /// End the static declaration pass. Called by the driver before the
    /// `initialize()` callbacks run.
    pub(crate) fn close_declarations(&mut self) {
        if !self.declarations_closed {
            debug!(blocks = self.registry.len(), "static declarations closed");
        }
        self.declarations_closed = true;
    }

    /// Static declaration: every validation of [`register`](Self::register)
    /// except the temporal guard, accepted only before the first cycle.
    ///
    /// `initialize()` callbacks may only enter through here; they always
    /// run at tick 0.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::DeclarationsClosed`] once initialization has
    ///   begun or the clock has left tick 0.
    /// - Any validation error listed for [`register`](Self::register).
    pub fn declare(&mut self, request: BlockRequest) -> Result<BlockHandle, SchedulingError> {
        self.ensure_declarations_open()?;
        let request = if request.kind() == BlockKind::InitializeCallback {
            if request.explicit_ticks().next().is_some() {
                return Err(SchedulingError::unsupported(
                    request.kind(),
                    "initialize() callbacks cannot be given a tick range",
                ));
            }
            request.start(0).end(0)
        } else {
            request
        };
        self.validate(&request)?;
        self.insert(request.into_block())
    }

    /// Declare every block and function listed in `config`.
    ///
    /// # Errors
    ///
    /// Stops at the first declaration that fails; see
    /// [`declare`](Self::declare).
    pub fn declare_all(&mut self, config: &StagehandConfig) -> Result<(), SchedulingError> {
        self.ensure_declarations_open()?;
        for function in &config.functions {
            self.declare_function(&function.name, function.source.as_str())?;
        }
        for declaration in &config.blocks {
            self.declare(declaration.to_request())?;
        }
        Ok(())
    }

    /// Declare a user-defined function.
    ///
    /// Functions are never dispatched, so this stays available while the
    /// simulation runs.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::DuplicateFunction`] if `name` is taken.
    pub fn declare_function(
        &mut self,
        name: &str,
        source: impl Into<ScriptSource>,
    ) -> Result<BlockHandle, SchedulingError> {
        let block = ScriptBlock::function(name.to_owned(), source.into());
        self.insert(block)
    }

    /// Register a block at run time.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::UnsupportedOperation`] for a kind not available
    ///   in this model, an `initialize()` callback or function, or an illegal
    ///   scope filter.
    /// - [`SchedulingError::TickOutOfRange`] / [`SchedulingError::RangeOrder`]
    ///   for a bad range.
    /// - [`SchedulingError::DuplicateId`] if the id is taken.
    /// - The temporal guard errors of [`check_scheduling`](Self::check_scheduling).
    pub fn register(&mut self, request: BlockRequest) -> Result<BlockHandle, SchedulingError> {
        if request.kind() == BlockKind::InitializeCallback {
            return Err(SchedulingError::unsupported(
                request.kind(),
                "initialize() callbacks can only be declared",
            ));
        }
        self.validate(&request)?;
        let stage = self.stage_of(request.kind())?;
        let (start, _) = request.range();
        self.check_scheduling(start, stage)?;
        self.insert(request.into_block())
    }

    /// Register a `first()` event.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_first_event(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        self.register(ranged(BlockKind::FirstEvent, id, source, start, end))
    }

    /// Register an `early()` event.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_early_event(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        self.register(ranged(BlockKind::EarlyEvent, id, source, start, end))
    }

    /// Register a `late()` event.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_late_event(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        self.register(ranged(BlockKind::LateEvent, id, source, start, end))
    }

    /// Register an `interaction()` callback.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_interaction_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        interaction_type: stagehand_types::InteractionTypeId,
        subpop: Option<stagehand_types::SubpopId>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let request = ranged(BlockKind::InteractionCallback, id, source, start, end).scope_filters(
            BlockScope {
                interaction_type: Some(interaction_type),
                subpop,
                ..BlockScope::default()
            },
        );
        self.register(request)
    }

    /// Registrar for species-scoped callbacks.
    pub const fn for_species(&mut self, species: Option<SpeciesId>) -> SpeciesRegistrar<'_> {
        SpeciesRegistrar {
            scheduler: self,
            species,
        }
    }

    fn validate(&self, request: &BlockRequest) -> Result<(), SchedulingError> {
        let kind = request.kind();
        if kind == BlockKind::UserDefinedFunction {
            return Err(SchedulingError::unsupported(
                kind,
                "functions are declared by name",
            ));
        }
        if !self.model().supports(kind) {
            return Err(SchedulingError::unsupported(
                kind,
                format!("not available in {:?} models", self.model()),
            ));
        }
        check_scope(kind, request.scope(), self.options.explicit_species)?;

        let (start, end) = request.range();
        schedule::check_range(start, end)?;

        if let Some(id) = request.requested_id() {
            if self.registry.id_in_use(id) {
                return Err(SchedulingError::DuplicateId { id });
            }
        }
        Ok(())
    }

    fn insert(&mut self, block: ScriptBlock) -> Result<BlockHandle, SchedulingError> {
        let kind = block.kind();
        let (start, end) = (block.start(), block.end());
        let handle = self.registry.add(block)?;
        self.cache.invalidate();
        debug!(
            %handle,
            %kind,
            start,
            end,
            tick = self.clock.tick(),
            stage = ?self.clock.stage(),
            "block registered"
        );
        Ok(handle)
    }

    // -----------------------------------------------------------------------
    // Deregistration
    // -----------------------------------------------------------------------

    /// Queue blocks for removal.
    ///
    /// Every handle is checked before any is queued, so either all are
    /// queued or none are.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::UnknownHandle`] for a flushed handle.
    /// - [`SchedulingError::UnsupportedOperation`] for a function block.
    /// - [`SchedulingError::AlreadyPending`] if a block is already queued,
    ///   or appears twice in `handles`.
    pub fn deregister(&mut self, handles: &[BlockHandle]) -> Result<(), SchedulingError> {
        let mut routed: Vec<(BlockHandle, RemovalQueue)> = Vec::with_capacity(handles.len());
        for &handle in handles {
            let block = self.registry.get(handle)?;
            if block.kind() == BlockKind::UserDefinedFunction {
                return Err(SchedulingError::unsupported(
                    block.kind(),
                    "functions cannot be deregistered",
                ));
            }
            if block.state() != LifecycleState::Active
                || self.pending.contains(handle)
                || routed.iter().any(|(queued, _)| *queued == handle)
            {
                return Err(SchedulingError::AlreadyPending { handle });
            }
            routed.push((handle, RemovalQueue::for_kind(block.kind())));
        }

        for (handle, queue) in routed {
            self.registry
                .get_mut(handle)?
                .set_state(LifecycleState::PendingRemoval);
            self.pending.push(queue, handle);
            debug!(%handle, ?queue, tick = self.clock.tick(), "block queued for removal");
        }
        Ok(())
    }

    /// Whether `handle` is queued for removal.
    pub fn is_pending(&self, handle: BlockHandle) -> bool {
        self.pending.contains(handle)
    }

    /// Number of blocks waiting in `queue`.
    pub fn pending_len(&self, queue: RemovalQueue) -> usize {
        self.pending.len(queue)
    }

    /// Remove every block in the ordinary queue. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Internal`] if a queued handle is missing
    /// from the registry.
    pub fn flush_ordinary(&mut self) -> Result<usize, SchedulingError> {
        self.flush(RemovalQueue::Ordinary)
    }

    /// Remove every block in the interaction queue. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Same as [`flush_ordinary`](Self::flush_ordinary).
    pub fn flush_interaction(&mut self) -> Result<usize, SchedulingError> {
        self.flush(RemovalQueue::Interaction)
    }

    fn flush(&mut self, queue: RemovalQueue) -> Result<usize, SchedulingError> {
        let handles = self.pending.take(queue);
        if handles.is_empty() {
            return Ok(0);
        }
        for &handle in &handles {
            self.registry
                .mark_removed(handle)
                .map_err(|err| SchedulingError::Internal {
                    reason: format!("pending block vanished before flush: {err}"),
                })?;
        }
        self.cache.invalidate();
        debug!(
            ?queue,
            removed = handles.len(),
            tick = self.clock.tick(),
            "pending removals flushed"
        );
        Ok(handles.len())
    }

    // -----------------------------------------------------------------------
    // Per-tick activation
    // -----------------------------------------------------------------------

    /// Switch a block on or off for the rest of the current tick.
    ///
    /// An inactive block still matches dispatch; the driver skips it when
    /// executing. Every block is switched back on when the next tick
    /// starts. The dispatch cache is unaffected.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::UnknownHandle`] for a flushed handle.
    /// - [`SchedulingError::UnsupportedOperation`] for a function block.
    pub fn set_active(
        &mut self,
        handle: BlockHandle,
        active: bool,
    ) -> Result<(), SchedulingError> {
        let block = self.registry.get_mut(handle)?;
        if block.kind() == BlockKind::UserDefinedFunction {
            return Err(SchedulingError::unsupported(
                block.kind(),
                "functions cannot be deactivated",
            ));
        }
        block.set_active(active);
        debug!(%handle, active, tick = self.clock.tick(), "block activation changed");
        Ok(())
    }

    /// Whether `handle` names a block that is switched on this tick.
    pub fn is_active(&self, handle: BlockHandle) -> bool {
        self.registry.get(handle).is_ok_and(ScriptBlock::is_active)
    }

    /// Switch every block back on. Called by the driver at the start of
    /// each tick.
    pub(crate) fn reactivate_all(&mut self) {
        for block in self.registry.all_mut() {
            block.set_active(true);
        }
    }

    // -----------------------------------------------------------------------
    // Reschedule
    // -----------------------------------------------------------------------

    /// Move a block to a new range, or split it across a tick set.
    ///
    /// Returns the affected handles in run order; the first is always
    /// `handle` itself.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::UnknownHandle`] for a flushed handle.
    /// - [`SchedulingError::UnsupportedOperation`] for a function block.
    /// - [`SchedulingError::AlreadyPending`] for a block queued for removal.
    /// - Range errors, tick-set errors ([`SchedulingError::EmptyTickSet`],
    ///   [`SchedulingError::DuplicateTick`]) and the temporal guard errors.
    pub fn reschedule(
        &mut self,
        handle: BlockHandle,
        mode: RescheduleMode,
    ) -> Result<Vec<BlockHandle>, SchedulingError> {
        let block = self.registry.get(handle)?;
        let kind = block.kind();
        if kind == BlockKind::UserDefinedFunction {
            return Err(SchedulingError::unsupported(
                kind,
                "functions cannot be rescheduled",
            ));
        }
        if block.state() != LifecycleState::Active {
            return Err(SchedulingError::AlreadyPending { handle });
        }
        let stage = self.stage_of(kind)?;

        let runs = match mode {
            RescheduleMode::Range { start, end } => {
                schedule::check_range(start, end)?;
                vec![schedule::TickRun { start, end }]
            }
            RescheduleMode::Ticks(ticks) => schedule::tick_runs(&ticks)?,
        };
        let Some((first, rest)) = runs.split_first() else {
            return Err(SchedulingError::EmptyTickSet);
        };
        self.check_scheduling(first.start, stage)?;

        let clones: Vec<ScriptBlock> = rest
            .iter()
            .map(|run| block.clone_for_range(run.start, run.end))
            .collect();

        self.registry
            .get_mut(handle)?
            .set_range(handle, first.start, first.end)?;
        let mut affected = Vec::with_capacity(runs.len());
        affected.push(handle);
        for clone in clones {
            affected.push(self.registry.add(clone)?);
        }
        self.cache.invalidate();

        debug!(
            %handle,
            %kind,
            runs = runs.len(),
            start = first.start,
            end = runs.last().map_or(first.end, |run| run.end),
            "block rescheduled"
        );
        Ok(affected)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Handles of the blocks matching `query`.
    ///
    /// Registration order, unless randomization is enabled for the kind's
    /// category, in which case a permutation seeded by the configured seed,
    /// the tick and the kind.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::Internal`] only if the cache refers to a
    /// block the registry no longer holds.
    pub fn blocks_matching(
        &mut self,
        query: &DispatchQuery,
    ) -> Result<Vec<BlockHandle>, SchedulingError> {
        self.cache.ensure_built(&self.registry);

        let mut matched = Vec::new();
        for handle in self.cache.candidates(query.kind, query.tick) {
            let block = self
                .registry
                .get(handle)
                .map_err(|err| SchedulingError::Internal {
                    reason: format!("dispatch cache is stale: {err}"),
                })?;
            if query.matches(block) {
                matched.push(handle);
            }
        }

        if self.options.randomizes(query.kind.category()) {
            dispatch::shuffle_for_tick(&mut matched, self.options.seed, query.tick, query.kind);
        }
        Ok(matched)
    }

    /// Number of dispatch-cache rebuilds so far.
    pub const fn cache_rebuilds(&self) -> u64 {
        self.cache.rebuild_count()
    }

    /// Last tick at which a block with an explicit end is scheduled, or `1`.
    pub fn last_bounded_tick(&mut self) -> Tick {
        self.cache.ensure_built(&self.registry);
        self.cache.last_bounded_tick()
    }

    /// Earliest positive start tick among event blocks.
    pub fn first_scheduled_tick(&mut self) -> Option<Tick> {
        self.cache.ensure_built(&self.registry);
        self.cache.first_event_tick()
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Look up a block by handle.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::UnknownHandle`] for a flushed handle.
    pub fn block(&self, handle: BlockHandle) -> Result<&ScriptBlock, SchedulingError> {
        self.registry.get(handle)
    }

    /// Look up a block by user id.
    pub fn block_with_id(&self, id: BlockId) -> Option<(BlockHandle, &ScriptBlock)> {
        let handle = self.registry.handle_for_id(id)?;
        self.registry.get(handle).ok().map(|block| (handle, block))
    }

    /// Look up a user-defined function by name.
    pub fn function_named(&self, name: &str) -> Option<(BlockHandle, &ScriptBlock)> {
        let handle = self.registry.handle_for_function(name)?;
        self.registry.get(handle).ok().map(|block| (handle, block))
    }

    /// Every `Active` block, in registration order.
    pub fn active_blocks(&self) -> impl Iterator<Item = (BlockHandle, &ScriptBlock)> {
        self.registry
            .all()
            .filter(|(_, block)| block.state() == LifecycleState::Active)
    }

    /// Every `Active` block scoped to `species`.
    pub fn active_blocks_for_species(
        &self,
        species: SpeciesId,
    ) -> impl Iterator<Item = (BlockHandle, &ScriptBlock)> {
        self.active_blocks()
            .filter(move |(_, block)| block.species() == Some(species))
    }

    /// Snapshot of every block still in the registry.
    pub fn summaries(&self) -> Vec<BlockSummary> {
        self.registry
            .all()
            .map(|(handle, block)| block.summary(handle))
            .collect()
    }

    /// Number of blocks in the registry, pending ones included.
    pub fn block_count(&self) -> usize {
        self.registry.len()
    }

    /// Set the "simulation finished" flag.
    pub fn declare_finished(&mut self) {
        if !self.finished {
            debug!(tick = self.clock.tick(), "simulation declared finished");
        }
        self.finished = true;
    }

    /// Whether the "simulation finished" flag is set.
    pub const fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Registration surface for species-scoped callbacks.
///
/// Obtained from [`Scheduler::for_species`]; every callback registered
/// through it carries the registrar's species scope.
#[derive(Debug)]
pub struct SpeciesRegistrar<'a> {
    scheduler: &'a mut Scheduler,
    species: Option<SpeciesId>,
}

impl SpeciesRegistrar<'_> {
    fn register(
        &mut self,
        kind: BlockKind,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        scope: BlockScope,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let scope = BlockScope {
            species: self.species,
            ..scope
        };
        let request = ranged(kind, id, source, start, end).scope_filters(scope);
        self.scheduler.register(request)
    }

    /// Register a `mutationEffect()` callback.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::register`].
    pub fn register_mutation_effect_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        mutation_type: stagehand_types::MutationTypeId,
        subpop: Option<stagehand_types::SubpopId>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let scope = BlockScope {
            mutation_type: Some(mutation_type),
            subpop,
            ..BlockScope::default()
        };
        self.register(BlockKind::MutationEffectCallback, id, source, scope, start, end)
    }

    /// Register a `fitnessEffect()` callback.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::register`].
    pub fn register_fitness_effect_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        subpop: Option<stagehand_types::SubpopId>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let scope = BlockScope {
            subpop,
            ..BlockScope::default()
        };
        self.register(BlockKind::FitnessEffectCallback, id, source, scope, start, end)
    }

    /// Register a `mateChoice()` callback.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::register`].
    pub fn register_mate_choice_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        subpop: Option<stagehand_types::SubpopId>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let scope = BlockScope {
            subpop,
            ..BlockScope::default()
        };
        self.register(BlockKind::MateChoiceCallback, id, source, scope, start, end)
    }

    /// Register a `modifyChild()` callback.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::register`].
    pub fn register_modify_child_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        subpop: Option<stagehand_types::SubpopId>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let scope = BlockScope {
            subpop,
            ..BlockScope::default()
        };
        self.register(BlockKind::ModifyChildCallback, id, source, scope, start, end)
    }

    /// Register a `recombination()` callback.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::register`].
    pub fn register_recombination_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        subpop: Option<stagehand_types::SubpopId>,
        chromosome: Option<stagehand_types::ChromosomeId>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let scope = BlockScope {
            subpop,
            chromosome,
            ..BlockScope::default()
        };
        self.register(BlockKind::RecombinationCallback, id, source, scope, start, end)
    }

    /// Register a `mutation()` callback.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::register`].
    #[allow(clippy::too_many_arguments)]
    pub fn register_mutation_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        mutation_type: Option<stagehand_types::MutationTypeId>,
        subpop: Option<stagehand_types::SubpopId>,
        chromosome: Option<stagehand_types::ChromosomeId>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let scope = BlockScope {
            mutation_type,
            subpop,
            chromosome,
            ..BlockScope::default()
        };
        self.register(BlockKind::MutationCallback, id, source, scope, start, end)
    }

    /// Register a `survival()` callback.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::register`].
    pub fn register_survival_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        subpop: Option<stagehand_types::SubpopId>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let scope = BlockScope {
            subpop,
            ..BlockScope::default()
        };
        self.register(BlockKind::SurvivalCallback, id, source, scope, start, end)
    }

    /// Register a `reproduction()` callback. `sex` takes the script
    /// spelling, `"M"` or `"F"`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::UnsupportedOperation`] for any other sex
    /// string; otherwise see [`Scheduler::register`].
    pub fn register_reproduction_callback(
        &mut self,
        id: Option<BlockId>,
        source: impl Into<ScriptSource>,
        subpop: Option<stagehand_types::SubpopId>,
        sex: Option<&str>,
        start: Option<Tick>,
        end: Option<Tick>,
    ) -> Result<BlockHandle, SchedulingError> {
        let sex = sex
            .map(|value| {
                stagehand_types::Sex::parse(value).ok_or_else(|| {
                    SchedulingError::unsupported(
                        BlockKind::ReproductionCallback,
                        format!("sex must be \"M\" or \"F\", not {value:?}"),
                    )
                })
            })
            .transpose()?;
        let scope = BlockScope {
            subpop,
            sex,
            ..BlockScope::default()
        };
        self.register(BlockKind::ReproductionCallback, id, source, scope, start, end)
    }
}

fn ranged(
    kind: BlockKind,
    id: Option<BlockId>,
    source: impl Into<ScriptSource>,
    start: Option<Tick>,
    end: Option<Tick>,
) -> BlockRequest {
    let mut request = BlockRequest::new(kind, source).maybe_id(id);
    if let Some(start) = start {
        request = request.start(start);
    }
    if let Some(end) = end {
        request = request.end(end);
    }
    request
}

// ---------------------------------------------------------------------------
// Scope rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Forbidden,
    Optional,
    Required,
}

/// Which filters a kind accepts, in the order mutation type, interaction
/// type, subpop, sex, chromosome.
const fn scope_rules(kind: BlockKind) -> [Filter; 5] {
    use Filter::{Forbidden as No, Optional as Opt, Required as Req};
    match kind {
        BlockKind::MutationEffectCallback => [Req, No, Opt, No, No],
        BlockKind::InteractionCallback => [No, Req, Opt, No, No],
        BlockKind::FitnessEffectCallback
        | BlockKind::MateChoiceCallback
        | BlockKind::ModifyChildCallback
        | BlockKind::SurvivalCallback => [No, No, Opt, No, No],
        BlockKind::RecombinationCallback => [No, No, Opt, No, Opt],
        BlockKind::MutationCallback => [Opt, No, Opt, No, Opt],
        BlockKind::ReproductionCallback => [No, No, Opt, Opt, No],
        BlockKind::FirstEvent
        | BlockKind::EarlyEvent
        | BlockKind::LateEvent
        | BlockKind::InitializeCallback
        | BlockKind::UserDefinedFunction => [No, No, No, No, No],
    }
}

fn check_scope(
    kind: BlockKind,
    scope: &BlockScope,
    explicit_species: bool,
) -> Result<(), SchedulingError> {
    let present = [
        ("mutation type", scope.mutation_type.is_some()),
        ("interaction type", scope.interaction_type.is_some()),
        ("subpopulation", scope.subpop.is_some()),
        ("sex", scope.sex.is_some()),
        ("chromosome", scope.chromosome.is_some()),
    ];
    for ((name, is_set), rule) in present.into_iter().zip(scope_rules(kind)) {
        match (rule, is_set) {
            (Filter::Forbidden, true) => {
                return Err(SchedulingError::unsupported(
                    kind,
                    format!("a {name} filter is not valid for this kind"),
                ));
            }
            (Filter::Required, false) => {
                return Err(SchedulingError::unsupported(
                    kind,
                    format!("a {name} filter is required"),
                ));
            }
            _ => {}
        }
    }

    match (explicit_species, scope.species.is_some()) {
        (false, true) => Err(SchedulingError::unsupported(
            kind,
            "a species scope requires explicit species declarations",
        )),
        (true, false) if kind.is_species_scoped() => Err(SchedulingError::unsupported(
            kind,
            "models with explicit species require a species scope",
        )),
        _ => Ok(()),
    }
}
