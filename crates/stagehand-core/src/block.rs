//! Script blocks and the request type used to create them.
//!
//! A [`ScriptBlock`] is owned by the registry. Everything outside the
//! registry refers to it through a [`BlockHandle`].
//!
//! [`BlockHandle`]: stagehand_types::BlockHandle

use std::sync::Arc;

use stagehand_types::{
    BlockHandle, BlockId, BlockKind, BlockScope, BlockSummary, ChromosomeId, DEFAULT_START,
    InteractionTypeId, LifecycleState, MutationTypeId, OPEN_END, Sex, SpeciesId, SubpopId, Tick,
};

use crate::error::SchedulingError;

/// Opaque script text attached to a block.
///
/// Cloning is cheap; clones made by a tick-set reschedule share the text
/// with the block they were cloned from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScriptSource(Arc<str>);

impl ScriptSource {
    /// Wrap script text.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self(text.into())
    }

    /// Borrow the script text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether two sources share the same allocation.
    pub fn shares_text_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<&str> for ScriptSource {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for ScriptSource {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl core::fmt::Display for ScriptSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One registered unit of script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    id: Option<BlockId>,
    kind: BlockKind,
    start: Tick,
    end: Tick,
    scope: BlockScope,
    source: ScriptSource,
    state: LifecycleState,
    active: bool,
    function_name: Option<String>,
}

impl ScriptBlock {
    /// Build an `Active` block. Callers have already validated the range.
    pub(crate) const fn new(
        kind: BlockKind,
        id: Option<BlockId>,
        start: Tick,
        end: Tick,
        scope: BlockScope,
        source: ScriptSource,
    ) -> Self {
        Self {
            id,
            kind,
            start,
            end,
            scope,
            source,
            state: LifecycleState::Active,
            active: true,
            function_name: None,
        }
    }

    /// Build a user-defined function block. Functions have no tick range of
    /// their own; they carry the open range so they never constrain the
    /// last scheduled tick.
    pub(crate) const fn function(name: String, source: ScriptSource) -> Self {
        Self {
            id: None,
            kind: BlockKind::UserDefinedFunction,
            start: 0,
            end: OPEN_END,
            scope: BlockScope {
                species: None,
                mutation_type: None,
                interaction_type: None,
                subpop: None,
                sex: None,
                chromosome: None,
            },
            source,
            state: LifecycleState::Active,
            active: true,
            function_name: Some(name),
        }
    }

    /// An anonymous copy of this block covering `[start, end]`.
    pub(crate) fn clone_for_range(&self, start: Tick, end: Tick) -> Self {
        Self {
            id: None,
            kind: self.kind,
            start,
            end,
            scope: self.scope,
            source: self.source.clone(),
            state: LifecycleState::Active,
            active: true,
            function_name: None,
        }
    }

    /// Replace the tick range. Only `Active` blocks may be rescheduled.
    pub(crate) fn set_range(
        &mut self,
        handle: BlockHandle,
        start: Tick,
        end: Tick,
    ) -> Result<(), SchedulingError> {
        if self.state != LifecycleState::Active {
            return Err(SchedulingError::AlreadyPending { handle });
        }
        if start > end {
            return Err(SchedulingError::RangeOrder { start, end });
        }
        self.start = start;
        self.end = end;
        Ok(())
    }

    pub(crate) const fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    pub(crate) const fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// User-visible id, `None` for anonymous blocks.
    pub const fn id(&self) -> Option<BlockId> {
        self.id
    }

    /// Block kind; fixed at construction.
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// First tick of the inclusive range.
    pub const fn start(&self) -> Tick {
        self.start
    }

    /// Last tick of the inclusive range.
    pub const fn end(&self) -> Tick {
        self.end
    }

    /// Whether the block has no explicit end tick.
    pub const fn is_open_ended(&self) -> bool {
        self.end == OPEN_END
    }

    /// Whether `tick` lies within `[start, end]`.
    pub const fn covers(&self, tick: Tick) -> bool {
        self.start <= tick && tick <= self.end
    }

    /// Scope filters.
    pub const fn scope(&self) -> &BlockScope {
        &self.scope
    }

    /// Owning species, if any.
    pub const fn species(&self) -> Option<SpeciesId> {
        self.scope.species
    }

    /// Script text.
    pub const fn source(&self) -> &ScriptSource {
        &self.source
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the block runs when dispatched this tick. Scripts switch it
    /// off; the driver switches every block back on at the start of a tick.
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Function name, for user-defined functions.
    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    /// Serializable snapshot of this block.
    pub fn summary(&self, handle: BlockHandle) -> BlockSummary {
        BlockSummary {
            handle,
            id: self.id,
            kind: self.kind,
            start: self.start,
            end: self.end,
            state: self.state,
            active: self.active,
            scope: self.scope,
            function_name: self.function_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Everything needed to register or declare a block.
///
/// Built with chained setters:
///
/// ```
/// use stagehand_core::block::BlockRequest;
/// use stagehand_types::{BlockKind, BlockId, SubpopId};
///
/// let request = BlockRequest::new(BlockKind::LateEvent, "sim.outputFull();")
///     .id(BlockId(3))
///     .start(10)
///     .end(20);
/// assert_eq!(request.range(), (10, 20));
///
/// let callback = BlockRequest::new(BlockKind::FitnessEffectCallback, "return 1.0;")
///     .subpop(SubpopId(1));
/// assert_eq!(callback.scope().subpop, Some(SubpopId(1)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    kind: BlockKind,
    source: ScriptSource,
    id: Option<BlockId>,
    start: Option<Tick>,
    end: Option<Tick>,
    scope: BlockScope,
}

impl BlockRequest {
    /// Start a request for a block of `kind` running `source`.
    pub fn new(kind: BlockKind, source: impl Into<ScriptSource>) -> Self {
        Self {
            kind,
            source: source.into(),
            id: None,
            start: None,
            end: None,
            scope: BlockScope::default(),
        }
    }

    /// Give the block a user-visible id.
    #[must_use]
    pub const fn id(mut self, id: BlockId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the optional id directly.
    #[must_use]
    pub const fn maybe_id(mut self, id: Option<BlockId>) -> Self {
        self.id = id;
        self
    }

    /// First tick (defaults to 1).
    #[must_use]
    pub const fn start(mut self, tick: Tick) -> Self {
        self.start = Some(tick);
        self
    }

    /// Last tick (defaults to open-ended).
    #[must_use]
    pub const fn end(mut self, tick: Tick) -> Self {
        self.end = Some(tick);
        self
    }

    /// Restrict to one species.
    #[must_use]
    pub const fn species(mut self, species: SpeciesId) -> Self {
        self.scope.species = Some(species);
        self
    }

    /// Set the species scope directly; `None` clears it.
    #[must_use]
    pub const fn species_scope(mut self, species: Option<SpeciesId>) -> Self {
        self.scope.species = species;
        self
    }

    /// Restrict to one mutation type.
    #[must_use]
    pub const fn mutation_type(mut self, id: MutationTypeId) -> Self {
        self.scope.mutation_type = Some(id);
        self
    }

    /// Restrict to one interaction type.
    #[must_use]
    pub const fn interaction_type(mut self, id: InteractionTypeId) -> Self {
        self.scope.interaction_type = Some(id);
        self
    }

    /// Restrict to one subpopulation.
    #[must_use]
    pub const fn subpop(mut self, id: SubpopId) -> Self {
        self.scope.subpop = Some(id);
        self
    }

    /// Restrict to one sex.
    #[must_use]
    pub const fn sex(mut self, sex: Sex) -> Self {
        self.scope.sex = Some(sex);
        self
    }

    /// Restrict to one chromosome.
    #[must_use]
    pub const fn chromosome(mut self, id: ChromosomeId) -> Self {
        self.scope.chromosome = Some(id);
        self
    }

    /// Replace every scope filter at once.
    #[must_use]
    pub const fn scope_filters(mut self, scope: BlockScope) -> Self {
        self.scope = scope;
        self
    }

    /// Requested kind.
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Requested id.
    pub const fn requested_id(&self) -> Option<BlockId> {
        self.id
    }

    /// The range with registration defaults applied.
    pub fn range(&self) -> (Tick, Tick) {
        (
            self.start.unwrap_or(DEFAULT_START),
            self.end.unwrap_or(OPEN_END),
        )
    }

    /// Ticks that were supplied explicitly, for range checking.
    pub(crate) fn explicit_ticks(&self) -> impl Iterator<Item = Tick> {
        self.start.into_iter().chain(self.end)
    }

    /// Requested scope filters.
    pub const fn scope(&self) -> &BlockScope {
        &self.scope
    }

    pub(crate) fn into_block(self) -> ScriptBlock {
        let (start, end) = self.range();
        ScriptBlock::new(self.kind, self.id, start, end, self.scope, self.source)
    }
}
