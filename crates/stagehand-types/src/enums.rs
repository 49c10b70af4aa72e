//! Enumeration types for the Stagehand scheduler.
//!
//! Block kinds, cycle stages, model types and the block lifecycle. The
//! stage tables here are the single place that decides which stage a kind
//! of block runs in, which is what the temporal-consistency guard compares
//! against the clock.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Block kinds
// ---------------------------------------------------------------------------

/// The closed set of script block kinds.
///
/// Events run unconditionally inside their stage; callbacks are looked up
/// by the population machinery when a triggering context (a mutation type,
/// an interaction type, a subpopulation) arises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// `first()` event, runs at the start of each cycle.
    FirstEvent,
    /// `early()` event.
    EarlyEvent,
    /// `late()` event.
    LateEvent,
    /// `initialize()` callback, runs once before the first cycle.
    InitializeCallback,
    /// `mutationEffect()` callback, scoped to a mutation type.
    MutationEffectCallback,
    /// `fitnessEffect()` callback, applied per individual.
    FitnessEffectCallback,
    /// `interaction()` callback, scoped to an interaction type.
    InteractionCallback,
    /// `mateChoice()` callback.
    MateChoiceCallback,
    /// `modifyChild()` callback.
    ModifyChildCallback,
    /// `recombination()` callback.
    RecombinationCallback,
    /// `mutation()` callback.
    MutationCallback,
    /// `survival()` callback.
    SurvivalCallback,
    /// `reproduction()` callback.
    ReproductionCallback,
    /// A user-defined function; invoked by name, never dispatched.
    UserDefinedFunction,
}

/// Coarse grouping of kinds used by the randomize-order switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum KindCategory {
    /// `first()`, `early()` and `late()` events.
    Event,
    /// Every callback kind, including `initialize()`.
    Callback,
    /// User-defined functions.
    Function,
}

impl BlockKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::FirstEvent,
        Self::EarlyEvent,
        Self::LateEvent,
        Self::InitializeCallback,
        Self::MutationEffectCallback,
        Self::FitnessEffectCallback,
        Self::InteractionCallback,
        Self::MateChoiceCallback,
        Self::ModifyChildCallback,
        Self::RecombinationCallback,
        Self::MutationCallback,
        Self::SurvivalCallback,
        Self::ReproductionCallback,
        Self::UserDefinedFunction,
    ];

    /// Return the randomize-order category this kind belongs to.
    pub const fn category(self) -> KindCategory {
        match self {
            Self::FirstEvent | Self::EarlyEvent | Self::LateEvent => KindCategory::Event,
            Self::UserDefinedFunction => KindCategory::Function,
            Self::InitializeCallback
            | Self::MutationEffectCallback
            | Self::FitnessEffectCallback
            | Self::InteractionCallback
            | Self::MateChoiceCallback
            | Self::ModifyChildCallback
            | Self::RecombinationCallback
            | Self::MutationCallback
            | Self::SurvivalCallback
            | Self::ReproductionCallback => KindCategory::Callback,
        }
    }

    /// Whether blocks of this kind are ever returned by dispatch.
    pub const fn is_dispatchable(self) -> bool {
        !matches!(self, Self::UserDefinedFunction)
    }

    /// Whether blocks of this kind belong to one species rather than to the
    /// whole community.
    pub const fn is_species_scoped(self) -> bool {
        matches!(
            self,
            Self::MutationEffectCallback
                | Self::FitnessEffectCallback
                | Self::MateChoiceCallback
                | Self::ModifyChildCallback
                | Self::RecombinationCallback
                | Self::MutationCallback
                | Self::SurvivalCallback
                | Self::ReproductionCallback
        )
    }

    /// Script-facing name of the kind, as written in a declaration.
    pub const fn script_name(self) -> &'static str {
        match self {
            Self::FirstEvent => "first",
            Self::EarlyEvent => "early",
            Self::LateEvent => "late",
            Self::InitializeCallback => "initialize",
            Self::MutationEffectCallback => "mutationEffect",
            Self::FitnessEffectCallback => "fitnessEffect",
            Self::InteractionCallback => "interaction",
            Self::MateChoiceCallback => "mateChoice",
            Self::ModifyChildCallback => "modifyChild",
            Self::RecombinationCallback => "recombination",
            Self::MutationCallback => "mutation",
            Self::SurvivalCallback => "survival",
            Self::ReproductionCallback => "reproduction",
            Self::UserDefinedFunction => "function",
        }
    }
}

impl core::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}()", self.script_name())
    }
}

// ---------------------------------------------------------------------------
// Model types and cycle stages
// ---------------------------------------------------------------------------

/// The two cycle shapes a model can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Wright-Fisher: non-overlapping generations, mate choice in offspring
    /// generation, no survival stage.
    #[serde(alias = "WF")]
    Wf,
    /// Non-Wright-Fisher: overlapping generations with explicit
    /// reproduction and survival stages.
    #[serde(rename = "nonwf", alias = "nonWF")]
    NonWf,
}

/// One step of the per-tick cycle.
///
/// Variants are declared in execution order, so the derived ordering is the
/// temporal ordering within a tick. A model only ever visits [`PreCycle`],
/// its own eight stages and [`PostCycle`], so comparisons never mix the two
/// model families.
///
/// [`PreCycle`]: CycleStage::PreCycle
/// [`PostCycle`]: CycleStage::PostCycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    /// Before the first stage of a tick; `initialize()` callbacks run here.
    PreCycle,
    /// WF stage 0: `first()` events.
    WfFirst,
    /// WF stage 1: `early()` events.
    WfEarly,
    /// WF stage 2: offspring generation.
    WfGenerateOffspring,
    /// WF stage 3: removal of fixed mutations.
    WfRemoveFixedMutations,
    /// WF stage 4: child generation becomes the parent generation.
    WfSwapGenerations,
    /// WF stage 5: `late()` events.
    WfLate,
    /// WF stage 6: fitness recalculation.
    WfCalculateFitness,
    /// WF stage 7: end of tick; interaction data is invalidated.
    WfAdvanceTick,
    /// Non-WF stage 0: `first()` events.
    NonWfFirst,
    /// Non-WF stage 1: offspring generation.
    NonWfGenerateOffspring,
    /// Non-WF stage 2: `early()` events.
    NonWfEarly,
    /// Non-WF stage 3: fitness recalculation.
    NonWfCalculateFitness,
    /// Non-WF stage 4: viability selection.
    NonWfSurvivalSelection,
    /// Non-WF stage 5: offspring merge into their subpopulations.
    NonWfMergeOffspring,
    /// Non-WF stage 6: `late()` events.
    NonWfLate,
    /// Non-WF stage 7: end of tick; interaction data is invalidated.
    NonWfAdvanceTick,
    /// After the last stage of a tick.
    PostCycle,
}

const WF_STAGES: [CycleStage; 8] = [
    CycleStage::WfFirst,
    CycleStage::WfEarly,
    CycleStage::WfGenerateOffspring,
    CycleStage::WfRemoveFixedMutations,
    CycleStage::WfSwapGenerations,
    CycleStage::WfLate,
    CycleStage::WfCalculateFitness,
    CycleStage::WfAdvanceTick,
];

const NONWF_STAGES: [CycleStage; 8] = [
    CycleStage::NonWfFirst,
    CycleStage::NonWfGenerateOffspring,
    CycleStage::NonWfEarly,
    CycleStage::NonWfCalculateFitness,
    CycleStage::NonWfSurvivalSelection,
    CycleStage::NonWfMergeOffspring,
    CycleStage::NonWfLate,
    CycleStage::NonWfAdvanceTick,
];

impl ModelType {
    /// The ordered stages of one tick for this model.
    pub const fn stages(self) -> &'static [CycleStage] {
        match self {
            Self::Wf => &WF_STAGES,
            Self::NonWf => &NONWF_STAGES,
        }
    }

    /// Whether `stage` can be visited by a clock running this model.
    pub fn visits(self, stage: CycleStage) -> bool {
        matches!(stage, CycleStage::PreCycle | CycleStage::PostCycle)
            || self.stages().contains(&stage)
    }

    /// Whether blocks of `kind` may be registered in this model.
    pub const fn supports(self, kind: BlockKind) -> bool {
        !matches!(
            (self, kind),
            (Self::NonWf, BlockKind::MateChoiceCallback)
                | (Self::Wf, BlockKind::SurvivalCallback | BlockKind::ReproductionCallback)
        )
    }

    /// The stage in which blocks of `kind` execute.
    ///
    /// Returns `None` for [`BlockKind::UserDefinedFunction`], which has no
    /// stage of its own.
    pub const fn stage_for(self, kind: BlockKind) -> Option<CycleStage> {
        let stage = match (self, kind) {
            (_, BlockKind::UserDefinedFunction) => return None,
            (_, BlockKind::InitializeCallback) => CycleStage::PreCycle,

            (Self::Wf, BlockKind::FirstEvent) => CycleStage::WfFirst,
            (Self::Wf, BlockKind::EarlyEvent) => CycleStage::WfEarly,
            (Self::Wf, BlockKind::LateEvent) => CycleStage::WfLate,
            (
                Self::Wf,
                BlockKind::MutationEffectCallback | BlockKind::FitnessEffectCallback,
            ) => CycleStage::WfCalculateFitness,
            (Self::Wf, BlockKind::InteractionCallback) => CycleStage::WfAdvanceTick,
            (
                Self::Wf,
                BlockKind::MateChoiceCallback
                | BlockKind::ModifyChildCallback
                | BlockKind::RecombinationCallback
                | BlockKind::MutationCallback
                | BlockKind::ReproductionCallback,
            ) => CycleStage::WfGenerateOffspring,
            (Self::Wf, BlockKind::SurvivalCallback) => CycleStage::WfSwapGenerations,

            (Self::NonWf, BlockKind::FirstEvent) => CycleStage::NonWfFirst,
            (Self::NonWf, BlockKind::EarlyEvent) => CycleStage::NonWfEarly,
            (Self::NonWf, BlockKind::LateEvent) => CycleStage::NonWfLate,
            (
                Self::NonWf,
                BlockKind::MutationEffectCallback | BlockKind::FitnessEffectCallback,
            ) => CycleStage::NonWfCalculateFitness,
            (Self::NonWf, BlockKind::InteractionCallback) => CycleStage::NonWfAdvanceTick,
            (
                Self::NonWf,
                BlockKind::MateChoiceCallback
                | BlockKind::ModifyChildCallback
                | BlockKind::RecombinationCallback
                | BlockKind::MutationCallback
                | BlockKind::ReproductionCallback,
            ) => CycleStage::NonWfGenerateOffspring,
            (Self::NonWf, BlockKind::SurvivalCallback) => CycleStage::NonWfSurvivalSelection,
        };
        Some(stage)
    }
}

impl CycleStage {
    /// The event kind whose blocks the driver executes directly in this
    /// stage, if any.
    pub const fn event_kind(self) -> Option<BlockKind> {
        match self {
            Self::WfFirst | Self::NonWfFirst => Some(BlockKind::FirstEvent),
            Self::WfEarly | Self::NonWfEarly => Some(BlockKind::EarlyEvent),
            Self::WfLate | Self::NonWfLate => Some(BlockKind::LateEvent),
            _ => None,
        }
    }

    /// Whether this stage is the end-of-tick point at which interaction
    /// data is invalidated.
    pub const fn invalidates_interactions(self) -> bool {
        matches!(self, Self::WfAdvanceTick | Self::NonWfAdvanceTick)
    }
}

// ---------------------------------------------------------------------------
// Block lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle of a registered block: `Active -> PendingRemoval -> Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Registered and eligible for dispatch.
    Active,
    /// Deregistered or consumed, waiting for its queue to be flushed.
    /// Still visible to dispatch until then.
    PendingRemoval,
    /// Dropped from the registry. Terminal.
    Removed,
}

/// Sex restriction for `reproduction()` callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum Sex {
    /// Males only.
    #[serde(rename = "M")]
    Male,
    /// Females only.
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    /// Parse the script-facing `"M"` / `"F"` spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "M" => Some(Self::Male),
            "F" => Some(Self::Female),
            _ => None,
        }
    }
}
