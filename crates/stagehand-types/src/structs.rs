//! Serializable views of registered blocks.
//!
//! The scheduler owns its blocks; these are the plain-data shapes handed to
//! tooling (log output, inspection front ends) and used as the declaration
//! format in configuration files.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{BlockKind, LifecycleState, Sex};
use crate::ids::{
    BlockHandle, BlockId, ChromosomeId, InteractionTypeId, MutationTypeId, SpeciesId, SubpopId,
    Tick,
};

/// Optional scope filters that narrow which contexts a callback answers.
///
/// A `None` field matches every value. Which fields are legal depends on
/// the block kind; the scheduler rejects illegal combinations at
/// registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BlockScope {
    /// Owning species, for species-scoped kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<SpeciesId>,
    /// Mutation type (`mutationEffect()`, `mutation()`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutation_type: Option<MutationTypeId>,
    /// Interaction type (`interaction()`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction_type: Option<InteractionTypeId>,
    /// Subpopulation the callback is restricted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subpop: Option<SubpopId>,
    /// Sex restriction (`reproduction()` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    /// Chromosome restriction (`recombination()`, `mutation()`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chromosome: Option<ChromosomeId>,
}

impl BlockScope {
    /// Whether no filter of any kind is set.
    pub const fn is_unscoped(&self) -> bool {
        self.species.is_none()
            && self.mutation_type.is_none()
            && self.interaction_type.is_none()
            && self.subpop.is_none()
            && self.sex.is_none()
            && self.chromosome.is_none()
    }
}

/// A snapshot of one registered block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BlockSummary {
    /// Registry handle; orders summaries by registration.
    pub handle: BlockHandle,
    /// User-visible id, absent for anonymous blocks.
    pub id: Option<BlockId>,
    /// Block kind.
    pub kind: BlockKind,
    /// First tick of the active range.
    pub start: Tick,
    /// Last tick of the active range; `OPEN_END` when open-ended.
    pub end: Tick,
    /// Lifecycle state at the time of the snapshot.
    pub state: LifecycleState,
    /// Whether the block runs when dispatched in the current tick.
    pub active: bool,
    /// Scope filters.
    pub scope: BlockScope,
    /// Function name, for user-defined functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scope_is_unscoped() {
        assert!(BlockScope::default().is_unscoped());
        let scoped = BlockScope {
            subpop: Some(SubpopId(1)),
            ..BlockScope::default()
        };
        assert!(!scoped.is_unscoped());
    }

    #[test]
    fn scope_omits_unset_filters() {
        let scope = BlockScope {
            mutation_type: Some(MutationTypeId(2)),
            ..BlockScope::default()
        };
        let json = serde_json::to_string(&scope).ok();
        assert_eq!(json.as_deref(), Some(r#"{"mutation_type":2}"#));
    }

    #[test]
    fn summary_serializes_kind_and_state() {
        let summary = BlockSummary {
            handle: BlockHandle(1),
            id: Some(BlockId(5)),
            kind: BlockKind::LateEvent,
            start: 10,
            end: 20,
            state: LifecycleState::PendingRemoval,
            active: false,
            scope: BlockScope::default(),
            function_name: None,
        };
        let value = serde_json::to_value(&summary).ok();
        let kind = value.as_ref().and_then(|v| v.get("kind")).and_then(|k| k.as_str());
        let state = value.as_ref().and_then(|v| v.get("state")).and_then(|k| k.as_str());
        assert_eq!(kind, Some("late_event"));
        assert_eq!(state, Some("pending_removal"));
        let active = value.as_ref().and_then(|v| v.get("active")).and_then(|a| a.as_bool());
        assert_eq!(active, Some(false));
    }
}
