//! Shared type definitions for the Stagehand script-block scheduler.
//!
//! This crate holds the plain-data vocabulary used across the workspace:
//! ticks and identifiers, block kinds, the cycle stages of both model
//! types, and serializable block summaries. Types flow downstream to
//! `TypeScript` via `ts-rs` for inspection tooling.
//!
//! # Modules
//!
//! - [`ids`] -- Tick constants and type-safe identifier wrappers
//! - [`enums`] -- Block kinds, cycle stages, model types, lifecycle states
//! - [`structs`] -- Scope filters and block summaries

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{BlockKind, CycleStage, KindCategory, LifecycleState, ModelType, Sex};
pub use ids::{
    BlockHandle, BlockId, ChromosomeId, DEFAULT_START, InteractionTypeId, MAX_TICK,
    MutationTypeId, OPEN_END, SpeciesId, SubpopId, Tick, tick_in_range,
};
pub use structs::{BlockScope, BlockSummary};
