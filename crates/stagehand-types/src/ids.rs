//! Type-safe identifier wrappers and tick constants.
//!
//! Every object a script block can be scoped to has a strongly-typed ID so
//! that a subpopulation id can never be passed where a mutation-type id is
//! expected. Object ids are small signed integers chosen by the model
//! author; [`BlockHandle`] is different: it is allocated by the registry,
//! grows monotonically, and is never reused within one scheduler.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A point on the global discrete simulation clock.
pub type Tick = i64;

/// The largest tick a block may name explicitly.
pub const MAX_TICK: Tick = 1_000_000_000;

/// Sentinel end tick meaning "open-ended": one past [`MAX_TICK`].
pub const OPEN_END: Tick = 1_000_000_001;

/// Default start tick for blocks registered without an explicit start.
pub const DEFAULT_START: Tick = 1;

/// Return whether `tick` is a legal explicit tick (`0..=MAX_TICK`).
pub fn tick_in_range(tick: Tick) -> bool {
    (0..=MAX_TICK).contains(&tick)
}

/// Generates a newtype wrapper around an `i64` object id with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub i64);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// User-visible identifier of a script block (`s1`, `s2`, ...).
    BlockId, "s"
}

define_id! {
    /// Identifier of a species (one sub-simulation sharing the clock).
    SpeciesId, "species"
}

define_id! {
    /// Identifier of a mutation type (`m1`, `m2`, ...).
    MutationTypeId, "m"
}

define_id! {
    /// Identifier of an interaction type (`i1`, `i2`, ...).
    InteractionTypeId, "i"
}

define_id! {
    /// Identifier of a subpopulation (`p1`, `p2`, ...).
    SubpopId, "p"
}

define_id! {
    /// Identifier of a chromosome.
    ChromosomeId, "chr"
}

/// Stable handle to a block owned by the registry.
///
/// Handles are allocated in registration order, so comparing two handles
/// compares their registration order. A handle stays valid until the block
/// it names is flushed out of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BlockHandle(pub u64);

impl BlockHandle {
    /// Return the inner integer value.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
