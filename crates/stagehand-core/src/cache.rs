//! Per-kind dispatch indexes derived from the registry.
//!
//! The cache is invalidate-and-rebuild: any registry change marks it dirty
//! and the next query rebuilds every bucket from scratch. Blocks still in
//! the registry are indexed whether `Active` or `PendingRemoval`, since a
//! deregistered block keeps matching until its queue is flushed.
//!
//! `fitnessEffect()` blocks that run in a single tick live in a tick-keyed
//! map so that dispatch for that kind touches only the blocks of the
//! requested tick. Wider fitness-effect blocks stay in the flat bucket.

use std::collections::BTreeMap;

use stagehand_types::{BlockHandle, BlockKind, OPEN_END, Tick};
use tracing::debug;

use crate::block::ScriptBlock;
use crate::registry::BlockRegistry;

/// Tick returned by [`DispatchCache::last_bounded_tick`] when no bounded
/// block exists.
const DEFAULT_LAST_TICK: Tick = 1;

/// External classification of fitness-effect blocks that are known to run
/// in only one tick.
///
/// The cache only keys a block by tick when the classifier accepts it
/// **and** its range is a single tick; a classifier can narrow the one-tick
/// bucket but never put a multi-tick block into it.
pub trait SingleTickClassifier: core::fmt::Debug {
    /// Whether `block` should be indexed in the one-tick bucket.
    fn runs_single_tick(&self, block: &ScriptBlock) -> bool;
}

/// Default classifier: every block whose range is one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleTickRange;

impl SingleTickClassifier for SingleTickRange {
    fn runs_single_tick(&self, block: &ScriptBlock) -> bool {
        block.start() == block.end()
    }
}

/// Lazily rebuilt per-kind buckets plus derived tick bounds.
#[derive(Debug)]
pub struct DispatchCache {
    valid: bool,
    buckets: BTreeMap<BlockKind, Vec<BlockHandle>>,
    single_tick_fitness: BTreeMap<Tick, Vec<BlockHandle>>,
    last_bounded_tick: Tick,
    first_event_tick: Option<Tick>,
    rebuilds: u64,
    classifier: Box<dyn SingleTickClassifier>,
}

impl Default for DispatchCache {
    fn default() -> Self {
        Self::new(Box::new(SingleTickRange))
    }
}

impl DispatchCache {
    /// Create an empty, dirty cache using `classifier` for the one-tick
    /// fitness bucket.
    pub fn new(classifier: Box<dyn SingleTickClassifier>) -> Self {
        Self {
            valid: false,
            buckets: BTreeMap::new(),
            single_tick_fitness: BTreeMap::new(),
            last_bounded_tick: DEFAULT_LAST_TICK,
            first_event_tick: None,
            rebuilds: 0,
            classifier,
        }
    }

    /// Mark the cache dirty.
    pub const fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Whether the cache reflects the registry.
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Number of full rebuilds performed so far.
    pub const fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    /// Rebuild from `registry` if dirty.
    pub fn ensure_built(&mut self, registry: &BlockRegistry) {
        if !self.valid {
            self.rebuild(registry);
        }
    }

    fn rebuild(&mut self, registry: &BlockRegistry) {
        self.buckets.clear();
        self.single_tick_fitness.clear();
        self.last_bounded_tick = DEFAULT_LAST_TICK;
        self.first_event_tick = None;

        for (handle, block) in registry.all() {
            let kind = block.kind();

            // Bounds consider every block; a script can end the run from
            // inside a callback as well as an event.
            if block.end() != OPEN_END && block.end() > self.last_bounded_tick {
                self.last_bounded_tick = block.end();
            }
            if matches!(
                kind,
                BlockKind::FirstEvent | BlockKind::EarlyEvent | BlockKind::LateEvent
            ) && block.start() > 0
            {
                let start = block.start();
                self.first_event_tick = Some(self.first_event_tick.map_or(start, |t| t.min(start)));
            }

            if !kind.is_dispatchable() {
                continue;
            }
            if kind == BlockKind::FitnessEffectCallback
                && block.start() == block.end()
                && self.classifier.runs_single_tick(block)
            {
                self.single_tick_fitness
                    .entry(block.start())
                    .or_default()
                    .push(handle);
            } else {
                self.buckets.entry(kind).or_default().push(handle);
            }
        }

        self.valid = true;
        self.rebuilds = self.rebuilds.saturating_add(1);
        debug!(
            blocks = registry.len(),
            single_tick_fitness = self.single_tick_fitness.len(),
            last_bounded_tick = self.last_bounded_tick,
            "dispatch cache rebuilt"
        );
    }

    /// Candidate handles for `kind` at `tick`, in registration order.
    ///
    /// Candidates still need the range and filter checks; only the
    /// one-tick fitness bucket is pre-filtered by tick.
    pub fn candidates(&self, kind: BlockKind, tick: Tick) -> Candidates<'_> {
        let flat = self.buckets.get(&kind).map_or(&[][..], Vec::as_slice);
        let single_tick = if kind == BlockKind::FitnessEffectCallback {
            self.single_tick_fitness
                .get(&tick)
                .map_or(&[][..], Vec::as_slice)
        } else {
            &[]
        };
        Candidates { flat, single_tick }
    }

    /// Last tick at which a block with an explicit end is scheduled; `1`
    /// when there is none.
    pub const fn last_bounded_tick(&self) -> Tick {
        self.last_bounded_tick
    }

    /// Earliest positive start tick among event blocks.
    pub const fn first_event_tick(&self) -> Option<Tick> {
        self.first_event_tick
    }
}

/// Borrowed view over a kind's flat bucket and, for fitness-effect
/// queries, the bucket of the requested tick.
///
/// Both buckets are in handle order, so the iterator merges them without
/// allocating.
#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    flat: &'a [BlockHandle],
    single_tick: &'a [BlockHandle],
}

impl<'a> Iterator for Candidates<'a> {
    type Item = BlockHandle;

    fn next(&mut self) -> Option<BlockHandle> {
        let take_flat = match (self.flat.first(), self.single_tick.first()) {
            (Some(flat), Some(single)) => flat < single,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        let side: &mut &'a [BlockHandle] = if take_flat {
            &mut self.flat
        } else {
            &mut self.single_tick
        };
        let current: &'a [BlockHandle] = *side;
        let (&head, rest) = current.split_first()?;
        *side = rest;
        Some(head)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.flat.len().saturating_add(self.single_tick.len());
        (len, Some(len))
    }
}

impl ExactSizeIterator for Candidates<'_> {}
