//! Pending-removal queues.
//!
//! Deregistered blocks wait here, still in the registry and still visible
//! to dispatch, until the driver flushes their queue at a safe point.
//! `interaction()` callbacks have their own queue, flushed only when
//! interaction data is invalidated at the end of the tick.

use stagehand_types::{BlockHandle, BlockKind};

/// Which pending queue a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalQueue {
    /// Flushed at the end of every cycle stage.
    Ordinary,
    /// Flushed at interaction-data invalidation.
    Interaction,
}

impl RemovalQueue {
    /// The queue a block of `kind` is routed to.
    pub const fn for_kind(kind: BlockKind) -> Self {
        match kind {
            BlockKind::InteractionCallback => Self::Interaction,
            _ => Self::Ordinary,
        }
    }
}

/// The two queues of blocks awaiting removal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PendingRemovalQueues {
    ordinary: Vec<BlockHandle>,
    interaction: Vec<BlockHandle>,
}

impl PendingRemovalQueues {
    /// Create empty queues.
    pub const fn new() -> Self {
        Self {
            ordinary: Vec::new(),
            interaction: Vec::new(),
        }
    }

    /// Queue `handle` on `queue`.
    pub fn push(&mut self, queue: RemovalQueue, handle: BlockHandle) {
        self.queue_mut(queue).push(handle);
    }

    /// Whether `handle` is waiting in either queue.
    pub fn contains(&self, handle: BlockHandle) -> bool {
        self.ordinary.contains(&handle) || self.interaction.contains(&handle)
    }

    /// Drain `queue`, returning its handles in the order they were queued.
    pub fn take(&mut self, queue: RemovalQueue) -> Vec<BlockHandle> {
        std::mem::take(self.queue_mut(queue))
    }

    /// Number of handles waiting in `queue`.
    pub fn len(&self, queue: RemovalQueue) -> usize {
        match queue {
            RemovalQueue::Ordinary => self.ordinary.len(),
            RemovalQueue::Interaction => self.interaction.len(),
        }
    }

    /// Whether both queues are empty.
    pub fn is_empty(&self) -> bool {
        self.ordinary.is_empty() && self.interaction.is_empty()
    }

    fn queue_mut(&mut self, queue: RemovalQueue) -> &mut Vec<BlockHandle> {
        match queue {
            RemovalQueue::Ordinary => &mut self.ordinary,
            RemovalQueue::Interaction => &mut self.interaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_callbacks_use_their_own_queue() {
        assert_eq!(
            RemovalQueue::for_kind(BlockKind::InteractionCallback),
            RemovalQueue::Interaction
        );
        assert_eq!(
            RemovalQueue::for_kind(BlockKind::FitnessEffectCallback),
            RemovalQueue::Ordinary
        );
        assert_eq!(
            RemovalQueue::for_kind(BlockKind::LateEvent),
            RemovalQueue::Ordinary
        );
    }

    #[test]
    fn take_drains_only_one_queue() {
        let mut queues = PendingRemovalQueues::new();
        queues.push(RemovalQueue::Ordinary, BlockHandle(1));
        queues.push(RemovalQueue::Interaction, BlockHandle(2));
        queues.push(RemovalQueue::Ordinary, BlockHandle(3));
        assert!(queues.contains(BlockHandle(2)));

        let drained = queues.take(RemovalQueue::Ordinary);
        assert_eq!(drained, vec![BlockHandle(1), BlockHandle(3)]);
        assert_eq!(queues.len(RemovalQueue::Ordinary), 0);
        assert_eq!(queues.len(RemovalQueue::Interaction), 1);
        assert!(!queues.contains(BlockHandle(1)));
        assert!(!queues.is_empty());
    }
}
