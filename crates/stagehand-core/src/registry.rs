//! The block registry: sole owner of every [`ScriptBlock`].
//!
//! Blocks are keyed by a monotonically increasing [`BlockHandle`], so
//! iterating the map yields registration order, which is the tie-break
//! order for dispatch.

use std::collections::BTreeMap;

use stagehand_types::{BlockHandle, BlockId, LifecycleState};

use crate::block::ScriptBlock;
use crate::error::SchedulingError;

/// Insertion-ordered collection of blocks with id and function-name
/// indexes.
#[derive(Debug, Default, Clone)]
pub struct BlockRegistry {
    blocks: BTreeMap<BlockHandle, ScriptBlock>,
    by_id: BTreeMap<BlockId, BlockHandle>,
    functions: BTreeMap<String, BlockHandle>,
    next_handle: u64,
}

impl BlockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a block and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::DuplicateId`] if the block's id is already
    /// registered, or [`SchedulingError::DuplicateFunction`] if a function
    /// of the same name exists.
    pub fn add(&mut self, block: ScriptBlock) -> Result<BlockHandle, SchedulingError> {
        self.check_available(&block)?;

        let handle = BlockHandle(self.next_handle);
        self.next_handle = self
            .next_handle
            .checked_add(1)
            .ok_or_else(|| SchedulingError::Internal {
                reason: "block handle space exhausted".to_owned(),
            })?;

        if let Some(id) = block.id() {
            self.by_id.insert(id, handle);
        }
        if let Some(name) = block.function_name() {
            self.functions.insert(name.to_owned(), handle);
        }
        self.blocks.insert(handle, block);
        Ok(handle)
    }

    /// Verify that `block` would not collide with an existing id or
    /// function name.
    ///
    /// # Errors
    ///
    /// Same as [`add`](Self::add).
    pub fn check_available(&self, block: &ScriptBlock) -> Result<(), SchedulingError> {
        if let Some(id) = block.id().filter(|id| self.by_id.contains_key(id)) {
            return Err(SchedulingError::DuplicateId { id });
        }
        if let Some(name) = block
            .function_name()
            .filter(|name| self.functions.contains_key(*name))
        {
            return Err(SchedulingError::DuplicateFunction {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Whether `id` is held by a block still in the registry.
    pub fn id_in_use(&self, id: BlockId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Look up a block.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::UnknownHandle`] for a handle whose block
    /// has been flushed.
    pub fn get(&self, handle: BlockHandle) -> Result<&ScriptBlock, SchedulingError> {
        self.blocks
            .get(&handle)
            .ok_or(SchedulingError::UnknownHandle { handle })
    }

    pub(crate) fn get_mut(
        &mut self,
        handle: BlockHandle,
    ) -> Result<&mut ScriptBlock, SchedulingError> {
        self.blocks
            .get_mut(&handle)
            .ok_or(SchedulingError::UnknownHandle { handle })
    }

    /// Every block, in registration order.
    pub fn all(&self) -> impl Iterator<Item = (BlockHandle, &ScriptBlock)> {
        self.blocks.iter().map(|(handle, block)| (*handle, block))
    }

    pub(crate) fn all_mut(&mut self) -> impl Iterator<Item = &mut ScriptBlock> {
        self.blocks.values_mut()
    }

    /// Handle of the block carrying `id`.
    pub fn handle_for_id(&self, id: BlockId) -> Option<BlockHandle> {
        self.by_id.get(&id).copied()
    }

    /// Handle of the user-defined function called `name`.
    pub fn handle_for_function(&self, name: &str) -> Option<BlockHandle> {
        self.functions.get(name).copied()
    }

    /// Drop a block from the registry, returning it in the `Removed` state.
    ///
    /// Only the pending-removal flush calls this.
    pub(crate) fn mark_removed(
        &mut self,
        handle: BlockHandle,
    ) -> Result<ScriptBlock, SchedulingError> {
        let mut block = self
            .blocks
            .remove(&handle)
            .ok_or(SchedulingError::UnknownHandle { handle })?;
        if let Some(id) = block.id() {
            self.by_id.remove(&id);
        }
        if let Some(name) = block.function_name() {
            self.functions.remove(name);
        }
        block.set_state(LifecycleState::Removed);
        Ok(block)
    }

    /// Number of blocks currently held.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the registry holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
