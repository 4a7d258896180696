use std::fmt;
use std::ops::Range;

use linemark_core::DiffBlock;

use crate::host::AnnotationHandle;

/// Lifecycle of one block's annotation.
///
/// Every block starts `Pending`; the other states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// Shown and awaiting a decision.
    Pending,
    /// Kept as is; the annotation was removed.
    Accepted,
    /// Reverted to the baseline text.
    Rejected,
    /// Discarded by a later recomputation.
    Superseded,
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockState::Pending => write!(f, "pending"),
            BlockState::Accepted => write!(f, "accepted"),
            BlockState::Rejected => write!(f, "rejected"),
            BlockState::Superseded => write!(f, "superseded"),
        }
    }
}

/// A block together with the annotation anchored for it.
#[derive(Debug, Clone)]
pub struct AnchoredBlock {
    block: DiffBlock,
    range: Range<usize>,
    handle: Option<AnnotationHandle>,
    state: BlockState,
}

impl AnchoredBlock {
    pub fn block(&self) -> &DiffBlock {
        &self.block
    }

    /// Offsets the annotation was anchored at.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Handle of the live annotation, `None` once the block left `Pending`.
    pub fn handle(&self) -> Option<AnnotationHandle> {
        self.handle
    }

    pub fn state(&self) -> BlockState {
        self.state
    }
}

/// The annotations one editor currently shows, keyed by block id.
///
/// Entries are kept in document order. The set is only ever replaced as a
/// whole; individual entries move out of `Pending` but are never re-armed.
#[derive(Debug, Default)]
pub struct AnnotationSet {
    entries: Vec<AnchoredBlock>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks still `Pending`.
    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// `true` when no annotation is showing.
    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    pub fn pending(&self) -> impl Iterator<Item = &AnchoredBlock> {
        self.entries.iter().filter(|e| e.state == BlockState::Pending)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnchoredBlock> {
        self.entries.iter()
    }

    pub fn get(&self, block_id: &str) -> Option<&AnchoredBlock> {
        self.entries.iter().find(|e| e.block.block_id() == block_id)
    }

    pub fn state(&self, block_id: &str) -> Option<BlockState> {
        self.get(block_id).map(|e| e.state)
    }

    pub(crate) fn insert(&mut self, block: DiffBlock, range: Range<usize>, handle: AnnotationHandle) {
        self.entries.push(AnchoredBlock {
            block,
            range,
            handle: Some(handle),
            state: BlockState::Pending,
        });
    }

    /// Move a pending block into a terminal state, returning its annotation.
    pub(crate) fn settle(&mut self, block_id: &str, state: BlockState) -> Option<AnnotationHandle> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.block.block_id() == block_id && e.state == BlockState::Pending)?;
        entry.state = state;
        entry.handle.take()
    }

    /// Empty the set, marking every pending entry superseded.
    pub(crate) fn take_all(&mut self) -> Vec<AnchoredBlock> {
        let mut taken = std::mem::take(&mut self.entries);
        for entry in &mut taken {
            if entry.state == BlockState::Pending {
                entry.state = BlockState::Superseded;
            }
        }
        taken
    }
}
