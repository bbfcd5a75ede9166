use std::ptr::NonNull;

use crate::block::FreeBlock;

/// Unordered collection of [`FreeBlock`]s.
///
/// Unlike a general purpose allocator we don't keep block headers inside the
/// pages, so the records live in a plain vector owned by the pool:
///
/// ```text
///  FreeList
///  +---------+---------+---------+
///  | block 0 | block 1 | block 2 |  ...
///  +----|----+----|----+----|----+
///       |         |         |
///  +----v---------|---+  +--v-------------|------------+
///  | Page 0  free |   |  | Page 1  free   v  free       |
///  +--------------v---+  +------------------------------+
/// ```
///
/// Blocks are never coalesced, neither with each other nor with the bump
/// region of the current page. Fragmentation is therefore unbounded under some
/// allocation patterns; that is the price of O(1) deallocation.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    blocks: Vec<FreeBlock>,
}

impl FreeList {
    /// Creates a new empty FreeList.
    pub const fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Number of free blocks currently recorded.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Sum of the sizes of every recorded block.
    pub fn free_bytes(&self) -> usize {
        self.blocks.iter().map(|block| block.size).sum()
    }

    /// Records `size` bytes starting at `start` as free. Empty ranges are not
    /// worth remembering.
    pub fn insert(&mut self, start: NonNull<u8>, size: usize) {
        if size == 0 {
            return;
        }

        self.blocks.push(FreeBlock::new(start, size));
    }

    /// Carves `size` bytes out of the first block that can hold them.
    ///
    /// This implementation uses the first-fit algorithm: the first block found
    /// with enough room is used, even if a tighter one exists further on. A
    /// block which becomes empty is swapped with the last one and popped, so the
    /// order of the remaining blocks is not preserved.
    pub fn take_first_fit(&mut self, size: usize) -> Option<NonNull<u8>> {
        let index = self.blocks.iter().position(|block| block.size >= size)?;

        let block = &mut self.blocks[index];
        let carved = block.carve(size);

        if block.size == 0 {
            self.blocks.swap_remove(index);
        }

        Some(carved)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &FreeBlock> {
        self.blocks.iter()
    }
}
