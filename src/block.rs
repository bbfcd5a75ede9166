use std::ptr::NonNull;

/// A byte range inside some [`crate::page::Page`] that was released, or retired
/// from the bump region, and is waiting to be reused.
///
/// ```text
///                 start           start + size
///                   |                  |
///  +--------+-------+------------------+--------+
///  |  ...   | used  |    FreeBlock     |  used  |   <- one Page
///  +--------+-------+------------------+--------+
/// ```
///
/// A free block always lies entirely inside exactly one page of the pool that
/// owns it, and two live free blocks never overlap. Adjacent blocks are never
/// merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeBlock {
    /// First free byte.
    pub start: NonNull<u8>,
    /// Size of the range in bytes.
    pub size: usize,
}

impl FreeBlock {
    pub fn new(start: NonNull<u8>, size: usize) -> Self {
        Self { start, size }
    }

    /// Cuts `size` bytes off the front of the block and returns them.
    ///
    /// The caller must have checked that the block is large enough.
    pub fn carve(&mut self, size: usize) -> NonNull<u8> {
        debug_assert!(size <= self.size);

        let carved = self.start;
        // SAFETY: `size <= self.size`, so the new start is at most one past the end
        // of the range, which belongs to the same page.
        self.start = unsafe { self.start.add(size) };
        self.size -= size;

        carved
    }
}
