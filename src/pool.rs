use std::ptr::NonNull;

use tracing::{debug, trace};

use crate::{
    error::{Error, Result},
    freelist::FreeList,
    page::Page,
    utils::round_to_units,
};

/// Snapshot of the bookkeeping of an allocator, see
/// [`crate::PageAllocator::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of pages mapped so far.
    pub pages: usize,
    /// Sum of the usable sizes of every page.
    pub reserved_bytes: usize,
    /// Number of recorded free blocks.
    pub free_blocks: usize,
    /// Sum of the sizes of every free block.
    pub free_bytes: usize,
    /// Bytes left ahead of the bump cursor in the current page.
    pub bump_available: usize,
}

/// Untyped pool of pages the typed allocator carves its storage from.
///
/// ```text
///        pages[0]                    pages[1] (current)
/// +-----------------------+   +-------------------------------------+
/// | A1 | free | A3 | tail |   | A4 | A5 |           bump            |
/// +-----------------------+   +-------------------------------------+
///        ^             ^                ^
///        |             |                |
///        +-- FreeList -+              cursor
/// ```
///
/// Requests are served from the [`FreeList`] first (first fit) and fall back to
/// bumping the cursor of the last page. When the last page is too small, its
/// tail is retired into the free list and, if the pool may grow, a new page is
/// mapped. Pages are only released when the pool is dropped.
pub(crate) struct PagePool {
    /// Mapped pages, the last one is the current one.
    pages: Vec<Page>,
    /// Released ranges waiting to be reused.
    free_list: FreeList,
    /// Offset of the next unused byte in the last page.
    cursor: usize,
    /// Page growth unit in bytes.
    unit_size: usize,
    /// Whether new pages may be mapped.
    growable: bool,
}

impl PagePool {
    /// Creates a pool that maps pages of `unit_size` multiples on demand.
    /// Nothing is mapped until the first request.
    pub fn growable(unit_size: usize) -> Self {
        Self {
            pages: Vec::new(),
            free_list: FreeList::new(),
            cursor: 0,
            unit_size: unit_size.max(1),
            growable: true,
        }
    }

    /// Creates a pool made of exactly one page of `size` bytes, mapped right away.
    pub fn fixed(size: usize) -> Result<Self> {
        let page = Page::new(size)?;

        Ok(Self {
            pages: vec![page],
            free_list: FreeList::new(),
            cursor: 0,
            unit_size: size,
            growable: false,
        })
    }

    /// Bytes left between the cursor and the end of the current page.
    fn available(&self) -> usize {
        self.pages
            .last()
            .map_or(0, |page| page.size() - self.cursor)
    }

    /// Returns `needed` contiguous bytes nobody else is using.
    ///
    /// `needed` must be greater than zero, zero sized requests never reach the pool.
    pub fn allocate(&mut self, needed: usize) -> Result<NonNull<u8>> {
        debug_assert!(needed > 0);

        if let Some(ptr) = self.free_list.take_first_fit(needed) {
            trace!(needed, ptr = ?ptr, "reused free block");
            return Ok(ptr);
        }

        let available = self.available();

        if needed > available {
            if !self.growable {
                self.retire_tail(available);
                debug!(needed, capacity = self.unit_size, "fixed page exhausted");
                return Err(Error::OutOfMemory { requested: needed });
            }

            // The new page is mapped before the tail is retired, so a failed
            // request leaves the pool untouched.
            let size = round_to_units(needed, self.unit_size).ok_or_else(|| {
                debug!(needed, unit = self.unit_size, "page size overflows");
                Error::OutOfMemory { requested: needed }
            })?;
            let page = Page::new(size)?;

            self.retire_tail(available);
            self.pages.push(page);
            self.cursor = 0;
        }

        // The branch above guarantees a current page with `needed` bytes ahead.
        let page = &self.pages[self.pages.len() - 1];
        let ptr = page.at(self.cursor);
        self.cursor += needed;

        trace!(needed, ptr = ?ptr, cursor = self.cursor, "bumped");

        Ok(ptr)
    }

    /// Moves the `available` bytes ahead of the cursor into the free list so
    /// they are not lost, and pushes the cursor to the end of the page.
    fn retire_tail(&mut self, available: usize) {
        if available == 0 {
            return;
        }

        let Some(page) = self.pages.last() else {
            return;
        };

        debug!(bytes = available, "retiring page tail to the free list");

        self.free_list.insert(page.at(self.cursor), available);
        self.cursor = page.size();
    }

    /// Records `size` bytes starting at `ptr` as free.
    ///
    /// Nothing is validated and nothing is merged.
    ///
    /// **SAFETY**: `ptr..ptr + size` must be a live range previously returned by
    /// [`PagePool::allocate`] on this pool and not released since.
    pub unsafe fn release(&mut self, ptr: NonNull<u8>, size: usize) {
        debug_assert!(self.pages.iter().any(|page| page.contains(ptr, size)));

        trace!(size, ptr = ?ptr, "released");
        self.free_list.insert(ptr, size);
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pages: self.pages.len(),
            reserved_bytes: self.pages.iter().map(Page::size).sum(),
            free_blocks: self.free_list.len(),
            free_bytes: self.free_list.free_bytes(),
            bump_available: self.available(),
        }
    }
}
