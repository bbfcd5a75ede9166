use std::ptr::NonNull;

use tracing::debug;

use crate::{
    error::{Error, Result},
    kernel::{page_size, request_memory, return_memory},
    utils::align,
};

/// One contiguous raw memory region owned by a [`crate::pool::PagePool`].
///
/// [`crate::kernel::request_memory`] gives us memory regions aligned to the
/// computer page size, so the actual mapping of a page is rounded up to that
/// size. Only the first `size` bytes are ever handed out, which keeps the
/// capacity of a fixed page exact.
///
/// ```text
/// base                          base + size        base + mapped
///  |                                 |                   |
///  v                                 v                   v
///  +---------------------------------+-------------------+
///  |          usable bytes           |  rounding slack   |
///  +---------------------------------+-------------------+
/// ```
///
/// Pages are never resized or split. They go back to the kernel when dropped.
pub(crate) struct Page {
    /// Start of the mapping.
    base: NonNull<u8>,
    /// Usable size of the page in bytes.
    size: usize,
    /// Size of the mapping (a multiple of the OS page size). Zero for a page
    /// that owns no memory at all.
    mapped: usize,
}

impl Page {
    /// Maps a new page with `size` usable bytes.
    ///
    /// A zero sized page performs no syscall and points nowhere.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Ok(Self {
                base: NonNull::dangling(),
                size: 0,
                mapped: 0,
            });
        }

        let mapped = match size.checked_add(page_size() - 1) {
            Some(_) => align(size, page_size()),
            None => return Err(Error::OutOfMemory { requested: size }),
        };

        let base = unsafe { request_memory(mapped) }.ok_or_else(|| {
            debug!(size, mapped, "kernel refused to map page");
            Error::OutOfMemory { requested: size }
        })?;

        debug!(size, mapped, base = ?base, "mapped page");

        Ok(Self { base, size, mapped })
    }

    /// Usable size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Pointer to the byte at `offset`, which may be one past the end.
    #[inline]
    pub fn at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.size);
        // SAFETY: `offset` stays within the mapping (or is zero for a dangling page).
        unsafe { self.base.add(offset) }
    }

    /// Whether `ptr..ptr + len` lies inside the usable bytes of this page.
    pub fn contains(&self, ptr: NonNull<u8>, len: usize) -> bool {
        let start = self.base.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        addr >= start && addr + len <= start + self.size
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if self.mapped == 0 {
            return;
        }

        debug!(size = self.size, mapped = self.mapped, base = ?self.base, "unmapped page");
        // SAFETY: the mapping was obtained from `request_memory` in `Page::new` and
        // this page is its only owner.
        unsafe { return_memory(self.base, self.mapped) };
    }
}
