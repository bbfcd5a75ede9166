//! # pagealloc - A page based bump allocator
//!
//! This crate provides a typed allocator meant to back containers: it hands out
//! raw storage for `n` values of `T`, lets the container construct and destroy
//! values in that storage on its own schedule, and takes the storage back for
//! reuse.
//!
//! ## Overview
//!
//! Storage is bumped out of pages obtained from the operating system. Released
//! ranges go to a free list which is scanned, first fit, before bumping:
//!
//! ```text
//!   +--------------------------------------------------------------------+
//!   |                            PageAllocator<T>                        |
//!   |                                                                    |
//!   |   pages                                                            |
//!   |   +-----------------------+   +---------------------------------+  |
//!   |   | A1 | free | A3 | free |   | A4 | A5 |         bump          |  |
//!   |   +-----------------------+   +---------------------------------+  |
//!   |            ^           ^                ^                          |
//!   |            |           |                |                          |
//!   |   free list+-----------+             cursor                        |
//!   +--------------------------------------------------------------------+
//! ```
//!
//! An allocator is either:
//!
//! - **Growable**: pages are mapped on demand in multiples of a unit
//!   ([`DEFAULT_UNIT_SIZE`] bytes unless configured otherwise).
//! - **Fixed**: a single page for `N` values, mapped up front. Once it is
//!   used up, requests fail with [`Error::OutOfMemory`].
//!
//! Pages are never given back before the allocator is dropped, and free ranges
//! are never merged, so fragmentation is unbounded for some patterns.
//!
//! ## Crate Structure
//!
//! ```text
//!   pagealloc
//!   ├── allocator  - PageAllocator<T>, the typed front
//!   ├── policy     - Fixed / Growable configuration
//!   ├── pool       - Page pool, bump cursor and statistics (internal)
//!   ├── freelist   - First fit free block list (internal)
//!   ├── block      - Free block record (internal)
//!   ├── page       - Owned OS mapping (internal)
//!   ├── kernel     - mmap / VirtualAlloc layer (internal)
//!   ├── list       - Singly linked List<T> built on the allocator
//!   └── error      - Error and Result
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use pagealloc::PageAllocator;
//!
//! let allocator = PageAllocator::<u64>::new();
//!
//! let ptr = allocator.allocate(4).unwrap();
//! unsafe {
//!     for i in 0..4 {
//!         allocator.construct(ptr.add(i), i as u64 * 10);
//!     }
//!     assert_eq!(*ptr.add(3).as_ptr(), 30);
//!
//!     for i in 0..4 {
//!         allocator.destroy(ptr.add(i));
//!     }
//!     allocator.deallocate(ptr, 4);
//! }
//!
//! // The released range is handed out again.
//! assert_eq!(allocator.allocate(4).unwrap(), ptr);
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Trusting**: deallocation is not validated in any way
//! - **No compaction**: adjacent free ranges are not coalesced
//! - **Natural alignment only**: storage is aligned for `T`, nothing more

mod allocator;
mod block;
mod error;
mod freelist;
mod kernel;
mod page;
mod policy;
mod pool;
mod utils;

pub mod list;

pub use allocator::PageAllocator;
pub use error::{Error, Result};
pub use list::List;
pub use policy::{DEFAULT_UNIT_SIZE, Mode, Policy};
pub use pool::PoolStats;
