//! Error types for allocator operations

use thiserror::Error;

/// The single error an allocator operation can report.
///
/// Everything else (double free, deallocating with a wrong count, destroying a value
/// that was never constructed, using storage after the allocator is gone) is a broken
/// caller contract and is not detected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Either the operating system refused to map a new page, or a fixed
    /// capacity allocator ran out of room in its only page.
    #[error("out of memory: could not satisfy a request of {requested} bytes")]
    OutOfMemory {
        /// Size of the failed request in bytes
        requested: usize,
    },
}

/// Result type for allocator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
