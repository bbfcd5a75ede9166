//! This file contains the helper functions for the allocator that don't particularly
//! belong to any concrete module of the crate.

/// It aligns `to_be_aligned` up to a multiple of `aligment`, which must be a power of two.
///
/// This is used to round page mappings up to a multiple of [`crate::kernel::page_size`].
pub fn align(to_be_aligned: usize, aligment: usize) -> usize {
    (to_be_aligned + aligment - 1) & !(aligment - 1)
}

/// Rounds `size` up to a whole, non zero, number of `unit`s.
///
/// Growable pages are always a multiple of the growth unit, which does not need to
/// be a power of two (a fixed page unit is `capacity * size_of::<T>()`).
/// Returns `None` when the rounded size does not fit in a `usize`.
pub fn round_to_units(size: usize, unit: usize) -> Option<usize> {
    let unit = unit.max(1);
    size.div_ceil(unit).max(1).checked_mul(unit)
}
