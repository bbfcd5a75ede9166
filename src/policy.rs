use std::mem;

/// Page growth unit of a growable allocator when none is given, in bytes.
pub const DEFAULT_UNIT_SIZE: usize = 512;

/// How an allocator obtains its pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// A single page for `capacity` elements, mapped when the allocator is
    /// created. The allocator never grows.
    Fixed {
        /// Capacity in elements of the allocator's type.
        capacity: usize,
    },
    /// Pages are mapped on demand, each one a whole number of `unit_size` bytes.
    Growable {
        /// Growth unit in bytes.
        unit_size: usize,
    },
}

/// The part of an allocator's configuration that survives a rebind.
///
/// Two allocators with the same policy are interchangeable for a container,
/// even though they never share storage. A fixed capacity is counted in
/// elements, so rebinding a `Fixed { capacity: 10 }` allocator to a larger type
/// yields a larger page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Policy {
    mode: Mode,
}

impl Policy {
    /// Growable allocator with [`DEFAULT_UNIT_SIZE`] pages.
    pub const fn growable() -> Self {
        Self::growable_with_unit(DEFAULT_UNIT_SIZE)
    }

    /// Growable allocator whose pages are multiples of `unit_size` bytes.
    /// A zero unit is treated as a single byte.
    pub const fn growable_with_unit(unit_size: usize) -> Self {
        let unit_size = if unit_size == 0 { 1 } else { unit_size };
        Self {
            mode: Mode::Growable { unit_size },
        }
    }

    /// Fixed allocator holding at most `capacity` elements. A capacity of zero
    /// means "no limit" and yields a [`Policy::growable`] one.
    pub const fn fixed(capacity: usize) -> Self {
        if capacity == 0 {
            return Self::growable();
        }

        Self {
            mode: Mode::Fixed { capacity },
        }
    }

    #[inline]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub const fn is_fixed(&self) -> bool {
        matches!(self.mode, Mode::Fixed { .. })
    }

    /// Page growth unit in bytes for elements of type `T`.
    pub const fn unit_size<T>(&self) -> usize {
        match self.mode {
            Mode::Fixed { capacity } => capacity.saturating_mul(mem::size_of::<T>()),
            Mode::Growable { unit_size } => unit_size,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::growable()
    }
}
