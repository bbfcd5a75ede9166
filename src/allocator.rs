use std::{
    alloc::Layout,
    cell::RefCell,
    fmt,
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
};

use allocator_api2::alloc::{AllocError, Allocator};
use tracing::trace;

use crate::{
    error::{Error, Result},
    policy::{Mode, Policy},
    pool::{PagePool, PoolStats},
};

/// Typed allocator handing out storage for values of `T` from a private pool
/// of pages.
///
/// Raw storage and object lifetime are two separate concerns here:
///
/// ```text
///   allocate(n) ──> construct(p, v) ──> ... ──> destroy(p) ──> deallocate(p, n)
///   \___________________________/               \____________________________/
///     storage from free list or                   object dropped, storage
///     bump cursor, grows if allowed               recorded as a free block
/// ```
///
/// The allocator never remembers which bytes hold live values: dropping it
/// unmaps every page without running any destructor. Containers are expected
/// to destroy what they constructed before letting the allocator go.
///
/// It is not thread safe. The bookkeeping lives behind a [`RefCell`] so the
/// allocator can be shared by reference, e.g. with the
/// [`allocator_api2`] containers through its [`Allocator`] implementation.
///
/// # Caller contract
///
/// Nothing but running out of memory is reported. Releasing a range twice,
/// releasing it with another count than it was allocated with, destroying a
/// value that was never constructed, or using storage after the allocator was
/// dropped are not detected and are undefined behaviour.
pub struct PageAllocator<T> {
    pool: RefCell<PagePool>,
    policy: Policy,
    marker: PhantomData<T>,
}

impl<T> PageAllocator<T> {
    /// Creates a growable allocator with the default page unit. No page is
    /// mapped until the first allocation.
    pub fn new() -> Self {
        Self {
            pool: RefCell::new(PagePool::growable(Policy::growable().unit_size::<T>())),
            policy: Policy::growable(),
            marker: PhantomData,
        }
    }

    /// Creates an allocator for at most `capacity` values of `T`, or a growable
    /// one if `capacity` is zero.
    pub fn fixed(capacity: usize) -> Result<Self> {
        Self::with_policy(Policy::fixed(capacity))
    }

    /// Creates an allocator following `policy`. A fixed allocator maps its
    /// only page right away, which is the only way this can fail.
    pub fn with_policy(policy: Policy) -> Result<Self> {
        let pool = match policy.mode() {
            Mode::Fixed { .. } => PagePool::fixed(policy.unit_size::<T>())?,
            Mode::Growable { unit_size } => PagePool::growable(unit_size),
        };

        Ok(Self {
            pool: RefCell::new(pool),
            policy,
            marker: PhantomData,
        })
    }

    #[inline]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Returns an allocator for another type with the same policy.
    ///
    /// The new allocator starts with no pages of its own (or with a fresh
    /// fixed page): rebound allocators are policy compatible, never storage
    /// compatible.
    pub fn rebind<U>(&self) -> Result<PageAllocator<U>> {
        PageAllocator::with_policy(self.policy)
    }

    /// Returns uninitialized storage for `count` contiguous values of `T`.
    ///
    /// A request for zero bytes returns a dangling, well aligned pointer that
    /// must never be read or written through.
    pub fn allocate(&self, count: usize) -> Result<NonNull<T>> {
        trace!(count, "allocate");

        let needed = count
            .checked_mul(mem::size_of::<T>())
            .ok_or(Error::OutOfMemory { requested: usize::MAX })?;

        if needed == 0 {
            return Ok(NonNull::dangling());
        }

        self.pool.borrow_mut().allocate(needed).map(NonNull::cast)
    }

    /// Records the storage of `count` values at `ptr` as free for reuse.
    ///
    /// The range is not merged with its neighbours and not checked in any way.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`PageAllocator::allocate`] on this
    /// allocator for exactly `count` values and must not have been deallocated
    /// since. Values living in the range must have been destroyed already.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        trace!(count, "deallocate");

        let size = count * mem::size_of::<T>();
        if size == 0 {
            return;
        }

        // SAFETY: forwarded to the caller.
        unsafe { self.pool.borrow_mut().release(ptr.cast(), size) };
    }

    /// Moves `value` into the storage at `ptr`. Allocator bookkeeping is not
    /// touched.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for writes and properly aligned for `U`. Whatever
    /// lives there is overwritten without being dropped.
    pub unsafe fn construct<U>(&self, ptr: NonNull<U>, value: U) {
        trace!(ty = std::any::type_name::<U>(), "construct");

        // SAFETY: forwarded to the caller.
        unsafe { ptr.as_ptr().write(value) };
    }

    /// Runs the destructor of the value at `ptr` without releasing its storage.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a value previously constructed and not destroyed
    /// since.
    pub unsafe fn destroy<U>(&self, ptr: NonNull<U>) {
        trace!(ty = std::any::type_name::<U>(), "destroy");

        // SAFETY: forwarded to the caller.
        unsafe { ptr::drop_in_place(ptr.as_ptr()) };
    }

    /// Snapshot of the page pool and free list bookkeeping.
    pub fn stats(&self) -> PoolStats {
        self.pool.borrow().stats()
    }

    /// Number of `T` the storage for `layout` is rounded up to, or `None` when
    /// this allocator can't honour its alignment.
    fn elements_for(layout: Layout) -> Option<usize> {
        if layout.align() > mem::align_of::<T>() {
            return None;
        }

        match mem::size_of::<T>() {
            0 => (layout.size() == 0).then_some(0),
            size => Some(layout.size().div_ceil(size)),
        }
    }
}

impl<T> Default for PageAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PageAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAllocator")
            .field("type", &std::any::type_name::<T>())
            .field("policy", &self.policy)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Allocators are interchangeable when they follow the same policy, whatever
/// their element types and however much they allocated.
impl<T, U> PartialEq<PageAllocator<U>> for PageAllocator<T> {
    fn eq(&self, other: &PageAllocator<U>) -> bool {
        self.policy == other.policy
    }
}

impl<T> Eq for PageAllocator<T> {}

/// Layout based entry point used by [`allocator_api2`] containers.
///
/// Sizes are rounded up to whole values of `T`, so every range the pool hands
/// out stays aligned for `T`. Layouts asking for a stricter alignment than
/// `T`'s are refused.
unsafe impl<T> Allocator for PageAllocator<T> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let count = Self::elements_for(layout).ok_or(AllocError)?;
        let ptr = PageAllocator::allocate(self, count).map_err(|_| AllocError)?;

        Ok(NonNull::slice_from_raw_parts(
            ptr.cast(),
            count * mem::size_of::<T>(),
        ))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if let Some(count) = Self::elements_for(layout) {
            // SAFETY: `ptr` came from `allocate` with the same layout, hence the
            // same element count.
            unsafe { PageAllocator::deallocate(self, ptr.cast(), count) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::{cell::Cell, rc::Rc};

    fn addr<T>(ptr: NonNull<T>) -> usize {
        ptr.as_ptr() as usize
    }

    #[test]
    fn growable_allocator_is_lazy() {
        let allocator = PageAllocator::<u64>::new();

        assert_eq!(allocator.stats().pages, 0);
        assert_eq!(allocator.policy(), Policy::growable());
    }

    #[test]
    fn fixed_allocator_maps_its_page_eagerly() {
        let allocator = PageAllocator::<(i32, i32)>::fixed(10).unwrap();
        let stats = allocator.stats();

        assert_eq!(stats.pages, 1);
        assert_eq!(stats.reserved_bytes, 10 * mem::size_of::<(i32, i32)>());
    }

    #[test]
    fn basic_alloc() {
        let allocator = PageAllocator::<u32>::new();
        unsafe {
            // Allocated space for unsigned 32 bit integer.
            let block = allocator.allocate(1).unwrap();
            allocator.construct(block, 23);
            assert_eq!(23, *block.as_ptr());
        }
    }

    #[test]
    fn array_alloc_is_contiguous() {
        let allocator = PageAllocator::<u16>::new();
        let size = 6;

        unsafe {
            let addr = allocator.allocate(size).unwrap();
            for i in 0..size {
                allocator.construct(addr.add(i), (i + 1) as u16);
            }
            for i in 0..size {
                assert_eq!((i + 1) as u16, *addr.add(i).as_ptr());
            }
        }
    }

    #[test]
    fn space_for_free_block_is_used() {
        let allocator = PageAllocator::<u64>::new();
        unsafe {
            let first_block = allocator.allocate(2).unwrap();
            let _ = allocator.allocate(1).unwrap();
            let _ = allocator.allocate(1).unwrap();

            allocator.deallocate(first_block, 2);

            let second_block = allocator.allocate(2).unwrap();

            assert_eq!(first_block, second_block);
        }
    }

    #[test]
    fn zero_count_is_a_dangling_allocation() {
        let allocator = PageAllocator::<u64>::new();

        let ptr = allocator.allocate(0).unwrap();
        assert_eq!(addr(ptr) % mem::align_of::<u64>(), 0);
        assert_eq!(allocator.stats(), PoolStats::default());

        unsafe { allocator.deallocate(ptr, 0) };
        assert_eq!(allocator.stats(), PoolStats::default());
    }

    #[test]
    fn zero_sized_type_never_maps() {
        let allocator = PageAllocator::<()>::new();

        allocator.allocate(1000).unwrap();
        assert_eq!(allocator.stats().pages, 0);
    }

    #[test]
    fn overflowing_count_is_out_of_memory() {
        let allocator = PageAllocator::<u64>::new();

        assert_eq!(
            allocator.allocate(usize::MAX).err(),
            Some(Error::OutOfMemory { requested: usize::MAX })
        );
    }

    #[test]
    fn huge_growable_request_is_out_of_memory() {
        let allocator = PageAllocator::<u8>::new();
        let before = allocator.stats();

        assert_eq!(
            allocator.allocate(usize::MAX - 10).err(),
            Some(Error::OutOfMemory { requested: usize::MAX - 10 })
        );
        assert_eq!(allocator.stats(), before);

        // The allocator is still usable afterwards.
        let ptr = allocator.allocate(16).unwrap();
        unsafe { allocator.construct(ptr, 7) };
        assert_eq!(allocator.stats().pages, 1);
    }

    #[test]
    fn growable_allocator_grows_transparently() {
        let allocator = PageAllocator::<u64>::new();

        // 64 values of 8 bytes fill one 512 bytes page.
        for _ in 0..64 * 10 {
            allocator.allocate(1).unwrap();
        }
        assert_eq!(allocator.stats().pages, 10);

        // Larger than a page.
        allocator.allocate(200).unwrap();
        assert_eq!(allocator.stats().pages, 11);
        assert_eq!(allocator.stats().reserved_bytes, 10 * 512 + 2048);
    }

    #[test]
    fn fixed_allocator_fails_past_capacity() {
        let allocator = PageAllocator::<u64>::fixed(4).unwrap();

        for _ in 0..4 {
            allocator.allocate(1).unwrap();
        }

        assert_eq!(
            allocator.allocate(1).err(),
            Some(Error::OutOfMemory { requested: 8 })
        );
    }

    #[test]
    fn fixed_allocator_reuses_released_storage() {
        let allocator = PageAllocator::<u64>::fixed(2).unwrap();

        let a = allocator.allocate(1).unwrap();
        let _b = allocator.allocate(1).unwrap();
        assert!(allocator.allocate(1).is_err());

        unsafe { allocator.deallocate(a, 1) };
        assert_eq!(allocator.allocate(1).unwrap(), a);
    }

    #[test]
    fn construct_and_destroy_leave_bookkeeping_alone() {
        let allocator = PageAllocator::<String>::new();
        let ptr = allocator.allocate(1).unwrap();
        let before = allocator.stats();

        unsafe {
            allocator.construct(ptr, String::from("page"));
            assert_eq!(ptr.as_ref(), "page");
            allocator.destroy(ptr);
        }

        assert_eq!(allocator.stats(), before);
    }

    #[test]
    fn destroy_runs_the_destructor_once() {
        struct DropCounter(Rc<Cell<u32>>);
        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let counter = Rc::new(Cell::new(0));
        let allocator = PageAllocator::<DropCounter>::new();

        unsafe {
            let ptr = allocator.allocate(3).unwrap();
            for i in 0..3 {
                allocator.construct(ptr.add(i), DropCounter(counter.clone()));
            }
            allocator.destroy(ptr.add(1));
            assert_eq!(counter.get(), 1);

            allocator.destroy(ptr);
            allocator.destroy(ptr.add(2));
            allocator.deallocate(ptr, 3);
        }

        assert_eq!(counter.get(), 3);
    }

    #[test]
    fn teardown_does_not_run_destructors() {
        let value = Rc::new(());
        {
            let allocator = PageAllocator::<Rc<()>>::new();
            let ptr = allocator.allocate(1).unwrap();
            unsafe { allocator.construct(ptr, value.clone()) };
        }

        // The clone leaked together with the page.
        assert_eq!(Rc::strong_count(&value), 2);
    }

    #[test]
    fn rebind_keeps_policy_but_not_storage() {
        let allocator = PageAllocator::<u8>::fixed(10).unwrap();
        allocator.allocate(10).unwrap();

        let rebound = allocator.rebind::<u64>().unwrap();
        assert_eq!(rebound.policy(), Policy::fixed(10));
        assert_eq!(rebound.stats().reserved_bytes, 80);
        assert_eq!(rebound.stats().bump_available, 80);
        assert!(allocator == rebound);

        let growable = PageAllocator::<u8>::new();
        growable.allocate(1).unwrap();
        let rebound = growable.rebind::<u32>().unwrap();
        assert_eq!(rebound.stats().pages, 0);
        assert!(rebound == growable);
    }

    #[test]
    fn equality_is_policy_equality() {
        let a = PageAllocator::<u32>::new();
        let b = PageAllocator::<u32>::with_policy(Policy::growable_with_unit(4096)).unwrap();
        let c = PageAllocator::<u32>::fixed(3).unwrap();
        let d = PageAllocator::<i64>::fixed(3).unwrap();

        assert!(a == PageAllocator::<u32>::default());
        assert!(a != b);
        assert!(a != c);
        assert!(c == d);
    }

    #[test]
    fn allocator_api_vec() {
        let allocator = PageAllocator::<u32>::new();
        let mut values = allocator_api2::vec::Vec::new_in(&allocator);

        for i in 0..100u32 {
            values.push(i);
        }

        assert_eq!(values.iter().sum::<u32>(), 4950);
        assert!(allocator.stats().pages >= 1);
    }

    #[test]
    fn allocator_api_refuses_stricter_alignment() {
        let allocator = PageAllocator::<u8>::new();
        let layout = Layout::new::<u64>();

        assert!(Allocator::allocate(&allocator, layout).is_err());
    }

    #[test]
    fn allocator_api_rounds_to_whole_elements() {
        let allocator = PageAllocator::<u64>::new();
        let layout = Layout::from_size_align(9, 4).unwrap();

        let block = Allocator::allocate(&allocator, layout).unwrap();
        assert_eq!(block.len(), 16);

        unsafe { Allocator::deallocate(&allocator, block.cast(), layout) };
        assert_eq!(allocator.stats().free_bytes, 16);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate(usize),
        Deallocate(usize),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..12).prop_map(Op::Allocate),
            any::<usize>().prop_map(Op::Deallocate),
        ]
    }

    fn overlaps(a: (usize, usize), b: (usize, usize)) -> bool {
        a.0 < b.0 + b.1 && b.0 < a.0 + a.1
    }

    /// Runs `ops` against `allocator`, checking that no two live
    /// allocations overlap. Returns the number of failed requests.
    fn run_ops(allocator: &PageAllocator<u32>, ops: &[Op]) -> usize {
        let mut live: Vec<(NonNull<u32>, usize)> = Vec::new();
        let mut failures = 0;

        for op in ops {
            match *op {
                Op::Allocate(count) => match allocator.allocate(count) {
                    Ok(ptr) => {
                        if count == 0 {
                            continue;
                        }
                        let range = (addr(ptr), count * mem::size_of::<u32>());
                        for &(other, other_count) in &live {
                            let other = (addr(other), other_count * mem::size_of::<u32>());
                            assert!(!overlaps(range, other), "{range:?} overlaps {other:?}");
                        }
                        // Storage is writable over its whole length.
                        for i in 0..count {
                            unsafe { allocator.construct(ptr.add(i), i as u32) };
                        }
                        live.push((ptr, count));
                    }
                    Err(Error::OutOfMemory { .. }) => failures += 1,
                },
                Op::Deallocate(index) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (ptr, count) = live.swap_remove(index % live.len());
                    unsafe { allocator.deallocate(ptr, count) };
                }
            }
        }

        failures
    }

    proptest! {
        #[test]
        fn growable_allocations_never_overlap(ops in prop::collection::vec(arb_op(), 0..200)) {
            let allocator = PageAllocator::<u32>::with_policy(Policy::growable_with_unit(64)).unwrap();
            prop_assert_eq!(run_ops(&allocator, &ops), 0);
        }

        #[test]
        fn fixed_allocations_never_overlap(ops in prop::collection::vec(arb_op(), 0..200)) {
            let allocator = PageAllocator::<u32>::fixed(32).unwrap();
            run_ops(&allocator, &ops);
            prop_assert_eq!(allocator.stats().pages, 1);
        }

        #[test]
        fn fixed_single_elements_fit_while_under_capacity(ops in prop::collection::vec(any::<(bool, usize)>(), 0..200)) {
            let capacity = 16;
            let allocator = PageAllocator::<u32>::fixed(capacity).unwrap();
            let mut live = Vec::new();

            for (allocate, index) in ops {
                if allocate {
                    let result = allocator.allocate(1);
                    if live.len() < capacity {
                        live.push(result.unwrap());
                    } else {
                        prop_assert!(result.is_err());
                    }
                } else if !live.is_empty() {
                    let ptr = live.swap_remove(index % live.len());
                    unsafe { allocator.deallocate(ptr, 1) };
                }
            }
        }

        #[test]
        fn exact_size_is_reused(count in 1usize..64, filler in 0usize..64) {
            let allocator = PageAllocator::<u64>::new();
            let _ = allocator.allocate(filler).unwrap();
            let ptr = allocator.allocate(count).unwrap();
            let _ = allocator.allocate(1).unwrap();

            unsafe { allocator.deallocate(ptr, count) };
            prop_assert_eq!(allocator.allocate(count).unwrap(), ptr);
        }
    }
}
