use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::ptr::NonNull;

/// A source of raw memory for [`GrowVec`][crate::GrowVec].
///
/// The vector calls the allocator exactly at allocation boundaries: when it reserves, grows,
/// shrinks or is dropped. It never caches or pools memory on its own. Element construction and
/// destruction are performed by the vector itself on the memory handed out here.
///
/// # Propagation
///
/// The associated constants decide whether the allocator instance travels with the contents
/// when one vector is assigned from another:
///
/// * [`PROPAGATE_ON_COPY_ASSIGNMENT`][Self::PROPAGATE_ON_COPY_ASSIGNMENT] is consulted by
///   [`Clone::clone_from()`].
/// * [`PROPAGATE_ON_MOVE_ASSIGNMENT`][Self::PROPAGATE_ON_MOVE_ASSIGNMENT] is consulted by
///   [`GrowVec::move_assign()`][crate::GrowVec::move_assign].
/// * [`IS_ALWAYS_EQUAL`][Self::IS_ALWAYS_EQUAL] declares that any instance can free memory
///   obtained from any other instance, which lets the vector skip equality checks.
///
/// # Example
///
/// ```
/// use std::alloc::Layout;
/// use std::ptr::NonNull;
///
/// use vessel::{Allocator, Global, GrowVec};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Tagged(u32);
///
/// impl Allocator for Tagged {
///     const PROPAGATE_ON_COPY_ASSIGNMENT: bool = true;
///
///     fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
///         Global.allocate(layout)
///     }
///
///     unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
///         // SAFETY: Forwarding the caller's guarantees, we allocated through `Global`.
///         unsafe { Global.deallocate(ptr, layout) }
///     }
/// }
///
/// let mut vec = GrowVec::<u32, Tagged>::new_in(Tagged(7));
/// vec.push(1);
/// assert_eq!(vec.allocator(), &Tagged(7));
/// ```
pub trait Allocator: Clone + PartialEq {
    /// Whether `clone_from()` replaces the destination's allocator with the source's.
    const PROPAGATE_ON_COPY_ASSIGNMENT: bool = false;

    /// Whether `move_assign()` replaces the destination's allocator with the source's.
    const PROPAGATE_ON_MOVE_ASSIGNMENT: bool = true;

    /// Whether all instances of this allocator are interchangeable.
    const IS_ALWAYS_EQUAL: bool = false;

    /// Allocates a block of memory fitting `layout`, returning `None` on exhaustion.
    ///
    /// The vector never requests zero-sized blocks.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Releases a block of memory.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate()` on this instance (or on an instance that
    /// compares equal to it) with the same `layout`, and must not have been released already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// The largest block, in bytes, that this allocator can ever hand out.
    #[must_use]
    fn max_size(&self) -> usize {
        isize::MAX.unsigned_abs()
    }

    /// Picks the allocator that a copy-constructed vector will use.
    #[must_use]
    fn select_on_copy(&self) -> Self {
        self.clone()
    }

    /// Whether `self` can release memory obtained from `other`.
    #[must_use]
    fn can_free_for(&self, other: &Self) -> bool {
        Self::IS_ALWAYS_EQUAL || self == other
    }
}

/// The process-wide allocator, stateless and always equal to itself.
///
/// This is the default allocator of [`GrowVec`][crate::GrowVec].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Global;

impl Allocator for Global {
    const IS_ALWAYS_EQUAL: bool = true;

    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return Some(dangling_for(layout));
        }

        // SAFETY: The layout is not zero-sized, guarded above.
        NonNull::new(unsafe { alloc(layout) })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }

        // SAFETY: Forwarding the caller's guarantee that `ptr` came from `allocate()` with the
        // same layout, which for a non-zero size means it came from `alloc()`.
        unsafe {
            dealloc(ptr.as_ptr(), layout);
        }
    }
}

fn dangling_for(layout: Layout) -> NonNull<u8> {
    // A well-aligned non-null address that is never dereferenced for zero-sized accesses.
    NonNull::<u8>::dangling().with_addr(
        layout
            .align()
            .try_into()
            .expect("alignment is a power of two and therefore never zero"),
    )
}

/// Allocates room for `count` items of `T` from `allocator`.
///
/// Zero-sized requests never reach the allocator and produce a dangling pointer.
/// Exhaustion is treated as fatal, the same way the standard collections treat it.
pub(crate) fn allocate_array<T, A: Allocator>(allocator: &A, count: usize) -> NonNull<T> {
    let layout = array_layout::<T>(count);

    if layout.size() == 0 {
        return NonNull::dangling();
    }

    match allocator.allocate(layout) {
        Some(ptr) => ptr.cast(),
        None => handle_alloc_error(layout),
    }
}

/// Releases a block previously obtained from [`allocate_array()`].
///
/// # Safety
///
/// `ptr` must have been returned by `allocate_array::<T>(allocator, count)` with the same
/// `count`, on an allocator that can free for `allocator`, and not released already.
pub(crate) unsafe fn deallocate_array<T, A: Allocator>(
    allocator: &A,
    ptr: NonNull<T>,
    count: usize,
) {
    let layout = array_layout::<T>(count);

    if layout.size() == 0 {
        return;
    }

    // SAFETY: Forwarding the caller's guarantees.
    unsafe {
        allocator.deallocate(ptr.cast(), layout);
    }
}

fn array_layout<T>(count: usize) -> Layout {
    Layout::array::<T>(count).expect("capacity is checked against max_size before allocating")
}
