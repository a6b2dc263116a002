use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut, Index, IndexMut, RangeBounds};
use std::ptr::{self, NonNull};
use std::{iter, slice};

use scopeguard::ScopeGuard;
use tracing::trace;

use crate::allocator::{allocate_array, deallocate_array};
use crate::error::Result;
use crate::fixed_array::resolve_range;
use crate::{Allocator, Error, Geometric, Global, GrowthPolicy};

/// A heap-backed growable array with a pluggable allocator and growth policy.
///
/// Items are stored contiguously in a single allocation obtained from `A`. When a push or an
/// insertion finds the vector full, the growth policy `P` decides the new capacity. The
/// allocator is only called when the vector reserves, grows, shrinks or is dropped.
///
/// # Panic safety
///
/// Moving items between buffers cannot panic in Rust, so reallocation always either completes or
/// leaves the vector untouched. Operations that clone user values (`insert_count()`,
/// `insert_slice()`) or pull from a user iterator (`insert_iter()`) restore the previous contents
/// and release any replacement buffer if the user code panics.
///
/// # Example
///
/// ```
/// use vessel::{ExactFit, GrowVec};
///
/// let mut vec = GrowVec::new();
/// vec.reserve(4);
///
/// for value in 1..=4 {
///     vec.push(value);
/// }
///
/// // The vector is full, so the default policy doubles the capacity.
/// vec.insert(1, 9);
///
/// assert_eq!(vec.as_slice(), &[1, 9, 2, 3, 4]);
/// assert_eq!(vec.capacity(), 8);
///
/// // A different policy can be selected for the lifetime of the vector or for a single push.
/// let mut exact = GrowVec::with_policy(ExactFit);
/// exact.push(1);
/// exact.push(2);
/// assert_eq!(exact.capacity(), 2);
/// ```
pub struct GrowVec<T, A: Allocator = Global, P: GrowthPolicy = Geometric<2>> {
    /// Dangling if `capacity` is zero or `T` is zero-sized.
    ptr: NonNull<T>,

    /// Items `..len` are initialized, `len..capacity` are uninitialized.
    len: usize,

    capacity: usize,

    allocator: A,
    policy: P,

    _items: PhantomData<T>,
}

impl<T> GrowVec<T> {
    /// Creates an empty vector that uses the global allocator and the default growth policy.
    ///
    /// Does not allocate.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy_in(Geometric, Global)
    }

    /// Creates an empty vector with room for exactly `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`max_size()`][Self::max_size].
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }

    /// Creates a vector holding `count` clones of `value`.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds [`max_size()`][Self::max_size].
    #[must_use]
    pub fn from_elem(count: usize, value: &T) -> Self
    where
        T: Clone,
    {
        Self::from_elem_in(count, value, Global)
    }

    /// Creates a vector holding clones of the items in `items`.
    #[must_use]
    pub fn from_slice(items: &[T]) -> Self
    where
        T: Clone,
    {
        Self::from_slice_in(items, Global)
    }
}

impl<T, P: GrowthPolicy> GrowVec<T, Global, P> {
    /// Creates an empty vector that uses the global allocator and the given growth policy.
    #[must_use]
    pub fn with_policy(policy: P) -> Self {
        Self::with_policy_in(policy, Global)
    }
}

impl<T, A: Allocator, P: GrowthPolicy + Default> GrowVec<T, A, P> {
    /// Creates an empty vector that obtains its memory from `allocator`.
    #[must_use]
    pub fn new_in(allocator: A) -> Self {
        Self::with_policy_in(P::default(), allocator)
    }

    /// Creates an empty vector with room for exactly `capacity` items, obtained from
    /// `allocator`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`max_size()`][Self::max_size].
    #[must_use]
    pub fn with_capacity_in(capacity: usize, allocator: A) -> Self {
        let mut result = Self::new_in(allocator);
        result.reserve(capacity);
        result
    }

    /// Creates a vector holding `count` clones of `value`, in memory from `allocator`.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds [`max_size()`][Self::max_size].
    #[must_use]
    pub fn from_elem_in(count: usize, value: &T, allocator: A) -> Self
    where
        T: Clone,
    {
        let mut result = Self::new_in(allocator);
        result.assign(count, value);
        result
    }

    /// Creates a vector holding clones of the items in `items`, in memory from `allocator`.
    #[must_use]
    pub fn from_slice_in(items: &[T], allocator: A) -> Self
    where
        T: Clone,
    {
        let mut result = Self::new_in(allocator);
        result.assign_slice(items);
        result
    }
}

impl<T, A: Allocator, P: GrowthPolicy> GrowVec<T, A, P> {
    /// Creates an empty vector with an explicit growth policy and allocator.
    #[must_use]
    pub fn with_policy_in(policy: P, allocator: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            len: 0,
            capacity: 0,
            allocator,
            policy,
            _items: PhantomData,
        }
    }

    /// The number of items in the vector.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector holds no items.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of items the vector can hold without reallocating.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the next push will reallocate.
    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Whether `additional` more items fit without reallocating.
    #[must_use]
    pub fn can_store(&self, additional: usize) -> bool {
        self.capacity.wrapping_sub(self.len) >= additional
    }

    /// The largest capacity the vector can ever have, limited by the address space and by
    /// [`Allocator::max_size()`].
    #[must_use]
    pub fn max_size(&self) -> usize {
        let item_size = size_of::<T>();

        if item_size == 0 {
            return usize::MAX;
        }

        isize::MAX
            .unsigned_abs()
            .min(self.allocator.max_size())
            .checked_div(item_size)
            .expect("guarded against zero-sized items above")
    }

    /// The allocator that owns the vector's storage.
    #[must_use]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// The growth policy consulted when the vector runs out of capacity.
    #[must_use]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// A pointer to the first item. Dangling but well-aligned if nothing has been allocated.
    #[must_use]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// A mutable pointer to the first item. Dangling but well-aligned if nothing has been
    /// allocated.
    #[must_use]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// The items as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: The first `len` items are initialized and the pointer is valid and aligned
        // even when dangling, which is acceptable for an empty or zero-sized slice.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The items as a mutable slice.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: The first `len` items are initialized and we hold an exclusive borrow.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// The first item, if any.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    /// The first item, if any, mutably.
    #[must_use]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().first_mut()
    }

    /// The last item, if any.
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    /// The last item, if any, mutably.
    #[must_use]
    pub fn back_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }

    /// The item at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `index` does not refer to an item.
    pub fn at(&self, index: usize) -> Result<&T> {
        let len = self.len;
        self.as_slice()
            .get(index)
            .ok_or(Error::OutOfRange { index, len })
    }

    /// The item at `index`, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if `index` does not refer to an item.
    pub fn at_mut(&mut self, index: usize) -> Result<&mut T> {
        let len = self.len;
        self.as_mut_slice()
            .get_mut(index)
            .ok_or(Error::OutOfRange { index, len })
    }

    /// Whether the internal bookkeeping is self-consistent.
    ///
    /// This is always true unless memory has been corrupted by unsafe code.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.len <= self.capacity
            && self.capacity <= self.max_size()
            && (self.capacity > 0 || self.ptr == NonNull::dangling())
    }

    /// Ensures room for at least `capacity` items in total.
    ///
    /// Does nothing if the capacity is already sufficient. Otherwise reallocates to exactly
    /// `capacity`, moving the existing items into the new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityOverflow`] if `capacity` exceeds [`max_size()`][Self::max_size].
    /// The vector is unchanged in that case.
    pub fn try_reserve(&mut self, capacity: usize) -> Result<()> {
        if capacity <= self.capacity {
            return Ok(());
        }

        let max = self.max_size();

        if capacity > max {
            return Err(Error::CapacityOverflow {
                requested: capacity,
                max,
            });
        }

        self.reallocate(capacity);
        Ok(())
    }

    /// Ensures room for at least `capacity` items in total.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`max_size()`][Self::max_size].
    pub fn reserve(&mut self, capacity: usize) {
        if let Err(error) = self.try_reserve(capacity) {
            panic!("{error}");
        }
    }

    /// Reduces the capacity to the number of items.
    ///
    /// An empty vector releases its storage entirely.
    pub fn shrink_to_fit(&mut self) {
        if self.capacity == self.len {
            return;
        }

        if self.len == 0 {
            trace!(capacity = self.capacity, "releasing vector storage");

            // SAFETY: No items are live, so nothing is leaked or left dangling.
            unsafe {
                self.release_storage();
            }
            return;
        }

        self.reallocate(self.len);
    }

    /// Appends `value`, growing the vector via its growth policy if it is full.
    ///
    /// # Panics
    ///
    /// Panics if the vector would grow past [`max_size()`][Self::max_size].
    pub fn push(&mut self, value: T) {
        self.emplace_back(value);
    }

    /// Appends `value` and returns a reference to it, growing the vector via its growth policy
    /// if it is full.
    ///
    /// # Panics
    ///
    /// Panics if the vector would grow past [`max_size()`][Self::max_size].
    pub fn emplace_back(&mut self, value: T) -> &mut T {
        if self.is_full() {
            let new_capacity = self.grown_capacity(&self.policy, self.required_for_one());
            self.reallocate(new_capacity);
        }

        // SAFETY: We just ensured there is room for one more item.
        unsafe { self.push_unchecked(value) }
    }

    /// Appends `value`, consulting `policy` instead of the vector's own growth policy if the
    /// vector is full.
    ///
    /// # Panics
    ///
    /// Panics if the vector would grow past [`max_size()`][Self::max_size].
    pub fn push_with_policy<Q>(&mut self, value: T, policy: &Q) -> &mut T
    where
        Q: GrowthPolicy + ?Sized,
    {
        if self.is_full() {
            let new_capacity = self.grown_capacity(policy, self.required_for_one());
            self.reallocate(new_capacity);
        }

        // SAFETY: We just ensured there is room for one more item.
        unsafe { self.push_unchecked(value) }
    }

    /// Appends `value` without checking for room.
    ///
    /// # Safety
    ///
    /// The vector must not be full.
    pub unsafe fn push_unchecked(&mut self, value: T) -> &mut T {
        debug_assert!(
            self.len < self.capacity,
            "push_unchecked() called on a full GrowVec"
        );

        // SAFETY: The caller guarantees that slot `len` is within the allocation.
        let slot = unsafe { self.ptr.add(self.len) };

        // SAFETY: The slot is uninitialized and within the allocation.
        unsafe {
            slot.write(value);
        }

        self.len = self.len.wrapping_add(1);

        // SAFETY: We just initialized the slot and the returned borrow is tied to `self`.
        unsafe { &mut *slot.as_ptr() }
    }

    /// Removes and returns the last item, if any.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }

        self.len = self.len.wrapping_sub(1);

        // SAFETY: The old last slot is within the allocation.
        let slot = unsafe { self.ptr.add(self.len) };

        // SAFETY: The slot held the last initialized item and is now outside the live range,
        // so ownership moves to the caller.
        Some(unsafe { slot.read() })
    }

    /// Removes and drops the last item, if any.
    pub fn pop_back(&mut self) {
        drop(self.pop());
    }

    /// Drops every item past `new_len`. Does nothing if the vector is already shorter.
    ///
    /// The capacity is unchanged.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len {
            return;
        }

        // SAFETY: `new_len < len`, so the range is within the initialized items.
        let tail = unsafe { self.ptr.add(new_len) };
        let tail = ptr::slice_from_raw_parts_mut(tail.as_ptr(), self.len.wrapping_sub(new_len));

        // The items leave the live range before they are dropped, so a panicking `Drop` cannot
        // cause them to be dropped twice.
        self.len = new_len;

        // SAFETY: The items were initialized and are no longer reachable through the vector.
        unsafe {
            ptr::drop_in_place(tail);
        }
    }

    /// Drops every item. The capacity is unchanged.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Inserts `value` at `index`, shifting later items back by one.
    ///
    /// If the vector is full it grows via its growth policy first. Returns `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()` or if the vector would grow past
    /// [`max_size()`][Self::max_size].
    pub fn insert(&mut self, index: usize, value: T) -> usize {
        self.assert_insertion_index(index);

        if index == self.len {
            self.emplace_back(value);
            return index;
        }

        if self.is_full() {
            let new_capacity = self.grown_capacity(&self.policy, self.required_for_one());
            self.reallocate(new_capacity);
        }

        // SAFETY: `index < len < capacity`, so the slot is within the allocation.
        let gap = unsafe { self.ptr.add(index) };

        // SAFETY: The tail plus one free slot lie within the allocation. The ranges overlap,
        // which `copy()` permits.
        unsafe {
            ptr::copy(gap.as_ptr(), gap.as_ptr().add(1), self.len.wrapping_sub(index));
        }

        // SAFETY: The slot at `index` was vacated by the shift above.
        unsafe {
            gap.write(value);
        }

        self.len = self.len.wrapping_add(1);
        index
    }

    /// Inserts `count` clones of `value` at `index`, shifting later items back.
    ///
    /// If the items do not fit, the vector reallocates to exactly `len() + count`. Returns
    /// `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()` or if the vector would grow past
    /// [`max_size()`][Self::max_size]. If `Clone` panics, the vector is left as it was.
    pub fn insert_count(&mut self, index: usize, count: usize, value: &T) -> usize
    where
        T: Clone,
    {
        self.insert_exact(index, count, iter::repeat(value).take(count).cloned())
    }

    /// Inserts clones of the items in `items` at `index`, shifting later items back.
    ///
    /// If the items do not fit, the vector reallocates to exactly `len() + items.len()`.
    /// Returns `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()` or if the vector would grow past
    /// [`max_size()`][Self::max_size]. If `Clone` panics, the vector is left as it was.
    pub fn insert_slice(&mut self, index: usize, items: &[T]) -> usize
    where
        T: Clone,
    {
        self.insert_exact(index, items.len(), items.iter().cloned())
    }

    /// Inserts the items produced by `iter` at `index`.
    ///
    /// The items are first appended and then rotated into place, so the number of items does
    /// not need to be known in advance. Returns `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()` or if the vector would grow past
    /// [`max_size()`][Self::max_size]. If the iterator panics, the items appended so far are
    /// dropped and the vector is left as it was.
    pub fn insert_iter<I>(&mut self, index: usize, iter: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        self.assert_insertion_index(index);

        let old_len = self.len;

        let mut guard = scopeguard::guard(&mut *self, move |this| this.truncate(old_len));

        for value in iter {
            guard.push(value);
        }

        let this = ScopeGuard::into_inner(guard);

        this.as_mut_slice()
            .get_mut(index..)
            .expect("index was checked against the length before any items were appended")
            .rotate_left(old_len.wrapping_sub(index));

        index
    }

    /// Removes the item at `index`, shifting later items towards the front.
    ///
    /// Returns `index`, which now refers to the item that followed the removed one.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn erase(&mut self, index: usize) -> usize {
        assert!(
            index < self.len,
            "erase index {index} is out of bounds of GrowVec of length {}",
            self.len
        );

        self.erase_range(index..=index)
    }

    /// Removes the items in `range`, shifting later items towards the front.
    ///
    /// Returns the start of the range, which now refers to the first item after the removed
    /// ones. An empty range is a no-op. The capacity is unchanged.
    ///
    /// # Panics
    ///
    /// Panics if the range is decreasing or extends past `len()`.
    pub fn erase_range<R>(&mut self, range: R) -> usize
    where
        R: RangeBounds<usize>,
    {
        let old_len = self.len;
        let (start, end) = resolve_range(&range, old_len);

        assert!(
            start <= end && end <= old_len,
            "erase range {start}..{end} is out of bounds of GrowVec of length {old_len}"
        );

        if start == end {
            return start;
        }

        let base = self.ptr;
        let len = &mut self.len;
        *len = start;

        // Closes the gap even if dropping one of the removed items panics.
        let _close_gap = scopeguard::guard((), move |()| {
            let tail_len = old_len.wrapping_sub(end);

            // SAFETY: Both ranges lie within the allocation and the source holds the
            // initialized tail. The ranges may overlap, which `copy()` permits.
            unsafe {
                ptr::copy(base.add(end).as_ptr(), base.add(start).as_ptr(), tail_len);
            }

            *len = start.wrapping_add(tail_len);
        });

        // SAFETY: The removed items are initialized and outside the live range.
        let removed = unsafe { base.add(start) };

        // SAFETY: Each removed item is dropped exactly once. The guard above moves the tail
        // over them afterwards, never reading them again.
        unsafe {
            ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                removed.as_ptr(),
                end.wrapping_sub(start),
            ));
        }

        start
    }

    /// Removes and returns the item at `index`, shifting later items towards the front.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn remove(&mut self, index: usize) -> T {
        assert!(
            index < self.len,
            "removal index {index} is out of bounds of GrowVec of length {}",
            self.len
        );

        // SAFETY: `index < len`, so the slot holds an initialized item.
        let slot = unsafe { self.ptr.add(index) };

        // SAFETY: The slot is initialized. It is overwritten by the shift below, so the item is
        // not duplicated.
        let value = unsafe { slot.read() };

        // SAFETY: The tail lies within the allocation. The ranges overlap, which `copy()`
        // permits.
        unsafe {
            ptr::copy(
                slot.add(1).as_ptr(),
                slot.as_ptr(),
                self.len.wrapping_sub(index).wrapping_sub(1),
            );
        }

        self.len = self.len.wrapping_sub(1);
        value
    }

    /// Replaces the contents with `count` clones of `value`.
    ///
    /// The existing items are dropped first. If the new contents do not fit, the old storage is
    /// released and storage of exactly `count` items is allocated.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds [`max_size()`][Self::max_size].
    pub fn assign(&mut self, count: usize, value: &T)
    where
        T: Clone,
    {
        self.assign_exact(count, iter::repeat(value).take(count).cloned());
    }

    /// Replaces the contents with clones of the items in `items`.
    pub fn assign_slice(&mut self, items: &[T])
    where
        T: Clone,
    {
        self.assign_exact(items.len(), items.iter().cloned());
    }

    /// Replaces the contents with the items produced by `iter`.
    pub fn assign_iter<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.clear();
        self.extend(iter);
    }

    /// Moves the contents of `other` into `self`, leaving `other` empty.
    ///
    /// The current contents of `self` are dropped. If
    /// [`A::PROPAGATE_ON_MOVE_ASSIGNMENT`][Allocator::PROPAGATE_ON_MOVE_ASSIGNMENT] is set,
    /// `self` adopts the allocator of `other` along with its buffer. Otherwise `self` keeps its
    /// own allocator: the buffer is still adopted if that allocator can free it, and if not the
    /// items are moved one by one into storage from `self`'s allocator.
    ///
    /// Plain Rust moves (`let b = a;`) always carry the allocator along.
    pub fn move_assign(&mut self, other: &mut Self) {
        self.clear();

        if A::PROPAGATE_ON_MOVE_ASSIGNMENT || self.allocator.can_free_for(&other.allocator) {
            // SAFETY: No items are live after `clear()`.
            unsafe {
                self.release_storage();
            }

            if A::PROPAGATE_ON_MOVE_ASSIGNMENT {
                self.allocator = other.allocator.clone();
            }

            self.ptr = mem::replace(&mut other.ptr, NonNull::dangling());
            self.capacity = mem::take(&mut other.capacity);
            self.len = mem::take(&mut other.len);
            return;
        }

        if other.len > self.capacity {
            // SAFETY: No items are live after `clear()`.
            unsafe {
                self.release_storage();
            }

            self.reallocate(other.len);
        }

        // SAFETY: We have room for `other.len` items and the buffers belong to different
        // vectors, so they cannot overlap. Ownership of the items moves to `self` and `other`
        // forgets them below.
        unsafe {
            ptr::copy_nonoverlapping(other.ptr.as_ptr(), self.ptr.as_ptr(), other.len);
        }

        self.len = mem::take(&mut other.len);
    }

    /// Creates a copy of the vector whose storage comes from `allocator`.
    #[must_use]
    pub fn clone_with_allocator(&self, allocator: A) -> Self
    where
        T: Clone,
        P: Clone,
    {
        let mut result = Self::with_policy_in(self.policy.clone(), allocator);
        result.assign_slice(self.as_slice());
        result
    }

    fn assert_insertion_index(&self, index: usize) {
        assert!(
            index <= self.len,
            "insertion index {index} is out of bounds of GrowVec of length {}",
            self.len
        );
    }

    fn required_for_one(&self) -> usize {
        self.capacity
            .checked_add(1)
            .unwrap_or_else(|| capacity_overflow(usize::MAX, self.max_size()))
    }

    /// Asks `policy` for a capacity of at least `required` and clamps the answer to the valid
    /// range.
    fn grown_capacity<Q>(&self, policy: &Q, required: usize) -> usize
    where
        Q: GrowthPolicy + ?Sized,
    {
        let max = self.max_size();

        if required > max {
            capacity_overflow(required, max);
        }

        let proposed = policy.grow_capacity(self.len, self.capacity, required);

        debug_assert!(
            proposed >= required,
            "growth policy proposed capacity {proposed} which is below the required {required}"
        );

        proposed.clamp(required, max)
    }

    /// Moves the items into a new buffer of exactly `new_capacity` items.
    fn reallocate(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity >= self.len);

        let new_ptr = allocate_array::<T, A>(&self.allocator, new_capacity);

        // SAFETY: Both buffers hold at least `len` items and a fresh allocation cannot overlap
        // the old one. This is a bitwise move, ownership passes to the new buffer.
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), self.len);
        }

        // SAFETY: The new buffer was allocated from our allocator with this capacity and its
        // first `len` slots now hold the items.
        unsafe {
            self.adopt_storage(new_ptr, new_capacity);
        }
    }

    /// Releases the old buffer and starts using `new_ptr` instead.
    ///
    /// # Safety
    ///
    /// `new_ptr` must come from `allocate_array()` on this vector's allocator with
    /// `new_capacity` items and its first `len` slots must hold the items. The old buffer must
    /// no longer hold live items.
    unsafe fn adopt_storage(&mut self, new_ptr: NonNull<T>, new_capacity: usize) {
        trace!(
            old_capacity = self.capacity,
            new_capacity,
            len = self.len,
            "reallocating vector storage"
        );

        // SAFETY: Forwarding the caller's guarantee that the old buffer holds no live items.
        unsafe {
            self.release_storage();
        }

        self.ptr = new_ptr;
        self.capacity = new_capacity;
    }

    /// Returns the buffer to the allocator and resets the capacity to zero.
    ///
    /// # Safety
    ///
    /// The caller must have already dropped or moved out every item in the buffer.
    unsafe fn release_storage(&mut self) {
        if self.capacity > 0 {
            // SAFETY: The buffer was allocated from our allocator with this capacity.
            unsafe {
                deallocate_array(&self.allocator, self.ptr, self.capacity);
            }
        }

        self.ptr = NonNull::dangling();
        self.capacity = 0;
    }

    /// Inserts exactly `count` items produced by `items` at `index`.
    fn insert_exact<I>(&mut self, index: usize, count: usize, items: I) -> usize
    where
        I: Iterator<Item = T>,
    {
        self.assert_insertion_index(index);

        if count == 0 {
            return index;
        }

        let new_len = self
            .len
            .checked_add(count)
            .unwrap_or_else(|| capacity_overflow(usize::MAX, self.max_size()));

        if new_len > self.capacity {
            self.insert_reallocating(index, count, new_len, items);
        } else {
            self.insert_in_place(index, count, items);
        }

        index
    }

    /// Builds a new buffer of exactly `new_len` items holding the prefix, the new items and the
    /// suffix, then swaps it in.
    fn insert_reallocating<I>(&mut self, index: usize, count: usize, new_len: usize, mut items: I)
    where
        I: Iterator<Item = T>,
    {
        let max = self.max_size();

        if new_len > max {
            capacity_overflow(new_len, max);
        }

        let new_ptr = allocate_array::<T, A>(&self.allocator, new_len);
        let allocator = &self.allocator;

        // Until the new buffer is committed, a panic drops the new items written so far and
        // releases the new buffer. The old buffer is untouched until then.
        let mut written = scopeguard::guard(0_usize, move |written| {
            // SAFETY: Exactly `written` items have been initialized starting at `index`.
            unsafe {
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                    new_ptr.add(index).as_ptr(),
                    written,
                ));
            }

            // SAFETY: The buffer came from this allocator with `new_len` items and the items
            // in it were dropped above.
            unsafe {
                deallocate_array(allocator, new_ptr, new_len);
            }
        });

        while *written < count {
            let value = items
                .next()
                .expect("callers supply exactly `count` items");

            // SAFETY: `index + written < index + count <= new_len`, the slot is uninitialized.
            unsafe {
                new_ptr.add(index.wrapping_add(*written)).write(value);
            }

            *written = written.wrapping_add(1);
        }

        _ = ScopeGuard::into_inner(written);

        // SAFETY: The prefix and suffix of the old buffer move bitwise into the slots around the
        // new items. The buffers do not overlap.
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.as_ptr(), new_ptr.as_ptr(), index);
        }

        // SAFETY: As above, for the suffix.
        unsafe {
            ptr::copy_nonoverlapping(
                self.ptr.add(index).as_ptr(),
                new_ptr.add(index.wrapping_add(count)).as_ptr(),
                self.len.wrapping_sub(index),
            );
        }

        // SAFETY: Every item of the old buffer was moved out above and the new buffer holds
        // `new_len` initialized items.
        unsafe {
            self.adopt_storage(new_ptr, new_len);
        }

        self.len = new_len;
    }

    /// Opens a gap of `count` slots at `index` within the existing capacity and fills it.
    fn insert_in_place<I>(&mut self, index: usize, count: usize, mut items: I)
    where
        I: Iterator<Item = T>,
    {
        let base = self.ptr;
        let old_len = self.len;
        let tail_len = old_len.wrapping_sub(index);

        // SAFETY: `index + count + tail_len == new_len <= capacity`, so both ranges are within
        // the allocation. They may overlap, which `copy()` permits.
        unsafe {
            ptr::copy(
                base.add(index).as_ptr(),
                base.add(index.wrapping_add(count)).as_ptr(),
                tail_len,
            );
        }

        // While the gap is being filled only the prefix counts as live.
        let len = &mut self.len;
        *len = index;

        // If a clone panics, drop the items written so far and close the gap again.
        let mut written = scopeguard::guard(0_usize, move |written| {
            // SAFETY: Exactly `written` items have been initialized starting at `index`.
            unsafe {
                ptr::drop_in_place(ptr::slice_from_raw_parts_mut(
                    base.add(index).as_ptr(),
                    written,
                ));
            }

            // SAFETY: Moves the tail back to where it was before the gap was opened.
            unsafe {
                ptr::copy(
                    base.add(index.wrapping_add(count)).as_ptr(),
                    base.add(index).as_ptr(),
                    tail_len,
                );
            }

            *len = old_len;
        });

        while *written < count {
            let value = items
                .next()
                .expect("callers supply exactly `count` items");

            // SAFETY: The slot lies inside the gap and is uninitialized.
            unsafe {
                base.add(index.wrapping_add(*written)).write(value);
            }

            *written = written.wrapping_add(1);
        }

        _ = ScopeGuard::into_inner(written);

        self.len = old_len.wrapping_add(count);
    }

    /// Drops the current items and refills the vector with exactly `count` items.
    fn assign_exact<I>(&mut self, count: usize, items: I)
    where
        I: Iterator<Item = T>,
    {
        self.clear();

        if count > self.capacity {
            let max = self.max_size();

            if count > max {
                capacity_overflow(count, max);
            }

            // SAFETY: No items are live after `clear()`.
            unsafe {
                self.release_storage();
            }

            self.reallocate(count);
        }

        for value in items.take(count) {
            // SAFETY: We reserved room for `count` items and `take()` limits us to that.
            unsafe {
                self.push_unchecked(value);
            }
        }
    }
}

#[cold]
fn capacity_overflow(requested: usize, max: usize) -> ! {
    panic!("{}", Error::CapacityOverflow { requested, max });
}

impl<T, A: Allocator, P: GrowthPolicy> Drop for GrowVec<T, A, P> {
    fn drop(&mut self) {
        self.clear();

        // SAFETY: All items were dropped above.
        unsafe {
            self.release_storage();
        }
    }
}

// SAFETY: The vector owns its items and its buffer exclusively, the same as `Vec<T>`. Sending
// the vector sends the items, the allocator and the policy, all of which are `Send`.
unsafe impl<T: Send, A: Allocator + Send, P: GrowthPolicy + Send> Send for GrowVec<T, A, P> {}

// SAFETY: Shared access only hands out shared references to the items, the allocator and the
// policy, all of which are `Sync`.
unsafe impl<T: Sync, A: Allocator + Sync, P: GrowthPolicy + Sync> Sync for GrowVec<T, A, P> {}

impl<T, A: Allocator + Default, P: GrowthPolicy + Default> Default for GrowVec<T, A, P> {
    fn default() -> Self {
        Self::with_policy_in(P::default(), A::default())
    }
}

impl<T: Clone, A: Allocator, P: GrowthPolicy + Clone> Clone for GrowVec<T, A, P> {
    /// Copies the items into storage from the allocator chosen by
    /// [`Allocator::select_on_copy()`].
    fn clone(&self) -> Self {
        self.clone_with_allocator(self.allocator.select_on_copy())
    }

    /// Replaces the contents with copies of the items in `source`.
    ///
    /// If [`A::PROPAGATE_ON_COPY_ASSIGNMENT`][Allocator::PROPAGATE_ON_COPY_ASSIGNMENT] is set,
    /// `self` adopts the allocator of `source`, releasing its own storage first if the new
    /// allocator cannot free it. Otherwise the existing storage is reused where possible. The
    /// growth policy of `self` is kept.
    fn clone_from(&mut self, source: &Self) {
        if A::PROPAGATE_ON_COPY_ASSIGNMENT {
            if !source.allocator.can_free_for(&self.allocator) {
                self.clear();

                // SAFETY: No items are live after `clear()`.
                unsafe {
                    self.release_storage();
                }
            }

            self.allocator = source.allocator.clone();
        }

        self.assign_slice(source.as_slice());
    }
}

impl<T: Debug, A: Allocator, P: GrowthPolicy> Debug for GrowVec<T, A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: PartialEq, A: Allocator, P: GrowthPolicy> PartialEq for GrowVec<T, A, P> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: Allocator, P: GrowthPolicy> Eq for GrowVec<T, A, P> {}

impl<T: Hash, A: Allocator, P: GrowthPolicy> Hash for GrowVec<T, A, P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<T, A: Allocator, P: GrowthPolicy> Deref for GrowVec<T, A, P> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T, A: Allocator, P: GrowthPolicy> DerefMut for GrowVec<T, A, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T, A: Allocator, P: GrowthPolicy> AsRef<[T]> for GrowVec<T, A, P> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: Allocator, P: GrowthPolicy> AsMut<[T]> for GrowVec<T, A, P> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, A: Allocator, P: GrowthPolicy> Index<usize> for GrowVec<T, A, P> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        debug_assert!(
            index < self.len,
            "index {index} out of bounds for GrowVec of length {}",
            self.len
        );

        self.as_slice()
            .get(index)
            .unwrap_or_else(|| panic!("index {index} out of bounds for GrowVec"))
    }
}

impl<T, A: Allocator, P: GrowthPolicy> IndexMut<usize> for GrowVec<T, A, P> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        debug_assert!(
            index < self.len,
            "index {index} out of bounds for GrowVec of length {}",
            self.len
        );

        self.as_mut_slice()
            .get_mut(index)
            .unwrap_or_else(|| panic!("index {index} out of bounds for GrowVec"))
    }
}

impl<T, A: Allocator, P: GrowthPolicy> Extend<T> for GrowVec<T, A, P> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();

        if !self.can_store(lower) {
            let required = self
                .len
                .checked_add(lower)
                .unwrap_or_else(|| capacity_overflow(usize::MAX, self.max_size()));

            let new_capacity = self.grown_capacity(&self.policy, required);
            self.reallocate(new_capacity);
        }

        for value in iter {
            self.push(value);
        }
    }
}

impl<T> FromIterator<T> for GrowVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut result = Self::new();
        result.extend(iter);
        result
    }
}

impl<T: Clone> From<&[T]> for GrowVec<T> {
    fn from(items: &[T]) -> Self {
        Self::from_slice(items)
    }
}

impl<'a, T, A: Allocator, P: GrowthPolicy> IntoIterator for &'a GrowVec<T, A, P> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T, A: Allocator, P: GrowthPolicy> IntoIterator for &'a mut GrowVec<T, A, P> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    #![allow(
        clippy::indexing_slicing,
        clippy::cast_possible_truncation,
        reason = "we do not need to worry about these things when writing test code"
    )]

    use std::alloc::Layout;
    use std::cell::{Cell, RefCell};
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::rc::Rc;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::{ExactFit, GeometricRatio};

    assert_impl_all!(GrowVec<u32>: Send, Sync, Clone, Default);
    assert_not_impl_any!(GrowVec<Rc<u32>>: Send, Sync);

    #[derive(Debug, Default)]
    struct Stats {
        allocations: Cell<usize>,
        deallocations: Cell<usize>,
        live_bytes: Cell<usize>,
    }

    /// Counts the calls it receives. Instances with different `id`s cannot free each other's
    /// memory. The propagation constants are selected by the const parameters.
    #[derive(Clone, Debug, Default)]
    struct Counting<const ON_COPY: bool = false, const ON_MOVE: bool = true> {
        id: u32,
        stats: Rc<Stats>,
    }

    impl<const ON_COPY: bool, const ON_MOVE: bool> Counting<ON_COPY, ON_MOVE> {
        fn new(id: u32) -> Self {
            Self {
                id,
                stats: Rc::new(Stats::default()),
            }
        }

        fn allocations(&self) -> usize {
            self.stats.allocations.get()
        }

        fn deallocations(&self) -> usize {
            self.stats.deallocations.get()
        }

        fn live_bytes(&self) -> usize {
            self.stats.live_bytes.get()
        }
    }

    impl<const ON_COPY: bool, const ON_MOVE: bool> PartialEq for Counting<ON_COPY, ON_MOVE> {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl<const ON_COPY: bool, const ON_MOVE: bool> Allocator for Counting<ON_COPY, ON_MOVE> {
        const PROPAGATE_ON_COPY_ASSIGNMENT: bool = ON_COPY;
        const PROPAGATE_ON_MOVE_ASSIGNMENT: bool = ON_MOVE;

        fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
            self.stats.allocations.set(self.allocations() + 1);
            self.stats.live_bytes.set(self.live_bytes() + layout.size());
            Global.allocate(layout)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            self.stats.deallocations.set(self.deallocations() + 1);
            self.stats.live_bytes.set(self.live_bytes() - layout.size());

            // SAFETY: Forwarding the caller's guarantees, we allocated through `Global`.
            unsafe {
                Global.deallocate(ptr, layout);
            }
        }
    }

    /// Panics when cloned once the shared budget of clones runs out.
    #[derive(Debug)]
    struct Fragile {
        value: u32,
        clones_left: Rc<Cell<usize>>,
        drops: Rc<Cell<usize>>,
    }

    impl Fragile {
        fn new(value: u32, clones_left: &Rc<Cell<usize>>, drops: &Rc<Cell<usize>>) -> Self {
            Self {
                value,
                clones_left: Rc::clone(clones_left),
                drops: Rc::clone(drops),
            }
        }
    }

    impl Clone for Fragile {
        fn clone(&self) -> Self {
            let left = self.clones_left.get();
            assert!(left > 0, "clone budget exhausted");
            self.clones_left.set(left - 1);

            Self {
                value: self.value,
                clones_left: Rc::clone(&self.clones_left),
                drops: Rc::clone(&self.drops),
            }
        }
    }

    impl Drop for Fragile {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn values(vec: &GrowVec<Fragile>) -> Vec<u32> {
        vec.iter().map(|item| item.value).collect()
    }

    #[test]
    fn insert_into_full_vector_reallocates_once() {
        let allocator = Counting::<false, true>::new(1);
        let mut vec = GrowVec::<i32, _>::new_in(allocator.clone());

        vec.reserve(4);
        for value in 1..=4 {
            vec.push(value);
        }
        assert_eq!(allocator.allocations(), 1);

        vec.insert(1, 9);

        assert_eq!(allocator.allocations(), 2);
        assert_eq!(vec.as_slice(), &[1, 9, 2, 3, 4]);
        assert_eq!(vec.capacity(), 8);
    }

    #[test]
    fn reserve_then_push_does_not_reallocate() {
        let allocator = Counting::<false, true>::new(1);
        let mut vec = GrowVec::<u64, _>::new_in(allocator.clone());

        vec.reserve(100);
        for value in 0..100 {
            vec.push(value);
        }

        assert_eq!(allocator.allocations(), 1);
        assert_eq!(vec.capacity(), 100);
    }

    #[test]
    fn reserve_smaller_is_noop() {
        let mut vec = GrowVec::<u8>::with_capacity(10);

        vec.reserve(5);
        assert_eq!(vec.capacity(), 10);

        assert_eq!(vec.try_reserve(10), Ok(()));
        assert_eq!(vec.capacity(), 10);
    }

    #[test]
    fn geometric_growth_reallocates_logarithmically() {
        let allocator = Counting::<false, true>::new(1);
        let mut vec = GrowVec::<u32, _>::new_in(allocator.clone());
        let mut last_capacity = 0;

        for value in 0..1000 {
            vec.push(value);
            assert!(vec.capacity() >= last_capacity);
            last_capacity = vec.capacity();
        }

        // 2, 4, 8, ..., 1024
        assert_eq!(allocator.allocations(), 10);
        assert_eq!(vec.capacity(), 1024);
    }

    #[test]
    fn repeated_extend_grows_geometrically() {
        let allocator = Counting::<false, true>::new(1);
        let mut vec = GrowVec::<u32, _>::new_in(allocator.clone());

        for value in 0..1000 {
            vec.extend([value]);
        }

        // Same growth sequence as individual pushes.
        assert_eq!(allocator.allocations(), 10);
        assert_eq!(vec.capacity(), 1024);
        assert!(vec.iter().copied().eq(0..1000));
    }

    #[test]
    fn extend_with_large_hint_grows_to_required() {
        let mut vec = GrowVec::<u32>::with_capacity(4);
        vec.extend([1, 2, 3]);

        vec.extend(0..100);

        // Doubling 4 is not enough, so the required capacity wins.
        assert_eq!(vec.capacity(), 103);
        assert_eq!(vec.len(), 103);
    }

    #[test]
    fn exact_fit_grows_by_one() {
        let mut vec = GrowVec::with_policy(ExactFit);

        for value in 0..5 {
            vec.push(value);
            assert_eq!(vec.capacity(), vec.len());
        }
    }

    #[test]
    fn ratio_policy_grows_by_half() {
        let mut vec = GrowVec::with_policy(GeometricRatio::<3, 2>);
        vec.reserve(4);

        for value in 0..5 {
            vec.push(value);
        }

        assert_eq!(vec.capacity(), 6);
    }

    #[test]
    fn push_with_policy_overrides_once() {
        let mut vec = GrowVec::new();
        vec.push(1);
        vec.push(2);
        assert_eq!(vec.capacity(), 2);

        vec.push_with_policy(3, &Geometric::<8>);
        assert_eq!(vec.capacity(), 16);
    }

    #[test]
    fn try_reserve_reports_overflow() {
        let mut vec = GrowVec::<u64>::new();
        let max = vec.max_size();

        assert_eq!(
            vec.try_reserve(max + 1),
            Err(Error::CapacityOverflow {
                requested: max + 1,
                max
            })
        );
        assert_eq!(vec.capacity(), 0);
    }

    #[test]
    #[should_panic]
    fn reserve_panics_on_overflow() {
        let mut vec = GrowVec::<u64>::new();
        vec.reserve(usize::MAX);
    }

    #[test]
    fn max_size_respects_item_size() {
        assert_eq!(GrowVec::<u8>::new().max_size(), isize::MAX.unsigned_abs());
        assert_eq!(
            GrowVec::<u64>::new().max_size(),
            isize::MAX.unsigned_abs() / 8
        );
        assert_eq!(GrowVec::<()>::new().max_size(), usize::MAX);
    }

    #[test]
    fn shrink_to_fit_releases_or_trims() {
        let allocator = Counting::<false, true>::new(1);
        let mut vec = GrowVec::<u32, _>::with_capacity_in(16, allocator.clone());
        vec.push(1);
        vec.push(2);

        vec.shrink_to_fit();
        assert_eq!(vec.capacity(), 2);
        assert_eq!(vec.as_slice(), &[1, 2]);

        vec.clear();
        vec.shrink_to_fit();
        assert_eq!(vec.capacity(), 0);
        assert_eq!(allocator.live_bytes(), 0);
        assert_eq!(allocator.allocations(), allocator.deallocations());
    }

    #[test]
    fn drop_releases_storage_and_items() {
        let allocator = Counting::<false, true>::new(1);
        let clones = Rc::new(Cell::new(0));
        let drops = Rc::new(Cell::new(0));

        {
            let mut vec = GrowVec::<Fragile, _>::new_in(allocator.clone());
            for value in 0..10 {
                vec.push(Fragile::new(value, &clones, &drops));
            }
        }

        assert_eq!(drops.get(), 10);
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn insert_count_in_place_and_reallocating() {
        let mut vec = GrowVec::with_capacity(10);
        vec.extend([1, 2, 3]);

        vec.insert_count(1, 2, &7);
        assert_eq!(vec.as_slice(), &[1, 7, 7, 2, 3]);
        assert_eq!(vec.capacity(), 10);

        vec.insert_count(5, 10, &0);
        assert_eq!(vec.len(), 15);
        assert_eq!(vec.capacity(), 15);
        assert_eq!(&vec.as_slice()[..6], &[1, 7, 7, 2, 3, 0]);

        vec.insert_count(0, 0, &5);
        assert_eq!(vec.len(), 15);
    }

    #[test]
    fn insert_slice_and_iter() {
        let mut vec = GrowVec::from_slice(&[1, 5]);

        vec.insert_slice(1, &[2, 3]);
        assert_eq!(vec.as_slice(), &[1, 2, 3, 5]);

        vec.insert_iter(3, [4]);
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4, 5]);

        vec.insert_iter(0, iter::empty());
        assert_eq!(vec.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    #[should_panic]
    fn insert_past_end_panics() {
        let mut vec = GrowVec::from_slice(&[1]);
        vec.insert(2, 5);
    }

    #[test]
    fn panicking_clone_during_reallocating_insert_restores_vector() {
        let allocator = Counting::<false, true>::new(1);
        let clones = Rc::new(Cell::new(2));
        let drops = Rc::new(Cell::new(0));

        let mut vec = GrowVec::<Fragile, _>::new_in(allocator.clone());
        vec.reserve(3);
        for value in 0..3 {
            vec.push(Fragile::new(value, &clones, &drops));
        }

        let template = Fragile::new(9, &clones, &drops);
        let result = catch_unwind(AssertUnwindSafe(|| {
            vec.insert_count(1, 5, &template);
        }));

        assert!(result.is_err());
        assert_eq!(vec.len(), 3);
        assert_eq!(vec.capacity(), 3);
        assert!(vec.iter().map(|item| item.value).eq(0..3));

        // The two successful clones were dropped and the replacement buffer was released.
        assert_eq!(drops.get(), 2);
        assert_eq!(allocator.allocations(), 2);
        assert_eq!(allocator.deallocations(), 1);
    }

    #[test]
    fn panicking_clone_during_in_place_insert_restores_vector() {
        let clones = Rc::new(Cell::new(1));
        let drops = Rc::new(Cell::new(0));

        let mut vec = GrowVec::with_capacity(10);
        for value in 0..4 {
            vec.push(Fragile::new(value, &clones, &drops));
        }

        let template = Fragile::new(9, &clones, &drops);
        let result = catch_unwind(AssertUnwindSafe(|| {
            vec.insert_count(1, 3, &template);
        }));

        assert!(result.is_err());
        assert_eq!(values(&vec), vec![0, 1, 2, 3]);
        assert_eq!(drops.get(), 1);
        assert!(vec.is_consistent());
    }

    #[test]
    fn panicking_iterator_during_insert_iter_restores_vector() {
        let mut vec = GrowVec::from_slice(&[1, 2, 3]);

        let result = catch_unwind(AssertUnwindSafe(|| {
            vec.insert_iter(
                1,
                (10..20).map(|value| {
                    assert!(value < 15, "iterator failure");
                    value
                }),
            );
        }));

        assert!(result.is_err());
        assert_eq!(vec.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn erase_shifts_and_drops() {
        let clones = Rc::new(Cell::new(0));
        let drops = Rc::new(Cell::new(0));

        let mut vec = GrowVec::new();
        for value in 0..6 {
            vec.push(Fragile::new(value, &clones, &drops));
        }

        assert_eq!(vec.erase(0), 0);
        assert_eq!(vec.erase_range(1..3), 1);
        assert_eq!(values(&vec), vec![1, 4, 5]);
        assert_eq!(drops.get(), 3);

        assert_eq!(vec.erase_range(2..2), 2);
        assert_eq!(vec.len(), 3);

        assert_eq!(vec.erase_range(..), 0);
        assert!(vec.is_empty());
        assert_eq!(drops.get(), 6);
    }

    #[test]
    #[should_panic]
    fn erase_range_past_end_panics() {
        let mut vec = GrowVec::from_slice(&[1, 2]);
        vec.erase_range(1..5);
    }

    #[test]
    fn remove_and_pop_return_items() {
        let mut vec: GrowVec<String> = ["a", "b", "c"].into_iter().map(String::from).collect();

        assert_eq!(vec.remove(1), "b");
        assert_eq!(vec.pop().as_deref(), Some("c"));
        assert_eq!(vec.pop().as_deref(), Some("a"));
        assert_eq!(vec.pop(), None);
    }

    #[test]
    fn at_reports_out_of_range() {
        let mut vec = GrowVec::from_slice(&[10, 20]);

        assert_eq!(vec.at(1), Ok(&20));
        assert_eq!(vec.at(2), Err(Error::OutOfRange { index: 2, len: 2 }));

        *vec.at_mut(0).unwrap() = 11;
        assert_eq!(vec.front(), Some(&11));
        assert_eq!(vec.back(), Some(&20));
    }

    #[test]
    fn assign_rebuilds_with_exact_capacity() {
        let allocator = Counting::<false, true>::new(1);
        let mut vec = GrowVec::<u32, _>::from_elem_in(2, &1, allocator.clone());

        vec.assign(5, &3);
        assert_eq!(vec.as_slice(), &[3; 5]);
        assert_eq!(vec.capacity(), 5);

        vec.assign(1, &4);
        assert_eq!(vec.as_slice(), &[4]);
        assert_eq!(vec.capacity(), 5);

        vec.assign_iter(0..3);
        assert_eq!(vec.as_slice(), &[0, 1, 2]);

        assert_eq!(allocator.live_bytes(), 5 * 4);
    }

    #[test]
    fn truncate_and_pop_back_drop_items() {
        let clones = Rc::new(Cell::new(0));
        let drops = Rc::new(Cell::new(0));

        let mut vec = GrowVec::new();
        for value in 0..5 {
            vec.push(Fragile::new(value, &clones, &drops));
        }

        vec.truncate(10);
        assert_eq!(drops.get(), 0);

        vec.truncate(3);
        assert_eq!(drops.get(), 2);

        vec.pop_back();
        assert_eq!(drops.get(), 3);
        assert_eq!(values(&vec), vec![0, 1]);
    }

    #[test]
    fn clone_uses_select_on_copy() {
        let allocator = Counting::<false, true>::new(3);
        let vec = GrowVec::<u32, _>::from_slice_in(&[1, 2, 3], allocator.clone());

        let copy = vec.clone();

        assert_eq!(copy, vec);
        assert_eq!(copy.allocator().id, 3);
        assert_eq!(allocator.allocations(), 2);
    }

    #[test]
    fn clone_from_without_propagation_keeps_allocator() {
        let source = GrowVec::<u32, _>::from_slice_in(&[1, 2, 3], Counting::<false, true>::new(1));
        let target_allocator = Counting::<false, true>::new(2);
        let mut target = GrowVec::<u32, _>::with_capacity_in(8, target_allocator.clone());

        target.clone_from(&source);

        assert_eq!(target.as_slice(), &[1, 2, 3]);
        assert_eq!(target.allocator().id, 2);
        assert_eq!(target.capacity(), 8);
        assert_eq!(target_allocator.allocations(), 1);
    }

    #[test]
    fn clone_from_with_propagation_adopts_allocator() {
        let source_allocator = Counting::<true, true>::new(1);
        let source = GrowVec::<u32, _>::from_slice_in(&[1, 2, 3], source_allocator.clone());
        let target_allocator = Counting::<true, true>::new(2);
        let mut target = GrowVec::<u32, _>::with_capacity_in(8, target_allocator.clone());

        target.clone_from(&source);

        assert_eq!(target.as_slice(), &[1, 2, 3]);
        assert_eq!(target.allocator().id, 1);

        // The old storage went back to the allocator that handed it out.
        assert_eq!(target_allocator.live_bytes(), 0);
        assert_eq!(source_allocator.allocations(), 2);
    }

    #[test]
    fn move_assign_with_propagation_takes_buffer() {
        let first = Counting::<false, true>::new(1);
        let second = Counting::<false, true>::new(2);

        let mut target = GrowVec::<u32, _>::from_slice_in(&[9], first.clone());
        let mut source = GrowVec::<u32, _>::from_slice_in(&[1, 2, 3], second.clone());
        let source_ptr = source.as_ptr();

        target.move_assign(&mut source);

        assert_eq!(target.as_slice(), &[1, 2, 3]);
        assert_eq!(target.as_ptr(), source_ptr);
        assert_eq!(target.allocator().id, 2);
        assert!(source.is_empty());
        assert_eq!(source.capacity(), 0);
        assert_eq!(first.live_bytes(), 0);
    }

    #[test]
    fn move_assign_without_propagation_moves_items() {
        let first = Counting::<false, false>::new(1);
        let second = Counting::<false, false>::new(2);

        let mut target = GrowVec::<String, _>::new_in(first.clone());
        let mut source = GrowVec::<String, _>::new_in(second.clone());
        source.push("a".to_string());
        source.push("b".to_string());

        target.move_assign(&mut source);

        assert_eq!(target.as_slice(), &["a".to_string(), "b".to_string()]);
        assert_eq!(target.allocator().id, 1);
        assert!(source.is_empty());
        assert!(source.capacity() >= 2);

        drop(source);
        assert_eq!(second.live_bytes(), 0);

        drop(target);
        assert_eq!(first.live_bytes(), 0);
    }

    #[test]
    fn move_assign_without_propagation_adopts_buffer_from_equal_allocator() {
        let shared = Counting::<false, false>::new(1);

        let mut target = GrowVec::<u32, _>::new_in(shared.clone());
        let mut source = GrowVec::<u32, _>::from_slice_in(&[4, 5], shared.clone());
        let source_ptr = source.as_ptr();

        target.move_assign(&mut source);

        assert_eq!(target.as_ptr(), source_ptr);
        assert_eq!(target.as_slice(), &[4, 5]);
    }

    #[test]
    fn zero_sized_items_never_allocate() {
        let allocator = Counting::<false, true>::new(1);
        let mut vec = GrowVec::<(), _>::new_in(allocator.clone());

        for _ in 0..100 {
            vec.push(());
        }
        vec.insert_count(50, 10, &());
        vec.erase_range(0..20);

        assert_eq!(vec.len(), 90);
        assert_eq!(allocator.live_bytes(), 0);
    }

    struct Logged(u32, Rc<RefCell<Vec<u32>>>);

    impl Drop for Logged {
        fn drop(&mut self) {
            self.1.borrow_mut().push(self.0);
        }
    }

    #[test]
    fn drop_order_follows_items() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut vec = GrowVec::new();
        for value in 0..3 {
            vec.push(Logged(value, Rc::clone(&log)));
        }
        drop(vec);

        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn consistent_through_lifecycle() {
        let mut vec = GrowVec::<u16>::new();
        assert!(vec.is_consistent());

        vec.extend(0..50);
        assert!(vec.is_consistent());

        vec.erase_range(10..40);
        vec.shrink_to_fit();
        assert!(vec.is_consistent());

        vec.clear();
        vec.shrink_to_fit();
        assert!(vec.is_consistent());
    }
}
