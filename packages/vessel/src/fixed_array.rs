use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::ops::{Bound, Deref, DerefMut, Index, IndexMut, RangeBounds};
use std::{array, mem, slice};

/// An in-place array of exactly `N` slots holding up to `N` live items.
///
/// The array never allocates. Operations that would exceed the capacity saturate instead of
/// failing: excess items are silently dropped and insertion positions past the end are clamped
/// to the end.
///
/// Every slot is value-initialized with `T::default()` when the array is created. Slots past
/// [`len()`][Self::len] are logically absent but still hold a value: either the default or
/// whatever was last stored there before it was popped or erased. Those values are dropped when
/// they are overwritten or when the array itself is dropped.
///
/// # Example
///
/// ```
/// use vessel::FixedArray;
///
/// let mut array = FixedArray::<u32, 4>::new();
///
/// for value in 0..10 {
///     array.push_back(value);
/// }
///
/// // Pushes past the capacity are dropped.
/// assert_eq!(array.as_slice(), &[0, 1, 2, 3]);
///
/// array.erase(1);
/// array.insert_count(0, 3, &9);
///
/// // Only one slot was free, so only one copy was inserted.
/// assert_eq!(array.as_slice(), &[9, 0, 2, 3]);
/// ```
pub struct FixedArray<T, const N: usize> {
    /// All `N` slots, always initialized. Only `..len` is visible to callers.
    data: [T; N],

    len: usize,
}

impl<T: Default, const N: usize> FixedArray<T, N> {
    /// Creates an empty array with every slot holding `T::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: array::from_fn(|_| T::default()),
            len: 0,
        }
    }

    /// Creates an array holding `count` clones of `value`, saturating at `N`.
    #[must_use]
    pub fn from_elem(count: usize, value: &T) -> Self
    where
        T: Clone,
    {
        let mut result = Self::new();
        result.assign(count, value);
        result
    }

    /// Creates an array holding `count` default values, saturating at `N`.
    #[must_use]
    pub fn with_len(count: usize) -> Self {
        let mut result = Self::new();
        result.len = count.min(N);
        result
    }

    /// Replaces the contents with `count` clones of `value`, saturating at `N`.
    ///
    /// Slots past the new length are reset to `T::default()`.
    pub fn assign(&mut self, count: usize, value: &T)
    where
        T: Clone,
    {
        let new_len = count.min(N);

        for (index, slot) in self.data.iter_mut().enumerate() {
            *slot = if index < new_len {
                value.clone()
            } else {
                T::default()
            };
        }

        self.len = new_len;
    }

    /// Replaces the contents with `count` default values, saturating at `N`.
    ///
    /// Every slot is reset to `T::default()`.
    pub fn assign_default(&mut self, count: usize) {
        self.data.fill_with(T::default);
        self.len = count.min(N);
    }

    /// Removes every item that lies past `new_len`.
    ///
    /// Does nothing if the array is already shorter.
    pub fn truncate(&mut self, new_len: usize) {
        self.len = self.len.min(new_len);
    }

    /// Appends `count` default values, saturating at `N`.
    ///
    /// Returns the index of the first appended item, or `len()` if the array was already full.
    pub fn append_default(&mut self, count: usize) -> usize {
        let start = self.len;
        let appended = count.min(self.remaining());

        for slot in self.slots_mut(start, appended) {
            *slot = T::default();
        }

        self.len = self.len.wrapping_add(appended);
        start
    }
}

impl<T, const N: usize> FixedArray<T, N> {
    /// The number of live items.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether there are no live items.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether every slot holds a live item.
    #[must_use]
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= N
    }

    /// The number of slots, which is always `N`.
    #[must_use]
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The largest length the array can reach, which is always `N`.
    #[must_use]
    #[inline]
    pub const fn max_size(&self) -> usize {
        N
    }

    #[inline]
    fn remaining(&self) -> usize {
        N.wrapping_sub(self.len)
    }

    /// The live items as a slice.
    #[must_use]
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `len <= N` is maintained by every mutation.
        unsafe { self.data.get_unchecked(..self.len) }
    }

    /// The live items as a mutable slice.
    #[must_use]
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: `len <= N` is maintained by every mutation.
        unsafe { self.data.get_unchecked_mut(..self.len) }
    }

    fn slots_mut(&mut self, start: usize, count: usize) -> &mut [T] {
        self.data
            .get_mut(start..start.wrapping_add(count))
            .expect("callers truncate ranges to the capacity")
    }

    /// The first live item.
    ///
    /// The array must not be empty. This is only checked in debug builds.
    #[must_use]
    pub fn front(&self) -> &T {
        debug_assert!(self.len > 0, "front() called on an empty FixedArray");
        self.slot(0)
    }

    /// The first live item, mutably.
    ///
    /// The array must not be empty. This is only checked in debug builds.
    #[must_use]
    pub fn front_mut(&mut self) -> &mut T {
        debug_assert!(self.len > 0, "front_mut() called on an empty FixedArray");
        self.slot_mut(0)
    }

    /// The last live item.
    ///
    /// The array must not be empty. This is only checked in debug builds.
    #[must_use]
    pub fn back(&self) -> &T {
        debug_assert!(self.len > 0, "back() called on an empty FixedArray");
        self.slot(self.len.saturating_sub(1))
    }

    /// The last live item, mutably.
    ///
    /// The array must not be empty. This is only checked in debug builds.
    #[must_use]
    pub fn back_mut(&mut self) -> &mut T {
        debug_assert!(self.len > 0, "back_mut() called on an empty FixedArray");
        self.slot_mut(self.len.saturating_sub(1))
    }

    fn slot(&self, index: usize) -> &T {
        self.data
            .get(index)
            .unwrap_or_else(|| panic!("slot {index} is out of bounds of FixedArray of {N}"))
    }

    fn slot_mut(&mut self, index: usize) -> &mut T {
        self.data
            .get_mut(index)
            .unwrap_or_else(|| panic!("slot {index} is out of bounds of FixedArray of {N}"))
    }

    /// Appends `value` if there is room.
    ///
    /// Returns the newly stored item. If the array is full, `value` is dropped, the length is
    /// unchanged and the last item is returned instead. Returns `None` only when `N == 0`.
    pub fn emplace_back(&mut self, value: T) -> Option<&mut T> {
        if self.len < N {
            // SAFETY: We just checked that there is a free slot.
            return Some(unsafe { self.push_back_unchecked(value) });
        }

        self.data.last_mut()
    }

    /// Appends `value` if there is room, otherwise drops it.
    pub fn push_back(&mut self, value: T) {
        _ = self.emplace_back(value);
    }

    /// Appends `value` without checking for room.
    ///
    /// # Safety
    ///
    /// The array must not be full.
    pub unsafe fn push_back_unchecked(&mut self, value: T) -> &mut T {
        debug_assert!(self.len < N, "push_back_unchecked() called on a full FixedArray");

        let index = self.len;
        self.len = index.wrapping_add(1);

        // SAFETY: The caller guarantees that `index < N`.
        let slot = unsafe { self.data.get_unchecked_mut(index) };
        *slot = value;
        slot
    }

    /// Removes the last item, if any.
    ///
    /// The item stays in its slot until overwritten, it is not dropped here.
    pub fn pop_back(&mut self) {
        self.len = self.len.saturating_sub(1);
    }

    /// Removes the last item without checking for emptiness.
    ///
    /// # Safety
    ///
    /// The array must not be empty.
    pub unsafe fn pop_back_unchecked(&mut self) {
        debug_assert!(self.len > 0, "pop_back_unchecked() called on an empty FixedArray");
        self.len = self.len.wrapping_sub(1);
    }

    /// Removes the first item, if any, shifting the rest towards the front.
    ///
    /// This is O(len).
    pub fn pop_front(&mut self) {
        if self.len > 0 {
            // SAFETY: Not empty, guarded above.
            unsafe { self.pop_front_unchecked() }
        }
    }

    /// Removes the first item without checking for emptiness.
    ///
    /// # Safety
    ///
    /// The array must not be empty.
    pub unsafe fn pop_front_unchecked(&mut self) {
        debug_assert!(self.len > 0, "pop_front_unchecked() called on an empty FixedArray");
        self.as_mut_slice().rotate_left(1);
        self.len = self.len.wrapping_sub(1);
    }

    /// Removes all items. Nothing is dropped until the slots are reused or the array is dropped.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Inserts `value` at `index`, shifting later items back by one.
    ///
    /// An `index` past the end is clamped to the end. If the array is full, `value` is dropped.
    ///
    /// Returns the index of the inserted item, or `len()` if nothing was inserted.
    pub fn insert(&mut self, index: usize, value: T) -> usize {
        if self.is_full() {
            return self.len;
        }

        let index = index.min(self.len);
        let old_len = self.len;

        // SAFETY: Not full, guarded above.
        unsafe {
            self.push_back_unchecked(value);
        }

        self.live_mut(index, old_len.wrapping_add(1)).rotate_right(1);
        index
    }

    /// Inserts `count` clones of `value` at `index`.
    ///
    /// This uses the [backward shifting][Self::insert_backwards] strategy.
    pub fn insert_count(&mut self, index: usize, count: usize, value: &T) -> usize
    where
        T: Clone,
    {
        self.insert_backwards(index, count, value)
    }

    /// Inserts `count` clones of `value` at `index` by first moving the suffix into the free
    /// slots at the back and then filling the gap.
    ///
    /// This performs the fewest moves when inserting a few items near the end. `count` is
    /// truncated to the free capacity and `index` is clamped to the end.
    ///
    /// Returns the index of the first inserted item, or `len()` if the array was full.
    pub fn insert_backwards(&mut self, index: usize, count: usize, value: &T) -> usize
    where
        T: Clone,
    {
        if self.is_full() {
            return self.len;
        }

        let index = index.min(self.len);
        let count = count.min(self.remaining());

        for from in (index..self.len).rev() {
            self.data.swap(from, from.wrapping_add(count));
        }

        self.slots_mut(index, count).fill(value.clone());
        self.len = self.len.wrapping_add(count);
        index
    }

    /// Inserts `count` clones of `value` at `index` by first appending them and then rotating
    /// them into place.
    ///
    /// The result is identical to [`insert_backwards()`][Self::insert_backwards]. This variant
    /// does a contiguous bulk append followed by a three-reversal rotation, which is cheaper
    /// when many items are inserted far from the end.
    ///
    /// Returns the index of the first inserted item, or `len()` if the array was full.
    pub fn insert_rotate(&mut self, index: usize, count: usize, value: &T) -> usize
    where
        T: Clone,
    {
        if self.is_full() {
            return self.len;
        }

        let index = index.min(self.len);
        let old_len = self.len;
        let count = count.min(self.remaining());

        self.slots_mut(old_len, count).fill(value.clone());
        self.len = old_len.wrapping_add(count);

        rotate_by_reversal(self.live_mut(index, self.len), old_len.wrapping_sub(index));
        index
    }

    /// Inserts the items produced by `iter` at `index`, dropping whatever does not fit.
    ///
    /// Returns the index of the first inserted item, or `len()` if the array was full.
    pub fn insert_iter<I>(&mut self, index: usize, iter: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        if self.is_full() {
            return self.len;
        }

        let index = index.min(self.len);
        let old_len = self.len;

        self.append_iter(iter);

        rotate_by_reversal(self.live_mut(index, self.len), old_len.wrapping_sub(index));
        index
    }

    fn live_mut(&mut self, start: usize, end: usize) -> &mut [T] {
        self.as_mut_slice()
            .get_mut(start..end)
            .expect("callers pass a range within the live items")
    }

    /// Appends `count` clones of `value`, saturating at `N`.
    ///
    /// Returns the index of the first appended item, or `len()` if the array was already full.
    pub fn append(&mut self, count: usize, value: &T) -> usize
    where
        T: Clone,
    {
        let start = self.len;
        let appended = count.min(self.remaining());

        self.slots_mut(start, appended).fill(value.clone());
        self.len = start.wrapping_add(appended);
        start
    }

    /// Appends the items produced by `iter`, stopping when the array is full.
    ///
    /// Returns the index of the first appended item, or `len()` if the array was already full.
    pub fn append_iter<I>(&mut self, iter: I) -> usize
    where
        I: IntoIterator<Item = T>,
    {
        let start = self.len;

        for value in iter.into_iter().take(self.remaining()) {
            // SAFETY: `take()` limits us to the free slots.
            unsafe {
                self.push_back_unchecked(value);
            }
        }

        start
    }

    /// Replaces the contents with the items produced by `iter`, dropping whatever does not fit.
    pub fn assign_iter<I>(&mut self, iter: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.len = 0;
        self.append_iter(iter);
    }

    /// Removes the item at `index`, shifting later items towards the front.
    ///
    /// Returns `index`, which now refers to the item that followed the removed one. An `index`
    /// that does not refer to a live item leaves the array unchanged and returns `len()`.
    pub fn erase(&mut self, index: usize) -> usize {
        if index >= self.len {
            return self.len;
        }

        self.live_mut(index, self.len).rotate_left(1);
        self.len = self.len.wrapping_sub(1);
        index
    }

    /// Removes the items in `range`, shifting later items towards the front.
    ///
    /// An empty range is a no-op that returns its start. A range that is not fully within the
    /// live items leaves the array unchanged and returns `len()`. Otherwise returns the start of
    /// the range, which now refers to the first item after the removed ones.
    pub fn erase_range<R>(&mut self, range: R) -> usize
    where
        R: RangeBounds<usize>,
    {
        let (start, end) = resolve_range(&range, self.len);

        if start == end {
            return start;
        }

        if start > end || end > self.len {
            return self.len;
        }

        let removed = end.wrapping_sub(start);
        self.live_mut(start, self.len).rotate_left(removed);
        self.len = self.len.wrapping_sub(removed);
        start
    }

    /// Exchanges the entire contents, including the logically absent slots, with `other`.
    pub fn swap_with(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        assert!(
            self.len <= N,
            "FixedArray length {} exceeds its capacity {N}",
            self.len
        );
    }
}

/// Moves `slice[mid..]` in front of `slice[..mid]` using three reversals.
fn rotate_by_reversal<T>(slice: &mut [T], mid: usize) {
    {
        let (head, tail) = slice.split_at_mut(mid);
        head.reverse();
        tail.reverse();
    }

    slice.reverse();
}

/// Converts `range` into a half-open `(start, end)` pair, treating an unbounded end as `len`.
pub(crate) fn resolve_range<R>(range: &R, len: usize) -> (usize, usize)
where
    R: RangeBounds<usize>,
{
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start.saturating_add(1),
        Bound::Unbounded => 0,
    };

    let end = match range.end_bound() {
        Bound::Included(&end) => end.saturating_add(1),
        Bound::Excluded(&end) => end,
        Bound::Unbounded => len,
    };

    (start, end)
}

impl<T: Default, const N: usize> Default for FixedArray<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, const N: usize> Clone for FixedArray<T, N> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            len: self.len,
        }
    }
}

impl<T: Debug, const N: usize> Debug for FixedArray<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: PartialEq, const N: usize> PartialEq for FixedArray<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, const N: usize> Eq for FixedArray<T, N> {}

impl<T: Hash, const N: usize> Hash for FixedArray<T, N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<T, const N: usize> Deref for FixedArray<T, N> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T, const N: usize> DerefMut for FixedArray<T, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<T, const N: usize> AsRef<[T]> for FixedArray<T, N> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, const N: usize> AsMut<[T]> for FixedArray<T, N> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, const N: usize> Index<usize> for FixedArray<T, N> {
    type Output = T;

    /// Access to slots past `len()` is only caught in debug builds. In release builds any slot
    /// below `N` can be read, including logically absent ones.
    fn index(&self, index: usize) -> &Self::Output {
        debug_assert!(
            index < self.len,
            "index {index} out of bounds for FixedArray of length {}",
            self.len
        );
        self.slot(index)
    }
}

impl<T, const N: usize> IndexMut<usize> for FixedArray<T, N> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        debug_assert!(
            index < self.len,
            "index {index} out of bounds for FixedArray of length {}",
            self.len
        );
        self.slot_mut(index)
    }
}

impl<T: Default, const N: usize> FromIterator<T> for FixedArray<T, N> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut result = Self::new();
        result.append_iter(iter);
        result
    }
}

impl<T, const N: usize> Extend<T> for FixedArray<T, N> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.append_iter(iter);
    }
}

impl<T: Default, const N: usize, const M: usize> From<[T; M]> for FixedArray<T, N> {
    fn from(value: [T; M]) -> Self {
        value.into_iter().collect()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a FixedArray<T, N> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a mut FixedArray<T, N> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}
