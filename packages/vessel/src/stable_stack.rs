use std::fmt::{self, Debug};
use std::iter::{self, FusedIterator};
use std::ops::{Index, IndexMut};
use std::slice;

use num_integer::Integer;
use tracing::trace;

/// A stack made of fixed-size blocks whose items never move once stored.
///
/// Storage grows by appending a new block of `N` slots when the current blocks are full. Existing
/// blocks are never reallocated, so a reference obtained from the stack (converted to a pointer
/// to outlive the borrow) stays valid for as long as the stack and its blocks exist, regardless
/// of how many items are pushed afterwards.
///
/// Every slot is initialized with `T::default()` when its block is created and a push assigns
/// into an existing slot.
///
/// # Popped items are not dropped
///
/// [`pop()`][Self::pop] and [`clear()`][Self::clear] only shrink the length. The popped item
/// stays in its slot until it is overwritten by a later push or until the stack is dropped. Types
/// that release resources on drop will hold on to them until then.
///
/// # Example
///
/// ```
/// use vessel::StableStack;
///
/// let mut stack = StableStack::<u64, 4>::new();
///
/// let first: *const u64 = stack.emplace_back(10);
///
/// for value in 0..100 {
///     stack.push(value);
/// }
///
/// // The first item is still where it was.
/// assert_eq!(first, &raw const stack[0]);
/// assert_eq!(stack.block_count(), 26);
/// ```
#[derive(Clone)]
pub struct StableStack<T, const N: usize = 32> {
    /// Boxed individually so that growing the outer `Vec` only moves the box pointers.
    blocks: Vec<Box<[T; N]>>,

    len: usize,
}

impl<T: Default, const N: usize> StableStack<T, N> {
    /// Creates an empty stack. Does not allocate.
    #[must_use]
    pub fn new() -> Self {
        const { assert!(N > 0, "StableStack blocks must hold at least one item") };

        Self {
            blocks: Vec::new(),
            len: 0,
        }
    }

    /// Creates an empty stack with enough blocks for `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut result = Self::new();
        result.reserve(capacity);
        result
    }

    /// Appends `value` and returns a reference to its slot.
    ///
    /// A new block is appended if every existing slot is in use.
    pub fn emplace_back(&mut self, value: T) -> &mut T {
        if self.len == self.capacity() {
            self.append_block();
        }

        let index = self.len;
        self.len = index.wrapping_add(1);

        let slot = self.slot_mut(index);
        *slot = value;
        slot
    }

    /// Appends `value`.
    pub fn push(&mut self, value: T) {
        self.emplace_back(value);
    }

    /// Appends `value`. Same as [`push()`][Self::push].
    pub fn push_back(&mut self, value: T) {
        self.emplace_back(value);
    }

    /// Ensures there are enough blocks for `capacity` items in total. The length is unchanged.
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    pub fn reserve(&mut self, capacity: usize) {
        let required_blocks = capacity.div_ceil(N);

        while self.blocks.len() < required_blocks {
            self.append_block();
        }
    }

    fn append_block(&mut self) {
        let block: Box<[T; N]> = iter::repeat_with(T::default)
            .take(N)
            .collect::<Vec<_>>()
            .into_boxed_slice()
            .try_into()
            .unwrap_or_else(|_| panic!("a block is built from exactly {N} items"));

        self.blocks.push(block);

        trace!(
            blocks = self.blocks.len(),
            capacity = self.capacity(),
            "appended stable stack block"
        );
    }
}

impl<T, const N: usize> StableStack<T, N> {
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

    /// The number of slots in all blocks.
    #[must_use]
    #[inline]
    pub fn capacity(&self) -> usize {
        self.blocks.len().saturating_mul(N)
    }

    /// The number of blocks allocated so far.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Removes the last item by shrinking the length. The item is not dropped.
    ///
    /// Popping an empty stack does nothing.
    pub fn pop(&mut self) {
        self.len = self.len.saturating_sub(1);
    }

    /// Removes the last item. Same as [`pop()`][Self::pop].
    pub fn pop_back(&mut self) {
        self.pop();
    }

    /// Sets the length to zero. No items are dropped and no blocks are released.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The first item.
    ///
    /// The stack must not be empty. This is only checked in debug builds.
    #[must_use]
    pub fn front(&self) -> &T {
        debug_assert!(self.len > 0, "front() called on an empty StableStack");
        self.slot(0)
    }

    /// The first item, mutably.
    ///
    /// The stack must not be empty. This is only checked in debug builds.
    #[must_use]
    pub fn front_mut(&mut self) -> &mut T {
        debug_assert!(self.len > 0, "front_mut() called on an empty StableStack");
        self.slot_mut(0)
    }

    /// The last item.
    ///
    /// The stack must not be empty. This is only checked in debug builds.
    #[must_use]
    pub fn back(&self) -> &T {
        debug_assert!(self.len > 0, "back() called on an empty StableStack");
        self.slot(self.len.saturating_sub(1))
    }

    /// The last item, mutably.
    ///
    /// The stack must not be empty. This is only checked in debug builds.
    #[must_use]
    pub fn back_mut(&mut self) -> &mut T {
        debug_assert!(self.len > 0, "back_mut() called on an empty StableStack");
        self.slot_mut(self.len.saturating_sub(1))
    }

    /// The item on top of the stack. Same as [`back()`][Self::back].
    #[must_use]
    pub fn top(&self) -> &T {
        self.back()
    }

    /// The item on top of the stack, mutably. Same as [`back_mut()`][Self::back_mut].
    #[must_use]
    pub fn top_mut(&mut self) -> &mut T {
        self.back_mut()
    }

    /// The live item at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        (index < self.len).then(|| self.slot(index))
    }

    /// The live item at `index`, if any, mutably.
    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index < self.len {
            Some(self.slot_mut(index))
        } else {
            None
        }
    }

    /// The slot at `index` without any bounds checks.
    ///
    /// # Safety
    ///
    /// `index` must be less than [`capacity()`][Self::capacity].
    #[must_use]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        let (block, offset) = index.div_rem(&N);

        // SAFETY: The caller guarantees `index < capacity`, so `block < blocks.len()`.
        let block = unsafe { self.blocks.get_unchecked(block) };

        // SAFETY: `offset < N` by construction.
        unsafe { block.get_unchecked(offset) }
    }

    /// The slot at `index` without any bounds checks, mutably.
    ///
    /// # Safety
    ///
    /// `index` must be less than [`capacity()`][Self::capacity].
    #[must_use]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        let (block, offset) = index.div_rem(&N);

        // SAFETY: The caller guarantees `index < capacity`, so `block < blocks.len()`.
        let block = unsafe { self.blocks.get_unchecked_mut(block) };

        // SAFETY: `offset < N` by construction.
        unsafe { block.get_unchecked_mut(offset) }
    }

    /// Iterates over the live items from the bottom of the stack to the top.
    pub fn iter(&self) -> Iter<'_, T, N> {
        Iter::new(&self.blocks, self.len)
    }

    /// Iterates mutably over the live items from the bottom of the stack to the top.
    pub fn iter_mut(&mut self) -> IterMut<'_, T, N> {
        IterMut::new(&mut self.blocks, self.len)
    }

    fn slot(&self, index: usize) -> &T {
        let (block, offset) = index.div_rem(&N);

        self.blocks
            .get(block)
            .and_then(|block| block.get(offset))
            .unwrap_or_else(|| panic!("index {index} is beyond the blocks of StableStack"))
    }

    fn slot_mut(&mut self, index: usize) -> &mut T {
        let (block, offset) = index.div_rem(&N);

        self.blocks
            .get_mut(block)
            .and_then(|block| block.get_mut(offset))
            .unwrap_or_else(|| panic!("index {index} is beyond the blocks of StableStack"))
    }
}

impl<T: Default, const N: usize> Default for StableStack<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug, const N: usize> Debug for StableStack<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, const N: usize> Index<usize> for StableStack<T, N> {
    type Output = T;

    /// Returns the slot at `index`, live or not.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`capacity()`][StableStack::capacity].
    fn index(&self, index: usize) -> &Self::Output {
        self.slot(index)
    }
}

impl<T, const N: usize> IndexMut<usize> for StableStack<T, N> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        self.slot_mut(index)
    }
}

impl<T: Default, const N: usize> FromIterator<T> for StableStack<T, N> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut result = Self::new();
        result.extend(iter);
        result
    }
}

impl<T: Default, const N: usize> Extend<T> for StableStack<T, N> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a StableStack<T, N> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a mut StableStack<T, N> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T, N>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// Iterator over the live items of a [`StableStack`], created by [`StableStack::iter()`].
#[derive(Debug)]
pub struct Iter<'a, T, const N: usize> {
    /// Blocks in which every slot is live and that neither end has started on yet.
    blocks: slice::Iter<'a, Box<[T; N]>>,

    front: slice::Iter<'a, T>,
    back: slice::Iter<'a, T>,

    remaining: usize,
}

impl<'a, T, const N: usize> Iter<'a, T, N> {
    fn new(blocks: &'a [Box<[T; N]>], len: usize) -> Self {
        let (full_blocks, partial) = len.div_rem(&N);

        let (blocks, back) = match blocks.get(full_blocks) {
            Some(last) if partial > 0 => (
                blocks.get(..full_blocks),
                last.get(..partial).unwrap_or_default(),
            ),
            _ => (blocks.get(..full_blocks), <&[T]>::default()),
        };

        Self {
            blocks: blocks
                .expect("live items never extend past the allocated blocks")
                .iter(),
            front: slice::Iter::default(),
            back: back.iter(),
            remaining: len,
        }
    }
}

impl<'a, T, const N: usize> Iterator for Iter<'a, T, N> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.front.next() {
                self.remaining = self.remaining.wrapping_sub(1);
                return Some(item);
            }

            let Some(block) = self.blocks.next() else {
                let item = self.back.next()?;
                self.remaining = self.remaining.wrapping_sub(1);
                return Some(item);
            };

            self.front = block.iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, const N: usize> DoubleEndedIterator for Iter<'_, T, N> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.back.next_back() {
                self.remaining = self.remaining.wrapping_sub(1);
                return Some(item);
            }

            let Some(block) = self.blocks.next_back() else {
                let item = self.front.next_back()?;
                self.remaining = self.remaining.wrapping_sub(1);
                return Some(item);
            };

            self.back = block.iter();
        }
    }
}

impl<T, const N: usize> ExactSizeIterator for Iter<'_, T, N> {}

impl<T, const N: usize> FusedIterator for Iter<'_, T, N> {}

/// Mutable iterator over the live items of a [`StableStack`], created by
/// [`StableStack::iter_mut()`].
#[derive(Debug)]
pub struct IterMut<'a, T, const N: usize> {
    /// Blocks in which every slot is live and that neither end has started on yet.
    blocks: slice::IterMut<'a, Box<[T; N]>>,

    front: slice::IterMut<'a, T>,
    back: slice::IterMut<'a, T>,

    remaining: usize,
}

impl<'a, T, const N: usize> IterMut<'a, T, N> {
    fn new(blocks: &'a mut [Box<[T; N]>], len: usize) -> Self {
        let (full_blocks, partial) = len.div_rem(&N);

        let live = blocks
            .get_mut(..full_blocks.saturating_add(usize::from(partial > 0)))
            .expect("live items never extend past the allocated blocks");

        let (blocks, back): (&'a mut [Box<[T; N]>], &'a mut [T]) = if partial > 0 {
            let (last, blocks) = live
                .split_last_mut()
                .expect("a partial block implies at least one block");

            (
                blocks,
                last.get_mut(..partial)
                    .expect("partial is less than the block size"),
            )
        } else {
            (live, <&mut [T]>::default())
        };

        Self {
            blocks: blocks.iter_mut(),
            front: slice::IterMut::default(),
            back: back.iter_mut(),
            remaining: len,
        }
    }
}

impl<'a, T, const N: usize> Iterator for IterMut<'a, T, N> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.front.next() {
                self.remaining = self.remaining.wrapping_sub(1);
                return Some(item);
            }

            let Some(block) = self.blocks.next() else {
                let item = self.back.next()?;
                self.remaining = self.remaining.wrapping_sub(1);
                return Some(item);
            };

            self.front = block.iter_mut();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, const N: usize> DoubleEndedIterator for IterMut<'_, T, N> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.back.next_back() {
                self.remaining = self.remaining.wrapping_sub(1);
                return Some(item);
            }

            let Some(block) = self.blocks.next_back() else {
                let item = self.front.next_back()?;
                self.remaining = self.remaining.wrapping_sub(1);
                return Some(item);
            };

            self.back = block.iter_mut();
        }
    }
}

impl<T, const N: usize> ExactSizeIterator for IterMut<'_, T, N> {}

impl<T, const N: usize> FusedIterator for IterMut<'_, T, N> {}
