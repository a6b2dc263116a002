use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::FixedArray;

/// A [`FixedArray`] that detects unchecked pushes past its capacity instead of corrupting memory.
///
/// [`push_back_unchecked()`][Self::push_back_unchecked] is safe here: a push into a full array
/// lands in a spill slot outside the live range and raises a sticky overrun flag. The length
/// never exceeds `N`. This makes the checked variant useful for testing code that is meant to
/// run on a plain [`FixedArray`] with the capacity checks removed.
///
/// All other operations are forwarded to the inner array through `Deref`/`DerefMut`.
///
/// # Example
///
/// ```
/// use vessel::CheckedFixedArray;
///
/// let mut array = CheckedFixedArray::<u32, 2>::new();
///
/// array.push_back_unchecked(1);
/// array.push_back_unchecked(2);
/// assert!(!array.overrun());
///
/// array.push_back_unchecked(3);
/// assert!(array.overrun());
/// assert_eq!(array.as_slice(), &[1, 2]);
/// ```
#[derive(Clone, Debug)]
pub struct CheckedFixedArray<T, const N: usize> {
    array: FixedArray<T, N>,

    /// Receives values pushed while the array is full. Never part of the live range.
    spill: T,

    overrun: bool,
}

impl<T: Default, const N: usize> CheckedFixedArray<T, N> {
    /// Creates an empty array with the overrun flag cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::from(FixedArray::new())
    }
}

impl<T, const N: usize> CheckedFixedArray<T, N> {
    /// Appends `value` without a capacity check.
    ///
    /// If the array is full, the value is written to the spill slot, the overrun flag is set and
    /// a reference to the spill slot is returned. The length is left unchanged.
    pub fn push_back_unchecked(&mut self, value: T) -> &mut T {
        if self.array.is_full() {
            if !self.overrun {
                debug!(capacity = N, "unchecked push overran a fixed array");
            }

            self.overrun = true;
            self.spill = value;
            return &mut self.spill;
        }

        // SAFETY: We just checked that the array is not full.
        unsafe { self.array.push_back_unchecked(value) }
    }

    /// Whether an unchecked push has ever been attempted on a full array.
    ///
    /// The flag stays set until [`reset_overrun()`][Self::reset_overrun] is called.
    #[must_use]
    pub fn overrun(&self) -> bool {
        self.overrun
    }

    /// Clears the overrun flag.
    pub fn reset_overrun(&mut self) {
        self.overrun = false;
    }

    /// Returns the inner array, discarding the overrun flag.
    #[must_use]
    pub fn into_inner(self) -> FixedArray<T, N> {
        self.array
    }
}

impl<T: Default, const N: usize> Default for CheckedFixedArray<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default, const N: usize> From<FixedArray<T, N>> for CheckedFixedArray<T, N> {
    fn from(array: FixedArray<T, N>) -> Self {
        Self {
            array,
            spill: T::default(),
            overrun: false,
        }
    }
}

impl<T: Default, const N: usize> FromIterator<T> for CheckedFixedArray<T, N> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<FixedArray<T, N>>())
    }
}

impl<T: PartialEq, const N: usize> PartialEq for CheckedFixedArray<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.array == other.array
    }
}

impl<T, const N: usize> Deref for CheckedFixedArray<T, N> {
    type Target = FixedArray<T, N>;

    fn deref(&self) -> &Self::Target {
        &self.array
    }
}

impl<T, const N: usize> DerefMut for CheckedFixedArray<T, N> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.array
    }
}
