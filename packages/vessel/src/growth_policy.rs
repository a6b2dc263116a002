/// Decides how much capacity a [`GrowVec`][crate::GrowVec] acquires when it runs out of room.
///
/// The vector consults the policy whenever a capacity check fails, passing the current number of
/// items, the current capacity and the capacity the pending operation requires. The policy
/// answers with the capacity to allocate, which must be at least `required`. A smaller answer is
/// raised to `required` by the vector.
///
/// # Example
///
/// ```
/// use vessel::{GrowVec, GrowthPolicy};
///
/// /// Grows in fixed steps of 16 items.
/// #[derive(Clone, Copy, Debug, Default)]
/// struct Steps;
///
/// impl GrowthPolicy for Steps {
///     fn grow_capacity(&self, _size: usize, _capacity: usize, required: usize) -> usize {
///         required.next_multiple_of(16)
///     }
/// }
///
/// let mut vec = GrowVec::with_policy(Steps);
/// vec.push(1);
/// assert_eq!(vec.capacity(), 16);
/// ```
pub trait GrowthPolicy {
    /// Calculates the new capacity given the current `size`, current `capacity` and the
    /// `required` capacity.
    #[must_use]
    fn grow_capacity(&self, size: usize, capacity: usize, required: usize) -> usize;
}

/// Grows to exactly the required capacity.
///
/// This minimizes memory usage but makes a sequence of pushes quadratic.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ExactFit;

impl GrowthPolicy for ExactFit {
    fn grow_capacity(&self, _size: usize, _capacity: usize, required: usize) -> usize {
        required
    }
}

/// Multiplies the capacity by `K`, or grows to the required capacity if that is larger.
///
/// An empty vector is treated as having capacity 1, so the first growth yields `K` items.
/// `Geometric<2>` is the default policy of [`GrowVec`][crate::GrowVec].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Geometric<const K: usize>;

impl<const K: usize> GrowthPolicy for Geometric<K> {
    fn grow_capacity(&self, _size: usize, capacity: usize, required: usize) -> usize {
        capacity.max(1).saturating_mul(K).max(required)
    }
}

/// Multiplies the capacity by the fraction `NUM / DEN`, or grows to the required capacity if
/// that is larger.
///
/// `GeometricRatio<3, 2>` grows by half of the current capacity each time. An empty vector is
/// treated as having capacity 1. A zero denominator is rejected at compile time.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct GeometricRatio<const NUM: usize, const DEN: usize>;

impl<const NUM: usize, const DEN: usize> GrowthPolicy for GeometricRatio<NUM, DEN> {
    #[expect(
        clippy::integer_division,
        reason = "the fractional part is deliberately discarded"
    )]
    fn grow_capacity(&self, _size: usize, capacity: usize, required: usize) -> usize {
        const { assert!(DEN > 0, "GeometricRatio denominator must not be zero") };

        let base = capacity.max(1);

        // Divide first when the product would overflow.
        let expanded = base
            .checked_mul(NUM)
            .map_or_else(|| (base / DEN).saturating_mul(NUM), |product| product / DEN);

        expanded.max(required)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_returns_required() {
        assert_eq!(ExactFit.grow_capacity(0, 0, 1), 1);
        assert_eq!(ExactFit.grow_capacity(10, 10, 11), 11);
        assert_eq!(ExactFit.grow_capacity(10, 10, 500), 500);
    }

    #[test]
    fn geometric_doubles() {
        let policy = Geometric::<2>;

        assert_eq!(policy.grow_capacity(0, 0, 1), 2);
        assert_eq!(policy.grow_capacity(2, 2, 3), 4);
        assert_eq!(policy.grow_capacity(4, 4, 5), 8);
    }

    #[test]
    fn geometric_clamps_up_to_required() {
        let policy = Geometric::<2>;

        assert_eq!(policy.grow_capacity(4, 4, 100), 100);
    }

    #[test]
    fn geometric_saturates_instead_of_overflowing() {
        let policy = Geometric::<4>;

        assert_eq!(
            policy.grow_capacity(usize::MAX / 2, usize::MAX / 2, usize::MAX / 2 + 1),
            usize::MAX
        );
    }

    #[test]
    fn ratio_grows_by_fraction() {
        let policy = GeometricRatio::<3, 2>;

        assert_eq!(policy.grow_capacity(0, 0, 1), 1);
        assert_eq!(policy.grow_capacity(1, 1, 2), 2);
        assert_eq!(policy.grow_capacity(4, 4, 5), 6);
        assert_eq!(policy.grow_capacity(100, 100, 101), 150);
    }

    #[test]
    fn ratio_clamps_up_to_required() {
        let policy = GeometricRatio::<3, 2>;

        assert_eq!(policy.grow_capacity(4, 4, 64), 64);
    }

    #[test]
    fn ratio_survives_huge_capacities() {
        let policy = GeometricRatio::<3, 2>;

        let huge = usize::MAX / 2;
        let grown = policy.grow_capacity(huge, huge, huge + 1);

        assert!(grown > huge);
    }

    #[test]
    fn every_policy_satisfies_required() {
        let cases = [(0, 0, 1), (3, 3, 4), (7, 8, 9), (8, 8, 1000)];

        for (size, capacity, required) in cases {
            assert!(ExactFit.grow_capacity(size, capacity, required) >= required);
            assert!(Geometric::<2>.grow_capacity(size, capacity, required) >= required);
            assert!(Geometric::<3>.grow_capacity(size, capacity, required) >= required);
            assert!(GeometricRatio::<3, 2>.grow_capacity(size, capacity, required) >= required);
        }
    }
}
