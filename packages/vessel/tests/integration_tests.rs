//! Integration tests that exercise the containers through their public API only.

#![allow(
    clippy::indexing_slicing,
    missing_docs,
    reason = "we do not need to worry about these things when writing test code"
)]

use std::alloc::Layout;
use std::ptr::{self, NonNull};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use vessel::{
    Allocator, CheckedFixedArray, Error, ExactFit, FixedArray, Geometric, Global, GrowVec,
    GrowthPolicy, StableStack,
};

/// Counts the allocations made through all clones of one instance.
#[derive(Clone, Debug, Default)]
struct CountingAllocator {
    allocations: Arc<AtomicUsize>,
}

impl CountingAllocator {
    fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }
}

impl PartialEq for CountingAllocator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.allocations, &other.allocations)
    }
}

impl Allocator for CountingAllocator {
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantees, we allocated through `Global`.
        unsafe {
            Global.deallocate(ptr, layout);
        }
    }
}

/// Refuses to hand out more than 64 bytes at a time.
#[derive(Clone, Debug, Default, PartialEq)]
struct Tiny;

impl Allocator for Tiny {
    const IS_ALWAYS_EQUAL: bool = true;

    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Forwarding the caller's guarantees, we allocated through `Global`.
        unsafe {
            Global.deallocate(ptr, layout);
        }
    }

    fn max_size(&self) -> usize {
        64
    }
}

/// Grows in steps of ten items.
#[derive(Clone, Copy, Debug, Default)]
struct TenAtATime;

impl GrowthPolicy for TenAtATime {
    fn grow_capacity(&self, _size: usize, capacity: usize, _required: usize) -> usize {
        capacity + 10
    }
}

#[test]
fn fixed_array_end_to_end_sequence() {
    let mut array = FixedArray::<i32, 32>::new();

    for value in 0..16 {
        array.push_back(value);
    }

    assert_eq!(array.append(8, &1), 16);
    assert_eq!(array.len(), 24);

    for value in 24..32 {
        array.emplace_back(value);
    }

    // Saturated: further pushes are dropped.
    array.push_back(100);
    assert_eq!(array.len(), 32);

    array.erase_range(8..24);
    array.pop_front();
    array.pop_front();
    array.erase(3);
    array.pop_back();
    array.pop_back();
    array.insert_count(6, 2, &4);

    assert_eq!(
        array.as_slice(),
        &[2, 3, 4, 6, 7, 24, 4, 4, 25, 26, 27, 28, 29]
    );
}

#[test]
fn checked_fixed_array_reports_overrun_without_growing() {
    let mut array: CheckedFixedArray<u8, 4> = (0..4).collect();

    array.push_back_unchecked(5);

    assert!(array.overrun());
    assert_eq!(array.as_slice(), &[0, 1, 2, 3]);
}

#[test]
fn grow_vec_insert_into_full_vector() {
    let allocator = CountingAllocator::default();
    let mut vec = GrowVec::<i32, _>::new_in(allocator.clone());

    vec.reserve(4);
    vec.push(1);
    vec.push(2);
    vec.push(3);
    vec.push(4);

    let before = allocator.allocations();
    vec.insert(1, 9);

    assert_eq!(allocator.allocations(), before + 1);
    assert_eq!(vec.as_slice(), &[1, 9, 2, 3, 4]);
}

#[test]
fn custom_policy_decides_capacity() {
    let mut vec = GrowVec::with_policy(TenAtATime);

    for value in 0..25 {
        vec.push(value);
    }

    assert_eq!(vec.capacity(), 30);

    // A one-off policy does not replace the vector's own.
    for value in 25..31 {
        vec.push_with_policy(value, &ExactFit);
    }

    assert_eq!(vec.capacity(), 31);
    assert_eq!(vec.policy().grow_capacity(0, 31, 32), 41);
}

#[test]
fn allocator_limit_bounds_capacity() {
    let mut vec = GrowVec::<u64, Tiny>::new_in(Tiny);

    assert_eq!(vec.max_size(), 8);
    assert_eq!(
        vec.try_reserve(9),
        Err(Error::CapacityOverflow {
            requested: 9,
            max: 8
        })
    );

    for value in 0..4 {
        vec.push(value);
    }
    assert!(vec.is_full());

    // Geometric growth is clamped to the allocator limit instead of failing.
    vec.push_with_policy(4, &Geometric::<16>);
    assert_eq!(vec.capacity(), 8);

    for value in 5..8 {
        vec.push(value);
    }
    assert!(vec.is_full());
    assert!(!vec.can_store(1));
}

#[test]
#[should_panic]
fn allocator_limit_panics_when_exceeded() {
    let mut vec = GrowVec::<u64, Tiny>::new_in(Tiny);

    for value in 0..9 {
        vec.push(value);
    }
}

#[test]
fn grow_vec_error_is_displayable() {
    let vec = GrowVec::from_slice(&[1, 2, 3]);

    let error = vec.at(3).unwrap_err();

    assert_eq!(
        error.to_string(),
        "index 3 is out of range for a container of length 3"
    );
}

#[test]
fn grow_vec_behaves_as_slice() {
    let mut vec: GrowVec<u32> = (1..=5).rev().collect();

    vec.sort_unstable();

    assert_eq!(vec.first(), Some(&1));
    assert!(vec.contains(&4));
    assert_eq!(vec.iter().sum::<u32>(), 15);
}

#[test]
fn grow_vec_can_move_between_threads() {
    let vec = GrowVec::from_elem(100, &7_u64);

    let sum = thread::spawn(move || vec.iter().sum::<u64>())
        .join()
        .unwrap();

    assert_eq!(sum, 700);
}

#[test]
fn stable_stack_addresses_survive_growth() {
    let mut stack = StableStack::<i32, 4>::new();

    for value in 0..10 {
        stack.push(value);
    }

    let first = ptr::from_ref(&stack[0]);
    let fifth = ptr::from_ref(&stack[4]);

    for value in 10..30 {
        stack.push(value);
    }

    assert_eq!(ptr::from_ref(&stack[0]), first);
    assert_eq!(ptr::from_ref(&stack[4]), fifth);
    assert_eq!(stack.len(), 30);
    assert_eq!(*stack.top(), 29);
}

#[test]
fn stable_stack_pointers_stay_valid_across_pops_and_pushes() {
    let mut stack = StableStack::<String, 2>::new();
    let anchor = ptr::from_mut(stack.emplace_back("anchor".to_string()));

    for round in 0..10 {
        stack.push(format!("round {round}"));
        stack.push(format!("round {round} again"));
        stack.pop();
    }

    // SAFETY: The stack is alive and has never moved its blocks.
    let anchor = unsafe { &*anchor };
    assert_eq!(anchor, "anchor");
    assert_eq!(stack.len(), 11);
}
