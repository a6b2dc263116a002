//! Demonstrates that items in a `StableStack` keep their addresses while the stack grows.
//!
//! A `GrowVec` moves its items to a new buffer whenever it reallocates, so a raw pointer into
//! it is only good until the next growth. The stack never moves an item once stored.

use std::ptr;

use tracing::Level;
use vessel::{GrowVec, StableStack};

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::TRACE).init();

    let mut vec = GrowVec::<u64>::new();
    vec.push(1);
    let before = vec.as_ptr();

    for value in 2..=100 {
        vec.push(value);
    }

    println!(
        "GrowVec buffer moved during growth: {}",
        !ptr::eq(before, vec.as_ptr())
    );

    let mut stack = StableStack::<u64, 16>::new();
    let first = ptr::from_mut(stack.emplace_back(1)).cast_const();

    for value in 2..=100 {
        stack.push(value);
    }

    println!(
        "StableStack has {} items in {} blocks, first item moved: {}",
        stack.len(),
        stack.block_count(),
        !ptr::eq(first, ptr::from_ref(&stack[0]))
    );

    // Popping keeps the blocks around for reuse.
    for _ in 0..50 {
        stack.pop();
    }

    println!(
        "After popping half: {} items, capacity {}, top is {}",
        stack.len(),
        stack.capacity(),
        stack.top()
    );
}
