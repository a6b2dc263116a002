#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Array-like containers for performance-sensitive code.
//!
//! This crate provides three containers that trade generality for predictable performance:
//!
//! * [`FixedArray`] - an in-place array of exactly `N` slots that never allocates. Operations
//!   that would exceed the capacity saturate instead of failing. [`CheckedFixedArray`] adds an
//!   overrun flag that records attempts to push past the capacity without a check.
//! * [`GrowVec`] - a heap-backed growable array whose memory comes from a pluggable
//!   [`Allocator`] and whose capacity grows according to a pluggable [`GrowthPolicy`].
//!   Allocator instances can optionally travel with the contents when one vector is assigned
//!   from another.
//! * [`StableStack`] - a stack made of fixed-size blocks. Growth appends a new block instead of
//!   moving existing items, so the address of an item never changes once it has been stored.
//!
//! The containers are independent of each other. None of them are synchronized: share them
//! between threads the same way you would share a `Vec`.
//!
//! # Example
//!
//! ```
//! use vessel::{FixedArray, GrowVec, StableStack};
//!
//! let mut recent = FixedArray::<u32, 3>::new();
//! let mut history = GrowVec::new();
//! let mut events = StableStack::<String>::new();
//!
//! for id in 0..5 {
//!     // The fixed array silently stops accepting items once it is full.
//!     recent.push_back(id);
//!     history.push(id);
//!     events.push(format!("event {id}"));
//! }
//!
//! assert_eq!(recent.as_slice(), &[0, 1, 2]);
//! assert_eq!(history.len(), 5);
//! assert_eq!(events.top(), "event 4");
//! ```
//!
//! # Growth policies
//!
//! [`GrowVec`] consults its policy whenever it runs out of room. The crate supplies
//! [`ExactFit`], [`Geometric`] (the default, doubling) and [`GeometricRatio`] for fractional
//! factors such as 1.5. Custom policies implement [`GrowthPolicy`].
//!
//! ```
//! use vessel::{GeometricRatio, GrowVec};
//!
//! let mut vec = GrowVec::with_policy(GeometricRatio::<3, 2>);
//! vec.reserve(10);
//!
//! for value in 0..11 {
//!     vec.push(value);
//! }
//!
//! assert_eq!(vec.capacity(), 15);
//! ```
//!
//! # Logging
//!
//! Storage changes are reported through [`tracing`](https://docs.rs/tracing) at trace level and
//! the first recorded overrun of a [`CheckedFixedArray`] at debug level. The crate never installs
//! a subscriber.

mod allocator;
mod checked_fixed_array;
mod error;
mod fixed_array;
mod grow_vec;
mod growth_policy;
mod stable_stack;

pub use allocator::{Allocator, Global};
pub use checked_fixed_array::CheckedFixedArray;
pub use error::Error;
pub use fixed_array::FixedArray;
pub use grow_vec::GrowVec;
pub use growth_policy::*;
pub use stable_stack::{Iter, IterMut, StableStack};
