//! Basic usage of the `vessel` crate:
//!
//! * Filling a fixed-capacity array past its limit.
//! * Growing a vector under different growth policies.
//! * Detecting overruns with a checked fixed array.

use tracing::Level;
use vessel::{CheckedFixedArray, ExactFit, FixedArray, GeometricRatio, GrowVec};

fn main() {
    // Storage changes are logged at trace level. Install a subscriber to see them.
    tracing_subscriber::fmt().with_max_level(Level::TRACE).init();

    let mut recent = FixedArray::<&str, 4>::new();

    for name in ["Alice", "Bob", "Charlie", "Dora", "Eve"] {
        // Once the array is full, further items are quietly dropped.
        recent.push_back(name);
    }

    println!(
        "Fixed array holds {} of {} slots: {:?}",
        recent.len(),
        recent.capacity(),
        recent.as_slice()
    );

    // Insertion into a full array is ignored, the returned index is `len()`.
    let at = recent.insert(1, "Zed");
    println!("Insertion into the full array returned {at}: {:?}", recent.as_slice());

    // After freeing a slot, insertion in the middle shifts the tail towards the end.
    recent.pop_back();
    recent.insert(1, "Zed");
    println!("After popping and inserting at 1: {:?}", recent.as_slice());

    let mut doubling = GrowVec::new();
    let mut exact = GrowVec::with_policy(ExactFit);
    let mut ratio = GrowVec::with_policy(GeometricRatio::<3, 2>);

    for value in 0..20_u32 {
        doubling.push(value);
        exact.push(value);
        ratio.push(value);
    }

    println!(
        "After 20 pushes the capacities are: doubling {}, exact fit {}, 1.5x {}",
        doubling.capacity(),
        exact.capacity(),
        ratio.capacity()
    );

    // Bulk insertion reserves exactly what it needs.
    doubling.insert_count(5, 3, &100);
    println!("Vector after bulk insertion: {:?}", doubling.as_slice());

    match doubling.at(100) {
        Ok(value) => println!("Found {value}"),
        Err(error) => println!("Checked access failed: {error}"),
    }

    let mut checked = CheckedFixedArray::<u8, 2>::new();
    checked.push_back_unchecked(1);
    checked.push_back_unchecked(2);
    checked.push_back_unchecked(3);

    println!(
        "Checked array holds {:?}, overrun detected: {}",
        checked.as_slice(),
        checked.overrun()
    );
}
