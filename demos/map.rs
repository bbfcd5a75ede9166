//! Fills an ordered map with factorials, first on the standard allocator and then
//! with every value stored in a fixed [`PageAllocator`] sized for ten entries.
//!
//! Run with `RUST_LOG=pagealloc=trace` to see every call reaching the allocator.

use std::collections::BTreeMap;

use allocator_api2::boxed::Box;
use pagealloc::PageAllocator;
use tracing_subscriber::EnvFilter;

fn fact(n: i32) -> i32 {
    (1..=n).product()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("BTreeMap with the global allocator");
    let m1: BTreeMap<i32, i32> = (0..10).map(|i| (i, fact(i))).collect();
    for (key, value) in &m1 {
        println!("{key} {value}");
    }

    let allocator = PageAllocator::<(i32, i32)>::fixed(10).expect("failed to map the page");
    let mut m2 = BTreeMap::new();

    println!("BTreeMap with PageAllocator");
    for i in 0..10 {
        let entry =
            Box::try_new_in((i, fact(i)), &allocator).expect("page is sized for ten entries");
        m2.insert(i, entry);
    }
    for entry in m2.values() {
        println!("{} {}", entry.0, entry.1);
    }

    match Box::try_new_in((10, fact(10)), &allocator) {
        Ok(_) => println!("Unexpectedly found room for an eleventh entry"),
        Err(_) => println!("Eleventh entry refused: the page is full"),
    }

    println!("{:?}", allocator.stats());
}
