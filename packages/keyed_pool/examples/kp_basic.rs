//! Basic usage of the `keyed_pool` crate:
//!
//! * Creating fixed-capacity pools.
//! * Adding values and holding keys.
//! * Detecting stale keys after removal.
//! * Iterating a dense pool.

use keyed_pool::{DensePool, SparsePool};

fn main() {
    let mut pool = SparsePool::<String, 8>::new();

    // Inserting a value gives you a key that you can later use to look it up again.
    let alice_key = pool.insert("Alice".to_string()).expect("pool has capacity");
    let bob_key = pool.insert("Bob".to_string()).expect("pool has capacity");

    println!(
        "Sparse pool contains {} of {} values",
        pool.len(),
        pool.capacity()
    );

    let alice = pool.get(alice_key).expect("key was just minted");
    println!("Retrieved value: {alice}");

    // Removal hands the value back and invalidates the key permanently.
    let bob = pool.remove(bob_key).expect("key was just minted");
    println!("Removed value: {bob}");
    assert!(pool.get(bob_key).is_none());

    // Keys carry an opaque meta tag if you want to route them later.
    let tagged_key = pool
        .insert_with_meta("Charlie".to_string(), 7)
        .expect("pool has capacity");
    println!("Key carries meta tag {}", tagged_key.meta());

    // The dense pool trades slot stability for packed iteration.
    let mut scores = DensePool::<u32, 8>::new();

    let first = scores.insert(10).expect("pool has capacity");
    _ = scores.insert(20).expect("pool has capacity");
    _ = scores.insert(30).expect("pool has capacity");

    _ = scores.remove(first);

    // After removal the survivors are still packed; iteration touches only them.
    let total: u32 = scores.iter().sum();
    println!("Dense pool sums to {total} across {} values", scores.len());
}
