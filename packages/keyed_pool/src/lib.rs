//! Fixed-capacity object pools with generational keys.
//!
//! This crate provides two bounded containers that hand out stable [`Key`]
//! handles instead of references: [`SparsePool`] and [`DensePool`]. Both
//! pre-allocate storage for a compile-time capacity, recycle slots through an
//! intrusive free list, and stamp every slot with a generation counter so a
//! key held past its value's removal silently stops resolving - no garbage
//! collection, no reference counting, no reallocation after construction.
//!
//! # Choosing a pool
//!
//! - [`SparsePool`] never moves a value once inserted. Lookup and removal are a
//!   single array access, but live values are scattered across the slot range,
//!   so there is no iteration.
//! - [`DensePool`] keeps live values packed at the front of storage, giving
//!   cheap cache-friendly iteration, at the cost of values moving (and
//!   iteration order changing) whenever something is removed.
//!
//! Both pools share the same key scheme, so the choice is purely about whether
//! slot-stable addresses or packed iteration matters more.
//!
//! # Keys are revocation-aware
//!
//! A [`Key`] records the slot index, the slot's generation at insertion time,
//! and an opaque caller-supplied `meta` tag. Stale keys, keys from other pools,
//! and the null [`Key::default()`] all resolve to `None` rather than aliasing
//! whatever lives in the slot now.
//!
//! # Example
//!
//! ```rust
//! use keyed_pool::DensePool;
//!
//! let mut pool = DensePool::<String, 8>::new();
//!
//! let key = pool
//!     .insert("hello".to_string())
//!     .expect("pool has free slots");
//!
//! assert_eq!(pool.get(key).map(String::as_str), Some("hello"));
//! assert_eq!(pool.iter().count(), 1);
//!
//! let value = pool.remove(key);
//! assert_eq!(value.as_deref(), Some("hello"));
//! assert!(pool.get(key).is_none());
//! ```
//!
//! # Single-threaded by design
//!
//! The pools contain no locking or atomics. They can move between threads when
//! `T` allows it, but concurrent mutation must be serialized externally, e.g.
//! behind a `Mutex`.

mod dense_pool;
mod error;
mod key;
mod raw_storage;
mod sparse_pool;

pub use dense_pool::DensePool;
pub use error::InsertError;
pub use key::Key;
pub use raw_storage::RawStorage;
pub use sparse_pool::SparsePool;
