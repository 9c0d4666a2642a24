use std::any::type_name;

use crate::error::Result;
use crate::{InsertError, Key, RawStorage};

/// A fixed-capacity object pool with O(1) insertion, lookup and removal via
/// generational [`Key`]s.
///
/// Each value stays in the slot it was inserted into until it is removed, so
/// references obtained through [`get()`][Self::get] never observe values moving
/// around. The price is that live values are scattered across the slot range;
/// there is no iteration over the contents. Use [`DensePool`][crate::DensePool]
/// when packed iteration matters more than slot stability.
///
/// Slots are recycled through an intrusive free list. Every slot carries a
/// generation counter that advances when the slot is allocated, and a key only
/// resolves while its recorded generation matches, so a key held across a
/// removal silently stops resolving instead of aliasing the replacement value.
///
/// The pool exclusively owns its storage and all contained values. It cannot be
/// cloned; duplicating a resource pool would require a per-element copy policy
/// that is deliberately left to explicit caller code.
///
/// # Example
///
/// ```rust
/// use keyed_pool::SparsePool;
///
/// let mut pool = SparsePool::<String, 4>::new();
///
/// let key = pool.insert("hello".to_string()).expect("pool has free slots");
/// assert_eq!(pool.get(key).map(String::as_str), Some("hello"));
///
/// let value = pool.remove(key);
/// assert_eq!(value.as_deref(), Some("hello"));
///
/// // The key no longer resolves, even after the slot is reused.
/// let _replacement = pool.insert("world".to_string()).expect("pool has free slots");
/// assert!(pool.get(key).is_none());
/// ```
#[derive(Debug)]
pub struct SparsePool<T, const N: usize> {
    /// Index of the next slot to allocate. Think of this as a virtual stack of
    /// the most recently freed slots, with the stack entries stored in the slot
    /// states themselves. Points out of bounds when the pool is full.
    free_head: usize,

    /// The number of occupied slots.
    len: usize,

    storage: RawStorage<T, N>,

    /// Per-slot generation counters. Advanced only on allocation, never reset,
    /// so keys issued before a `clear()` can never re-validate after it.
    versions: [u32; N],

    states: [SlotState; N],
}

/// Occupancy state of one slot, doubling as the free-list link storage.
#[derive(Clone, Copy, Debug)]
enum SlotState {
    Occupied,

    Vacant { next_free: usize },
}

impl<T, const N: usize> SparsePool<T, N> {
    /// Creates an empty pool with all `N` slots on the free list.
    ///
    /// # Panics
    ///
    /// Panics if `N` exceeds the index range of [`Key`].
    #[must_use]
    pub fn new() -> Self {
        assert!(
            N <= usize::from(u16::MAX),
            "SparsePool of {} too large for the key index range",
            type_name::<T>()
        );

        Self {
            free_head: 0,
            len: 0,
            storage: RawStorage::new(),
            versions: [0; N],
            // For the last slot this points out of bounds, which is fine.
            // It means the free list ends there.
            states: std::array::from_fn(|index| SlotState::Vacant {
                next_free: index.wrapping_add(1),
            }),
        }
    }

    /// The fixed number of slots in the pool.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    /// The number of values currently in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the pool holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the pool has no free slot left.
    ///
    /// A pool with capacity 0 is always full.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.free_head >= N
    }

    /// Inserts a value and returns the key that resolves to it.
    ///
    /// Equivalent to [`insert_with_meta()`][Self::insert_with_meta] with a meta
    /// tag of 0.
    ///
    /// # Errors
    ///
    /// Returns [`InsertError::CapacityExhausted`] if no free slot exists, or
    /// [`InsertError::VersionOverflow`] if the target slot's generation counter
    /// is spent. A failed insertion consumes no slot and alters nothing.
    ///
    /// # Example
    ///
    /// ```rust
    /// use keyed_pool::{InsertError, SparsePool};
    ///
    /// let mut pool = SparsePool::<u32, 1>::new();
    ///
    /// let key = pool.insert(42).expect("pool has free slots");
    /// assert_eq!(pool.insert(43), Err(InsertError::CapacityExhausted));
    ///
    /// assert_eq!(pool.remove(key), Some(42));
    /// assert!(pool.insert(43).is_ok());
    /// ```
    pub fn insert(&mut self, value: T) -> Result<Key> {
        self.insert_with_meta(value, 0)
    }

    /// Inserts a value and returns a key carrying the given opaque meta tag.
    ///
    /// The pool never interprets the tag; it is stored in the key itself, not in
    /// the pool, and travels with every copy of the key.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`insert()`][Self::insert].
    ///
    /// # Example
    ///
    /// ```rust
    /// use keyed_pool::SparsePool;
    ///
    /// let mut pool = SparsePool::<u32, 4>::new();
    ///
    /// let key = pool.insert_with_meta(42, 24).expect("pool has free slots");
    /// assert_eq!(key.meta(), 24);
    /// ```
    pub fn insert_with_meta(&mut self, value: T, meta: u16) -> Result<Key> {
        if self.is_full() {
            return Err(InsertError::CapacityExhausted);
        }

        let index = self.free_head;

        // A wrapped generation would let a stale key re-validate against new
        // data, and repairing the free list around the slot would cost an O(n)
        // scan. The slot refuses further service instead.
        let version = self
            .version(index)
            .checked_add(1)
            .ok_or(InsertError::VersionOverflow)?;

        // No fallible steps below this point; a failed insertion must leave the
        // pool untouched.
        *self.version_mut(index) = version;
        _ = self.storage.write(index, value);

        let state = self.state_mut(index);
        let next_free = match *state {
            SlotState::Vacant { next_free } => next_free,
            SlotState::Occupied => panic!(
                "free list head {index} was occupied in pool of {}",
                type_name::<T>()
            ),
        };
        *state = SlotState::Occupied;

        self.free_head = next_free;

        // Cannot overflow because occupancy is bounded by N.
        self.len = self.len.wrapping_add(1);

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(Key::new(
            version,
            u16::try_from(index).expect("guarded by capacity assertion in new()"),
            meta,
        ))
    }

    /// Returns a reference to the value the key resolves to, if any.
    ///
    /// Returns `None` for the null key, a stale key, a key minted by a different
    /// pool, or any other key that does not match a live value. The call never
    /// has side effects.
    #[must_use]
    pub fn get(&self, key: Key) -> Option<&T> {
        let index = self.resolve(key)?;

        // SAFETY: resolve() only returns indexes of occupied slots, which always
        // hold initialized values.
        Some(unsafe { self.storage.get(index) })
    }

    /// Returns an exclusive reference to the value the key resolves to, if any.
    #[must_use]
    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        let index = self.resolve(key)?;

        // SAFETY: resolve() only returns indexes of occupied slots, which always
        // hold initialized values.
        Some(unsafe { self.storage.get_mut(index) })
    }

    /// Removes the value the key resolves to and returns it.
    ///
    /// Returns `None` without side effects if the key does not resolve. On
    /// success the slot joins the free list; its generation stays put and only
    /// advances when the slot is next allocated, which is what invalidates the
    /// removed key relative to any future occupant.
    pub fn remove(&mut self, key: Key) -> Option<T> {
        let index = self.resolve(key)?;

        // SAFETY: resolve() only returns indexes of occupied slots, which always
        // hold initialized values. The state change below marks it vacant.
        let value = unsafe { self.storage.take(index) };

        *self.state_mut(index) = SlotState::Vacant {
            next_free: self.free_head,
        };
        self.free_head = index;

        // Cannot underflow because the slot was occupied.
        self.len = self.len.wrapping_sub(1);

        Some(value)
    }

    /// Drops every value in the pool and rebuilds the free list across all
    /// slots.
    ///
    /// Generation counters are left untouched, so no key issued before the clear
    /// ever resolves again.
    pub fn clear(&mut self) {
        self.destroy_occupied();
        self.reset_free_list();
        self.len = 0;
    }

    fn resolve(&self, key: Key) -> Option<usize> {
        let index = key.index();

        if index >= N {
            // Out of range; possibly a key minted by a larger pool.
            return None;
        }

        if !matches!(self.state(index), SlotState::Occupied) {
            // The slot is free; the key outlived its value.
            return None;
        }

        if self.version(index) != key.version() {
            // The slot was reused; the key is stale.
            return None;
        }

        Some(index)
    }

    fn destroy_occupied(&mut self) {
        for index in 0..N {
            if matches!(self.state(index), SlotState::Occupied) {
                // SAFETY: Occupied slots always hold initialized values, and
                // every caller resets occupancy state afterwards.
                unsafe { self.storage.destroy(index) };
            }
        }
    }

    fn reset_free_list(&mut self) {
        for (index, state) in self.states.iter_mut().enumerate() {
            *state = SlotState::Vacant {
                next_free: index.wrapping_add(1),
            };
        }

        self.free_head = 0;
    }

    fn state(&self, index: usize) -> SlotState {
        *self
            .states
            .get(index)
            .expect("index is bounds-checked by the caller")
    }

    fn state_mut(&mut self, index: usize) -> &mut SlotState {
        self.states
            .get_mut(index)
            .expect("index is bounds-checked by the caller")
    }

    fn version(&self, index: usize) -> u32 {
        *self
            .versions
            .get(index)
            .expect("index is bounds-checked by the caller")
    }

    fn version_mut(&mut self, index: usize) -> &mut u32 {
        self.versions
            .get_mut(index)
            .expect("index is bounds-checked by the caller")
    }

    /// Forces the generation counter of a slot to its maximum so tests can
    /// observe the overflow failure path without four billion reuses.
    #[cfg(test)]
    pub(crate) fn saturate_version(&mut self, index: usize) {
        *self.version_mut(index) = u32::MAX;
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    fn integrity_check(&self) {
        let occupied_count = self
            .states
            .iter()
            .filter(|state| matches!(state, SlotState::Occupied))
            .count();

        assert!(
            occupied_count == self.len,
            "self.len {} does not match the observed occupied count {occupied_count} in pool of {}",
            self.len,
            type_name::<T>()
        );

        assert!(
            self.free_head >= N || matches!(self.state(self.free_head), SlotState::Vacant { .. }),
            "self.free_head points to an occupied slot {} in pool of {}",
            self.free_head,
            type_name::<T>()
        );

        for (index, state) in self.states.iter().enumerate() {
            if let SlotState::Vacant { next_free } = *state {
                assert!(
                    next_free >= N || matches!(self.state(next_free), SlotState::Vacant { .. }),
                    "vacant slot {index} links to an occupied slot {next_free} in pool of {}",
                    type_name::<T>()
                );
            }
        }
    }
}

impl<T, const N: usize> Default for SparsePool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for SparsePool<T, N> {
    fn drop(&mut self) {
        self.destroy_occupied();
    }
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::items_after_statements,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_wrap,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    /// A value that keeps an external live-instance counter honest, mirroring
    /// resource types whose leaks the pool must not cause.
    struct Tracked {
        value: i64,
        count: Rc<Cell<i32>>,
    }

    impl Tracked {
        fn new(value: i64, count: &Rc<Cell<i32>>) -> Self {
            count.set(count.get() + 1);

            Self {
                value,
                count: Rc::clone(count),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.count.set(self.count.get() - 1);
        }
    }

    fn counters<const N: usize>() -> [Rc<Cell<i32>>; N] {
        std::array::from_fn(|_| Rc::new(Cell::new(0)))
    }

    fn all_counts_are<const N: usize>(counters: &[Rc<Cell<i32>>; N], expected: i32) -> bool {
        counters.iter().all(|count| count.get() == expected)
    }

    #[test]
    fn smoke_test() {
        let mut pool = SparsePool::<u32, 3>::new();

        let key_a = pool.insert(42).unwrap();
        let key_b = pool.insert(43).unwrap();
        let key_c = pool.insert(44).unwrap();

        assert_eq!(pool.get(key_a), Some(&42));
        assert_eq!(pool.get(key_b), Some(&43));
        assert_eq!(pool.get(key_c), Some(&44));

        assert_eq!(pool.len(), 3);
        assert!(pool.is_full());

        assert_eq!(pool.remove(key_b), Some(43));

        assert_eq!(pool.len(), 2);
        assert!(!pool.is_full());

        let key_d = pool.insert(45).unwrap();

        assert_eq!(pool.get(key_a), Some(&42));
        assert_eq!(pool.get(key_c), Some(&44));
        assert_eq!(pool.get(key_d), Some(&45));

        assert!(pool.is_full());
    }

    #[test]
    fn fill_remove_one_and_refill() {
        // N = 20: fill with tracked values, remove the value in slot 2, insert a
        // replacement with meta 24, and verify nothing leaked along the way.
        const SIZE: usize = 20;

        let counts = counters::<SIZE>();
        let mut pool = SparsePool::<Tracked, SIZE>::new();

        let keys: Vec<_> = (0..SIZE)
            .map(|idx| {
                pool.insert(Tracked::new(idx as i64, &counts[idx]))
                    .unwrap()
            })
            .collect();

        assert!(all_counts_are(&counts, 1));
        assert!(pool.is_full());

        for (idx, key) in keys.iter().enumerate() {
            assert!(!key.is_null());
            assert_eq!(pool.get(*key).map(|tracked| tracked.value), Some(idx as i64));
        }

        assert!(pool.remove(keys[2]).is_some());
        assert!(!pool.is_full());
        assert!(pool.get(keys[2]).is_none());
        assert_eq!(counts[2].get(), 0);

        let replacement_count = Rc::new(Cell::new(0));
        let key = pool
            .insert_with_meta(Tracked::new(99, &replacement_count), 24)
            .unwrap();

        assert_eq!(key.meta(), 24);
        assert!(pool.is_full());
        assert_eq!(pool.get(key).map(|tracked| tracked.value), Some(99));
        assert_eq!(replacement_count.get(), 1);

        drop(pool);
        assert!(all_counts_are(&counts, 0));
        assert_eq!(replacement_count.get(), 0);
    }

    #[test]
    fn insert_into_full_pool_fails() {
        let mut pool = SparsePool::<u32, 2>::new();

        _ = pool.insert(1).unwrap();
        _ = pool.insert(2).unwrap();

        assert_eq!(pool.insert(3), Err(InsertError::CapacityExhausted));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn stale_key_never_aliases_replacement() {
        let mut pool = SparsePool::<u32, 1>::new();

        let key_a = pool.insert(1).unwrap();
        assert_eq!(pool.remove(key_a), Some(1));

        let key_b = pool.insert(2).unwrap();

        // Exactly one of the two keys resolves, never both.
        assert!(pool.get(key_a).is_none());
        assert_eq!(pool.get(key_b), Some(&2));
        assert!(pool.remove(key_a).is_none());
    }

    #[test]
    fn null_key_never_resolves() {
        let mut pool = SparsePool::<u32, 4>::new();

        assert!(pool.get(Key::default()).is_none());

        _ = pool.insert(42).unwrap();
        assert!(pool.get(Key::default()).is_none());
        assert!(pool.remove(Key::default()).is_none());
    }

    #[test]
    fn fresh_slot_is_unreachable_before_first_insert() {
        // Slot 1 still has generation 0 here. No key can be minted for it, and a
        // zero-version key must not resolve against it either.
        let mut pool = SparsePool::<u32, 2>::new();

        let key = pool.insert(42).unwrap();
        assert_eq!(key.index(), 0);

        let forged = Key::new(0, 1, 0);
        assert!(pool.get(forged).is_none());
    }

    #[test]
    fn key_from_another_pool_does_not_resolve() {
        let mut first = SparsePool::<u32, 4>::new();
        let mut second = SparsePool::<u32, 2>::new();

        let key = first.insert(42).unwrap();

        assert!(second.get(key).is_none());
        assert!(second.remove(key).is_none());
        assert_eq!(first.get(key), Some(&42));
    }

    #[test]
    fn get_mut_allows_in_place_updates() {
        let mut pool = SparsePool::<u32, 2>::new();

        let key = pool.insert(42).unwrap();
        *pool.get_mut(key).unwrap() += 1;

        assert_eq!(pool.get(key), Some(&43));
    }

    #[test]
    fn clear_then_repopulate() {
        const SIZE: usize = 20;

        let counts = counters::<SIZE>();
        let mut pool = SparsePool::<Tracked, SIZE>::new();

        let keys: Vec<_> = (0..SIZE)
            .map(|idx| {
                pool.insert(Tracked::new(idx as i64, &counts[idx]))
                    .unwrap()
            })
            .collect();

        pool.clear();

        assert!(pool.is_empty());
        assert!(!pool.is_full());
        assert!(all_counts_are(&counts, 0));

        for key in &keys {
            assert!(pool.get(*key).is_none());
        }

        let keys2: Vec<_> = (0..SIZE)
            .map(|idx| {
                pool.insert(Tracked::new(idx as i64 + 100, &counts[idx]))
                    .unwrap()
            })
            .collect();

        assert!(pool.is_full());
        assert!(all_counts_are(&counts, 1));

        for (idx, key) in keys2.iter().enumerate() {
            assert!(pool.get(keys[idx]).is_none());
            assert_eq!(
                pool.get(*key).map(|tracked| tracked.value),
                Some(idx as i64 + 100)
            );
        }
    }

    #[test]
    fn remove_all_equals_clear() {
        const SIZE: usize = 20;

        let counts = counters::<SIZE>();
        let mut pool = SparsePool::<Tracked, SIZE>::new();

        let keys: Vec<_> = (0..SIZE)
            .map(|idx| {
                pool.insert(Tracked::new(idx as i64, &counts[idx]))
                    .unwrap()
            })
            .collect();

        for key in keys {
            assert!(pool.remove(key).is_some());
        }

        assert!(pool.is_empty());
        assert!(all_counts_are(&counts, 0));

        assert!(pool.insert(Tracked::new(0, &counts[0])).is_ok());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn teardown_while_populated_leaks_nothing() {
        let counts = counters::<3>();

        {
            let mut pool = SparsePool::<Tracked, 3>::new();

            for (idx, count) in counts.iter().enumerate() {
                _ = pool.insert(Tracked::new(idx as i64, count)).unwrap();
            }

            assert!(all_counts_are(&counts, 1));
        }

        assert!(all_counts_are(&counts, 0));
    }

    #[test]
    fn version_overflow_fails_without_consuming_slot() {
        let mut pool = SparsePool::<u32, 2>::new();

        // The free list starts at slot 0; spend its generation range.
        pool.saturate_version(0);

        assert_eq!(pool.insert(42), Err(InsertError::VersionOverflow));
        assert_eq!(pool.len(), 0);
        assert!(!pool.is_full());

        // The slot is still at the head of the free list and still refuses.
        assert_eq!(pool.insert(42), Err(InsertError::VersionOverflow));
    }

    #[test]
    fn zero_capacity_pool_is_always_full() {
        let mut pool = SparsePool::<u32, 0>::new();

        assert!(pool.is_full());
        assert!(pool.is_empty());
        assert_eq!(pool.insert(42), Err(InsertError::CapacityExhausted));

        pool.clear();
        assert!(pool.is_full());
    }

    #[test]
    fn in_refcell_works_fine() {
        use std::cell::RefCell;

        let pool = RefCell::new(SparsePool::<u32, 3>::new());

        let key = {
            let mut pool = pool.borrow_mut();
            pool.insert(42).unwrap()
        };

        let pool = pool.borrow();
        assert_eq!(pool.get(key), Some(&42));
    }
}
