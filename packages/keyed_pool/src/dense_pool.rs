use std::any::type_name;
use std::slice;

use crate::error::Result;
use crate::{InsertError, Key, RawStorage};

/// A fixed-capacity object pool that keeps its live values packed at the front
/// of storage, giving cache-friendly iteration on top of the same generational
/// [`Key`] scheme as [`SparsePool`][crate::SparsePool].
///
/// Removal works by moving the last packed value into the gap, so values change
/// data position over time and iteration order is unspecified and may change
/// after any removal. Keys are unaffected: a per-slot lookup table tracks where
/// each slot's value currently lives, which is the indirection that buys O(1)
/// removal while staying packed. This is the defining trade-off against
/// [`SparsePool`][crate::SparsePool], which keeps values pinned to their slot
/// but cannot offer iteration.
///
/// Mutating the pool while iterating it is prevented by the borrow checker; an
/// iterator borrows the pool for its whole lifetime.
///
/// The pool exclusively owns its storage and all contained values, and cannot
/// be cloned.
///
/// # Example
///
/// ```rust
/// use keyed_pool::DensePool;
///
/// let mut pool = DensePool::<u32, 3>::new();
///
/// let key_a = pool.insert(10).expect("pool has free slots");
/// let _key_b = pool.insert(20).expect("pool has free slots");
/// let _key_c = pool.insert(30).expect("pool has free slots");
///
/// assert_eq!(pool.remove(key_a), Some(10));
///
/// // The two survivors stay packed and iterable.
/// assert_eq!(pool.iter().sum::<u32>(), 50);
/// assert_eq!(pool.as_slice().len(), 2);
/// ```
#[derive(Debug)]
pub struct DensePool<T, const N: usize> {
    /// The number of live values, which all occupy data positions `[0, len)`.
    len: usize,

    /// Index of the next slot to allocate, with the remaining free slots
    /// chained through the lookup records. Points out of bounds when the pool
    /// is full.
    free_head: usize,

    storage: RawStorage<T, N>,

    /// Per-slot records, indexed by the slot id a key carries.
    lookups: [Lookup; N],

    /// Reverse map from data position to the slot id whose value lives there.
    /// Only entries below `len` are meaningful.
    erase: [usize; N],
}

/// Per-slot bookkeeping: the generation counter plus either the current data
/// position of the slot's value or the free-list link.
#[derive(Clone, Copy, Debug)]
struct Lookup {
    /// Advanced only on allocation, never reset, so keys issued before a
    /// `clear()` can never re-validate after it.
    version: u32,

    slot: Slot,
}

#[derive(Clone, Copy, Debug)]
enum Slot {
    Occupied { position: usize },

    Vacant { next_free: usize },
}

/// Marks erase entries at or beyond `len`, which carry no information.
const NO_SLOT: usize = usize::MAX;

impl<T, const N: usize> DensePool<T, N> {
    /// Creates an empty pool with all `N` slots on the free list.
    ///
    /// # Panics
    ///
    /// Panics if `N` exceeds the index range of [`Key`].
    #[must_use]
    pub fn new() -> Self {
        assert!(
            N <= usize::from(u16::MAX),
            "DensePool of {} too large for the key index range",
            type_name::<T>()
        );

        Self {
            len: 0,
            free_head: 0,
            storage: RawStorage::new(),
            // For the last slot this points out of bounds, which is fine.
            // It means the free list ends there.
            lookups: std::array::from_fn(|index| Lookup {
                version: 0,
                slot: Slot::Vacant {
                    next_free: index.wrapping_add(1),
                },
            }),
            erase: [NO_SLOT; N],
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
    pub fn insert(&mut self, value: T) -> Result<Key> {
        self.insert_with_meta(value, 0)
    }

    /// Inserts a value and returns a key carrying the given opaque meta tag.
    ///
    /// The new value is appended at the end of the packed range; where it ends
    /// up later depends on subsequent removals.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`insert()`][Self::insert].
    ///
    /// # Example
    ///
    /// ```rust
    /// use keyed_pool::DensePool;
    ///
    /// let mut pool = DensePool::<u32, 4>::new();
    ///
    /// let key = pool.insert_with_meta(42, 7).expect("pool has free slots");
    /// assert_eq!(key.meta(), 7);
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
            .lookup(index)
            .version
            .checked_add(1)
            .ok_or(InsertError::VersionOverflow)?;

        // No fallible steps below this point; a failed insertion must leave the
        // pool untouched.
        let position = self.len;
        _ = self.storage.write(position, value);
        *self.erase_entry_mut(position) = index;

        let lookup = self.lookup_mut(index);
        lookup.version = version;

        let next_free = match lookup.slot {
            Slot::Vacant { next_free } => next_free,
            Slot::Occupied { .. } => panic!(
                "free list head {index} was occupied in pool of {}",
                type_name::<T>()
            ),
        };
        lookup.slot = Slot::Occupied { position };

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
        let (_, position) = self.resolve(key)?;

        // SAFETY: resolve() only returns positions inside the packed range,
        // which is always initialized.
        Some(unsafe { self.storage.get(position) })
    }

    /// Returns an exclusive reference to the value the key resolves to, if any.
    #[must_use]
    pub fn get_mut(&mut self, key: Key) -> Option<&mut T> {
        let (_, position) = self.resolve(key)?;

        // SAFETY: resolve() only returns positions inside the packed range,
        // which is always initialized.
        Some(unsafe { self.storage.get_mut(position) })
    }

    /// Removes the value the key resolves to and returns it.
    ///
    /// Returns `None` without side effects if the key does not resolve. On
    /// success, the last packed value moves into the vacated data position so
    /// the packed range stays gap-free; the moved value's key keeps resolving
    /// to it throughout.
    pub fn remove(&mut self, key: Key) -> Option<T> {
        let (index, cursor) = self.resolve(key)?;

        // The slot resolved, so at least one value is live.
        let tail = self.len.wrapping_sub(1);

        // SAFETY: resolve() only returns positions inside the packed range,
        // which is always initialized. The bookkeeping below retires the
        // position.
        let value = unsafe { self.storage.take(cursor) };

        if cursor != tail {
            // Keep the live values packed: the tail value moves into the gap.
            // SAFETY: tail is inside the packed range and distinct from cursor,
            // so it holds a separate initialized value.
            let moved = unsafe { self.storage.take(tail) };
            _ = self.storage.write(cursor, moved);

            let moved_index = self.erase_entry(tail);
            *self.erase_entry_mut(cursor) = moved_index;
            self.lookup_mut(moved_index).slot = Slot::Occupied { position: cursor };
        }

        *self.erase_entry_mut(tail) = NO_SLOT;

        self.lookup_mut(index).slot = Slot::Vacant {
            next_free: self.free_head,
        };
        self.free_head = index;
        self.len = tail;

        Some(value)
    }

    /// Drops every value in the pool and rebuilds the free list across all
    /// slots.
    ///
    /// Generation counters are left untouched, so no key issued before the clear
    /// ever resolves again.
    pub fn clear(&mut self) {
        self.destroy_packed();
        self.reset_free_list();
        self.len = 0;
    }

    /// The live values as a packed slice.
    ///
    /// The order of values within the slice is unspecified and may change after
    /// any removal.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: Data positions [0, len) are always initialized; that is the
        // packing invariant this pool exists to maintain.
        unsafe { self.storage.as_slice(self.len) }
    }

    /// The live values as a packed mutable slice.
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len;

        // SAFETY: Data positions [0, len) are always initialized; that is the
        // packing invariant this pool exists to maintain.
        unsafe { self.storage.as_mut_slice(len) }
    }

    /// Iterates over the live values in unspecified order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use keyed_pool::DensePool;
    ///
    /// let mut pool = DensePool::<u32, 4>::new();
    ///
    /// _ = pool.insert(1).expect("pool has free slots");
    /// _ = pool.insert(2).expect("pool has free slots");
    ///
    /// assert_eq!(pool.iter().sum::<u32>(), 3);
    /// ```
    #[must_use]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Iterates over the live values in unspecified order, allowing mutation.
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    fn resolve(&self, key: Key) -> Option<(usize, usize)> {
        let index = key.index();

        if index >= N {
            // Out of range; possibly a key minted by a larger pool.
            return None;
        }

        let lookup = self.lookup(index);

        let Slot::Occupied { position } = lookup.slot else {
            // The slot is free; the key outlived its value.
            return None;
        };

        if position >= self.len {
            // Stale bookkeeping would be an internal bug; treat it as a miss
            // rather than handing out uninitialized storage.
            return None;
        }

        if lookup.version != key.version() {
            // The slot was reused; the key is stale.
            return None;
        }

        Some((index, position))
    }

    fn destroy_packed(&mut self) {
        for position in 0..self.len {
            // SAFETY: The packed range is always initialized, and every caller
            // resets occupancy state afterwards.
            unsafe { self.storage.destroy(position) };
        }
    }

    fn reset_free_list(&mut self) {
        for (index, lookup) in self.lookups.iter_mut().enumerate() {
            lookup.slot = Slot::Vacant {
                next_free: index.wrapping_add(1),
            };
        }

        for entry in &mut self.erase {
            *entry = NO_SLOT;
        }

        self.free_head = 0;
    }

    fn lookup(&self, index: usize) -> Lookup {
        *self
            .lookups
            .get(index)
            .expect("index is bounds-checked by the caller")
    }

    fn lookup_mut(&mut self, index: usize) -> &mut Lookup {
        self.lookups
            .get_mut(index)
            .expect("index is bounds-checked by the caller")
    }

    fn erase_entry(&self, position: usize) -> usize {
        *self
            .erase
            .get(position)
            .expect("position is bounds-checked by the caller")
    }

    fn erase_entry_mut(&mut self, position: usize) -> &mut usize {
        self.erase
            .get_mut(position)
            .expect("position is bounds-checked by the caller")
    }

    /// Forces the generation counter of a slot to its maximum so tests can
    /// observe the overflow failure path without four billion reuses.
    #[cfg(test)]
    pub(crate) fn saturate_version(&mut self, index: usize) {
        self.lookup_mut(index).version = u32::MAX;
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(debug_assertions)]
    fn integrity_check(&self) {
        let mut occupied_count = 0_usize;

        for (index, lookup) in self.lookups.iter().enumerate() {
            match lookup.slot {
                Slot::Occupied { position } => {
                    occupied_count = occupied_count.wrapping_add(1);

                    assert!(
                        position < self.len,
                        "slot {index} records data position {position} beyond len {} in pool of {}",
                        self.len,
                        type_name::<T>()
                    );

                    assert!(
                        self.erase_entry(position) == index,
                        "erase entry at {position} does not map back to slot {index} in pool of {}",
                        type_name::<T>()
                    );
                }
                Slot::Vacant { next_free } => {
                    assert!(
                        next_free >= N
                            || matches!(self.lookup(next_free).slot, Slot::Vacant { .. }),
                        "vacant slot {index} links to an occupied slot {next_free} in pool of {}",
                        type_name::<T>()
                    );
                }
            }
        }

        assert!(
            occupied_count == self.len,
            "self.len {} does not match the observed occupied count {occupied_count} in pool of {}",
            self.len,
            type_name::<T>()
        );

        assert!(
            self.free_head >= N
                || matches!(self.lookup(self.free_head).slot, Slot::Vacant { .. }),
            "self.free_head points to an occupied slot {} in pool of {}",
            self.free_head,
            type_name::<T>()
        );
    }
}

impl<T, const N: usize> Default for DensePool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for DensePool<T, N> {
    fn drop(&mut self) {
        self.destroy_packed();
    }
}

impl<'p, T, const N: usize> IntoIterator for &'p DensePool<T, N> {
    type Item = &'p T;
    type IntoIter = slice::Iter<'p, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'p, T, const N: usize> IntoIterator for &'p mut DensePool<T, N> {
    type Item = &'p mut T;
    type IntoIter = slice::IterMut<'p, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
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
        let mut pool = DensePool::<u32, 3>::new();

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
    fn removal_compacts_by_moving_the_tail() {
        let mut pool = DensePool::<u32, 3>::new();

        let key_a = pool.insert(10).unwrap();
        let key_b = pool.insert(20).unwrap();
        let key_c = pool.insert(30).unwrap();

        assert_eq!(pool.remove(key_a), Some(10));

        // The survivors stay packed and sum as expected.
        assert_eq!(pool.iter().sum::<u32>(), 50);
        assert_eq!(pool.len(), 2);

        // The tail value (30) moved into the vacated front position.
        assert_eq!(pool.as_slice()[0], 30);

        // Both survivor keys still resolve; the removed key does not.
        assert_eq!(pool.get(key_b), Some(&20));
        assert_eq!(pool.get(key_c), Some(&30));
        assert!(pool.get(key_a).is_none());
    }

    #[test]
    fn removing_the_tail_itself_is_safe() {
        let counts = counters::<2>();
        let mut pool = DensePool::<Tracked, 2>::new();

        _ = pool.insert(Tracked::new(1, &counts[0])).unwrap();
        let key_tail = pool.insert(Tracked::new(2, &counts[1])).unwrap();

        // cursor == tail: no move happens and nothing is dropped twice.
        assert_eq!(pool.remove(key_tail).map(|tracked| tracked.value), Some(2));

        assert_eq!(counts[1].get(), 0);
        assert_eq!(counts[0].get(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn packing_survives_interleaved_churn() {
        let mut pool = DensePool::<i64, 16>::new();
        let mut live = Vec::new();

        for round in 0..4_i64 {
            for offset in 0..6 {
                let value = round * 10 + offset;
                live.push((pool.insert(value).unwrap(), value));
            }

            // Remove every other live value, front-biased, to shuffle positions.
            let mut idx = 0;
            live.retain(|(key, _)| {
                idx += 1;
                if idx % 2 == 0 {
                    assert!(pool.remove(*key).is_some());
                    false
                } else {
                    true
                }
            });
        }

        // Iteration yields exactly the live values, packed, each still
        // reachable through its key.
        assert_eq!(pool.len(), live.len());
        assert_eq!(pool.as_slice().len(), live.len());

        let expected_sum: i64 = live.iter().map(|(_, value)| value).sum();
        assert_eq!(pool.iter().sum::<i64>(), expected_sum);

        for (key, value) in &live {
            assert_eq!(pool.get(*key), Some(value));
        }
    }

    #[test]
    fn iter_mut_updates_are_visible_through_keys() {
        let mut pool = DensePool::<u32, 4>::new();

        let key = pool.insert(1).unwrap();
        _ = pool.insert(2).unwrap();

        for value in &mut pool {
            *value *= 10;
        }

        assert_eq!(pool.get(key), Some(&10));
        assert_eq!(pool.iter().sum::<u32>(), 30);
    }

    #[test]
    fn insert_into_full_pool_fails() {
        let mut pool = DensePool::<u32, 2>::new();

        _ = pool.insert(1).unwrap();
        _ = pool.insert(2).unwrap();

        assert_eq!(pool.insert(3), Err(InsertError::CapacityExhausted));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn stale_key_never_aliases_replacement() {
        let mut pool = DensePool::<u32, 1>::new();

        let key_a = pool.insert(1).unwrap();
        assert_eq!(pool.remove(key_a), Some(1));

        let key_b = pool.insert(2).unwrap();

        assert!(pool.get(key_a).is_none());
        assert_eq!(pool.get(key_b), Some(&2));
        assert!(pool.remove(key_a).is_none());
    }

    #[test]
    fn null_key_never_resolves() {
        let mut pool = DensePool::<u32, 4>::new();

        assert!(pool.get(Key::default()).is_none());

        _ = pool.insert(42).unwrap();
        assert!(pool.get(Key::default()).is_none());
        assert!(pool.remove(Key::default()).is_none());
    }

    #[test]
    fn key_from_another_pool_does_not_resolve() {
        let mut dense = DensePool::<u32, 4>::new();
        let mut other = DensePool::<u32, 2>::new();

        let key = dense.insert(42).unwrap();

        assert!(other.get(key).is_none());
        assert_eq!(dense.get(key), Some(&42));
    }

    #[test]
    fn clear_then_repopulate() {
        const SIZE: usize = 20;

        let counts = counters::<SIZE>();
        let mut pool = DensePool::<Tracked, SIZE>::new();

        let keys: Vec<_> = (0..SIZE)
            .map(|idx| {
                pool.insert(Tracked::new(idx as i64, &counts[idx]))
                    .unwrap()
            })
            .collect();

        pool.clear();

        assert!(pool.is_empty());
        assert_eq!(pool.iter().count(), 0);
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
        assert_eq!(pool.len(), SIZE);
        assert!(all_counts_are(&counts, 1));

        let expected_sum: i64 = (0..SIZE as i64).map(|idx| idx + 100).sum();
        assert_eq!(
            pool.iter().map(|tracked| tracked.value).sum::<i64>(),
            expected_sum
        );

        for (idx, key) in keys2.iter().enumerate() {
            assert!(pool.get(keys[idx]).is_none());
            assert!(pool.get(*key).is_some());
        }
    }

    #[test]
    fn teardown_while_populated_leaks_nothing() {
        let counts = counters::<3>();

        {
            let mut pool = DensePool::<Tracked, 3>::new();

            for (idx, count) in counts.iter().enumerate() {
                _ = pool.insert(Tracked::new(idx as i64, count)).unwrap();
            }

            assert!(all_counts_are(&counts, 1));
        }

        assert!(all_counts_are(&counts, 0));
    }

    #[test]
    fn version_overflow_fails_without_consuming_slot() {
        let mut pool = DensePool::<u32, 2>::new();

        pool.saturate_version(0);

        assert_eq!(pool.insert(42), Err(InsertError::VersionOverflow));
        assert_eq!(pool.len(), 0);
        assert!(!pool.is_full());

        assert_eq!(pool.insert(42), Err(InsertError::VersionOverflow));
    }

    #[test]
    fn zero_capacity_pool_is_always_full() {
        let mut pool = DensePool::<u32, 0>::new();

        assert!(pool.is_full());
        assert!(pool.is_empty());
        assert_eq!(pool.insert(42), Err(InsertError::CapacityExhausted));
        assert_eq!(pool.iter().count(), 0);

        pool.clear();
        assert!(pool.is_full());
    }
}
