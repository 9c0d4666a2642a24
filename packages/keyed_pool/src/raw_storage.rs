use std::any::type_name;
use std::mem::MaybeUninit;
use std::slice;

/// A fixed block of `N` typed but potentially uninitialized slots.
///
/// This is the backing storage of the pools in this crate. Values are created and
/// destroyed in place inside individual slots. The storage does not track which
/// slots are initialized and will not drop any remaining values when it is dropped
/// itself - occupancy tracking is entirely the caller's responsibility.
///
/// All accessors are bounds-checked and panic on an out-of-range index. An
/// out-of-range index is a programmer error, unlike a stale pool key which is an
/// expected runtime outcome.
#[derive(Debug)]
pub struct RawStorage<T, const N: usize> {
    slots: [MaybeUninit<T>; N],
}

impl<T, const N: usize> RawStorage<T, N> {
    /// Creates storage with all `N` slots uninitialized.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [const { MaybeUninit::uninit() }; N],
        }
    }

    /// The number of slots in the storage.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Initializes the slot at `index` with `value`, returning a reference to the
    /// stored value.
    ///
    /// Writing over a slot that already holds a value does not drop the old value;
    /// it is leaked. Callers that track occupancy must destroy first.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn write(&mut self, index: usize, value: T) -> &mut T {
        self.slot_mut(index).write(value)
    }

    /// Drops the value at `index` in place, leaving the slot uninitialized.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    ///
    /// # Safety
    ///
    /// The slot at `index` must hold an initialized value.
    pub unsafe fn destroy(&mut self, index: usize) {
        // SAFETY: The caller guarantees the slot is initialized.
        unsafe { self.slot_mut(index).assume_init_drop() };
    }

    /// Moves the value at `index` out of the storage, leaving the slot
    /// uninitialized.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    ///
    /// # Safety
    ///
    /// The slot at `index` must hold an initialized value.
    #[must_use]
    pub unsafe fn take(&mut self, index: usize) -> T {
        // SAFETY: The caller guarantees the slot is initialized. The slot is
        // treated as uninitialized from here on, so the value is read exactly once.
        unsafe { self.slot(index).assume_init_read() }
    }

    /// Returns a reference to the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    ///
    /// # Safety
    ///
    /// The slot at `index` must hold an initialized value.
    #[must_use]
    pub unsafe fn get(&self, index: usize) -> &T {
        // SAFETY: The caller guarantees the slot is initialized.
        unsafe { self.slot(index).assume_init_ref() }
    }

    /// Returns an exclusive reference to the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    ///
    /// # Safety
    ///
    /// The slot at `index` must hold an initialized value.
    #[must_use]
    pub unsafe fn get_mut(&mut self, index: usize) -> &mut T {
        // SAFETY: The caller guarantees the slot is initialized.
        unsafe { self.slot_mut(index).assume_init_mut() }
    }

    /// Returns the first `len` slots as a slice of initialized values.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the capacity.
    ///
    /// # Safety
    ///
    /// Every slot in `[0, len)` must hold an initialized value.
    #[must_use]
    pub unsafe fn as_slice(&self, len: usize) -> &[T] {
        assert!(
            len <= N,
            "prefix length {len} out of bounds in storage of {}",
            type_name::<T>()
        );

        // SAFETY: The caller guarantees the first `len` slots are initialized, and
        // `MaybeUninit<T>` has the same layout as `T`.
        unsafe { slice::from_raw_parts(self.slots.as_ptr().cast::<T>(), len) }
    }

    /// Returns the first `len` slots as a mutable slice of initialized values.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the capacity.
    ///
    /// # Safety
    ///
    /// Every slot in `[0, len)` must hold an initialized value.
    #[must_use]
    pub unsafe fn as_mut_slice(&mut self, len: usize) -> &mut [T] {
        assert!(
            len <= N,
            "prefix length {len} out of bounds in storage of {}",
            type_name::<T>()
        );

        // SAFETY: The caller guarantees the first `len` slots are initialized, and
        // `MaybeUninit<T>` has the same layout as `T`.
        unsafe { slice::from_raw_parts_mut(self.slots.as_mut_ptr().cast::<T>(), len) }
    }

    fn slot(&self, index: usize) -> &MaybeUninit<T> {
        let Some(slot) = self.slots.get(index) else {
            panic!(
                "slot {index} out of bounds in storage of {}",
                type_name::<T>()
            )
        };

        slot
    }

    fn slot_mut(&mut self, index: usize) -> &mut MaybeUninit<T> {
        let Some(slot) = self.slots.get_mut(index) else {
            panic!(
                "slot {index} out of bounds in storage of {}",
                type_name::<T>()
            )
        };

        slot
    }
}

impl<T, const N: usize> Default for RawStorage<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn write_and_read_back() {
        let mut storage = RawStorage::<u64, 4>::new();

        for (index, value) in [10_u64, 20, 30].into_iter().enumerate() {
            _ = storage.write(index, value);
        }

        let sum: u64 = (0..3).map(|index| unsafe { *storage.get(index) }).sum();
        assert_eq!(sum, 60);

        for index in 0..3 {
            unsafe { storage.destroy(index) };
        }
    }

    #[test]
    fn capacity_matches_parameter() {
        let storage = RawStorage::<u8, 7>::new();
        assert_eq!(storage.capacity(), 7);
    }

    #[test]
    fn zero_capacity_is_fine() {
        let storage = RawStorage::<u64, 0>::new();
        assert_eq!(storage.capacity(), 0);
    }

    #[test]
    fn destroy_drops_value() {
        struct Droppable {
            dropped: Rc<Cell<bool>>,
        }

        impl Drop for Droppable {
            fn drop(&mut self) {
                self.dropped.set(true);
            }
        }

        let dropped = Rc::new(Cell::new(false));
        let mut storage = RawStorage::<Droppable, 2>::new();

        _ = storage.write(
            1,
            Droppable {
                dropped: Rc::clone(&dropped),
            },
        );
        assert!(!dropped.get());

        unsafe { storage.destroy(1) };
        assert!(dropped.get());
    }

    #[test]
    fn take_moves_value_out() {
        let mut storage = RawStorage::<String, 2>::new();

        _ = storage.write(0, "hello".to_string());

        let value = unsafe { storage.take(0) };
        assert_eq!(value, "hello");

        // The slot is free for reuse afterwards.
        _ = storage.write(0, "again".to_string());
        unsafe { storage.destroy(0) };
    }

    #[test]
    fn slot_can_be_reused_after_destroy() {
        let mut storage = RawStorage::<Vec<u32>, 1>::new();

        _ = storage.write(0, vec![1, 2, 3]);
        unsafe { storage.destroy(0) };

        _ = storage.write(0, vec![4, 5]);
        assert_eq!(unsafe { storage.get(0) }.len(), 2);
        unsafe { storage.destroy(0) };
    }

    #[test]
    fn prefix_slice_reflects_initialized_values() {
        let mut storage = RawStorage::<i32, 5>::new();

        for (index, value) in [1_i32, 2, 3].into_iter().enumerate() {
            _ = storage.write(index, value);
        }

        let slice = unsafe { storage.as_slice(3) };
        assert_eq!(slice, &[1, 2, 3]);

        let slice = unsafe { storage.as_mut_slice(3) };
        slice[0] = 9;
        assert_eq!(unsafe { storage.as_slice(3) }, &[9, 2, 3]);
    }

    #[test]
    #[should_panic]
    fn write_out_of_bounds_panics() {
        let mut storage = RawStorage::<u32, 3>::new();

        _ = storage.write(3, 42);
    }

    #[test]
    #[should_panic]
    fn get_out_of_bounds_panics() {
        let storage = RawStorage::<u32, 3>::new();

        _ = unsafe { storage.get(1234) };
    }

    #[test]
    #[should_panic]
    fn oversized_prefix_panics() {
        let storage = RawStorage::<u32, 3>::new();

        _ = unsafe { storage.as_slice(4) };
    }
}
