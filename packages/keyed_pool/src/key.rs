/// A versioned handle to one value in a [`SparsePool`][1] or [`DensePool`][2].
///
/// A key records the slot index it points at, the slot's generation at the time
/// of insertion, and an opaque caller-supplied `meta` tag. A key resolves to a
/// value only while the slot's current generation still matches; once the value
/// is removed and the slot is reused, the old key silently stops resolving.
///
/// Live keys can only be minted by a pool, so every non-null key provably
/// originated from a successful insertion.
///
/// # The null key
///
/// [`Key::default()`] produces the null key, with version 0. Slot generations
/// start at 1 and only ever advance, so the null key never resolves in any pool.
///
/// # Example
///
/// ```rust
/// use keyed_pool::{Key, SparsePool};
///
/// let mut pool = SparsePool::<u32, 4>::new();
///
/// let key = pool.insert(42).expect("pool has free slots");
/// assert!(!key.is_null());
///
/// // Keys are small plain values; copy and store them freely.
/// let stored = [key, Key::default()];
/// assert_eq!(pool.get(stored[0]), Some(&42));
/// assert_eq!(pool.get(stored[1]), None);
/// ```
///
/// [1]: crate::SparsePool
/// [2]: crate::DensePool
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Key {
    version: u32,
    index: u16,
    meta: u16,
}

impl Key {
    pub(crate) fn new(version: u32, index: u16, meta: u16) -> Self {
        Self {
            version,
            index,
            meta,
        }
    }

    /// Whether this is the null key, which no pool ever resolves.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.version == 0
    }

    /// The opaque tag supplied at insertion time, carried unmodified.
    ///
    /// The pool never interprets this value.
    #[must_use]
    pub fn meta(self) -> u16 {
        self.meta
    }

    pub(crate) fn version(self) -> u32 {
        self.version
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.index)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;
    use std::hash::Hash;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Key: Send, Sync, Copy, Debug, Hash);

    #[test]
    fn default_key_is_null() {
        let key = Key::default();

        assert!(key.is_null());
        assert_eq!(key.meta(), 0);
    }

    #[test]
    fn minted_key_is_not_null() {
        let key = Key::new(1, 0, 0);

        assert!(!key.is_null());
    }

    #[test]
    fn meta_is_carried_unmodified() {
        let key = Key::new(7, 3, 24);

        assert_eq!(key.meta(), 24);
        assert_eq!(key.version(), 7);
        assert_eq!(key.index(), 3);
    }

    #[test]
    fn keys_compare_by_all_fields() {
        assert_eq!(Key::new(1, 2, 3), Key::new(1, 2, 3));
        assert_ne!(Key::new(1, 2, 3), Key::new(2, 2, 3));
        assert_ne!(Key::new(1, 2, 3), Key::new(1, 4, 3));
        assert_ne!(Key::new(1, 2, 3), Key::new(1, 2, 4));
    }
}
