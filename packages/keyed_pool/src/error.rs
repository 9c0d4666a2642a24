use thiserror::Error;

/// Errors that can occur when inserting into a pool.
///
/// A failed insertion consumes no slot and leaves the pool unchanged. Stale or
/// foreign keys are not errors - lookups and removals report those as `None`,
/// since generational aliasing is an expected, routine outcome.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[non_exhaustive]
pub enum InsertError {
    /// The pool has no free slot. Recoverable: remove a value or check
    /// `is_full()` before inserting.
    #[error("pool has no free slots")]
    CapacityExhausted,

    /// The next allocation into the target slot would wrap its generation
    /// counter back to the null sentinel, which would let a stale key
    /// re-validate against new data. The slot refuses service instead.
    #[error("slot generation counter would overflow")]
    VersionOverflow,
}

/// A specialized `Result` type for pool insertions, returning the crate's
/// [`InsertError`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, InsertError>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(InsertError: Send, Sync, Debug);

    #[test]
    fn display_names_the_problem() {
        assert_eq!(
            InsertError::CapacityExhausted.to_string(),
            "pool has no free slots"
        );
        assert_eq!(
            InsertError::VersionOverflow.to_string(),
            "slot generation counter would overflow"
        );
    }
}
