use thiserror::Error;

/// Errors reported by the fallible operations of the containers in this crate.
///
/// Only [`GrowVec`][crate::GrowVec] reports errors. The fixed-capacity containers saturate
/// instead of failing and the stable stack leaves misuse as a caller obligation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The caller requested more capacity than the element type and allocator can represent.
    #[error("requested capacity {requested} exceeds the maximum capacity of {max} items")]
    CapacityOverflow {
        /// The number of items the caller asked room for.
        requested: usize,

        /// The largest number of items that can ever be allocated for this container.
        max: usize,
    },

    /// The caller accessed an index that does not refer to a live element.
    #[error("index {index} is out of range for a container of length {len}")]
    OutOfRange {
        /// The index that was requested.
        index: usize,

        /// The number of live elements at the time of the request.
        len: usize,
    },
}

/// A specialized `Result` type for container operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
