//! Error types for the `robin-arena` crate

/// Errors reported by the arena-backed containers.
///
/// Lookups and removals of absent keys are not errors; they report `None`
/// or `false`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Every slot of the table holds a live entry, so a new key cannot be
    /// placed. Migrate into a larger arena with `copy_to` first.
    #[error("hash table is full ({capacity} slots)")]
    TableFull {
        /// Number of slots in the table.
        capacity: usize,
    },

    /// The supplied buffer cannot hold the requested number of slots.
    #[error("buffer of {provided} bytes is too small, at least {required} bytes are needed")]
    BufferTooSmall {
        /// Minimum number of bytes needed.
        required: usize,
        /// Length of the buffer that was supplied.
        provided: usize,
    },

    /// Every slot of the memory pool is allocated.
    #[error("memory pool is exhausted ({capacity} slots)")]
    PoolExhausted {
        /// Number of slots in the pool.
        capacity: usize,
    },

    /// The handle was allocated by a different memory pool.
    #[error("handle does not belong to this memory pool")]
    ForeignHandle,

    /// The handle refers to a slot outside of the pool.
    #[error("slot index {index} is out of range for a pool of {capacity} slots")]
    IndexOutOfRange {
        /// Slot index carried by the handle.
        index: usize,
        /// Number of slots in the pool.
        capacity: usize,
    },
}

/// A specialized `Result` type for arena container operations.
pub type Result<T> = core::result::Result<T, Error>;
