#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Error type shared by every container in the crate.
pub mod error;

/// Arena geometry and buffer sizing helpers.
///
/// Use [`map_buffer_size`](layout::map_buffer_size),
/// [`set_buffer_size`](layout::set_buffer_size) and
/// [`pool_buffer_size`](layout::pool_buffer_size) to size a buffer before
/// handing it to a container.
pub mod layout;

/// A HashMap implementation using robin-hood hashing over a borrowed buffer.
///
/// This module provides a `HashMap` that wraps the `HashTable` and compares
/// keys by value.
pub mod hash_map;

/// The robin-hood table both containers are built on.
pub mod hash_table;

/// A hash set implementation using robin-hood hashing over a borrowed buffer.
pub mod hash_set;

/// A fixed-size record allocator over a borrowed buffer.
pub mod memory_pool;

pub use error::Error;
pub use error::Result;
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::Cursor;
pub use hash_table::HashTable;
pub use memory_pool::MemoryPool;
pub use memory_pool::PoolHandle;
