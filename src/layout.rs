use core::mem::size_of;
use core::ops::Range;

/// Size in bytes of one entry in the hashes region.
pub const HASH_SIZE: usize = size_of::<u32>();

/// Load factor above which a table should be migrated with `copy_to`.
///
/// Robin-hood probing keeps probe sequences short up to very high densities,
/// so this sits well above what plain linear probing tolerates.
pub const MIGRATE_LOAD_FACTOR: f32 = 0.95;

cfg_if::cfg_if! {
    if #[cfg(feature = "density-eighty")] {
        /// Load factor, in percent, that the sizing helpers aim for.
        pub const TARGET_LOAD_PERCENT: usize = 80;
    } else if #[cfg(feature = "density-ninety")] {
        /// Load factor, in percent, that the sizing helpers aim for.
        pub const TARGET_LOAD_PERCENT: usize = 90;
    } else if #[cfg(feature = "density-ninety-five")] {
        /// Load factor, in percent, that the sizing helpers aim for.
        pub const TARGET_LOAD_PERCENT: usize = 95;
    } else {
        /// Load factor, in percent, that the sizing helpers aim for.
        pub const TARGET_LOAD_PERCENT: usize = 80;
    }
}

/// Number of slots needed to hold `num_elements` at the target load factor.
#[inline]
const fn target_slots(num_elements: usize) -> usize {
    num_elements.saturating_mul(100).div_ceil(TARGET_LOAD_PERCENT)
}

/// Geometry of a table arena.
///
/// The buffer is split into three parallel regions laid out back to back:
/// `capacity` hashes (`u32`), `capacity` keys and `capacity` values. Nothing
/// here touches memory; it only maps slot indices to byte ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaLayout {
    capacity: usize,
    key_size: usize,
    value_size: usize,
    keys_offset: usize,
    values_offset: usize,
}

impl ArenaLayout {
    /// Derives the layout for a buffer of `buffer_len` bytes.
    ///
    /// The capacity is `buffer_len / (4 + key_size + value_size)`, which is
    /// zero when the buffer cannot hold a single slot.
    pub const fn new(buffer_len: usize, key_size: usize, value_size: usize) -> Self {
        let stride = HASH_SIZE + key_size + value_size;
        let capacity = buffer_len / stride;
        Self {
            capacity,
            key_size,
            value_size,
            keys_offset: HASH_SIZE * capacity,
            values_offset: (HASH_SIZE + key_size) * capacity,
        }
    }

    /// Layout for `K` keys and `V` values.
    pub const fn for_types<K, V>(buffer_len: usize) -> Self {
        Self::new(buffer_len, size_of::<K>(), size_of::<V>())
    }

    /// Number of slots.
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes used by one slot across all three regions.
    #[inline(always)]
    pub const fn stride(&self) -> usize {
        HASH_SIZE + self.key_size + self.value_size
    }

    /// Bytes of the buffer actually covered by the regions.
    #[inline(always)]
    pub const fn used_bytes(&self) -> usize {
        self.stride() * self.capacity
    }

    #[inline(always)]
    pub(crate) fn hash_range(&self, index: usize) -> Range<usize> {
        debug_assert!(index < self.capacity);
        let start = index * HASH_SIZE;
        start..start + HASH_SIZE
    }

    #[inline(always)]
    pub(crate) fn key_range(&self, index: usize) -> Range<usize> {
        debug_assert!(index < self.capacity);
        let start = self.keys_offset + index * self.key_size;
        start..start + self.key_size
    }

    #[inline(always)]
    pub(crate) fn value_range(&self, index: usize) -> Range<usize> {
        debug_assert!(index < self.capacity);
        let start = self.values_offset + index * self.value_size;
        start..start + self.value_size
    }
}

/// Bytes needed for a [`HashMap`](crate::HashMap) that should hold
/// `num_elements` entries while staying under [`TARGET_LOAD_PERCENT`].
///
/// # Examples
///
/// ```rust
/// use robin_arena::layout::map_buffer_size;
///
/// // 4 byte hash + 4 byte key + 2 byte value per slot.
/// assert!(map_buffer_size::<u32, u16>(1024) >= 10 * 1024);
/// ```
pub const fn map_buffer_size<K, V>(num_elements: usize) -> usize {
    let stride = HASH_SIZE + size_of::<K>() + size_of::<V>();
    stride.saturating_mul(target_slots(num_elements))
}

/// Bytes needed for a [`HashSet`](crate::HashSet) that should hold
/// `num_elements` values while staying under [`TARGET_LOAD_PERCENT`].
pub const fn set_buffer_size<T>(num_elements: usize) -> usize {
    map_buffer_size::<T, ()>(num_elements)
}

/// Bytes needed for a [`MemoryPool`](crate::MemoryPool) of exactly
/// `num_elements` slots using the default `u32` free-list index.
pub const fn pool_buffer_size<T>(num_elements: usize) -> usize {
    pool_buffer_size_with_index::<T, u32>(num_elements)
}

/// Bytes needed for a [`MemoryPool`](crate::MemoryPool) of exactly
/// `num_elements` slots using free-list index type `I`.
///
/// A pool slot holds either a value or a free-list link, so its size is the
/// larger of the two.
pub const fn pool_buffer_size_with_index<T, I>(num_elements: usize) -> usize {
    let slot = if size_of::<T>() > size_of::<I>() {
        size_of::<T>()
    } else {
        size_of::<I>()
    };
    slot.saturating_mul(num_elements)
}
