use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;

use bytemuck::Pod;

use crate::error::Error;
use crate::error::Result;
use crate::layout::ArenaLayout;
use crate::layout::HASH_SIZE;
use crate::layout::MIGRATE_LOAD_FACTOR;

/// Hash value marking a slot that has never held an entry.
pub const EMPTY_HASH: u32 = 0;

/// Bit set on the stored hash of a removed entry.
///
/// The remaining bits are kept intact so the tombstone still knows its ideal
/// position, which keeps probe distance arithmetic valid across it.
pub const DELETED_BIT: u32 = 1 << 31;

/// Maps a caller supplied hash into the range the table can store.
///
/// The [`DELETED_BIT`] is stripped and a result of `0` becomes `1`, since `0`
/// marks empty slots. Hashes `0` and `1` (and any two hashes differing only in
/// the top bit) are therefore indistinguishable inside a table; the stored
/// keys still tell such entries apart.
///
/// # Examples
///
/// ```rust
/// use robin_arena::hash_table::normalize_hash;
///
/// assert_eq!(normalize_hash(0), 1);
/// assert_eq!(normalize_hash(1), 1);
/// assert_eq!(normalize_hash(0x8000_0007), 7);
/// assert_eq!(normalize_hash(0x8000_0000), 1);
/// ```
#[inline(always)]
pub const fn normalize_hash(hash: u32) -> u32 {
    let hash = hash & !DELETED_BIT;
    if hash == EMPTY_HASH { 1 } else { hash }
}

#[inline(always)]
fn is_tombstone(hash: u32) -> bool {
    hash & DELETED_BIT != 0
}

#[inline(always)]
fn is_live(hash: u32) -> bool {
    hash != EMPTY_HASH && !is_tombstone(hash)
}

/// A fixed-capacity robin-hood hash table stored in a borrowed buffer.
///
/// `HashTable<'a, K, V>` never allocates. The buffer handed to [`new`] is
/// split into parallel regions of hashes, keys and values (see
/// [`ArenaLayout`]) and every operation works in place on those regions.
/// Hashing is left to the caller: each operation takes a precomputed 32-bit
/// hash, and lookups take an equality predicate on the stored key.
///
/// Keys and values are [`Pod`] records and are copied in and out of the
/// buffer, so the buffer needs no particular alignment.
///
/// Removal leaves a tombstone behind rather than shifting entries back. Probe
/// sequences therefore degrade with heavy churn until the table is migrated
/// with [`copy_to`], which is also the only way to grow.
///
/// ## Example
///
/// ```rust
/// use robin_arena::hash_table::HashTable;
///
/// let mut buffer = [0u8; 512];
/// let mut table: HashTable<'_, u32, u64> = HashTable::new(&mut buffer);
///
/// table.set(7, 7, 700).unwrap();
/// assert_eq!(table.find(7, |&k| k == 7), Some((7, 700)));
///
/// assert_eq!(table.remove(7, |&k| k == 7), Some((7, 700)));
/// assert!(table.is_empty());
/// ```
///
/// [`new`]: HashTable::new
/// [`copy_to`]: HashTable::copy_to
pub struct HashTable<'a, K, V> {
    arena: &'a mut [u8],
    layout: ArenaLayout,
    populated: usize,
    tombstones: usize,

    _phantom: PhantomData<(K, V)>,
}

struct SlotTag(u32);

impl Debug for SlotTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.0 == EMPTY_HASH {
            f.write_str("........")
        } else if is_tombstone(self.0) {
            write!(f, "~{:07x}", self.0 & !DELETED_BIT)
        } else {
            write!(f, "{:08x}", self.0)
        }
    }
}

impl<K: Pod, V: Pod> Debug for HashTable<'_, K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        struct Slots<'t, 'a, K, V>(&'t HashTable<'a, K, V>);

        impl<K: Pod, V: Pod> Debug for Slots<'_, '_, K, V> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.debug_list()
                    .entries((0..self.0.capacity()).map(|i| SlotTag(self.0.hash_at(i))))
                    .finish()
            }
        }

        f.debug_struct("HashTable")
            .field("hashes", &Slots(self))
            .field("populated", &self.populated)
            .field("tombstones", &self.tombstones)
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<'a, K: Pod, V: Pod> HashTable<'a, K, V> {
    /// Creates an empty table over `buffer`.
    ///
    /// The capacity is `buffer.len() / (4 + size_of::<K>() + size_of::<V>())`.
    /// A buffer too small for one slot yields a table of capacity zero that
    /// rejects every insertion; use [`try_new`](HashTable::try_new) to catch
    /// that up front. Size buffers with
    /// [`map_buffer_size`](crate::layout::map_buffer_size).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_arena::hash_table::HashTable;
    ///
    /// let mut buffer = [0u8; 100];
    /// let table: HashTable<'_, u32, u16> = HashTable::new(&mut buffer);
    /// assert_eq!(table.capacity(), 10);
    /// ```
    pub fn new(buffer: &'a mut [u8]) -> Self {
        let layout = ArenaLayout::for_types::<K, V>(buffer.len());
        buffer[..layout.capacity() * HASH_SIZE].fill(0);

        tracing::debug!(
            capacity = layout.capacity(),
            stride = layout.stride(),
            buffer_len = buffer.len(),
            "hash table constructed"
        );

        Self {
            arena: buffer,
            layout,
            populated: 0,
            tombstones: 0,
            _phantom: PhantomData,
        }
    }

    /// Creates an empty table over `buffer`, failing if it cannot hold a
    /// single slot.
    pub fn try_new(buffer: &'a mut [u8]) -> Result<Self> {
        let layout = ArenaLayout::for_types::<K, V>(buffer.len());
        if layout.capacity() == 0 {
            return Err(Error::BufferTooSmall {
                required: layout.stride(),
                provided: buffer.len(),
            });
        }
        Ok(Self::new(buffer))
    }

    #[inline(always)]
    fn hash_at(&self, index: usize) -> u32 {
        bytemuck::pod_read_unaligned(&self.arena[self.layout.hash_range(index)])
    }

    #[inline(always)]
    fn key_at(&self, index: usize) -> K {
        bytemuck::pod_read_unaligned(&self.arena[self.layout.key_range(index)])
    }

    #[inline(always)]
    fn value_at(&self, index: usize) -> V {
        bytemuck::pod_read_unaligned(&self.arena[self.layout.value_range(index)])
    }

    #[inline(always)]
    fn write_hash(&mut self, index: usize, hash: u32) {
        let range = self.layout.hash_range(index);
        self.arena[range].copy_from_slice(bytemuck::bytes_of(&hash));
    }

    #[inline(always)]
    fn write_value(&mut self, index: usize, value: &V) {
        let range = self.layout.value_range(index);
        self.arena[range].copy_from_slice(bytemuck::bytes_of(value));
    }

    #[inline(always)]
    fn write_slot(&mut self, index: usize, hash: u32, key: &K, value: &V) {
        self.write_hash(index, hash);
        let range = self.layout.key_range(index);
        self.arena[range].copy_from_slice(bytemuck::bytes_of(key));
        self.write_value(index, value);
    }

    #[inline(always)]
    fn ideal_position(&self, hash: u32) -> usize {
        (hash & !DELETED_BIT) as usize % self.capacity()
    }

    /// Distance of slot `pos` from the ideal position of `hash`, wrapping
    /// around the end of the table.
    #[inline(always)]
    fn probe_distance(&self, pos: usize, hash: u32) -> usize {
        let capacity = self.capacity();
        (pos + capacity - self.ideal_position(hash)) % capacity
    }

    #[inline(always)]
    fn next_position(&self, pos: usize) -> usize {
        let next = pos + 1;
        if next == self.capacity() { 0 } else { next }
    }

    /// Locates the live slot holding `hash` whose key satisfies `eq`.
    ///
    /// `hash` must already be normalized. The probe stops at the first empty
    /// slot, or as soon as it meets an entry closer to its own ideal position
    /// than the probe is to the target's, since robin-hood ordering rules out
    /// the target being further along.
    fn find_slot(&self, hash: u32, eq: impl Fn(&K) -> bool) -> Option<usize> {
        let capacity = self.capacity();
        if capacity == 0 || self.populated == 0 {
            return None;
        }

        let mut pos = self.ideal_position(hash);
        let mut distance = 0;
        while distance < capacity {
            let slot_hash = self.hash_at(pos);
            if slot_hash == EMPTY_HASH {
                return None;
            }

            if distance > self.probe_distance(pos, slot_hash) {
                return None;
            }

            if slot_hash == hash && eq(&self.key_at(pos)) {
                return Some(pos);
            }

            pos = self.next_position(pos);
            distance += 1;
        }

        None
    }

    /// Turns the first tombstone at or after `start` into an empty slot.
    ///
    /// The run following the tombstone is shifted back one slot, tombstones
    /// included, until it reaches an empty slot or an entry sitting at its
    /// ideal position. Each shifted slot keeps a probe distance at least as
    /// large as any probe crossing it, so no lookup is cut short.
    ///
    /// Only called when the table has no empty slot and `tombstones > 0`.
    fn purge_tombstone(&mut self, start: usize) {
        let mut hole = start;
        while !is_tombstone(self.hash_at(hole)) {
            hole = self.next_position(hole);
        }
        tracing::trace!(pos = hole, "purging tombstone to free a slot");

        // Every move lowers one probe distance by one, so the walk ends even
        // when the run wraps all the way around the table.
        loop {
            let next = self.next_position(hole);
            let next_hash = self.hash_at(next);
            if next_hash == EMPTY_HASH || self.probe_distance(next, next_hash) == 0 {
                break;
            }

            let key = self.key_at(next);
            let value = self.value_at(next);
            self.write_slot(hole, next_hash, &key, &value);
            hole = next;
        }

        self.write_hash(hole, EMPTY_HASH);
        self.tombstones -= 1;
    }

    /// Places an entry without checking whether its key is already present.
    ///
    /// `hash` must already be normalized. The entry travels forward from its
    /// ideal position, displacing any resident that sits closer to its own
    /// ideal position and carrying the displaced entry onward in its place.
    /// A tombstone in that situation is simply overwritten.
    fn insert_unchecked(&mut self, hash: u32, key: K, value: V) -> Result<()> {
        let capacity = self.capacity();
        if self.populated >= capacity {
            tracing::debug!(capacity, "hash table full, insertion rejected");
            return Err(Error::TableFull { capacity });
        }

        let (mut hash, mut key, mut value) = (hash, key, value);
        let mut pos = self.ideal_position(hash);
        let mut distance = 0;

        // The walk below ends at the first empty slot, so make sure one exists.
        if self.populated + self.tombstones == capacity {
            self.purge_tombstone(pos);
        }

        loop {
            let slot_hash = self.hash_at(pos);
            if slot_hash == EMPTY_HASH {
                self.write_slot(pos, hash, &key, &value);
                self.populated += 1;
                return Ok(());
            }

            let existing = self.probe_distance(pos, slot_hash);
            if is_tombstone(slot_hash) {
                if existing < distance {
                    tracing::trace!(pos, distance, "reclaiming tombstone");
                    self.write_slot(pos, hash, &key, &value);
                    self.populated += 1;
                    self.tombstones -= 1;
                    return Ok(());
                }
            } else if existing < distance {
                let resident_key = self.key_at(pos);
                let resident_value = self.value_at(pos);
                self.write_slot(pos, hash, &key, &value);

                hash = slot_hash;
                key = resident_key;
                value = resident_value;
                distance = existing;
            }

            pos = self.next_position(pos);
            distance += 1;
        }
    }

    /// Inserts an entry whose key the caller knows to be absent.
    ///
    /// This skips the lookup that [`set`](HashTable::set) performs. Inserting
    /// a key that is already present stores a second, shadowed copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableFull`] when every slot holds a live entry.
    pub fn insert_unique(&mut self, hash: u32, key: K, value: V) -> Result<()> {
        self.insert_unchecked(normalize_hash(hash), key, value)
    }

    /// Associates `key` with `value`.
    ///
    /// If an entry with an equal key exists its value is overwritten in place
    /// and the previous value is returned. Otherwise the entry is inserted and
    /// `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableFull`] when the key is absent and every slot
    /// holds a live entry. Overwriting an existing key always succeeds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_arena::hash_table::HashTable;
    ///
    /// let mut buffer = [0u8; 256];
    /// let mut table: HashTable<'_, u32, u16> = HashTable::new(&mut buffer);
    ///
    /// assert_eq!(table.set(13, 13, 42), Ok(None));
    /// assert_eq!(table.set(13, 13, 37), Ok(Some(42)));
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn set(&mut self, hash: u32, key: K, value: V) -> Result<Option<V>>
    where
        K: PartialEq,
    {
        let hash = normalize_hash(hash);
        match self.find_slot(hash, |k| *k == key) {
            Some(pos) => {
                let previous = self.value_at(pos);
                self.write_value(pos, &value);
                Ok(Some(previous))
            }
            None => {
                self.insert_unchecked(hash, key, value)?;
                Ok(None)
            }
        }
    }

    /// Returns the entry stored under `hash` whose key satisfies `eq`.
    pub fn find(&self, hash: u32, eq: impl Fn(&K) -> bool) -> Option<(K, V)> {
        self.find_slot(normalize_hash(hash), eq)
            .map(|pos| (self.key_at(pos), self.value_at(pos)))
    }

    /// Returns `true` if an entry under `hash` has a key satisfying `eq`.
    pub fn contains(&self, hash: u32, eq: impl Fn(&K) -> bool) -> bool {
        self.find_slot(normalize_hash(hash), eq).is_some()
    }

    /// Removes the entry stored under `hash` whose key satisfies `eq` and
    /// returns it.
    ///
    /// The slot becomes a tombstone: its hash gains the [`DELETED_BIT`] and its
    /// key and value bytes stay in the buffer until overwritten. Removing an
    /// absent key changes nothing and returns `None`.
    pub fn remove(&mut self, hash: u32, eq: impl Fn(&K) -> bool) -> Option<(K, V)> {
        let pos = self.find_slot(normalize_hash(hash), eq)?;
        let slot_hash = self.hash_at(pos);
        self.write_hash(pos, slot_hash | DELETED_BIT);
        self.populated -= 1;
        self.tombstones += 1;
        Some((self.key_at(pos), self.value_at(pos)))
    }

    /// Removes every entry, leaving all slots empty.
    pub fn clear(&mut self) {
        let end = self.capacity() * HASH_SIZE;
        self.arena[..end].fill(0);
        self.populated = 0;
        self.tombstones = 0;
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of slots in the table.
    pub fn capacity(&self) -> usize {
        self.layout.capacity()
    }

    /// Returns the geometry of the underlying buffer.
    pub fn layout(&self) -> ArenaLayout {
        self.layout
    }

    /// Ratio of live entries to slots.
    ///
    /// A table of capacity zero reports `1.0`, as it can take no entries.
    pub fn load_factor(&self) -> f32 {
        if self.capacity() == 0 {
            return 1.0;
        }
        self.populated as f32 / self.capacity() as f32
    }

    /// Returns `true` once the load factor exceeds
    /// [`MIGRATE_LOAD_FACTOR`], at which point the table should be moved into
    /// a larger buffer with [`copy_to`](HashTable::copy_to).
    pub fn needs_migration(&self) -> bool {
        self.load_factor() > MIGRATE_LOAD_FACTOR
    }

    /// Returns a cursor positioned before the first slot.
    pub fn cursor(&self) -> Cursor {
        Cursor::new()
    }

    /// Advances `cursor` to the next live entry and returns it.
    ///
    /// Empty slots and tombstones are skipped. Once the end is reached the
    /// cursor stays exhausted and `None` is returned.
    ///
    /// A cursor is a plain slot offset. Mutating the table while a cursor is
    /// in use is a logic error: it stays memory safe but may skip entries or
    /// yield some twice.
    pub fn next_entry(&self, cursor: &mut Cursor) -> Option<(K, V)> {
        let capacity = self.capacity();
        for index in cursor.offset..capacity {
            if is_live(self.hash_at(index)) {
                cursor.offset = index + 1;
                return Some((self.key_at(index), self.value_at(index)));
            }
        }

        cursor.offset = capacity;
        None
    }

    /// Returns an iterator over copies of all live entries in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_arena::hash_table::HashTable;
    ///
    /// let mut buffer = [0u8; 256];
    /// let mut table: HashTable<'_, u8, u8> = HashTable::new(&mut buffer);
    /// table.set(1, 1, 10).unwrap();
    /// table.set(2, 2, 20).unwrap();
    ///
    /// let mut entries: Vec<_> = table.iter().collect();
    /// entries.sort();
    /// assert_eq!(entries, [(1, 10), (2, 20)]);
    /// ```
    pub fn iter(&self) -> Iter<'_, 'a, K, V> {
        Iter {
            table: self,
            cursor: Cursor::new(),
        }
    }

    /// Builds a new table over `buffer` holding every live entry of this one.
    ///
    /// Entries are re-inserted with their stored hashes, so tombstones are
    /// dropped and probe sequences are rebuilt from scratch. The source table
    /// is left untouched. This is the only way to grow or compact a table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] if the new table would have fewer
    /// slots than this table has live entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_arena::hash_table::HashTable;
    ///
    /// let mut small = [0u8; 24];
    /// let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut small);
    /// table.set(1, 1, 1).unwrap();
    /// table.set(2, 2, 2).unwrap();
    /// assert!(table.needs_migration());
    ///
    /// let mut large = [0u8; 240];
    /// let grown = table.copy_to(&mut large).unwrap();
    /// assert_eq!(grown.capacity(), 20);
    /// assert_eq!(grown.find(2, |&k| k == 2), Some((2, 2)));
    /// ```
    pub fn copy_to<'b>(&self, buffer: &'b mut [u8]) -> Result<HashTable<'b, K, V>> {
        let layout = ArenaLayout::for_types::<K, V>(buffer.len());
        if layout.capacity() < self.populated {
            return Err(Error::BufferTooSmall {
                required: layout.stride() * self.populated,
                provided: buffer.len(),
            });
        }

        let mut table = HashTable::new(buffer);
        for index in 0..self.capacity() {
            let hash = self.hash_at(index);
            if is_live(hash) {
                table.insert_unchecked(hash, self.key_at(index), self.value_at(index))?;
            }
        }

        tracing::debug!(
            from_capacity = self.capacity(),
            to_capacity = table.capacity(),
            entries = table.len(),
            "hash table migrated"
        );

        Ok(table)
    }
}

#[cfg(any(test, feature = "stats"))]
impl<K: Pod, V: Pod> HashTable<'_, K, V> {
    /// Counts live entries by probe distance.
    ///
    /// Requires the `stats` feature.
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut histogram = ProbeHistogram {
            distances: alloc::vec::Vec::new(),
            tombstones: 0,
        };

        for index in 0..self.capacity() {
            let hash = self.hash_at(index);
            if is_tombstone(hash) {
                histogram.tombstones += 1;
            } else if hash != EMPTY_HASH {
                let distance = self.probe_distance(index, hash);
                if histogram.distances.len() <= distance {
                    histogram.distances.resize(distance + 1, 0);
                }
                histogram.distances[distance] += 1;
            }
        }

        histogram
    }

    /// Largest probe distance of any live entry.
    ///
    /// Requires the `stats` feature.
    pub fn max_probe_distance(&self) -> usize {
        (0..self.capacity())
            .filter(|&index| is_live(self.hash_at(index)))
            .map(|index| self.probe_distance(index, self.hash_at(index)))
            .max()
            .unwrap_or(0)
    }

    /// Returns utilization statistics for debugging.
    ///
    /// Requires the `stats` feature.
    pub fn debug_stats(&self) -> DebugStats {
        let histogram = self.probe_histogram();
        let total_distance: usize = histogram
            .distances
            .iter()
            .enumerate()
            .map(|(distance, count)| distance * count)
            .sum();
        debug_assert_eq!(histogram.tombstones, self.tombstones);
        let empty_slots = self.capacity() - self.populated - histogram.tombstones;

        DebugStats {
            populated: self.populated,
            capacity: self.capacity(),
            tombstones: histogram.tombstones,
            empty_slots,
            load_factor: self.load_factor(),
            max_probe_distance: histogram.distances.len().saturating_sub(1),
            mean_probe_distance: if self.populated == 0 {
                0.0
            } else {
                total_distance as f64 / self.populated as f64
            },
            total_bytes: self.arena.len(),
            wasted_bytes: self.arena.len() - self.layout.used_bytes()
                + (empty_slots + histogram.tombstones) * self.layout.stride(),
        }
    }
}

/// Live entry counts per probe distance, plus the number of tombstones.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    /// `distances[d]` is the number of live entries `d` slots past their
    /// ideal position.
    pub distances: alloc::vec::Vec<usize>,
    /// Number of slots holding a removed entry.
    pub tombstones: usize,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// Pretty-prints the histogram as a horizontal bar chart.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self
            .distances
            .iter()
            .copied()
            .chain(core::iter::once(self.tombstones))
            .max()
            .unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let mut bar = "█".repeat(units / 8);
            let partial = match units % 8 {
                1 => Some('▏'),
                2 => Some('▎'),
                3 => Some('▍'),
                4 => Some('▌'),
                5 => Some('▋'),
                6 => Some('▊'),
                7 => Some('▉'),
                _ => None,
            };
            bar.extend(partial);
            bar
        };

        let live: usize = self.distances.iter().sum();
        println!("probe histogram ({} entries):", live);
        for (distance, &count) in self.distances.iter().enumerate() {
            println!("{:>3} | {} ({})", distance, make_bar(count), count);
        }
        println!(" TS | {} ({})", make_bar(self.tombstones), self.tombstones);
    }
}

/// Debug statistics for hash table analysis.
///
/// Requires the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries
    pub populated: usize,
    /// Number of slots
    pub capacity: usize,
    /// Number of slots holding a removed entry
    pub tombstones: usize,
    /// Number of never-used slots
    pub empty_slots: usize,
    /// Load factor (populated / capacity)
    pub load_factor: f32,
    /// Largest probe distance of a live entry
    pub max_probe_distance: usize,
    /// Average probe distance over live entries
    pub mean_probe_distance: f64,
    /// Length of the borrowed buffer in bytes
    pub total_bytes: usize,
    /// Bytes not holding a live entry, including the unused buffer tail
    pub wasted_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.populated,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Slots: {} empty, {} tombstones",
            self.empty_slots, self.tombstones
        );
        println!(
            "Probe distance: max {}, mean {:.3}",
            self.max_probe_distance, self.mean_probe_distance
        );
        println!("Buffer: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// A restartable position within a table's slots.
///
/// Obtained from `cursor()` on a table, map or set and advanced with their
/// `next_*` methods. It holds no borrow, so nothing stops the table from
/// being mutated between steps; doing so gives unspecified (but memory safe)
/// results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    offset: usize,
}

impl Cursor {
    /// A cursor positioned before the first slot.
    pub const fn new() -> Self {
        Self { offset: 0 }
    }

    /// Index of the slot the next scan starts from.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Rewinds the cursor to the first slot.
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

/// An iterator over the live entries of a [`HashTable`].
///
/// This struct is created by the [`iter`] method on [`HashTable`]. It yields
/// copies of each `(key, value)` pair in slot order.
///
/// [`iter`]: HashTable::iter
pub struct Iter<'t, 'a, K, V> {
    table: &'t HashTable<'a, K, V>,
    cursor: Cursor,
}

impl<K: Pod, V: Pod> Iterator for Iter<'_, '_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.table.next_entry(&mut self.cursor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.capacity() - self.cursor.offset;
        (0, Some(remaining.min(self.table.len())))
    }
}

impl<K: Pod, V: Pod> FusedIterator for Iter<'_, '_, K, V> {}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::hash::Hasher;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::layout::map_buffer_size;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    fn hash_key(state: &HashState, key: u64) -> u32 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish() as u32
    }

    /// Every pair of neighbouring live slots obeys `d(next) <= d(prev) + 1`.
    fn assert_robin_hood_order<K: Pod, V: Pod>(table: &HashTable<'_, K, V>) {
        let capacity = table.capacity();
        for pos in 0..capacity {
            let next = table.next_position(pos);
            let (a, b) = (table.hash_at(pos), table.hash_at(next));
            if is_live(a) && is_live(b) {
                assert!(
                    table.probe_distance(next, b) <= table.probe_distance(pos, a) + 1,
                    "slots {pos} and {next} out of order: {:#?}",
                    table
                );
            }
        }
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut buffer = vec![0u8; map_buffer_size::<u64, i32>(64)];
        let mut table: HashTable<'_, u64, i32> = HashTable::new(&mut buffer);

        for k in 0..64u64 {
            let hash = hash_key(&state, k);
            assert_eq!(table.set(hash, k, (k as i32) * 2), Ok(None));
            assert_eq!(
                table.find(hash, |&v| v == k),
                Some((k, (k as i32) * 2)),
                "{:#?}",
                table
            );
        }
        assert_eq!(table.len(), 64);
        for k in 0..64u64 {
            let hash = hash_key(&state, k);
            assert_eq!(table.find(hash, |&v| v == k), Some((k, (k as i32) * 2)));
        }

        let miss_hash = hash_key(&state, 999);
        assert!(table.find(miss_hash, |&v| v == 999).is_none());
        assert_robin_hood_order(&table);
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut buffer = vec![0u8; map_buffer_size::<u32, u16>(1024)];
        let mut table: HashTable<'_, u32, u16> = HashTable::new(&mut buffer);
        assert_eq!(table.len(), 0);

        table.set(13, 13, 42).unwrap();
        assert_eq!(table.len(), 1);

        assert_eq!(table.set(13, 13, 37), Ok(Some(42)));
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(13, |&k| k == 13), Some((13, 37)));
    }

    #[test]
    fn explicit_collision() {
        let mut buffer = vec![0u8; map_buffer_size::<u32, u16>(1024)];
        let mut table: HashTable<'_, u32, u16> = HashTable::new(&mut buffer);

        table.set(13, 13, 37).unwrap();
        table.set(13, 42, 1337).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.find(13, |&k| k == 42), Some((42, 1337)));
        assert_eq!(table.find(13, |&k| k == 13), Some((13, 37)));

        assert_eq!(table.remove(13, |&k| k == 42), Some((42, 1337)));
        assert_eq!(table.len(), 1);
        assert!(table.find(13, |&k| k == 42).is_none());
        assert_eq!(table.find(13, |&k| k == 13), Some((13, 37)));
    }

    #[test]
    fn colliding_chain_wraps_around() {
        let mut buffer = [0u8; 8 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
        assert_eq!(table.capacity(), 8);

        // Every hash lands on the last slot, forcing the chain to wrap.
        for k in 0..6u32 {
            table.set(7, k, k * 10).unwrap();
        }
        for k in 0..6u32 {
            assert_eq!(table.find(7, |&v| v == k), Some((k, k * 10)));
        }
        assert_robin_hood_order(&table);
    }

    #[test]
    fn richer_entries_are_displaced() {
        let mut buffer = [0u8; 8 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);

        table.set(1, 100, 0).unwrap();
        table.set(2, 200, 0).unwrap();
        // Ideal slot 1 is taken; slot 2 holds an entry at distance 0 which
        // must move aside for the newcomer at distance 1.
        table.set(1, 101, 0).unwrap();

        assert_eq!(table.key_at(1), 100);
        assert_eq!(table.key_at(2), 101);
        assert_eq!(table.key_at(3), 200);
        assert_robin_hood_order(&table);
    }

    #[test]
    fn remove_leaves_tombstone() {
        let mut buffer = [0u8; 8 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);

        table.set(3, 30, 300).unwrap();
        assert_eq!(table.remove(3, |&k| k == 30), Some((30, 300)));
        assert!(table.is_empty());

        assert_eq!(table.hash_at(3), 3 | DELETED_BIT);
        assert_eq!(table.key_at(3), 30);
        assert_eq!(table.value_at(3), 300);
        assert_eq!(table.probe_distance(3, table.hash_at(3)), 0);
    }

    #[test]
    fn remove_absent_is_noop() {
        let state = HashState::default();
        let mut buffer = vec![0u8; map_buffer_size::<u64, u64>(16)];
        let mut table: HashTable<'_, u64, u64> = HashTable::new(&mut buffer);
        for k in 0..10u64 {
            table.set(hash_key(&state, k), k, k).unwrap();
        }

        let before: Vec<_> = table.iter().collect();
        assert!(table.remove(hash_key(&state, 77), |&k| k == 77).is_none());
        assert!(table.remove(hash_key(&state, 3), |&k| k == 4).is_none());
        assert_eq!(table.len(), 10);
        assert_eq!(table.iter().collect::<Vec<_>>(), before);
    }

    #[test]
    fn lookup_continues_past_tombstones() {
        let mut buffer = [0u8; 8 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);

        table.set(2, 1, 1).unwrap();
        table.set(2, 2, 2).unwrap();
        table.set(2, 3, 3).unwrap();
        table.remove(2, |&k| k == 1);
        table.remove(2, |&k| k == 2);

        assert_eq!(table.find(2, |&k| k == 3), Some((3, 3)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn tombstone_reclaimed_by_poorer_entry() {
        let mut buffer = [0u8; 8 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);

        table.set(4, 40, 0).unwrap();
        table.remove(4, |&k| k == 40);
        table.set(3, 30, 0).unwrap();
        // Slot 3 is taken, the newcomer reaches the tombstone at distance 1
        // while the tombstone sits at distance 0.
        table.set(3, 31, 0).unwrap();

        assert_eq!(table.hash_at(4), 3);
        assert_eq!(table.key_at(4), 31);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn zero_hash_aliases_one() {
        let mut buffer = [0u8; 8 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);

        table.set(0, 5, 50).unwrap();
        assert_eq!(table.hash_at(1), 1);
        assert_eq!(table.find(1, |&k| k == 5), Some((5, 50)));
        assert_eq!(table.find(0, |&k| k == 5), Some((5, 50)));

        table.set(DELETED_BIT | 6, 6, 60).unwrap();
        assert_eq!(table.find(6, |&k| k == 6), Some((6, 60)));
        assert!(table.iter().all(|(k, _)| k == 5 || k == 6));
    }

    #[test]
    fn full_table_rejects_new_keys() {
        let mut buffer = [0u8; 4 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
        for k in 0..4u32 {
            table.set(k + 1, k, k).unwrap();
        }
        assert_eq!(table.load_factor(), 1.0);
        assert!(table.needs_migration());

        assert_eq!(
            table.set(9, 9, 9),
            Err(Error::TableFull { capacity: 4 })
        );
        assert_eq!(table.set(1, 0, 100), Ok(Some(0)));
        assert_eq!(table.len(), 4);
        assert_eq!(table.find(1, |&k| k == 0), Some((0, 100)));
    }

    #[test]
    fn tombstone_purged_when_no_slot_is_empty() {
        let mut buffer = [0u8; 4 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
        for k in 10..14u32 {
            table.set(1, k, k).unwrap();
        }
        // The only free slot is a tombstone and no slot is empty.
        assert_eq!(table.remove(1, |&k| k == 13), Some((13, 13)));
        assert_eq!(table.probe_histogram().tombstones, 1);
        table.set(1, 20, 20).unwrap();

        assert_eq!(table.len(), 4);
        for k in [10u32, 11, 12, 20] {
            assert_eq!(table.find(1, |&v| v == k), Some((k, k)));
        }
        assert_eq!(table.probe_histogram().tombstones, 0);
    }

    /// Lays out slots directly. A hash of `0` leaves the slot empty; keys and
    /// values are both set to `key`.
    fn table_from_slots<'a>(
        buffer: &'a mut [u8],
        slots: &[(u32, u32)],
    ) -> HashTable<'a, u32, u32> {
        let mut table: HashTable<'_, u32, u32> = HashTable::new(buffer);
        assert_eq!(table.capacity(), slots.len());
        for (pos, &(hash, key)) in slots.iter().enumerate() {
            if hash == EMPTY_HASH {
                continue;
            }
            table.write_slot(pos, hash, &key, &key);
            if is_tombstone(hash) {
                table.tombstones += 1;
            } else {
                table.populated += 1;
            }
        }
        table
    }

    fn assert_every_entry_reachable(table: &HashTable<'_, u32, u32>) {
        let mut seen = 0;
        for pos in 0..table.capacity() {
            let hash = table.hash_at(pos);
            if is_live(hash) {
                let key = table.key_at(pos);
                assert_eq!(
                    table.find(hash, |&k| k == key),
                    Some((key, key)),
                    "lost key {key}: {:?}",
                    table
                );
                seen += 1;
            }
        }
        assert_eq!(seen, table.len(), "{:?}", table);
        assert_eq!(table.debug_stats().tombstones, table.tombstones);
    }

    #[test]
    fn insert_without_empty_slot_keeps_crossing_chain_reachable() {
        // Slot 0 is a tombstone from home 2 at distance 1; key 21 (home 2)
        // probes through it to slot 1. A newcomer from home 0 finds no empty
        // slot and no poorer resident on its whole way round.
        let mut buffer = [0u8; 3 * 12];
        let mut table = table_from_slots(&mut buffer, &[(2 | DELETED_BIT, 20), (2, 21), (3, 12)]);
        assert_every_entry_reachable(&table);

        table.set(3, 30, 30).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.find(2, |&k| k == 21), Some((21, 21)));
        assert_eq!(table.find(3, |&k| k == 12), Some((12, 12)));
        assert_eq!(table.find(3, |&k| k == 30), Some((30, 30)));
        assert_every_entry_reachable(&table);
    }

    #[test]
    fn insert_without_empty_slot_with_two_wrapped_chains() {
        // Homes 1 and 7 in nine slots, both chains wrapped around the end.
        let tomb = |hash: u32| hash | DELETED_BIT;
        let mut buffer = [0u8; 9 * 12];
        let mut table = table_from_slots(
            &mut buffer,
            &[
                (1, 100),
                (7, 101),
                (7, 102),
                (7, 103),
                (tomb(7), 104),
                (7, 105),
                (7, 106),
                (tomb(1), 107),
                (1, 108),
            ],
        );
        assert_eq!(table.len(), 7);
        assert_every_entry_reachable(&table);

        table.set(7, 9, 9).unwrap();
        assert_eq!(table.len(), 8);
        assert_eq!(table.tombstones, 1);
        for (hash, key) in [(1, 100), (1, 108), (7, 101), (7, 105), (7, 106), (7, 9)] {
            assert_eq!(table.find(hash, |&k| k == key), Some((key, key)), "{:?}", table);
        }
        assert_every_entry_reachable(&table);

        table.set(1, 10, 10).unwrap();
        assert_eq!(table.len(), 9);
        assert_eq!(table.tombstones, 0);
        assert_every_entry_reachable(&table);
    }

    #[test]
    fn purge_on_single_slot_table() {
        let mut buffer = [0u8; 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
        table.set(5, 5, 5).unwrap();
        table.remove(5, |&k| k == 5);
        table.set(6, 6, 6).unwrap();
        assert_eq!(table.find(6, |&k| k == 6), Some((6, 6)));
        assert_eq!(table.tombstones, 0);
    }

    #[test]
    fn small_table_churn_with_colliding_homes() {
        for seed in 0..64u64 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let capacity = rng.random_range(2..12usize);
            let homes = [1u32, 7, capacity as u32 - 1];
            let mut buffer = vec![0u8; capacity * 12];
            let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
            let mut model: BTreeMap<u32, u32> = BTreeMap::new();
            let hash_of = |key: u32| homes[key as usize % homes.len()];

            for step in 0..400u32 {
                let key = rng.random_range(0..24u32);
                let hash = hash_of(key);
                if rng.random_bool(0.6) {
                    let result = table.set(hash, key, step);
                    if model.contains_key(&key) || model.len() < capacity {
                        assert_eq!(result, Ok(model.insert(key, step)), "seed {seed}");
                    } else {
                        assert_eq!(result, Err(Error::TableFull { capacity }));
                    }
                } else {
                    assert_eq!(
                        table.remove(hash, |&k| k == key).map(|(_, v)| v),
                        model.remove(&key),
                        "seed {seed}"
                    );
                }

                assert_eq!(table.len(), model.len());
                for (&k, &v) in &model {
                    assert_eq!(
                        table.find(hash_of(k), |&x| x == k),
                        Some((k, v)),
                        "seed {seed} step {step} lost key {k}: {:?}",
                        table
                    );
                }
            }
        }
    }

    #[test]
    fn zero_capacity_table() {
        let mut buffer = [0u8; 5];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.load_factor(), 1.0);
        assert!(table.find(1, |_| true).is_none());
        assert!(table.remove(1, |_| true).is_none());
        assert_eq!(table.set(1, 1, 1), Err(Error::TableFull { capacity: 0 }));
        assert_eq!(table.iter().count(), 0);

        let mut buffer = [0u8; 5];
        assert_eq!(
            HashTable::<u32, u32>::try_new(&mut buffer).unwrap_err(),
            Error::BufferTooSmall {
                required: 12,
                provided: 5
            }
        );
    }

    #[test]
    fn cursor_walks_live_slots() {
        let mut buffer = [0u8; 16 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
        table.set(12, 12, 24).unwrap();
        table.set(1337, 1337, 7331).unwrap();
        table.set(5, 5, 50).unwrap();
        table.remove(5, |&k| k == 5);

        let mut cursor = table.cursor();
        let mut seen = Vec::new();
        while let Some(entry) = table.next_entry(&mut cursor) {
            seen.push(entry);
        }
        seen.sort();
        assert_eq!(seen, [(12, 24), (1337, 7331)]);
        assert_eq!(cursor.offset(), table.capacity());
        assert!(table.next_entry(&mut cursor).is_none());

        cursor.reset();
        assert!(table.next_entry(&mut cursor).is_some());
    }

    #[test]
    fn clear_empties_every_slot() {
        let state = HashState::default();
        let mut buffer = vec![0u8; map_buffer_size::<u64, u64>(32)];
        let mut table: HashTable<'_, u64, u64> = HashTable::new(&mut buffer);
        for k in 0..32u64 {
            table.set(hash_key(&state, k), k, k).unwrap();
        }
        table.remove(hash_key(&state, 0), |&k| k == 0);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
        assert_eq!(table.probe_histogram().tombstones, 0);
        assert!(table.find(hash_key(&state, 1), |&k| k == 1).is_none());
    }

    #[test]
    fn copy_preserves_entries_and_drops_tombstones() {
        let state = HashState::default();
        let mut old_buffer = vec![0u8; map_buffer_size::<u64, u64>(100)];
        let mut table: HashTable<'_, u64, u64> = HashTable::new(&mut old_buffer);
        for k in 0..100u64 {
            table.set(hash_key(&state, k), k, k * 3).unwrap();
        }
        for k in (0..100u64).step_by(3) {
            table.remove(hash_key(&state, k), |&v| v == k);
        }

        let mut new_buffer = vec![0u8; map_buffer_size::<u64, u64>(400)];
        let copy = table.copy_to(&mut new_buffer).unwrap();
        assert_eq!(copy.len(), table.len());
        assert_eq!(copy.probe_histogram().tombstones, 0);
        for k in 0..100u64 {
            let hash = hash_key(&state, k);
            assert_eq!(copy.find(hash, |&v| v == k), table.find(hash, |&v| v == k));
        }
        assert_robin_hood_order(&copy);
    }

    #[test]
    fn copy_into_small_buffer_fails() {
        let mut old_buffer = [0u8; 8 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut old_buffer);
        for k in 0..5u32 {
            table.set(k, k, k).unwrap();
        }

        let mut new_buffer = [0u8; 4 * 12];
        assert_eq!(
            table.copy_to(&mut new_buffer).unwrap_err(),
            Error::BufferTooSmall {
                required: 60,
                provided: 48
            }
        );

        let mut exact_buffer = [0u8; 5 * 12];
        let copy = table.copy_to(&mut exact_buffer).unwrap();
        assert_eq!(copy.len(), 5);
        assert_eq!(copy.load_factor(), 1.0);
    }

    #[test]
    fn probe_distance_stays_small() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut buffer = vec![0u8; 1000 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);

        let mut k = 0u32;
        while table.load_factor() < 0.9 {
            table.insert_unique(rng.random(), k, k).unwrap();
            k += 1;
        }

        let histogram = table.probe_histogram();
        assert_eq!(histogram.distances.iter().sum::<usize>(), table.len());
        assert_eq!(table.max_probe_distance(), histogram.distances.len() - 1);
        assert!(
            table.max_probe_distance() < 64,
            "max probe distance {} at load factor {}",
            table.max_probe_distance(),
            table.load_factor()
        );
        assert_robin_hood_order(&table);
    }

    #[test]
    fn debug_stats_account_for_every_slot() {
        let mut buffer = [0u8; 10 * 12 + 7];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
        for k in 0..6u32 {
            table.set(k + 1, k, k).unwrap();
        }
        table.remove(1, |&k| k == 0);

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 5);
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.empty_slots, 4);
        assert_eq!(stats.max_probe_distance, 0);
        assert_eq!(stats.total_bytes, 127);
        assert_eq!(stats.wasted_bytes, 7 + 5 * 12);
    }

    #[test]
    fn debug_output_marks_slot_states() {
        let mut buffer = [0u8; 3 * 12];
        let mut table: HashTable<'_, u32, u32> = HashTable::new(&mut buffer);
        table.set(1, 1, 1).unwrap();
        table.set(2, 2, 2).unwrap();
        table.remove(2, |&k| k == 2);

        let output = alloc::format!("{:?}", table);
        assert!(output.contains("........"), "{output}");
        assert!(output.contains("00000001"), "{output}");
        assert!(output.contains("~0000002"), "{output}");
    }
}
