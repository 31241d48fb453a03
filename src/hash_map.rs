use core::fmt::Debug;
use core::iter::FusedIterator;

use bytemuck::Pod;

use crate::error::Result;
use crate::hash_table::Cursor;
use crate::hash_table::HashTable;

/// A fixed-capacity hash map stored in a borrowed buffer.
///
/// `HashMap<'a, K, V>` wraps a [`HashTable`] and compares keys with
/// `PartialEq`. The caller hashes keys and passes the 32-bit hash to every
/// operation; the map stores the hash alongside the key so it never needs to
/// rehash.
///
/// # Performance Characteristics
///
/// - **Memory**: 4 bytes per slot for the hash, plus the sizes of `K` and `V`.
/// - Lookups stop early once they pass the point where robin-hood ordering
///   says the key would have been placed.
///
/// # Examples
///
/// ```rust
/// use robin_arena::HashMap;
/// use robin_arena::layout::map_buffer_size;
///
/// let mut buffer = vec![0u8; map_buffer_size::<u32, u16>(1024)];
/// let mut map: HashMap<'_, u32, u16> = HashMap::new(&mut buffer);
///
/// map.insert(13, 13, 42).unwrap();
/// map.insert(13, 13, 37).unwrap();
/// assert_eq!(map.len(), 1);
/// assert_eq!(map.get(13, &13), Some(37));
/// ```
pub struct HashMap<'a, K, V> {
    table: HashTable<'a, K, V>,
}

impl<K, V> Debug for HashMap<'_, K, V>
where
    K: Debug + Pod + PartialEq,
    V: Debug + Pod,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V> HashMap<'a, K, V>
where
    K: Pod + PartialEq,
    V: Pod,
{
    /// Creates an empty map over `buffer`.
    ///
    /// See [`HashTable::new`] for how the capacity is derived.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            table: HashTable::new(buffer),
        }
    }

    /// Creates an empty map over `buffer`, failing if it cannot hold a single
    /// entry.
    pub fn try_new(buffer: &'a mut [u8]) -> Result<Self> {
        HashTable::try_new(buffer).map(|table| Self { table })
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots in the map.
    ///
    /// The map accepts new keys until every slot is live, but lookups slow
    /// down well before that; see [`needs_migration`](HashMap::needs_migration).
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Ratio of entries to slots.
    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    /// Returns `true` once the map should be migrated into a larger buffer.
    pub fn needs_migration(&self) -> bool {
        self.table.needs_migration()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Associates `key` with `value`, returning the value it replaced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableFull`](crate::Error::TableFull) if `key` is new
    /// and no slot is free.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_arena::HashMap;
    ///
    /// let mut buffer = [0u8; 120];
    /// let mut map: HashMap<'_, u32, u32> = HashMap::new(&mut buffer);
    ///
    /// assert_eq!(map.insert(1, 1, 10), Ok(None));
    /// assert_eq!(map.insert(1, 1, 11), Ok(Some(10)));
    /// ```
    pub fn insert(&mut self, hash: u32, key: K, value: V) -> Result<Option<V>> {
        self.table.set(hash, key, value)
    }

    /// Returns the value stored for `key`.
    pub fn get(&self, hash: u32, key: &K) -> Option<V> {
        self.table.find(hash, |k| k == key).map(|(_, v)| v)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value(&self, hash: u32, key: &K) -> Option<(K, V)> {
        self.table.find(hash, |k| k == key)
    }

    /// Returns `true` if the map contains `key`.
    pub fn contains_key(&self, hash: u32, key: &K) -> bool {
        self.table.contains(hash, |k| k == key)
    }

    /// Removes `key` from the map, returning its value.
    ///
    /// Removing an absent key leaves the map untouched.
    pub fn remove(&mut self, hash: u32, key: &K) -> Option<V> {
        self.table.remove(hash, |k| k == key).map(|(_, v)| v)
    }

    /// Removes `key` from the map, returning the stored key and value.
    pub fn remove_entry(&mut self, hash: u32, key: &K) -> Option<(K, V)> {
        self.table.remove(hash, |k| k == key)
    }

    /// Returns a cursor positioned before the first entry.
    pub fn cursor(&self) -> Cursor {
        self.table.cursor()
    }

    /// Advances `cursor` and returns the next entry.
    ///
    /// See [`HashTable::next_entry`] for the rules on mutation while a cursor
    /// is live.
    pub fn next_entry(&self, cursor: &mut Cursor) -> Option<(K, V)> {
        self.table.next_entry(cursor)
    }

    /// Returns an iterator over copies of all entries.
    pub fn iter(&self) -> Iter<'_, 'a, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over copies of all keys.
    pub fn keys(&self) -> Keys<'_, 'a, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over copies of all values.
    pub fn values(&self) -> Values<'_, 'a, K, V> {
        Values { inner: self.iter() }
    }

    /// Builds a map over `buffer` holding every entry of this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`](crate::Error::BufferTooSmall) if
    /// `buffer` has fewer slots than this map has entries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_arena::HashMap;
    /// use robin_arena::layout::map_buffer_size;
    ///
    /// let mut old_buffer = vec![0u8; map_buffer_size::<u64, u16>(3)];
    /// let mut map: HashMap<'_, u64, u16> = HashMap::new(&mut old_buffer);
    /// map.insert(1, 100, 23).unwrap();
    /// map.insert(2, 200, 31).unwrap();
    ///
    /// let mut new_buffer = vec![0u8; map_buffer_size::<u64, u16>(256)];
    /// let grown = map.copy_to(&mut new_buffer).unwrap();
    /// assert!(grown.load_factor() < map.load_factor());
    /// assert_eq!(grown.get(2, &200), Some(31));
    /// ```
    pub fn copy_to<'b>(&self, buffer: &'b mut [u8]) -> Result<HashMap<'b, K, V>> {
        self.table.copy_to(buffer).map(|table| HashMap { table })
    }

    /// Returns the underlying table.
    pub fn as_table(&self) -> &HashTable<'a, K, V> {
        &self.table
    }
}

/// An iterator over the entries of a `HashMap`.
pub struct Iter<'m, 'a, K, V> {
    inner: crate::hash_table::Iter<'m, 'a, K, V>,
}

impl<K: Pod, V: Pod> Iterator for Iter<'_, '_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Pod, V: Pod> FusedIterator for Iter<'_, '_, K, V> {}

/// An iterator over the keys of a `HashMap`.
pub struct Keys<'m, 'a, K, V> {
    inner: Iter<'m, 'a, K, V>,
}

impl<K: Pod, V: Pod> Iterator for Keys<'_, '_, K, V> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Pod, V: Pod> FusedIterator for Keys<'_, '_, K, V> {}

/// An iterator over the values of a `HashMap`.
pub struct Values<'m, 'a, K, V> {
    inner: Iter<'m, 'a, K, V>,
}

impl<K: Pod, V: Pod> Iterator for Values<'_, '_, K, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Pod, V: Pod> FusedIterator for Values<'_, '_, K, V> {}
