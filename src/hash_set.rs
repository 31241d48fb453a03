use core::fmt::Debug;
use core::iter::FusedIterator;

use bytemuck::Pod;

use crate::error::Result;
use crate::hash_table::Cursor;
use crate::hash_table::HashTable;

/// A fixed-capacity hash set stored in a borrowed buffer.
///
/// `HashSet<'a, T>` is a [`HashTable`] whose key region holds the elements
/// and whose value region is zero-sized, so every slot costs the 4-byte hash
/// plus `size_of::<T>()`. As with the map, the caller supplies the hash of
/// every element.
///
/// # Examples
///
/// ```rust
/// use robin_arena::HashSet;
/// use robin_arena::layout::set_buffer_size;
///
/// let mut buffer = vec![0u8; set_buffer_size::<u32>(3)];
/// let mut set: HashSet<'_, u32> = HashSet::new(&mut buffer);
///
/// assert!(set.insert(13, 13).unwrap());
/// assert!(!set.insert(13, 13).unwrap());
/// assert!(set.contains(13, &13));
/// assert_eq!(set.len(), 1);
/// ```
pub struct HashSet<'a, T> {
    table: HashTable<'a, T, ()>,
}

impl<T> Debug for HashSet<'_, T>
where
    T: Debug + Pod + PartialEq,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T> HashSet<'a, T>
where
    T: Pod + PartialEq,
{
    /// Creates an empty set over `buffer`.
    ///
    /// The capacity is `buffer.len() / (4 + size_of::<T>())`.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            table: HashTable::new(buffer),
        }
    }

    /// Creates an empty set over `buffer`, failing if it cannot hold a single
    /// element.
    pub fn try_new(buffer: &'a mut [u8]) -> Result<Self> {
        HashTable::try_new(buffer).map(|table| Self { table })
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots in the set.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Ratio of elements to slots.
    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }

    /// Returns `true` once the set should be migrated into a larger buffer.
    pub fn needs_migration(&self) -> bool {
        self.table.needs_migration()
    }

    /// Removes all elements.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Adds `value` to the set.
    ///
    /// Returns `true` if the value was not present yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TableFull`](crate::Error::TableFull) if `value` is new
    /// and no slot is free.
    pub fn insert(&mut self, hash: u32, value: T) -> Result<bool> {
        self.table.set(hash, value, ()).map(|previous| previous.is_none())
    }

    /// Returns `true` if the set contains `value`.
    pub fn contains(&self, hash: u32, value: &T) -> bool {
        self.table.contains(hash, |v| v == value)
    }

    /// Returns the stored element equal to `value`.
    pub fn get(&self, hash: u32, value: &T) -> Option<T> {
        self.table.find(hash, |v| v == value).map(|(v, ())| v)
    }

    /// Removes `value` from the set, returning whether it was present.
    pub fn remove(&mut self, hash: u32, value: &T) -> bool {
        self.table.remove(hash, |v| v == value).is_some()
    }

    /// Removes and returns the stored element equal to `value`.
    pub fn take(&mut self, hash: u32, value: &T) -> Option<T> {
        self.table.remove(hash, |v| v == value).map(|(v, ())| v)
    }

    /// Returns a cursor positioned before the first element.
    pub fn cursor(&self) -> Cursor {
        self.table.cursor()
    }

    /// Advances `cursor` and returns the next element.
    ///
    /// See [`HashTable::next_entry`] for the rules on mutation while a cursor
    /// is live.
    pub fn next_value(&self, cursor: &mut Cursor) -> Option<T> {
        self.table.next_entry(cursor).map(|(v, ())| v)
    }

    /// Returns an iterator over copies of all elements.
    pub fn iter(&self) -> Iter<'_, 'a, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Builds a set over `buffer` holding every element of this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`](crate::Error::BufferTooSmall) if
    /// `buffer` has fewer slots than this set has elements.
    pub fn copy_to<'b>(&self, buffer: &'b mut [u8]) -> Result<HashSet<'b, T>> {
        self.table.copy_to(buffer).map(|table| HashSet { table })
    }

    /// Returns the underlying table.
    pub fn as_table(&self) -> &HashTable<'a, T, ()> {
        &self.table
    }
}

/// An iterator over the elements of a `HashSet`.
pub struct Iter<'s, 'a, T> {
    inner: crate::hash_table::Iter<'s, 'a, T, ()>,
}

impl<T: Pod> Iterator for Iter<'_, '_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(v, ())| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Pod> FusedIterator for Iter<'_, '_, T> {}
