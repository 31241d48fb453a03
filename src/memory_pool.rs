use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::size_of;

use bytemuck::Pod;

use crate::error::Error;
use crate::error::Result;

mod sealed {
    pub trait Sealed {}
}

/// Integer type used to link free slots of a [`MemoryPool`].
///
/// A slot stores either a value or a link, so picking an index type no wider
/// than the value keeps slots at `size_of::<T>()`. The index type also caps
/// the number of slots a pool can address.
pub trait FreeIndex: Pod + sealed::Sealed {
    /// Largest number of slots addressable with this index type.
    const MAX_SLOTS: usize;

    #[doc(hidden)]
    fn from_usize(index: usize) -> Self;

    #[doc(hidden)]
    fn to_usize(self) -> usize;
}

macro_rules! free_index {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl FreeIndex for $ty {
                const MAX_SLOTS: usize = if (<$ty>::MAX as u128) < usize::MAX as u128 {
                    <$ty>::MAX as usize + 1
                } else {
                    usize::MAX
                };

                #[inline(always)]
                fn from_usize(index: usize) -> Self {
                    debug_assert!(index < Self::MAX_SLOTS);
                    index as $ty
                }

                #[inline(always)]
                fn to_usize(self) -> usize {
                    self as usize
                }
            }
        )*
    };
}

free_index!(u8, u16, u32, u64);

/// A slot allocated from a [`MemoryPool`].
///
/// Handles are move-only and consumed by [`MemoryPool::free`], so a slot
/// cannot be freed twice through the same handle. A handle also holds the
/// lifetime of its pool's buffer borrow, so it cannot be carried over to a
/// later pool built on the same buffer:
///
/// ```rust,compile_fail
/// use robin_arena::MemoryPool;
///
/// let mut buffer = [0u8; 16];
/// let mut first: MemoryPool<'_, u32> = MemoryPool::new(&mut buffer);
/// let stale = first.insert(1).unwrap();
///
/// let mut second: MemoryPool<'_, u32> = MemoryPool::new(&mut buffer);
/// second.free(stale).unwrap();
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct PoolHandle<'a, T> {
    index: usize,
    pool: usize,
    _phantom: PhantomData<(fn() -> T, fn(&'a ()) -> &'a ())>,
}

impl<T> PoolHandle<'_, T> {
    /// Index of the slot within its pool.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A pool allocator for fixed-size records inside a borrowed buffer.
///
/// The buffer is divided into `buffer.len() / max(size_of::<T>(),
/// size_of::<I>())` slots. Free slots are chained into a list through an
/// index of type `I` written over their first bytes, so the pool needs no
/// memory besides the buffer and allocation and release are O(1).
///
/// # Examples
///
/// ```rust
/// use robin_arena::MemoryPool;
/// use robin_arena::layout::pool_buffer_size;
///
/// let mut buffer = [0u8; pool_buffer_size::<u64>(2)];
/// let mut pool: MemoryPool<'_, u64> = MemoryPool::new(&mut buffer);
///
/// let a = pool.insert(1).unwrap();
/// let b = pool.insert(2).unwrap();
/// assert!(pool.allocate().is_err());
///
/// assert_eq!(pool.free(a), Ok(1));
/// assert_eq!(pool.read(&b), Ok(2));
/// assert_eq!(pool.len(), 1);
/// ```
pub struct MemoryPool<'a, T, I = u32> {
    arena: &'a mut [u8],
    capacity: usize,
    populated: usize,
    next_free: usize,

    _phantom: PhantomData<(T, I)>,
}

impl<T, I> Debug for MemoryPool<'_, T, I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("populated", &self.populated)
            .field("capacity", &self.capacity)
            .field("next_free", &self.next_free)
            .finish()
    }
}

impl<'a, T: Pod, I: FreeIndex> MemoryPool<'a, T, I> {
    const SLOT_SIZE: usize = if size_of::<T>() > size_of::<I>() {
        size_of::<T>()
    } else {
        size_of::<I>()
    };

    /// Creates a pool over `buffer` with every slot free.
    ///
    /// Buffer bytes past the last whole slot are left unused, as are slots
    /// beyond what `I` can index.
    pub fn new(buffer: &'a mut [u8]) -> Self {
        let capacity = (buffer.len() / Self::SLOT_SIZE).min(I::MAX_SLOTS);

        let mut pool = Self {
            arena: buffer,
            capacity,
            populated: 0,
            next_free: 0,
            _phantom: PhantomData,
        };

        for index in 0..capacity {
            let next = if index + 1 == capacity { 0 } else { index + 1 };
            pool.write_link(index, next);
        }

        tracing::debug!(
            capacity,
            slot_size = Self::SLOT_SIZE,
            buffer_len = pool.arena.len(),
            "memory pool constructed"
        );

        pool
    }

    #[inline(always)]
    fn link_at(&self, index: usize) -> usize {
        let start = index * Self::SLOT_SIZE;
        let link: I = bytemuck::pod_read_unaligned(&self.arena[start..start + size_of::<I>()]);
        link.to_usize()
    }

    #[inline(always)]
    fn write_link(&mut self, index: usize, next: usize) {
        let start = index * Self::SLOT_SIZE;
        let link = I::from_usize(next);
        self.arena[start..start + size_of::<I>()].copy_from_slice(bytemuck::bytes_of(&link));
    }

    #[inline(always)]
    fn value_at(&self, index: usize) -> T {
        let start = index * Self::SLOT_SIZE;
        bytemuck::pod_read_unaligned(&self.arena[start..start + size_of::<T>()])
    }

    #[inline(always)]
    fn write_value(&mut self, index: usize, value: &T) {
        let start = index * Self::SLOT_SIZE;
        self.arena[start..start + size_of::<T>()].copy_from_slice(bytemuck::bytes_of(value));
    }

    #[inline(always)]
    fn id(&self) -> usize {
        self.arena.as_ptr() as usize
    }

    fn check(&self, handle: &PoolHandle<'a, T>) -> Result<usize> {
        if handle.pool != self.id() {
            return Err(Error::ForeignHandle);
        }
        if handle.index >= self.capacity {
            return Err(Error::IndexOutOfRange {
                index: handle.index,
                capacity: self.capacity,
            });
        }
        Ok(handle.index)
    }

    /// Takes a slot off the free list.
    ///
    /// The slot's contents are whatever was last stored in it; write a value
    /// with [`write`](MemoryPool::write) or use
    /// [`insert`](MemoryPool::insert) instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolExhausted`] when every slot is in use.
    pub fn allocate(&mut self) -> Result<PoolHandle<'a, T>> {
        if self.populated == self.capacity {
            tracing::debug!(capacity = self.capacity, "memory pool exhausted");
            return Err(Error::PoolExhausted {
                capacity: self.capacity,
            });
        }

        let index = self.next_free;
        self.populated += 1;
        // The last free slot's link is stale, so only follow it while free
        // slots remain.
        if self.populated < self.capacity {
            self.next_free = self.link_at(index);
        }

        Ok(PoolHandle {
            index,
            pool: self.id(),
            _phantom: PhantomData,
        })
    }

    /// Allocates a slot and stores `value` in it.
    pub fn insert(&mut self, value: T) -> Result<PoolHandle<'a, T>> {
        let handle = self.allocate()?;
        self.write_value(handle.index, &value);
        Ok(handle)
    }

    /// Returns a slot to the pool, yielding the value it held.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignHandle`] or [`Error::IndexOutOfRange`] if the
    /// handle was not allocated by this pool, or if the pool has nothing
    /// allocated. The pool is unchanged in that case.
    pub fn free(&mut self, handle: PoolHandle<'a, T>) -> Result<T> {
        let index = self.check(&handle)?;
        if self.populated == 0 {
            return Err(Error::ForeignHandle);
        }
        let value = self.value_at(index);

        self.write_link(index, self.next_free);
        self.next_free = index;
        self.populated -= 1;

        Ok(value)
    }

    /// Returns a copy of the value stored in the slot.
    pub fn read(&self, handle: &PoolHandle<'a, T>) -> Result<T> {
        let index = self.check(handle)?;
        Ok(self.value_at(index))
    }

    /// Stores `value` in the slot.
    pub fn write(&mut self, handle: &PoolHandle<'a, T>, value: T) -> Result<()> {
        let index = self.check(handle)?;
        self.write_value(index, &value);
        Ok(())
    }

    /// Returns the number of allocated slots.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if no slot is allocated.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns `true` if every slot is allocated.
    pub fn is_full(&self) -> bool {
        self.populated == self.capacity
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ratio of allocated slots to slots, from `0.0` to `1.0`.
    pub fn load_factor(&self) -> f32 {
        if self.capacity == 0 {
            return 1.0;
        }
        self.populated as f32 / self.capacity as f32
    }
}
