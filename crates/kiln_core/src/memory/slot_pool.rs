//! # Slot Pool
//!
//! Growable storage with stable, generation-tagged handles over a dense array.
//!
//! ```text
//!   handles ──► slots[index] ──► dense[slot.dense]
//!                  │                 ▲
//!                  └── generation    └── owners[dense] (back-pointer)
//! ```
//!
//! Removal swap-removes from the dense array and re-points the moved slot,
//! so the dense array length always equals the live count and can be handed
//! to the GPU as one contiguous upload.

/// Marks a slot that currently owns no dense entry.
const VACANT: u32 = u32::MAX;

/// Handle to a value stored in a [`SlotPool`].
///
/// The ID is split into two parts:
/// - Lower 32 bits: Slot index
/// - Upper 32 bits: Generation counter for detecting stale references
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SlotHandle(u64);

impl SlotHandle {
    /// Creates a handle from a slot index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation the handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid handle.
    pub const NULL: Self = Self(u64::MAX);

    /// Checks if this handle is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for SlotHandle {
    fn default() -> Self {
        Self::NULL
    }
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: u32,
    dense: u32,
}

/// Result of removing a value from a [`SlotPool`].
#[derive(Debug)]
pub struct Removed<T> {
    /// The value that was removed.
    pub value: T,
    /// Dense index the value occupied. If another value was moved in to
    /// fill the hole, it now lives here.
    pub dense_index: usize,
    /// Whether a value was moved into `dense_index`.
    pub moved: bool,
}

/// A pool of values addressed by generation-tagged handles.
///
/// Unlike a fixed pool, the storage grows geometrically on demand
/// (it is a `Vec` underneath). Slots are recycled through a free list and
/// every recycle bumps the slot generation, so a handle to a removed value is
/// rejected instead of aliasing whatever took its place.
///
/// # Example
///
/// ```rust
/// use kiln_core::SlotPool;
///
/// let mut pool = SlotPool::new();
/// let a = pool.insert(1u32);
/// let b = pool.insert(2u32);
/// pool.remove(a);
///
/// assert!(pool.get(a).is_none());
/// assert_eq!(pool.get(b), Some(&2));
/// assert_eq!(pool.as_slice(), &[2]);
/// ```
#[derive(Debug, Clone)]
pub struct SlotPool<T> {
    /// Live values, tightly packed.
    dense: Vec<T>,
    /// Slot index owning each dense entry.
    owners: Vec<u32>,
    /// Slot table addressed by handle index.
    slots: Vec<Slot>,
    /// Free list - indices of vacant slots.
    free_list: Vec<u32>,
}

impl<T> SlotPool<T> {
    /// Creates an empty pool.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dense: Vec::new(),
            owners: Vec::new(),
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Creates an empty pool with room for `capacity` values before reallocating.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            dense: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
        }
    }

    /// Returns the number of live values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Returns true if the pool holds no values.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Returns the capacity of the dense array.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.dense.capacity()
    }

    /// Stores a value and returns its handle.
    ///
    /// Amortized O(1).
    pub fn insert(&mut self, value: T) -> SlotHandle {
        let dense = self.dense.len() as u32;
        let index = match self.free_list.pop() {
            Some(index) => {
                self.slots[index as usize].dense = dense;
                index
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, dense });
                index
            }
        };

        self.dense.push(value);
        self.owners.push(index);

        SlotHandle::new(index, self.slots[index as usize].generation)
    }

    /// Resolves a handle to its dense index, or None if the handle is stale.
    #[inline]
    #[must_use]
    pub fn dense_index(&self, handle: SlotHandle) -> Option<usize> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() || slot.dense == VACANT {
            return None;
        }
        Some(slot.dense as usize)
    }

    /// Returns true if the handle refers to a live value.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: SlotHandle) -> bool {
        self.dense_index(handle).is_some()
    }

    /// Gets a reference to a live value.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: SlotHandle) -> Option<&T> {
        let dense = self.dense_index(handle)?;
        self.dense.get(dense)
    }

    /// Gets a mutable reference to a live value.
    #[inline]
    pub fn get_mut(&mut self, handle: SlotHandle) -> Option<&mut T> {
        let dense = self.dense_index(handle)?;
        self.dense.get_mut(dense)
    }

    /// Removes a value, compacting the dense array.
    ///
    /// The last dense value is moved into the hole and its slot re-pointed,
    /// so every other outstanding handle stays valid. The removed slot's
    /// generation is bumped, which invalidates `handle`.
    pub fn remove(&mut self, handle: SlotHandle) -> Option<Removed<T>> {
        let dense = self.dense_index(handle)?;

        let value = self.dense.swap_remove(dense);
        self.owners.swap_remove(dense);

        let moved = dense < self.dense.len();
        if moved {
            let owner = self.owners[dense] as usize;
            self.slots[owner].dense = dense as u32;
        }

        let slot = &mut self.slots[handle.index() as usize];
        slot.generation = slot.generation.wrapping_add(1);
        slot.dense = VACANT;
        self.free_list.push(handle.index());

        Some(Removed {
            value,
            dense_index: dense,
            moved,
        })
    }

    /// Removes every value. All outstanding handles become stale.
    ///
    /// The dense array keeps its capacity.
    pub fn clear(&mut self) {
        for &owner in &self.owners {
            let slot = &mut self.slots[owner as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.dense = VACANT;
        }
        self.free_list.clear();
        self.free_list.extend((0..self.slots.len() as u32).rev());
        self.dense.clear();
        self.owners.clear();
    }

    /// Returns the live values as one contiguous slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.dense
    }

    /// Returns the live values as one contiguous mutable slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.dense
    }

    /// Iterates over all live values with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (SlotHandle, &T)> {
        self.owners.iter().zip(&self.dense).map(|(&owner, value)| {
            let generation = self.slots[owner as usize].generation;
            (SlotHandle::new(owner, generation), value)
        })
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}
