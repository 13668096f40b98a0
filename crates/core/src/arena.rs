//! Typed bump arenas with stable byte offsets
//!
//! An arena hands out slots for values of a single element type and never
//! reuses or moves them. Allocation returns the *byte offset* of the slot
//! (`index * size_of::<T>()`), which stays valid for the life of the arena
//! and is small enough to pack into the data field of a tagged word.
//!
//! ## Freeze and reset
//!
//! `freeze` records the current high-water mark. Offsets below the mark are
//! reported as frozen by `is_frozen`; callers that mutate arena contents are
//! expected to refuse writes to frozen slots. `reset` truncates the arena
//! back to the mark, discarding everything allocated since. Together these
//! form a coarse session-rollback primitive; there is no per-object free.
//!
//! ## Failure modes
//!
//! Capacity exhaustion and arithmetic overflow return `None` from the
//! allocation calls. There is no silent truncation.

/// A growable-only region of `T` slots addressed by byte offset.
#[derive(Debug)]
pub struct Arena<T> {
    items: Vec<T>,
    /// Maximum number of elements this arena will hold.
    capacity: usize,
    /// Byte offset below which slots are immutable.
    watermark: usize,
}

impl<T> Arena<T> {
    /// Size in bytes of one element slot.
    pub const ELEM_SIZE: usize = size_of::<T>();

    /// Create an arena that holds at most `capacity` elements.
    ///
    /// The capacity is clamped so that every reachable byte offset fits in
    /// a `u32`, keeping offsets embeddable in tagged words.
    pub fn with_capacity(capacity: usize) -> Self {
        let max_elems = (u32::MAX as usize) / Self::ELEM_SIZE.max(1);
        Arena { items: Vec::new(), capacity: capacity.min(max_elems), watermark: 0 }
    }

    /// Number of elements currently allocated.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Byte offset the next allocation would receive.
    pub fn next_offset(&self) -> u32 {
        // Cannot overflow: every successful alloc checked this product.
        (self.items.len() * Self::ELEM_SIZE) as u32
    }

    /// Allocate one slot, returning its byte offset.
    pub fn alloc(&mut self, elem: T) -> Option<u32> {
        if self.items.len() >= self.capacity {
            return None;
        }
        let offset = self.items.len().checked_mul(Self::ELEM_SIZE)?;
        let offset = u32::try_from(offset).ok()?;
        self.items.push(elem);
        Some(offset)
    }

    /// Look up the element at `offset`.
    ///
    /// Returns `None` for offsets that are out of range or do not land on
    /// an element boundary.
    pub fn get(&self, offset: u32) -> Option<&T> {
        self.index_of(offset).and_then(|i| self.items.get(i))
    }

    /// Mutable lookup; same addressing rules as [`Arena::get`].
    pub fn get_mut(&mut self, offset: u32) -> Option<&mut T> {
        let i = self.index_of(offset)?;
        self.items.get_mut(i)
    }

    /// Record the current high-water mark; everything below it becomes
    /// immutable and survives [`Arena::reset`].
    pub fn freeze(&mut self) {
        self.watermark = self.items.len() * Self::ELEM_SIZE;
    }

    /// True if `offset` is below the freeze watermark.
    pub fn is_frozen(&self, offset: u32) -> bool {
        (offset as usize) < self.watermark
    }

    /// Discard everything allocated since the last [`Arena::freeze`].
    pub fn reset(&mut self) {
        self.items.truncate(self.watermark / Self::ELEM_SIZE.max(1));
    }

    fn index_of(&self, offset: u32) -> Option<usize> {
        let offset = offset as usize;
        if Self::ELEM_SIZE == 0 || offset % Self::ELEM_SIZE != 0 {
            return None;
        }
        Some(offset / Self::ELEM_SIZE)
    }
}

impl<T: Copy> Arena<T> {
    /// Allocate a contiguous run holding a copy of `src`, returning the
    /// byte offset of the first element.
    pub fn alloc_slice(&mut self, src: &[T]) -> Option<u32> {
        let new_len = self.items.len().checked_add(src.len())?;
        if new_len > self.capacity {
            return None;
        }
        let offset = self.items.len().checked_mul(Self::ELEM_SIZE)?;
        let offset = u32::try_from(offset).ok()?;
        // The end of the run must stay addressable too.
        new_len.checked_mul(Self::ELEM_SIZE)?;
        self.items.extend_from_slice(src);
        Some(offset)
    }

    /// Borrow `len` contiguous elements starting at `offset`.
    pub fn slice(&self, offset: u32, len: usize) -> Option<&[T]> {
        let start = self.index_of(offset)?;
        let end = start.checked_add(len)?;
        self.items.get(start..end)
    }
}
