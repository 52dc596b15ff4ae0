//! Scalable Circular Queue: a bounded MPMC queue over two index rings.
//!
//! Values live in a flat slot array. Slot indices circulate between two
//! [`IndexRing`]s: `free` starts holding every index, `allocated` starts
//! empty. A producer takes an index from `free`, writes the slot and publishes
//! the index to `allocated`; a consumer does the reverse. At any instant each
//! index is in `free`, in `allocated`, or held by exactly one thread, so slot
//! access never races.

use alloc::{boxed::Box, vec::Vec};
use core::{cell::UnsafeCell, fmt, mem::MaybeUninit};

use crate::{
    error::{CapacityError, Full, MAX_CAPACITY, check_capacity, order_for},
    ring::IndexRing,
};

/// Slot wrapper holding one value.
#[repr(transparent)]
pub(crate) struct Slot<T> {
    pub(crate) data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

fn alloc_slots<T>(capacity: usize) -> Box<[Slot<T>]> {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, Slot::new);
    slots.into_boxed_slice()
}

/// Lock-free bounded multi-producer/multi-consumer FIFO queue.
///
/// `enqueue` and `dequeue` take `&self` and never block. Reconfiguring the
/// queue (`clear`, `set_capacity`) takes `&mut self`, so it cannot overlap
/// with any other operation.
pub struct Scq<T> {
    free: IndexRing,
    allocated: IndexRing,
    slots: Box<[Slot<T>]>,
    capacity: usize,
}

unsafe impl<T: Send> Send for Scq<T> {}
unsafe impl<T: Send> Sync for Scq<T> {}

impl<T> Scq<T> {
    /// Create a queue holding up to `capacity` values, with pre-warmed slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds [`capacity_max`](Self::capacity_max).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let queue = Self::cold(capacity);
        queue.warm();
        queue
    }

    /// Create a queue without touching the slot memory up front.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds [`capacity_max`](Self::capacity_max).
    #[must_use]
    pub fn cold(capacity: usize) -> Self {
        match Self::try_cold(capacity) {
            Ok(queue) => queue,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible [`new`](Self::new).
    pub fn try_new(capacity: usize) -> Result<Self, CapacityError> {
        let queue = Self::try_cold(capacity)?;
        queue.warm();
        Ok(queue)
    }

    fn try_cold(capacity: usize) -> Result<Self, CapacityError> {
        check_capacity(capacity)?;
        let order = order_for(capacity);
        tracing::debug!(capacity, order, "creating scq");
        Ok(Self {
            free: IndexRing::filled(order, 0, capacity),
            allocated: IndexRing::with_order(order),
            slots: alloc_slots(capacity),
            capacity,
        })
    }

    /// Fault in every slot so the first lap does not pay for page faults.
    ///
    /// Only called before the queue is shared; no slot holds a value yet.
    fn warm(&self) {
        for slot in self.slots.iter() {
            // Safety: zeroed bytes are a valid `MaybeUninit<T>`, and no typed
            // value is produced.
            unsafe {
                let ptr = slot.data.get() as *mut u8;
                core::ptr::write_bytes(ptr, 0, size_of::<MaybeUninit<T>>());
            }
        }
    }

    /// Append a value, handing it back if every slot is taken.
    pub fn try_enqueue(&self, value: T) -> Result<(), Full<T>> {
        let Some(index) = self.free.dequeue(false) else {
            return Err(Full(value));
        };
        // Safety: `index` left the free ring, so this thread owns the slot
        // until the index is published to `allocated`.
        unsafe { (*self.slots[index].data.get()).write(value) };
        let published = self.allocated.enqueue(index, false);
        debug_assert!(published, "slot index {index} out of ring range");
        Ok(())
    }

    /// Append a value. Returns `false`, dropping the value, if the queue is full.
    #[inline]
    pub fn enqueue(&self, value: T) -> bool {
        self.try_enqueue(value).is_ok()
    }

    /// Remove the oldest value, or `None` if the queue is momentarily empty.
    pub fn dequeue(&self) -> Option<T> {
        let index = self.allocated.dequeue(false)?;
        // Safety: `index` left the allocated ring, so its slot was written by
        // the producer that published it and no one else touches it until
        // the index is returned to `free`.
        let value = unsafe { (*self.slots[index].data.get()).assume_init_read() };
        let returned = self.free.enqueue(index, false);
        debug_assert!(returned, "slot index {index} out of ring range");
        Some(value)
    }

    /// Maximum number of resident values.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest capacity this queue type accepts.
    ///
    /// This is a structural limit of the index encoding, not a practical
    /// allocation size: at the ceiling the two rings alone need 32 GiB.
    #[inline]
    #[must_use]
    pub const fn capacity_max(&self) -> usize {
        MAX_CAPACITY
    }

    /// Approximate number of resident values.
    ///
    /// Counts values whose producers are still publishing; not consistent
    /// with concurrent mutators.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.allocated.distance().min(self.capacity)
    }

    /// True if no value appears to be resident.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Drop every resident value and reset both rings.
    pub fn clear(&mut self) {
        let dropped = self.drain().count();
        tracing::trace!(dropped, "scq cleared");
        self.reset_rings(order_for(self.capacity));
    }

    /// Drop every resident value and resize to `capacity`.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), CapacityError> {
        check_capacity(capacity)?;
        self.drain().for_each(drop);
        tracing::debug!(old = self.capacity, new = capacity, "resizing scq");
        if capacity != self.capacity {
            self.slots = alloc_slots(capacity);
            self.capacity = capacity;
        }
        self.reset_rings(order_for(capacity));
        Ok(())
    }

    fn reset_rings(&mut self, order: u32) {
        self.allocated.reset(order);
        self.free.reset(order);
        self.free.fill(0, self.capacity);
    }

    /// Remove all resident values, oldest first.
    #[inline]
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain { queue: self }
    }
}

/// Draining iterator over an [`Scq`].
pub struct Drain<'a, T> {
    queue: &'a mut Scq<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.queue.dequeue()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.queue.size()))
    }
}

impl<T> fmt::Debug for Scq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scq")
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .field("free", &self.free)
            .field("allocated", &self.allocated)
            .finish()
    }
}

impl<T> Drop for Scq<T> {
    fn drop(&mut self) {
        let residual = self.drain().count();
        if residual > 0 {
            tracing::trace!(residual, "dropping non-empty scq");
        }
    }
}
