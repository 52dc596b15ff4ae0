//! The bounded-queue contract.
//!
//! Callers that only need "a bounded queue" are written against
//! [`BoundedQueue`] and monomorphized per implementation, so the contract
//! adds no indirection to the hot path.

use crate::{
    error::{CapacityError, Full},
    locked::LockedQueue,
    queue::Scq,
};

/// Uniform operation set over a concrete bounded queue.
///
/// Overflow can be observed two ways, both built on [`try_enqueue`]:
/// [`enqueue`] reports a bare `bool`, while [`try_enqueue`] returns the
/// rejected value inside [`Full`].
///
/// [`enqueue`]: BoundedQueue::enqueue
/// [`try_enqueue`]: BoundedQueue::try_enqueue
pub trait BoundedQueue<T> {
    /// Maximum number of resident values.
    fn capacity(&self) -> usize;

    /// Largest capacity [`set_capacity`](Self::set_capacity) accepts.
    ///
    /// A structural limit; memory may run out well before it.
    fn capacity_max(&self) -> usize;

    /// Drop every resident value.
    fn clear(&mut self);

    /// Remove the oldest value, or `None` if the queue is momentarily empty.
    fn dequeue(&self) -> Option<T>;

    /// Append a value, handing it back if the queue is full.
    fn try_enqueue(&self, value: T) -> Result<(), Full<T>>;

    /// Approximate number of resident values.
    fn size(&self) -> usize;

    /// Drop every resident value and resize.
    fn set_capacity(&mut self, capacity: usize) -> Result<(), CapacityError>;

    /// Append a value; `false` means the queue was full and the value dropped.
    #[inline]
    fn enqueue(&self, value: T) -> bool {
        self.try_enqueue(value).is_ok()
    }

    /// Append a copy of `value`, leaving the original with the caller.
    #[inline]
    fn enqueue_cloned(&self, value: &T) -> bool
    where
        T: Clone,
    {
        self.enqueue(value.clone())
    }

    /// True if no value appears to be resident.
    #[inline]
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<T> BoundedQueue<T> for Scq<T> {
    #[inline]
    fn capacity(&self) -> usize {
        Scq::capacity(self)
    }

    #[inline]
    fn capacity_max(&self) -> usize {
        Scq::capacity_max(self)
    }

    #[inline]
    fn clear(&mut self) {
        Scq::clear(self);
    }

    #[inline]
    fn dequeue(&self) -> Option<T> {
        Scq::dequeue(self)
    }

    #[inline]
    fn try_enqueue(&self, value: T) -> Result<(), Full<T>> {
        Scq::try_enqueue(self, value)
    }

    #[inline]
    fn size(&self) -> usize {
        Scq::size(self)
    }

    #[inline]
    fn set_capacity(&mut self, capacity: usize) -> Result<(), CapacityError> {
        Scq::set_capacity(self, capacity)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        Scq::is_empty(self)
    }
}

impl<T> BoundedQueue<T> for LockedQueue<T> {
    #[inline]
    fn capacity(&self) -> usize {
        LockedQueue::capacity(self)
    }

    #[inline]
    fn capacity_max(&self) -> usize {
        LockedQueue::capacity_max(self)
    }

    #[inline]
    fn clear(&mut self) {
        LockedQueue::clear(self);
    }

    #[inline]
    fn dequeue(&self) -> Option<T> {
        LockedQueue::dequeue(self)
    }

    #[inline]
    fn try_enqueue(&self, value: T) -> Result<(), Full<T>> {
        LockedQueue::try_enqueue(self, value)
    }

    #[inline]
    fn size(&self) -> usize {
        LockedQueue::size(self)
    }

    #[inline]
    fn set_capacity(&mut self, capacity: usize) -> Result<(), CapacityError> {
        LockedQueue::set_capacity(self, capacity)
    }
}
