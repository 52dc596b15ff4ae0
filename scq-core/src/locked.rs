//! A bounded queue behind a spin lock.

use alloc::collections::VecDeque;

use crate::{
    error::{CapacityError, Full, MAX_CAPACITY, check_capacity},
    spin::SpinMutex,
};

/// Bounded FIFO queue serialized by a [`SpinMutex`].
///
/// Strictly FIFO, but every operation takes the lock. Useful as a baseline
/// and as a reference model for [`Scq`](crate::Scq).
#[derive(Debug)]
pub struct LockedQueue<T> {
    items: SpinMutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> LockedQueue<T> {
    /// Create a queue holding up to `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds [`MAX_CAPACITY`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(queue) => queue,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible [`new`](Self::new).
    pub fn try_new(capacity: usize) -> Result<Self, CapacityError> {
        check_capacity(capacity)?;
        Ok(Self {
            items: SpinMutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    /// Append a value, handing it back if the queue is full.
    pub fn try_enqueue(&self, value: T) -> Result<(), Full<T>> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(Full(value));
        }
        items.push_back(value);
        Ok(())
    }

    /// Remove the oldest value.
    pub fn dequeue(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Maximum number of resident values.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest accepted capacity.
    #[inline]
    #[must_use]
    pub const fn capacity_max(&self) -> usize {
        MAX_CAPACITY
    }

    /// Number of resident values.
    #[must_use]
    pub fn size(&self) -> usize {
        self.items.lock().len()
    }

    /// Drop every resident value.
    pub fn clear(&mut self) {
        self.items.get_mut().clear();
    }

    /// Drop every resident value and resize.
    pub fn set_capacity(&mut self, capacity: usize) -> Result<(), CapacityError> {
        check_capacity(capacity)?;
        let items = self.items.get_mut();
        items.clear();
        items.shrink_to(capacity);
        items.reserve(capacity);
        self.capacity = capacity;
        Ok(())
    }
}
