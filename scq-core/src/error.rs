//! Error types.

use core::fmt;

use snafu::{Snafu, ensure};

use crate::ring::MAX_ORDER;

/// Largest capacity any queue in this crate accepts.
///
/// Bounded by the ring's index encoding; not a practical allocation size.
pub const MAX_CAPACITY: usize = 1 << MAX_ORDER;

/// A capacity request that cannot be satisfied.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CapacityError {
    /// A capacity of zero was requested.
    #[snafu(display("capacity must be > 0"))]
    Zero,
    /// The request exceeds the implementation ceiling.
    #[snafu(display("capacity {requested} exceeds maximum ({max})"))]
    TooLarge {
        /// Requested capacity.
        requested: usize,
        /// Ceiling reported by `capacity_max()`.
        max: usize,
    },
}

pub(crate) fn check_capacity(requested: usize) -> Result<(), CapacityError> {
    ensure!(requested > 0, ZeroSnafu);
    ensure!(
        requested <= MAX_CAPACITY,
        TooLargeSnafu {
            requested,
            max: MAX_CAPACITY
        }
    );
    Ok(())
}

/// Smallest ring order whose capacity covers `capacity`.
pub(crate) const fn order_for(capacity: usize) -> u32 {
    capacity.next_power_of_two().trailing_zeros()
}

/// Rejected enqueue. Owns the value that did not fit.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Full<T>(pub T);

impl<T> Full<T> {
    /// Take back the rejected value.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Full(..)")
    }
}

impl<T> fmt::Display for Full<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

impl<T> core::error::Error for Full<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn capacity_bounds() {
        assert_eq!(check_capacity(0), Err(CapacityError::Zero));
        assert_eq!(check_capacity(1), Ok(()));
        assert_eq!(check_capacity(MAX_CAPACITY), Ok(()));
        assert_eq!(
            check_capacity(MAX_CAPACITY + 1),
            Err(CapacityError::TooLarge {
                requested: MAX_CAPACITY + 1,
                max: MAX_CAPACITY
            })
        );
    }

    #[test]
    fn orders() {
        assert_eq!(order_for(1), 0);
        assert_eq!(order_for(2), 1);
        assert_eq!(order_for(3), 2);
        assert_eq!(order_for(4), 2);
        assert_eq!(order_for(5), 3);
        assert_eq!(order_for(MAX_CAPACITY), MAX_ORDER);
    }

    #[test]
    fn messages() {
        assert_eq!(CapacityError::Zero.to_string(), "capacity must be > 0");
        assert_eq!(
            CapacityError::TooLarge { requested: 9, max: 8 }.to_string(),
            "capacity 9 exceeds maximum (8)"
        );
        assert_eq!(Full(3u8).to_string(), "queue is full");
        assert_eq!(Full(3u8).into_inner(), 3);
    }
}
