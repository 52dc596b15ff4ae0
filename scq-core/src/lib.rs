//! Core implementation for scq.
//!
//! A lock-free bounded MPMC queue built from two rings of slot indices, the
//! [`BoundedQueue`] contract it is consumed through, and a small spin lock.

#![cfg_attr(not(any(feature = "std", test, loom)), no_std)]
#![warn(missing_docs)]

extern crate alloc;

mod contract;
mod error;
mod locked;
mod queue;
mod ring;
mod spin;
mod sync;


pub use contract::BoundedQueue;
pub use error::{CapacityError, Full, MAX_CAPACITY};
pub use locked::LockedQueue;
pub use queue::{Drain, Scq};
pub use ring::{CACHE_LINE, IndexRing, MAX_ORDER, permute};
pub use spin::{SpinLock, SpinMutex, SpinMutexGuard};
