//! A lock-free bounded MPMC queue.
//!
//! [`Scq`] is a Scalable Circular Queue: values sit in a fixed slot array
//! and slot indices circulate through two lock-free [`IndexRing`]s. Callers
//! that should not care which bounded queue they get are written against
//! [`BoundedQueue`].
//!
//! ```
//! use scq::{BoundedQueue, Scq};
//!
//! let queue = Scq::new(4);
//! assert!(queue.enqueue(1));
//! assert_eq!(queue.try_enqueue(2), Ok(()));
//! assert_eq!(queue.dequeue(), Some(1));
//! assert_eq!(queue.size(), 1);
//! ```
//!
//! A full queue hands the rejected value back:
//!
//! ```
//! use scq::{Full, Scq};
//!
//! let queue = Scq::new(1);
//! queue.enqueue("first");
//! let Err(Full(rejected)) = queue.try_enqueue("second") else { unreachable!() };
//! assert_eq!(rejected, "second");
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub use scq_core::*;
