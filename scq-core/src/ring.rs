//! Lock-free ring of slot indices.
//!
//! An [`IndexRing`] of order `k` hands off up to `2^k` distinct indices in
//! `[0, 2^k)` between any number of producers and consumers. It is backed by
//! `2^(k+1)` atomic cells so that a producer that lost a race can always skip
//! ahead to a fresh cell.
//!
//! Each cell packs three fields into one `u64`:
//!
//! ```text
//!  63                  k+2   k+1   k          0
//! +---------------------+------+------------+
//! |        cycle        | safe |   index    |
//! +---------------------+------+------------+
//! ```
//!
//! The cycle is the wrap count of the cursor that last wrote the cell, so an
//! index left behind by an earlier lap can never be taken for a fresh one.
//! The index field is one bit wider than any valid index; all ones is the
//! empty marker. Indices are stored XORed
//! with the index mask so that a consumed cell (`fetch_or` of the mask) and a
//! never-written cell share that marker.

use alloc::{boxed::Box, vec::Vec};
use core::fmt;

use crossbeam_utils::CachePadded;

use crate::sync::{AtomicI64, AtomicU64, Ordering, spin_loop};

/// Target cache-line size in bytes. 64 bytes is correct for x86-64 and most
/// ARM64 server cores.
pub const CACHE_LINE: usize = 64;

/// log2 of the number of cells sharing one cache line (64 / 8).
const CELLS_PER_LINE_ORDER: u32 = 3;

/// Largest supported ring order. A ring of this order holds `2^30` indices.
pub const MAX_ORDER: u32 = 30;

/// How many times a consumer re-reads an empty cell while a producer that
/// already reserved it is still publishing.
#[cfg(not(loom))]
const PUBLISH_SPIN: u32 = 10_000;
#[cfg(loom)]
const PUBLISH_SPIN: u32 = 1;

/// Cell value that has never been written: cycle -1, unsafe, empty.
const UNUSED: u64 = u64::MAX;

/// Wrapping difference of two cursors, read as signed.
#[inline(always)]
const fn cursor_diff(a: u64, b: u64) -> i64 {
    a.wrapping_sub(b) as i64
}

/// Map a linear cursor onto a cell of a ring with `2^(order+1)` cells.
///
/// The low `order + 1` bits of the cursor are rotated so that consecutive
/// cursors land [`CACHE_LINE`] bytes apart. Rings smaller than one cache
/// line are addressed directly.
///
/// `order` must not exceed [`MAX_ORDER`]; debug builds assert it.
#[inline(always)]
#[must_use]
pub const fn permute(cursor: u64, order: u32) -> usize {
    debug_assert!(order <= MAX_ORDER, "ring order exceeds maximum");
    let bits = order + 1;
    let mask = (1u64 << bits) - 1;
    if bits <= CELLS_PER_LINE_ORDER {
        return (cursor & mask) as usize;
    }
    (((cursor & mask) >> (bits - CELLS_PER_LINE_ORDER)) | ((cursor << CELLS_PER_LINE_ORDER) & mask))
        as usize
}

/// Bounded multi-producer/multi-consumer ring of slot indices.
///
/// `head`, `threshold` and `tail` each sit on their own cache line: consumers
/// hammer `head`, producers hammer `tail`, and everyone reads `threshold`.
#[repr(C)]
pub struct IndexRing {
    head: CachePadded<AtomicU64>,
    /// Remaining dequeue attempts before the ring is assumed empty. Negative
    /// means empty; reset to `3 * capacity - 1` on every publish.
    threshold: CachePadded<AtomicI64>,
    tail: CachePadded<AtomicU64>,
    cells: Box<[AtomicU64]>,
    order: u32,
}

impl IndexRing {
    /// Create an empty ring able to hold `2^order` indices.
    ///
    /// # Panics
    ///
    /// Panics if `order` exceeds [`MAX_ORDER`].
    #[must_use]
    pub fn with_order(order: u32) -> Self {
        assert!(order <= MAX_ORDER, "ring order exceeds maximum ({MAX_ORDER})");
        Self {
            head: CachePadded::new(AtomicU64::new(0)),
            threshold: CachePadded::new(AtomicI64::new(-1)),
            tail: CachePadded::new(AtomicU64::new(0)),
            cells: Self::alloc_cells(order),
            order,
        }
    }

    /// Create a ring of the given order pre-filled with `start..end`.
    #[must_use]
    pub fn filled(order: u32, start: usize, end: usize) -> Self {
        let mut ring = Self::with_order(order);
        ring.fill(start, end);
        ring
    }

    fn alloc_cells(order: u32) -> Box<[AtomicU64]> {
        let cells = 2usize << order;
        let mut v = Vec::with_capacity(cells);
        for _ in 0..cells {
            v.push(AtomicU64::new(UNUSED));
        }
        v.into_boxed_slice()
    }

    /// Ring order: the ring holds `2^order` indices.
    #[inline]
    #[must_use]
    pub const fn order(&self) -> u32 {
        self.order
    }

    /// Number of live indices the ring can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        1 << self.order
    }

    /// Number of physical cells, twice the capacity.
    #[inline(always)]
    const fn cell_count(&self) -> u64 {
        2 << self.order
    }

    #[inline(always)]
    const fn full_threshold(&self) -> i64 {
        // half + n - 1 with n = 2 * half
        3 * (1i64 << self.order) - 1
    }

    /// Cell addressed by `cursor`.
    #[inline(always)]
    #[must_use]
    pub const fn permute(&self, cursor: u64) -> usize {
        permute(cursor, self.order)
    }

    /// Publish `index` at the next tail position.
    ///
    /// Returns `false` without touching the ring if `index` is out of range.
    /// Otherwise always succeeds, provided no more than [`capacity`] indices
    /// are ever live in the ring at once.
    ///
    /// With `nonempty` set the threshold is left alone, which is only sound
    /// when consumers of this ring also pass `nonempty`.
    ///
    /// [`capacity`]: Self::capacity
    pub fn enqueue(&self, index: usize, nonempty: bool) -> bool {
        if index >= self.capacity() {
            return false;
        }
        let n = self.cell_count();
        let low = 2 * n - 1;
        let encoded = index as u64 ^ (n - 1);

        loop {
            let tail = self.tail.fetch_add(1, Ordering::AcqRel);
            let tail_cycle = (tail << 1) | low;
            let cell = &self.cells[self.permute(tail)];
            let mut entry = cell.load(Ordering::Acquire);

            loop {
                let entry_cycle = entry | low;
                if cursor_diff(entry_cycle, tail_cycle) >= 0 {
                    break;
                }
                // An empty cell from an earlier lap is reusable when it is
                // marked safe, or when no consumer has gone past this cursor.
                let reusable = entry == entry_cycle
                    || (entry == entry_cycle ^ n
                        && cursor_diff(self.head.load(Ordering::Acquire), tail) <= 0);
                if !reusable {
                    break;
                }
                match cell.compare_exchange_weak(
                    entry,
                    tail_cycle ^ encoded,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        if !nonempty {
                            self.reset_threshold();
                        }
                        return true;
                    }
                    Err(current) => entry = current,
                }
            }
        }
    }

    #[inline]
    fn reset_threshold(&self) {
        let full = self.full_threshold();
        if self.threshold.load(Ordering::SeqCst) != full {
            self.threshold.store(full, Ordering::SeqCst);
        }
    }

    /// Take the oldest published index, or `None` if the ring is empty.
    ///
    /// Never blocks. A consumer that overshoots `tail` pulls `tail` forward
    /// itself instead of waiting for the producers.
    ///
    /// With `nonempty` set the empty checks are skipped and the call keeps
    /// going until it obtains an index, so the caller must know one is there.
    pub fn dequeue(&self, nonempty: bool) -> Option<usize> {
        if !nonempty && self.threshold.load(Ordering::SeqCst) < 0 {
            return None;
        }
        let n = self.cell_count();
        let low = 2 * n - 1;

        loop {
            let head = self.head.fetch_add(1, Ordering::AcqRel);
            let head_cycle = (head << 1) | low;
            let cell = &self.cells[self.permute(head)];
            let mut attempts = 0u32;

            'reload: loop {
                let mut entry = cell.load(Ordering::Acquire);
                loop {
                    let entry_cycle = entry | low;
                    if entry_cycle == head_cycle {
                        cell.fetch_or(n - 1, Ordering::AcqRel);
                        return Some((entry & (n - 1)) as usize);
                    }

                    let replacement = if (entry | n) != entry_cycle {
                        // Holds an index from another lap: mark it unsafe so
                        // no producer reuses the cell underneath its owner.
                        let marked = entry & !n;
                        if entry == marked {
                            break 'reload;
                        }
                        marked
                    } else {
                        // Empty. Give a producer that already reserved this
                        // position a chance to finish before closing it.
                        attempts += 1;
                        if attempts <= PUBLISH_SPIN
                            && cursor_diff(self.tail.load(Ordering::Acquire), head) > 0
                        {
                            spin_loop();
                            continue 'reload;
                        }
                        head_cycle ^ (!entry & n)
                    };

                    if cursor_diff(entry_cycle, head_cycle) >= 0 {
                        break 'reload;
                    }
                    match cell.compare_exchange_weak(
                        entry,
                        replacement,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => break 'reload,
                        Err(current) => entry = current,
                    }
                }
            }

            if !nonempty {
                let next = head.wrapping_add(1);
                let tail = self.tail.load(Ordering::Acquire);
                if cursor_diff(tail, next) <= 0 {
                    self.catch_up(tail, next);
                    self.threshold.fetch_sub(1, Ordering::AcqRel);
                    return None;
                }
                if self.threshold.fetch_sub(1, Ordering::AcqRel) <= 0 {
                    return None;
                }
            }
        }
    }

    /// Drag a lagging `tail` up to `head`.
    fn catch_up(&self, mut tail: u64, mut head: u64) {
        while self
            .tail
            .compare_exchange_weak(tail, head, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            head = self.head.load(Ordering::Acquire);
            tail = self.tail.load(Ordering::Acquire);
            if cursor_diff(tail, head) >= 0 {
                break;
            }
        }
    }

    /// `tail - head`, or zero while consumers are ahead of the producers.
    ///
    /// Racy: counts positions reserved by in-flight producers.
    #[inline]
    #[must_use]
    pub fn distance(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        cursor_diff(tail, head).max(0) as usize
    }

    /// Reinitialize the ring holding exactly the indices `start..end`.
    ///
    /// # Panics
    ///
    /// Panics unless `start <= end <= capacity`.
    pub fn fill(&mut self, start: usize, end: usize) {
        assert!(start <= end, "fill range start {start} > end {end}");
        assert!(end <= self.capacity(), "fill range end {end} exceeds ring capacity");
        let n = self.cell_count();
        for cursor in 0..n {
            let value = if cursor < start as u64 {
                2 * n - 1
            } else if cursor < end as u64 {
                n + cursor
            } else {
                UNUSED
            };
            self.cells[self.permute(cursor)].store(value, Ordering::Relaxed);
        }
        self.head.store(start as u64, Ordering::Relaxed);
        self.tail.store(end as u64, Ordering::Relaxed);
        let threshold = if start == end { -1 } else { self.full_threshold() };
        self.threshold.store(threshold, Ordering::Relaxed);
    }

    /// Reinitialize the ring as empty.
    pub fn clear(&mut self) {
        for cell in self.cells.iter() {
            cell.store(UNUSED, Ordering::Relaxed);
        }
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
        self.threshold.store(-1, Ordering::Relaxed);
    }

    /// Reinitialize as an empty ring of `order`, reallocating if it changed.
    pub(crate) fn reset(&mut self, order: u32) {
        assert!(order <= MAX_ORDER, "ring order exceeds maximum ({MAX_ORDER})");
        if order != self.order {
            self.cells = Self::alloc_cells(order);
            self.order = order;
        }
        self.clear();
    }
}

impl fmt::Debug for IndexRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexRing")
            .field("order", &self.order)
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("threshold", &self.threshold.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn permute_is_a_bijection() {
        for order in 0..=12 {
            let cells = 2usize << order;
            let mut seen = vec![false; cells];
            for cursor in 0..cells as u64 {
                let cell = permute(cursor, order);
                assert!(cell < cells);
                assert!(!seen[cell], "order {order}: cell {cell} hit twice");
                seen[cell] = true;
            }
        }
    }

    #[test]
    fn permute_wraps_with_the_ring() {
        let order = 6;
        let cells = 2u64 << order;
        for cursor in 0..cells {
            assert_eq!(permute(cursor, order), permute(cursor + 5 * cells, order));
        }
    }

    #[test]
    fn permute_accepts_max_order() {
        let cells = 2usize << MAX_ORDER;
        assert_eq!(permute(0, MAX_ORDER), 0);
        assert!(permute(u64::MAX, MAX_ORDER) < cells);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "ring order exceeds maximum")]
    fn permute_rejects_oversized_order() {
        let _ = permute(1, 63);
    }

    #[test]
    fn consecutive_cursors_use_distinct_lines() {
        let order = 8;
        let per_line = CACHE_LINE / size_of::<AtomicU64>();
        for cursor in 0..64u64 {
            let a = permute(cursor, order) / per_line;
            let b = permute(cursor + 1, order) / per_line;
            assert_ne!(a, b, "cursor {cursor} and its successor share a line");
        }
    }

    #[test]
    fn small_rings_are_addressed_directly() {
        for cursor in 0..4 {
            assert_eq!(permute(cursor, 1), cursor as usize);
        }
    }

    #[test]
    fn empty_ring_dequeues_nothing() {
        let ring = IndexRing::with_order(3);
        assert_eq!(ring.dequeue(false), None);
        assert_eq!(ring.dequeue(false), None);
        assert_eq!(ring.distance(), 0);
    }

    #[test]
    fn filled_ring_yields_range_in_order() {
        let ring = IndexRing::filled(3, 2, 7);
        assert_eq!(ring.distance(), 5);
        for expected in 2..7 {
            assert_eq!(ring.dequeue(false), Some(expected));
        }
        assert_eq!(ring.dequeue(false), None);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let ring = IndexRing::with_order(2);
        assert!(!ring.enqueue(4, false));
        assert!(!ring.enqueue(usize::MAX, false));
        assert_eq!(ring.distance(), 0);
        assert_eq!(ring.dequeue(false), None);
    }

    #[test]
    fn survives_many_laps() {
        let ring = IndexRing::with_order(2);
        for lap in 0..1_000usize {
            for i in 0..4 {
                assert!(ring.enqueue((lap + i) % 4, false));
            }
            for i in 0..4 {
                assert_eq!(ring.dequeue(false), Some((lap + i) % 4));
            }
            assert_eq!(ring.dequeue(false), None);
        }
    }

    #[test]
    fn empty_probes_then_refill() {
        let ring = IndexRing::with_order(2);
        assert!(ring.enqueue(1, false));
        assert_eq!(ring.dequeue(false), Some(1));
        // Drive the threshold negative with failing probes.
        for _ in 0..32 {
            assert_eq!(ring.dequeue(false), None);
        }
        assert!(ring.enqueue(3, false));
        assert!(ring.enqueue(0, false));
        assert_eq!(ring.dequeue(false), Some(3));
        assert_eq!(ring.dequeue(false), Some(0));
    }

    #[test]
    fn nonempty_hint_skips_threshold() {
        let ring = IndexRing::filled(2, 0, 4);
        assert_eq!(ring.dequeue(true), Some(0));
        assert!(ring.enqueue(0, true));
        for expected in [1, 2, 3, 0] {
            assert_eq!(ring.dequeue(true), Some(expected));
        }
    }

    #[test]
    fn clear_and_reset() {
        let mut ring = IndexRing::filled(2, 0, 4);
        ring.clear();
        assert_eq!(ring.dequeue(false), None);
        ring.reset(5);
        assert_eq!(ring.order(), 5);
        assert_eq!(ring.capacity(), 32);
        ring.fill(0, 32);
        assert_eq!(ring.distance(), 32);
        assert_eq!(ring.dequeue(false), Some(0));
    }

    #[test]
    fn cache_line_layout() {
        let head = core::mem::offset_of!(IndexRing, head);
        let threshold = core::mem::offset_of!(IndexRing, threshold);
        let tail = core::mem::offset_of!(IndexRing, tail);
        let cells = core::mem::offset_of!(IndexRing, cells);

        assert_eq!(head, 0, "head should be at offset 0");
        assert!(threshold - head >= CACHE_LINE, "threshold must not share head's line");
        assert!(tail - threshold >= CACHE_LINE, "tail must not share threshold's line");
        assert!(cells - tail >= CACHE_LINE, "cold fields must not share tail's line");
    }

    #[test]
    fn concurrent_handoff_keeps_every_index() {
        let ring = Arc::new(IndexRing::filled(6, 0, 64));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        if let Some(index) = ring.dequeue(false) {
                            assert!(ring.enqueue(index, false));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut seen = BTreeSet::new();
        while let Some(index) = ring.dequeue(false) {
            assert!(seen.insert(index), "index {index} duplicated");
        }
        assert_eq!(seen.len(), 64);
    }
}
