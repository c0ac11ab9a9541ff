//! Lock-free single-producer/single-consumer ring buffer.
//!
//! Carries small `Copy` records between exactly two threads without locks or
//! allocation after construction. Capacity is fixed at a power of two.
//! `push` never blocks: when the ring is full the new item is dropped and
//! `false` returned. That is the intended backpressure policy for every
//! queue in the adapter: parameter changes are refreshed continuously, so a
//! dropped entry only means momentary staleness, while blocking would stall
//! either the UI thread or the audio thread.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A fixed-capacity SPSC ring.
///
/// The contract is strict: at most one thread pushes and at most one thread
/// pops at any given time. Which thread plays which role may change between
/// phases (e.g. a queue drained on the audio thread while active and on the
/// main thread during a flush), as long as the two roles never run
/// concurrently from two threads each.
pub struct SpscQueue<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Next slot to read. Written by the consumer only.
    head: AtomicUsize,
    /// Next slot to write. Written by the producer only.
    tail: AtomicUsize,
}

// SAFETY: The ring hands each slot to exactly one side at a time: a slot is
// written by the producer strictly before the tail store (Release) makes it
// visible, and read by the consumer strictly before the head store frees it.
// T: Send is required because values cross threads by copy.
unsafe impl<T: Copy + Send> Send for SpscQueue<T> {}
// SAFETY: See above; shared access is mediated entirely through the two
// atomics, and the SPSC contract rules out concurrent same-side access.
unsafe impl<T: Copy + Send> Sync for SpscQueue<T> {}

impl<T: Copy> SpscQueue<T> {
    /// Create a ring with at least `capacity` slots, rounded up to the next
    /// power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Append an item. Returns `false` (and drops the item) when full.
    /// Producer side only.
    pub fn push(&self, item: T) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.capacity() {
            return false;
        }

        // SAFETY: The slot at `tail` is outside the readable region
        // [head, tail), so the consumer does not touch it until the Release
        // store below publishes it. Only this (single) producer writes it.
        unsafe {
            (*self.slots[tail & self.mask].get()).write(item);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Remove the oldest item. Returns `None` when empty. Consumer side
    /// only.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }

        // SAFETY: head != tail, so the slot at `head` holds an initialized
        // value published by the producer's Release store; only this
        // (single) consumer reads and frees it.
        let item = unsafe { (*self.slots[head & self.mask].get()).assume_init() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// `true` when no items are queued. Consumer-side snapshot.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Acquire)
    }
}
