//! Lock-free single-producer/single-consumer frame ring.
//!
//! The producer is the tick engine; the consumer is the background drain
//! thread. Indices are masked into a power-of-two slot array, with at most
//! `capacity - 1` slots usable so that `head == tail` is unambiguous
//! emptiness. Ordering is established purely through the index handshake:
//! the producer publishes `head` with Release only after storing the slot
//! words; the consumer publishes `tail` with Release only after reading
//! them. Slot payloads live in atomics, so the whole structure is safe code.
//!
//! Producer and consumer roles are a usage contract: exactly one thread may
//! call [`FrameRing::push`] and exactly one may call [`FrameRing::pop`].

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use bustap_types::{FRAME_WORDS, TraceFrame};

/// Default ring capacity in frames (~1 MiB of slot storage).
pub const DEFAULT_RING_CAPACITY: usize = 1 << 16;

struct FrameSlot {
    words: [AtomicU32; FRAME_WORDS],
}

impl FrameSlot {
    fn new() -> Self {
        Self {
            words: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }
}

/// Bounded SPSC ring of encoded frames.
pub struct FrameRing {
    slots: Box<[FrameSlot]>,
    /// Producer index, masked.
    head: AtomicUsize,
    /// Consumer index, masked.
    tail: AtomicUsize,
    mask: usize,
}

impl FrameRing {
    /// Create a ring with the given power-of-two capacity (>= 2).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity >= 2 && capacity.is_power_of_two(),
            "ring capacity must be a power of two >= 2"
        );
        Self {
            slots: (0..capacity).map(|_| FrameSlot::new()).collect(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            mask: capacity - 1,
        }
    }

    /// Slot count (one slot is always kept free).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn used(&self, head: usize, tail: usize) -> usize {
        head.wrapping_sub(tail) & self.mask
    }

    /// Frames currently buffered (approximate under concurrency).
    #[must_use]
    pub fn len(&self) -> usize {
        self.used(self.head.load(Ordering::Acquire), self.tail.load(Ordering::Acquire))
    }

    /// Whether the ring currently buffers no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Producer side: store one frame. Returns `false` (frame dropped by the
    /// caller) when fewer than one free slot remains. The producer never
    /// blocks.
    pub fn push(&self, frame: &TraceFrame) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if self.used(head, tail) == self.mask {
            return false;
        }

        let slot = &self.slots[head];
        for (cell, word) in slot.words.iter().zip(frame.to_words()) {
            cell.store(word, Ordering::Relaxed);
        }
        self.head.store(head.wrapping_add(1) & self.mask, Ordering::Release);
        true
    }

    /// Consumer side: take the oldest frame's wire words, or `None` when
    /// empty. The consumer never blocks here; the drain loop sleeps between
    /// polls instead.
    pub fn pop(&self) -> Option<[u32; FRAME_WORDS]> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let slot = &self.slots[tail];
        let mut words = [0u32; FRAME_WORDS];
        for (word, cell) in words.iter_mut().zip(slot.words.iter()) {
            *word = cell.load(Ordering::Relaxed);
        }
        self.tail.store(tail.wrapping_add(1) & self.mask, Ordering::Release);
        Some(words)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
