//! Bounded lock-free single-producer single-consumer ring buffer.
//!
//! The producer and consumer operate from distinct threads. All producer
//! operations are sequenced with one another and all consumer operations
//! with one another — enforced here by ownership: each side holds its own
//! handle and the mutating operations take `&mut self`. Producer and
//! consumer need no mutual sequencing beyond the ring's own
//! release/acquire edges on the two indices.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared storage behind a [`Producer`]/[`Consumer`] pair.
///
/// `size` slots hold at most `size - 1` elements; one slot stays empty to
/// distinguish full from empty.
pub struct SpscRing<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    push_index: AtomicUsize,
    pop_index: AtomicUsize,
}

// The ring is shared across the two handle threads; element access is
// disjoint by the index protocol.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    fn size(&self) -> usize {
        self.buf.len()
    }

    fn space_of(&self, push: usize, pop: usize) -> usize {
        let pop = if pop <= push { pop + self.size() } else { pop };
        pop - push - 1
    }

    fn available_of(&self, push: usize, pop: usize) -> usize {
        let push = if push < pop { push + self.size() } else { push };
        push - pop
    }

    fn wrap(&self, index: usize) -> usize {
        if index >= self.size() {
            index - self.size()
        } else {
            index
        }
    }

    /// # Safety
    ///
    /// The slot at `index` must hold an initialized element that no other
    /// reference observes.
    unsafe fn read_slot(&self, index: usize) -> T {
        (*self.buf[index].get()).assume_init_read()
    }

    /// # Safety
    ///
    /// The slot at `index` must be empty (popped or never pushed).
    unsafe fn write_slot(&self, index: usize, value: T) {
        (*self.buf[index].get()).write(value);
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        let push = *self.push_index.get_mut();
        let mut pop = *self.pop_index.get_mut();
        while pop != push {
            // Both handles are gone, so the slots in [pop, push) are ours.
            unsafe { drop(self.read_slot(pop)) };
            pop = self.wrap(pop + 1);
        }
    }
}

/// Create a ring of `size` slots (capacity `size - 1`) and return its two
/// endpoint handles.
///
/// # Panics
///
/// Panics if `size < 2`.
pub fn spsc_ring<T>(size: usize) -> (Producer<T>, Consumer<T>) {
    assert!(size >= 2, "ring size must be >= 2, got {size}");
    let buf = (0..size)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect();
    let ring = Arc::new(SpscRing {
        buf,
        push_index: AtomicUsize::new(0),
        pop_index: AtomicUsize::new(0),
    });
    (
        Producer {
            ring: Arc::clone(&ring),
        },
        Consumer { ring },
    )
}

/// The pushing side of an [`SpscRing`]. Exactly one exists per ring.
pub struct Producer<T> {
    ring: Arc<SpscRing<T>>,
}

impl<T> Producer<T> {
    /// How many elements can be pushed right now.
    pub fn space(&self) -> usize {
        let push = self.ring.push_index.load(Ordering::Relaxed);
        let pop = self.ring.pop_index.load(Ordering::Acquire);
        self.ring.space_of(push, pop)
    }

    /// Push one element, or hand it back if the ring is full.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        if self.space() == 0 {
            return Err(value);
        }
        let push = self.ring.push_index.load(Ordering::Relaxed);
        unsafe { self.ring.write_slot(push, value) };
        self.ring
            .push_index
            .store(self.ring.wrap(push + 1), Ordering::Release);
        Ok(())
    }

    /// Push a slice of elements.
    ///
    /// The caller must have checked [`space`](Self::space); this debug-asserts
    /// and does not re-check.
    pub fn push_slice(&mut self, src: &[T])
    where
        T: Copy,
    {
        debug_assert!(self.space() >= src.len(), "push_slice without space");
        let mut push = self.ring.push_index.load(Ordering::Relaxed);
        for &value in src {
            unsafe { self.ring.write_slot(push, value) };
            push = self.ring.wrap(push + 1);
        }
        self.ring.push_index.store(push, Ordering::Release);
    }

    /// Push one element and report whether the consumer may be sleeping on
    /// an empty ring, i.e. whether available went 0 → 1.
    ///
    /// The caller must have checked [`space`](Self::space). The single bit
    /// returned is what decides a condvar notify, so the peer index is
    /// re-read with acquire after the push is published.
    pub fn push_and_test_consumer_needs_signal(&mut self, value: T) -> bool {
        debug_assert!(self.space() > 0, "fused push without space");
        let push = self.ring.push_index.load(Ordering::Relaxed);
        unsafe { self.ring.write_slot(push, value) };
        let push = self.ring.wrap(push + 1);
        self.ring.push_index.store(push, Ordering::Release);
        let pop = self.ring.pop_index.load(Ordering::Acquire);
        self.ring.available_of(push, pop) <= 1
    }
}

/// The popping side of an [`SpscRing`]. Exactly one exists per ring.
pub struct Consumer<T> {
    ring: Arc<SpscRing<T>>,
}

impl<T> Consumer<T> {
    /// How many elements can be popped right now.
    pub fn available(&self) -> usize {
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        let push = self.ring.push_index.load(Ordering::Acquire);
        self.ring.available_of(push, pop)
    }

    /// Pop the front element if one exists.
    pub fn try_pop(&mut self) -> Option<T> {
        if self.available() == 0 {
            return None;
        }
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        let value = unsafe { self.ring.read_slot(pop) };
        self.ring
            .pop_index
            .store(self.ring.wrap(pop + 1), Ordering::Release);
        Some(value)
    }

    /// Borrow the front element without removing it.
    pub fn peek(&self) -> Option<&T> {
        if self.available() == 0 {
            return None;
        }
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        // The slot stays ours until we advance pop_index.
        Some(unsafe { (*self.ring.buf[pop].get()).assume_init_ref() })
    }

    /// Copy the front `dst.len()` elements into `dst` without removing them.
    ///
    /// The caller must have checked [`available`](Self::available).
    pub fn peek_slice(&self, dst: &mut [T])
    where
        T: Copy,
    {
        debug_assert!(self.available() >= dst.len(), "peek_slice without data");
        let mut pop = self.ring.pop_index.load(Ordering::Relaxed);
        for slot in dst {
            *slot = unsafe { *(*self.ring.buf[pop].get()).assume_init_ref() };
            pop = self.ring.wrap(pop + 1);
        }
    }

    /// Remove and drop the front `count` elements.
    ///
    /// The caller must have checked [`available`](Self::available).
    pub fn discard_front(&mut self, count: usize) {
        debug_assert!(self.available() >= count, "discard_front without data");
        let mut pop = self.ring.pop_index.load(Ordering::Relaxed);
        for _ in 0..count {
            unsafe { drop(self.ring.read_slot(pop)) };
            pop = self.ring.wrap(pop + 1);
        }
        self.ring.pop_index.store(pop, Ordering::Release);
    }

    /// Drop everything currently in the ring.
    pub fn clear(&mut self) {
        let push = self.ring.push_index.load(Ordering::Acquire);
        let mut pop = self.ring.pop_index.load(Ordering::Relaxed);
        while pop != push {
            unsafe { drop(self.ring.read_slot(pop)) };
            pop = self.ring.wrap(pop + 1);
        }
        self.ring.pop_index.store(pop, Ordering::Release);
    }

    /// Remove and drop the front element, reporting whether the producer
    /// may be sleeping on a full ring, i.e. whether space went 0 → 1.
    ///
    /// The caller must have checked [`available`](Self::available).
    pub fn pop_and_test_producer_needs_signal(&mut self) -> bool {
        debug_assert!(self.available() > 0, "fused pop without data");
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        unsafe { drop(self.ring.read_slot(pop)) };
        let pop = self.ring.wrap(pop + 1);
        self.ring.pop_index.store(pop, Ordering::Release);
        let push = self.ring.push_index.load(Ordering::Acquire);
        self.ring.space_of(push, pop) <= 1
    }
}
