//! The flushable byte-pipe variant of the SPSC ring.
//!
//! Adds two atomic sentinel indices on top of the plain ring: an
//! end-of-stream marker set by the producer when the stream runs dry, and a
//! flush marker that lets the consumer discard everything buffered up to a
//! producer-chosen boundary (a file swap). Elements must be plain values;
//! in practice this carries bytes between a file-reader thread and the
//! stepping thread.
//!
//! Marker algebra:
//! - `end()` marks the current push position; `ended()` is true once the
//!   pop position reaches it.
//! - `flush()` (normally right after `end()`) marks a discard point;
//!   `discard()` jumps the pop position there, returning true exactly once
//!   per pending flush.
//! - Any push clears both markers: new data means the stream did not end.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Sentinel for "no marker set".
const UNSET: usize = usize::MAX;

/// Shared storage behind a [`FlushProducer`]/[`FlushConsumer`] pair.
///
/// `size` slots hold at most `size - 1` elements.
pub struct FlushableRing<T> {
    buf: Box<[UnsafeCell<T>]>,
    push_index: AtomicUsize,
    pop_index: AtomicUsize,
    end_index: AtomicUsize,
    flush_index: AtomicUsize,
}

unsafe impl<T: Send> Send for FlushableRing<T> {}
unsafe impl<T: Send> Sync for FlushableRing<T> {}

impl<T> FlushableRing<T> {
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

    fn clear_markers(&self) {
        if self.end_index.load(Ordering::Relaxed) != UNSET {
            self.end_index.store(UNSET, Ordering::Release);
        }
        if self.flush_index.load(Ordering::Relaxed) != UNSET {
            self.flush_index.store(UNSET, Ordering::Release);
        }
    }
}

/// Create a flushable ring of `size` slots (capacity `size - 1`) and return
/// its two endpoint handles.
///
/// # Panics
///
/// Panics if `size < 2`.
pub fn flushable_ring<T: Copy + Default>(size: usize) -> (FlushProducer<T>, FlushConsumer<T>) {
    assert!(size >= 2, "ring size must be >= 2, got {size}");
    let buf = (0..size).map(|_| UnsafeCell::new(T::default())).collect();
    let ring = Arc::new(FlushableRing {
        buf,
        push_index: AtomicUsize::new(0),
        pop_index: AtomicUsize::new(0),
        end_index: AtomicUsize::new(UNSET),
        flush_index: AtomicUsize::new(UNSET),
    });
    (
        FlushProducer {
            ring: Arc::clone(&ring),
        },
        FlushConsumer { ring },
    )
}

/// The pushing side of a [`FlushableRing`].
///
/// The handle may migrate between threads (file thread to UI thread and
/// back), but only ever lives on one at a time; the migration is sequenced
/// by the thread join.
pub struct FlushProducer<T: Copy + Default> {
    ring: Arc<FlushableRing<T>>,
}

impl<T: Copy + Default> FlushProducer<T> {
    /// How many elements can be pushed right now.
    pub fn space(&self) -> usize {
        let push = self.ring.push_index.load(Ordering::Relaxed);
        let pop = self.ring.pop_index.load(Ordering::Acquire);
        self.ring.space_of(push, pop)
    }

    /// Push one element, or hand it back if the ring is full.
    /// Clears any pending end/flush marker.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        if self.space() == 0 {
            return Err(value);
        }
        self.ring.clear_markers();
        let push = self.ring.push_index.load(Ordering::Relaxed);
        unsafe { *self.ring.buf[push].get() = value };
        self.ring
            .push_index
            .store(self.ring.wrap(push + 1), Ordering::Release);
        Ok(())
    }

    /// Push a slice of elements. Clears any pending end/flush marker.
    ///
    /// The caller must have checked [`space`](Self::space); this
    /// debug-asserts and does not re-check.
    pub fn push_slice(&mut self, src: &[T]) {
        debug_assert!(self.space() >= src.len(), "push_slice without space");
        if src.is_empty() {
            return;
        }
        self.ring.clear_markers();
        let mut push = self.ring.push_index.load(Ordering::Relaxed);
        for &value in src {
            unsafe { *self.ring.buf[push].get() = value };
            push = self.ring.wrap(push + 1);
        }
        self.ring.push_index.store(push, Ordering::Release);
    }

    /// Mark the current push position as the end of the stream.
    pub fn end(&mut self) {
        let push = self.ring.push_index.load(Ordering::Relaxed);
        self.ring.end_index.store(push, Ordering::Release);
    }

    /// Mark everything buffered so far as discardable.
    ///
    /// Normally called right after [`end`](Self::end) when the backing
    /// stream is being replaced.
    pub fn flush(&mut self) {
        let push = self.ring.push_index.load(Ordering::Relaxed);
        self.ring.flush_index.store(push, Ordering::Release);
    }
}

/// The popping side of a [`FlushableRing`].
pub struct FlushConsumer<T: Copy + Default> {
    ring: Arc<FlushableRing<T>>,
}

impl<T: Copy + Default> FlushConsumer<T> {
    /// How many elements can be popped right now.
    pub fn available(&self) -> usize {
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        let push = self.ring.push_index.load(Ordering::Acquire);
        self.ring.available_of(push, pop)
    }

    /// Copy the front element without removing it.
    pub fn peek(&self) -> Option<T> {
        if self.available() == 0 {
            return None;
        }
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        Some(unsafe { *self.ring.buf[pop].get() })
    }

    /// Pop the front element if one exists.
    pub fn try_pop(&mut self) -> Option<T> {
        if self.available() == 0 {
            return None;
        }
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        let value = unsafe { *self.ring.buf[pop].get() };
        self.ring
            .pop_index
            .store(self.ring.wrap(pop + 1), Ordering::Release);
        Some(value)
    }

    /// Remove the front element, reporting whether the producer may be
    /// sleeping on a full ring.
    ///
    /// The caller must have checked [`available`](Self::available) (or
    /// peeked successfully).
    pub fn pop_and_test_producer_needs_signal(&mut self) -> bool {
        debug_assert!(self.available() > 0, "fused pop without data");
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        let pop = self.ring.wrap(pop + 1);
        self.ring.pop_index.store(pop, Ordering::Release);
        let push = self.ring.push_index.load(Ordering::Acquire);
        self.ring.space_of(push, pop) <= 1
    }

    /// Whether the pop position has reached the producer's end marker.
    pub fn ended(&self) -> bool {
        let end = self.ring.end_index.load(Ordering::Acquire);
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        end == pop
    }

    /// Jump the pop position to the flush marker, discarding the buffered
    /// elements before it. Returns true iff a pending flush was consumed.
    pub fn discard(&mut self) -> bool {
        let flush = self.ring.flush_index.load(Ordering::Acquire);
        let push = self.ring.push_index.load(Ordering::Acquire);
        let pop = self.ring.pop_index.load(Ordering::Relaxed);
        if flush == UNSET || pop == flush {
            return false;
        }
        // A marker outside the currently-buffered window is stale (the
        // producer has already pushed past it).
        if self.ring.available_of(push, pop) < self.ring.available_of(flush, pop) {
            return false;
        }
        self.ring.pop_index.store(flush, Ordering::Release);
        true
    }

    /// Drop everything currently buffered and forget any markers.
    pub fn clear(&mut self) {
        let push = self.ring.push_index.load(Ordering::Acquire);
        self.ring.pop_index.store(push, Ordering::Release);
        self.ring.end_index.store(UNSET, Ordering::Relaxed);
        self.ring.flush_index.store(UNSET, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_roundtrip() {
        let (mut tx, mut rx) = flushable_ring::<u8>(8);
        tx.try_push(0x41).unwrap();
        tx.try_push(0x42).unwrap();
        assert_eq!(rx.peek(), Some(0x41));
        assert_eq!(rx.try_pop(), Some(0x41));
        assert_eq!(rx.try_pop(), Some(0x42));
        assert_eq!(rx.try_pop(), None);
    }

    #[test]
    fn end_flush_discard() {
        let (mut tx, mut rx) = flushable_ring::<u8>(8);
        tx.try_push(0x41).unwrap();
        tx.try_push(0x42).unwrap();
        tx.end();
        tx.flush();

        assert!(rx.discard(), "pending flush must be consumed");
        assert_eq!(rx.available(), 0);
        assert!(rx.ended());
        assert!(!rx.discard(), "flush is consumed exactly once");
    }

    #[test]
    fn ended_tracks_pop_position() {
        let (mut tx, mut rx) = flushable_ring::<u8>(8);
        tx.try_push(1).unwrap();
        tx.end();
        assert!(!rx.ended(), "a byte is still buffered");
        assert_eq!(rx.try_pop(), Some(1));
        assert!(rx.ended());
    }

    #[test]
    fn push_clears_markers() {
        let (mut tx, mut rx) = flushable_ring::<u8>(8);
        tx.try_push(1).unwrap();
        tx.end();
        tx.flush();
        tx.try_push(2).unwrap();
        assert!(!rx.discard(), "push cleared the flush marker");
        assert_eq!(rx.try_pop(), Some(1));
        assert_eq!(rx.try_pop(), Some(2));
        assert!(!rx.ended(), "push cleared the end marker");
    }

    #[test]
    fn fresh_ring_has_no_markers() {
        let (_tx, mut rx) = flushable_ring::<u8>(8);
        assert!(!rx.ended());
        assert!(!rx.discard());
    }

    #[test]
    fn discard_skips_only_buffered_prefix() {
        let (mut tx, mut rx) = flushable_ring::<u8>(8);
        tx.try_push(1).unwrap();
        tx.try_push(2).unwrap();
        tx.end();
        tx.flush();
        // The consumer drained one byte before noticing the flush.
        assert_eq!(rx.try_pop(), Some(1));
        assert!(rx.discard());
        assert_eq!(rx.available(), 0);
        assert!(rx.ended());
    }

    #[test]
    fn clear_resets_everything() {
        let (mut tx, mut rx) = flushable_ring::<u8>(8);
        tx.try_push(1).unwrap();
        tx.end();
        tx.flush();
        rx.clear();
        assert_eq!(rx.available(), 0);
        assert!(!rx.ended());
        assert!(!rx.discard());
    }

    #[test]
    fn fused_pop_signals_producer_on_full_ring() {
        let (mut tx, mut rx) = flushable_ring::<u8>(4);
        for i in 0..3 {
            tx.try_push(i).unwrap();
        }
        assert_eq!(tx.space(), 0);
        assert!(rx.pop_and_test_producer_needs_signal());
        assert!(!rx.pop_and_test_producer_needs_signal());
    }

    #[test]
    fn slice_push_wraps() {
        let (mut tx, mut rx) = flushable_ring::<u8>(4);
        tx.push_slice(&[1, 2, 3]);
        assert_eq!(rx.try_pop(), Some(1));
        assert_eq!(rx.try_pop(), Some(2));
        tx.push_slice(&[4, 5]);
        assert_eq!(rx.try_pop(), Some(3));
        assert_eq!(rx.try_pop(), Some(4));
        assert_eq!(rx.try_pop(), Some(5));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn space_available_conservation(pushes in 0usize..7, pops in 0usize..7) {
                let (mut tx, mut rx) = flushable_ring::<u8>(8);
                let pushed = pushes.min(7);
                for i in 0..pushed {
                    tx.try_push(i as u8).unwrap();
                }
                let popped = pops.min(pushed);
                for _ in 0..popped {
                    rx.try_pop().unwrap();
                }
                prop_assert_eq!(tx.space() + rx.available(), 7);
            }

            #[test]
            fn fifo_order_preserved(data in proptest::collection::vec(any::<u8>(), 0..100)) {
                let (mut tx, mut rx) = flushable_ring::<u8>(16);
                let mut out = Vec::new();
                let mut fed = 0;
                while out.len() < data.len() {
                    while fed < data.len() && tx.try_push(data[fed]).is_ok() {
                        fed += 1;
                    }
                    while let Some(b) = rx.try_pop() {
                        out.push(b);
                    }
                }
                prop_assert_eq!(out, data);
            }
        }
    }
}
