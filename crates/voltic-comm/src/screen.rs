//! The UI-driven screen communicator.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use voltic_core::Communicator;

/// Packed input register: bit 0 is the live level, bits 1..=4 hold queued
/// events, `count` is the number of queued events beyond the live one.
#[derive(Default)]
struct InputRegister {
    state: u8,
    count: u8,
}

/// Receive-only endpoint driven by UI click events.
///
/// A five-slot shift register absorbs bursts of events between steps; the
/// stepping thread shifts one out per step and the live level holds once
/// the queue drains. When the register is full a new event folds into the
/// last slot rather than being dropped outright.
pub struct ScreenCommunicator {
    index: AtomicU32,
    input: Mutex<InputRegister>,
}

impl ScreenCommunicator {
    /// A fresh endpoint with an empty register.
    pub fn new() -> Self {
        Self {
            index: AtomicU32::new(0),
            input: Mutex::new(InputRegister::default()),
        }
    }

    /// Queue one on/off event. Called by the stepping thread while it
    /// drains the UI event queue.
    pub fn insert_event(&self, turn_on: bool) {
        let mut reg = self.input.lock().unwrap();
        if reg.count < 4 {
            reg.count += 1;
            reg.state |= (turn_on as u8) << reg.count;
        } else {
            reg.state |= (turn_on as u8) << 4;
        }
    }
}

impl Default for ScreenCommunicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator for ScreenCommunicator {
    fn receive(&self) -> bool {
        let mut reg = self.input.lock().unwrap();
        if reg.count > 0 {
            reg.state >>= 1;
            reg.count -= 1;
        }
        reg.state & 1 == 1
    }

    fn refresh(&self) {
        *self.input.lock().unwrap() = InputRegister::default();
    }

    fn set_index(&self, index: u32) {
        self.index.store(index, Ordering::Relaxed);
    }

    fn index(&self) -> u32 {
        self.index.load(Ordering::Relaxed)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_shift_out_in_order() {
        let screen = ScreenCommunicator::new();
        screen.insert_event(true);
        screen.insert_event(false);
        screen.insert_event(true);
        assert!(screen.receive());
        assert!(!screen.receive());
        assert!(screen.receive());
    }

    #[test]
    fn level_holds_when_queue_empty() {
        let screen = ScreenCommunicator::new();
        assert!(!screen.receive());
        screen.insert_event(true);
        assert!(screen.receive());
        // No further events: the live level stays high.
        assert!(screen.receive());
        assert!(screen.receive());
        screen.insert_event(false);
        assert!(!screen.receive());
        assert!(!screen.receive());
    }

    #[test]
    fn register_saturates_at_capacity() {
        let screen = ScreenCommunicator::new();
        for _ in 0..4 {
            screen.insert_event(false);
        }
        // Register full: this event folds into the last slot.
        screen.insert_event(true);
        assert!(!screen.receive());
        assert!(!screen.receive());
        assert!(!screen.receive());
        assert!(screen.receive(), "saturating event lands in the last slot");
    }

    #[test]
    fn refresh_clears_register() {
        let screen = ScreenCommunicator::new();
        screen.insert_event(true);
        screen.insert_event(true);
        screen.refresh();
        assert!(!screen.receive());
    }

    #[test]
    fn index_roundtrip() {
        let screen = ScreenCommunicator::new();
        screen.set_index(7);
        assert_eq!(screen.index(), 7);
    }
}
