//! Sleep/wake pairing between a file endpoint and its I/O thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// A stop flag plus the mutex/condvar pair an I/O thread sleeps on.
///
/// The mutex guards no data; it exists so that a notify cannot slip between
/// a sleeper's predicate check and its wait. `notify` takes and releases
/// the lock before signalling for exactly that reason.
pub(crate) struct WakeSignal {
    stopping: AtomicBool,
    lock: Mutex<()>,
    cv: Condvar,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self {
            stopping: AtomicBool::new(false),
            lock: Mutex::new(()),
            cv: Condvar::new(),
        }
    }

    /// Whether the owning endpoint asked the thread to stop.
    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Re-arm the flag before spawning a fresh thread.
    pub(crate) fn reset(&self) {
        self.stopping.store(false, Ordering::Relaxed);
    }

    /// Request a stop. The flag is raised under the sleep lock so a thread
    /// mid-check cannot miss the wakeup.
    pub(crate) fn request_stop(&self) {
        {
            let _guard = self.lock.lock().unwrap();
            self.stopping.store(true, Ordering::Relaxed);
        }
        self.cv.notify_one();
    }

    /// A thread-internal stop (I/O failure): no notify needed, the thread
    /// itself is the only sleeper.
    pub(crate) fn stop_from_within(&self) {
        self.stopping.store(true, Ordering::Relaxed);
    }

    /// Wake the sleeping thread so it re-checks its work predicate.
    pub(crate) fn notify(&self) {
        drop(self.lock.lock().unwrap());
        self.cv.notify_one();
    }

    /// Sleep until `has_work` reports true or a stop is requested.
    pub(crate) fn sleep_until(&self, mut has_work: impl FnMut() -> bool) {
        let guard = self.lock.lock().unwrap();
        let _guard = self
            .cv
            .wait_while(guard, |_| {
                !self.stopping.load(Ordering::Relaxed) && !has_work()
            })
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn stop_wakes_sleeper() {
        let signal = Arc::new(WakeSignal::new());
        let sleeper = {
            let signal = Arc::clone(&signal);
            std::thread::spawn(move || {
                signal.sleep_until(|| false);
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        signal.request_stop();
        sleeper.join().unwrap();
        assert!(signal.is_stopping());
    }

    #[test]
    fn notify_wakes_on_work() {
        let signal = Arc::new(WakeSignal::new());
        let work = Arc::new(AtomicBool::new(false));
        let sleeper = {
            let signal = Arc::clone(&signal);
            let work = Arc::clone(&work);
            std::thread::spawn(move || {
                signal.sleep_until(|| work.load(Ordering::Relaxed));
            })
        };
        std::thread::sleep(Duration::from_millis(20));
        work.store(true, Ordering::Relaxed);
        signal.notify();
        sleeper.join().unwrap();
        assert!(!signal.is_stopping());
    }
}
