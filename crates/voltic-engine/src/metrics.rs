//! Per-step timing counters for the simulation controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A snapshot of the controller's step counters.
///
/// Counters accumulate across the simulator's lifetime; `last_step_us` is
/// the wall-clock time of the most recent step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepMetrics {
    /// Steps executed so far (threaded and synchronous).
    pub steps: u64,
    /// Steps that overran their configured period.
    pub overruns: u64,
    /// Wall-clock micros of the most recent step.
    pub last_step_us: u64,
}

/// Lock-free backing store, written by the stepping thread and read from
/// anywhere.
#[derive(Default)]
pub(crate) struct MetricsCell {
    steps: AtomicU64,
    overruns: AtomicU64,
    last_step_us: AtomicU64,
}

impl MetricsCell {
    pub(crate) fn record_step(&self, elapsed: Duration) {
        self.steps.fetch_add(1, Ordering::Relaxed);
        self.last_step_us
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_overrun(&self) {
        self.overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StepMetrics {
        StepMetrics {
            steps: self.steps.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            last_step_us: self.last_step_us.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let cell = MetricsCell::default();
        assert_eq!(cell.snapshot(), StepMetrics::default());
        cell.record_step(Duration::from_micros(120));
        cell.record_step(Duration::from_micros(80));
        cell.record_overrun();
        let snap = cell.snapshot();
        assert_eq!(snap.steps, 2);
        assert_eq!(snap.overruns, 1);
        assert_eq!(snap.last_step_us, 80);
    }
}
