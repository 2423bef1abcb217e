//! The simulation controller: lifecycle, stepping thread, and snapshots.
//!
//! [`Simulator`] owns the compiled circuit, the stepping thread while
//! running, and the atomically-published latest state. The UI thread drives
//! the lifecycle (`compile`/`start`/`stop`/`step`/`reset`) and reads
//! snapshots at any time; the stepping thread is the only caller of
//! communicator `transmit`/`receive`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use voltic_core::{Canvas, Element, ScreenEvent};

use crate::compile::compile;
use crate::data::{DynamicData, StaticData};
use crate::metrics::{MetricsCell, StepMetrics};
use crate::step::advance;

/// The atomically-published latest complete state.
///
/// A single mutex-guarded slot: the stepping thread replaces the `Arc`
/// whole (never mutating a published state in place) and readers clone the
/// handle out. The lock is held only for the pointer swap.
struct StateSlot {
    slot: Mutex<Option<Arc<DynamicData>>>,
}

impl StateSlot {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn publish(&self, state: Arc<DynamicData>) {
        *self.slot.lock().unwrap() = Some(state);
    }

    fn latest(&self) -> Option<Arc<DynamicData>> {
        self.slot.lock().unwrap().clone()
    }

    fn clear(&self) {
        *self.slot.lock().unwrap() = None;
    }
}

/// State shared with the stepping thread.
struct SimShared {
    /// Cooperative stop flag, raised under `sleep` so a sleeping thread
    /// cannot miss it.
    stopping: AtomicBool,
    sleep: Mutex<()>,
    sleep_cv: Condvar,
    /// Step period in nanoseconds; 0 means "as fast as possible".
    period_nanos: AtomicU64,
}

/// The interactive circuit simulator.
///
/// Lifecycle preconditions (compile/reset/step/start require a stopped
/// simulator, stop requires a running one) are programmer errors and
/// asserted.
pub struct Simulator {
    static_data: Arc<StaticData>,
    latest: Arc<StateSlot>,
    shared: Arc<SimShared>,
    metrics: Arc<MetricsCell>,
    event_tx: Sender<ScreenEvent>,
    event_rx: Receiver<ScreenEvent>,
    sim_thread: Option<JoinHandle<()>>,
}

impl Simulator {
    /// A simulator holding no circuit, stepping as fast as possible.
    pub fn new() -> Self {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        Self {
            static_data: Arc::new(StaticData::empty()),
            latest: Arc::new(StateSlot::new()),
            shared: Arc::new(SimShared {
                stopping: AtomicBool::new(false),
                sleep: Mutex::new(()),
                sleep_cv: Condvar::new(),
                period_nanos: AtomicU64::new(0),
            }),
            metrics: Arc::new(MetricsCell::default()),
            event_tx,
            event_rx,
            sim_thread: None,
        }
    }

    /// A simulator with the given step period preconfigured.
    pub fn with_period(period: Duration) -> Self {
        let sim = Self::new();
        sim.set_period(period);
        sim
    }

    /// Whether the stepping thread is running.
    pub fn is_running(&self) -> bool {
        self.sim_thread.is_some()
    }

    /// Whether a compiled simulation is loaded.
    pub fn holds_simulation(&self) -> bool {
        self.latest.latest().is_some()
    }

    /// Compile `canvas`, publish the flood-filled initial state, and write
    /// it back into the canvas display fields.
    ///
    /// # Panics
    ///
    /// Panics if the simulator is running.
    pub fn compile(&mut self, canvas: &mut Canvas) {
        assert!(!self.is_running(), "compile requires a stopped simulator");
        // Events queued against the old topology would target the wrong
        // endpoints.
        while self.event_rx.try_recv().is_ok() {}
        let (static_data, initial) = compile(canvas);
        self.static_data = Arc::new(static_data);
        self.latest.publish(Arc::new(initial));
        self.take_snapshot(canvas);
    }

    /// Clear all transient element state, recompile, and reset every
    /// communicator endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the simulator is running.
    pub fn reset(&mut self, canvas: &mut Canvas) {
        assert!(!self.is_running(), "reset requires a stopped simulator");
        for element in canvas.cells_mut() {
            element.reset_transients();
        }
        self.compile(canvas);
        for comm in self.static_data.communicators.iter() {
            comm.link.reset();
        }
    }

    /// Spawn the stepping thread.
    ///
    /// # Panics
    ///
    /// Panics if already running or if no compile has produced a state.
    pub fn start(&mut self) {
        assert!(!self.is_running(), "start requires a stopped simulator");
        assert!(self.holds_simulation(), "start requires a compiled circuit");
        self.shared.stopping.store(false, Ordering::Relaxed);

        let static_data = Arc::clone(&self.static_data);
        let latest = Arc::clone(&self.latest);
        let shared = Arc::clone(&self.shared);
        let metrics = Arc::clone(&self.metrics);
        let events = self.event_rx.clone();
        self.sim_thread = Some(
            thread::Builder::new()
                .name("voltic-sim".into())
                .spawn(move || run(static_data, latest, shared, metrics, events))
                .expect("failed to spawn simulation thread"),
        );
    }

    /// Stop the stepping thread and wait for it to publish its final step.
    ///
    /// # Panics
    ///
    /// Panics if not running.
    pub fn stop(&mut self) {
        assert!(self.is_running(), "stop requires a running simulator");
        {
            let _guard = self.shared.sleep.lock().unwrap();
            self.shared.stopping.store(true, Ordering::Relaxed);
        }
        self.shared.sleep_cv.notify_one();
        if let Some(handle) = self.sim_thread.take() {
            handle.join().expect("simulation thread panicked");
        }
    }

    /// Run one step synchronously and publish the result.
    ///
    /// # Panics
    ///
    /// Panics if running or if no compile has produced a state.
    pub fn step(&mut self) {
        assert!(!self.is_running(), "step requires a stopped simulator");
        let current = self
            .latest
            .latest()
            .expect("step requires a compiled circuit");
        let started = Instant::now();
        let mut next = DynamicData::sized_for(&self.static_data);
        advance(&self.static_data, &current, &mut next, &self.event_rx);
        self.metrics.record_step(started.elapsed());
        self.latest.publish(Arc::new(next));
    }

    /// Drop the active simulation.
    ///
    /// # Panics
    ///
    /// Panics if running.
    pub fn clear(&mut self) {
        assert!(!self.is_running(), "clear requires a stopped simulator");
        self.latest.clear();
    }

    /// Write the latest published state into the canvas display fields.
    ///
    /// Valid whether running or stopped; does nothing before the first
    /// compile. The canvas must have the same element layout as the one
    /// that was compiled.
    pub fn take_snapshot(&self, canvas: &mut Canvas) {
        let Some(state) = self.latest.latest() else {
            return;
        };
        let data = &self.static_data;
        debug_assert!(
            canvas.width() == data.pixels.width() && canvas.height() == data.pixels.height(),
            "snapshot canvas must match the compiled layout"
        );
        for pt in canvas.points() {
            let pixel = &data.pixels[pt];
            match &mut canvas[pt] {
                Element::Empty => {}
                Element::ConductiveWire { logic_level }
                | Element::InsulatedWire { logic_level }
                | Element::Signal { logic_level }
                | Element::Source { logic_level } => {
                    *logic_level = pixel.logic_level(&state);
                }
                Element::Gate(gate) => gate.logic_level = pixel.logic_level(&state),
                Element::Relay(relay) => {
                    relay.logic_level = pixel.logic_level(&state);
                    let relay_pixel =
                        pixel.link[0].expect("relay pixels record their index");
                    relay.conductive = state.relay_conductive[relay_pixel as usize];
                }
                Element::Communicator(comm) => {
                    comm.logic_level = pixel.logic_level(&state);
                    if let Some(link) = &comm.link {
                        comm.transmit = state.transmit_states[link.index() as usize];
                    }
                }
            }
        }
    }

    /// Queue an on/off event for a screen communicator. Callable from any
    /// thread, running or not; the event is consumed at the start of the
    /// next step.
    pub fn send_communicator_event(&self, communicator_index: u32, turn_on: bool) {
        // The receiver lives in this struct, so the channel cannot close.
        let _ = self.event_tx.send(ScreenEvent {
            communicator_index,
            turn_on,
        });
    }

    /// Set the step period; zero means "as fast as possible".
    pub fn set_period(&self, period: Duration) {
        self.shared
            .period_nanos
            .store(period.as_nanos() as u64, Ordering::Release);
    }

    /// The current step period.
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.shared.period_nanos.load(Ordering::Acquire))
    }

    /// Counters for steps executed so far.
    pub fn metrics(&self) -> StepMetrics {
        self.metrics.snapshot()
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

/// The stepping thread body.
///
/// Each iteration computes the next state from the previous one and
/// publishes it before re-checking the stop flag, so the final step is
/// always visible and communicators never skip a tick. With a non-zero
/// period the thread sleeps toward `next_step_time`, interruptible by
/// stop; an overdue step resets the schedule instead of accumulating lag.
fn run(
    static_data: Arc<StaticData>,
    latest: Arc<StateSlot>,
    shared: Arc<SimShared>,
    metrics: Arc<MetricsCell>,
    events: Receiver<ScreenEvent>,
) {
    let mut current = latest
        .latest()
        .expect("the stepping thread starts after a compile");
    let mut next_step_time = Instant::now();

    loop {
        let started = Instant::now();
        let mut next = DynamicData::sized_for(&static_data);
        advance(&static_data, &current, &mut next, &events);
        let published = Arc::new(next);
        latest.publish(Arc::clone(&published));
        current = published;
        metrics.record_step(started.elapsed());

        if shared.stopping.load(Ordering::Acquire) {
            break;
        }

        let period_nanos = shared.period_nanos.load(Ordering::Acquire);
        if period_nanos == 0 {
            continue;
        }
        next_step_time += Duration::from_nanos(period_nanos);
        let now = Instant::now();
        if next_step_time > now {
            let guard = shared.sleep.lock().unwrap();
            let _guard = shared
                .sleep_cv
                .wait_timeout_while(guard, next_step_time - now, |_| {
                    !shared.stopping.load(Ordering::Relaxed)
                })
                .unwrap();
            if shared.stopping.load(Ordering::Relaxed) {
                break;
            }
        } else {
            // Overdue: the period is faster than the circuit evaluates.
            next_step_time = now;
            metrics.record_overrun();
        }
    }
}
