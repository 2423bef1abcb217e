//! Voltic: the simulation core of an interactive digital-logic sandbox.
//!
//! This is the top-level facade crate re-exporting the public API from the
//! Voltic sub-crates. A UI layer paints a [`types::Canvas`] of circuit
//! elements, hands it to a [`engine::Simulator`], and reads lit/unlit
//! display state back through snapshots while the circuit evolves on its
//! own thread.
//!
//! # Quick start
//!
//! ```rust
//! use voltic::prelude::*;
//!
//! // A 1x3 strip: a source feeding a wire feeding a signal terminal.
//! let mut canvas = Canvas::filled(3, 1, Element::Empty);
//! canvas[Point::new(0, 0)] = Element::source();
//! canvas[Point::new(1, 0)] = Element::conductive_wire();
//! canvas[Point::new(2, 0)] = Element::signal();
//!
//! let mut sim = Simulator::new();
//! sim.compile(&mut canvas);
//! sim.step();
//! sim.take_snapshot(&mut canvas);
//!
//! match &canvas[Point::new(1, 0)] {
//!     Element::ConductiveWire { logic_level } => assert!(*logic_level),
//!     _ => unreachable!(),
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `voltic-core` | Canvas grid, elements, kinds, the communicator trait |
//! | [`queue`] | `voltic-queue` | SPSC rings and the block queue |
//! | [`comm`] | `voltic-comm` | Screen and file communicator endpoints |
//! | [`engine`] | `voltic-engine` | Compiler, step engine, and the simulator controller |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Canvas grid, element model, and core traits (`voltic-core`).
pub use voltic_core as types;

/// Specialized queues (`voltic-queue`).
///
/// The bounded [`queue::SpscRing`], the end/flush-marked
/// [`queue::FlushableRing`], and the single-threaded [`queue::BlockQueue`].
pub use voltic_queue as queue;

/// Communicator endpoints (`voltic-comm`).
///
/// [`comm::ScreenCommunicator`] for UI input,
/// [`comm::FileInputCommunicator`]/[`comm::FileOutputCommunicator`] for
/// byte streams backed by files.
pub use voltic_comm as comm;

/// Compiler, step engine, and controller (`voltic-engine`).
///
/// [`engine::Simulator`] is the entry point for UI layers.
pub use voltic_engine as engine;

/// Common imports for typical Voltic usage.
///
/// ```rust
/// use voltic::prelude::*;
/// ```
pub mod prelude {
    pub use voltic_comm::{FileInputCommunicator, FileOutputCommunicator, ScreenCommunicator};
    pub use voltic_core::{
        Canvas, Communicator, CommunicatorKind, Element, FileError, GateKind, Grid, Point,
        RelayKind, ScreenEvent,
    };
    pub use voltic_engine::{Simulator, StepMetrics};
}
