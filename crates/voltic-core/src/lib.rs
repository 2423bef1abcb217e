//! Core types and traits for the Voltic circuit simulation.
//!
//! This is the leaf crate with zero internal Voltic dependencies. It defines
//! the fundamental abstractions used throughout the workspace: the canvas
//! grid and its element model, gate/relay truth tables, the communicator
//! endpoint trait, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod element;
pub mod error;
pub mod grid;
pub mod kinds;

// Re-export core types at crate root for convenience.
pub use comm::{Communicator, CommunicatorHandle, ScreenEvent};
pub use element::{Canvas, CommunicatorElement, Element, GateElement, RelayElement};
pub use error::FileError;
pub use grid::{Grid, Point, ORTHOGONAL};
pub use kinds::{CommunicatorKind, GateKind, RelayKind};
