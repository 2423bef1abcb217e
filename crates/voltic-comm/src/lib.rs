//! Communicator endpoints bridging the Voltic simulation with the outside
//! world.
//!
//! Three endpoint flavours implement [`voltic_core::Communicator`]:
//!
//! - [`ScreenCommunicator`]: receive-only input driven by UI events.
//! - [`FileInputCommunicator`]: serves bytes from a file over a framed bit
//!   protocol, fed by its own reader thread.
//! - [`FileOutputCommunicator`]: writes bytes to a file, acknowledged per
//!   committed byte, drained by its own writer thread.
//!
//! The file endpoints talk to their I/O thread through the bounded rings in
//! `voltic-queue` and wake it only on the empty/full transitions the fused
//! queue operations report.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod file_input;
mod file_output;
mod screen;
mod wake;

pub use file_input::FileInputCommunicator;
pub use file_output::FileOutputCommunicator;
pub use screen::ScreenCommunicator;

/// Capacity of the byte rings between a file endpoint and its I/O thread.
pub const FILE_BUF_SIZE: usize = 65536;
