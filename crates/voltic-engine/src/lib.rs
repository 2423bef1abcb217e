//! Circuit compiler, step engine, and simulation controller for Voltic.
//!
//! Provides [`Simulator`] as the user-facing API: compile a canvas into a
//! packed circuit, run it on a dedicated stepping thread, and read back
//! snapshots from any thread. The compiled representation lives in
//! [`StaticData`]/[`DynamicData`]; one step is the fixed pipeline
//! sources → gates → relays → UI events → communicators → flood fill.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod compile;
pub mod data;
pub mod metrics;
pub mod sim;
mod step;

pub use compile::compile;
pub use data::{DynamicData, StaticData};
pub use metrics::StepMetrics;
pub use sim::Simulator;
