//! Specialized queues for the Voltic circuit simulation.
//!
//! Three structures with deliberately narrow contracts:
//!
//! - [`SpscRing`]: a bounded lock-free single-producer single-consumer ring,
//!   split into [`Producer`]/[`Consumer`] handles, with fused operations
//!   that report whether the peer needs a wakeup.
//! - [`FlushableRing`]: the byte-pipe variant carrying end-of-stream and
//!   flush markers, used between a file-reader thread and the stepping
//!   thread.
//! - [`BlockQueue`]: a single-threaded unbounded unrolled-list queue that
//!   recycles drained blocks instead of freeing them.
//!
//! This is the only crate in the workspace that uses `unsafe`; everything
//! here is plain index arithmetic over owned buffers, with the
//! producer/consumer split making cross-thread exclusivity a type-level
//! guarantee.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod block;
mod flushable;
mod spsc;

pub use block::BlockQueue;
pub use flushable::{flushable_ring, FlushConsumer, FlushProducer, FlushableRing};
pub use spsc::{spsc_ring, Consumer, Producer, SpscRing};
