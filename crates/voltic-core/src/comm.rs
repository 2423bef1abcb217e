//! The communicator endpoint trait shared between the canvas and the engine.

use std::any::Any;
use std::sync::Arc;

/// A polymorphic endpoint that exchanges one bit in each direction per
/// simulation step.
///
/// Canvas elements and the compiled circuit share ownership of the same
/// endpoint object through a [`CommunicatorHandle`]; the compile pass may
/// rebind a pixel's handle when adjacent communicator pixels are merged.
///
/// Unless noted otherwise, `receive` and `transmit` are called only by the
/// stepping thread; `refresh`, `reset`, and the index accessors are called
/// while the simulator is stopped.
pub trait Communicator: Send + Sync {
    /// The next bit driving this communicator's output component.
    fn receive(&self) -> bool;

    /// Accept the next transmit-state bit for this step.
    ///
    /// Receive-only endpoints ignore it.
    fn transmit(&self, value: bool) {
        let _ = value;
    }

    /// Clear scratch state that depends on the compiled topology.
    /// Called by the compile pass.
    fn refresh(&self) {}

    /// Reset all state to initial. Called by the simulator reset.
    fn reset(&self) {}

    /// Store the compiler-assigned communicator index.
    fn set_index(&self, index: u32);

    /// The communicator index assigned by the most recent compile.
    fn index(&self) -> u32;

    /// Downcast support for endpoint-specific dispatch.
    fn as_any(&self) -> &dyn Any;
}

/// Shared ownership of a communicator endpoint.
pub type CommunicatorHandle = Arc<dyn Communicator>;

/// A queued on/off signal for a screen communicator, sent from the UI
/// thread to the stepping thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenEvent {
    /// Index of the target screen communicator.
    pub communicator_index: u32,
    /// Whether the signal turns the input on or off.
    pub turn_on: bool,
}
