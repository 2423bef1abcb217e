//! The canvas element model.
//!
//! A canvas is a grid of tagged element values owned by the UI layer. The
//! simulation core reads it during compile and writes the transient display
//! fields (`logic_level`, `transmit`, `conductive`) during compile and
//! snapshot.

use std::fmt;

use crate::comm::CommunicatorHandle;
use crate::grid::Grid;
use crate::kinds::{CommunicatorKind, GateKind, RelayKind};

/// The user's 2D grid of circuit elements.
pub type Canvas = Grid<Element>;

/// A logic gate cell.
#[derive(Clone, Debug)]
pub struct GateElement {
    /// Which truth table the gate applies.
    pub kind: GateKind,
    /// Displayed output level; also the persisted level seeding a compile.
    pub logic_level: bool,
}

/// A relay cell, acting as a switch between its adjacent components.
#[derive(Clone, Debug)]
pub struct RelayElement {
    /// Relay polarity.
    pub kind: RelayKind,
    /// Displayed logic level of the relay pixel.
    pub logic_level: bool,
    /// Displayed conductive state; also the persisted state seeding a compile.
    pub conductive: bool,
}

/// A communicator cell.
///
/// Adjacent communicator cells of the same kind share one backing endpoint;
/// the compile pass elects and rebinds `link` accordingly.
#[derive(Clone)]
pub struct CommunicatorElement {
    /// Which endpoint flavour this cell belongs to.
    pub kind: CommunicatorKind,
    /// Displayed logic level of the cell's component.
    pub logic_level: bool,
    /// Displayed transmit state; also the persisted state seeding a compile.
    pub transmit: bool,
    /// The shared endpoint, if one has been bound by a compile.
    pub link: Option<CommunicatorHandle>,
}

impl fmt::Debug for CommunicatorElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommunicatorElement")
            .field("kind", &self.kind)
            .field("logic_level", &self.logic_level)
            .field("transmit", &self.transmit)
            .field("linked", &self.link.is_some())
            .finish()
    }
}

/// One canvas cell.
#[derive(Clone, Debug, Default)]
pub enum Element {
    /// Nothing painted here.
    #[default]
    Empty,
    /// Plain wire; joins both axes into one component.
    ConductiveWire {
        /// Displayed logic level.
        logic_level: bool,
    },
    /// Crossover wire; its horizontal and vertical axes stay independent.
    InsulatedWire {
        /// Displayed logic level (either axis high).
        logic_level: bool,
    },
    /// Directed input/output terminal for gates, relays, and communicators.
    Signal {
        /// Displayed logic level.
        logic_level: bool,
    },
    /// Always-high driver.
    Source {
        /// Displayed logic level.
        logic_level: bool,
    },
    /// A logic gate.
    Gate(GateElement),
    /// A relay.
    Relay(RelayElement),
    /// A communicator.
    Communicator(CommunicatorElement),
}

impl Element {
    /// An unlit conductive wire.
    pub fn conductive_wire() -> Self {
        Self::ConductiveWire { logic_level: false }
    }

    /// An unlit insulated wire.
    pub fn insulated_wire() -> Self {
        Self::InsulatedWire { logic_level: false }
    }

    /// An unlit signal terminal.
    pub fn signal() -> Self {
        Self::Signal { logic_level: false }
    }

    /// A source.
    pub fn source() -> Self {
        Self::Source { logic_level: false }
    }

    /// A gate of the given kind with a low starting level.
    pub fn gate(kind: GateKind) -> Self {
        Self::Gate(GateElement {
            kind,
            logic_level: false,
        })
    }

    /// A relay of the given polarity, initially open.
    pub fn relay(kind: RelayKind) -> Self {
        Self::Relay(RelayElement {
            kind,
            logic_level: false,
            conductive: false,
        })
    }

    /// An unbound communicator cell of the given kind.
    pub fn communicator(kind: CommunicatorKind) -> Self {
        Self::Communicator(CommunicatorElement {
            kind,
            logic_level: false,
            transmit: false,
            link: None,
        })
    }

    /// Whether the component flood fill may pass through this element.
    pub fn is_floodfillable(&self) -> bool {
        matches!(
            self,
            Self::ConductiveWire { .. }
                | Self::InsulatedWire { .. }
                | Self::Signal { .. }
                | Self::Source { .. }
                | Self::Gate(_)
                | Self::Communicator(_)
        )
    }

    /// Whether this element on its own justifies keeping a component.
    ///
    /// Components containing only wire are discarded unless they border a
    /// relay.
    pub fn is_useful(&self) -> bool {
        matches!(
            self,
            Self::Signal { .. } | Self::Source { .. } | Self::Gate(_) | Self::Communicator(_)
        )
    }

    /// Whether this is a signal terminal.
    pub fn is_signal(&self) -> bool {
        matches!(self, Self::Signal { .. })
    }

    /// Whether this element consumes signals as directed inputs.
    ///
    /// Signals never join a receiver's component; they attach to it as
    /// inputs instead.
    pub fn is_signal_receiver(&self) -> bool {
        matches!(self, Self::Gate(_) | Self::Communicator(_))
    }

    /// Whether this is a relay.
    pub fn is_relay(&self) -> bool {
        matches!(self, Self::Relay(_))
    }

    /// Clear the transient display/persisted state back to the defaults.
    pub fn reset_transients(&mut self) {
        match self {
            Self::Empty => {}
            Self::ConductiveWire { logic_level }
            | Self::InsulatedWire { logic_level }
            | Self::Signal { logic_level }
            | Self::Source { logic_level } => *logic_level = false,
            Self::Gate(gate) => gate.logic_level = false,
            Self::Relay(relay) => {
                relay.logic_level = false;
                relay.conductive = false;
            }
            Self::Communicator(comm) => {
                comm.logic_level = false;
                comm.transmit = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(Element::conductive_wire().is_floodfillable());
        assert!(Element::insulated_wire().is_floodfillable());
        assert!(Element::signal().is_floodfillable());
        assert!(Element::source().is_floodfillable());
        assert!(Element::gate(GateKind::And).is_floodfillable());
        assert!(Element::communicator(CommunicatorKind::Screen).is_floodfillable());
        assert!(!Element::relay(RelayKind::Positive).is_floodfillable());
        assert!(!Element::Empty.is_floodfillable());

        assert!(!Element::conductive_wire().is_useful());
        assert!(Element::signal().is_useful());
        assert!(Element::source().is_useful());

        assert!(Element::gate(GateKind::Nor).is_signal_receiver());
        assert!(Element::communicator(CommunicatorKind::FileInput).is_signal_receiver());
        assert!(!Element::signal().is_signal_receiver());
        assert!(!Element::relay(RelayKind::Negative).is_signal_receiver());
    }

    #[test]
    fn reset_transients_clears_state() {
        let mut relay = Element::Relay(RelayElement {
            kind: RelayKind::Negative,
            logic_level: true,
            conductive: true,
        });
        relay.reset_transients();
        match relay {
            Element::Relay(r) => {
                assert!(!r.logic_level);
                assert!(!r.conductive);
            }
            _ => unreachable!(),
        }

        let mut comm = Element::Communicator(CommunicatorElement {
            kind: CommunicatorKind::Screen,
            logic_level: true,
            transmit: true,
            link: None,
        });
        comm.reset_transients();
        match comm {
            Element::Communicator(c) => {
                assert!(!c.logic_level);
                assert!(!c.transmit);
            }
            _ => unreachable!(),
        }
    }
}
