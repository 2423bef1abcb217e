//! The compiled circuit representation.
//!
//! [`StaticData`] is the packed topology produced by a compile and
//! immutable until the next one. [`DynamicData`] is the per-step logic
//! state; a fresh all-false instance is produced every step and published
//! whole, never mutated in place after publication.
//!
//! Gates and relays are partitioned by kind × fan-in into contiguous
//! buckets with fixed-length input arrays, so per-step evaluation is
//! branch-predictable and walks dense memory.

use voltic_core::{CommunicatorHandle, Grid};

/// An always-high driver feeding one component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Source {
    /// The component this source drives.
    pub output: u32,
}

/// A logic gate with `N` inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gate<const N: usize> {
    /// Components read on the previous step.
    pub inputs: [u32; N],
    /// The component the gate drives.
    pub output: u32,
}

/// A relay with `N` inputs controlling one relay pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relay<const N: usize> {
    /// Components read on the previous step.
    pub inputs: [u32; N],
    /// The relay pixel whose conductivity this relay sets.
    pub output_relay_pixel: u32,
}

/// One gate kind's buckets, fan-in 0 through 4.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GateBuckets {
    /// Gates with no signal neighbours.
    pub fan0: Box<[Gate<0>]>,
    /// Single-input gates.
    pub fan1: Box<[Gate<1>]>,
    /// Two-input gates.
    pub fan2: Box<[Gate<2>]>,
    /// Three-input gates.
    pub fan3: Box<[Gate<3>]>,
    /// Four-input gates.
    pub fan4: Box<[Gate<4>]>,
}

impl GateBuckets {
    /// Total number of gates across the buckets.
    pub fn len(&self) -> usize {
        self.fan0.len() + self.fan1.len() + self.fan2.len() + self.fan3.len() + self.fan4.len()
    }

    /// Whether no gates of this kind exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All logic gates, partitioned by kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GateTable {
    /// And gates.
    pub and: GateBuckets,
    /// Or gates.
    pub or: GateBuckets,
    /// Nand gates.
    pub nand: GateBuckets,
    /// Nor gates.
    pub nor: GateBuckets,
}

/// One relay polarity's buckets, fan-in 0 through 4.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayBuckets {
    /// Relays with no signal neighbours.
    pub fan0: Box<[Relay<0>]>,
    /// Single-input relays.
    pub fan1: Box<[Relay<1>]>,
    /// Two-input relays.
    pub fan2: Box<[Relay<2>]>,
    /// Three-input relays.
    pub fan3: Box<[Relay<3>]>,
    /// Four-input relays.
    pub fan4: Box<[Relay<4>]>,
}

/// All relays, partitioned by polarity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayTable {
    /// Relays that close when any input is high.
    pub positive: RelayBuckets,
    /// Relays that close when any input is low.
    pub negative: RelayBuckets,
}

/// A compiled communicator endpoint.
#[derive(Clone)]
pub struct CommEndpoint {
    /// Components whose OR is transmitted each step; strictly ascending.
    pub inputs: Box<[u32]>,
    /// The component driven by `receive()`.
    pub output: u32,
    /// The shared endpoint object.
    pub link: CommunicatorHandle,
}

/// A connected component's window into [`StaticData::adj_relay_list`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Component {
    /// First adjacent relay pixel index.
    pub adj_begin: u32,
    /// One past the last adjacent relay pixel index.
    pub adj_end: u32,
}

/// A relay pixel with its adjacent components inlined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelayPixel {
    /// Adjacent component indices; only the first `adj_len` are valid.
    pub adj_components: [u32; 4],
    /// Number of valid entries in `adj_components`.
    pub adj_len: u8,
}

/// What a canvas pixel maps to in the compiled circuit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PixelKind {
    /// Nothing here.
    #[default]
    Empty,
    /// Part of a plain component.
    Component,
    /// A relay pixel.
    Relay,
    /// Part of a communicator's component.
    Communicator,
}

/// Per-pixel display record.
///
/// `link` holds the component index per flood direction for component and
/// communicator pixels (both entries equal except on insulated wires, where
/// the axes are independent), or the relay pixel index twice for relays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisplayPixel {
    /// Pixel classification.
    pub kind: PixelKind,
    /// Direction-partitioned indices; `None` where the pixel does not
    /// participate in that direction's flood.
    pub link: [Option<u32>; 2],
}

impl DisplayPixel {
    /// The displayed logic level of this pixel under `state`.
    pub fn logic_level(&self, state: &DynamicData) -> bool {
        match self.kind {
            PixelKind::Component | PixelKind::Communicator => {
                let lit = |link: Option<u32>| {
                    link.is_some_and(|index| state.component_levels[index as usize])
                };
                lit(self.link[0]) || lit(self.link[1])
            }
            PixelKind::Relay => self.link[0]
                .is_some_and(|index| state.relay_levels[index as usize]),
            PixelKind::Empty => false,
        }
    }
}

/// Everything about a compiled circuit that does not change between steps.
#[derive(Clone)]
pub struct StaticData {
    /// All sources.
    pub sources: Box<[Source]>,
    /// All logic gates.
    pub gates: GateTable,
    /// All relays.
    pub relays: RelayTable,
    /// All communicator endpoints; screens first, then file inputs, then
    /// file outputs.
    pub communicators: Box<[CommEndpoint]>,
    /// First screen communicator index.
    pub screen_start: u32,
    /// One past the last screen communicator index.
    pub screen_end: u32,
    /// All components, windowing into `adj_relay_list`.
    pub components: Box<[Component]>,
    /// All relay pixels, one per relay element.
    pub relay_pixels: Box<[RelayPixel]>,
    /// Flattened component → adjacent-relay-pixel adjacency.
    pub adj_relay_list: Box<[u32]>,
    /// Per-canvas-pixel display records.
    pub pixels: Grid<DisplayPixel>,
}

impl StaticData {
    /// The empty circuit: what a simulator holds before its first compile.
    pub fn empty() -> Self {
        Self {
            sources: Box::default(),
            gates: GateTable::default(),
            relays: RelayTable::default(),
            communicators: Box::default(),
            screen_start: 0,
            screen_end: 0,
            components: Box::default(),
            relay_pixels: Box::default(),
            adj_relay_list: Box::default(),
            pixels: Grid::filled(0, 0, DisplayPixel::default()),
        }
    }
}

/// The per-step logic state, all-false at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicData {
    /// Logic level per component.
    pub component_levels: Box<[bool]>,
    /// Logic level per relay pixel.
    pub relay_levels: Box<[bool]>,
    /// Conductivity per relay pixel.
    pub relay_conductive: Box<[bool]>,
    /// Transmit state per communicator.
    pub transmit_states: Box<[bool]>,
}

impl DynamicData {
    /// All-false state sized for `data`'s arrays.
    pub fn sized_for(data: &StaticData) -> Self {
        Self {
            component_levels: vec![false; data.components.len()].into_boxed_slice(),
            relay_levels: vec![false; data.relay_pixels.len()].into_boxed_slice(),
            relay_conductive: vec![false; data.relay_pixels.len()].into_boxed_slice(),
            transmit_states: vec![false; data.communicators.len()].into_boxed_slice(),
        }
    }
}
