//! The circuit compiler: canvas in, packed [`StaticData`] plus a
//! flood-filled initial [`DynamicData`] out.
//!
//! The passes run in a fixed order over row-major canvas scans, and every
//! tie-break follows first-encounter order, so compiling the same canvas
//! twice yields identical output:
//!
//! 1. classify each pixel;
//! 2. discover components with a direction-partitioned flood fill;
//! 3. collect sources and gates;
//! 4. collect relays (synthesizing a component between adjacent relays);
//! 5. group communicator pixels into regions and elect their endpoints;
//! 6. pack the adjacency lists;
//! 7. seed the initial state from the canvas and flood-fill it;
//! 8. (in the controller) snapshot the state back into the canvas.

use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use voltic_comm::{FileInputCommunicator, FileOutputCommunicator, ScreenCommunicator};
use voltic_core::{
    Canvas, CommunicatorHandle, CommunicatorKind, Element, GateKind, Grid, Point, RelayKind,
    ORTHOGONAL,
};

use crate::data::{
    CommEndpoint, Component, DisplayPixel, DynamicData, Gate, GateBuckets, GateTable, PixelKind,
    Relay, RelayBuckets, RelayPixel, RelayTable, Source, StaticData,
};
use crate::step::flood_fill;

/// Compile `canvas` into a packed circuit and its flood-filled initial
/// state.
///
/// The canvas is mutated in one way only: communicator elements get their
/// endpoint handles rebound to the elected objects. Display fields are
/// untouched here; the controller snapshots them afterwards.
pub fn compile(canvas: &mut Canvas) -> (StaticData, DynamicData) {
    let width = canvas.width();
    let height = canvas.height();

    let mut pixels: Grid<DisplayPixel> = Grid::filled(width, height, DisplayPixel::default());
    let mut visited: Grid<[bool; 2]> = Grid::filled(width, height, [false, false]);

    // Pass 1: pixel typing.
    for pt in canvas.points() {
        pixels[pt].kind = match &canvas[pt] {
            Element::Empty => PixelKind::Empty,
            Element::Relay(_) => PixelKind::Relay,
            Element::Communicator(_) => PixelKind::Communicator,
            _ => PixelKind::Component,
        };
    }

    // Pass 2: component discovery.
    let mut components = discover_components(canvas, &mut pixels, &mut visited);

    // Pass 3: sources and gates.
    let mut sources: Vec<Source> = Vec::new();
    let mut gates = GateTableBuilder::default();
    for pt in canvas.points() {
        match &canvas[pt] {
            Element::Source { .. } => {
                sources.push(Source {
                    output: component_at(&pixels, pt),
                });
            }
            Element::Gate(gate) => {
                let output = component_at(&pixels, pt);
                let inputs = signal_inputs(canvas, &pixels, pt);
                gates.push(gate.kind, &inputs, output);
            }
            _ => {}
        }
    }

    // Pass 4: relays.
    let mut relays = RelayTableBuilder::default();
    let mut relay_pixels: Vec<RelayPixel> = Vec::new();
    for pt in canvas.points() {
        // Marks this pixel as scanned by this pass; the adjacent-relay
        // check below keys off it so each pair synthesizes one component.
        visited[pt] = [true, true];
        let kind = match &canvas[pt] {
            Element::Relay(relay) => relay.kind,
            _ => continue,
        };

        let relay_index = relay_pixels.len() as u32;
        relay_pixels.push(RelayPixel {
            adj_components: [0; 4],
            adj_len: 0,
        });
        let mut inputs: SmallVec<[u32; 4]> = SmallVec::new();

        for (dx, dy) in ORTHOGONAL {
            let next = pt.offset(dx, dy);
            if !canvas.contains(next) {
                continue;
            }
            let axis = (dy != 0) as usize;
            if canvas[next].is_signal() {
                inputs.push(component_at(&pixels, next));
            } else if canvas[next].is_floodfillable() {
                let component = pixels[next].link[axis]
                    .expect("pixels beside a relay always keep their component");
                push_adjacent(&mut relay_pixels[relay_index as usize], component);
                components[component as usize].adj_relay_pixels.push(relay_index);
            } else if canvas[next].is_relay() && visited[next][0] {
                // Two adjacent relays: synthesize a component between them,
                // once per pair, created by the later-scanned relay.
                let other_relay = pixels[next].link[0]
                    .expect("a scanned relay pixel has its index recorded");
                let component = components.len() as u32;
                components.push(CompilerComponent {
                    adj_relay_pixels: vec![relay_index, other_relay],
                });
                push_adjacent(&mut relay_pixels[relay_index as usize], component);
                push_adjacent(&mut relay_pixels[other_relay as usize], component);
            }
        }

        relays.push(kind, &inputs, relay_index);
        pixels[pt].link = [Some(relay_index), Some(relay_index)];
    }

    // Pass 5: communicators.
    let (communicators, screen_start, screen_end) = elect_communicators(canvas, &pixels);

    // Pass 6: packing.
    let mut adj_relay_list: Vec<u32> = Vec::new();
    let packed_components: Box<[Component]> = components
        .iter()
        .map(|component| {
            let adj_begin = adj_relay_list.len() as u32;
            adj_relay_list.extend_from_slice(&component.adj_relay_pixels);
            Component {
                adj_begin,
                adj_end: adj_relay_list.len() as u32,
            }
        })
        .collect();

    let data = StaticData {
        sources: sources.into_boxed_slice(),
        gates: gates.finish(),
        relays: relays.finish(),
        communicators,
        screen_start,
        screen_end,
        components: packed_components,
        relay_pixels: relay_pixels.into_boxed_slice(),
        adj_relay_list: adj_relay_list.into_boxed_slice(),
        pixels,
    };

    // Pass 7: initial state seeded from the canvas, then flood-filled.
    let mut state = DynamicData::sized_for(&data);
    for pt in canvas.points() {
        match &canvas[pt] {
            Element::Source { .. } => {
                state.component_levels[component_at(&data.pixels, pt) as usize] = true;
            }
            Element::Gate(gate) if gate.logic_level => {
                state.component_levels[component_at(&data.pixels, pt) as usize] = true;
            }
            Element::Communicator(comm) if comm.transmit => {
                let link = comm.link.as_ref().expect("compile bound every communicator pixel");
                state.transmit_states[link.index() as usize] = true;
            }
            Element::Relay(relay) if relay.conductive => {
                let relay_pixel = data.pixels[pt].link[0]
                    .expect("relay pixels record their index");
                state.relay_conductive[relay_pixel as usize] = true;
            }
            _ => {}
        }
    }
    flood_fill(&data, &mut state);

    (data, state)
}

/// Per-component scratch: adjacency collected before packing.
struct CompilerComponent {
    adj_relay_pixels: Vec<u32>,
}

fn component_at(pixels: &Grid<DisplayPixel>, pt: Point) -> u32 {
    pixels[pt].link[0].expect("useful elements always belong to a component")
}

fn push_adjacent(relay_pixel: &mut RelayPixel, component: u32) {
    relay_pixel.adj_components[relay_pixel.adj_len as usize] = component;
    relay_pixel.adj_len += 1;
}

/// The signal neighbours of `pt`, as component indices in neighbour order.
fn signal_inputs(canvas: &Canvas, pixels: &Grid<DisplayPixel>, pt: Point) -> SmallVec<[u32; 4]> {
    let mut inputs = SmallVec::new();
    for (dx, dy) in ORTHOGONAL {
        let next = pt.offset(dx, dy);
        if canvas.contains(next) && canvas[next].is_signal() {
            inputs.push(component_at(pixels, next));
        }
    }
    inputs
}

/// Pass 2: direction-partitioned flood fill over floodfillable elements.
///
/// Each (pixel, axis) pair is visited once. The flood crosses axes on the
/// same pixel unless it is an insulated wire, and never crosses a
/// signal/receiver boundary, which is how gate and communicator inputs stay
/// directed. Components with no useful pixel and no relay neighbour are
/// dropped without an index.
fn discover_components(
    canvas: &Canvas,
    pixels: &mut Grid<DisplayPixel>,
    visited: &mut Grid<[bool; 2]>,
) -> Vec<CompilerComponent> {
    let mut components: Vec<CompilerComponent> = Vec::new();
    let mut stack: Vec<(Point, usize)> = Vec::new();
    let mut flooded: Vec<(Point, usize)> = Vec::new();

    for pt in canvas.points() {
        if !canvas[pt].is_floodfillable() {
            continue;
        }
        for axis in 0..2 {
            if visited[pt][axis] {
                continue;
            }

            let mut useful = false;
            flooded.clear();
            stack.push((pt, axis));
            while let Some((curr, curr_axis)) = stack.pop() {
                if visited[curr][curr_axis] {
                    continue;
                }
                visited[curr][curr_axis] = true;
                flooded.push((curr, curr_axis));

                if !useful && canvas[curr].is_useful() {
                    useful = true;
                }

                // Cross to the other axis unless insulation separates them.
                if !matches!(canvas[curr], Element::InsulatedWire { .. })
                    && !visited[curr][1 - curr_axis]
                {
                    stack.push((curr, 1 - curr_axis));
                }

                for delta in [-1, 1] {
                    let next = curr.step(curr_axis, delta);
                    if !canvas.contains(next) {
                        continue;
                    }
                    if !visited[next][curr_axis]
                        && canvas[next].is_floodfillable()
                        && !(canvas[next].is_signal_receiver() && canvas[curr].is_signal())
                        && !(canvas[next].is_signal() && canvas[curr].is_signal_receiver())
                    {
                        stack.push((next, curr_axis));
                    }
                    if !useful && canvas[next].is_relay() {
                        useful = true;
                    }
                }
            }

            if useful {
                let index = components.len() as u32;
                for &(flooded_pt, flooded_axis) in &flooded {
                    pixels[flooded_pt].link[flooded_axis] = Some(index);
                }
                components.push(CompilerComponent {
                    adj_relay_pixels: Vec::new(),
                });
            }
        }
    }
    components
}

/// Scratch endpoint record before packing.
struct CompilerCommunicator {
    inputs: Vec<u32>,
    output: u32,
    link: CommunicatorHandle,
}

/// Election candidate: an existing endpoint handle (or the shared "no
/// handle yet" candidate) with its per-region pixel counts.
struct Candidate {
    link: Option<CommunicatorHandle>,
    /// `(region, pixel_count)`, sorted by region — discovery order.
    votes: Vec<(u32, u32)>,
}

/// Pass 5: group communicator pixels of each kind into orthogonally
/// connected regions, elect one endpoint per region, and rebind the canvas
/// handles to the winners.
///
/// Every existing handle binds to the region holding most of its pixels
/// (ties to the first-encountered region); a region keeps its
/// earliest-encountered candidate unless strictly outvoted; regions left
/// without a winner get a freshly spawned endpoint. Unbound pixels vote
/// together as one fresh candidate, so a majority of new pixels can
/// displace a surviving handle.
fn elect_communicators(
    canvas: &mut Canvas,
    pixels: &Grid<DisplayPixel>,
) -> (Box<[CommEndpoint]>, u32, u32) {
    let mut regions: Grid<i32> = Grid::filled(canvas.width(), canvas.height(), -1);
    let mut endpoints: Vec<CompilerCommunicator> = Vec::new();
    let mut screen_start = 0;
    let mut screen_end = 0;
    let mut type_offset = 0u32;

    for kind in CommunicatorKind::ALL {
        if kind == CommunicatorKind::Screen {
            screen_start = type_offset;
        }

        // Region discovery: flood over pixels of exactly this kind.
        let mut region_count = 0u32;
        let mut candidates: IndexMap<Option<usize>, Candidate> = IndexMap::new();
        let mut stack: Vec<Point> = Vec::new();
        for pt in canvas.points() {
            match &canvas[pt] {
                Element::Communicator(el) if el.kind == kind => {}
                _ => continue,
            }
            if regions[pt] != -1 {
                continue;
            }
            let region = region_count;
            region_count += 1;
            stack.push(pt);
            while let Some(curr) = stack.pop() {
                if regions[curr] != -1 {
                    continue;
                }
                regions[curr] = region as i32;

                let link = match &canvas[curr] {
                    Element::Communicator(el) => el.link.clone(),
                    _ => unreachable!("region flood stays on communicator pixels"),
                };
                let key = link.as_ref().map(handle_identity);
                let candidate = candidates
                    .entry(key)
                    .or_insert_with(|| Candidate {
                        link,
                        votes: Vec::new(),
                    });
                match candidate.votes.binary_search_by_key(&region, |&(r, _)| r) {
                    Ok(found) => candidate.votes[found].1 += 1,
                    Err(insert_at) => candidate.votes.insert(insert_at, (region, 1)),
                }

                for (dx, dy) in ORTHOGONAL {
                    let next = curr.offset(dx, dy);
                    if !canvas.contains(next) || regions[next] != -1 {
                        continue;
                    }
                    if let Element::Communicator(el) = &canvas[next] {
                        if el.kind == kind {
                            stack.push(next);
                        }
                    }
                }
            }
        }

        // Election: each candidate claims its best region; regions keep
        // the strongest claimant.
        let mut leaders: Vec<Option<(Option<CommunicatorHandle>, u32)>> =
            vec![None; region_count as usize];
        for candidate in candidates.values() {
            let mut best: Option<(u32, u32)> = None;
            for &(region, count) in &candidate.votes {
                if best.is_none_or(|(_, best_count)| count > best_count) {
                    best = Some((region, count));
                }
            }
            let Some((region, count)) = best else { continue };
            let leader = &mut leaders[region as usize];
            let outvoted = match leader {
                None => true,
                Some((_, leader_count)) => count > *leader_count,
            };
            if outvoted {
                *leader = Some((candidate.link.clone(), count));
            }
        }

        // Spawn or reuse one endpoint per region, in region order.
        for region in 0..region_count {
            let link = match leaders[region as usize].take() {
                Some((Some(link), _)) => link,
                _ => spawn_endpoint(kind),
            };
            link.set_index(type_offset + region);
            link.refresh();
            endpoints.push(CompilerCommunicator {
                inputs: Vec::new(),
                output: 0,
                link,
            });
        }

        // Wire up outputs and inputs, rebinding canvas handles as we go.
        for pt in canvas.points() {
            match &canvas[pt] {
                Element::Communicator(el) if el.kind == kind => {}
                _ => continue,
            }
            let output = component_at(pixels, pt);
            let endpoint_index = (type_offset + regions[pt] as u32) as usize;
            endpoints[endpoint_index].output = output;

            let elected = Arc::clone(&endpoints[endpoint_index].link);
            if let Element::Communicator(el) = &mut canvas[pt] {
                let stale = match &el.link {
                    Some(current) => !Arc::ptr_eq(current, &elected),
                    None => true,
                };
                if stale {
                    el.link = Some(elected);
                }
            }

            for (dx, dy) in ORTHOGONAL {
                let next = pt.offset(dx, dy);
                if canvas.contains(next) && canvas[next].is_signal() {
                    endpoints[endpoint_index].inputs.push(component_at(pixels, next));
                }
            }
        }

        type_offset += region_count;
        if kind == CommunicatorKind::Screen {
            screen_end = type_offset;
        }
    }

    // Input components gather one entry per adjacent pixel; collapse them.
    for endpoint in &mut endpoints {
        endpoint.inputs.sort_unstable();
        endpoint.inputs.dedup();
    }

    let packed = endpoints
        .into_iter()
        .map(|endpoint| CommEndpoint {
            inputs: endpoint.inputs.into_boxed_slice(),
            output: endpoint.output,
            link: endpoint.link,
        })
        .collect();
    (packed, screen_start, screen_end)
}

/// Pointer identity of a shared endpoint, the election's candidate key.
fn handle_identity(handle: &CommunicatorHandle) -> usize {
    Arc::as_ptr(handle).cast::<()>() as usize
}

fn spawn_endpoint(kind: CommunicatorKind) -> CommunicatorHandle {
    match kind {
        CommunicatorKind::Screen => Arc::new(ScreenCommunicator::new()),
        CommunicatorKind::FileInput => Arc::new(FileInputCommunicator::new()),
        CommunicatorKind::FileOutput => Arc::new(FileOutputCommunicator::new()),
    }
}

/// Per-fan-in accumulation for one gate kind.
#[derive(Default)]
struct GateBucketsBuilder {
    fan0: Vec<Gate<0>>,
    fan1: Vec<Gate<1>>,
    fan2: Vec<Gate<2>>,
    fan3: Vec<Gate<3>>,
    fan4: Vec<Gate<4>>,
}

impl GateBucketsBuilder {
    fn push(&mut self, inputs: &[u32], output: u32) {
        match *inputs {
            [] => self.fan0.push(Gate { inputs: [], output }),
            [a] => self.fan1.push(Gate {
                inputs: [a],
                output,
            }),
            [a, b] => self.fan2.push(Gate {
                inputs: [a, b],
                output,
            }),
            [a, b, c] => self.fan3.push(Gate {
                inputs: [a, b, c],
                output,
            }),
            [a, b, c, d] => self.fan4.push(Gate {
                inputs: [a, b, c, d],
                output,
            }),
            _ => unreachable!("a pixel has at most four signal neighbours"),
        }
    }

    fn finish(self) -> GateBuckets {
        GateBuckets {
            fan0: self.fan0.into_boxed_slice(),
            fan1: self.fan1.into_boxed_slice(),
            fan2: self.fan2.into_boxed_slice(),
            fan3: self.fan3.into_boxed_slice(),
            fan4: self.fan4.into_boxed_slice(),
        }
    }
}

#[derive(Default)]
struct GateTableBuilder {
    and: GateBucketsBuilder,
    or: GateBucketsBuilder,
    nand: GateBucketsBuilder,
    nor: GateBucketsBuilder,
}

impl GateTableBuilder {
    fn push(&mut self, kind: GateKind, inputs: &[u32], output: u32) {
        match kind {
            GateKind::And => self.and.push(inputs, output),
            GateKind::Or => self.or.push(inputs, output),
            GateKind::Nand => self.nand.push(inputs, output),
            GateKind::Nor => self.nor.push(inputs, output),
        }
    }

    fn finish(self) -> GateTable {
        GateTable {
            and: self.and.finish(),
            or: self.or.finish(),
            nand: self.nand.finish(),
            nor: self.nor.finish(),
        }
    }
}

/// Per-fan-in accumulation for one relay polarity.
#[derive(Default)]
struct RelayBucketsBuilder {
    fan0: Vec<Relay<0>>,
    fan1: Vec<Relay<1>>,
    fan2: Vec<Relay<2>>,
    fan3: Vec<Relay<3>>,
    fan4: Vec<Relay<4>>,
}

impl RelayBucketsBuilder {
    fn push(&mut self, inputs: &[u32], output_relay_pixel: u32) {
        match *inputs {
            [] => self.fan0.push(Relay {
                inputs: [],
                output_relay_pixel,
            }),
            [a] => self.fan1.push(Relay {
                inputs: [a],
                output_relay_pixel,
            }),
            [a, b] => self.fan2.push(Relay {
                inputs: [a, b],
                output_relay_pixel,
            }),
            [a, b, c] => self.fan3.push(Relay {
                inputs: [a, b, c],
                output_relay_pixel,
            }),
            [a, b, c, d] => self.fan4.push(Relay {
                inputs: [a, b, c, d],
                output_relay_pixel,
            }),
            _ => unreachable!("a pixel has at most four signal neighbours"),
        }
    }

    fn finish(self) -> RelayBuckets {
        RelayBuckets {
            fan0: self.fan0.into_boxed_slice(),
            fan1: self.fan1.into_boxed_slice(),
            fan2: self.fan2.into_boxed_slice(),
            fan3: self.fan3.into_boxed_slice(),
            fan4: self.fan4.into_boxed_slice(),
        }
    }
}

#[derive(Default)]
struct RelayTableBuilder {
    positive: RelayBucketsBuilder,
    negative: RelayBucketsBuilder,
}

impl RelayTableBuilder {
    fn push(&mut self, kind: RelayKind, inputs: &[u32], output_relay_pixel: u32) {
        match kind {
            RelayKind::Positive => self.positive.push(inputs, output_relay_pixel),
            RelayKind::Negative => self.negative.push(inputs, output_relay_pixel),
        }
    }

    fn finish(self) -> RelayTable {
        RelayTable {
            positive: self.positive.finish(),
            negative: self.negative.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas_from_rows(rows: &[&[Element]]) -> Canvas {
        let height = rows.len() as i32;
        let width = rows.first().map_or(0, |row| row.len()) as i32;
        let mut canvas = Canvas::filled(width, height, Element::Empty);
        for (y, row) in rows.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                canvas[Point::new(x as i32, y as i32)] = cell.clone();
            }
        }
        canvas
    }

    #[test]
    fn source_wire_signal_forms_one_lit_component() {
        let mut canvas = canvas_from_rows(&[&[
            Element::source(),
            Element::conductive_wire(),
            Element::signal(),
        ]]);
        let (data, state) = compile(&mut canvas);

        assert_eq!(data.components.len(), 1);
        assert_eq!(data.sources.len(), 1);
        assert_eq!(data.sources[0].output, 0);
        assert!(state.component_levels[0], "source lights its component");
        for pt in [Point::new(0, 0), Point::new(1, 0), Point::new(2, 0)] {
            assert_eq!(data.pixels[pt].link, [Some(0), Some(0)]);
        }
    }

    #[test]
    fn bare_wire_component_is_discarded() {
        let mut canvas = canvas_from_rows(&[&[
            Element::conductive_wire(),
            Element::conductive_wire(),
        ]]);
        let (data, _) = compile(&mut canvas);
        assert_eq!(data.components.len(), 0);
        assert_eq!(data.pixels[Point::new(0, 0)].link, [None, None]);
    }

    #[test]
    fn insulated_wire_keeps_axes_apart() {
        // Vertical run crossing a horizontal run over an insulated wire.
        let mut canvas = canvas_from_rows(&[
            &[Element::Empty, Element::signal(), Element::Empty],
            &[
                Element::signal(),
                Element::insulated_wire(),
                Element::signal(),
            ],
            &[Element::Empty, Element::signal(), Element::Empty],
        ]);
        let (data, _) = compile(&mut canvas);
        assert_eq!(data.components.len(), 2);
        let cross = data.pixels[Point::new(1, 1)].link;
        assert_ne!(cross[0], cross[1], "axes stay independent");
        assert!(cross[0].is_some() && cross[1].is_some());
    }

    #[test]
    fn conductive_wire_joins_axes() {
        let mut canvas = canvas_from_rows(&[
            &[Element::Empty, Element::signal(), Element::Empty],
            &[
                Element::signal(),
                Element::conductive_wire(),
                Element::signal(),
            ],
            &[Element::Empty, Element::signal(), Element::Empty],
        ]);
        let (data, _) = compile(&mut canvas);
        assert_eq!(data.components.len(), 1);
    }

    #[test]
    fn gate_collects_signal_inputs_and_keeps_own_component() {
        // Signals above and left of the gate; wire to the right reads the
        // gate's output component.
        let mut canvas = canvas_from_rows(&[
            &[Element::Empty, Element::signal(), Element::Empty],
            &[
                Element::signal(),
                Element::gate(GateKind::And),
                Element::conductive_wire(),
            ],
        ]);
        let (data, _) = compile(&mut canvas);

        // Two input components plus the gate's own.
        assert_eq!(data.components.len(), 3);
        assert_eq!(data.gates.and.fan2.len(), 1);
        let gate = &data.gates.and.fan2[0];
        let gate_comp = data.pixels[Point::new(1, 1)].link[0].unwrap();
        assert_eq!(gate.output, gate_comp);
        assert!(!gate.inputs.contains(&gate_comp));
        let wire_comp = data.pixels[Point::new(2, 1)].link[0].unwrap();
        assert_eq!(wire_comp, gate_comp, "output wire joins the gate component");
    }

    #[test]
    fn relay_records_adjacency_both_ways() {
        let mut canvas = canvas_from_rows(&[&[
            Element::source(),
            Element::relay(RelayKind::Positive),
            Element::signal(),
        ]]);
        let (data, _) = compile(&mut canvas);

        assert_eq!(data.relay_pixels.len(), 1);
        // Right neighbour is a signal: relay input, not adjacency.
        assert_eq!(data.relays.positive.fan1.len(), 1);
        let relay_pixel = &data.relay_pixels[0];
        assert_eq!(relay_pixel.adj_len, 1, "only the source side is adjacent");
        let source_comp = data.pixels[Point::new(0, 0)].link[0].unwrap();
        assert_eq!(relay_pixel.adj_components[0], source_comp);
        let component = &data.components[source_comp as usize];
        let adjacent =
            &data.adj_relay_list[component.adj_begin as usize..component.adj_end as usize];
        assert_eq!(adjacent, [0]);
    }

    #[test]
    fn adjacent_relays_synthesize_one_component() {
        let mut canvas = canvas_from_rows(&[&[
            Element::relay(RelayKind::Positive),
            Element::relay(RelayKind::Positive),
        ]]);
        let (data, _) = compile(&mut canvas);

        assert_eq!(data.relay_pixels.len(), 2);
        assert_eq!(data.components.len(), 1, "one synthesized bridge component");
        let bridge = &data.components[0];
        let adjacent = &data.adj_relay_list[bridge.adj_begin as usize..bridge.adj_end as usize];
        assert_eq!(adjacent.len(), 2);
        assert!(adjacent.contains(&0) && adjacent.contains(&1));
        for relay_pixel in data.relay_pixels.iter() {
            assert_eq!(relay_pixel.adj_len, 1);
            assert_eq!(relay_pixel.adj_components[0], 0);
        }
    }

    #[test]
    fn communicator_pixels_share_one_endpoint() {
        let mut canvas = canvas_from_rows(&[&[
            Element::communicator(CommunicatorKind::Screen),
            Element::communicator(CommunicatorKind::Screen),
            Element::conductive_wire(),
            Element::signal(),
        ]]);
        let (data, _) = compile(&mut canvas);

        assert_eq!(data.communicators.len(), 1);
        assert_eq!(data.screen_start, 0);
        assert_eq!(data.screen_end, 1);
        let first = match &canvas[Point::new(0, 0)] {
            Element::Communicator(el) => el.link.clone().unwrap(),
            _ => unreachable!(),
        };
        let second = match &canvas[Point::new(1, 0)] {
            Element::Communicator(el) => el.link.clone().unwrap(),
            _ => unreachable!(),
        };
        assert!(Arc::ptr_eq(&first, &second), "pixels share the elected endpoint");
        assert_eq!(first.index(), 0);
    }

    #[test]
    fn recompile_reuses_surviving_endpoint() {
        let mut canvas = canvas_from_rows(&[&[
            Element::communicator(CommunicatorKind::Screen),
            Element::conductive_wire(),
        ]]);
        compile(&mut canvas);
        let before = match &canvas[Point::new(0, 0)] {
            Element::Communicator(el) => el.link.clone().unwrap(),
            _ => unreachable!(),
        };
        compile(&mut canvas);
        let after = match &canvas[Point::new(0, 0)] {
            Element::Communicator(el) => el.link.clone().unwrap(),
            _ => unreachable!(),
        };
        assert!(Arc::ptr_eq(&before, &after), "the endpoint survives recompiles");
    }

    #[test]
    fn communicator_inputs_sorted_and_deduped() {
        // Two signals (one shared component) feeding two pixels of the same
        // communicator region: without deduping, the shared component would
        // be recorded once per adjacent pixel.
        let mut canvas = canvas_from_rows(&[
            &[
                Element::communicator(CommunicatorKind::Screen),
                Element::communicator(CommunicatorKind::Screen),
            ],
            &[Element::signal(), Element::signal()],
        ]);
        let (data, _) = compile(&mut canvas);
        assert_eq!(data.communicators.len(), 1);
        let inputs = &data.communicators[0].inputs;
        assert!(!inputs.is_empty());
        assert!(
            inputs.windows(2).all(|pair| pair[0] < pair[1]),
            "inputs strictly ascending: {inputs:?}"
        );
    }

    #[test]
    fn index_layout_orders_kinds() {
        let mut canvas = canvas_from_rows(&[&[
            Element::communicator(CommunicatorKind::FileOutput),
            Element::Empty,
            Element::communicator(CommunicatorKind::Screen),
            Element::Empty,
            Element::communicator(CommunicatorKind::FileInput),
        ]]);
        let (data, _) = compile(&mut canvas);
        assert_eq!(data.communicators.len(), 3);
        assert_eq!(data.screen_start, 0);
        assert_eq!(data.screen_end, 1);
        // Screen first, then file input, then file output.
        assert!(data.communicators[0]
            .link
            .as_any()
            .downcast_ref::<ScreenCommunicator>()
            .is_some());
        assert!(data.communicators[1]
            .link
            .as_any()
            .downcast_ref::<FileInputCommunicator>()
            .is_some());
        assert!(data.communicators[2]
            .link
            .as_any()
            .downcast_ref::<FileOutputCommunicator>()
            .is_some());
    }

    #[test]
    fn gate_starting_level_seeds_initial_state() {
        let mut canvas = canvas_from_rows(&[&[
            Element::Gate(voltic_core::GateElement {
                kind: GateKind::Nor,
                logic_level: true,
            }),
            Element::conductive_wire(),
        ]]);
        let (data, state) = compile(&mut canvas);
        let comp = data.pixels[Point::new(0, 0)].link[0].unwrap();
        assert!(state.component_levels[comp as usize]);
    }

    #[test]
    fn persisted_relay_state_conducts_at_compile() {
        let mut canvas = canvas_from_rows(&[&[
            Element::source(),
            Element::Relay(voltic_core::RelayElement {
                kind: RelayKind::Positive,
                logic_level: false,
                conductive: true,
            }),
            Element::conductive_wire(),
            Element::signal(),
        ]]);
        let (data, state) = compile(&mut canvas);
        let downstream = data.pixels[Point::new(3, 0)].link[0].unwrap();
        assert!(
            state.component_levels[downstream as usize],
            "compile flood crosses a persisted-conductive relay"
        );
        assert!(state.relay_levels[0]);
    }

    #[test]
    fn compile_is_deterministic() {
        let mut canvas = canvas_from_rows(&[
            &[
                Element::source(),
                Element::conductive_wire(),
                Element::signal(),
                Element::gate(GateKind::Nand),
            ],
            &[
                Element::relay(RelayKind::Negative),
                Element::insulated_wire(),
                Element::signal(),
                Element::conductive_wire(),
            ],
            &[
                Element::communicator(CommunicatorKind::Screen),
                Element::communicator(CommunicatorKind::Screen),
                Element::signal(),
                Element::Empty,
            ],
        ]);
        let mut twin = canvas.clone();
        let (a, state_a) = compile(&mut canvas);
        let (b, state_b) = compile(&mut twin);

        assert_eq!(a.sources, b.sources);
        assert_eq!(a.gates, b.gates);
        assert_eq!(a.relays, b.relays);
        assert_eq!(a.components, b.components);
        assert_eq!(a.relay_pixels, b.relay_pixels);
        assert_eq!(a.adj_relay_list, b.adj_relay_list);
        assert_eq!(a.pixels, b.pixels);
        assert_eq!(a.screen_start, b.screen_start);
        assert_eq!(a.screen_end, b.screen_end);
        assert_eq!(a.communicators.len(), b.communicators.len());
        for (left, right) in a.communicators.iter().zip(b.communicators.iter()) {
            assert_eq!(left.inputs, right.inputs);
            assert_eq!(left.output, right.output);
        }
        assert_eq!(state_a, state_b);
    }

    #[test]
    fn all_indices_in_range() {
        let mut canvas = canvas_from_rows(&[
            &[
                Element::source(),
                Element::signal(),
                Element::gate(GateKind::Or),
                Element::conductive_wire(),
            ],
            &[
                Element::relay(RelayKind::Positive),
                Element::relay(RelayKind::Negative),
                Element::signal(),
                Element::communicator(CommunicatorKind::Screen),
            ],
        ]);
        let (data, _) = compile(&mut canvas);

        let comp_count = data.components.len() as u32;
        let relay_count = data.relay_pixels.len() as u32;
        for source in data.sources.iter() {
            assert!(source.output < comp_count);
        }
        assert_eq!(data.gates.or.fan2.len(), 1);
        for gate in data.gates.or.fan2.iter() {
            assert!(gate.output < comp_count);
            assert!(gate.inputs.iter().all(|&c| c < comp_count));
        }
        for relay_pixel in data.relay_pixels.iter() {
            for &comp in &relay_pixel.adj_components[..relay_pixel.adj_len as usize] {
                assert!(comp < comp_count);
            }
        }
        for &relay in data.adj_relay_list.iter() {
            assert!(relay < relay_count);
        }
        for comm in data.communicators.iter() {
            assert!(comm.output < comp_count);
            assert!(comm.inputs.iter().all(|&c| c < comp_count));
        }
    }
}
