//! The step engine: one tick of circuit evaluation plus the flood fill.
//!
//! Evaluation order within a step is fixed: sources, then gates, then
//! relays, then draining queued UI events, then communicators, then the
//! flood fill. Gates and communicators OR into their output component so
//! multiple drivers combine monotonically; everything reads the previous
//! step's levels and writes the next step's.

use crossbeam_channel::Receiver;

use voltic_comm::ScreenCommunicator;
use voltic_core::{GateKind, RelayKind, ScreenEvent};

use crate::data::{DynamicData, Gate, GateBuckets, Relay, RelayBuckets, StaticData};

/// Compute `new` from `old` under `data`.
///
/// Called from the stepping thread while running, or from the controller's
/// thread for a synchronous single step; it is the only place communicator
/// `transmit`/`receive` are invoked.
pub(crate) fn advance(
    data: &StaticData,
    old: &DynamicData,
    new: &mut DynamicData,
    events: &Receiver<ScreenEvent>,
) {
    for source in data.sources.iter() {
        new.component_levels[source.output as usize] = true;
    }

    eval_gate_kind(&data.gates.and, GateKind::And, old, new);
    eval_gate_kind(&data.gates.or, GateKind::Or, old, new);
    eval_gate_kind(&data.gates.nand, GateKind::Nand, old, new);
    eval_gate_kind(&data.gates.nor, GateKind::Nor, old, new);

    eval_relay_kind(&data.relays.positive, RelayKind::Positive, old, new);
    eval_relay_kind(&data.relays.negative, RelayKind::Negative, old, new);

    drain_screen_events(data, events);

    for (index, comm) in data.communicators.iter().enumerate() {
        let transmit = comm
            .inputs
            .iter()
            .any(|&component| old.component_levels[component as usize]);
        new.transmit_states[index] = transmit;
        comm.link.transmit(transmit);
        let output = &mut new.component_levels[comm.output as usize];
        *output = *output || comm.link.receive();
    }

    flood_fill(data, new);
}

/// Dispatch queued UI events to their screen communicators.
///
/// Events aimed outside the compiled screen range are stale (the circuit
/// was recompiled since they were queued) and are dropped.
fn drain_screen_events(data: &StaticData, events: &Receiver<ScreenEvent>) {
    while let Ok(event) = events.try_recv() {
        if event.communicator_index < data.screen_start
            || event.communicator_index >= data.screen_end
        {
            continue;
        }
        let link = &data.communicators[event.communicator_index as usize].link;
        if let Some(screen) = link.as_any().downcast_ref::<ScreenCommunicator>() {
            screen.insert_event(event.turn_on);
        }
    }
}

fn eval_gate_kind(buckets: &GateBuckets, kind: GateKind, old: &DynamicData, new: &mut DynamicData) {
    eval_gate_bucket(&buckets.fan0, kind, old, new);
    eval_gate_bucket(&buckets.fan1, kind, old, new);
    eval_gate_bucket(&buckets.fan2, kind, old, new);
    eval_gate_bucket(&buckets.fan3, kind, old, new);
    eval_gate_bucket(&buckets.fan4, kind, old, new);
}

fn eval_gate_bucket<const N: usize>(
    gates: &[Gate<N>],
    kind: GateKind,
    old: &DynamicData,
    new: &mut DynamicData,
) {
    for gate in gates {
        let value = kind.eval(
            gate.inputs
                .iter()
                .map(|&component| old.component_levels[component as usize]),
        );
        let output = &mut new.component_levels[gate.output as usize];
        *output = *output || value;
    }
}

fn eval_relay_kind(
    buckets: &RelayBuckets,
    kind: RelayKind,
    old: &DynamicData,
    new: &mut DynamicData,
) {
    eval_relay_bucket(&buckets.fan0, kind, old, new);
    eval_relay_bucket(&buckets.fan1, kind, old, new);
    eval_relay_bucket(&buckets.fan2, kind, old, new);
    eval_relay_bucket(&buckets.fan3, kind, old, new);
    eval_relay_bucket(&buckets.fan4, kind, old, new);
}

fn eval_relay_bucket<const N: usize>(
    relays: &[Relay<N>],
    kind: RelayKind,
    old: &DynamicData,
    new: &mut DynamicData,
) {
    for relay in relays {
        let closes = kind.closes(
            relay
                .inputs
                .iter()
                .map(|&component| old.component_levels[component as usize]),
        );
        if closes {
            new.relay_conductive[relay.output_relay_pixel as usize] = true;
        }
    }
}

/// Propagate logic levels through currently-conductive relay pixels.
///
/// Every already-high component is re-seeded through the stack so that on
/// termination a component is high iff it is reachable from a seed over
/// conductive relay pixels; relay pixel levels follow the same rule. The
/// propagation is monotone and idempotent.
pub(crate) fn flood_fill(data: &StaticData, state: &mut DynamicData) {
    // (is_relay, index) work items.
    let mut stack: Vec<(bool, u32)> = Vec::new();
    for index in 0..data.components.len() {
        if state.component_levels[index] {
            stack.push((false, index as u32));
            // Re-asserted when the item is processed.
            state.component_levels[index] = false;
        }
    }
    while let Some((is_relay, index)) = stack.pop() {
        let index = index as usize;
        if !is_relay {
            if state.component_levels[index] {
                continue;
            }
            state.component_levels[index] = true;
            let component = &data.components[index];
            let adjacent =
                &data.adj_relay_list[component.adj_begin as usize..component.adj_end as usize];
            for &relay_index in adjacent {
                if state.relay_conductive[relay_index as usize]
                    && !state.relay_levels[relay_index as usize]
                {
                    stack.push((true, relay_index));
                }
            }
        } else {
            if state.relay_levels[index] {
                continue;
            }
            state.relay_levels[index] = true;
            let relay_pixel = &data.relay_pixels[index];
            for &component in &relay_pixel.adj_components[..relay_pixel.adj_len as usize] {
                if !state.component_levels[component as usize] {
                    stack.push((false, component));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Component, RelayPixel};

    /// Two components bridged by one relay pixel.
    fn bridge_circuit() -> StaticData {
        StaticData {
            components: vec![
                Component {
                    adj_begin: 0,
                    adj_end: 1,
                },
                Component {
                    adj_begin: 1,
                    adj_end: 2,
                },
            ]
            .into_boxed_slice(),
            relay_pixels: vec![RelayPixel {
                adj_components: [0, 1, 0, 0],
                adj_len: 2,
            }]
            .into_boxed_slice(),
            adj_relay_list: vec![0, 0].into_boxed_slice(),
            ..StaticData::empty()
        }
    }

    #[test]
    fn fill_stops_at_open_relay() {
        let data = bridge_circuit();
        let mut state = DynamicData::sized_for(&data);
        state.component_levels[0] = true;
        flood_fill(&data, &mut state);
        assert!(state.component_levels[0]);
        assert!(!state.component_levels[1]);
        assert!(!state.relay_levels[0]);
    }

    #[test]
    fn fill_crosses_conductive_relay() {
        let data = bridge_circuit();
        let mut state = DynamicData::sized_for(&data);
        state.component_levels[0] = true;
        state.relay_conductive[0] = true;
        flood_fill(&data, &mut state);
        assert!(state.component_levels[0]);
        assert!(state.component_levels[1]);
        assert!(state.relay_levels[0]);
    }

    #[test]
    fn fill_is_idempotent() {
        let data = bridge_circuit();
        let mut state = DynamicData::sized_for(&data);
        state.component_levels[0] = true;
        state.relay_conductive[0] = true;
        flood_fill(&data, &mut state);
        let once = state.clone();
        flood_fill(&data, &mut state);
        assert_eq!(state, once);
    }

    #[test]
    fn dark_circuit_stays_dark() {
        let data = bridge_circuit();
        let mut state = DynamicData::sized_for(&data);
        state.relay_conductive[0] = true;
        flood_fill(&data, &mut state);
        assert!(!state.component_levels[0]);
        assert!(!state.component_levels[1]);
        assert!(!state.relay_levels[0]);
    }
}
