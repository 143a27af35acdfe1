//! The core element set: pass-through filters, fan-out/fan-in, and the
//! degenerate source/sink shapes. Concrete protocol and shunt elements
//! (`flow-shunt`, `flow-tls`) build on the same [`ElementObject`] trait.

use crate::element::{ElementCore, ElementId, ElementObject, Graph};
use crate::event::Event;
use crate::packet::Packet;
use crate::pad::PadRef;

/// One input, one output, data flows straight through `process_input`. The
/// building block for codecs and other 1:1 transforms; subclasses override
/// `transform` rather than `process_input`.
pub struct SimplexElement {
    core: ElementCore,
    transform: Box<dyn FnMut(Packet) -> smallvec::SmallVec<[Packet; 1]> + Send>,
}

impl std::fmt::Debug for SimplexElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimplexElement").field("name", &self.core.name).finish()
    }
}

impl SimplexElement {
    pub fn new(
        name: impl Into<String>,
        transform: impl FnMut(Packet) -> smallvec::SmallVec<[Packet; 1]> + Send + 'static,
    ) -> Self {
        let mut core = ElementCore::new(name);
        core.add_input();
        core.add_output();
        Self {
            core,
            transform: Box::new(transform),
        }
    }

    /// A transform that passes every packet through unchanged.
    pub fn identity(name: impl Into<String>) -> Self {
        Self::new(name, |p| smallvec::smallvec![p])
    }
}

impl ElementObject for SimplexElement {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            for out in (self.transform)(packet) {
                graph.push_output(PadRef::output(me, 0), out);
            }
        }
    }
}

/// Two independent simplex channels sharing one element identity, e.g. a TLS
/// record layer that has an upstream (plaintext) direction and a downstream
/// (ciphertext) direction. Input pad 0 / output pad 0 form the "forward"
/// channel; input pad 1 / output pad 1 form the "reverse" channel.
pub struct DuplexElement {
    core: ElementCore,
    forward: Box<dyn FnMut(Packet) -> smallvec::SmallVec<[Packet; 1]> + Send>,
    reverse: Box<dyn FnMut(Packet) -> smallvec::SmallVec<[Packet; 1]> + Send>,
}

impl std::fmt::Debug for DuplexElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexElement").field("name", &self.core.name).finish()
    }
}

impl DuplexElement {
    pub fn new(
        name: impl Into<String>,
        forward: impl FnMut(Packet) -> smallvec::SmallVec<[Packet; 1]> + Send + 'static,
        reverse: impl FnMut(Packet) -> smallvec::SmallVec<[Packet; 1]> + Send + 'static,
    ) -> Self {
        let mut core = ElementCore::new(name);
        core.add_input();
        core.add_input();
        core.add_output();
        core.add_output();
        Self {
            core,
            forward: Box::new(forward),
            reverse: Box::new(reverse),
        }
    }
}

impl ElementObject for DuplexElement {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        let (out_index, transform): (usize, &mut (dyn FnMut(Packet) -> smallvec::SmallVec<[Packet; 1]> + Send)) =
            if input_index == 0 {
                (0, self.forward.as_mut())
            } else {
                (1, self.reverse.as_mut())
            };
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            for out in transform(packet) {
                graph.push_output(PadRef::output(me, out_index), out);
            }
        }
    }
}

/// One input, N outputs. Every packet is duplicated to every output, the
/// original forwarded to output 0 rather than cloned a final time so a
/// destructive consumer sitting on the first output sees the real object
/// (clones have already gone out to every other output by then).
pub struct Splitter {
    core: ElementCore,
    /// Number of outputs currently blocked. The single input stays blocked
    /// until this drops back to zero — any one output backing up must stall
    /// the whole fan-out, since a clone already delivered to output A cannot
    /// be un-sent if output B is still full.
    blocked_outputs: usize,
}

impl std::fmt::Debug for Splitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Splitter").field("name", &self.core.name).finish()
    }
}

impl Splitter {
    pub fn new(name: impl Into<String>, n_outputs: usize) -> Self {
        let mut core = ElementCore::new(name);
        core.add_input();
        for _ in 0..n_outputs.max(1) {
            core.add_output();
        }
        Self { core, blocked_outputs: 0 }
    }
}

impl ElementObject for Splitter {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        let n_outputs = self.core.outputs.len();
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            for i in 1..n_outputs {
                graph.push_output(PadRef::output(me, i), packet.clone());
            }
            if n_outputs > 0 {
                graph.push_output(PadRef::output(me, 0), packet);
            }
        }
    }

    fn output_pad_blocked(&mut self, graph: &mut Graph, me: ElementId, _output_index: usize) {
        self.blocked_outputs += 1;
        if self.blocked_outputs == 1 {
            for i in 0..self.core.inputs.len() {
                graph.block_input(PadRef::input(me, i));
            }
        }
    }

    fn output_pad_unblocked(&mut self, graph: &mut Graph, me: ElementId, _output_index: usize) {
        self.blocked_outputs = self.blocked_outputs.saturating_sub(1);
        if self.blocked_outputs == 0 {
            for i in 0..self.core.inputs.len() {
                graph.unblock_input(PadRef::input(me, i));
            }
        }
    }
}

/// N inputs, one output. Inputs are serviced round-robin starting from the
/// one that just produced data, so no single upstream can starve its
/// siblings. Tracks which input indices are still connected so a peer that
/// disconnects mid-dispatch (inside this element's own `process_input`)
/// doesn't leave a stale slot behind.
#[derive(Debug)]
pub struct Joiner {
    core: ElementCore,
    next_input: usize,
}

impl Joiner {
    pub fn new(name: impl Into<String>, n_inputs: usize) -> Self {
        let mut core = ElementCore::new(name);
        for _ in 0..n_inputs.max(1) {
            core.add_input();
        }
        core.add_output();
        Self { core, next_input: 0 }
    }
}

impl ElementObject for Joiner {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            graph.push_output(PadRef::output(me, 0), packet);
        }
        self.next_input = (input_index + 1) % self.core.inputs.len().max(1);
    }
}

/// A pure sink: every input packet is handed to a user callback and
/// discarded. No outputs. Used both directly and as the base for
/// application-facing consumers (`flow`'s `UserAdapter`).
pub struct Collector {
    core: ElementCore,
    on_packet: Box<dyn FnMut(Packet) + Send>,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector").field("name", &self.core.name).finish()
    }
}

impl Collector {
    pub fn new(name: impl Into<String>, on_packet: impl FnMut(Packet) + Send + 'static) -> Self {
        let mut core = ElementCore::new(name);
        core.add_input();
        Self {
            core,
            on_packet: Box::new(on_packet),
        }
    }
}

impl ElementObject for Collector {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, _graph: &mut Graph, _me: ElementId, input_index: usize) {
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            (self.on_packet)(packet);
        }
    }
}

/// A pure source: no inputs, one output. Packets are pushed by calling
/// [`Emitter::emit`] directly (the application side holds the `ElementId`
/// and calls through the owning `Graph`), there is no `process_input` to
/// drive it.
#[derive(Debug)]
pub struct Emitter {
    core: ElementCore,
}

impl Emitter {
    pub fn new(name: impl Into<String>) -> Self {
        let mut core = ElementCore::new(name);
        core.add_output();
        Self { core }
    }

    pub fn emit(graph: &mut Graph, me: ElementId, packet: Packet) {
        graph.push_output(PadRef::output(me, 0), packet);
    }
}

impl ElementObject for Emitter {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, _graph: &mut Graph, _me: ElementId, _input_index: usize) {
        unreachable!("Emitter has no input pads")
    }
}

/// One input, N outputs, but each packet is routed to exactly one output
/// selected by the most recent `Event::MuxSelect` control packet seen on the
/// input, rather than broadcast to all of them as `Splitter` does. The
/// counterpart to [`Mux`]'s selector protocol on the receiving side.
#[derive(Debug)]
pub struct Demux {
    core: ElementCore,
    selected: usize,
}

impl Demux {
    pub fn new(name: impl Into<String>, n_outputs: usize) -> Self {
        let mut core = ElementCore::new(name);
        core.add_input();
        for _ in 0..n_outputs.max(1) {
            core.add_output();
        }
        Self { core, selected: 0 }
    }
}

impl ElementObject for Demux {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            if let Packet::Object(Event::MuxSelect(n)) = &packet {
                self.selected = (*n).min(self.core.outputs.len().saturating_sub(1));
                continue;
            }
            graph.push_output(PadRef::output(me, self.selected), packet);
        }
    }
}

/// N inputs, one output, tagging each forwarded packet's provenance isn't
/// tracked here (flow's mux only interleaves bytes, it does not frame them);
/// selection of which input is "live" is driven by the same
/// `Event::MuxSelect` control packet, sent to input 0's peer out of band.
#[derive(Debug)]
pub struct Mux {
    core: ElementCore,
    selected: usize,
}

impl Mux {
    pub fn new(name: impl Into<String>, n_inputs: usize) -> Self {
        let mut core = ElementCore::new(name);
        for _ in 0..n_inputs.max(1) {
            core.add_input();
        }
        core.add_output();
        Self { core, selected: 0 }
    }

}

impl ElementObject for Mux {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        // A `MuxSelect` control packet on any input switches which source is
        // live, regardless of where it arrives.
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().peek_first_object().cloned() {
            if let Event::MuxSelect(n) = packet {
                self.selected = n.min(self.core.inputs.len().saturating_sub(1));
                self.core.inputs[input_index].state.queue_mut().pop_first_object();
            } else {
                break;
            }
        }
        if input_index != self.selected {
            // Drop data from non-selected inputs so they don't back up
            // indefinitely, mirroring the C mux's behavior of only reading
            // from the active source.
            while self.core.inputs[input_index].state.queue_mut().pop_packet().is_some() {}
            return;
        }
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            graph.push_output(PadRef::output(me, 0), packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};

    #[test]
    fn splitter_fans_out_to_all_outputs() {
        let mut graph = Graph::new();
        let splitter = graph.insert(Box::new(Splitter::new("split", 2)));
        let hits: Arc<Mutex<Vec<(u8, Bytes)>>> = Arc::new(Mutex::new(Vec::new()));

        let h1 = hits.clone();
        let c1 = graph.insert(Box::new(Collector::new("c1", move |p| {
            if let Some(b) = p.into_buffer() {
                h1.lock().unwrap().push((1, b));
            }
        })));
        let h2 = hits.clone();
        let c2 = graph.insert(Box::new(Collector::new("c2", move |p| {
            if let Some(b) = p.into_buffer() {
                h2.lock().unwrap().push((2, b));
            }
        })));

        graph.connect(PadRef::output(splitter, 0), PadRef::input(c1, 0));
        graph.connect(PadRef::output(splitter, 1), PadRef::input(c2, 0));

        graph.push_input(PadRef::input(splitter, 0), Packet::buffer(Bytes::from_static(b"x")));

        let recorded = hits.lock().unwrap();
        assert_eq!(recorded.len(), 2);
    }

    #[test]
    fn demux_routes_by_mux_select() {
        let mut graph = Graph::new();
        let demux = graph.insert(Box::new(Demux::new("demux", 2)));
        let hits: Arc<Mutex<Vec<Bytes>>> = Arc::new(Mutex::new(Vec::new()));
        let h = hits.clone();
        let c0 = graph.insert(Box::new(Collector::new("c0", move |p| {
            if let Some(b) = p.into_buffer() {
                h.lock().unwrap().push(b);
            }
        })));
        let c1 = graph.insert(Box::new(Collector::new("c1", |_| {})));

        graph.connect(PadRef::output(demux, 0), PadRef::input(c0, 0));
        graph.connect(PadRef::output(demux, 1), PadRef::input(c1, 0));

        graph.push_input(PadRef::input(demux, 0), Packet::object(Event::MuxSelect(0)));
        graph.push_input(PadRef::input(demux, 0), Packet::buffer(Bytes::from_static(b"hello")));

        assert_eq!(hits.lock().unwrap().len(), 1);
    }
}
