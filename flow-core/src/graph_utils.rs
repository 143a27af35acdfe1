//! Convenience wiring helpers layered on top of [`Graph::connect`]: connect
//! two simplex elements in series, connect two duplex elements back to
//! back, splice a new element into an existing edge, and swap one element
//! for another without disturbing its neighbors.

use crate::element::{ElementId, Graph};
use crate::pad::PadRef;

/// Connects `upstream`'s sole output to `downstream`'s sole input. Both
/// elements are expected to have exactly one pad of the relevant direction
/// (true of [`crate::elements::SimplexElement`], [`crate::elements::Collector`]
/// as a downstream, and [`crate::elements::Emitter`] as an upstream).
pub fn connect_simplex_simplex(graph: &mut Graph, upstream: ElementId, downstream: ElementId) {
    graph.connect(PadRef::output(upstream, 0), PadRef::input(downstream, 0));
}

/// Connects two duplex elements back to back: `a`'s forward output feeds
/// `b`'s forward input, and `b`'s reverse output feeds `a`'s reverse input.
/// This is how a protocol element (e.g. TLS) is spliced between an
/// application-facing duplex and a transport-facing duplex.
pub fn connect_duplex_duplex(graph: &mut Graph, a: ElementId, b: ElementId) {
    graph.connect(PadRef::output(a, 0), PadRef::input(b, 0));
    graph.connect(PadRef::output(b, 1), PadRef::input(a, 1));
}

/// Splices `middle` (a one-in-one-out element) into the edge currently
/// running from `upstream`'s output pad `up_out` to whatever it is
/// connected to, so traffic now flows `upstream -> middle -> downstream`.
pub fn insert_simplex(graph: &mut Graph, upstream: ElementId, up_out: usize, middle: ElementId) {
    let output = PadRef::output(upstream, up_out);
    let existing_peer = graph
        .get(upstream)
        .and_then(|e| e.core().outputs.get(up_out))
        .and_then(|o| o.state.peer);

    graph.disconnect(output);
    graph.connect(output, PadRef::input(middle, 0));
    if let Some(peer) = existing_peer {
        graph.connect(PadRef::output(middle, 0), peer);
    }
}

/// Replaces `old` with `new` in the graph: every pad `old` was connected on
/// is rewired to the same-indexed pad on `new`, then `old` is destroyed.
/// Pad counts and directions of `old` and `new` must line up one for one;
/// mismatched pads are simply left unconnected.
pub fn replace_element(graph: &mut Graph, old: ElementId, new: ElementId) {
    let (old_inputs, old_outputs) = match graph.get(old) {
        Some(e) => (e.core().inputs.len(), e.core().outputs.len()),
        None => return,
    };

    for i in 0..old_outputs {
        let output = PadRef::output(old, i);
        if let Some(peer) = graph.get(old).and_then(|e| e.core().outputs.get(i)).and_then(|o| o.state.peer) {
            graph.disconnect(output);
            if i < graph.get(new).map(|e| e.core().outputs.len()).unwrap_or(0) {
                graph.connect(PadRef::output(new, i), peer);
            }
        }
    }
    for i in 0..old_inputs {
        if let Some(peer) = graph.get(old).and_then(|e| e.core().inputs.get(i)).and_then(|p| p.state.peer) {
            graph.disconnect(peer);
            if i < graph.get(new).map(|e| e.core().inputs.len()).unwrap_or(0) {
                graph.connect(peer, PadRef::input(new, i));
            }
        }
    }
    graph.destroy(old);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Collector, Emitter, SimplexElement};
    use crate::packet::Packet;
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};

    #[test]
    fn insert_simplex_splices_in_a_middle_stage() {
        let mut graph = Graph::new();
        let source = graph.insert(Box::new(Emitter::new("src")));
        let received = Arc::new(Mutex::new(Vec::new()));
        let r = received.clone();
        let sink = graph.insert(Box::new(Collector::new("sink", move |p| {
            if let Some(b) = p.into_buffer() {
                r.lock().unwrap().push(b);
            }
        })));
        connect_simplex_simplex(&mut graph, source, sink);

        let upper = graph.insert(Box::new(SimplexElement::new("upper", |p| {
            let out = p.into_buffer().map(|b| {
                Packet::buffer(Bytes::from(String::from_utf8_lossy(&b).to_uppercase().into_bytes()))
            });
            out.into_iter().collect()
        })));
        insert_simplex(&mut graph, source, 0, upper);

        Emitter::emit(&mut graph, source, Packet::buffer(Bytes::from_static(b"hi")));

        assert_eq!(received.lock().unwrap().as_slice(), [Bytes::from_static(b"HI")]);
    }
}
