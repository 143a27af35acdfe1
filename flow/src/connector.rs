//! `Connector`: a one-input/one-output element that owns a shunt and
//! participates in the graph like any other element, converting the
//! stream-edge events the shunt reports into a small connectivity state
//! machine.
//!
//! The inner shunt is kept in a private single-element [`Graph`] of its
//! own rather than the caller's graph: its output pad has no peer, so
//! `Graph::push_output` already queues everything it produces exactly the
//! way a detached pad would, and `Connector::process_input`/`pump` just
//! drain that queue on every call, inspecting events in flight to update
//! `state` before re-emitting each packet, unchanged, on its own output.

use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::event::{codes, Event};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use tracing::debug;

/// A `Connector` hands out a cheap `flume::Receiver` rather than taking a
/// boxed callback, so a caller can select over it alongside other work.
pub type ConnectivityMonitor = flume::Receiver<ConnectivityEvent>;
type ConnectivitySender = flume::Sender<ConnectivityEvent>;

#[must_use]
pub fn connectivity_monitor() -> (ConnectivitySender, ConnectivityMonitor) {
    flume::unbounded()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityEvent {
    pub previous: ConnectivityState,
    pub current: ConnectivityState,
}

pub struct Connector {
    core: ElementCore,
    inner_graph: Graph,
    inner_id: ElementId,
    state: ConnectivityState,
    last_state: ConnectivityState,
    monitor_tx: ConnectivitySender,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("name", &self.core.name)
            .field("state", &self.state)
            .finish()
    }
}

impl Connector {
    /// Wraps `inner` (expected to have exactly one input and one output
    /// pad, as every `flow_shunt` client/file/UDP shunt does) as a
    /// `Connector`. Returns the connector and the receiving half of its
    /// connectivity monitor.
    pub fn new(name: impl Into<String>, inner: Box<dyn ElementObject>) -> (Self, ConnectivityMonitor) {
        let mut core = ElementCore::new(name);
        core.add_input();
        core.add_output();
        let mut inner_graph = Graph::new();
        let inner_id = inner_graph.insert(inner);
        let (monitor_tx, monitor_rx) = connectivity_monitor();
        (
            Self {
                core,
                inner_graph,
                inner_id,
                state: ConnectivityState::Connecting,
                last_state: ConnectivityState::Connecting,
                monitor_tx,
            },
            monitor_rx,
        )
    }

    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    #[must_use]
    pub fn last_state(&self) -> ConnectivityState {
        self.last_state
    }

    fn transition(&mut self, next: ConnectivityState) {
        if next == self.state {
            return;
        }
        self.last_state = self.state;
        self.state = next;
        debug!(from = ?self.last_state, to = ?self.state, "connector state changed");
        let _ = self.monitor_tx.send(ConnectivityEvent {
            previous: self.last_state,
            current: self.state,
        });
    }

    fn observe(&mut self, packet: &Packet) {
        let Some(Event::Detailed(detailed)) = packet.as_object() else { return };
        if detailed.matches(codes::STREAM, codes::STREAM_BEGIN) {
            self.transition(ConnectivityState::Connected);
        } else if detailed.matches(codes::STREAM, codes::STREAM_DENIED) {
            self.transition(ConnectivityState::Disconnected);
        } else if detailed.matches(codes::STREAM, codes::STREAM_END) {
            self.transition(ConnectivityState::Disconnected);
        }
    }

    fn drain_inner_output(&mut self, graph: &mut Graph, me: ElementId) {
        let Some(inner) = self.inner_graph.get_mut(self.inner_id) else { return };
        let Some(output) = inner.core_mut().outputs.get_mut(0) else { return };
        while let Some(packet) = output.state.queue.as_mut().and_then(|q| q.pop_packet()) {
            self.observe(&packet);
            graph.push_output(PadRef::output(me, 0), packet);
        }
        if let Some(inner) = self.inner_graph.get_mut(self.inner_id) {
            if let Some(output) = inner.core_mut().outputs.get_mut(0) {
                output.state.drop_queue_if_empty();
            }
        }
    }
}

impl ElementObject for Connector {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        debug_assert_eq!(input_index, 0);
        while let Some(packet) = self.core.inputs[0].state.queue_mut().pop_packet() {
            if matches!(
                packet.as_object(),
                Some(Event::Detailed(d)) if d.matches(codes::STREAM, codes::STREAM_END)
                    || d.matches(codes::STREAM, codes::STREAM_DENIED)
            ) {
                self.transition(ConnectivityState::Disconnecting);
            }
            self.inner_graph.push_input(PadRef::input(self.inner_id, 0), packet);
        }
        self.drain_inner_output(graph, me);
    }

    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        self.inner_graph.pump(self.inner_id);
        self.drain_inner_output(graph, me);
    }
}
