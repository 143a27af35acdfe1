//! `UserAdapter`: the graph-facing element that hands packets to and takes
//! packets from plain application code. Both directions cross
//! the graph/application boundary over a `flume` channel — the same
//! hand-off idiom [`crate::connector::Connector`] and
//! [`crate::tcp_listener_connector::TcpListenerConnector`] use for their own
//! externally-visible events — rather than exposing the element itself for
//! direct mutation once it is living inside a [`Graph`].
//!
//! The application drives the from-user direction by sending on the
//! returned [`FromUserSender`] and then calling [`Graph::pump`] for this
//! element's id, which runs [`UserAdapter::push`] to drain the channel onto
//! the output pad (stopping early if the pad is blocked, same as any other
//! `push_output` caller).

use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;

pub type ToUserMonitor = flume::Receiver<Packet>;
pub type FromUserSender = flume::Sender<Packet>;

pub struct UserAdapter {
    core: ElementCore,
    to_user_tx: flume::Sender<Packet>,
    from_user_rx: flume::Receiver<Packet>,
    on_to_user_nonempty: Option<Box<dyn FnMut() + Send>>,
}

impl std::fmt::Debug for UserAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAdapter").field("name", &self.core.name).finish()
    }
}

impl UserAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>) -> (Self, ToUserMonitor, FromUserSender) {
        let mut core = ElementCore::new(name);
        core.add_input();
        core.add_output();
        let (to_user_tx, to_user_rx) = flume::unbounded();
        let (from_user_tx, from_user_rx) = flume::unbounded();
        (
            Self {
                core,
                to_user_tx,
                from_user_rx,
                on_to_user_nonempty: None,
            },
            to_user_rx,
            from_user_tx,
        )
    }

    /// Installs the callback fired once when the to-user channel transitions
    /// from empty to non-empty. It is not re-armed until the application
    /// drains every queued packet and a fresh one arrives.
    pub fn on_to_user_nonempty(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_to_user_nonempty = Some(Box::new(callback));
    }

    /// Drains the from-user channel onto the output pad, stopping as soon as
    /// the pad backs up (`push_output` queues the rest there instead, and
    /// the channel holds anything not yet received).
    fn push(&mut self, graph: &mut Graph, me: ElementId) {
        while let Ok(packet) = self.from_user_rx.try_recv() {
            graph.push_output(PadRef::output(me, 0), packet);
        }
    }
}

impl ElementObject for UserAdapter {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn process_input(&mut self, _graph: &mut Graph, _me: ElementId, input_index: usize) {
        let was_empty = self.to_user_tx.is_empty();
        let mut sent_any = false;
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            if self.to_user_tx.send(packet).is_err() {
                break;
            }
            sent_any = true;
        }
        if was_empty && sent_any {
            if let Some(cb) = self.on_to_user_nonempty.as_mut() {
                cb();
            }
        }
    }

    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        self.push(graph, me);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use flow_core::element::Graph;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn notifies_once_per_empty_to_nonempty_transition() {
        let notifications = Arc::new(AtomicUsize::new(0));
        let n = notifications.clone();
        let (mut adapter, to_user, _from_user) = UserAdapter::new("adapter");
        adapter.on_to_user_nonempty(move || {
            n.fetch_add(1, Ordering::SeqCst);
        });

        let mut graph = Graph::new();
        let id = graph.insert(Box::new(adapter));

        graph.push_input(PadRef::input(id, 0), Packet::buffer(Bytes::from_static(b"a")));
        graph.push_input(PadRef::input(id, 0), Packet::buffer(Bytes::from_static(b"b")));
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
        assert_eq!(to_user.len(), 2);
    }

    #[test]
    fn pump_drains_from_user_channel_to_output() {
        let (adapter, _to_user, from_user) = UserAdapter::new("adapter");

        let mut graph = Graph::new();
        let adapter_id = graph.insert(Box::new(adapter));

        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let r = received.clone();
        let sink = graph.insert(Box::new(flow_core::elements::Collector::new("sink", move |p| {
            if let Some(b) = p.into_buffer() {
                r.lock().unwrap().push(b);
            }
        })));
        graph.connect(PadRef::output(adapter_id, 0), PadRef::input(sink, 0));

        from_user.send(Packet::buffer(Bytes::from_static(b"hi"))).unwrap();
        graph.pump(adapter_id);

        assert_eq!(received.lock().unwrap().as_slice(), [Bytes::from_static(b"hi")]);
    }
}
