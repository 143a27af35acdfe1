//! TCP listener connector: binds a [`flow_shunt::tcp_listener::TcpListenerShunt`]
//! and converts each accepted connection into a `new-connection` signal
//! carrying a ready-made [`Connector`] wrapping the accepted socket as a
//! plain `TcpShunt`.

use std::net::SocketAddr;

use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::event::Event;
use flow_shunt::error::Result as ShuntResult;
use flow_shunt::options::ShuntOptions;
use flow_shunt::tcp::TcpShunt;
use flow_shunt::tcp_listener::{AcceptedSocket, TcpListenerShunt};

use crate::connector::{Connector, ConnectivityMonitor};

/// One accepted connection, already wrapped as a `Connector` ready to be
/// inserted into the caller's graph.
pub struct NewConnection {
    pub peer: SocketAddr,
    pub connector: Connector,
    pub monitor: ConnectivityMonitor,
}

pub type NewConnectionMonitor = flume::Receiver<NewConnection>;

pub struct TcpListenerConnector {
    core: ElementCore,
    inner_graph: Graph,
    inner_id: ElementId,
    options: ShuntOptions,
    new_conn_tx: flume::Sender<NewConnection>,
}

impl std::fmt::Debug for TcpListenerConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpListenerConnector").field("name", &self.core.name).finish()
    }
}

impl TcpListenerConnector {
    pub fn bind(
        name: impl Into<String>,
        addr: SocketAddr,
        options: ShuntOptions,
    ) -> ShuntResult<(Self, NewConnectionMonitor)> {
        let name = name.into();
        let shunt = TcpListenerShunt::bind(&name, addr)?;
        let mut inner_graph = Graph::new();
        let inner_id = inner_graph.insert(Box::new(shunt));
        let (new_conn_tx, new_conn_rx) = flume::unbounded();

        // No pads of its own: every accepted connection leaves through the
        // new-connection channel, not a graph pad.
        let core = ElementCore::new(name);

        Ok((
            Self {
                core,
                inner_graph,
                inner_id,
                options,
                new_conn_tx,
            },
            new_conn_rx,
        ))
    }

    fn drain_accepts(&mut self) {
        let Some(inner) = self.inner_graph.get_mut(self.inner_id) else { return };
        let Some(output) = inner.core_mut().outputs.get_mut(0) else { return };
        while let Some(packet) = output.state.queue.as_mut().and_then(|q| q.pop_packet()) {
            let Some(Event::Anonymous(event)) = packet.into_object() else { continue };
            let Ok(accepted) = event.downcast::<AcceptedSocket>() else { continue };
            let AcceptedSocket { stream, peer } = *accepted;
            if let Err(e) = stream.set_nonblocking(true) {
                tracing::warn!(error = %e, "failed to mark accepted socket non-blocking");
                continue;
            }
            let mut shunt = TcpShunt::from_std(format!("{}-accepted-{peer}", self.core.name), stream, self.options);
            shunt.mark_accepted(peer);
            let (connector, monitor) = Connector::new(format!("{}-accepted-{peer}", self.core.name), Box::new(shunt));
            let _ = self.new_conn_tx.send(NewConnection { peer, connector, monitor });
        }
        if let Some(inner) = self.inner_graph.get_mut(self.inner_id) {
            if let Some(output) = inner.core_mut().outputs.get_mut(0) {
                output.state.drop_queue_if_empty();
            }
        }
    }
}

impl ElementObject for TcpListenerConnector {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, _graph: &mut Graph, _me: ElementId, _input_index: usize) {
        unreachable!("TcpListenerConnector has no input pads")
    }
    fn pump(&mut self, _graph: &mut Graph, _me: ElementId) {
        self.inner_graph.pump(self.inner_id);
        self.drain_accepts();
    }
}
