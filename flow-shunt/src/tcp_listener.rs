//! TCP listener shunt: accepts connections and reports each one as an
//! `Event::Anonymous` control packet carrying the accepted socket, so the
//! pipeline side decides when (and whether) to turn it into a `TcpShunt`
//! instead of the shunt layer doing that unasked.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::event::{AnonymousEvent, Event};
use flow_core::pad::PadRef;
use mio::{Interest, Token};
use parking_lot::Mutex;

use crate::errno_map::map_io_error;
use crate::runtime::{ReadinessSink, Runtime};
use crate::shunt::ShuntMsg;

struct Inner {
    listener: Mutex<mio::net::TcpListener>,
    msg_tx: flume::Sender<ShuntMsg>,
}

impl ReadinessSink for Inner {
    fn on_readable(&self) {
        let listener = self.listener.lock();
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    let event = Event::Anonymous(Arc::new(AnonymousEvent::new(
                        format!("accepted connection from {peer}"),
                        Box::new(AcceptedSocket { stream, peer }),
                    )));
                    let _ = self.msg_tx.send(ShuntMsg::Control(event));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = self.msg_tx.send(ShuntMsg::detailed(map_io_error("tcp accept", &e)));
                    break;
                }
            }
        }
    }
    fn on_writable(&self) {}
    fn on_closed(&self) {
        let _ = self.msg_tx.send(ShuntMsg::Closed);
    }
}

/// Payload of the `Event::Anonymous` delivered per accepted connection.
/// Downcast it with [`AnonymousEvent::downcast`] to recover the raw
/// standard-library socket and build a [`crate::tcp::TcpShunt`] from it.
pub struct AcceptedSocket {
    pub stream: std::net::TcpStream,
    pub peer: SocketAddr,
}

/// Source-only element (no input pads, a single output carrying
/// [`AcceptedSocket`] events). Listener shunts never carry stream data of
/// their own.
pub struct TcpListenerShunt {
    core: ElementCore,
    rx: flume::Receiver<ShuntMsg>,
    inner: Arc<Inner>,
    token: Token,
}

impl std::fmt::Debug for TcpListenerShunt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpListenerShunt").field("name", &self.core.name).finish()
    }
}

impl TcpListenerShunt {
    pub fn bind(name: impl Into<String>, addr: SocketAddr) -> crate::error::Result<Self> {
        let std_listener = std::net::TcpListener::bind(addr).map_err(|source| crate::error::ShuntError::Bind {
            addr,
            source,
        })?;
        std_listener
            .set_nonblocking(true)
            .map_err(crate::error::ShuntError::Registration)?;
        let mio_listener = mio::net::TcpListener::from_std(std_listener);
        let (msg_tx, msg_rx) = flume::unbounded();
        let inner = Arc::new(Inner {
            listener: Mutex::new(mio_listener),
            msg_tx,
        });
        let token = {
            let mut guard = inner.listener.lock();
            Runtime::global()
                .register(&mut *guard, Interest::READABLE, inner.clone())
                .map_err(crate::error::ShuntError::Registration)?
        };

        let mut core = ElementCore::new(name);
        core.add_output();

        Ok(Self {
            core,
            rx: msg_rx,
            inner,
            token,
        })
    }
}

impl ElementObject for TcpListenerShunt {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }
    fn process_input(&mut self, _graph: &mut Graph, _me: ElementId, _input_index: usize) {
        unreachable!("TcpListenerShunt has no input pads")
    }
    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        while let Ok(msg) = self.rx.try_recv() {
            if let Some(packet) = msg.into_packet() {
                graph.push_output(PadRef::output(me, 0), packet);
            }
        }
    }
}

impl Drop for TcpListenerShunt {
    fn drop(&mut self) {
        let mut guard = self.inner.listener.lock();
        let _ = Runtime::global().deregister(&mut *guard, self.token);
    }
}
