//! UDP shunt: datagram socket as a duplex element. Each inbound datagram is
//! tagged with its sender, wrapped as an `Event::IpService` control packet
//! immediately ahead of the data packet, so a downstream element can
//! demultiplex by source without a side channel.

use std::io::{self};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::event::{DetailedEvent, Event, IpServiceDescriptor, UdpConnectOp};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use mio::{Interest, Token};
use parking_lot::Mutex;

use crate::errno_map::map_io_error;
use crate::options::ShuntOptions;
use crate::runtime::{ReadinessSink, Runtime};
use crate::shunt::ShuntMsg;

struct Inner {
    socket: Mutex<mio::net::UdpSocket>,
    msg_tx: flume::Sender<ShuntMsg>,
    options: ShuntOptions,
    fixed_remote: Option<SocketAddr>,
    /// Source address of the last inbound datagram. An `IpService` packet
    /// is only emitted when this changes, so two datagrams in a row from
    /// the same source produce one `IpService` followed by two buffers
    /// rather than an `IpService` per datagram.
    last_source: Mutex<Option<SocketAddr>>,
}

impl ReadinessSink for Inner {
    fn on_readable(&self) {
        let socket = self.socket.lock();
        let mut buf = vec![0u8; self.options.max_datagram_size];
        loop {
            match socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    let source_changed = {
                        let mut last = self.last_source.lock();
                        let changed = *last != Some(from);
                        *last = Some(from);
                        changed
                    };
                    if source_changed {
                        let _ = self.msg_tx.send(ShuntMsg::Control(Event::IpService(Arc::new(IpServiceDescriptor {
                            address: from.ip(),
                            port: from.port(),
                        }))));
                    }
                    let _ = self.msg_tx.send(ShuntMsg::Data(Bytes::copy_from_slice(&buf[..n])));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = self.msg_tx.send(ShuntMsg::detailed(map_io_error("udp recv", &e)));
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

pub struct UdpShunt {
    core: ElementCore,
    rx: flume::Receiver<ShuntMsg>,
    inner: Arc<Inner>,
    token: Token,
    pending_remote: Option<SocketAddr>,
}

impl std::fmt::Debug for UdpShunt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpShunt").field("name", &self.core.name).finish()
    }
}

impl UdpShunt {
    pub fn bind(name: impl Into<String>, op: &UdpConnectOp, options: ShuntOptions) -> crate::error::Result<Self> {
        let local = op
            .local
            .as_ref()
            .map(|d| SocketAddr::new(d.address, d.port))
            .unwrap_or_else(|| SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 0));
        let std_socket = std::net::UdpSocket::bind(local).map_err(|source| crate::error::ShuntError::Bind {
            addr: local,
            source,
        })?;
        std_socket.set_nonblocking(true).map_err(crate::error::ShuntError::Registration)?;
        let remote = SocketAddr::new(op.remote.address, op.remote.port);

        let mio_socket = mio::net::UdpSocket::from_std(std_socket);
        let (msg_tx, msg_rx) = flume::unbounded();
        let inner = Arc::new(Inner {
            socket: Mutex::new(mio_socket),
            msg_tx,
            options,
            fixed_remote: Some(remote),
            last_source: Mutex::new(None),
        });
        let token = {
            let mut guard = inner.socket.lock();
            Runtime::global()
                .register(&mut *guard, Interest::READABLE, inner.clone())
                .map_err(crate::error::ShuntError::Registration)?
        };

        let mut core = ElementCore::new(name);
        core.add_input();
        core.add_output();

        Ok(Self {
            core,
            rx: msg_rx,
            inner,
            token,
            pending_remote: Some(remote),
        })
    }
}

impl ElementObject for UdpShunt {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            match packet {
                Packet::Object(Event::IpService(svc)) => {
                    self.pending_remote = Some(SocketAddr::new(svc.address, svc.port));
                }
                Packet::Buffer(data) => {
                    if data.len() > self.inner.options.max_datagram_size {
                        graph.push_output(
                            PadRef::output(me, 0),
                            Packet::object(Event::detailed(DetailedEvent::new(
                                format!(
                                    "outbound datagram of {} bytes exceeds max_datagram_size {}",
                                    data.len(),
                                    self.inner.options.max_datagram_size
                                ),
                                [(flow_core::event::codes::SOCKET, flow_core::event::codes::SOCKET_OVERSIZED_PACKET)],
                            ))),
                        );
                        continue;
                    }
                    let Some(remote) = self.pending_remote.or(self.inner.fixed_remote) else { continue };
                    let socket = self.inner.socket.lock();
                    if let Err(e) = socket.send_to(&data, remote) {
                        if e.kind() != io::ErrorKind::WouldBlock {
                            graph.push_output(
                                PadRef::output(me, 0),
                                Packet::object(Event::detailed(map_io_error("udp send", &e))),
                            );
                        }
                    }
                }
                Packet::Object(_) => {}
            }
        }
    }

    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        while let Ok(msg) = self.rx.try_recv() {
            if let Some(packet) = msg.into_packet() {
                graph.push_output(PadRef::output(me, 0), packet);
            }
        }
    }
}

impl Drop for UdpShunt {
    fn drop(&mut self) {
        let mut guard = self.inner.socket.lock();
        let _ = Runtime::global().deregister(&mut *guard, self.token);
    }
}
