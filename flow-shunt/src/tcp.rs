//! TCP client shunt: a connected socket turned into a duplex element,
//! driven by the shared watcher thread rather than a thread of its own.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::event::{DetailedEvent, Event, IpServiceDescriptor, TcpConnectOp};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use mio::{Interest, Token};
use parking_lot::Mutex;
use tracing::trace;

use crate::errno_map::map_io_error;
use crate::options::ShuntOptions;
use crate::runtime::{ReadinessSink, Runtime};
use crate::shunt::{ShuntMsg, StreamBracket};

struct Inner {
    stream: Mutex<mio::net::TcpStream>,
    msg_tx: flume::Sender<ShuntMsg>,
    write_buf: Mutex<VecDeque<u8>>,
    options: ShuntOptions,
}

impl ReadinessSink for Inner {
    fn on_readable(&self) {
        let mut stream = self.stream.lock();
        let mut buf = vec![0u8; self.options.read_chunk_size];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    let _ = self.msg_tx.send(ShuntMsg::detailed(DetailedEvent::stream_end()));
                    break;
                }
                Ok(n) => {
                    let _ = self.msg_tx.send(ShuntMsg::Data(Bytes::copy_from_slice(&buf[..n])));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = self.msg_tx.send(ShuntMsg::detailed(map_io_error("tcp read", &e)));
                    break;
                }
            }
        }
    }

    fn on_writable(&self) {
        let mut stream = self.stream.lock();
        let mut pending = self.write_buf.lock();
        while !pending.is_empty() {
            let chunk: Vec<u8> = pending.iter().copied().collect();
            match stream.write(&chunk) {
                Ok(0) => break,
                Ok(n) => {
                    pending.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let _ = self.msg_tx.send(ShuntMsg::detailed(map_io_error("tcp write", &e)));
                    break;
                }
            }
        }
    }

    fn on_closed(&self) {
        let _ = self.msg_tx.send(ShuntMsg::Closed);
    }
}

pub struct TcpShunt {
    core: ElementCore,
    bracket: StreamBracket,
    rx: flume::Receiver<ShuntMsg>,
    inner: Arc<Inner>,
    token: Token,
}

impl std::fmt::Debug for TcpShunt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpShunt").field("name", &self.core.name).finish()
    }
}

impl TcpShunt {
    /// Performs a blocking connect (only steady-state I/O needs to be
    /// non-blocking) and wires the resulting socket into the runtime.
    pub fn connect(name: impl Into<String>, op: &TcpConnectOp, options: ShuntOptions) -> crate::error::Result<Self> {
        let remote: SocketAddr = SocketAddr::new(op.remote.address, op.remote.port);
        let std_stream = std::net::TcpStream::connect(remote).map_err(|source| crate::error::ShuntError::Connect {
            addr: remote,
            source,
        })?;
        std_stream.set_nonblocking(true).map_err(crate::error::ShuntError::Registration)?;
        Ok(Self::from_std(name, std_stream, options))
    }

    pub fn from_std(name: impl Into<String>, std_stream: std::net::TcpStream, options: ShuntOptions) -> Self {
        let mio_stream = mio::net::TcpStream::from_std(std_stream);
        let (msg_tx, msg_rx) = flume::unbounded();
        let inner = Arc::new(Inner {
            stream: Mutex::new(mio_stream),
            msg_tx,
            write_buf: Mutex::new(VecDeque::new()),
            options,
        });

        let runtime = Runtime::global();
        let token = {
            let mut guard = inner.stream.lock();
            runtime
                .register(&mut *guard, Interest::READABLE | Interest::WRITABLE, inner.clone())
                .expect("failed to register tcp shunt with flow-shunt runtime")
        };

        let mut core = ElementCore::new(name);
        core.add_input();
        core.add_output();

        Self {
            core,
            bracket: StreamBracket::default(),
            rx: msg_rx,
            inner,
            token,
        }
    }

    /// Seeds this shunt's own output queue with `stream.begin`,
    /// `stream.segment_begin`, and an `IpService` packet describing `peer`,
    /// and marks the bracket already open. A socket accepted by
    /// [`crate::tcp_listener::TcpListenerShunt`] is already known to be open
    /// and its peer already known, before this shunt's own watcher-driven
    /// `pump` ever runs, so the listener side emits these eagerly instead of
    /// waiting on the first read.
    pub fn mark_accepted(&mut self, peer: SocketAddr) {
        self.bracket.mark_open();
        let queue = self.core.outputs[0].state.queue_mut();
        queue.push(Packet::object(Event::detailed(DetailedEvent::stream_begin())));
        queue.push(Packet::object(Event::detailed(DetailedEvent::stream_segment_begin())));
        queue.push(Packet::object(Event::IpService(Arc::new(IpServiceDescriptor {
            address: peer.ip(),
            port: peer.port(),
        }))));
    }
}

impl ElementObject for TcpShunt {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            let Packet::Buffer(data) = packet else { continue };
            let mut stream = self.inner.stream.lock();
            let mut pending = self.inner.write_buf.lock();
            if pending.is_empty() {
                match stream.write(&data) {
                    Ok(n) if n == data.len() => continue,
                    Ok(n) => pending.extend(data[n..].iter().copied()),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => pending.extend(data.iter().copied()),
                    Err(e) => {
                        drop(stream);
                        drop(pending);
                        graph.push_output(
                            PadRef::output(me, 0),
                            Packet::object(flow_core::event::Event::detailed(map_io_error("tcp write", &e))),
                        );
                        continue;
                    }
                }
            } else {
                pending.extend(data.iter().copied());
            }
            if !pending.is_empty() {
                graph.block_output(PadRef::output(me, 0));
            }
        }
    }

    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        while let Ok(msg) = self.rx.try_recv() {
            // A TCP stream has no internal segment boundaries of its own, so
            // the whole connection is one segment: segment_begin rides right
            // alongside stream.begin on the first worker message of any
            // kind, and segment_end rides alongside stream.end on close.
            if let Some(begin) = self.bracket.begin() {
                graph.push_output(PadRef::output(me, 0), begin);
                graph.push_output(
                    PadRef::output(me, 0),
                    Packet::object(Event::detailed(DetailedEvent::stream_segment_begin())),
                );
            }
            let is_closed = matches!(msg, ShuntMsg::Closed);
            if let Some(packet) = msg.into_packet() {
                graph.push_output(PadRef::output(me, 0), packet);
            }
            if is_closed {
                graph.push_output(
                    PadRef::output(me, 0),
                    Packet::object(Event::detailed(DetailedEvent::stream_segment_end())),
                );
                if let Some(end) = self.bracket.end() {
                    graph.push_output(PadRef::output(me, 0), end);
                }
            }
        }
    }
}

impl Drop for TcpShunt {
    fn drop(&mut self) {
        let mut stream = self.inner.stream.lock();
        if Runtime::global().deregister(&mut *stream, self.token).is_err() {
            trace!("tcp shunt token already deregistered");
        }
    }
}

