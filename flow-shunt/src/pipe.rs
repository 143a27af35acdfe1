//! Pipe shunt: one end of a pipe (or any other pollable file descriptor
//! that isn't a regular file — an fd inherited from a subprocess, for
//! instance) as a one-directional element, driven by the watcher thread
//! via `mio::unix::SourceFd`.

#![cfg(unix)]

use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use bytes::Bytes;
use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::event::DetailedEvent;
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use mio::unix::SourceFd;
use mio::{Interest, Token};
use parking_lot::Mutex;

use crate::errno_map::map_io_error;
use crate::options::ShuntOptions;
use crate::runtime::{ReadinessSink, Runtime};
use crate::shunt::{ShuntMsg, StreamBracket};

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    Read,
    Write,
}

struct Inner {
    fd: OwnedFd,
    direction: PipeDirection,
    msg_tx: flume::Sender<ShuntMsg>,
    options: ShuntOptions,
}

impl ReadinessSink for Inner {
    fn on_readable(&self) {
        if self.direction != PipeDirection::Read {
            return;
        }
        let mut buf = vec![0u8; self.options.read_chunk_size];
        loop {
            let n = unsafe { libc::read(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
            match n {
                0 => {
                    let _ = self.msg_tx.send(ShuntMsg::detailed(DetailedEvent::stream_end()));
                    break;
                }
                n if n > 0 => {
                    let _ = self.msg_tx.send(ShuntMsg::Data(Bytes::copy_from_slice(&buf[..n as usize])));
                }
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() == io::ErrorKind::WouldBlock {
                        break;
                    }
                    if err.kind() == io::ErrorKind::Interrupted {
                        continue;
                    }
                    let _ = self.msg_tx.send(ShuntMsg::detailed(map_io_error("pipe read", &err)));
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

/// One end of a pipe: `PipeDirection::Read` exposes an output pad only,
/// `PipeDirection::Write` exposes an input pad only — a pipe end is never
/// bidirectional.
pub struct PipeShunt {
    core: ElementCore,
    bracket: StreamBracket,
    rx: flume::Receiver<ShuntMsg>,
    inner: Arc<Inner>,
    token: Token,
    direction: PipeDirection,
}

impl std::fmt::Debug for PipeShunt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeShunt").field("name", &self.core.name).finish()
    }
}

impl PipeShunt {
    pub fn new(name: impl Into<String>, fd: OwnedFd, direction: PipeDirection, options: ShuntOptions) -> crate::error::Result<Self> {
        set_nonblocking(fd.as_raw_fd())?;
        let (msg_tx, msg_rx) = flume::unbounded();
        let inner = Arc::new(Inner {
            fd,
            direction,
            msg_tx,
            options,
        });

        let interest = match direction {
            PipeDirection::Read => Interest::READABLE,
            PipeDirection::Write => Interest::WRITABLE,
        };
        let raw = inner.fd.as_raw_fd();
        let mut source = SourceFd(&raw);
        let token = Runtime::global()
            .register(&mut source, interest, inner.clone())
            .map_err(crate::error::ShuntError::Registration)?;

        let mut core = ElementCore::new(name);
        match direction {
            PipeDirection::Read => {
                core.add_output();
            }
            PipeDirection::Write => {
                core.add_input();
            }
        }

        Ok(Self {
            core,
            bracket: StreamBracket::default(),
            rx: msg_rx,
            inner,
            token,
            direction,
        })
    }
}

fn set_nonblocking(fd: RawFd) -> crate::error::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(crate::error::ShuntError::Registration(io::Error::last_os_error()));
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(crate::error::ShuntError::Registration(io::Error::last_os_error()));
    }
    Ok(())
}

impl ElementObject for PipeShunt {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        if self.direction != PipeDirection::Write {
            return;
        }
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            let Packet::Buffer(data) = packet else { continue };
            let fd = self.inner.fd.as_raw_fd();
            let n = unsafe { libc::write(fd, data.as_ptr().cast(), data.len()) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::WouldBlock {
                    graph.push_output(
                        PadRef::output(me, 0),
                        Packet::object(flow_core::event::Event::detailed(map_io_error("pipe write", &err))),
                    );
                }
            }
        }
    }

    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        if self.direction != PipeDirection::Read {
            return;
        }
        while let Ok(msg) = self.rx.try_recv() {
            if matches!(msg, ShuntMsg::Data(_)) {
                if let Some(begin) = self.bracket.begin() {
                    graph.push_output(PadRef::output(me, 0), begin);
                }
            }
            if let Some(packet) = msg.into_packet() {
                graph.push_output(PadRef::output(me, 0), packet);
            }
        }
    }
}

impl Drop for PipeShunt {
    fn drop(&mut self) {
        let raw = self.inner.fd.as_raw_fd();
        let mut source = SourceFd(&raw);
        let _ = Runtime::global().deregister(&mut source, self.token);
    }
}
