//! File shunt: turns a regular file into a duplex element. Files can't be
//! driven by readiness polling on most platforms, so each `FileShunt` gets
//! its own dedicated worker thread performing blocking `read`/`write`/`seek`
//! calls.
//!
//! A `Position` (seek) request that arrives while a segment read is still
//! in flight cancels that segment — the worker stops at its next chunk
//! boundary — and the shunt reports a fresh `Position` event before the
//! seek itself is carried out, rather than letting the stale segment run
//! to completion first.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::event::{DetailedEvent, Event, FileAccessMode, FileConnectOp, Position, SeekAnchor, SegmentRequest};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use tracing::warn;

use crate::errno_map::map_io_error;
use crate::options::ShuntOptions;
use crate::shunt::{ShuntMsg, StreamBracket};

enum FileCmd {
    Read(SegmentRequest),
    Write(Bytes),
    Seek(Position),
}

pub struct FileShunt {
    core: ElementCore,
    bracket: StreamBracket,
    rx: flume::Receiver<ShuntMsg>,
    cmd_tx: flume::Sender<FileCmd>,
    cancel: Arc<AtomicBool>,
    pending_segment: bool,
}

impl std::fmt::Debug for FileShunt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileShunt").field("name", &self.core.name).finish()
    }
}

impl FileShunt {
    /// Opens `op.path` per the given [`FileConnectOp`] and spawns its
    /// worker thread.
    pub fn open(name: impl Into<String>, op: &FileConnectOp, options: ShuntOptions) -> crate::error::Result<Self> {
        let mut oo = OpenOptions::new();
        match op.access_mode {
            FileAccessMode::Read => {
                oo.read(true);
            }
            FileAccessMode::Write => {
                oo.write(true);
            }
            FileAccessMode::ReadWrite => {
                oo.read(true).write(true);
            }
        }
        if op.create {
            oo.create(true);
        }
        if op.replace {
            oo.truncate(true);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            oo.mode(op.creation_permissions);
        }

        let file = oo.open(&op.path).map_err(|source| crate::error::ShuntError::Open {
            path: op.path.clone(),
            source,
        })?;

        Ok(Self::from_file(name, file, options))
    }

    pub fn from_file(name: impl Into<String>, file: File, options: ShuntOptions) -> Self {
        let (msg_tx, msg_rx) = flume::unbounded();
        let (cmd_tx, cmd_rx) = flume::unbounded::<FileCmd>();
        let cancel = Arc::new(AtomicBool::new(false));

        let worker_cancel = cancel.clone();
        std::thread::Builder::new()
            .name("flow-file-shunt".into())
            .spawn(move || file_worker(file, cmd_rx, msg_tx, worker_cancel, options))
            .expect("failed to spawn flow-shunt file worker thread");

        let mut core = ElementCore::new(name);
        core.add_input();
        core.add_output();
        Self {
            core,
            bracket: StreamBracket::default(),
            rx: msg_rx,
            cmd_tx,
            cancel,
            pending_segment: false,
        }
    }

    /// Opens a plain path for reading, a convenience over [`Self::open`]
    /// for tests and simple call sites.
    pub fn open_read(name: impl Into<String>, path: impl AsRef<Path>, options: ShuntOptions) -> crate::error::Result<Self> {
        let op = FileConnectOp {
            path: path.as_ref().to_path_buf(),
            access_mode: FileAccessMode::Read,
            create: false,
            replace: false,
            creation_permissions: 0o644,
        };
        Self::open(name, &op, options)
    }
}

impl ElementObject for FileShunt {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn process_input(&mut self, _graph: &mut Graph, _me: ElementId, input_index: usize) {
        while let Some(packet) = self.core.inputs[input_index].state.queue_mut().pop_packet() {
            match packet {
                Packet::Buffer(b) => {
                    let _ = self.cmd_tx.send(FileCmd::Write(b));
                }
                Packet::Object(Event::SegmentRequest(req)) => {
                    self.pending_segment = true;
                    let _ = self.cmd_tx.send(FileCmd::Read(req));
                }
                Packet::Object(Event::Position(pos)) => {
                    if self.pending_segment {
                        self.cancel.store(true, Ordering::SeqCst);
                        self.pending_segment = false;
                    }
                    let _ = self.cmd_tx.send(FileCmd::Seek(pos));
                }
                Packet::Object(_) => {}
            }
        }
    }

    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        while let Ok(msg) = self.rx.try_recv() {
            // `begin()` latches on its own; the first worker message of any
            // kind (segment_begin, a read, EOF, ...) triggers it, so
            // stream.begin always precedes everything that follows it.
            if let Some(begin) = self.bracket.begin() {
                graph.push_output(PadRef::output(me, 0), begin);
            }
            if let ShuntMsg::Control(Event::SegmentRequest(_)) = &msg {
                self.pending_segment = false;
            }
            if let Some(packet) = msg.into_packet() {
                graph.push_output(PadRef::output(me, 0), packet);
            }
        }
    }
}

fn file_worker(
    mut file: File,
    cmd_rx: flume::Receiver<FileCmd>,
    msg_tx: flume::Sender<ShuntMsg>,
    cancel: Arc<AtomicBool>,
    options: ShuntOptions,
) {
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            FileCmd::Read(req) => {
                cancel.store(false, Ordering::SeqCst);
                let _ = msg_tx.send(ShuntMsg::detailed(DetailedEvent::stream_segment_begin()));
                let mut remaining: Option<i64> = if req.is_to_end() { None } else { Some(req.length) };
                let mut buf = vec![0u8; options.read_chunk_size];
                loop {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    let want = remaining.map_or(buf.len(), |r| (r as usize).min(buf.len()));
                    if want == 0 {
                        break;
                    }
                    match file.read(&mut buf[..want]) {
                        Ok(0) => {
                            let _ = msg_tx.send(ShuntMsg::detailed(DetailedEvent::file_reached_end()));
                            break;
                        }
                        Ok(n) => {
                            let _ = msg_tx.send(ShuntMsg::Data(Bytes::copy_from_slice(&buf[..n])));
                            if let Some(r) = remaining.as_mut() {
                                *r -= n as i64;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            let _ = msg_tx.send(ShuntMsg::detailed(map_io_error("file read", &e)));
                            return;
                        }
                    }
                }
                let _ = msg_tx.send(ShuntMsg::detailed(DetailedEvent::stream_segment_end()));
            }
            FileCmd::Write(data) => {
                if let Err(e) = file.write_all(&data) {
                    warn!(error = %e, "flow-shunt file write failed, awaiting restart");
                    let _ = msg_tx.send(ShuntMsg::detailed(map_io_error("file write", &e)));
                    // wait_for_restart: block until the pipeline side
                    // re-submits a write or closes the shunt, rather than
                    // spinning on the same error.
                    if cmd_rx.recv().is_err() {
                        return;
                    }
                }
            }
            FileCmd::Seek(pos) => {
                let from = match pos.anchor {
                    SeekAnchor::Current => SeekFrom::Current(pos.offset),
                    SeekAnchor::Begin => SeekFrom::Start(pos.offset as u64),
                    SeekAnchor::End => SeekFrom::End(pos.offset),
                };
                match file.seek(from) {
                    Ok(new_pos) => {
                        let _ = msg_tx.send(ShuntMsg::Control(Event::Position(Position {
                            anchor: SeekAnchor::Begin,
                            offset: new_pos as i64,
                        })));
                    }
                    Err(e) => {
                        let _ = msg_tx.send(ShuntMsg::detailed(map_io_error("file seek", &e)));
                    }
                }
            }
        }
    }
}
