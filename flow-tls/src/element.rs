//! The TLS protocol element: a duplex element with an upstream
//! (plaintext, application-facing) side and a downstream (ciphertext,
//! transport-facing) side, each with its own small state machine.
//!
//! Pad layout: input 0 / output 0 is upstream (plaintext); input 1 /
//! output 1 is downstream (ciphertext) — the same two-simplex-channels
//! shape as [`flow_core::elements::DuplexElement`], but with its own
//! `process_input` instead of a pair of user closures, since the two
//! directions share the backend's handshake state.

use bytes::Bytes;
use flow_core::element::{ElementCore, ElementId, ElementObject, Graph};
use flow_core::event::{codes, DetailedEvent, Event};
use flow_core::packet::Packet;
use flow_core::pad::PadRef;
use tracing::{debug, warn};

use crate::backend::TlsBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpstreamState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownstreamState {
    Closed,
    Handshaking,
    Open,
    Quitting,
}

pub struct TlsProtocol {
    core: ElementCore,
    backend: Box<dyn TlsBackend>,
    upstream: UpstreamState,
    downstream: DownstreamState,
    sent_upstream_begin: bool,
}

impl std::fmt::Debug for TlsProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsProtocol")
            .field("name", &self.core.name)
            .field("upstream", &self.upstream)
            .field("downstream", &self.downstream)
            .finish()
    }
}

const UPSTREAM_IN: usize = 0;
const UPSTREAM_OUT: usize = 0;
const DOWNSTREAM_IN: usize = 1;
const DOWNSTREAM_OUT: usize = 1;

impl TlsProtocol {
    #[must_use]
    pub fn new(name: impl Into<String>, backend: Box<dyn TlsBackend>) -> Self {
        let mut core = ElementCore::new(name);
        core.add_input(); // upstream in (plaintext)
        core.add_input(); // downstream in (ciphertext)
        core.add_output(); // upstream out (plaintext)
        core.add_output(); // downstream out (ciphertext)
        Self {
            core,
            backend,
            upstream: UpstreamState::Closed,
            downstream: DownstreamState::Closed,
            sent_upstream_begin: false,
        }
    }

    fn flush_outgoing_ciphertext(&mut self, graph: &mut Graph, me: ElementId) {
        let out = self.backend.take_outgoing_ciphertext();
        if !out.is_empty() {
            graph.push_output(PadRef::output(me, DOWNSTREAM_OUT), Packet::buffer(Bytes::from(out)));
        }
    }

    fn flush_incoming_plaintext(&mut self, graph: &mut Graph, me: ElementId) {
        let out = self.backend.take_incoming_plaintext();
        if out.is_empty() {
            return;
        }
        if !self.sent_upstream_begin {
            self.sent_upstream_begin = true;
            self.upstream = UpstreamState::Open;
            graph.push_output(
                PadRef::output(me, UPSTREAM_OUT),
                Packet::object(Event::detailed(DetailedEvent::stream_begin())),
            );
        }
        graph.push_output(PadRef::output(me, UPSTREAM_OUT), Packet::buffer(Bytes::from(out)));
    }

    fn update_handshake_state(&mut self) {
        if self.downstream == DownstreamState::Handshaking && !self.backend.is_handshaking() {
            debug!("tls handshake complete");
            self.downstream = DownstreamState::Open;
        }
    }

    fn report_protocol_error(&mut self, graph: &mut Graph, me: ElementId, err: &crate::error::TlsError) {
        warn!(error = %err, "tls protocol error");
        self.downstream = DownstreamState::Quitting;
        let event = DetailedEvent::new(
            err.to_string(),
            [
                (codes::STREAM, codes::STREAM_APP_ERROR),
                (codes::STREAM, codes::STREAM_END),
            ],
        );
        graph.push_output(PadRef::output(me, UPSTREAM_OUT), Packet::object(Event::detailed(event)));
    }
}

impl ElementObject for TlsProtocol {
    fn core(&self) -> &ElementCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn process_input(&mut self, graph: &mut Graph, me: ElementId, input_index: usize) {
        match input_index {
            UPSTREAM_IN => {
                while let Some(packet) = self.core.inputs[UPSTREAM_IN].state.queue_mut().pop_packet() {
                    match packet {
                        Packet::Buffer(data) => {
                            if let Err(e) = self.backend.handle_outgoing_plaintext(&data) {
                                self.report_protocol_error(graph, me, &e);
                                return;
                            }
                        }
                        Packet::Object(Event::Detailed(d)) if d.matches(codes::STREAM, codes::STREAM_END) => {
                            debug!("upstream closed, sending close_notify downstream");
                            self.downstream = DownstreamState::Quitting;
                            self.backend.send_close_notify();
                        }
                        Packet::Object(_) => {}
                    }
                }
                self.flush_outgoing_ciphertext(graph, me);
            }
            DOWNSTREAM_IN => {
                while let Some(packet) = self.core.inputs[DOWNSTREAM_IN].state.queue_mut().pop_packet() {
                    match packet {
                        Packet::Buffer(data) => {
                            if let Err(e) = self.backend.handle_incoming_ciphertext(&data) {
                                self.report_protocol_error(graph, me, &e);
                                return;
                            }
                            if let Err(e) = self.backend.process_new_packets() {
                                self.report_protocol_error(graph, me, &e);
                                return;
                            }
                        }
                        Packet::Object(Event::Detailed(d)) if d.matches(codes::STREAM, codes::STREAM_BEGIN) => {
                            self.upstream = UpstreamState::Open;
                            if self.downstream == DownstreamState::Closed {
                                self.downstream = DownstreamState::Handshaking;
                            }
                        }
                        Packet::Object(Event::Detailed(d))
                            if d.matches(codes::STREAM, codes::STREAM_END) || d.matches(codes::STREAM, codes::STREAM_DENIED) =>
                        {
                            self.downstream = DownstreamState::Closed;
                            self.upstream = UpstreamState::Closed;
                        }
                        Packet::Object(_) => {}
                    }
                }
                self.update_handshake_state();
                self.flush_outgoing_ciphertext(graph, me);
                self.flush_incoming_plaintext(graph, me);
            }
            _ => unreachable!("TlsProtocol has exactly two input pads"),
        }
    }

    fn output_pad_blocked(&mut self, graph: &mut Graph, me: ElementId, output_index: usize) {
        if output_index == DOWNSTREAM_OUT {
            // A stalled transport must not stall the plaintext side while a
            // handshake is in flight (nothing would ever drain it to unblock
            // again) or while we're trying to get a close_notify out.
            if !matches!(self.downstream, DownstreamState::Handshaking | DownstreamState::Quitting) {
                graph.block_input(PadRef::input(me, UPSTREAM_IN));
            }
        } else {
            graph.block_input(PadRef::input(me, DOWNSTREAM_IN));
        }
    }

    fn output_pad_unblocked(&mut self, graph: &mut Graph, me: ElementId, output_index: usize) {
        if output_index == DOWNSTREAM_OUT {
            if !matches!(self.downstream, DownstreamState::Handshaking | DownstreamState::Quitting) {
                graph.unblock_input(PadRef::input(me, UPSTREAM_IN));
            }
        } else {
            graph.unblock_input(PadRef::input(me, DOWNSTREAM_IN));
        }
    }

    /// A client handshake starts with nothing on any input pad (the backend
    /// itself wants to write a ClientHello); an external driver calls this
    /// once after construction to get the first flight moving, and again if
    /// it ever needs to nudge a backend that has buffered output it hasn't
    /// emitted yet.
    fn pump(&mut self, graph: &mut Graph, me: ElementId) {
        self.update_handshake_state();
        self.flush_outgoing_ciphertext(graph, me);
        self.flush_incoming_plaintext(graph, me);
    }
}
