//! Shared machinery used by every concrete shunt: the stream-edge event
//! bracketing state machine and the cross-thread message hand-off between
//! the OS-facing thread (watcher or dedicated worker) and the pipeline
//! thread that owns the `Graph`.

use bytes::Bytes;
use flow_core::event::{DetailedEvent, Event};
use flow_core::packet::Packet;

/// A chunk of work handed from the OS-facing side of a shunt to the
/// pipeline-facing side. Delivered through a [`flume`] channel so the
/// producer (watcher thread or a file's dedicated worker thread) never
/// touches the [`flow_core::element::Graph`] directly.
#[derive(Debug)]
pub enum ShuntMsg {
    Data(Bytes),
    Control(Event),
    Closed,
}

impl ShuntMsg {
    #[must_use]
    pub fn detailed(event: DetailedEvent) -> Self {
        Self::Control(Event::detailed(event))
    }

    #[must_use]
    pub fn into_packet(self) -> Option<Packet> {
        match self {
            Self::Data(b) => Some(Packet::buffer(b)),
            Self::Control(e) => Some(Packet::object(e)),
            Self::Closed => None,
        }
    }
}

/// Bracketing state for the `stream.begin ... stream.end` (or single
/// `stream.denied`) envelope every shunt wraps its data in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    #[default]
    NotStarted,
    Open,
    Ended,
    Denied,
}

#[derive(Debug, Default)]
pub struct StreamBracket {
    state: StreamState,
}

impl StreamBracket {
    /// Returns the `stream.begin` packet the first time it's called, and
    /// `None` on every subsequent call.
    pub fn begin(&mut self) -> Option<Packet> {
        if self.state != StreamState::NotStarted {
            return None;
        }
        self.state = StreamState::Open;
        Some(Packet::object(Event::detailed(DetailedEvent::stream_begin())))
    }

    /// Moves straight to `Open` without producing a `stream.begin` packet,
    /// for a caller that already knows the stream is open and is emitting
    /// that packet itself (a listener handing off a freshly accepted
    /// connection, which knows the peer before the shunt's own first read).
    pub fn mark_open(&mut self) {
        self.state = StreamState::Open;
    }

    /// Returns the `stream.end` packet once, provided the stream was opened
    /// and not already ended or denied.
    pub fn end(&mut self) -> Option<Packet> {
        if self.state != StreamState::Open {
            return None;
        }
        self.state = StreamState::Ended;
        Some(Packet::object(Event::detailed(DetailedEvent::stream_end())))
    }

    /// Returns a single `stream.denied` packet in place of `begin`/`end`,
    /// for a connection attempt that never opened a stream at all.
    pub fn denied(&mut self, description: impl Into<String>) -> Option<Packet> {
        if self.state != StreamState::NotStarted {
            return None;
        }
        self.state = StreamState::Denied;
        Some(Packet::object(Event::detailed(DetailedEvent::stream_denied(
            description,
            [],
        ))))
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == StreamState::Open
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Ended | StreamState::Denied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_emits_begin_then_end_exactly_once_each() {
        let mut b = StreamBracket::default();
        assert!(b.begin().is_some());
        assert!(b.begin().is_none());
        assert!(b.is_open());
        assert!(b.end().is_some());
        assert!(b.end().is_none());
        assert!(b.is_finished());
    }

    #[test]
    fn denied_precludes_begin() {
        let mut b = StreamBracket::default();
        assert!(b.denied("connection refused").is_some());
        assert!(b.begin().is_none());
        assert!(b.is_finished());
    }
}
