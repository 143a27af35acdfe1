//! The packet: flow's immutable, reference-counted unit of traffic.
//!
//! A packet is either a byte buffer or a single typed control [`Event`].
//! Buffer packets clone cheaply via [`bytes::Bytes`] (a refcounted view, not
//! a copy); object packets clone cheaply via `Arc` on the event itself.

use bytes::Bytes;

use crate::event::Event;

/// Either a byte buffer or a boxed control event. Cloning a `Packet` never
/// copies the underlying bytes or the event payload.
#[derive(Debug, Clone)]
pub enum Packet {
    Buffer(Bytes),
    Object(Event),
}

impl Packet {
    /// Construct a buffer packet, copying `data` into packet-owned storage.
    #[must_use]
    pub fn buffer(data: impl Into<Bytes>) -> Self {
        Self::Buffer(data.into())
    }

    /// Construct an object packet carrying `event`.
    #[must_use]
    pub const fn object(event: Event) -> Self {
        Self::Object(event)
    }

    /// Byte size of this packet. Object packets contribute zero.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Buffer(b) => b.len(),
            Self::Object(_) => 0,
        }
    }

    #[must_use]
    pub const fn is_buffer(&self) -> bool {
        matches!(self, Self::Buffer(_))
    }

    #[must_use]
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    #[must_use]
    pub fn as_buffer(&self) -> Option<&Bytes> {
        match self {
            Self::Buffer(b) => Some(b),
            Self::Object(_) => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Event> {
        match self {
            Self::Object(e) => Some(e),
            Self::Buffer(_) => None,
        }
    }

    #[must_use]
    pub fn into_buffer(self) -> Option<Bytes> {
        match self {
            Self::Buffer(b) => Some(b),
            Self::Object(_) => None,
        }
    }

    #[must_use]
    pub fn into_object(self) -> Option<Event> {
        match self {
            Self::Object(e) => Some(e),
            Self::Buffer(_) => None,
        }
    }

    /// A zero-size buffer packet, dropped silently by [`crate::packet_queue::PacketQueue::push`].
    #[must_use]
    pub const fn is_empty_buffer(&self) -> bool {
        matches!(self, Self::Buffer(b) if b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_clone_shares_storage() {
        let p = Packet::buffer(Bytes::from_static(b"hello"));
        let q = p.clone();
        assert_eq!(p.size(), 5);
        assert_eq!(q.as_buffer().unwrap().as_ptr(), p.as_buffer().unwrap().as_ptr());
    }

    #[test]
    fn object_packet_has_zero_size() {
        let p = Packet::object(Event::SegmentRequest(crate::event::SegmentRequest { length: 4 }));
        assert_eq!(p.size(), 0);
        assert!(p.is_object());
    }
}
