//! FIFO packet queue with partial-buffer dequeue.
//!
//! A segmented, zero-copy byte queue that also interleaves object
//! (control-event) packets among buffer packets.

use std::collections::VecDeque;

use bytes::{Buf, Bytes, BytesMut};

use crate::event::Event;
use crate::packet::Packet;

/// Ordered sequence of packets with a per-queue `packet_position` cursor
/// indicating how many bytes of the head buffer packet have already been
/// consumed.
///
/// Invariant: `packet_position < head.size()` whenever head is a buffer
/// packet; if they become equal the head is dropped and `packet_position`
/// reset to 0. The three counters (`n_packets`, `n_bytes`, `n_data_bytes`)
/// always reflect the physical contents.
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: VecDeque<Packet>,
    packet_position: usize,
    n_bytes: usize,
    n_data_bytes: usize,
}

impl PacketQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len_packets(&self) -> usize {
        self.packets.len()
    }

    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.n_bytes
    }

    #[must_use]
    pub fn len_data_bytes(&self) -> usize {
        self.n_data_bytes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    #[must_use]
    pub fn packet_position(&self) -> usize {
        self.packet_position
    }

    /// Appends `packet`. Zero-size buffer packets are silently dropped; this
    /// is a contract the caller can rely on, not an optional optimization.
    pub fn push(&mut self, packet: Packet) {
        if packet.is_empty_buffer() {
            return;
        }
        self.n_bytes += packet.size();
        if packet.is_buffer() {
            self.n_data_bytes += packet.size();
        }
        self.packets.push_back(packet);
    }

    /// Consolidates any partial head first so the new packet becomes the
    /// true head, then prepends it.
    pub fn push_to_head(&mut self, packet: Packet) {
        self.consolidate_partial_head();
        if packet.is_empty_buffer() {
            return;
        }
        self.n_bytes += packet.size();
        if packet.is_buffer() {
            self.n_data_bytes += packet.size();
        }
        self.packets.push_front(packet);
    }

    /// If the head buffer packet has already been partially consumed,
    /// replace it with a fresh packet over just its unread tail, so the
    /// physical head packet always starts at `packet_position == 0`.
    fn consolidate_partial_head(&mut self) {
        if self.packet_position == 0 {
            return;
        }
        if let Some(Packet::Buffer(b)) = self.packets.front() {
            let tail = b.slice(self.packet_position..);
            self.packets[0] = Packet::Buffer(tail);
        }
        self.packet_position = 0;
    }

    /// Removes and returns the head packet. If the head would be returned
    /// with a nonzero `packet_position`, synthesizes a new buffer packet
    /// over the unread tail instead of returning the original.
    pub fn pop_packet(&mut self) -> Option<Packet> {
        let head = self.packets.front()?;
        let synthesized = match head {
            Packet::Buffer(b) if self.packet_position > 0 => {
                Some(Packet::Buffer(b.slice(self.packet_position..)))
            }
            _ => None,
        };
        let original = self.packets.pop_front().expect("checked by front() above");
        self.n_bytes -= original.size();
        if original.is_buffer() {
            self.n_data_bytes -= original.size();
        }
        self.packet_position = 0;
        Some(synthesized.unwrap_or(original))
    }

    /// Returns at most `n_max` bytes drawn from contiguous head buffer
    /// packets into `dest`, returning the number of bytes copied. Stops at
    /// the first object packet or once `dest`/`n_max` is exhausted. May drop
    /// exhausted buffer packets and advance `packet_position`.
    pub fn pop_bytes(&mut self, dest: &mut [u8], n_max: usize) -> usize {
        let want = n_max.min(dest.len());
        let mut copied = 0;

        while copied < want {
            let Some(head) = self.packets.front() else { break };
            let Packet::Buffer(b) = head else { break };

            let available = b.len() - self.packet_position;
            let take = (want - copied).min(available);
            dest[copied..copied + take]
                .copy_from_slice(&b[self.packet_position..self.packet_position + take]);
            copied += take;
            self.packet_position += take;
            self.n_bytes -= take;
            self.n_data_bytes -= take;

            if self.packet_position == b.len() {
                self.packets.pop_front();
                self.packet_position = 0;
            }
        }

        copied
    }

    /// Two-pass exact pop: first confirms at least `n` bytes are available
    /// in a contiguous run of buffer packets with no intervening object
    /// packet; if so performs the pop into `dest[..n]` and returns `true`.
    /// Otherwise the queue is left entirely unchanged and returns `false`.
    pub fn pop_bytes_exact(&mut self, dest: &mut [u8], n: usize) -> bool {
        if !self.has_contiguous_data_bytes(n) {
            return false;
        }
        let copied = self.pop_bytes(dest, n);
        debug_assert_eq!(copied, n);
        true
    }

    /// Non-mutating scan confirming `n` contiguous buffer bytes are
    /// available starting at the head before any object packet intervenes.
    #[must_use]
    pub fn has_contiguous_data_bytes(&self, n: usize) -> bool {
        let mut remaining = n;
        let mut first = true;
        for packet in &self.packets {
            if remaining == 0 {
                return true;
            }
            let Packet::Buffer(b) = packet else { return false };
            let available = if first { b.len() - self.packet_position } else { b.len() };
            first = false;
            remaining = remaining.saturating_sub(available);
        }
        remaining == 0
    }

    /// Non-destructively scans past buffer packets to find the first object
    /// packet, returning a reference to its event if found before the queue
    /// runs out of packets.
    #[must_use]
    pub fn peek_first_object(&self) -> Option<&Event> {
        self.packets.iter().find_map(Packet::as_object)
    }

    /// Like [`Self::peek_first_object`], but removes the located object
    /// packet from the queue (buffer packets preceding it are left in
    /// place), returning the owned event.
    pub fn pop_first_object(&mut self) -> Option<Event> {
        let idx = self.packets.iter().position(Packet::is_object)?;
        let removed = self.packets.remove(idx).expect("index from position()");
        // Object packets never contribute to the byte counters, so no
        // counter adjustment is needed; `idx == 0` would also need a
        // `packet_position` reset, but position is only ever nonzero over a
        // buffer head, never over an object packet.
        removed.into_object()
    }

    /// Removes every packet up to and including the first object packet
    /// (the buffer packets scanned over are consumed, not just skipped),
    /// for a consumer that has already processed that byte prefix through
    /// the byte-iterator cursor and wants to drop it.
    pub fn skip_past_first_object(&mut self) -> Option<Event> {
        loop {
            let packet = self.pop_packet()?;
            if let Packet::Object(event) = packet {
                return Some(event);
            }
        }
    }
}

/// A non-destructive cursor over the contiguous byte-data prefix of a
/// [`PacketQueue`] — used by variable-length decoders that want to back out
/// if the input turns out to be incomplete, without having mutated the
/// queue in the meantime.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteIter {
    packet_index: usize,
    offset: usize,
}

impl PacketQueue {
    /// Begins a byte-iterator cursor positioned at the current head.
    #[must_use]
    pub fn byte_iter_init(&self) -> ByteIter {
        ByteIter {
            packet_index: 0,
            offset: self.packet_position,
        }
    }

    fn byte_at(&self, iter: ByteIter) -> Option<u8> {
        let packet = self.packets.get(iter.packet_index)?;
        let Packet::Buffer(b) = packet else { return None };
        b.get(iter.offset).copied()
    }

    fn packet_len(&self, idx: usize) -> Option<usize> {
        match self.packets.get(idx)? {
            Packet::Buffer(b) => Some(b.len()),
            Packet::Object(_) => None,
        }
    }

    /// Peeks the next byte under the cursor without advancing it. Returns
    /// `None` at the end of buffered data or at an intervening object
    /// packet.
    #[must_use]
    pub fn byte_iter_peek(&self, iter: ByteIter) -> Option<u8> {
        self.byte_at(iter)
    }

    /// Reads the next byte and advances the cursor by one. Returns `None`
    /// (leaving the cursor unchanged) at the end of data.
    pub fn byte_iter_pop(&self, iter: &mut ByteIter) -> Option<u8> {
        let byte = self.byte_at(*iter)?;
        self.byte_iter_advance_inner(iter, 1);
        Some(byte)
    }

    /// Advances the cursor by up to `n` bytes, stopping at an object packet
    /// or end of data. Returns the number of bytes actually advanced.
    pub fn byte_iter_advance(&self, iter: &mut ByteIter, n: usize) -> usize {
        self.byte_iter_advance_inner(iter, n)
    }

    fn byte_iter_advance_inner(&self, iter: &mut ByteIter, mut n: usize) -> usize {
        let mut advanced = 0;
        while n > 0 {
            let Some(len) = self.packet_len(iter.packet_index) else { break };
            let remaining_in_packet = len - iter.offset;
            if remaining_in_packet == 0 {
                iter.packet_index += 1;
                iter.offset = 0;
                continue;
            }
            let take = n.min(remaining_in_packet);
            iter.offset += take;
            n -= take;
            advanced += take;
            if iter.offset == len {
                iter.packet_index += 1;
                iter.offset = 0;
            }
        }
        advanced
    }

    /// Commits a scan: physically drops every byte/packet the cursor has
    /// passed over, leaving the queue's real head at the cursor position.
    /// Bytes after the cursor (within a partially-scanned packet) are kept.
    pub fn byte_iter_drop_preceding_data(&mut self, iter: &ByteIter) {
        for _ in 0..iter.packet_index {
            let removed = self.pop_packet().expect("cursor stayed within bounds");
            debug_assert!(removed.is_buffer());
        }
        if iter.offset > 0 {
            let mut dropped = vec![0u8; iter.offset];
            let n = self.pop_bytes(&mut dropped, iter.offset);
            debug_assert_eq!(n, iter.offset);
        }
    }
}

/// Copies `src` into an owned [`Bytes`] suitable for a buffer packet. Kept
/// as a small free function so call sites read like a plain
/// "construct-buffer(data, size)" operation.
#[must_use]
pub fn copy_buffer(src: &[u8]) -> Bytes {
    Bytes::copy_from_slice(src)
}

/// Concatenates the contents of `segments` into one owned buffer; used by
/// tests and by `pop_bytes_exact` callers that want a `Vec` rather than a
/// fixed `dest` slice.
#[must_use]
pub fn concat(segments: &[Bytes]) -> BytesMut {
    let mut out = BytesMut::with_capacity(segments.iter().map(Bytes::len).sum());
    for s in segments {
        out.extend_from_slice(s);
    }
    out
}

#[allow(unused_imports)]
use Buf as _;

#[cfg(test)]
mod tests {
    use super::*;

    fn push_str(q: &mut PacketQueue, s: &str) {
        q.push(Packet::buffer(Bytes::copy_from_slice(s.as_bytes())));
    }

    #[test]
    fn queue_round_trip() {
        let mut q = PacketQueue::new();
        push_str(&mut q, "hello, ");
        push_str(&mut q, "world");

        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = q.pop_bytes(&mut buf, 4);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"hello, world");
        assert!(q.is_empty());
        assert_eq!(q.len_bytes(), 0);
    }

    #[test]
    fn zero_size_buffer_is_dropped() {
        let mut q = PacketQueue::new();
        q.push(Packet::buffer(Bytes::new()));
        assert!(q.is_empty());
        assert_eq!(q.len_packets(), 0);
    }

    #[test]
    fn pop_bytes_exact_atomicity_success() {
        let mut q = PacketQueue::new();
        push_str(&mut q, "ab");
        push_str(&mut q, "cdef");

        let mut dest = [0u8; 5];
        assert!(q.pop_bytes_exact(&mut dest, 5));
        assert_eq!(&dest, b"abcde");
        assert_eq!(q.len_data_bytes(), 1);
    }

    #[test]
    fn pop_bytes_exact_atomicity_failure_leaves_queue_unchanged() {
        let mut q = PacketQueue::new();
        push_str(&mut q, "ab");
        q.push(Packet::object(Event::Position(crate::event::Position {
            anchor: crate::event::SeekAnchor::Current,
            offset: 0,
        })));
        push_str(&mut q, "cdef");

        let mut dest = [0u8; 5];
        // Only 2 contiguous data bytes before the object packet.
        assert!(!q.pop_bytes_exact(&mut dest, 5));
        assert_eq!(q.len_packets(), 3);
        assert_eq!(q.len_data_bytes(), 6);
    }

    #[test]
    fn partial_packet_synthesis_on_pop_packet() {
        let mut q = PacketQueue::new();
        push_str(&mut q, "0123456789");

        let mut first = [0u8; 4];
        q.pop_bytes(&mut first, 4);
        assert_eq!(&first, b"0123");

        let rest = q.pop_packet().unwrap();
        assert_eq!(rest.as_buffer().unwrap().as_ref(), b"456789");
    }

    #[test]
    fn push_to_head_consolidates_partial_head() {
        let mut q = PacketQueue::new();
        push_str(&mut q, "0123456789");
        let mut first = [0u8; 4];
        q.pop_bytes(&mut first, 4);

        q.push_to_head(Packet::buffer(Bytes::from_static(b"XX")));

        let mut out = vec![0u8; 8];
        let n = q.pop_bytes(&mut out, 8);
        assert_eq!(n, 8);
        assert_eq!(&out, b"XX456789");
    }

    #[test]
    fn object_scan_helpers() {
        let mut q = PacketQueue::new();
        push_str(&mut q, "ab");
        q.push(Packet::object(Event::SegmentRequest(crate::event::SegmentRequest {
            length: 4,
        })));
        push_str(&mut q, "cd");

        assert!(q.peek_first_object().is_some());
        let obj = q.pop_first_object().unwrap();
        assert!(matches!(obj, Event::SegmentRequest(_)));
        // Buffer packets before/after the object remain.
        assert_eq!(q.len_data_bytes(), 4);
    }

    #[test]
    fn byte_iterator_backs_out_without_mutating() {
        let mut q = PacketQueue::new();
        push_str(&mut q, "abc");
        push_str(&mut q, "def");

        let mut iter = q.byte_iter_init();
        assert_eq!(q.byte_iter_pop(&mut iter), Some(b'a'));
        assert_eq!(q.byte_iter_pop(&mut iter), Some(b'b'));
        // Decoder decides it needs more data than exists and backs out:
        // the real queue is untouched.
        assert_eq!(q.len_data_bytes(), 6);

        // Continue the same cursor and commit once satisfied.
        assert_eq!(q.byte_iter_pop(&mut iter), Some(b'c'));
        assert_eq!(q.byte_iter_peek(iter), Some(b'd'));
        q.byte_iter_drop_preceding_data(&iter);
        assert_eq!(q.len_data_bytes(), 3);

        let mut out = [0u8; 3];
        q.pop_bytes(&mut out, 3);
        assert_eq!(&out, b"def");
    }
}
