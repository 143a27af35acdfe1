//! Pads: directed, point-to-point endpoints on an [`crate::element::Element`].
//!
//! A pad's peer and owner are modeled as generation-checked indices into the
//! owning [`crate::element::Graph`]'s element arena rather than as raw
//! borrowed pointers or an `Rc<RefCell<_>>` cycle, avoiding weak
//! back-references and cyclic structure entirely.

use crate::element::ElementId;
use crate::packet_queue::PacketQueue;

/// Which side of an element a pad is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// A non-owning reference to a pad on some element in the graph: an element
/// id (itself generation-checked) plus the pad's direction and index within
/// that element's pad array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PadRef {
    pub element: ElementId,
    pub direction: Direction,
    pub index: usize,
}

impl PadRef {
    #[must_use]
    pub const fn input(element: ElementId, index: usize) -> Self {
        Self {
            element,
            direction: Direction::Input,
            index,
        }
    }

    #[must_use]
    pub const fn output(element: ElementId, index: usize) -> Self {
        Self {
            element,
            direction: Direction::Output,
            index,
        }
    }
}

/// Fields shared by input and output pads.
///
/// `dispatch_depth > 0` prevents a pad's destruction from fully taking
/// effect while a callback is still on the stack for it; when the depth
/// reaches zero the destruction (clearing of `queue`/`peer`) is finalized.
#[derive(Debug, Default)]
pub struct PadState {
    pub peer: Option<PadRef>,
    pub queue: Option<PacketQueue>,
    pub is_blocked: bool,
    pub was_disposed: bool,
    pub dispatch_depth: u32,
}

impl PadState {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// Lazily creates the queue on first use.
    pub fn queue_mut(&mut self) -> &mut PacketQueue {
        self.queue.get_or_insert_with(PacketQueue::new)
    }

    /// Frees the queue once it has fully drained, so an idle output pad
    /// holds no allocation.
    pub fn drop_queue_if_empty(&mut self) {
        if matches!(&self.queue, Some(q) if q.is_empty()) {
            self.queue = None;
        }
    }

    pub fn enter_dispatch(&mut self) {
        self.dispatch_depth += 1;
    }

    /// Leaves a dispatch frame for this pad. Returns `true` if this was the
    /// frame that finalized a disposed pad (depth reached zero while
    /// disposed), so the caller can drop its owned handle.
    pub fn leave_dispatch(&mut self) -> bool {
        debug_assert!(self.dispatch_depth > 0);
        self.dispatch_depth -= 1;
        self.dispatch_depth == 0 && self.was_disposed
    }
}

/// An input pad: data arrives here from a connected output pad and is
/// delivered to the owner element's `process_input` hook.
#[derive(Debug, Default)]
pub struct InputPad {
    pub state: PadState,
    /// True while this exact pad is the one currently executing inside the
    /// owner element's `process_input` (same-pad recursion is suppressed).
    pub is_current: bool,
}

/// An output pad: data pushed here is forwarded directly to the peer if
/// unblocked and connected, otherwise queued.
#[derive(Debug, Default)]
pub struct OutputPad {
    pub state: PadState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementId;

    #[test]
    fn pad_ref_roundtrip() {
        let id = ElementId::first_for_test();
        let p = PadRef::output(id, 2);
        assert_eq!(p.direction, Direction::Output);
        assert_eq!(p.index, 2);
    }

    #[test]
    fn queue_is_lazily_allocated_and_freed() {
        let mut s = PadState::default();
        assert!(s.queue.is_none());
        s.queue_mut().push(crate::packet::Packet::buffer(bytes::Bytes::from_static(b"x")));
        assert!(s.queue.is_some());
        s.queue_mut().pop_packet();
        s.drop_queue_if_empty();
        assert!(s.queue.is_none());
    }
}
