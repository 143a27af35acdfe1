//! Runtime-agnostic pipeline core for `flow`.
//!
//! This crate knows nothing about operating-system I/O. It defines the
//! packet representation, the backpressure-aware pad protocol, the element
//! dispatch arena, and the universal stream-event vocabulary that every
//! transport (`flow-shunt`) and protocol element (`flow-tls`) is built on
//! top of.

pub mod bin;
pub mod element;
pub mod elements;
pub mod event;
pub mod graph_utils;
pub mod packet;
pub mod packet_queue;
pub mod pad;

pub mod prelude {
    pub use crate::bin::Bin;
    pub use crate::element::{ElementCore, ElementId, ElementObject, Graph};
    pub use crate::elements::{Collector, Demux, DuplexElement, Emitter, Joiner, Mux, SimplexElement, Splitter};
    pub use crate::event::{codes, DetailedEvent, Event};
    pub use crate::graph_utils::{connect_duplex_duplex, connect_simplex_simplex, insert_simplex, replace_element};
    pub use crate::packet::Packet;
    pub use crate::packet_queue::PacketQueue;
    pub use crate::pad::{Direction, PadRef};
}
