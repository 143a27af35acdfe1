//! TLS record-layer protocol element for `flow`.
//!
//! [`element::TlsProtocol`] sits between a plaintext application pair of
//! pads and a ciphertext transport pair of pads, driving a pluggable
//! [`backend::TlsBackend`] (bundled default: [`backend::RustlsBackend`]).
//! It knows nothing about sockets — pair it with a `flow_shunt::tcp::TcpShunt`
//! (or any other ciphertext-producing shunt) at the graph level.

pub mod backend;
pub mod element;
pub mod error;

pub mod prelude {
    pub use crate::backend::{RustlsBackend, TlsBackend};
    pub use crate::element::TlsProtocol;
    pub use crate::error::{Result, TlsError};
}
