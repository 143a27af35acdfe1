//! The crypto backend seam. [`TlsProtocol`](crate::element::TlsProtocol)
//! drives any implementation of [`TlsBackend`] without knowing which TLS
//! library is behind it, so the handshake/record-layer state machine stays
//! testable against a fake backend independent of any real crypto crate.
//!
//! [`RustlsBackend`] is the bundled default.

use std::io::{self, Read, Write};

use crate::error::{Result, TlsError};

/// A TLS record-layer engine, fed ciphertext and plaintext in both
/// directions and drained for whatever it has produced in response.
pub trait TlsBackend: Send {
    fn handle_incoming_ciphertext(&mut self, data: &[u8]) -> Result<()>;
    fn handle_outgoing_plaintext(&mut self, data: &[u8]) -> Result<()>;

    /// Processes any ciphertext queued by [`Self::handle_incoming_ciphertext`]
    /// since the last call, surfacing newly available plaintext and/or
    /// handshake state changes.
    fn process_new_packets(&mut self) -> Result<()>;

    fn take_outgoing_ciphertext(&mut self) -> Vec<u8>;
    fn take_incoming_plaintext(&mut self) -> Vec<u8>;

    fn is_handshaking(&self) -> bool;
    fn wants_write(&self) -> bool;

    /// Queues a `close_notify` alert to be picked up by the next
    /// [`Self::take_outgoing_ciphertext`], starting a graceful shutdown.
    fn send_close_notify(&mut self);
}

enum Role {
    Client(rustls::ClientConnection),
    Server(rustls::ServerConnection),
}

impl Role {
    fn conn(&mut self) -> &mut dyn rustls::Connection {
        match self {
            Role::Client(c) => c,
            Role::Server(c) => c,
        }
    }
}

/// Default [`TlsBackend`], backed by `rustls`.
pub struct RustlsBackend {
    role: Role,
    incoming_plaintext: Vec<u8>,
}

impl RustlsBackend {
    #[must_use]
    pub fn client(conn: rustls::ClientConnection) -> Self {
        Self {
            role: Role::Client(conn),
            incoming_plaintext: Vec::new(),
        }
    }

    #[must_use]
    pub fn server(conn: rustls::ServerConnection) -> Self {
        Self {
            role: Role::Server(conn),
            incoming_plaintext: Vec::new(),
        }
    }
}

impl TlsBackend for RustlsBackend {
    fn handle_incoming_ciphertext(&mut self, data: &[u8]) -> Result<()> {
        let mut cursor = io::Cursor::new(data);
        self.role.conn().read_tls(&mut cursor)?;
        Ok(())
    }

    fn handle_outgoing_plaintext(&mut self, data: &[u8]) -> Result<()> {
        self.role.conn().writer().write_all(data)?;
        Ok(())
    }

    fn process_new_packets(&mut self) -> Result<()> {
        self.role
            .conn()
            .process_new_packets()
            .map_err(|e| TlsError::Protocol(e.to_string()))?;

        let mut buf = [0u8; 16 * 1024];
        loop {
            match self.role.conn().reader().read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.incoming_plaintext.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(TlsError::Io(e)),
            }
        }
        Ok(())
    }

    fn take_outgoing_ciphertext(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        while self.role.conn().wants_write() {
            match self.role.conn().write_tls(&mut out) {
                Ok(0) => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }
        out
    }

    fn take_incoming_plaintext(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.incoming_plaintext)
    }

    fn is_handshaking(&self) -> bool {
        match &self.role {
            Role::Client(c) => c.is_handshaking(),
            Role::Server(c) => c.is_handshaking(),
        }
    }

    fn wants_write(&self) -> bool {
        match &self.role {
            Role::Client(c) => c.wants_write(),
            Role::Server(c) => c.wants_write(),
        }
    }

    fn send_close_notify(&mut self) {
        self.role.conn().send_close_notify();
    }
}
