//! Construction-time errors: things that go wrong setting a shunt up, before
//! it has a stream to report events on. Once a shunt is running, failures
//! ride through the pipeline as [`flow_core::event::Event`] packets instead
//! — the event vocabulary, not `Result`, is how an open stream reports
//! trouble. `ShuntError` only covers the synchronous setup calls (`bind`,
//! `connect`, `spawn`) that return before any pad exists to push an event
//! onto.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShuntError {
    #[error("failed to open {path:?}: {source}")]
    Open { path: PathBuf, #[source] source: io::Error },

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, #[source] source: io::Error },

    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: SocketAddr, #[source] source: io::Error },

    #[error("failed to create pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("failed to spawn {command:?}: {source}")]
    Spawn { command: String, #[source] source: io::Error },

    #[error("runtime registration failed: {0}")]
    Registration(#[source] io::Error),

    #[error("shunt runtime is shutting down")]
    RuntimeShutdown,
}

pub type Result<T> = std::result::Result<T, ShuntError>;
