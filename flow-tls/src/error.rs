use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("tls I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("tls protocol error: {0}")]
    Protocol(String),

    #[error("tls configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TlsError>;
