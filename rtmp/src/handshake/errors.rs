use std::io;
use thiserror::Error;

/// The ways the handshake exchange can fail.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The peer's c0/s0 byte was not RTMP version 3.
    #[error("peer sent unsupported RTMP version {version}")]
    BadVersion { version: u8 },

    #[error("{0}")]
    Io(#[from] io::Error),
}
