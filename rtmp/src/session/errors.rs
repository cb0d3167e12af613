use std::io;
use thiserror::Error;

use crate::buffer::BufferError;
use crate::chunk::{ChunkDecodeError, ChunkEncodeError};
use crate::handshake::HandshakeError;
use crate::packets::{PacketDecodeError, PacketEncodeError};

/// Everything that can end a protocol session, plus the two in-band control
/// signals (`StreamClosed`, `Republish`) that travel the error channel but
/// are not failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Buffer(#[from] BufferError),

    #[error("{0}")]
    ChunkDecode(#[from] ChunkDecodeError),

    #[error("{0}")]
    ChunkEncode(#[from] ChunkEncodeError),

    #[error("{0}")]
    PacketDecode(#[from] PacketDecodeError),

    #[error("{0}")]
    PacketEncode(#[from] PacketEncodeError),

    #[error("{0}")]
    Handshake(#[from] HandshakeError),

    /// The connect command object did not carry the fields a connection
    /// request requires.
    #[error("connect request was missing {field}")]
    ConnectRequired { field: &'static str },

    /// The tcUrl could not be parsed into schema/host/app.
    #[error("tcUrl {tc_url:?} could not be parsed")]
    InvalidTcUrl { tc_url: String },

    /// The server rejected the connection request.
    #[error("connection rejected by server: {description}")]
    ConnectRejected { description: String },

    /// An operation was attempted in a state that does not allow it.
    #[error("{operation} is not valid in the {state} state")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The identify loop gave up after too many unexpected commands.
    #[error("peer sent too many unexpected commands while identifying")]
    IdentifyRetriesExceeded,

    /// Control signal: the peer closed the stream (closeStream). Not a
    /// failure; callers should wind the stream down.
    #[error("peer closed the stream")]
    StreamClosed,

    /// Control signal: an FMLE encoder stopped publishing and intends to
    /// start again (FCUnpublish). Callers restart the publish pipeline on
    /// the same connection.
    #[error("peer is republishing")]
    Republish,
}

impl ProtocolError {
    /// True for the in-band control signals that are expected protocol
    /// events rather than failures.
    pub fn is_system_control(&self) -> bool {
        matches!(self, ProtocolError::StreamClosed | ProtocolError::Republish)
    }

    /// True when the underlying transport operation timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.io_kind(),
            Some(io::ErrorKind::TimedOut) | Some(io::ErrorKind::WouldBlock)
        )
    }

    /// True when the error is the peer hanging up rather than a protocol
    /// violation, so callers can demote the log level.
    pub fn is_client_gracefully_close(&self) -> bool {
        matches!(
            self.io_kind(),
            Some(io::ErrorKind::UnexpectedEof)
                | Some(io::ErrorKind::ConnectionReset)
                | Some(io::ErrorKind::ConnectionAborted)
                | Some(io::ErrorKind::BrokenPipe)
        )
    }

    fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            ProtocolError::Io(error) => Some(error.kind()),
            ProtocolError::Buffer(BufferError::Io(error)) => Some(error.kind()),
            ProtocolError::ChunkDecode(ChunkDecodeError::Io(error)) => Some(error.kind()),
            ProtocolError::ChunkDecode(ChunkDecodeError::Buffer(BufferError::Io(error))) => {
                Some(error.kind())
            }
            ProtocolError::ChunkEncode(ChunkEncodeError::Io(error)) => Some(error.kind()),
            ProtocolError::PacketDecode(PacketDecodeError::Io(error)) => Some(error.kind()),
            ProtocolError::PacketEncode(PacketEncodeError::Io(error)) => Some(error.kind()),
            ProtocolError::Handshake(HandshakeError::Io(error)) => Some(error.kind()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_signals_are_recognised() {
        assert!(ProtocolError::StreamClosed.is_system_control());
        assert!(ProtocolError::Republish.is_system_control());
        assert!(!ProtocolError::IdentifyRetriesExceeded.is_system_control());
    }

    #[test]
    fn timeouts_and_graceful_closes_are_distinguished() {
        let timeout = ProtocolError::Io(io::Error::new(io::ErrorKind::TimedOut, "t"));
        assert!(timeout.is_timeout());
        assert!(!timeout.is_client_gracefully_close());

        let reset = ProtocolError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "r"));
        assert!(reset.is_client_gracefully_close());
        assert!(!reset.is_timeout());
    }

    #[test]
    fn nested_io_errors_are_inspected() {
        let nested = ProtocolError::ChunkDecode(ChunkDecodeError::Buffer(BufferError::Io(
            io::Error::new(io::ErrorKind::UnexpectedEof, "eof"),
        )));
        assert!(nested.is_client_gracefully_close());
    }
}
