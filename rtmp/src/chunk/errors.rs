use std::io;
use thiserror::Error;

use crate::buffer::BufferError;

/// The ways ingesting RTMP chunks can fail. All of these are fatal to the
/// session; the decoder state cannot be trusted afterwards.
#[derive(Debug, Error)]
pub enum ChunkDecodeError {
    /// A compressed header arrived where only a full header is valid: the
    /// first chunk ever seen on a chunk stream, or a fmt 0-2 header in the
    /// middle of an accumulating message.
    #[error("chunk with fmt {fmt} on csid {cid} where a fmt 0 chunk boundary was required")]
    ChunkStart { cid: u32, fmt: u8 },

    /// The peer requested a chunk size outside [128, 65536].
    #[error("peer requested invalid chunk size {size}")]
    InvalidChunkSize { size: u32 },

    /// A message header announced a payload larger than this session allows.
    #[error("message of {size} bytes exceeds the {max} byte limit")]
    MessageTooLarge { size: u32, max: u32 },

    #[error("{0}")]
    Buffer(#[from] BufferError),

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// The ways emitting RTMP chunks can fail.
#[derive(Debug, Error)]
pub enum ChunkEncodeError {
    /// Message payloads are capped by the 3-byte length field at 16,777,215
    /// bytes regardless of chunking.
    #[error("message of {size} bytes cannot be represented in a chunk header")]
    MessageTooLong { size: usize },

    /// Outgoing chunk sizes follow the same [128, 65536] bounds as inbound.
    #[error("attempted to set invalid chunk size {size}")]
    InvalidChunkSize { size: u32 },

    #[error("{0}")]
    Io(#[from] io::Error),
}
