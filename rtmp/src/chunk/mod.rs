//! The RTMP chunk-stream framer.
//!
//! `ChunkDecoder` turns the inbound byte stream into whole messages,
//! folding compressed (fmt 1-3) headers against the per-chunk-stream state
//! they reference. `ChunkEncoder` splits outbound messages into chunks
//! sized to the outgoing chunk size and gathers them into vectored writes.
//!
//! Both directions start at the protocol default chunk size of 128 bytes
//! and are retuned at runtime by SetChunkSize messages.

mod decoder;
mod encoder;
mod errors;

pub use decoder::ChunkDecoder;
pub use encoder::ChunkEncoder;
pub use errors::{ChunkDecodeError, ChunkEncodeError};

/// Both directions start at this chunk size until a SetChunkSize arrives.
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// The smallest chunk size a peer may set.
pub const MIN_CHUNK_SIZE: u32 = 128;

/// The largest chunk size a peer may set.
pub const MAX_CHUNK_SIZE: u32 = 65536;

/// Valid chunk stream ids occupy [2, 65599]; 0 and 1 are header escapes.
pub const MIN_CID: u32 = 2;
pub const MAX_CID: u32 = 65599;

/// A message payload can never exceed the 3-byte length field.
pub const MAX_MESSAGE_SIZE: u32 = 0xff_ff_ff;
