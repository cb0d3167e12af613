//! An implementation of the RTMP message layer: the chunk-stream codec that
//! multiplexes messages over a byte stream, the AMF0 command packets that
//! form the control dialogue, and the client/server state machines driving
//! the connect → createStream → play/publish exchanges.
//!
//! The crate never opens sockets. Sessions run against anything
//! implementing [`transport::ReaderWriter`]; the crate ships an in-process
//! [`transport::MemoryTransport`] pair for tests and embedding. The
//! cryptographic (digest) handshake variant is out of scope: the handshake
//! module exchanges the plain fixed-size blobs and exposes the same blob
//! boundaries a digest implementation would use.
//!
//! Layering, bottom up:
//!
//! - [`cursor`] / [`buffer`]: bounded typed reads and the transport-fed
//!   inbound buffer
//! - [`chunk`]: chunks ↔ whole messages, both directions
//! - [`packets`]: message payloads ↔ typed command/control packets
//! - [`session`]: the protocol engine plus the client and server roles

pub mod buffer;
pub mod chunk;
pub mod cursor;
pub mod handshake;
pub mod messages;
pub mod packets;
pub mod session;
pub mod time;
pub mod transport;
