//! Session state machines for the two sides of an RTMP connection.
//!
//! `Protocol` is the shared engine (receive loop, ack windows, transaction
//! correlation, auto-responses); `ClientSession` and `ServerSession` layer
//! the role-specific dialogues on top of it. Both roles own their
//! transport; nothing here is shared between sessions.

mod client;
mod errors;
mod protocol;
mod request;
mod server;

pub use client::{ClientConfig, ClientSession, ClientState, ServerInfo};
pub use errors::ProtocolError;
pub use protocol::{AckWindow, Protocol};
pub use request::{Request, DEFAULT_RTMP_PORT};
pub use server::{
    status_object, ConnType, IdentifiedClient, ServerConfig, ServerSession,
};
