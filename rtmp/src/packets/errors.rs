use std::io;
use thiserror::Error;

use riptide_amf0::{Amf0DecodeError, Amf0EncodeError};

/// The ways turning message payload bytes into a typed packet can fail.
#[derive(Debug, Error)]
pub enum PacketDecodeError {
    /// A packet was expected but the message carried no payload at all.
    #[error("message carried an empty payload where a packet was expected")]
    EmptyPayload,

    /// The bytes or AMF0 values did not have the shape the packet requires.
    #[error("the message was not encoded in the expected format")]
    InvalidMessageFormat,

    /// A `_result`/`_error` arrived for a transaction id this session never
    /// sent, so there is no way to know how to decode the response body.
    #[error("no outstanding request matches transaction id {transaction_id}")]
    NoMatchingRequest { transaction_id: f64 },

    #[error("the payload did not contain valid AMF0 values: {0}")]
    Amf0(#[from] Amf0DecodeError),

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// The ways serializing a typed packet can fail.
#[derive(Debug, Error)]
pub enum PacketEncodeError {
    #[error("the packet fields could not be encoded as AMF0: {0}")]
    Amf0(#[from] Amf0EncodeError),

    #[error("{0}")]
    Io(#[from] io::Error),
}
