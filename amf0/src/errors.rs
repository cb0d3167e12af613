use std::{io, string};
use thiserror::Error;

/// The ways reading AMF0 encoded bytes can fail.
#[derive(Debug, Error)]
pub enum Amf0DecodeError {
    /// A type marker that this codec does not understand.
    #[error("encountered unknown AMF0 marker: 0x{marker:02x}")]
    UnknownMarker { marker: u8 },

    /// An object property with an empty name that was not followed by the
    /// object-end marker.
    #[error("object property with an empty name was not the object terminator")]
    UnexpectedEmptyPropertyName,

    /// The byte stream ended in the middle of a value.
    #[error("hit the end of the input but expected more AMF0 data")]
    UnexpectedEof,

    #[error("failed to read from the input: {0}")]
    Io(#[from] io::Error),

    #[error("string field was not valid utf8: {0}")]
    InvalidUtf8(#[from] string::FromUtf8Error),
}

/// The ways writing values as AMF0 can fail.
#[derive(Debug, Error)]
pub enum Amf0EncodeError {
    /// Normal (short) AMF0 strings carry a u16 length prefix.
    #[error("string length exceeds 65,535 bytes")]
    StringTooLong,

    #[error("failed to write to the output: {0}")]
    Io(#[from] io::Error),
}
