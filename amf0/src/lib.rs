//! Serialization and deserialization of values encoded with Adobe's AMF0
//! specification, as used by the RTMP command layer.
//!
//! # Examples
//! ```
//! use std::collections::HashMap;
//! use std::io::Cursor;
//! use riptide_amf0::{encode, decode, Amf0Value};
//!
//! let mut command_object = HashMap::new();
//! command_object.insert("app".to_string(), Amf0Value::Utf8String("live".to_string()));
//!
//! let values = vec![
//!     Amf0Value::Utf8String("connect".to_string()),
//!     Amf0Value::Number(1.0),
//!     Amf0Value::Object(command_object),
//! ];
//!
//! let bytes = encode(&values).unwrap();
//! let decoded = decode(&mut Cursor::new(bytes)).unwrap();
//! assert_eq!(values, decoded);
//! ```

mod decode;
mod encode;
mod errors;

pub use decode::{decode, decode_value};
pub use encode::{encode, encode_value};
pub use errors::{Amf0DecodeError, Amf0EncodeError};

use std::collections::HashMap;

/// A single value in the AMF0 type system.
///
/// ECMA arrays are decoded into `Object` since they carry the same
/// string-keyed properties and real-world encoders terminate them the same
/// way.
#[derive(PartialEq, Debug, Clone)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    Utf8String(String),
    Object(HashMap<String, Amf0Value>),
    StrictArray(Vec<Amf0Value>),
    Null,
    Undefined,
}

impl Amf0Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::Utf8String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, Amf0Value>> {
        match self {
            Amf0Value::Object(properties) => Some(properties),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<HashMap<String, Amf0Value>> {
        match self {
            Amf0Value::Object(properties) => Some(properties),
            _ => None,
        }
    }

    /// The number of bytes this value occupies on the wire, marker included.
    pub fn encoded_size(&self) -> usize {
        match self {
            Amf0Value::Number(_) => 1 + 8,
            Amf0Value::Boolean(_) => 1 + 1,
            Amf0Value::Utf8String(value) => 1 + 2 + value.len(),
            Amf0Value::Null | Amf0Value::Undefined => 1,
            Amf0Value::StrictArray(values) => {
                1 + 4 + values.iter().map(Amf0Value::encoded_size).sum::<usize>()
            }
            Amf0Value::Object(properties) => {
                let properties_size: usize = properties
                    .iter()
                    .map(|(name, value)| 2 + name.len() + value.encoded_size())
                    .sum();

                // marker + properties + empty utf8 + object end marker
                1 + properties_size + 2 + 1
            }
        }
    }
}

pub(crate) mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0a;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_size_matches_encoded_length() {
        let mut properties = HashMap::new();
        properties.insert(
            "code".to_string(),
            Amf0Value::Utf8String("NetStream.Play.Start".to_string()),
        );
        properties.insert("duration".to_string(), Amf0Value::Number(0.0));
        properties.insert("reset".to_string(), Amf0Value::Boolean(false));

        let values = vec![
            Amf0Value::Utf8String("onStatus".to_string()),
            Amf0Value::Number(0.0),
            Amf0Value::Null,
            Amf0Value::Object(properties),
            Amf0Value::StrictArray(vec![Amf0Value::Number(1.0), Amf0Value::Undefined]),
        ];

        let bytes = encode(&values).unwrap();
        let total: usize = values.iter().map(Amf0Value::encoded_size).sum();
        assert_eq!(bytes.len(), total);
    }

    #[test]
    fn accessors_return_expected_variants() {
        assert_eq!(Amf0Value::Number(5.0).as_number(), Some(5.0));
        assert_eq!(Amf0Value::Boolean(true).as_boolean(), Some(true));
        assert_eq!(Amf0Value::Utf8String("x".to_string()).as_str(), Some("x"));
        assert_eq!(Amf0Value::Null.as_number(), None);
        assert!(Amf0Value::Object(HashMap::new()).as_object().is_some());
    }
}
