//! Reading AMF0 encoded bytes back into `Amf0Value`s.

use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Read;

use crate::errors::Amf0DecodeError;
use crate::{markers, Amf0Value};

/// Decodes every value remaining in the reader.
pub fn decode<R: Read>(bytes: &mut R) -> Result<Vec<Amf0Value>, Amf0DecodeError> {
    let mut values = Vec::new();
    while let Some(value) = decode_value(bytes)? {
        values.push(value);
    }

    Ok(values)
}

/// Decodes a single value, or `None` once the reader is exhausted.
///
/// Callers that only care about the leading values of a payload (command
/// name, transaction id, ...) can stop calling and leave trailing fields
/// unread.
pub fn decode_value<R: Read>(bytes: &mut R) -> Result<Option<Amf0Value>, Amf0DecodeError> {
    let mut marker = [0_u8; 1];
    if bytes.read(&mut marker)? == 0 {
        return Ok(None);
    }

    let value = match marker[0] {
        markers::NUMBER => Amf0Value::Number(bytes.read_f64::<BigEndian>()?),
        markers::BOOLEAN => Amf0Value::Boolean(bytes.read_u8()? != 0),
        markers::STRING => Amf0Value::Utf8String(read_utf8(bytes)?),
        markers::OBJECT => Amf0Value::Object(read_properties(bytes)?),
        markers::NULL => Amf0Value::Null,
        markers::UNDEFINED => Amf0Value::Undefined,
        markers::OBJECT_END => return Ok(None),

        markers::ECMA_ARRAY => {
            // The associative count is advisory; encoders in the wild always
            // terminate with the same empty-name + object-end sequence that
            // plain objects use, so read it exactly like an object.
            let _count = bytes.read_u32::<BigEndian>()?;
            Amf0Value::Object(read_properties(bytes)?)
        }

        markers::STRICT_ARRAY => {
            let count = bytes.read_u32::<BigEndian>()?;
            let mut values = Vec::with_capacity(count.min(1024) as usize);
            for _ in 0..count {
                match decode_value(bytes)? {
                    Some(value) => values.push(value),
                    None => break,
                }
            }
            Amf0Value::StrictArray(values)
        }

        marker => return Err(Amf0DecodeError::UnknownMarker { marker }),
    };

    Ok(Some(value))
}

fn read_utf8<R: Read>(bytes: &mut R) -> Result<String, Amf0DecodeError> {
    let length = bytes.read_u16::<BigEndian>()?;
    let mut buffer = vec![0_u8; length as usize];
    bytes.read_exact(&mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

fn read_properties<R: Read>(
    bytes: &mut R,
) -> Result<HashMap<String, Amf0Value>, Amf0DecodeError> {
    let mut properties = HashMap::new();

    loop {
        let name = read_utf8(bytes)?;
        if name.is_empty() {
            if bytes.read_u8()? != markers::OBJECT_END {
                return Err(Amf0DecodeError::UnexpectedEmptyPropertyName);
            }

            return Ok(properties);
        }

        match decode_value(bytes)? {
            Some(value) => properties.insert(name, value),
            None => return Err(Amf0DecodeError::UnexpectedEof),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode;
    use std::io::Cursor;

    #[test]
    fn decodes_what_encode_produces() {
        let mut properties = HashMap::new();
        properties.insert("app".to_string(), Amf0Value::Utf8String("live".to_string()));
        properties.insert("objectEncoding".to_string(), Amf0Value::Number(0.0));

        let values = vec![
            Amf0Value::Utf8String("connect".to_string()),
            Amf0Value::Number(1.0),
            Amf0Value::Object(properties),
            Amf0Value::Boolean(true),
            Amf0Value::Null,
            Amf0Value::Undefined,
            Amf0Value::StrictArray(vec![Amf0Value::Number(2.0)]),
        ];

        let bytes = encode(&values).unwrap();
        let decoded = decode(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn decodes_ecma_array_as_object() {
        let mut bytes = vec![markers::ECMA_ARRAY, 0, 0, 0, 1];
        bytes.extend_from_slice(&[0, 4]);
        bytes.extend_from_slice(b"code");
        bytes.push(markers::STRING);
        bytes.extend_from_slice(&[0, 2]);
        bytes.extend_from_slice(b"ok");
        bytes.extend_from_slice(&[0, 0, markers::OBJECT_END]);

        let decoded = decode(&mut Cursor::new(bytes)).unwrap();

        let mut expected = HashMap::new();
        expected.insert("code".to_string(), Amf0Value::Utf8String("ok".to_string()));
        assert_eq!(decoded, vec![Amf0Value::Object(expected)]);
    }

    #[test]
    fn decode_value_stops_at_end_of_input() {
        let bytes = encode(&[Amf0Value::Number(9.0)]).unwrap();
        let mut cursor = Cursor::new(bytes);

        assert_eq!(decode_value(&mut cursor).unwrap(), Some(Amf0Value::Number(9.0)));
        assert_eq!(decode_value(&mut cursor).unwrap(), None);
    }

    #[test]
    fn unknown_marker_is_an_error() {
        let mut cursor = Cursor::new(vec![0x42_u8]);
        match decode(&mut cursor) {
            Err(Amf0DecodeError::UnknownMarker { marker: 0x42 }) => (),
            other => panic!("expected UnknownMarker, got {:?}", other),
        }
    }

    #[test]
    fn object_missing_terminator_is_an_error() {
        // object marker, property name "a", number value, then empty name
        // followed by a non-terminator byte
        let mut bytes = vec![markers::OBJECT, 0, 1, b'a', markers::NULL, 0, 0, markers::NUMBER];
        bytes.extend_from_slice(&[0; 8]);

        match decode(&mut Cursor::new(bytes)) {
            Err(Amf0DecodeError::UnexpectedEmptyPropertyName) => (),
            other => panic!("expected UnexpectedEmptyPropertyName, got {:?}", other),
        }
    }

    #[test]
    fn truncated_string_is_an_io_error() {
        let bytes = vec![markers::STRING, 0, 5, b'a', b'b'];
        assert!(decode(&mut Cursor::new(bytes)).is_err());
    }
}
