//! Writing `Amf0Value`s out as AMF0 encoded bytes.

use byteorder::{BigEndian, WriteBytesExt};
use std::collections::HashMap;

use crate::errors::Amf0EncodeError;
use crate::{markers, Amf0Value};

/// Encodes the values, in order, into a freshly allocated byte vector.
pub fn encode(values: &[Amf0Value]) -> Result<Vec<u8>, Amf0EncodeError> {
    let mut bytes = Vec::with_capacity(values.iter().map(Amf0Value::encoded_size).sum());
    for value in values {
        encode_value(value, &mut bytes)?;
    }

    Ok(bytes)
}

/// Encodes a single value onto the end of the buffer.
pub fn encode_value(value: &Amf0Value, bytes: &mut Vec<u8>) -> Result<(), Amf0EncodeError> {
    match value {
        Amf0Value::Number(number) => {
            bytes.push(markers::NUMBER);
            bytes.write_f64::<BigEndian>(*number)?;
        }

        Amf0Value::Boolean(boolean) => {
            bytes.push(markers::BOOLEAN);
            bytes.push(*boolean as u8);
        }

        Amf0Value::Utf8String(string) => {
            bytes.push(markers::STRING);
            write_utf8(string, bytes)?;
        }

        Amf0Value::Object(properties) => {
            bytes.push(markers::OBJECT);
            write_properties(properties, bytes)?;
        }

        Amf0Value::StrictArray(values) => {
            bytes.push(markers::STRICT_ARRAY);
            bytes.write_u32::<BigEndian>(values.len() as u32)?;
            for value in values {
                encode_value(value, bytes)?;
            }
        }

        Amf0Value::Null => bytes.push(markers::NULL),
        Amf0Value::Undefined => bytes.push(markers::UNDEFINED),
    }

    Ok(())
}

fn write_utf8(string: &str, bytes: &mut Vec<u8>) -> Result<(), Amf0EncodeError> {
    if string.len() > u16::MAX as usize {
        return Err(Amf0EncodeError::StringTooLong);
    }

    bytes.write_u16::<BigEndian>(string.len() as u16)?;
    bytes.extend_from_slice(string.as_bytes());
    Ok(())
}

fn write_properties(
    properties: &HashMap<String, Amf0Value>,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0EncodeError> {
    for (name, value) in properties {
        write_utf8(name, bytes)?;
        encode_value(value, bytes)?;
    }

    // empty property name followed by the object-end marker
    bytes.write_u16::<BigEndian>(0)?;
    bytes.push(markers::OBJECT_END);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, WriteBytesExt};

    #[test]
    fn encodes_number() {
        let bytes = encode(&[Amf0Value::Number(522.0)]).unwrap();

        let mut expected = vec![markers::NUMBER];
        expected.write_f64::<BigEndian>(522.0).unwrap();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn encodes_booleans() {
        assert_eq!(
            encode(&[Amf0Value::Boolean(true)]).unwrap(),
            vec![markers::BOOLEAN, 1]
        );
        assert_eq!(
            encode(&[Amf0Value::Boolean(false)]).unwrap(),
            vec![markers::BOOLEAN, 0]
        );
    }

    #[test]
    fn encodes_string_with_length_prefix() {
        let bytes = encode(&[Amf0Value::Utf8String("app".to_string())]).unwrap();
        assert_eq!(bytes, vec![markers::STRING, 0, 3, b'a', b'p', b'p']);
    }

    #[test]
    fn encodes_null_and_undefined_as_bare_markers() {
        assert_eq!(encode(&[Amf0Value::Null]).unwrap(), vec![markers::NULL]);
        assert_eq!(
            encode(&[Amf0Value::Undefined]).unwrap(),
            vec![markers::UNDEFINED]
        );
    }

    #[test]
    fn encodes_object_with_terminator() {
        let mut properties = HashMap::new();
        properties.insert("id".to_string(), Amf0Value::Number(1.0));

        let bytes = encode(&[Amf0Value::Object(properties)]).unwrap();

        let mut expected = vec![markers::OBJECT, 0, 2, b'i', b'd', markers::NUMBER];
        expected.write_f64::<BigEndian>(1.0).unwrap();
        expected.extend_from_slice(&[0, 0, markers::OBJECT_END]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn encodes_strict_array_with_count() {
        let bytes = encode(&[Amf0Value::StrictArray(vec![Amf0Value::Null, Amf0Value::Null])]).unwrap();
        assert_eq!(
            bytes,
            vec![markers::STRICT_ARRAY, 0, 0, 0, 2, markers::NULL, markers::NULL]
        );
    }

    #[test]
    fn rejects_string_longer_than_u16() {
        let long = "a".repeat(u16::MAX as usize + 1);
        match encode(&[Amf0Value::Utf8String(long)]) {
            Err(Amf0EncodeError::StringTooLong) => (),
            other => panic!("expected StringTooLong, got {:?}", other),
        }
    }
}
