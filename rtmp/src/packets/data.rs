//! Decoding of AMF0 data payloads (onStatus data, sample access, stream
//! metadata).

use riptide_amf0::{decode_value, Amf0Value};
use std::io::Read;

use super::errors::PacketDecodeError;
use super::RtmpPacket;

pub fn decode_data<R: Read>(reader: &mut R) -> Result<Option<RtmpPacket>, PacketDecodeError> {
    let name = match decode_value(reader)? {
        Some(Amf0Value::Utf8String(name)) => name,
        _ => return Ok(None),
    };

    match name.as_str() {
        // FMLE wraps the metadata in @setDataFrame("onMetaData", {...});
        // other encoders send bare onMetaData({...}).
        "@setDataFrame" => {
            match decode_value(reader)? {
                Some(Amf0Value::Utf8String(inner)) if inner == "onMetaData" => (),
                _ => return Ok(None),
            }

            decode_metadata(reader)
        }

        "onMetaData" => decode_metadata(reader),

        "|RtmpSampleAccess" => {
            let video_access = expect_boolean(reader)?;
            let audio_access = expect_boolean(reader)?;

            Ok(Some(RtmpPacket::SampleAccess {
                video_access,
                audio_access,
            }))
        }

        "onStatus" => match decode_value(reader)? {
            Some(Amf0Value::Object(data)) => Ok(Some(RtmpPacket::OnStatusData { data })),
            _ => Err(PacketDecodeError::InvalidMessageFormat),
        },

        _ => Ok(None),
    }
}

fn decode_metadata<R: Read>(reader: &mut R) -> Result<Option<RtmpPacket>, PacketDecodeError> {
    match decode_value(reader)? {
        Some(Amf0Value::Object(metadata)) => Ok(Some(RtmpPacket::OnMetaData {
            name: "onMetaData".to_string(),
            metadata,
        })),
        _ => Err(PacketDecodeError::InvalidMessageFormat),
    }
}

fn expect_boolean<R: Read>(reader: &mut R) -> Result<bool, PacketDecodeError> {
    match decode_value(reader)? {
        Some(Amf0Value::Boolean(value)) => Ok(value),
        _ => Err(PacketDecodeError::InvalidMessageFormat),
    }
}
