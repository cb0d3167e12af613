//! Decoding of AMF0 command payloads into typed packets.
//!
//! Every command starts with the command name and a transaction id; the
//! shape of the rest depends on the name. `_result`/`_error` responses are
//! unlabeled, so the transaction table is consulted to recover the request
//! they answer. Values trailing the fields a packet defines are left unread.

use riptide_amf0::{decode_value, Amf0Value};
use std::collections::HashMap;
use std::io::Read;

use super::errors::PacketDecodeError;
use super::{PublishType, RtmpPacket, TransactionTable};

pub fn decode_command<R: Read>(
    reader: &mut R,
    requests: &mut TransactionTable,
) -> Result<Option<RtmpPacket>, PacketDecodeError> {
    let command_name = expect_string(next_value(reader)?)?;
    let transaction_id = expect_number(next_value(reader)?)?;

    let packet = match command_name.as_str() {
        "connect" => {
            let command_object = expect_object(next_value(reader)?)?;
            let args = match decode_value(reader)? {
                Some(Amf0Value::Object(properties)) => Some(properties),
                _ => None,
            };

            RtmpPacket::Connect {
                transaction_id,
                command_object,
                args,
            }
        }

        "createStream" => RtmpPacket::CreateStream { transaction_id },

        "closeStream" => RtmpPacket::CloseStream { transaction_id },

        "play" => {
            skip_command_object(reader)?;
            let stream_name = expect_string(next_value(reader)?)?;
            let start = optional_number(reader)?.unwrap_or(-2.0);
            let duration = optional_number(reader)?.unwrap_or(-1.0);
            let reset = match decode_value(reader)? {
                Some(Amf0Value::Boolean(reset)) => reset,
                Some(Amf0Value::Number(number)) => number != 0.0,
                _ => true,
            };

            RtmpPacket::Play {
                transaction_id,
                stream_name,
                start,
                duration,
                reset,
            }
        }

        "pause" => {
            skip_command_object(reader)?;
            let is_pause = match next_value(reader)? {
                Amf0Value::Boolean(is_pause) => is_pause,
                _ => return Err(PacketDecodeError::InvalidMessageFormat),
            };
            let time_ms = expect_number(next_value(reader)?)?;

            RtmpPacket::Pause {
                transaction_id,
                is_pause,
                time_ms,
            }
        }

        "publish" => {
            skip_command_object(reader)?;
            let stream_name = expect_string(next_value(reader)?)?;
            let publish_type = match decode_value(reader)? {
                Some(Amf0Value::Utf8String(value)) => PublishType::from_wire(&value)
                    .ok_or(PacketDecodeError::InvalidMessageFormat)?,
                _ => PublishType::Live,
            };

            RtmpPacket::Publish {
                transaction_id,
                stream_name,
                publish_type,
            }
        }

        "releaseStream" | "FCPublish" | "FCUnpublish" => {
            skip_command_object(reader)?;
            let stream_name = expect_string(next_value(reader)?)?;

            RtmpPacket::FmleStart {
                command_name,
                transaction_id,
                stream_name,
            }
        }

        "onStatus" => {
            skip_command_object(reader)?;
            let data = expect_object(next_value(reader)?)?;

            RtmpPacket::OnStatus {
                transaction_id,
                data,
            }
        }

        "onBWDone" => RtmpPacket::OnBwDone,

        "_result" | "_error" => {
            return decode_response(reader, transaction_id, requests).map(Some)
        }

        // Any other command is a generic RPC; keep the pieces so callers
        // can route it themselves.
        _ => {
            let command_object = decode_value(reader)?.unwrap_or(Amf0Value::Null);
            let mut arguments = Vec::new();
            while let Some(value) = decode_value(reader)? {
                arguments.push(value);
            }

            RtmpPacket::Call {
                command_name,
                transaction_id,
                command_object,
                arguments,
            }
        }
    };

    Ok(Some(packet))
}

fn decode_response<R: Read>(
    reader: &mut R,
    transaction_id: f64,
    requests: &mut TransactionTable,
) -> Result<RtmpPacket, PacketDecodeError> {
    let request_name = requests
        .take(transaction_id)
        .ok_or(PacketDecodeError::NoMatchingRequest { transaction_id })?;

    let packet = match request_name.as_str() {
        "connect" => {
            let props = expect_object(next_value(reader)?)?;
            let info = expect_object(next_value(reader)?)?;

            RtmpPacket::ConnectRes {
                transaction_id,
                props,
                info,
            }
        }

        "createStream" => {
            skip_command_object(reader)?;
            let stream_id = expect_number(next_value(reader)?)?;

            RtmpPacket::CreateStreamRes {
                transaction_id,
                stream_id,
            }
        }

        "releaseStream" | "FCPublish" | "FCUnpublish" => {
            RtmpPacket::FmleStartRes { transaction_id }
        }

        _ => {
            let command_object = decode_value(reader)?.unwrap_or(Amf0Value::Null);
            let response = decode_value(reader)?.unwrap_or(Amf0Value::Null);

            RtmpPacket::CallRes {
                transaction_id,
                command_object,
                response,
            }
        }
    };

    Ok(packet)
}

fn next_value<R: Read>(reader: &mut R) -> Result<Amf0Value, PacketDecodeError> {
    decode_value(reader)?.ok_or(PacketDecodeError::InvalidMessageFormat)
}

fn expect_string(value: Amf0Value) -> Result<String, PacketDecodeError> {
    match value {
        Amf0Value::Utf8String(value) => Ok(value),
        _ => Err(PacketDecodeError::InvalidMessageFormat),
    }
}

fn expect_number(value: Amf0Value) -> Result<f64, PacketDecodeError> {
    match value {
        Amf0Value::Number(value) => Ok(value),
        _ => Err(PacketDecodeError::InvalidMessageFormat),
    }
}

fn expect_object(
    value: Amf0Value,
) -> Result<HashMap<String, Amf0Value>, PacketDecodeError> {
    match value {
        Amf0Value::Object(properties) => Ok(properties),
        _ => Err(PacketDecodeError::InvalidMessageFormat),
    }
}

/// Commands carry a command-information slot that is Null for everything
/// the stream layer cares about; it is read and discarded whatever it is.
fn skip_command_object<R: Read>(reader: &mut R) -> Result<(), PacketDecodeError> {
    let _ = decode_value(reader)?;
    Ok(())
}

fn optional_number<R: Read>(reader: &mut R) -> Result<Option<f64>, PacketDecodeError> {
    match decode_value(reader)? {
        Some(Amf0Value::Number(value)) => Ok(Some(value)),
        _ => Ok(None),
    }
}
