//! Typed packets: the translation layer between opaque message payloads and
//! the command dialogue.
//!
//! Every packet knows the chunk stream it prefers, its message type id, its
//! encoded size, and how to encode itself; decoding dispatches on the
//! message type and, for `_result`/`_error` responses, on the transaction
//! table of requests this session has sent.

mod commands;
mod control;
mod data;
mod errors;

pub use errors::{PacketDecodeError, PacketEncodeError};

use bytes::Bytes;
use riptide_amf0::Amf0Value;
use std::collections::{HashMap, VecDeque};

use crate::cursor::ByteCursor;
use crate::messages::{cid, msg_type, CommonMessage, MessageHeader, SharedMessage};
use crate::time::RtmpTimestamp;

/// Server signature constants advertised in the connect response.
pub mod sig {
    pub const FMS_VERSION: &str = "3,5,3,888";
    pub const AMF0_VERSION: f64 = 0.0;
    pub const CLIENT_ID_LENGTH: usize = 8;
}

/// onStatus property names and the codes this layer emits.
pub mod status {
    pub const LEVEL: &str = "level";
    pub const CODE: &str = "code";
    pub const DESCRIPTION: &str = "description";
    pub const CLIENT_ID: &str = "clientid";

    pub const LEVEL_STATUS: &str = "status";
    pub const LEVEL_ERROR: &str = "error";

    pub const CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
    pub const CONNECT_REJECTED: &str = "NetConnection.Connect.Rejected";
    pub const PLAY_RESET: &str = "NetStream.Play.Reset";
    pub const PLAY_START: &str = "NetStream.Play.Start";
    pub const PAUSE_NOTIFY: &str = "NetStream.Pause.Notify";
    pub const UNPAUSE_NOTIFY: &str = "NetStream.Unpause.Notify";
    pub const PUBLISH_START: &str = "NetStream.Publish.Start";
    pub const DATA_START: &str = "NetStream.Data.Start";
    pub const UNPUBLISH_SUCCESS: &str = "NetStream.Unpublish.Success";
}

/// User control event types, with their u16 wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserControlEvent {
    StreamBegin,
    StreamEof,
    StreamDry,
    SetBufferLength,
    StreamIsRecorded,
    PingRequest,
    PingResponse,
    /// FMS-defined event 0x1a, carrying a single data byte.
    FmsEvent0,
}

impl UserControlEvent {
    pub fn to_wire(self) -> u16 {
        match self {
            UserControlEvent::StreamBegin => 0x00,
            UserControlEvent::StreamEof => 0x01,
            UserControlEvent::StreamDry => 0x02,
            UserControlEvent::SetBufferLength => 0x03,
            UserControlEvent::StreamIsRecorded => 0x04,
            UserControlEvent::PingRequest => 0x06,
            UserControlEvent::PingResponse => 0x07,
            UserControlEvent::FmsEvent0 => 0x1a,
        }
    }

    pub fn from_wire(value: u16) -> Option<UserControlEvent> {
        match value {
            0x00 => Some(UserControlEvent::StreamBegin),
            0x01 => Some(UserControlEvent::StreamEof),
            0x02 => Some(UserControlEvent::StreamDry),
            0x03 => Some(UserControlEvent::SetBufferLength),
            0x04 => Some(UserControlEvent::StreamIsRecorded),
            0x06 => Some(UserControlEvent::PingRequest),
            0x07 => Some(UserControlEvent::PingResponse),
            0x1a => Some(UserControlEvent::FmsEvent0),
            _ => None,
        }
    }
}

/// SetPeerBandwidth limit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PeerBandwidthLimit {
    Hard = 0,
    Soft = 1,
    Dynamic = 2,
}

/// The publishing modes a publish command can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishType {
    Live,
    Record,
    Append,
}

impl PublishType {
    pub fn to_wire(self) -> &'static str {
        match self {
            PublishType::Live => "live",
            PublishType::Record => "record",
            PublishType::Append => "append",
        }
    }

    pub fn from_wire(value: &str) -> Option<PublishType> {
        match value {
            "live" => Some(PublishType::Live),
            "record" => Some(PublishType::Record),
            "append" => Some(PublishType::Append),
            _ => None,
        }
    }
}

/// Maps outstanding request transaction ids to the command that opened
/// them, so unlabeled `_result`/`_error` bodies can be decoded. Entries are
/// removed when their response arrives; the table is capped so a peer that
/// never answers cannot grow it without bound.
pub struct TransactionTable {
    entries: HashMap<u64, String>,
    order: VecDeque<u64>,
    capacity: usize,
}

const DEFAULT_TRANSACTION_CAPACITY: usize = 128;

impl TransactionTable {
    pub fn new() -> TransactionTable {
        TransactionTable {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: DEFAULT_TRANSACTION_CAPACITY,
        }
    }

    pub fn insert(&mut self, transaction_id: f64, command_name: &str) {
        let key = transaction_id.to_bits();
        if self.entries.insert(key, command_name.to_string()).is_none() {
            self.order.push_back(key);
        }

        while self.entries.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn take(&mut self, transaction_id: f64) -> Option<String> {
        let key = transaction_id.to_bits();
        let name = self.entries.remove(&key)?;
        self.order.retain(|entry| *entry != key);
        Some(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TransactionTable {
    fn default() -> Self {
        TransactionTable::new()
    }
}

/// Every packet kind the command layer speaks.
#[derive(Debug, Clone, PartialEq)]
pub enum RtmpPacket {
    SetChunkSize {
        chunk_size: u32,
    },
    Acknowledgement {
        sequence_number: u32,
    },
    UserControl {
        event: UserControlEvent,
        event_data: u32,
        extra_data: u32,
    },
    SetWindowAckSize {
        ack_window_size: u32,
    },
    SetPeerBandwidth {
        bandwidth: u32,
        limit_type: PeerBandwidthLimit,
    },
    Connect {
        transaction_id: f64,
        command_object: HashMap<String, Amf0Value>,
        args: Option<HashMap<String, Amf0Value>>,
    },
    ConnectRes {
        transaction_id: f64,
        props: HashMap<String, Amf0Value>,
        info: HashMap<String, Amf0Value>,
    },
    Call {
        command_name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        arguments: Vec<Amf0Value>,
    },
    CallRes {
        transaction_id: f64,
        command_object: Amf0Value,
        response: Amf0Value,
    },
    CreateStream {
        transaction_id: f64,
    },
    CreateStreamRes {
        transaction_id: f64,
        stream_id: f64,
    },
    CloseStream {
        transaction_id: f64,
    },
    /// releaseStream / FCPublish / FCUnpublish: same body, different name.
    FmleStart {
        command_name: String,
        transaction_id: f64,
        stream_name: String,
    },
    FmleStartRes {
        transaction_id: f64,
    },
    Play {
        transaction_id: f64,
        stream_name: String,
        start: f64,
        duration: f64,
        reset: bool,
    },
    Pause {
        transaction_id: f64,
        is_pause: bool,
        time_ms: f64,
    },
    Publish {
        transaction_id: f64,
        stream_name: String,
        publish_type: PublishType,
    },
    OnBwDone,
    /// onStatus in command (call) form.
    OnStatus {
        transaction_id: f64,
        data: HashMap<String, Amf0Value>,
    },
    /// onStatus in data form.
    OnStatusData {
        data: HashMap<String, Amf0Value>,
    },
    SampleAccess {
        video_access: bool,
        audio_access: bool,
    },
    OnMetaData {
        name: String,
        metadata: HashMap<String, Amf0Value>,
    },
}

impl RtmpPacket {
    /// The chunk stream this packet should be sent over.
    pub fn prefer_cid(&self) -> u32 {
        match self {
            RtmpPacket::SetChunkSize { .. }
            | RtmpPacket::Acknowledgement { .. }
            | RtmpPacket::UserControl { .. }
            | RtmpPacket::SetWindowAckSize { .. }
            | RtmpPacket::SetPeerBandwidth { .. } => cid::PROTOCOL_CONTROL,

            RtmpPacket::Play { .. }
            | RtmpPacket::Pause { .. }
            | RtmpPacket::Publish { .. } => cid::OVER_STREAM2,

            RtmpPacket::OnStatus { .. }
            | RtmpPacket::OnStatusData { .. }
            | RtmpPacket::SampleAccess { .. }
            | RtmpPacket::OnMetaData { .. } => cid::OVER_STREAM,

            _ => cid::OVER_CONNECTION,
        }
    }

    /// The message type id this packet is carried in.
    pub fn message_type(&self) -> u8 {
        match self {
            RtmpPacket::SetChunkSize { .. } => msg_type::SET_CHUNK_SIZE,
            RtmpPacket::Acknowledgement { .. } => msg_type::ACKNOWLEDGEMENT,
            RtmpPacket::UserControl { .. } => msg_type::USER_CONTROL,
            RtmpPacket::SetWindowAckSize { .. } => msg_type::WINDOW_ACK_SIZE,
            RtmpPacket::SetPeerBandwidth { .. } => msg_type::SET_PEER_BANDWIDTH,

            RtmpPacket::OnStatusData { .. }
            | RtmpPacket::SampleAccess { .. }
            | RtmpPacket::OnMetaData { .. } => msg_type::AMF0_DATA,

            _ => msg_type::AMF0_COMMAND,
        }
    }

    /// The number of payload bytes `encode` will produce.
    pub fn size(&self) -> usize {
        match self {
            RtmpPacket::SetChunkSize { .. }
            | RtmpPacket::Acknowledgement { .. }
            | RtmpPacket::SetWindowAckSize { .. } => 4,

            RtmpPacket::SetPeerBandwidth { .. } => 5,

            RtmpPacket::UserControl { event, .. } => match event {
                UserControlEvent::FmsEvent0 => 3,
                UserControlEvent::SetBufferLength => 10,
                _ => 6,
            },

            _ => self
                .to_values()
                .iter()
                .map(Amf0Value::encoded_size)
                .sum(),
        }
    }

    /// Serializes the packet into message payload bytes.
    pub fn encode(&self) -> Result<Bytes, PacketEncodeError> {
        let bytes = match self {
            RtmpPacket::SetChunkSize { chunk_size } => {
                control::encode_set_chunk_size(*chunk_size)?
            }
            RtmpPacket::Acknowledgement { sequence_number } => {
                control::encode_acknowledgement(*sequence_number)?
            }
            RtmpPacket::SetWindowAckSize { ack_window_size } => {
                control::encode_window_ack_size(*ack_window_size)?
            }
            RtmpPacket::SetPeerBandwidth {
                bandwidth,
                limit_type,
            } => control::encode_set_peer_bandwidth(*bandwidth, *limit_type)?,
            RtmpPacket::UserControl {
                event,
                event_data,
                extra_data,
            } => control::encode_user_control(*event, *event_data, *extra_data)?,

            _ => riptide_amf0::encode(&self.to_values())?,
        };

        Ok(Bytes::from(bytes))
    }

    /// Packages the packet as a sendable message.
    pub fn into_message(
        self,
        timestamp: RtmpTimestamp,
        stream_id: u32,
    ) -> Result<SharedMessage, PacketEncodeError> {
        let payload = self.encode()?;
        let header = MessageHeader {
            message_type: self.message_type(),
            payload_length: payload.len() as u32,
            timestamp,
            stream_id,
            prefer_cid: self.prefer_cid(),
        };

        Ok(SharedMessage::new(header, payload))
    }

    /// Decodes a message payload into a typed packet.
    ///
    /// `Ok(None)` means the message is not one this codec models (audio,
    /// video, unknown data) and should be skipped or routed elsewhere by
    /// the caller.
    pub fn decode(
        message: &CommonMessage,
        requests: &mut TransactionTable,
    ) -> Result<Option<RtmpPacket>, PacketDecodeError> {
        let header = &message.header;
        let mut payload = &message.payload[..];

        if header.is_command() || header.is_amf0_data() || header.message_type == msg_type::AMF3_DATA
        {
            if payload.is_empty() {
                return Err(PacketDecodeError::EmptyPayload);
            }
        }

        // AMF3 command payloads open with a format byte before plain AMF0
        // values; skip it.
        if header.message_type == msg_type::AMF3_COMMAND && !payload.is_empty() {
            payload = &payload[1..];
        }

        match header.message_type {
            msg_type::AMF0_COMMAND | msg_type::AMF3_COMMAND => {
                commands::decode_command(&mut ByteCursor::new(payload), requests)
            }

            msg_type::AMF0_DATA | msg_type::AMF3_DATA => {
                data::decode_data(&mut ByteCursor::new(payload))
            }

            msg_type::SET_CHUNK_SIZE => control::decode_set_chunk_size(payload).map(Some),
            msg_type::ACKNOWLEDGEMENT => control::decode_acknowledgement(payload).map(Some),
            msg_type::USER_CONTROL => control::decode_user_control(payload).map(Some),
            msg_type::WINDOW_ACK_SIZE => control::decode_window_ack_size(payload).map(Some),
            msg_type::SET_PEER_BANDWIDTH => {
                control::decode_set_peer_bandwidth(payload).map(Some)
            }

            _ => Ok(None),
        }
    }

    /// The transaction id of packets that open a request and expect a
    /// `_result`, along with the command name to remember it under.
    pub fn request_entry(&self) -> Option<(f64, &str)> {
        match self {
            RtmpPacket::Connect { transaction_id, .. } => Some((*transaction_id, "connect")),
            RtmpPacket::CreateStream { transaction_id } => {
                Some((*transaction_id, "createStream"))
            }
            RtmpPacket::FmleStart {
                command_name,
                transaction_id,
                ..
            } => Some((*transaction_id, command_name.as_str())),
            _ => None,
        }
    }

    fn to_values(&self) -> Vec<Amf0Value> {
        match self {
            RtmpPacket::Connect {
                transaction_id,
                command_object,
                args,
            } => {
                let mut values = vec![
                    Amf0Value::Utf8String("connect".to_string()),
                    Amf0Value::Number(*transaction_id),
                    Amf0Value::Object(command_object.clone()),
                ];
                if let Some(args) = args {
                    values.push(Amf0Value::Object(args.clone()));
                }
                values
            }

            RtmpPacket::ConnectRes {
                transaction_id,
                props,
                info,
            } => vec![
                Amf0Value::Utf8String("_result".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Object(props.clone()),
                Amf0Value::Object(info.clone()),
            ],

            RtmpPacket::Call {
                command_name,
                transaction_id,
                command_object,
                arguments,
            } => {
                let mut values = vec![
                    Amf0Value::Utf8String(command_name.clone()),
                    Amf0Value::Number(*transaction_id),
                    command_object.clone(),
                ];
                values.extend(arguments.iter().cloned());
                values
            }

            RtmpPacket::CallRes {
                transaction_id,
                command_object,
                response,
            } => vec![
                Amf0Value::Utf8String("_result".to_string()),
                Amf0Value::Number(*transaction_id),
                command_object.clone(),
                response.clone(),
            ],

            RtmpPacket::CreateStream { transaction_id } => vec![
                Amf0Value::Utf8String("createStream".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
            ],

            RtmpPacket::CreateStreamRes {
                transaction_id,
                stream_id,
            } => vec![
                Amf0Value::Utf8String("_result".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
                Amf0Value::Number(*stream_id),
            ],

            RtmpPacket::CloseStream { transaction_id } => vec![
                Amf0Value::Utf8String("closeStream".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
            ],

            RtmpPacket::FmleStart {
                command_name,
                transaction_id,
                stream_name,
            } => vec![
                Amf0Value::Utf8String(command_name.clone()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
                Amf0Value::Utf8String(stream_name.clone()),
            ],

            RtmpPacket::FmleStartRes { transaction_id } => vec![
                Amf0Value::Utf8String("_result".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
                Amf0Value::Undefined,
            ],

            RtmpPacket::Play {
                transaction_id,
                stream_name,
                start,
                duration,
                reset,
            } => vec![
                Amf0Value::Utf8String("play".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
                Amf0Value::Utf8String(stream_name.clone()),
                Amf0Value::Number(*start),
                Amf0Value::Number(*duration),
                Amf0Value::Boolean(*reset),
            ],

            RtmpPacket::Pause {
                transaction_id,
                is_pause,
                time_ms,
            } => vec![
                Amf0Value::Utf8String("pause".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
                Amf0Value::Boolean(*is_pause),
                Amf0Value::Number(*time_ms),
            ],

            RtmpPacket::Publish {
                transaction_id,
                stream_name,
                publish_type,
            } => vec![
                Amf0Value::Utf8String("publish".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
                Amf0Value::Utf8String(stream_name.clone()),
                Amf0Value::Utf8String(publish_type.to_wire().to_string()),
            ],

            RtmpPacket::OnBwDone => vec![
                Amf0Value::Utf8String("onBWDone".to_string()),
                Amf0Value::Number(0.0),
                Amf0Value::Null,
            ],

            RtmpPacket::OnStatus {
                transaction_id,
                data,
            } => vec![
                Amf0Value::Utf8String("onStatus".to_string()),
                Amf0Value::Number(*transaction_id),
                Amf0Value::Null,
                Amf0Value::Object(data.clone()),
            ],

            RtmpPacket::OnStatusData { data } => vec![
                Amf0Value::Utf8String("onStatus".to_string()),
                Amf0Value::Object(data.clone()),
            ],

            RtmpPacket::SampleAccess {
                video_access,
                audio_access,
            } => vec![
                Amf0Value::Utf8String("|RtmpSampleAccess".to_string()),
                Amf0Value::Boolean(*video_access),
                Amf0Value::Boolean(*audio_access),
            ],

            RtmpPacket::OnMetaData { name, metadata } => vec![
                Amf0Value::Utf8String(name.clone()),
                Amf0Value::Object(metadata.clone()),
            ],

            // Control packets never reach the AMF0 path.
            RtmpPacket::SetChunkSize { .. }
            | RtmpPacket::Acknowledgement { .. }
            | RtmpPacket::UserControl { .. }
            | RtmpPacket::SetWindowAckSize { .. }
            | RtmpPacket::SetPeerBandwidth { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageHeader;

    fn message_for(packet: &RtmpPacket) -> CommonMessage {
        let payload = packet.encode().unwrap();
        let header = MessageHeader {
            message_type: packet.message_type(),
            payload_length: payload.len() as u32,
            timestamp: RtmpTimestamp::new(0),
            stream_id: 0,
            prefer_cid: packet.prefer_cid(),
        };

        CommonMessage::new(header, payload)
    }

    fn round_trip(packet: RtmpPacket, requests: &mut TransactionTable) -> RtmpPacket {
        let message = message_for(&packet);
        assert_eq!(
            message.payload.len(),
            packet.size(),
            "encoded length must equal size() for {:?}",
            packet
        );

        RtmpPacket::decode(&message, requests)
            .unwrap()
            .expect("packet should decode to a typed value")
    }

    fn sample_object() -> HashMap<String, Amf0Value> {
        let mut object = HashMap::new();
        object.insert("app".to_string(), Amf0Value::Utf8String("live".to_string()));
        object.insert("objectEncoding".to_string(), Amf0Value::Number(0.0));
        object
    }

    #[test]
    fn control_packets_round_trip() {
        let mut requests = TransactionTable::new();
        let packets = vec![
            RtmpPacket::SetChunkSize { chunk_size: 4096 },
            RtmpPacket::Acknowledgement {
                sequence_number: 77_000,
            },
            RtmpPacket::SetWindowAckSize {
                ack_window_size: 2_500_000,
            },
            RtmpPacket::SetPeerBandwidth {
                bandwidth: 2_500_000,
                limit_type: PeerBandwidthLimit::Soft,
            },
            RtmpPacket::UserControl {
                event: UserControlEvent::StreamBegin,
                event_data: 1,
                extra_data: 0,
            },
            RtmpPacket::UserControl {
                event: UserControlEvent::SetBufferLength,
                event_data: 1,
                extra_data: 3000,
            },
            RtmpPacket::UserControl {
                event: UserControlEvent::PingRequest,
                event_data: 555,
                extra_data: 0,
            },
        ];

        for packet in packets {
            let decoded = round_trip(packet.clone(), &mut requests);
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn command_packets_round_trip() {
        let mut requests = TransactionTable::new();
        let packets = vec![
            RtmpPacket::Connect {
                transaction_id: 1.0,
                command_object: sample_object(),
                args: None,
            },
            RtmpPacket::Connect {
                transaction_id: 1.0,
                command_object: sample_object(),
                args: Some(sample_object()),
            },
            RtmpPacket::CreateStream { transaction_id: 4.0 },
            RtmpPacket::CloseStream { transaction_id: 0.0 },
            RtmpPacket::Play {
                transaction_id: 0.0,
                stream_name: "livestream".to_string(),
                start: -2.0,
                duration: -1.0,
                reset: true,
            },
            RtmpPacket::Pause {
                transaction_id: 0.0,
                is_pause: true,
                time_ms: 1234.0,
            },
            RtmpPacket::Publish {
                transaction_id: 5.0,
                stream_name: "livestream".to_string(),
                publish_type: PublishType::Live,
            },
            RtmpPacket::FmleStart {
                command_name: "releaseStream".to_string(),
                transaction_id: 2.0,
                stream_name: "livestream".to_string(),
            },
            RtmpPacket::OnStatus {
                transaction_id: 0.0,
                data: sample_object(),
            },
            RtmpPacket::OnBwDone,
        ];

        for packet in packets {
            let decoded = round_trip(packet.clone(), &mut requests);
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn data_packets_round_trip() {
        let mut requests = TransactionTable::new();
        let packets = vec![
            RtmpPacket::OnStatusData {
                data: sample_object(),
            },
            RtmpPacket::SampleAccess {
                video_access: false,
                audio_access: false,
            },
            RtmpPacket::OnMetaData {
                name: "onMetaData".to_string(),
                metadata: sample_object(),
            },
        ];

        for packet in packets {
            let decoded = round_trip(packet.clone(), &mut requests);
            assert_eq!(decoded, packet);
        }
    }

    #[test]
    fn responses_decode_through_the_transaction_table() {
        let mut requests = TransactionTable::new();
        requests.insert(1.0, "connect");
        requests.insert(2.0, "createStream");
        requests.insert(3.0, "releaseStream");

        let connect_res = RtmpPacket::ConnectRes {
            transaction_id: 1.0,
            props: sample_object(),
            info: sample_object(),
        };
        assert_eq!(round_trip(connect_res.clone(), &mut requests), connect_res);

        let create_res = RtmpPacket::CreateStreamRes {
            transaction_id: 2.0,
            stream_id: 1.0,
        };
        assert_eq!(round_trip(create_res.clone(), &mut requests), create_res);

        let fmle_res = RtmpPacket::FmleStartRes { transaction_id: 3.0 };
        assert_eq!(round_trip(fmle_res.clone(), &mut requests), fmle_res);

        assert!(requests.is_empty(), "responses must evict their entries");
    }

    #[test]
    fn response_without_request_fails_with_no_request() {
        let mut requests = TransactionTable::new();
        let response = RtmpPacket::CreateStreamRes {
            transaction_id: 9.0,
            stream_id: 1.0,
        };

        let message = message_for(&response);
        match RtmpPacket::decode(&message, &mut requests) {
            Err(PacketDecodeError::NoMatchingRequest { transaction_id }) => {
                assert_eq!(transaction_id, 9.0)
            }
            other => panic!("expected NoMatchingRequest, got {:?}", other),
        }
    }

    #[test]
    fn set_data_frame_wrapper_decodes_as_metadata() {
        let values = vec![
            Amf0Value::Utf8String("@setDataFrame".to_string()),
            Amf0Value::Utf8String("onMetaData".to_string()),
            Amf0Value::Object(sample_object()),
        ];
        let payload = Bytes::from(riptide_amf0::encode(&values).unwrap());
        let header = MessageHeader {
            message_type: msg_type::AMF0_DATA,
            payload_length: payload.len() as u32,
            timestamp: RtmpTimestamp::new(0),
            stream_id: 1,
            prefer_cid: cid::OVER_STREAM,
        };
        let message = CommonMessage::new(header, payload);

        let mut requests = TransactionTable::new();
        match RtmpPacket::decode(&message, &mut requests).unwrap() {
            Some(RtmpPacket::OnMetaData { name, metadata }) => {
                assert_eq!(name, "onMetaData");
                assert_eq!(metadata, sample_object());
            }
            other => panic!("expected OnMetaData, got {:?}", other),
        }
    }

    #[test]
    fn unknown_command_decodes_as_generic_call() {
        let values = vec![
            Amf0Value::Utf8String("customCall".to_string()),
            Amf0Value::Number(7.0),
            Amf0Value::Null,
            Amf0Value::Number(12.0),
        ];
        let payload = Bytes::from(riptide_amf0::encode(&values).unwrap());
        let header = MessageHeader {
            message_type: msg_type::AMF0_COMMAND,
            payload_length: payload.len() as u32,
            timestamp: RtmpTimestamp::new(0),
            stream_id: 0,
            prefer_cid: cid::OVER_CONNECTION,
        };
        let message = CommonMessage::new(header, payload);

        let mut requests = TransactionTable::new();
        match RtmpPacket::decode(&message, &mut requests).unwrap() {
            Some(RtmpPacket::Call {
                command_name,
                transaction_id,
                arguments,
                ..
            }) => {
                assert_eq!(command_name, "customCall");
                assert_eq!(transaction_id, 7.0);
                assert_eq!(arguments, vec![Amf0Value::Number(12.0)]);
            }
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn trailing_unknown_fields_are_ignored() {
        // publish with extra values after the documented fields
        let values = vec![
            Amf0Value::Utf8String("publish".to_string()),
            Amf0Value::Number(5.0),
            Amf0Value::Null,
            Amf0Value::Utf8String("key".to_string()),
            Amf0Value::Utf8String("live".to_string()),
            Amf0Value::Utf8String("surprise-extra".to_string()),
        ];
        let payload = Bytes::from(riptide_amf0::encode(&values).unwrap());
        let header = MessageHeader {
            message_type: msg_type::AMF0_COMMAND,
            payload_length: payload.len() as u32,
            timestamp: RtmpTimestamp::new(0),
            stream_id: 1,
            prefer_cid: cid::OVER_STREAM2,
        };
        let message = CommonMessage::new(header, payload);

        let mut requests = TransactionTable::new();
        match RtmpPacket::decode(&message, &mut requests).unwrap() {
            Some(RtmpPacket::Publish { stream_name, .. }) => assert_eq!(stream_name, "key"),
            other => panic!("expected Publish, got {:?}", other),
        }
    }

    #[test]
    fn empty_command_payload_is_invalid() {
        let header = MessageHeader {
            message_type: msg_type::AMF0_COMMAND,
            payload_length: 0,
            timestamp: RtmpTimestamp::new(0),
            stream_id: 0,
            prefer_cid: cid::OVER_CONNECTION,
        };
        let message = CommonMessage::new(header, Bytes::new());

        let mut requests = TransactionTable::new();
        assert!(matches!(
            RtmpPacket::decode(&message, &mut requests),
            Err(PacketDecodeError::EmptyPayload)
        ));
    }

    #[test]
    fn audio_and_video_are_not_packets() {
        let header = MessageHeader {
            message_type: msg_type::AUDIO,
            payload_length: 2,
            timestamp: RtmpTimestamp::new(0),
            stream_id: 1,
            prefer_cid: cid::AUDIO,
        };
        let message = CommonMessage::new(header, Bytes::from(vec![0, 1]));

        let mut requests = TransactionTable::new();
        assert!(RtmpPacket::decode(&message, &mut requests).unwrap().is_none());
    }

    #[test]
    fn transaction_table_caps_growth() {
        let mut requests = TransactionTable::new();
        for index in 0..500 {
            requests.insert(index as f64, "connect");
        }

        assert!(requests.len() <= DEFAULT_TRANSACTION_CAPACITY);
        assert!(requests.take(499.0).is_some(), "newest entries survive");
        assert!(requests.take(0.0).is_none(), "oldest entries were evicted");
    }

    #[test]
    fn prefer_cids_follow_packet_kind() {
        assert_eq!(RtmpPacket::SetChunkSize { chunk_size: 128 }.prefer_cid(), 2);
        assert_eq!(RtmpPacket::OnBwDone.prefer_cid(), 3);
        assert_eq!(
            RtmpPacket::Play {
                transaction_id: 0.0,
                stream_name: String::new(),
                start: -2.0,
                duration: -1.0,
                reset: true,
            }
            .prefer_cid(),
            8
        );
        assert_eq!(
            RtmpPacket::SampleAccess {
                video_access: false,
                audio_access: false
            }
            .prefer_cid(),
            5
        );
    }
}
