//! The message layer: the atomic unit sitting above chunks and below
//! packets.
//!
//! A `CommonMessage` is a decoded header plus its complete payload bytes. A
//! `SharedMessage` is the fan-out form: the payload is shared and immutable,
//! while the small header may be restamped per recipient.

use bytes::Bytes;

use crate::time::RtmpTimestamp;

/// RTMP message type ids.
pub mod msg_type {
    pub const SET_CHUNK_SIZE: u8 = 1;
    pub const ACKNOWLEDGEMENT: u8 = 3;
    pub const USER_CONTROL: u8 = 4;
    pub const WINDOW_ACK_SIZE: u8 = 5;
    pub const SET_PEER_BANDWIDTH: u8 = 6;
    pub const AUDIO: u8 = 8;
    pub const VIDEO: u8 = 9;
    pub const AMF3_DATA: u8 = 15;
    pub const AMF3_COMMAND: u8 = 17;
    pub const AMF0_DATA: u8 = 18;
    pub const AMF0_COMMAND: u8 = 20;
}

/// The chunk stream ids messages prefer, by kind.
pub mod cid {
    /// Protocol control messages (chunk size, acks, user control, ...).
    pub const PROTOCOL_CONTROL: u32 = 2;
    /// Connection-level AMF0 commands (connect, createStream, ...).
    pub const OVER_CONNECTION: u32 = 3;
    /// Secondary connection-level traffic.
    pub const OVER_CONNECTION2: u32 = 4;
    /// Stream-level data and status (onStatus data, metadata, sample access).
    pub const OVER_STREAM: u32 = 5;
    pub const AUDIO: u32 = 6;
    pub const VIDEO: u32 = 7;
    /// Stream-level commands issued by clients (play, publish, pause).
    pub const OVER_STREAM2: u32 = 8;
}

/// The decoded header of an RTMP message.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MessageHeader {
    pub message_type: u8,
    pub payload_length: u32,
    pub timestamp: RtmpTimestamp,
    pub stream_id: u32,
    /// The chunk stream this message arrived on, or should be sent over.
    pub prefer_cid: u32,
}

impl MessageHeader {
    pub fn is_audio(&self) -> bool {
        self.message_type == msg_type::AUDIO
    }

    pub fn is_video(&self) -> bool {
        self.message_type == msg_type::VIDEO
    }

    pub fn is_amf0_command(&self) -> bool {
        self.message_type == msg_type::AMF0_COMMAND
    }

    pub fn is_amf0_data(&self) -> bool {
        self.message_type == msg_type::AMF0_DATA
    }

    pub fn is_command(&self) -> bool {
        self.message_type == msg_type::AMF0_COMMAND || self.message_type == msg_type::AMF3_COMMAND
    }
}

/// A complete message: header plus owned payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonMessage {
    pub header: MessageHeader,
    pub payload: Bytes,
}

impl CommonMessage {
    pub fn new(header: MessageHeader, payload: Bytes) -> CommonMessage {
        CommonMessage { header, payload }
    }

    /// Converts into the shared fan-out form. The payload is not copied.
    pub fn into_shared(self) -> SharedMessage {
        SharedMessage {
            header: self.header,
            payload: self.payload,
        }
    }
}

/// A message whose payload is shared between recipients.
///
/// Cloning is cheap: the payload bytes are reference counted and immutable
/// for the life of every clone. Each clone owns its header, so the
/// timestamp and stream id can be rewritten per recipient without touching
/// the others.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedMessage {
    pub header: MessageHeader,
    payload: Bytes,
}

impl SharedMessage {
    pub fn new(header: MessageHeader, payload: Bytes) -> SharedMessage {
        SharedMessage { header, payload }
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Restamps the per-recipient header fields.
    pub fn restamp(&mut self, timestamp: RtmpTimestamp, stream_id: u32) {
        self.header.timestamp = timestamp;
        self.header.stream_id = stream_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_clones_reference_the_same_payload() {
        let payload = Bytes::from(vec![1, 2, 3]);
        let header = MessageHeader {
            message_type: msg_type::AUDIO,
            payload_length: 3,
            timestamp: RtmpTimestamp::new(10),
            stream_id: 1,
            prefer_cid: cid::AUDIO,
        };

        let original = SharedMessage::new(header, payload.clone());
        let clone = original.clone();

        // Bytes clones share the same backing allocation.
        assert_eq!(original.payload().as_ptr(), clone.payload().as_ptr());
    }

    #[test]
    fn restamp_only_touches_the_clone() {
        let header = MessageHeader {
            message_type: msg_type::VIDEO,
            payload_length: 0,
            timestamp: RtmpTimestamp::new(100),
            stream_id: 1,
            prefer_cid: cid::VIDEO,
        };

        let original = SharedMessage::new(header, Bytes::new());
        let mut clone = original.clone();
        clone.restamp(RtmpTimestamp::new(250), 7);

        assert_eq!(original.header.timestamp, RtmpTimestamp::new(100));
        assert_eq!(original.header.stream_id, 1);
        assert_eq!(clone.header.timestamp, RtmpTimestamp::new(250));
        assert_eq!(clone.header.stream_id, 7);
    }
}
