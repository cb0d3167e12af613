//! Serialization of the protocol control packets: fixed-layout big-endian
//! bodies on chunk stream 2, message stream 0.

use byteorder::{BigEndian, WriteBytesExt};

use super::errors::{PacketDecodeError, PacketEncodeError};
use super::{PeerBandwidthLimit, RtmpPacket, UserControlEvent};
use crate::cursor::ByteCursor;

pub fn encode_set_chunk_size(chunk_size: u32) -> Result<Vec<u8>, PacketEncodeError> {
    let mut bytes = Vec::with_capacity(4);
    bytes.write_u32::<BigEndian>(chunk_size)?;
    Ok(bytes)
}

pub fn encode_acknowledgement(sequence_number: u32) -> Result<Vec<u8>, PacketEncodeError> {
    let mut bytes = Vec::with_capacity(4);
    bytes.write_u32::<BigEndian>(sequence_number)?;
    Ok(bytes)
}

pub fn encode_window_ack_size(ack_window_size: u32) -> Result<Vec<u8>, PacketEncodeError> {
    let mut bytes = Vec::with_capacity(4);
    bytes.write_u32::<BigEndian>(ack_window_size)?;
    Ok(bytes)
}

pub fn encode_set_peer_bandwidth(
    bandwidth: u32,
    limit_type: PeerBandwidthLimit,
) -> Result<Vec<u8>, PacketEncodeError> {
    let mut bytes = Vec::with_capacity(5);
    bytes.write_u32::<BigEndian>(bandwidth)?;
    bytes.push(limit_type as u8);
    Ok(bytes)
}

pub fn encode_user_control(
    event: UserControlEvent,
    event_data: u32,
    extra_data: u32,
) -> Result<Vec<u8>, PacketEncodeError> {
    let mut bytes = Vec::with_capacity(10);
    bytes.write_u16::<BigEndian>(event.to_wire())?;

    match event {
        // The 0x1a FMS event carries a single data byte.
        UserControlEvent::FmsEvent0 => bytes.push(event_data as u8),

        UserControlEvent::SetBufferLength => {
            bytes.write_u32::<BigEndian>(event_data)?;
            bytes.write_u32::<BigEndian>(extra_data)?;
        }

        _ => bytes.write_u32::<BigEndian>(event_data)?,
    }

    Ok(bytes)
}

pub fn decode_set_chunk_size(payload: &[u8]) -> Result<RtmpPacket, PacketDecodeError> {
    let mut cursor = ByteCursor::new(payload);
    Ok(RtmpPacket::SetChunkSize {
        chunk_size: cursor.read_u32()?,
    })
}

pub fn decode_acknowledgement(payload: &[u8]) -> Result<RtmpPacket, PacketDecodeError> {
    let mut cursor = ByteCursor::new(payload);
    Ok(RtmpPacket::Acknowledgement {
        sequence_number: cursor.read_u32()?,
    })
}

pub fn decode_window_ack_size(payload: &[u8]) -> Result<RtmpPacket, PacketDecodeError> {
    let mut cursor = ByteCursor::new(payload);
    Ok(RtmpPacket::SetWindowAckSize {
        ack_window_size: cursor.read_u32()?,
    })
}

pub fn decode_set_peer_bandwidth(payload: &[u8]) -> Result<RtmpPacket, PacketDecodeError> {
    let mut cursor = ByteCursor::new(payload);
    let bandwidth = cursor.read_u32()?;
    let limit_type = match cursor.read_u8()? {
        0 => PeerBandwidthLimit::Hard,
        1 => PeerBandwidthLimit::Soft,
        2 => PeerBandwidthLimit::Dynamic,
        _ => return Err(PacketDecodeError::InvalidMessageFormat),
    };

    Ok(RtmpPacket::SetPeerBandwidth {
        bandwidth,
        limit_type,
    })
}

pub fn decode_user_control(payload: &[u8]) -> Result<RtmpPacket, PacketDecodeError> {
    let mut cursor = ByteCursor::new(payload);
    let event = UserControlEvent::from_wire(cursor.read_u16()?)
        .ok_or(PacketDecodeError::InvalidMessageFormat)?;

    let (event_data, extra_data) = match event {
        UserControlEvent::FmsEvent0 => (cursor.read_u8()? as u32, 0),
        UserControlEvent::SetBufferLength => (cursor.read_u32()?, cursor.read_u32()?),
        _ => (cursor.read_u32()?, 0),
    };

    Ok(RtmpPacket::UserControl {
        event,
        event_data,
        extra_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_chunk_size_round_trip() {
        let bytes = encode_set_chunk_size(4096).unwrap();
        assert_eq!(bytes, vec![0, 0, 0x10, 0]);
        match decode_set_chunk_size(&bytes).unwrap() {
            RtmpPacket::SetChunkSize { chunk_size: 4096 } => (),
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn peer_bandwidth_carries_limit_type() {
        let bytes = encode_set_peer_bandwidth(2_500_000, PeerBandwidthLimit::Dynamic).unwrap();
        assert_eq!(bytes.len(), 5);
        assert_eq!(bytes[4], 2);

        match decode_set_peer_bandwidth(&bytes).unwrap() {
            RtmpPacket::SetPeerBandwidth {
                bandwidth: 2_500_000,
                limit_type: PeerBandwidthLimit::Dynamic,
            } => (),
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn invalid_limit_type_is_rejected() {
        let bytes = vec![0, 0, 0, 1, 9];
        assert!(matches!(
            decode_set_peer_bandwidth(&bytes),
            Err(PacketDecodeError::InvalidMessageFormat)
        ));
    }

    #[test]
    fn user_control_stream_begin_is_six_bytes() {
        let bytes = encode_user_control(UserControlEvent::StreamBegin, 1, 0).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn set_buffer_length_carries_both_words() {
        let bytes = encode_user_control(UserControlEvent::SetBufferLength, 1, 3000).unwrap();
        assert_eq!(bytes.len(), 10);

        match decode_user_control(&bytes).unwrap() {
            RtmpPacket::UserControl {
                event: UserControlEvent::SetBufferLength,
                event_data: 1,
                extra_data: 3000,
            } => (),
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn fms_event_carries_one_byte() {
        let bytes = encode_user_control(UserControlEvent::FmsEvent0, 1, 0).unwrap();
        assert_eq!(bytes, vec![0, 0x1a, 1]);

        match decode_user_control(&bytes).unwrap() {
            RtmpPacket::UserControl {
                event: UserControlEvent::FmsEvent0,
                event_data: 1,
                extra_data: 0,
            } => (),
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn ping_request_round_trip() {
        let bytes = encode_user_control(UserControlEvent::PingRequest, 0xdead_beef, 0).unwrap();
        match decode_user_control(&bytes).unwrap() {
            RtmpPacket::UserControl {
                event: UserControlEvent::PingRequest,
                event_data: 0xdead_beef,
                extra_data: 0,
            } => (),
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let bytes = vec![0, 0x55, 0, 0, 0, 0];
        assert!(matches!(
            decode_user_control(&bytes),
            Err(PacketDecodeError::InvalidMessageFormat)
        ));
    }
}
