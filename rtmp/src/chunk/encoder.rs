//! Egress half of the chunk codec: messages in, vectored byte writes out.
//!
//! Each message opens with a fmt 0 header and continues with fmt 3 headers,
//! so every message is self-describing and chunks of different messages are
//! never interleaved on the wire. Header bytes for a whole batch are staged
//! in a fixed cache so each flush is a single vectored write of header and
//! payload slices.

use bytes::Bytes;
use std::io::IoSlice;
use tracing::warn;

use super::errors::ChunkEncodeError;
use super::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MAX_MESSAGE_SIZE, MIN_CHUNK_SIZE};
use crate::messages::{MessageHeader, SharedMessage};
use crate::time::EXTENDED_TIMESTAMP_MARKER;
use crate::transport::{write_all_vectored, ReaderWriter};

/// Basic header (3) + full message header (11) + extended timestamp (4).
const HEADER_SLOT_SIZE: usize = 18;

/// How many chunk headers a single gathered write can stage.
const HEADER_SLOT_COUNT: usize = 128;

struct StagedChunk {
    slot: usize,
    header_len: usize,
    payload: Bytes,
}

/// Encodes outbound messages as RTMP chunks.
pub struct ChunkEncoder {
    out_chunk_size: u32,
    header_cache: Box<[[u8; HEADER_SLOT_SIZE]; HEADER_SLOT_COUNT]>,
    warned_cache_dry: bool,
}

impl ChunkEncoder {
    pub fn new() -> ChunkEncoder {
        ChunkEncoder {
            out_chunk_size: DEFAULT_CHUNK_SIZE,
            header_cache: Box::new([[0; HEADER_SLOT_SIZE]; HEADER_SLOT_COUNT]),
            warned_cache_dry: false,
        }
    }

    /// Applies a new outgoing chunk size. The matching SetChunkSize message
    /// must be sent to the peer before any message chunked at this size.
    pub fn set_chunk_size(&mut self, size: u32) -> Result<(), ChunkEncodeError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
            return Err(ChunkEncodeError::InvalidChunkSize { size });
        }

        self.out_chunk_size = size;
        Ok(())
    }

    pub fn chunk_size(&self) -> u32 {
        self.out_chunk_size
    }

    pub fn send_message<T: ReaderWriter>(
        &mut self,
        io: &mut T,
        message: &SharedMessage,
    ) -> Result<(), ChunkEncodeError> {
        self.send_messages(io, std::slice::from_ref(message))
    }

    /// Sends the batch in order. Each message's chunks are written
    /// contiguously; batching only affects how many syscalls the transport
    /// sees, never the byte sequence.
    pub fn send_messages<T: ReaderWriter>(
        &mut self,
        io: &mut T,
        messages: &[SharedMessage],
    ) -> Result<(), ChunkEncodeError> {
        let mut staged: Vec<StagedChunk> = Vec::new();
        let mut next_slot = 0;

        for message in messages {
            let payload = message.payload();
            if payload.len() > MAX_MESSAGE_SIZE as usize {
                return Err(ChunkEncodeError::MessageTooLong {
                    size: payload.len(),
                });
            }

            let header = &message.header;
            let extended = header.timestamp.needs_extended();
            let mut offset = 0;
            let mut first = true;

            loop {
                if next_slot == HEADER_SLOT_COUNT {
                    // Cache is dry; fall back to flushing what we have and
                    // reusing the slots. Costs extra writes, not bytes.
                    if !self.warned_cache_dry {
                        self.warned_cache_dry = true;
                        warn!(
                            slots = HEADER_SLOT_COUNT,
                            "chunk header cache exhausted, splitting the batch"
                        );
                    }

                    self.flush(io, &staged)?;
                    staged.clear();
                    next_slot = 0;
                }

                let slot = &mut self.header_cache[next_slot];
                let header_len = if first {
                    write_full_header(slot, header, payload.len() as u32, extended)
                } else {
                    write_continuation_header(slot, header, extended)
                };

                let end = (offset + self.out_chunk_size as usize).min(payload.len());
                staged.push(StagedChunk {
                    slot: next_slot,
                    header_len,
                    payload: payload.slice(offset..end),
                });

                next_slot += 1;
                first = false;
                offset = end;

                if offset >= payload.len() {
                    break;
                }
            }
        }

        self.flush(io, &staged)
    }

    fn flush<T: ReaderWriter>(
        &self,
        io: &mut T,
        staged: &[StagedChunk],
    ) -> Result<(), ChunkEncodeError> {
        if staged.is_empty() {
            return Ok(());
        }

        let mut slices = Vec::with_capacity(staged.len() * 2);
        for chunk in staged {
            slices.push(IoSlice::new(&self.header_cache[chunk.slot][..chunk.header_len]));
            if !chunk.payload.is_empty() {
                slices.push(IoSlice::new(&chunk.payload));
            }
        }

        write_all_vectored(io, &slices)?;
        Ok(())
    }
}

impl Default for ChunkEncoder {
    fn default() -> Self {
        ChunkEncoder::new()
    }
}

fn write_basic_header(slot: &mut [u8], fmt: u8, cid: u32) -> usize {
    debug_assert!(
        (super::MIN_CID..=super::MAX_CID).contains(&cid),
        "chunk stream id {} outside [2, 65599]",
        cid
    );

    if cid < 64 {
        slot[0] = fmt << 6 | cid as u8;
        1
    } else if cid < 320 {
        slot[0] = fmt << 6;
        slot[1] = (cid - 64) as u8;
        2
    } else {
        slot[0] = fmt << 6 | 1;
        slot[1] = ((cid - 64) & 0xff) as u8;
        slot[2] = ((cid - 64) >> 8) as u8;
        3
    }
}

fn write_u24_be(slot: &mut [u8], value: u32) {
    slot[0] = (value >> 16) as u8;
    slot[1] = (value >> 8) as u8;
    slot[2] = value as u8;
}

fn write_full_header(
    slot: &mut [u8; HEADER_SLOT_SIZE],
    header: &MessageHeader,
    payload_length: u32,
    extended: bool,
) -> usize {
    let mut pos = write_basic_header(&mut slot[..], 0, header.prefer_cid);

    let field = header.timestamp.value.min(EXTENDED_TIMESTAMP_MARKER);
    write_u24_be(&mut slot[pos..], field);
    pos += 3;
    write_u24_be(&mut slot[pos..], payload_length);
    pos += 3;
    slot[pos] = header.message_type;
    pos += 1;
    slot[pos..pos + 4].copy_from_slice(&header.stream_id.to_le_bytes());
    pos += 4;

    if extended {
        slot[pos..pos + 4].copy_from_slice(&header.timestamp.value.to_be_bytes());
        pos += 4;
    }

    pos
}

fn write_continuation_header(
    slot: &mut [u8; HEADER_SLOT_SIZE],
    header: &MessageHeader,
    extended: bool,
) -> usize {
    let mut pos = write_basic_header(&mut slot[..], 3, header.prefer_cid);

    if extended {
        // Continuations repeat the extended timestamp so a receiver can
        // resynchronise on any chunk boundary.
        slot[pos..pos + 4].copy_from_slice(&header.timestamp.value.to_be_bytes());
        pos += 4;
    }

    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{cid, msg_type};
    use crate::time::RtmpTimestamp;
    use crate::transport::MemoryTransport;

    fn message(type_id: u8, prefer_cid: u32, timestamp: u32, stream_id: u32, payload: Vec<u8>) -> SharedMessage {
        let header = MessageHeader {
            message_type: type_id,
            payload_length: payload.len() as u32,
            timestamp: RtmpTimestamp::new(timestamp),
            stream_id,
            prefer_cid,
        };

        SharedMessage::new(header, Bytes::from(payload))
    }

    fn sent_bytes(encoder: &mut ChunkEncoder, messages: &[SharedMessage]) -> Vec<u8> {
        let (mut sender, mut receiver) = MemoryTransport::pair();
        encoder.send_messages(&mut sender, messages).unwrap();
        drop(sender);

        let mut bytes = Vec::new();
        let mut block = [0_u8; 4096];
        loop {
            match receiver.read(&mut block) {
                Ok(0) => break,
                Ok(count) => bytes.extend_from_slice(&block[..count]),
                Err(_) => break,
            }
        }

        bytes
    }

    #[test]
    fn small_payload_chunked_at_default_size() {
        // 300 audio bytes at chunk size 128: full header, 128 bytes, two
        // one-byte continuations carrying 128 and 44 bytes.
        let payload: Vec<u8> = (0..300_u16).map(|value| value as u8).collect();
        let mut encoder = ChunkEncoder::new();
        let bytes = sent_bytes(
            &mut encoder,
            &[message(msg_type::AUDIO, cid::AUDIO, 1000, 1, payload.clone())],
        );

        assert_eq!(bytes.len(), 12 + 128 + 1 + 128 + 1 + 44);

        assert_eq!(bytes[0], 0x06, "fmt 0 on cid 6");
        assert_eq!(&bytes[1..4], &[0x00, 0x03, 0xe8], "timestamp 1000");
        assert_eq!(&bytes[4..7], &[0x00, 0x01, 0x2c], "length 300");
        assert_eq!(bytes[7], msg_type::AUDIO);
        assert_eq!(&bytes[8..12], &[1, 0, 0, 0], "little-endian stream id");
        assert_eq!(&bytes[12..140], &payload[..128]);

        assert_eq!(bytes[140], 0xc6, "fmt 3 on cid 6");
        assert_eq!(&bytes[141..269], &payload[128..256]);
        assert_eq!(bytes[269], 0xc6);
        assert_eq!(&bytes[270..], &payload[256..]);
    }

    #[test]
    fn extended_timestamp_written_on_header_and_continuations() {
        let payload = vec![7_u8; 200];
        let mut encoder = ChunkEncoder::new();
        let bytes = sent_bytes(
            &mut encoder,
            &[message(msg_type::VIDEO, cid::VIDEO, 0x0100_0000, 1, payload)],
        );

        assert_eq!(bytes[0], 0x07);
        assert_eq!(&bytes[1..4], &[0xff, 0xff, 0xff], "saturated field");
        assert_eq!(&bytes[12..16], &[0x01, 0x00, 0x00, 0x00], "extended timestamp");

        let continuation = 16 + 128;
        assert_eq!(bytes[continuation], 0xc7);
        assert_eq!(
            &bytes[continuation + 1..continuation + 5],
            &[0x01, 0x00, 0x00, 0x00],
            "continuation repeats the extended timestamp"
        );
        assert_eq!(bytes.len(), 16 + 128 + 1 + 4 + 72);
    }

    #[test]
    fn wide_cids_use_escape_encodings() {
        let mut encoder = ChunkEncoder::new();

        let bytes = sent_bytes(&mut encoder, &[message(msg_type::AUDIO, 200, 0, 1, vec![1])]);
        assert_eq!(bytes[0], 0x00, "escape for 1-byte cid");
        assert_eq!(bytes[1], 200 - 64);

        let bytes = sent_bytes(&mut encoder, &[message(msg_type::AUDIO, 50_000, 0, 1, vec![1])]);
        assert_eq!(bytes[0], 0x01, "escape for 2-byte cid");
        assert_eq!(bytes[1], ((50_000 - 64) & 0xff) as u8);
        assert_eq!(bytes[2], ((50_000 - 64) >> 8) as u8);
    }

    #[test]
    fn batch_preserves_message_order() {
        let mut encoder = ChunkEncoder::new();
        let batch = vec![
            message(msg_type::AUDIO, cid::AUDIO, 1, 1, vec![1; 4]),
            message(msg_type::AUDIO, cid::AUDIO, 2, 1, vec![2; 4]),
            message(msg_type::AUDIO, cid::AUDIO, 3, 1, vec![3; 4]),
        ];

        let batched = sent_bytes(&mut encoder, &batch);

        let mut encoder = ChunkEncoder::new();
        let mut sequential = Vec::new();
        for message in &batch {
            sequential.extend_from_slice(&sent_bytes(&mut encoder, std::slice::from_ref(message)));
        }

        assert_eq!(batched, sequential, "batching must equal sequential sends");
    }

    #[test]
    fn batch_larger_than_header_cache_still_sends_everything() {
        // More chunks than header slots forces the mid-batch flush path.
        let batch: Vec<SharedMessage> = (0..(HEADER_SLOT_COUNT + 40))
            .map(|index| message(msg_type::AUDIO, cid::AUDIO, index as u32, 1, vec![index as u8; 8]))
            .collect();

        let mut encoder = ChunkEncoder::new();
        let bytes = sent_bytes(&mut encoder, &batch);

        // every message fits one chunk: 12 header bytes + 8 payload bytes
        assert_eq!(bytes.len(), batch.len() * (12 + 8));
    }

    #[test]
    fn oversized_message_is_refused() {
        let mut encoder = ChunkEncoder::new();
        let (mut sender, _receiver) = MemoryTransport::pair();

        let header = MessageHeader {
            message_type: msg_type::VIDEO,
            payload_length: 0,
            timestamp: RtmpTimestamp::new(0),
            stream_id: 1,
            prefer_cid: cid::VIDEO,
        };
        let too_long = SharedMessage::new(header, Bytes::from(vec![0; MAX_MESSAGE_SIZE as usize + 1]));

        match encoder.send_message(&mut sender, &too_long) {
            Err(ChunkEncodeError::MessageTooLong { .. }) => (),
            other => panic!("expected MessageTooLong, got {:?}", other),
        }
    }

    #[test]
    fn chunk_size_bounds_are_enforced() {
        let mut encoder = ChunkEncoder::new();
        assert!(encoder.set_chunk_size(127).is_err());
        assert!(encoder.set_chunk_size(65537).is_err());
        assert!(encoder.set_chunk_size(4096).is_ok());
        assert_eq!(encoder.chunk_size(), 4096);
    }
}
