//! Ingress half of the chunk codec: bytes in, whole messages out.

use bytes::BytesMut;
use std::collections::HashMap;

use super::errors::ChunkDecodeError;
use super::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MAX_MESSAGE_SIZE, MIN_CHUNK_SIZE};
use crate::buffer::FastBuffer;
use crate::cursor::ByteCursor;
use crate::messages::{CommonMessage, MessageHeader};
use crate::time::{RtmpTimestamp, EXTENDED_TIMESTAMP_MARKER};
use crate::transport::ReaderWriter;

const FMT_FULL: u8 = 0;
const FMT_NO_STREAM_ID: u8 = 1;
const FMT_TIMESTAMP_ONLY: u8 = 2;
const FMT_CONTINUATION: u8 = 3;

/// Chunk stream ids below this live in the flat slot array; the long tail
/// goes to a map. Almost all traffic uses single-digit cids, so the common
/// path never hashes.
const CID_SLOT_COUNT: usize = 64;

/// Decode state for one inbound chunk stream.
#[derive(Debug)]
struct ChunkStream {
    cid: u32,
    /// Basic-header format of the last chunk seen on this stream.
    fmt: u8,
    /// Snapshot of the last full header; compressed headers fold into it.
    header: MessageHeader,
    /// The delta carried by the last fmt 1/2 header, re-applied by fmt 3
    /// chunks that open a new message.
    timestamp_delta: u32,
    /// Whether the last header carried an extended timestamp.
    extended_timestamp: bool,
    /// Raw value of the last 4-byte extended timestamp field, used to
    /// recognise continuation chunks that echo it.
    extended_field: u32,
    /// Partial payload accumulated so far for the in-flight message.
    payload: BytesMut,
    /// Completed messages produced on this stream. Zero plus an empty
    /// accumulator marks a fresh stream, which must open with fmt 0.
    msg_count: u64,
}

impl ChunkStream {
    fn new(cid: u32) -> ChunkStream {
        ChunkStream {
            cid,
            fmt: FMT_FULL,
            header: MessageHeader {
                prefer_cid: cid,
                ..MessageHeader::default()
            },
            timestamp_delta: 0,
            extended_timestamp: false,
            extended_field: 0,
            payload: BytesMut::new(),
            msg_count: 0,
        }
    }
}

/// Decodes the inbound chunk stream into complete messages.
///
/// Every byte the peer sends after the handshake must pass through one
/// decoder instance: compressed headers only make sense against the state
/// left behind by earlier chunks on the same chunk stream.
pub struct ChunkDecoder {
    in_chunk_size: u32,
    max_message_size: u32,
    slots: Vec<Option<ChunkStream>>,
    overflow: HashMap<u32, ChunkStream>,
}

impl ChunkDecoder {
    pub fn new() -> ChunkDecoder {
        let mut slots = Vec::with_capacity(CID_SLOT_COUNT);
        slots.resize_with(CID_SLOT_COUNT, || None);

        ChunkDecoder {
            in_chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: MAX_MESSAGE_SIZE,
            slots,
            overflow: HashMap::new(),
        }
    }

    /// Applies the chunk size announced by the peer's SetChunkSize.
    pub fn set_chunk_size(&mut self, size: u32) -> Result<(), ChunkDecodeError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
            return Err(ChunkDecodeError::InvalidChunkSize { size });
        }

        self.in_chunk_size = size;
        Ok(())
    }

    pub fn chunk_size(&self) -> u32 {
        self.in_chunk_size
    }

    /// Caps the payload length any single message may announce.
    pub fn set_max_message_size(&mut self, size: u32) {
        self.max_message_size = size.min(MAX_MESSAGE_SIZE);
    }

    /// Reads chunks off the transport until one of them completes a
    /// message. Bytes are pulled through `buffer` so short header reads do
    /// not become tiny transport reads.
    pub fn read_message<T: ReaderWriter>(
        &mut self,
        io: &mut T,
        buffer: &mut FastBuffer,
    ) -> Result<CommonMessage, ChunkDecodeError> {
        loop {
            if let Some(message) = self.read_chunk(io, buffer)? {
                return Ok(message);
            }
        }
    }

    /// Consumes exactly one chunk. Returns the completed message when this
    /// chunk was the last one of a message, `None` when the message is
    /// still partial.
    fn read_chunk<T: ReaderWriter>(
        &mut self,
        io: &mut T,
        buffer: &mut FastBuffer,
    ) -> Result<Option<CommonMessage>, ChunkDecodeError> {
        let (fmt, cid) = read_basic_header(io, buffer)?;

        let in_chunk_size = self.in_chunk_size;
        let max_message_size = self.max_message_size;
        let (stream, fresh) = self.stream_mut(cid);

        if fresh && fmt != FMT_FULL {
            return Err(ChunkDecodeError::ChunkStart { cid, fmt });
        }

        if !stream.payload.is_empty() && fmt != FMT_CONTINUATION {
            return Err(ChunkDecodeError::ChunkStart { cid, fmt });
        }

        read_message_header(stream, fmt, io, buffer, max_message_size)?;
        stream.fmt = fmt;

        // Payload body: one chunk carries at most in_chunk_size bytes.
        let total = stream.header.payload_length as usize;
        let remaining = total - stream.payload.len();
        let body_size = remaining.min(in_chunk_size as usize);

        if body_size > 0 {
            buffer.ensure(io, body_size)?;
            let body = buffer.consume(body_size);
            if stream.payload.capacity() < total {
                stream.payload.reserve(total - stream.payload.len());
            }

            stream.payload.extend_from_slice(&body);
        }

        if stream.payload.len() < total {
            return Ok(None);
        }

        stream.msg_count += 1;
        let payload = std::mem::take(&mut stream.payload).freeze();
        Ok(Some(CommonMessage::new(stream.header, payload)))
    }

    fn stream_mut(&mut self, cid: u32) -> (&mut ChunkStream, bool) {
        if (cid as usize) < CID_SLOT_COUNT {
            let slot = &mut self.slots[cid as usize];
            let fresh = slot.is_none();
            let stream = slot.get_or_insert_with(|| ChunkStream::new(cid));
            (stream, fresh)
        } else {
            let mut fresh = false;
            let stream = self.overflow.entry(cid).or_insert_with(|| {
                fresh = true;
                ChunkStream::new(cid)
            });
            (stream, fresh)
        }
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        ChunkDecoder::new()
    }
}

/// Reads the 1-3 byte basic header: 2 bits of fmt, then the cid encoded in
/// 6 bits, 1 extra byte (cid 64-319) or 2 extra bytes (cid 64-65599).
fn read_basic_header<T: ReaderWriter>(
    io: &mut T,
    buffer: &mut FastBuffer,
) -> Result<(u8, u32), ChunkDecodeError> {
    buffer.ensure(io, 1)?;
    let first = buffer.peek(1)[0];
    let fmt = first >> 6;

    match first & 0x3f {
        0 => {
            buffer.ensure(io, 2)?;
            let bytes = buffer.consume(2);
            Ok((fmt, 64 + bytes[1] as u32))
        }

        1 => {
            buffer.ensure(io, 3)?;
            let bytes = buffer.consume(3);
            Ok((fmt, 64 + bytes[1] as u32 + bytes[2] as u32 * 256))
        }

        cid => {
            buffer.consume(1);
            Ok((fmt, cid as u32))
        }
    }
}

fn read_message_header<T: ReaderWriter>(
    stream: &mut ChunkStream,
    fmt: u8,
    io: &mut T,
    buffer: &mut FastBuffer,
    max_message_size: u32,
) -> Result<(), ChunkDecodeError> {
    let header_size = match fmt {
        FMT_FULL => 11,
        FMT_NO_STREAM_ID => 7,
        FMT_TIMESTAMP_ONLY => 3,
        _ => 0,
    };

    if header_size > 0 {
        buffer.ensure(io, header_size)?;
        let bytes = buffer.consume(header_size);
        let mut cursor = ByteCursor::new(&bytes);

        let timestamp_field = cursor.read_u24()?;
        stream.extended_timestamp = timestamp_field >= EXTENDED_TIMESTAMP_MARKER;

        if fmt != FMT_TIMESTAMP_ONLY {
            let payload_length = cursor.read_u24()?;
            if payload_length > max_message_size {
                return Err(ChunkDecodeError::MessageTooLarge {
                    size: payload_length,
                    max: max_message_size,
                });
            }

            stream.header.payload_length = payload_length;
            stream.header.message_type = cursor.read_u8()?;
        }

        if fmt == FMT_FULL {
            stream.header.stream_id = cursor.read_u32_le()?;
        }

        if !stream.extended_timestamp {
            if fmt == FMT_FULL {
                stream.header.timestamp = RtmpTimestamp::new(timestamp_field);
                stream.timestamp_delta = 0;
            } else {
                stream.header.timestamp = stream.header.timestamp + timestamp_field;
                stream.timestamp_delta = timestamp_field;
            }
        }

        if stream.extended_timestamp {
            buffer.ensure(io, 4)?;
            let bytes = buffer.consume(4);
            let extended = ByteCursor::new(&bytes).read_u32()?;
            stream.extended_field = extended;

            if fmt == FMT_FULL {
                stream.header.timestamp = RtmpTimestamp::new(extended);
                stream.timestamp_delta = 0;
            } else {
                stream.header.timestamp = stream.header.timestamp + extended;
                stream.timestamp_delta = extended;
            }
        }

        return Ok(());
    }

    // fmt 3 carries no header bytes: the previous header repeats. Only the
    // timestamp needs attention, and only at a message boundary.
    let message_start = stream.payload.is_empty();

    if stream.extended_timestamp {
        if message_start {
            // The opening chunk of a message on an extended-timestamp
            // stream always re-sends the 4 timestamp bytes, carrying the
            // repeated delta just like the 3-byte field would.
            buffer.ensure(io, 4)?;
            let bytes = buffer.consume(4);
            let extended = ByteCursor::new(&bytes).read_u32()?;
            stream.extended_field = extended;
            stream.header.timestamp = stream.header.timestamp + extended;
        } else {
            // Continuations should repeat the 4 bytes, but some encoders
            // omit them. Adopt the bytes only when they echo the recorded
            // extended timestamp field; anything else is payload.
            buffer.ensure(io, 4)?;
            let ahead = buffer.peek(4);
            let echoed = u32::from_be_bytes([ahead[0], ahead[1], ahead[2], ahead[3]]);
            if echoed == stream.extended_field {
                buffer.consume(4);
            }
        }
    } else if message_start {
        stream.header.timestamp = stream.header.timestamp + stream.timestamp_delta;
    }

    Ok(())
}
