//! The inbound byte buffer sitting between the transport and the chunk
//! decoder.
//!
//! The decoder asks for exact byte counts (`ensure`) and consumes them once
//! parsed (`consume`); the buffer reads from the transport in larger blocks
//! so small header reads do not translate into tiny socket reads.

use bytes::{Bytes, BytesMut};
use std::io;
use thiserror::Error;

use crate::transport::ReaderWriter;

const READ_BLOCK_SIZE: usize = 4096;
const DEFAULT_MAX_BUFFERED: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum BufferError {
    /// Buffering `required` bytes would exceed the configured ceiling.
    #[error("buffering {required} bytes would exceed the {limit} byte ceiling")]
    Overflow { required: usize, limit: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Grow-on-demand inbound buffer with a hard ceiling.
pub struct FastBuffer {
    data: BytesMut,
    max_buffered: usize,
}

impl FastBuffer {
    pub fn new() -> FastBuffer {
        FastBuffer::with_limit(DEFAULT_MAX_BUFFERED)
    }

    pub fn with_limit(max_buffered: usize) -> FastBuffer {
        FastBuffer {
            data: BytesMut::with_capacity(READ_BLOCK_SIZE),
            max_buffered,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads from the transport until at least `count` bytes are buffered.
    pub fn ensure<T: ReaderWriter>(
        &mut self,
        io: &mut T,
        count: usize,
    ) -> Result<(), BufferError> {
        if count > self.max_buffered {
            return Err(BufferError::Overflow {
                required: count,
                limit: self.max_buffered,
            });
        }

        let mut block = [0_u8; READ_BLOCK_SIZE];
        while self.data.len() < count {
            let block_len = block.len();
            let wanted = (count - self.data.len()).max(READ_BLOCK_SIZE.min(block_len));
            let read = io.read(&mut block[..wanted.min(block_len)])?;
            if read == 0 {
                return Err(BufferError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "transport closed while buffering",
                )));
            }

            if self.data.len() + read > self.max_buffered {
                return Err(BufferError::Overflow {
                    required: self.data.len() + read,
                    limit: self.max_buffered,
                });
            }

            self.data.extend_from_slice(&block[..read]);
        }

        Ok(())
    }

    /// Takes the first `count` buffered bytes. Callers must have `ensure`d
    /// them first.
    pub fn consume(&mut self, count: usize) -> Bytes {
        debug_assert!(count <= self.data.len(), "consume past buffered bytes");
        self.data.split_to(count).freeze()
    }

    /// Looks at buffered bytes without consuming them.
    pub fn peek(&self, count: usize) -> &[u8] {
        &self.data[..count.min(self.data.len())]
    }
}

impl Default for FastBuffer {
    fn default() -> Self {
        FastBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use std::io::IoSlice;

    #[test]
    fn ensure_reads_until_requested_count() {
        let (mut peer, mut io) = MemoryTransport::pair();
        peer.writev(&[IoSlice::new(&[1, 2, 3, 4, 5])]).unwrap();

        let mut buffer = FastBuffer::new();
        buffer.ensure(&mut io, 3).unwrap();
        assert!(buffer.len() >= 3);

        assert_eq!(&buffer.consume(3)[..], &[1, 2, 3]);
    }

    #[test]
    fn consume_leaves_remaining_bytes() {
        let (mut peer, mut io) = MemoryTransport::pair();
        peer.writev(&[IoSlice::new(&[9, 8, 7, 6])]).unwrap();

        let mut buffer = FastBuffer::new();
        buffer.ensure(&mut io, 4).unwrap();
        let first = buffer.consume(2);
        assert_eq!(&first[..], &[9, 8]);
        assert_eq!(buffer.peek(2), &[7, 6]);
    }

    #[test]
    fn overflow_is_reported() {
        let (_peer, mut io) = MemoryTransport::pair();
        let mut buffer = FastBuffer::with_limit(16);

        match buffer.ensure(&mut io, 17) {
            Err(BufferError::Overflow { required: 17, limit: 16 }) => (),
            other => panic!("expected Overflow, got {:?}", other),
        }
    }

    #[test]
    fn closed_transport_is_an_eof_error() {
        let (peer, mut io) = MemoryTransport::pair();
        drop(peer);

        let mut buffer = FastBuffer::new();
        match buffer.ensure(&mut io, 1) {
            Err(BufferError::Io(error)) => {
                assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof)
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
