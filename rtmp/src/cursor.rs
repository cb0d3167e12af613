//! A bounded read cursor over a byte slice with the typed accessors the
//! RTMP wire format needs: big-endian u8/u16/u24/u32, the little-endian
//! stream id in full chunk headers, and raw slices. It implements
//! `io::Read` so AMF0 values can be decoded directly out of it.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::io::{self, Read};

/// Bounded reader over a message payload.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Whether at least `count` more bytes can be read.
    pub fn require(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        ReadBytesExt::read_u8(self)
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        ReadBytesExt::read_u16::<BigEndian>(self)
    }

    pub fn read_u24(&mut self) -> io::Result<u32> {
        ReadBytesExt::read_u24::<BigEndian>(self)
    }

    pub fn read_u32(&mut self) -> io::Result<u32> {
        ReadBytesExt::read_u32::<BigEndian>(self)
    }

    /// Little-endian u32, used only for the stream id field of full chunk
    /// headers.
    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        ReadBytesExt::read_u32::<LittleEndian>(self)
    }

    pub fn read_bytes(&mut self, count: usize) -> io::Result<&'a [u8]> {
        if !self.require(count) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "not enough bytes remaining",
            ));
        }

        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }
}

impl<'a> Read for ByteCursor<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len().min(self.remaining());
        buf[..count].copy_from_slice(&self.data[self.position..self.position + count]);
        self.position += count;
        Ok(count)
    }
}
