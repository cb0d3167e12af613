//! The RTMP handshake, exchanged before any chunk traffic.
//!
//! The protocol core only cares that three fixed-size blobs cross the wire:
//! c0c1 (1 + 1536 bytes), s0s1s2 (1 + 1536 + 1536 bytes) and c2 (1536
//! bytes). `HandshakeBytes` owns reading, creating and writing those blobs;
//! the digest-validated variant some encoders speak lives outside this
//! crate and would slot in at the same blob boundaries.

mod errors;

pub use errors::HandshakeError;

use rand::RngCore;

use crate::transport::{read_exact, write_all_vectored, ReaderWriter};
use std::io::IoSlice;

/// RTMP version byte carried in c0 and s0.
const RTMP_VERSION: u8 = 3;

const C0C1_SIZE: usize = 1 + 1536;
const S0S1S2_SIZE: usize = 1 + 1536 + 1536;
const C2_SIZE: usize = 1536;

/// Holds the three handshake blobs as they are read or created.
pub struct HandshakeBytes {
    pub c0c1: Option<Vec<u8>>,
    pub s0s1s2: Option<Vec<u8>>,
    pub c2: Option<Vec<u8>>,
}

impl HandshakeBytes {
    pub fn new() -> HandshakeBytes {
        HandshakeBytes {
            c0c1: None,
            s0s1s2: None,
            c2: None,
        }
    }

    pub fn read_c0c1<T: ReaderWriter>(&mut self, io: &mut T) -> Result<(), HandshakeError> {
        if self.c0c1.is_none() {
            let mut bytes = vec![0_u8; C0C1_SIZE];
            read_exact(io, &mut bytes)?;
            self.c0c1 = Some(bytes);
        }

        Ok(())
    }

    pub fn read_s0s1s2<T: ReaderWriter>(&mut self, io: &mut T) -> Result<(), HandshakeError> {
        if self.s0s1s2.is_none() {
            let mut bytes = vec![0_u8; S0S1S2_SIZE];
            read_exact(io, &mut bytes)?;
            self.s0s1s2 = Some(bytes);
        }

        Ok(())
    }

    pub fn read_c2<T: ReaderWriter>(&mut self, io: &mut T) -> Result<(), HandshakeError> {
        if self.c2.is_none() {
            let mut bytes = vec![0_u8; C2_SIZE];
            read_exact(io, &mut bytes)?;
            self.c2 = Some(bytes);
        }

        Ok(())
    }

    pub fn create_c0c1(&mut self) {
        if self.c0c1.is_none() {
            let mut bytes = vec![0_u8; C0C1_SIZE];
            rand::thread_rng().fill_bytes(&mut bytes[9..]);
            bytes[0] = RTMP_VERSION;
            // c1: 4 bytes time + 4 bytes zero + 1528 bytes random
            bytes[1..9].fill(0);
            self.c0c1 = Some(bytes);
        }
    }

    /// Creates s0s1s2; s2 echoes the peer's c1 so the client can validate
    /// the exchange.
    pub fn create_s0s1s2(&mut self) {
        if self.s0s1s2.is_none() {
            let mut bytes = vec![0_u8; S0S1S2_SIZE];
            rand::thread_rng().fill_bytes(&mut bytes[9..1537]);
            bytes[0] = RTMP_VERSION;
            bytes[1..9].fill(0);

            if let Some(c0c1) = &self.c0c1 {
                bytes[1537..].copy_from_slice(&c0c1[1..]);
            }

            self.s0s1s2 = Some(bytes);
        }
    }

    /// Creates c2 echoing the server's s1.
    pub fn create_c2(&mut self) {
        if self.c2.is_none() {
            let mut bytes = vec![0_u8; C2_SIZE];
            match &self.s0s1s2 {
                Some(s0s1s2) => bytes.copy_from_slice(&s0s1s2[1..1537]),
                None => rand::thread_rng().fill_bytes(&mut bytes),
            }

            self.c2 = Some(bytes);
        }
    }
}

impl Default for HandshakeBytes {
    fn default() -> Self {
        HandshakeBytes::new()
    }
}

/// Runs the client side of the plain handshake to completion.
pub fn client_handshake<T: ReaderWriter>(io: &mut T) -> Result<(), HandshakeError> {
    let mut bytes = HandshakeBytes::new();

    bytes.create_c0c1();
    if let Some(c0c1) = &bytes.c0c1 {
        write_all_vectored(io, &[IoSlice::new(c0c1)])?;
    }

    bytes.read_s0s1s2(io)?;
    if let Some(s0s1s2) = &bytes.s0s1s2 {
        if s0s1s2[0] != RTMP_VERSION {
            return Err(HandshakeError::BadVersion { version: s0s1s2[0] });
        }
    }

    bytes.create_c2();
    if let Some(c2) = &bytes.c2 {
        write_all_vectored(io, &[IoSlice::new(c2)])?;
    }

    Ok(())
}

/// Runs the server side of the plain handshake to completion.
pub fn server_handshake<T: ReaderWriter>(io: &mut T) -> Result<(), HandshakeError> {
    let mut bytes = HandshakeBytes::new();

    bytes.read_c0c1(io)?;
    if let Some(c0c1) = &bytes.c0c1 {
        if c0c1[0] != RTMP_VERSION {
            return Err(HandshakeError::BadVersion { version: c0c1[0] });
        }
    }

    bytes.create_s0s1s2();
    if let Some(s0s1s2) = &bytes.s0s1s2 {
        write_all_vectored(io, &[IoSlice::new(s0s1s2)])?;
    }

    bytes.read_c2(io)?;
    Ok(())
}
