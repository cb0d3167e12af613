//! The byte-stream endpoint contract the protocol runs against.
//!
//! The protocol core never opens sockets; it drives anything that can do a
//! timed read, a timed vectored write, and report its byte counters. The
//! byte counters feed the acknowledgement window bookkeeping.
//!
//! Timeouts are expressed in microseconds. A timed-out operation must fail
//! with `io::ErrorKind::TimedOut`; a peer disconnect surfaces as
//! `UnexpectedEof`, `ConnectionReset` or similar, which the session layer
//! recognises as a graceful close.

use std::collections::VecDeque;
use std::io::{self, IoSlice};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// A session's view of its transport.
pub trait ReaderWriter {
    /// Reads up to `buf.len()` bytes, honouring the recv timeout.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes the slices as one gathered operation, honouring the send
    /// timeout. May write fewer bytes than provided.
    fn writev(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize>;

    fn set_recv_timeout(&mut self, timeout_us: i64);
    fn recv_timeout(&self) -> i64;
    fn set_send_timeout(&mut self, timeout_us: i64);
    fn send_timeout(&self) -> i64;

    /// Total bytes read from the peer over the life of the connection.
    fn recv_bytes(&self) -> u64;

    /// Total bytes written to the peer over the life of the connection.
    fn send_bytes(&self) -> u64;
}

/// Writes every byte of every slice, looping over short writes.
pub fn write_all_vectored<T: ReaderWriter + ?Sized>(
    io: &mut T,
    bufs: &[IoSlice<'_>],
) -> io::Result<()> {
    let total: usize = bufs.iter().map(|buf| buf.len()).sum();
    let mut written = 0;

    while written < total {
        let mut skip = written;
        let mut remaining = Vec::with_capacity(bufs.len());
        for buf in bufs {
            if skip >= buf.len() {
                skip -= buf.len();
                continue;
            }

            remaining.push(IoSlice::new(&buf[skip..]));
            skip = 0;
        }

        let count = io.writev(&remaining)?;
        if count == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "transport accepted no bytes",
            ));
        }

        written += count;
    }

    Ok(())
}

/// Reads exactly `buf.len()` bytes, looping over short reads.
pub fn read_exact<T: ReaderWriter + ?Sized>(io: &mut T, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let count = io.read(&mut buf[filled..])?;
        if count == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "transport closed while reading",
            ));
        }

        filled += count;
    }

    Ok(())
}

const DEFAULT_TIMEOUT_US: i64 = 30_000_000;

struct Pipe {
    queue: Mutex<(VecDeque<u8>, bool)>,
    ready: Condvar,
}

impl Pipe {
    fn new() -> Arc<Pipe> {
        Arc::new(Pipe {
            queue: Mutex::new((VecDeque::new(), false)),
            ready: Condvar::new(),
        })
    }
}

/// An in-process transport: two endpoints connected by a pair of byte
/// queues. Reads block (with timeout) until the peer writes, so a client
/// session and a server session can run against each other on two threads.
pub struct MemoryTransport {
    incoming: Arc<Pipe>,
    outgoing: Arc<Pipe>,
    recv_timeout_us: i64,
    send_timeout_us: i64,
    recv_count: u64,
    send_count: u64,
}

impl MemoryTransport {
    /// Creates two connected endpoints.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let left_to_right = Pipe::new();
        let right_to_left = Pipe::new();

        let left = MemoryTransport {
            incoming: right_to_left.clone(),
            outgoing: left_to_right.clone(),
            recv_timeout_us: DEFAULT_TIMEOUT_US,
            send_timeout_us: DEFAULT_TIMEOUT_US,
            recv_count: 0,
            send_count: 0,
        };

        let right = MemoryTransport {
            incoming: left_to_right,
            outgoing: right_to_left,
            recv_timeout_us: DEFAULT_TIMEOUT_US,
            send_timeout_us: DEFAULT_TIMEOUT_US,
            recv_count: 0,
            send_count: 0,
        };

        (left, right)
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.outgoing.queue.lock() {
            guard.1 = true;
            self.outgoing.ready.notify_all();
        }
    }
}

impl ReaderWriter for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = Duration::from_micros(self.recv_timeout_us.max(0) as u64);
        let mut guard = self
            .incoming
            .queue
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "transport poisoned"))?;

        while guard.0.is_empty() {
            if guard.1 {
                return Ok(0);
            }

            let (next, result) = self
                .incoming
                .ready
                .wait_timeout(guard, deadline)
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "transport poisoned"))?;
            guard = next;

            if result.timed_out() && guard.0.is_empty() {
                if guard.1 {
                    return Ok(0);
                }

                return Err(io::Error::new(io::ErrorKind::TimedOut, "recv timed out"));
            }
        }

        let mut count = 0;
        while count < buf.len() {
            match guard.0.pop_front() {
                Some(byte) => {
                    buf[count] = byte;
                    count += 1;
                }
                None => break,
            }
        }

        self.recv_count += count as u64;
        Ok(count)
    }

    fn writev(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let mut guard = self
            .outgoing
            .queue
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "transport poisoned"))?;

        if guard.1 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "peer endpoint dropped",
            ));
        }

        let mut count = 0;
        for buf in bufs {
            guard.0.extend(buf.iter().copied());
            count += buf.len();
        }

        self.outgoing.ready.notify_all();
        self.send_count += count as u64;
        Ok(count)
    }

    fn set_recv_timeout(&mut self, timeout_us: i64) {
        self.recv_timeout_us = timeout_us;
    }

    fn recv_timeout(&self) -> i64 {
        self.recv_timeout_us
    }

    fn set_send_timeout(&mut self, timeout_us: i64) {
        self.send_timeout_us = timeout_us;
    }

    fn send_timeout(&self) -> i64 {
        self.send_timeout_us
    }

    fn recv_bytes(&self) -> u64 {
        self.recv_count
    }

    fn send_bytes(&self) -> u64 {
        self.send_count
    }
}
