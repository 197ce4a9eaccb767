//! Buffered line socket: sequential-looking send/receive operations over a
//! non-blocking byte transport.
//!
//! Each operation is resumable: it either completes or returns
//! [`Step::Pending`] once the transport would block, and a later call picks
//! up exactly where it left off. All progress lives in the socket itself
//! (send cursor, capture fill), so nothing is replayed on resumption.

use std::io::{self, Read, Write};

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::runtime::task::Step;

/// Scratch size for pulling inbound chunks off the transport.
const CHUNK: usize = 512;

/// Byte transport the socket drives: non-blocking read/write plus a
/// graceful-close request.
pub trait Transport: Read + Write {
    /// Ask the transport to close the peer connection gracefully.
    fn request_close(&mut self) -> io::Result<()>;
}

impl Transport for mio::net::TcpStream {
    fn request_close(&mut self) -> io::Result<()> {
        self.shutdown(std::net::Shutdown::Write)
    }
}

/// Fixed-capacity buffered socket for delimiter-terminated line exchange.
///
/// The capture buffer never grows past its capacity; input beyond the
/// delimiter or the capacity is consumed from the transport and dropped.
#[derive(Debug)]
pub struct LineSock {
    /// Captured bytes of the read in progress (or last completed).
    buf: BytesMut,
    capacity: usize,
    /// Cursor of the send operation in flight.
    sent: usize,
}

impl LineSock {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            sent: 0,
        }
    }

    /// Captured bytes of the last `read_until`.
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Number of captured bytes, never more than the capacity.
    pub fn data_len(&self) -> usize {
        self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    /// Reset capture state before starting a new `read_until`.
    pub fn begin_read(&mut self) {
        self.buf.clear();
    }

    /// Hand `bytes` to the transport, resuming from the current cursor.
    /// Completes only once every byte has been accepted.
    pub fn send<T: Write>(&mut self, transport: &mut T, bytes: &[u8]) -> io::Result<Step> {
        flush(transport, bytes, &mut self.sent)
    }

    /// `send` over a string's bytes; no delimiter is appended.
    pub fn send_text<T: Write>(&mut self, transport: &mut T, text: &str) -> io::Result<Step> {
        flush(transport, text.as_bytes(), &mut self.sent)
    }

    /// Send the bytes captured by the last read.
    pub fn send_captured<T: Write>(&mut self, transport: &mut T) -> io::Result<Step> {
        let Self { buf, sent, .. } = self;
        flush(transport, &buf[..], sent)
    }

    /// Accumulate inbound bytes until the delimiter is seen or the buffer
    /// is full. The delimiter is consumed but not captured; anything pulled
    /// off the transport beyond it is dropped. A zero-length read (peer
    /// EOF) is a terminal transport condition.
    pub fn read_until<T: Read>(&mut self, transport: &mut T, delim: u8) -> io::Result<Step> {
        let mut chunk = [0u8; CHUNK];
        loop {
            let n = match transport.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "EOF"));
                }
                Ok(n) => n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Step::Pending),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            for &byte in &chunk[..n] {
                if byte == delim {
                    return Ok(Step::Complete);
                }
                if self.buf.len() < self.capacity {
                    self.buf.put_u8(byte);
                    if self.buf.len() == self.capacity {
                        return Ok(Step::Complete);
                    }
                }
                // past capacity: consumed, not kept
            }
        }
    }

    /// Request a graceful close. Anything the peer still has in flight is
    /// drained and dropped first. Transport teardown is reported back
    /// through the event loop, not through this call.
    pub fn close<T: Transport>(&mut self, transport: &mut T) {
        let mut scrap = [0u8; CHUNK];
        loop {
            match transport.read(&mut scrap) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        if let Err(e) = transport.request_close() {
            debug!(error = %e, "close request failed");
        }
    }
}

/// Drive one resumable write from `*sent`.
fn flush<T: Write>(transport: &mut T, bytes: &[u8], sent: &mut usize) -> io::Result<Step> {
    while *sent < bytes.len() {
        match transport.write(&bytes[*sent..]) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
            }
            Ok(n) => *sent += n,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Step::Pending),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    *sent = 0;
    Ok(Step::Complete)
}
