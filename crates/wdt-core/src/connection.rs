use std::io::{self, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use wdt_protocol::Frame;

/// One live socket carrying framed `wdt-protocol` traffic (spec §4.1), used
/// identically by a sender worker and a receiver worker. Reads are buffered
/// so [`Frame::decode`] never issues a syscall per byte; writes go straight
/// to the underlying stream since frames are already assembled in memory.
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    /// Connects to `addr`, used by the sender's probe and worker threads.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from the connect itself.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream)
    }

    /// Wraps an already-connected or already-accepted stream, used by the
    /// receiver after `TcpListener::accept`.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from cloning the stream handle.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    /// Sends one frame, flushing immediately so the peer sees it without an
    /// extra round trip waiting on Nagle or buffering.
    ///
    /// # Errors
    ///
    /// Returns [`wdt_protocol::ProtocolError::Io`] on any write failure.
    pub fn send(&mut self, frame: &Frame) -> Result<(), wdt_protocol::ProtocolError> {
        frame.encode(&mut self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Decodes the next frame off the wire, blocking until a full frame (or
    /// EOF at a frame boundary) arrives.
    ///
    /// # Errors
    ///
    /// Returns [`wdt_protocol::ProtocolError`] on malformed framing or a
    /// socket error.
    pub fn recv(&mut self) -> Result<Frame, wdt_protocol::ProtocolError> {
        Frame::decode(&mut self.reader)
    }

    /// Reads exactly `buf.len()` bytes, used to pull a `FILE_CHUNK` body
    /// straight off the wire (spec §4.1: the body is excluded from
    /// [`Frame`] and streamed separately).
    ///
    /// # Errors
    ///
    /// Propagates any I/O error, including an early EOF.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.reader.read_exact(buf)
    }

    /// Writes a raw body, used to stream a `FILE_CHUNK`'s bytes without
    /// going through [`Frame`].
    ///
    /// # Errors
    ///
    /// Propagates any I/O error.
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)
    }

    /// Sets the read timeout on the underlying socket (spec §6
    /// `read_timeout_ms`).
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from the underlying `setsockopt`.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    /// Sets the write timeout on the underlying socket (spec §6
    /// `write_timeout_ms`).
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from the underlying `setsockopt`.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.writer.set_write_timeout(timeout)
    }

    /// Shuts down both halves of the connection, used when a worker
    /// escalates and abandons its socket (spec §7 "Rewind and exit").
    pub fn shutdown(&mut self) {
        let _ = self.writer.shutdown(std::net::Shutdown::Both);
    }

    /// The peer's address, used to derive a fallback connection identity
    /// when `SETTINGS` doesn't carry one.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from the underlying `getpeername`.
    pub fn peer_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.writer.peer_addr()
    }
}
