//! Transport layer abstraction.
//!
//! The session only needs a byte pipe. Anything that can move raw bytes
//! (UART, socket, pipe, shared memory) implements [`Transport`] and the
//! framing engine runs over it unchanged.
//!
//! # Implementations
//!
//! - `LoopbackTransport`: bytes written are read back, for testing
//! - `StdTransport`: wraps `std::io` Read/Write types (requires `std`)
//! - `memory::duplex`: a connected in-process pair (requires `std`)
//!
//! # Example
//!
//! ```rust
//! use xhdlc::transport::{LoopbackTransport, Transport};
//!
//! let mut transport = LoopbackTransport::new();
//! transport.write_all(b"Hello").unwrap();
//!
//! let mut buf = [0u8; 32];
//! let n = transport.read(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"Hello");
//! ```

use alloc::collections::VecDeque;

use crate::error::{Error, Result};

#[cfg(feature = "std")]
pub mod memory;

/// A raw byte pipe to the peer.
///
/// Errors returned here reach the caller of `Session::read` or
/// `Session::write` unchanged.
pub trait Transport {
    /// Reads available bytes into `buf`.
    ///
    /// `Ok(0)` means nothing arrived in time. It is not end of stream;
    /// a closed link should be reported as an error.
    ///
    /// An empty read must return within roughly the session's poll
    /// interval. A writer that performs the read itself only sees its
    /// deadline, an ACK or `close` once the read returns, so a longer
    /// block stretches retransmission timing by the same amount. Blocking
    /// `std::io` streams should be given a short read timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes bytes from `buf`, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flushes any buffered data.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Writes all bytes, retrying until complete.
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..])?;
            if n == 0 {
                return Err(Error::WriteZero);
            }
            written += n;
        }
        self.flush()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// A loopback transport for testing.
///
/// Data written is immediately available to be read back.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    buffer: VecDeque<u8>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
        }
    }

    /// Returns the number of bytes available to read.
    pub fn available(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Transport for LoopbackTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.buffer.len());
        for (dst, src) in buf.iter_mut().zip(self.buffer.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.buffer.extend(buf);
        Ok(buf.len())
    }
}

/// Wrapper for `std::io` types such as serial ports and sockets.
///
/// Read timeouts (`WouldBlock`, `TimedOut`) become `Ok(0)` and interrupted
/// calls are retried. End of stream is reported as `UnexpectedEof`.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct StdTransport<T> {
    inner: T,
}

#[cfg(feature = "std")]
impl<T> StdTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(feature = "std")]
impl<T: std::io::Read + std::io::Write> Transport for StdTransport<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        use std::io::ErrorKind;

        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match std::io::Read::read(&mut self.inner, buf) {
                Ok(0) => return Err(std::io::Error::from(ErrorKind::UnexpectedEof).into()),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Ok(0);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            match std::io::Write::write(&mut self.inner, buf) {
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                other => return other.map_err(Error::from),
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        std::io::Write::flush(&mut self.inner).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stingy;

    /// Accepts at most `limit` bytes per call.
    struct Trickle {
        limit: usize,
        calls: usize,
        sink: LoopbackTransport,
    }

    impl Transport for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.sink.read(buf)
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            self.calls += 1;
            let n = buf.len().min(self.limit);
            self.sink.write(&buf[..n])
        }
    }

    impl Transport for Stingy {
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }

        fn write(&mut self, _buf: &[u8]) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_loopback() {
        let mut transport = LoopbackTransport::new();

        let data = b"Hello, World!";
        let written = transport.write(data).unwrap();
        assert_eq!(written, data.len());
        assert_eq!(transport.available(), data.len());

        let mut buf = [0u8; 32];
        let read = transport.read(&mut buf).unwrap();
        assert_eq!(read, data.len());
        assert_eq!(&buf[..read], data);
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_loopback_partial_read() {
        let mut transport = LoopbackTransport::new();
        transport.write_all(b"abcdef").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(transport.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn test_write_all_rejects_zero_progress() {
        assert!(matches!(Stingy.write_all(b"x"), Err(Error::WriteZero)));
        assert!(Stingy.write_all(b"").is_ok());
    }

    #[test]
    fn test_write_all_resumes_partial_writes() {
        let mut transport = Trickle {
            limit: 3,
            calls: 0,
            sink: LoopbackTransport::new(),
        };
        transport.write_all(b"abcdefgh").unwrap();
        assert_eq!(transport.calls, 3);

        let mut buf = [0u8; 16];
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abcdefgh");
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_std_transport_eof_is_error() {
        let mut transport = StdTransport::new(std::io::Cursor::new(alloc::vec::Vec::new()));
        let mut buf = [0u8; 8];
        match transport.read(&mut buf) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected {:?}", other),
        }

        transport.write_all(b"frame").unwrap();
        assert_eq!(transport.into_inner().into_inner(), b"frame");
    }
}
