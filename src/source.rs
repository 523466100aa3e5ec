//! Byte source abstraction.
//!
//! The reader consumes bytes through [`StreamSource`], a minimal contract
//! over an underlying stream: sequential reads, optional absolute
//! positioning, and an optional total length. Standard `Read`/`Read + Seek`
//! types are adapted with [`ForwardSource`] and [`SeekSource`].

use std::io::{self, Read, Seek, SeekFrom};

/// A byte stream the reader can pull from.
///
/// EOF is signaled by a 0-length read. A source that cannot reposition
/// reports `can_seek() == false` and rejects `seek`; everything above it
/// then operates in forward-only mode.
pub trait StreamSource: Send {
    /// Read up to `buf.len()` bytes at the current position.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Move the current position to an absolute byte offset.
    fn seek(&mut self, offset: u64) -> io::Result<u64>;

    /// Whether this source supports absolute positioning.
    fn can_seek(&self) -> bool;

    /// Total length in bytes, when known.
    fn byte_len(&self) -> Option<u64>;
}

/// Adapter for seekable streams (`Read + Seek`).
pub struct SeekSource<R: Read + Seek + Send> {
    inner: R,
    len: Option<u64>,
}

impl<R: Read + Seek + Send> SeekSource<R> {
    /// Wrap a seekable stream, measuring its length up front.
    ///
    /// The stream is left positioned at its start.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0)).ok();
        inner.seek(SeekFrom::Start(0))?;
        Ok(SeekSource { inner, len })
    }

    /// Unwrap the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek + Send> StreamSource for SeekSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        self.inner.seek(SeekFrom::Start(offset))
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        self.len
    }
}

/// Adapter for forward-only streams (`Read` without `Seek`).
pub struct ForwardSource<R: Read + Send> {
    inner: R,
}

impl<R: Read + Send> ForwardSource<R> {
    /// Wrap a forward-only stream.
    pub fn new(inner: R) -> Self {
        ForwardSource { inner }
    }

    /// Unwrap the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Send> StreamSource for ForwardSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn seek(&mut self, _offset: u64) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream does not support seeking",
        ))
    }

    fn can_seek(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}
