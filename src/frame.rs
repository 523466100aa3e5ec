//! MPEG audio frames as catalog nodes.
//!
//! An [`MpaFrame`] records where a frame sits in the byte stream and in the
//! sample timeline, links forward to its successor, and serves the frame's
//! bytes to the decoder. The bytes come from the shared read window, or from
//! a frame-owned copy once the window is allowed to move past them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::WindowBuffer;
use crate::error::Result;
use crate::header::{ChannelMode, FrameHeader, MpegLayer, MpegVersion};

/// One MPEG audio frame in the catalog.
pub struct MpaFrame {
    offset: u64,
    number: u64,
    sample_offset: u64,
    header: FrameHeader,
    /// Frame length in bytes; 0 while a free-format frame awaits the next
    /// sync word.
    length: AtomicU64,
    next: Mutex<Option<Arc<MpaFrame>>>,
    saved: Mutex<Option<Vec<u8>>>,
    /// Crate-wide count of bytes held in frame-owned copies.
    saved_bytes: Arc<AtomicUsize>,
    window: Arc<WindowBuffer>,
}

impl MpaFrame {
    pub(crate) fn new(
        offset: u64,
        number: u64,
        sample_offset: u64,
        header: FrameHeader,
        window: Arc<WindowBuffer>,
        saved_bytes: Arc<AtomicUsize>,
    ) -> Self {
        let length = header.frame_length().map(u64::from).unwrap_or(0);
        MpaFrame {
            offset,
            number,
            sample_offset,
            header,
            length: AtomicU64::new(length),
            next: Mutex::new(None),
            saved: Mutex::new(None),
            saved_bytes,
            window,
        }
    }

    /// Absolute byte position of the 4-byte sync header.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Frame length in bytes, sync word through end of frame. 0 while a
    /// free-format frame's length is still unresolved.
    pub fn frame_length(&self) -> u64 {
        self.length.load(Ordering::Acquire)
    }

    /// 0-based position in the catalog.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Cumulative samples per channel of all prior frames.
    pub fn sample_offset(&self) -> u64 {
        self.sample_offset
    }

    /// Samples per channel this frame decodes to.
    pub fn sample_count(&self) -> u32 {
        self.header.sample_count
    }

    pub fn version(&self) -> MpegVersion {
        self.header.version
    }

    pub fn layer(&self) -> MpegLayer {
        self.header.layer
    }

    pub fn sample_rate(&self) -> u32 {
        self.header.sample_rate
    }

    pub fn channel_mode(&self) -> ChannelMode {
        self.header.channel_mode
    }

    pub fn channels(&self) -> u32 {
        self.header.channel_mode.channels()
    }

    /// Bit rate in bits per second; 0 for free format.
    pub fn bit_rate(&self) -> u32 {
        self.header.bit_rate
    }

    pub fn bit_rate_index(&self) -> u8 {
        self.header.bit_rate_index
    }

    pub fn is_free_format(&self) -> bool {
        self.header.is_free_format()
    }

    /// Copy bytes of this frame starting at `local_offset` into `dst`.
    ///
    /// Served from the frame-owned copy when one exists, otherwise through
    /// the shared read window.
    pub fn read(&self, local_offset: u64, dst: &mut [u8]) -> Result<usize> {
        let length = self.frame_length();
        if local_offset >= length {
            return Ok(0);
        }
        let span = (dst.len() as u64).min(length - local_offset) as usize;

        if let Some(saved) = self.saved.lock().as_ref() {
            let start = (local_offset as usize).min(saved.len());
            let n = span.min(saved.len() - start);
            dst[..n].copy_from_slice(&saved[start..start + n]);
            return Ok(n);
        }
        self.window.read(self.offset + local_offset, &mut dst[..span])
    }

    /// Copy this frame's bytes into frame-owned storage so they survive the
    /// window moving past them. No-op while a free-format length is pending
    /// (reads then fall back to the window, which can rewind).
    pub(crate) fn save_buffer(&self) -> Result<()> {
        let length = self.frame_length();
        if length == 0 {
            return Ok(());
        }
        let mut saved = self.saved.lock();
        if saved.is_some() {
            return Ok(());
        }
        let mut buf = vec![0u8; length as usize];
        let n = self.window.read(self.offset, &mut buf)?;
        // the final frame of a stream may be cut short at EOF
        buf.truncate(n);
        self.saved_bytes.fetch_add(buf.len(), Ordering::AcqRel);
        *saved = Some(buf);
        Ok(())
    }

    /// Backfill the length of a free-format frame once the next sync word
    /// (or EOF) pins down its far edge.
    pub(crate) fn resolve_length(&self, length: u64) {
        self.length.store(length, Ordering::Release);
    }

    pub(crate) fn next(&self) -> Option<Arc<MpaFrame>> {
        self.next.lock().clone()
    }

    pub(crate) fn set_next(&self, frame: Arc<MpaFrame>) {
        *self.next.lock() = Some(frame);
    }

    pub(crate) fn take_next(&self) -> Option<Arc<MpaFrame>> {
        self.next.lock().take()
    }
}

impl Drop for MpaFrame {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.get_mut().take() {
            self.saved_bytes.fetch_sub(saved.len(), Ordering::AcqRel);
        }
    }
}

impl std::fmt::Debug for MpaFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpaFrame")
            .field("number", &self.number)
            .field("offset", &self.offset)
            .field("frame_length", &self.frame_length())
            .field("sample_offset", &self.sample_offset)
            .field("sample_count", &self.sample_count())
            .field("version", &self.version())
            .field("layer", &self.layer())
            .field("bit_rate", &self.bit_rate())
            .field("sample_rate", &self.sample_rate())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SeekSource;
    use std::io::Cursor;

    fn frame_over(data: Vec<u8>, offset: u64) -> (Arc<MpaFrame>, Arc<AtomicUsize>) {
        let window = Arc::new(WindowBuffer::new(Box::new(
            SeekSource::new(Cursor::new(data)).unwrap(),
        )));
        let counter = Arc::new(AtomicUsize::new(0));
        let header = FrameHeader::parse(0xFFFB_9000).unwrap(); // 417 bytes
        let frame = Arc::new(MpaFrame::new(offset, 0, 0, header, window, counter.clone()));
        (frame, counter)
    }

    fn stream_with_frame_at(offset: usize) -> Vec<u8> {
        let mut data = vec![0u8; offset];
        data.extend([0xFF, 0xFB, 0x90, 0x00]);
        data.extend((0..413).map(|i| (i % 256) as u8));
        data
    }

    #[test]
    fn test_read_through_window() {
        let data = stream_with_frame_at(100);
        let (frame, _) = frame_over(data.clone(), 100);

        let mut out = vec![0u8; 417];
        assert_eq!(frame.read(0, &mut out).unwrap(), 417);
        assert_eq!(&out, &data[100..517]);

        // reads are clamped to the frame
        let mut tail = vec![0u8; 32];
        assert_eq!(frame.read(410, &mut tail).unwrap(), 7);
        assert_eq!(frame.read(417, &mut tail).unwrap(), 0);
    }

    #[test]
    fn test_saved_buffer_serves_reads_and_counts_bytes() {
        let data = stream_with_frame_at(0);
        let (frame, counter) = frame_over(data.clone(), 0);

        frame.save_buffer().unwrap();
        assert_eq!(counter.load(Ordering::Acquire), 417);

        let mut out = vec![0u8; 417];
        assert_eq!(frame.read(0, &mut out).unwrap(), 417);
        assert_eq!(&out, &data[..417]);

        drop(frame);
        assert_eq!(counter.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_unresolved_free_format_skips_save() {
        let window = Arc::new(WindowBuffer::new(Box::new(
            SeekSource::new(Cursor::new(vec![0u8; 1000])).unwrap(),
        )));
        let counter = Arc::new(AtomicUsize::new(0));
        let header = FrameHeader::parse(0xFFFB_0000).unwrap(); // free format
        let frame = MpaFrame::new(0, 0, 0, header, window, counter.clone());

        assert_eq!(frame.frame_length(), 0);
        frame.save_buffer().unwrap();
        assert_eq!(counter.load(Ordering::Acquire), 0);

        frame.resolve_length(240);
        assert_eq!(frame.frame_length(), 240);
    }
}
