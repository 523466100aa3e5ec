//! Public reader surface.
//!
//! [`MpaReader`] wraps a byte source, validates that it really is MPEG
//! audio, and exposes the frame catalog: pull frames in order, seek by
//! sample number on seekable sources, and query stream-level metadata.

use std::io::{self, Read, Seek};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::buffer::WindowBuffer;
use crate::error::{MpaError, Result};
use crate::frame::MpaFrame;
use crate::scanner::{ScanState, ScannedFrame, Scanner};
use crate::source::{ForwardSource, SeekSource, StreamSource};
use crate::tags::{Id3Tag, RiffHeader};
use crate::vbr::VbrInfo;

/// Retained-allocation ceiling for `read_to_end` on forward-only sources,
/// before any leading ID3v2 tag is added on top.
const READ_TO_END_MAX_ALLOCATION: usize = 40_000;

/// Poll interval while waiting for the consumer to drain frames.
const BACKPRESSURE_POLL: Duration = Duration::from_millis(500);

/// MPEG audio bitstream reader.
///
/// Construction consumes any leading tag/wrapper/side-info content and
/// requires two consecutive MPEG frames; anything else fails with
/// [`MpaError::InvalidStream`]. The reader owns its source exclusively for
/// its lifetime.
pub struct MpaReader {
    scanner: Scanner,
    window: Arc<WindowBuffer>,
    saved_bytes: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MpaReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpaReader").finish_non_exhaustive()
    }
}

impl MpaReader {
    /// Open a seekable source.
    pub fn new<R: Read + Seek + Send + 'static>(source: R) -> Result<Self> {
        let source = SeekSource::new(source)?;
        Self::with_source(Box::new(source))
    }

    /// Open a forward-only source. Seeking is unavailable and free-format
    /// streams are rejected.
    pub fn new_forward<R: Read + Send + 'static>(source: R) -> Result<Self> {
        Self::with_source(Box::new(ForwardSource::new(source)))
    }

    /// Open any [`StreamSource`].
    pub fn with_source(source: Box<dyn StreamSource>) -> Result<Self> {
        let window = Arc::new(WindowBuffer::new(source));
        let saved_bytes = Arc::new(AtomicUsize::new(0));
        let reader = MpaReader {
            scanner: Scanner::new(window.clone(), saved_bytes.clone()),
            window,
            saved_bytes,
        };

        // two clean frames up front, or this is not MPEG audio
        {
            let mut st = reader.scanner.state.lock();
            let mut frames = 0;
            while frames < 2 {
                match reader.scanner.find_next_frame(&mut st)? {
                    Some(ScannedFrame::Mpeg(_)) => frames += 1,
                    Some(_) => {}
                    None => return Err(MpaError::InvalidStream),
                }
            }
            debug!(
                "stream accepted: {} {}, {} Hz, {} channel(s)",
                st.first.as_ref().map(|f| f.version()).unwrap(),
                st.first.as_ref().map(|f| f.layer()).unwrap(),
                reader.sample_rate_locked(&st),
                reader.channels_locked(&st),
            );
        }
        Ok(reader)
    }

    /// Whether the underlying source supports seeking.
    pub fn can_seek(&self) -> bool {
        self.window.can_seek()
    }

    /// Stream sample rate: side-info totals when present, the first audio
    /// frame otherwise.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate_locked(&self.scanner.state.lock())
    }

    fn sample_rate_locked(&self, st: &ScanState) -> u32 {
        match &st.vbr_info {
            Some(vbr) => vbr.sample_rate,
            None => st.first.as_ref().map(|f| f.sample_rate()).unwrap_or(0),
        }
    }

    /// Stream channel count: side-info totals when present, the first audio
    /// frame otherwise.
    pub fn channels(&self) -> u32 {
        self.channels_locked(&self.scanner.state.lock())
    }

    fn channels_locked(&self, st: &ScanState) -> u32 {
        match &st.vbr_info {
            Some(vbr) => vbr.channels,
            None => st.first.as_ref().map(|f| f.channels()).unwrap_or(0),
        }
    }

    /// Total samples per channel in the stream.
    ///
    /// Side-info totals win when present. Without them a forward-only
    /// source reports -1 (unknown), and a seekable source scans to the end
    /// of the catalog.
    pub fn sample_count(&self) -> Result<i64> {
        if let Some(vbr) = self.vbr_info() {
            return Ok(vbr.total_samples as i64);
        }
        if !self.window.can_seek() {
            return Ok(-1);
        }
        self.read_to_end()?;
        let st = self.scanner.state.lock();
        match &st.last {
            Some(last) => Ok((last.sample_offset() + u64::from(last.sample_count())) as i64),
            None => Ok(-1),
        }
    }

    /// Samples per channel of the first audio frame, or 0 if none.
    pub fn first_frame_sample_count(&self) -> u32 {
        let st = self.scanner.state.lock();
        st.first.as_ref().map(|f| f.sample_count()).unwrap_or(0)
    }

    /// Side-info totals, when the stream opened with a Xing/Info/VBRI frame.
    pub fn vbr_info(&self) -> Option<VbrInfo> {
        self.scanner.state.lock().vbr_info
    }

    /// The primary ID3v2 tag, when one was found.
    pub fn id3v2_tag(&self) -> Option<Id3Tag> {
        self.scanner.state.lock().id3.clone()
    }

    /// The trailing ID3v1 tag, once the scan has passed it.
    pub fn id3v1_tag(&self) -> Option<Id3Tag> {
        self.scanner.state.lock().id3v1.clone()
    }

    /// The RIFF/WAVE wrapper, when the stream carried one.
    pub fn riff_header(&self) -> Option<RiffHeader> {
        self.scanner.state.lock().riff.clone()
    }

    /// Position the consumer cursor at the frame containing `sample`.
    ///
    /// Returns the landing frame's `sample_offset`, or -1 when the sample
    /// lies past the end of the stream. Fails with [`MpaError::CannotSeek`]
    /// on forward-only sources.
    pub fn seek_to(&self, sample: u64) -> Result<i64> {
        if !self.window.can_seek() {
            return Err(MpaError::CannotSeek);
        }
        let mut st = self.scanner.state.lock();
        let first = match &st.first {
            Some(first) => first.clone(),
            None => return Err(MpaError::InvalidStream),
        };

        let mut cursor = Some(first.clone());
        let mut remaining = sample / u64::from(first.sample_count());
        if let Some(current) = st.current.clone() {
            if current.number() <= remaining && current.sample_offset() <= sample {
                remaining -= current.number();
                cursor = Some(current);
            }
        }

        // with uniform frames, jump ahead by simple division; the walk may
        // run off the end, in which case the linear scan below settles it
        if !st.mixed_frame_size {
            while remaining > 0 {
                let Some(frame) = cursor.clone() else { break };
                cursor = self.advance_chain(&mut st, &frame)?;
                remaining -= 1;
            }
        }

        loop {
            let Some(frame) = cursor.clone() else { return Ok(-1) };
            if frame.sample_offset() + u64::from(frame.sample_count()) > sample {
                st.current = Some(frame.clone());
                return Ok(frame.sample_offset() as i64);
            }
            cursor = self.advance_chain(&mut st, &frame)?;
        }
    }

    /// Pull the next audio frame, or `None` once the stream is exhausted.
    ///
    /// On seekable sources the frame's bytes are copied aside and the read
    /// window is released past it. On forward-only sources the consumed
    /// head leaves the catalog; the returned handle owns its lifetime.
    pub fn next_frame(&self) -> Result<Option<Arc<MpaFrame>>> {
        let mut st = self.scanner.state.lock();
        let Some(frame) = st.current.clone() else {
            return Ok(None);
        };

        if self.window.can_seek() {
            frame.save_buffer()?;
            self.window
                .discard_through(frame.offset() + frame.frame_length());
        }

        if let Some(last) = st.last.clone() {
            if Arc::ptr_eq(&frame, &last) && !st.end_found {
                // extend the chain past any trailing tags until another
                // audio frame or EOF turns up
                while frame.next().is_none() && !st.end_found {
                    self.scanner.find_next_frame(&mut st)?;
                }
            }
        }

        st.current = frame.next();
        if !self.window.can_seek() {
            // consumed frames drop off the head so their bytes are freed
            // as soon as the caller lets go of them
            st.first = st.current.clone();
            frame.take_next();
        }
        Ok(Some(frame))
    }

    /// Drive the scanner until the end of the stream is found.
    ///
    /// On forward-only sources the scan pauses whenever the retained frame
    /// copies exceed the allocation ceiling, resuming as the consumer
    /// drains. A source torn down externally ends the scan silently.
    pub fn read_to_end(&self) -> Result<()> {
        let max_allocation = {
            let st = self.scanner.state.lock();
            READ_TO_END_MAX_ALLOCATION
                + st.id3.as_ref().map(|t| t.len() as usize).unwrap_or(0)
        };

        loop {
            {
                let mut st = self.scanner.state.lock();
                if st.end_found {
                    return Ok(());
                }
                match self.scanner.find_next_frame(&mut st) {
                    Ok(_) => {}
                    Err(MpaError::Io(ref e)) if is_disposed(e) => return Ok(()),
                    Err(e) => return Err(e),
                }
            }

            if !self.window.can_seek() {
                while self.saved_bytes.load(Ordering::Acquire) > max_allocation {
                    std::thread::sleep(BACKPRESSURE_POLL);
                }
            }
        }
    }

    /// Step to the successor of `frame`, running the scanner as needed.
    fn advance_chain(
        &self,
        st: &mut ScanState,
        frame: &Arc<MpaFrame>,
    ) -> Result<Option<Arc<MpaFrame>>> {
        loop {
            if let Some(next) = frame.next() {
                return Ok(Some(next));
            }
            if st.end_found {
                return Ok(None);
            }
            self.scanner.find_next_frame(st)?;
        }
    }
}

impl Drop for MpaReader {
    fn drop(&mut self) {
        // unlink the catalog iteratively; dropping a long Arc chain through
        // its own links would recurse once per frame
        let mut st = self.scanner.state.lock();
        let mut node = st.first.take();
        st.last = None;
        st.current = None;
        st.last_free = None;
        while let Some(frame) = node {
            node = frame.take_next();
        }
    }
}

/// An externally torn-down source, as distinct from a real read failure.
fn is_disposed(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
