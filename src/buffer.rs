//! Scroll/window buffer over the underlying byte source.
//!
//! [`WindowBuffer`] serves random-access byte reads against a source that
//! may be forward-only, keeping a bounded resident window. The owner marks
//! consumed prefixes with [`WindowBuffer::discard_through`]; eviction itself
//! is lazy and only happens under fill pressure. Seekable sources may
//! additionally be rewound or truncated, so any previously read region stays
//! reachable.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{MpaError, Result};
use crate::source::StreamSource;

/// Starting window capacity.
const INITIAL_CAPACITY: usize = 8192;

/// Capacity bound: hard on forward-only sources, soft (single oversized
/// reads excepted) on seekable ones.
pub(crate) const CAPACITY_LIMIT: usize = 16384;

/// Sentinel for "EOF not seen yet".
const NO_EOF: u64 = u64::MAX;

/// Resident window state. `data[..end]` holds the source bytes at absolute
/// offsets `[base, base + end)`; `data[..discard]` may be evicted.
struct Window {
    data: Vec<u8>,
    base: u64,
    end: usize,
    discard: usize,
}

impl Window {
    /// Abandon resident contents and restart the window at `offset`.
    fn reset_to(&mut self, offset: u64) {
        self.base = offset;
        self.end = 0;
        self.discard = 0;
    }

    /// Drop `count` committed bytes off the front of the window.
    fn compact(&mut self, count: usize) {
        debug_assert!(count <= self.discard && count <= self.end);
        self.data.copy_within(count..self.end, 0);
        self.base += count as u64;
        self.end -= count;
        self.discard -= count;
    }

    /// Grow the backing store to `capacity` (rounded up to a power of two).
    fn grow_to(&mut self, capacity: usize) {
        let new_len = capacity.next_power_of_two();
        if new_len > self.data.len() {
            self.data.resize(new_len, 0);
        }
    }
}

/// Position-tracking wrapper around the source; guarded by the source lock.
struct SourceState {
    inner: Box<dyn StreamSource>,
    pos: u64,
}

/// Random-access byte window over a possibly-forward-only source.
pub(crate) struct WindowBuffer {
    window: Mutex<Window>,
    source: Mutex<SourceState>,
    /// Absolute offset at which the source first returned 0 bytes.
    eof_offset: AtomicU64,
    can_seek: bool,
}

impl WindowBuffer {
    pub(crate) fn new(source: Box<dyn StreamSource>) -> Self {
        let can_seek = source.can_seek();
        let eof = source.byte_len().unwrap_or(NO_EOF);
        WindowBuffer {
            window: Mutex::new(Window {
                data: vec![0u8; INITIAL_CAPACITY],
                base: 0,
                end: 0,
                discard: 0,
            }),
            source: Mutex::new(SourceState { inner: source, pos: 0 }),
            eof_offset: AtomicU64::new(eof),
            can_seek,
        }
    }

    pub(crate) fn can_seek(&self) -> bool {
        self.can_seek
    }

    /// Absolute EOF offset, once it has been observed.
    pub(crate) fn eof_offset(&self) -> Option<u64> {
        match self.eof_offset.load(Ordering::Acquire) {
            NO_EOF => None,
            off => Some(off),
        }
    }

    fn note_eof(&self, offset: u64) {
        self.eof_offset.fetch_min(offset, Ordering::AcqRel);
    }

    /// Copy the source bytes at `[offset, offset + dst.len())` into `dst`.
    ///
    /// Returns the number of bytes copied; fewer than requested only at EOF.
    /// Fails with [`MpaError::BackwardSeek`] when the region has already
    /// been evicted on a forward-only source.
    pub(crate) fn read(&self, offset: u64, dst: &mut [u8]) -> Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        if offset >= self.eof_offset.load(Ordering::Acquire) {
            return Ok(0);
        }

        let mut w = self.window.lock();
        if offset < w.base {
            if !self.can_seek {
                return Err(MpaError::BackwardSeek { offset, base: w.base });
            }
            // rewind into a previously read region: restart the window there
            trace!("window rewind to offset {}", offset);
            w.reset_to(offset);
        }
        self.fill(&mut w, offset, dst.len())?;

        let start = (offset - w.base) as usize;
        if start >= w.end {
            return Ok(0);
        }
        let n = dst.len().min(w.end - start);
        dst[..n].copy_from_slice(&w.data[start..start + n]);
        Ok(n)
    }

    /// Single-byte read; `None` at EOF.
    pub(crate) fn read_byte(&self, offset: u64) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        match self.read(offset, &mut b)? {
            0 => Ok(None),
            _ => Ok(Some(b[0])),
        }
    }

    /// Raise the discard watermark: bytes before `offset` are no longer
    /// needed by the owner and may be evicted under fill pressure.
    pub(crate) fn discard_through(&self, offset: u64) {
        let mut w = self.window.lock();
        if offset <= w.base {
            return;
        }
        let rel = ((offset - w.base) as usize).min(w.end);
        if rel > w.discard {
            w.discard = rel;
        }
        if w.discard == w.end && w.end > 0 {
            // the whole window is committed; roll the counters forward
            let end = w.end;
            w.base += end as u64;
            w.end = 0;
            w.discard = 0;
        }
    }

    /// Make the window cover `[offset, offset + count)`, or as much of it as
    /// exists before EOF.
    fn fill(&self, w: &mut Window, offset: u64, count: usize) -> Result<()> {
        // A fully discarded window whose next read starts further ahead:
        // forward-only sources must consume the intervening bytes.
        if !self.can_seek && w.end == 0 && offset > w.base {
            self.skip_to(w, offset)?;
        }

        let needed_end = offset + count as u64;
        loop {
            let have_end = w.base + w.end as u64;
            if needed_end <= have_end || have_end >= self.eof_offset.load(Ordering::Acquire) {
                return Ok(());
            }

            let required = (needed_end - w.base) as usize;
            if required <= w.data.len() {
                if self.fill_tail(w)? == 0 {
                    return Ok(());
                }
                continue;
            }

            // out of room: evict the committed prefix, but never bytes the
            // current request still needs
            let reclaim = w.discard.min((offset - w.base) as usize);
            if reclaim > 0 {
                w.compact(reclaim);
                continue;
            }

            if w.data.len() < CAPACITY_LIMIT {
                let doubled = w.data.len() * 2;
                w.grow_to(doubled);
                continue;
            }

            if self.can_seek {
                if count > w.data.len() {
                    // one-shot oversized request; compact eagerly afterwards
                    trace!("window grows to {} for oversized read", count.next_power_of_two());
                    w.grow_to(count);
                    continue;
                }
                // abandon resident contents and restart at the request
                trace!("window truncate, restart at offset {}", offset);
                w.reset_to(offset);
                continue;
            }

            return Err(MpaError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "read window exceeds forward-only buffer capacity",
            )));
        }
    }

    /// Read-and-drop source bytes until the window base reaches `offset`.
    fn skip_to(&self, w: &mut Window, offset: u64) -> Result<()> {
        let mut src = self.source.lock();
        while w.base < offset {
            let span = ((offset - w.base) as usize).min(w.data.len());
            let n = src.inner.read(&mut w.data[..span])?;
            if n == 0 {
                self.note_eof(src.pos);
                return Ok(());
            }
            src.pos += n as u64;
            w.base += n as u64;
        }
        Ok(())
    }

    /// One read from the source into the free tail of the window.
    fn fill_tail(&self, w: &mut Window) -> Result<usize> {
        let target = w.base + w.end as u64;
        let end = w.end;
        let mut src = self.source.lock();
        if src.pos != target {
            debug_assert!(self.can_seek);
            src.inner.seek(target)?;
            src.pos = target;
        }
        let n = src.inner.read(&mut w.data[end..])?;
        if n == 0 {
            self.note_eof(target);
        } else {
            src.pos += n as u64;
            w.end += n;
        }
        Ok(n)
    }
}
