//! Byte-wise resync scanner.
//!
//! The scanner walks the stream one candidate position at a time: consume
//! recognizable tags and wrappers, admit MPEG frames into the catalog, and
//! slide a single byte forward whenever nothing matches. Free-format frame
//! lengths resolve one step late: only the next genuine sync word (or EOF)
//! pins down where such a frame ends, so every scan pass finishes by
//! settling whichever free-format frame was pending when it started.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::WindowBuffer;
use crate::error::{MpaError, Result};
use crate::frame::MpaFrame;
use crate::header::FrameHeader;
use crate::probe::FrameProbe;
use crate::tags::{Id3Tag, Id3Version, RiffHeader};
use crate::vbr::VbrInfo;

/// One construct recognized by a scan pass.
#[derive(Debug)]
pub(crate) enum ScannedFrame {
    /// An audio frame, already appended to the catalog.
    Mpeg(Arc<MpaFrame>),
    /// An ID3v2 block (leading, or merged mid-stream).
    Id3v2(Id3Tag),
    /// A 128-byte ID3v1 trailer.
    Id3v1(Id3Tag),
    /// A RIFF/WAVE wrapper.
    Riff(RiffHeader),
    /// A Xing/Info/VBRI side-info frame; not audio, not in the catalog.
    Vbr(VbrInfo),
}

/// Scanner and catalog state, guarded by the frame lock.
pub(crate) struct ScanState {
    /// Next byte position the scanner will inspect.
    pub read_offset: u64,
    /// No further frame exists past the last one scanned.
    pub end_found: bool,
    /// `sample_count` varies across the stream; disables the seek fast path.
    pub mixed_frame_size: bool,
    pub id3: Option<Id3Tag>,
    pub id3v1: Option<Id3Tag>,
    pub riff: Option<RiffHeader>,
    pub vbr_info: Option<VbrInfo>,
    pub first: Option<Arc<MpaFrame>>,
    pub last: Option<Arc<MpaFrame>>,
    /// Consumer cursor for `next_frame`.
    pub current: Option<Arc<MpaFrame>>,
    /// Most recent free-format frame whose length is still unresolved.
    pub last_free: Option<Arc<MpaFrame>>,
}

pub(crate) struct Scanner {
    pub state: Mutex<ScanState>,
    window: Arc<WindowBuffer>,
    saved_bytes: Arc<AtomicUsize>,
}

/// An MPEG frame candidate bound to an offset, pending validation.
struct MpegCandidate {
    offset: u64,
    header: FrameHeader,
}

impl FrameProbe for MpegCandidate {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn len(&self) -> u64 {
        self.header.frame_length().map(u64::from).unwrap_or(0)
    }

    fn validate(&mut self, window: &WindowBuffer) -> Result<bool> {
        // the sync word is already in hand; confirm the header region (CRC
        // word included when present) is really there
        let need = if self.header.has_crc { 6 } else { 4 };
        let mut buf = [0u8; 6];
        Ok(window.read(self.offset, &mut buf[..need])? == need)
    }
}

impl MpegCandidate {
    /// Bytes to advance past this frame once accepted. A free-format frame
    /// only surrenders its header; the resync loop then hunts for the next
    /// sync word through its payload.
    fn advance(&self) -> u64 {
        self.header.frame_length().map(u64::from).unwrap_or(4)
    }
}

impl Scanner {
    pub(crate) fn new(window: Arc<WindowBuffer>, saved_bytes: Arc<AtomicUsize>) -> Self {
        Scanner {
            state: Mutex::new(ScanState {
                read_offset: 0,
                end_found: false,
                mixed_frame_size: false,
                id3: None,
                id3v1: None,
                riff: None,
                vbr_info: None,
                first: None,
                last: None,
                current: None,
                last_free: None,
            }),
            window,
            saved_bytes,
        }
    }

    /// Advance the scan by one construct. The caller holds the frame lock.
    ///
    /// On every exit path (acceptance, EOF, or an I/O error) a free-format
    /// frame that was pending on entry gets its length settled against the
    /// last observed sync position, and forward-only sources fail here
    /// because such a frame can never be served again.
    pub(crate) fn find_next_frame(&self, st: &mut ScanState) -> Result<Option<ScannedFrame>> {
        if st.end_found {
            return Ok(None);
        }

        let entry_free = st.last_free.clone();
        let mut last_frame_start = st.read_offset;

        let result = self.scan(st, &mut last_frame_start);
        self.settle_free_format(st, entry_free, last_frame_start)?;
        result
    }

    fn settle_free_format(
        &self,
        st: &mut ScanState,
        entry_free: Option<Arc<MpaFrame>>,
        last_frame_start: u64,
    ) -> Result<()> {
        let Some(free) = entry_free else {
            return Ok(());
        };
        if free.frame_length() == 0 {
            free.resolve_length(last_frame_start - free.offset());
            if !self.window.can_seek() {
                return Err(MpaError::FreeFormatRequiresSeek {
                    offset: free.offset(),
                });
            }
        }
        let still_pending = st
            .last_free
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &free));
        if still_pending {
            st.last_free = None;
        }
        Ok(())
    }

    fn scan(&self, st: &mut ScanState, last_frame_start: &mut u64) -> Result<Option<ScannedFrame>> {
        let mut sync = [0u8; 4];
        if self.window.read(st.read_offset, &mut sync)? < 4 {
            st.end_found = true;
            return Ok(None);
        }

        loop {
            let word = BigEndian::read_u32(&sync);
            *last_frame_start = st.read_offset;

            // a leading ID3v2 tag, before any has been accepted
            if st.id3.is_none() {
                if let Some(mut tag) = Id3Tag::try_sync_v2(word, st.read_offset) {
                    if tag.validate(&self.window)? {
                        debug!("ID3v2 tag at offset {}, {} bytes", tag.offset(), tag.len());
                        st.read_offset += tag.len();
                        self.discard(st);
                        st.id3 = Some(tag.clone());
                        return Ok(Some(ScannedFrame::Id3v2(tag)));
                    }
                }
            }

            // a RIFF wrapper, before any audio has been accepted
            if st.first.is_none() && st.riff.is_none() {
                if let Some(mut riff) = RiffHeader::try_sync(word, st.read_offset) {
                    if riff.validate(&self.window)? {
                        debug!("RIFF wrapper at offset {}, data at +{}", riff.offset(), riff.len());
                        st.read_offset += riff.len();
                        self.discard(st);
                        st.riff = Some(riff.clone());
                        return Ok(Some(ScannedFrame::Riff(riff)));
                    }
                }
            }

            // an MPEG audio frame
            if let Some(header) = FrameHeader::parse(word) {
                // while a free-format frame is unresolved, a sync whose
                // format disagrees with it is payload, not a frame
                let format_matches = match &st.last_free {
                    Some(free) => {
                        free.version() == header.version
                            && free.layer() == header.layer
                            && free.sample_rate() == header.sample_rate
                    }
                    None => true,
                };
                if format_matches {
                    let mut candidate = MpegCandidate {
                        offset: st.read_offset,
                        header,
                    };
                    if candidate.validate(&self.window)? {
                        return self.accept(st, candidate);
                    }
                }
            }

            // a mid-stream ID3 tag, once audio has been seen
            if st.first.is_some() {
                if let Some(mut tag) = Id3Tag::try_sync(word, st.read_offset) {
                    if tag.validate(&self.window)? {
                        debug!(
                            "mid-stream ID3 tag at offset {}, {} bytes",
                            tag.offset(),
                            tag.len()
                        );
                        st.read_offset += tag.len();
                        self.discard(st);
                        let scanned = match tag.version() {
                            Id3Version::Id3v1 => {
                                st.id3v1 = Some(tag.clone());
                                ScannedFrame::Id3v1(tag)
                            }
                            Id3Version::Id3v2 => {
                                match st.id3.as_mut() {
                                    Some(primary) => primary.merge(&tag),
                                    None => st.id3 = Some(tag.clone()),
                                }
                                ScannedFrame::Id3v2(tag)
                            }
                        };
                        return Ok(Some(scanned));
                    }
                }
            }

            // nothing matched: slide one byte and resync
            trace!("resync slide past offset {}", st.read_offset);
            st.read_offset += 1;
            self.discard(st);
            sync.copy_within(1.., 0);
            if self.window.read(st.read_offset + 3, &mut sync[3..])? < 1 {
                st.end_found = true;
                return Ok(None);
            }
        }
    }

    fn accept(&self, st: &mut ScanState, candidate: MpegCandidate) -> Result<Option<ScannedFrame>> {
        let advance = candidate.advance();
        let MpegCandidate { offset, header } = candidate;

        // a stream's first frame may be a silent side-info table rather
        // than audio
        if st.first.is_none() && st.vbr_info.is_none() {
            if let Some(info) = VbrInfo::parse(&header, offset, &self.window)? {
                st.vbr_info = Some(info);
                st.read_offset = offset + advance;
                self.discard(st);
                return Ok(Some(ScannedFrame::Vbr(info)));
            }
        }

        let (number, sample_offset) = match &st.last {
            Some(last) => (
                last.number() + 1,
                last.sample_offset() + u64::from(last.sample_count()),
            ),
            None => (0, 0),
        };
        let frame = Arc::new(MpaFrame::new(
            offset,
            number,
            sample_offset,
            header,
            self.window.clone(),
            self.saved_bytes.clone(),
        ));

        match &st.last {
            Some(last) => {
                if st.first.as_ref().map(|f| f.sample_count()) != Some(frame.sample_count()) {
                    st.mixed_frame_size = true;
                }
                last.set_next(frame.clone());
            }
            None => {
                st.first = Some(frame.clone());
                st.current = Some(frame.clone());
            }
        }
        st.last = Some(frame.clone());

        if frame.is_free_format() {
            st.last_free = Some(frame.clone());
        } else if st.last_free.is_some() {
            // leaving free format; the pending frame settles on scope exit
            st.last_free = None;
        }

        st.read_offset = offset + advance;
        if !self.window.can_seek() {
            // the window will move past this frame; keep its bytes alive
            frame.save_buffer()?;
        }
        self.discard(st);

        trace!(
            "frame {} at offset {}: {} bytes, {} samples",
            frame.number(),
            frame.offset(),
            frame.frame_length(),
            frame.sample_count()
        );
        Ok(Some(ScannedFrame::Mpeg(frame)))
    }

    /// Raise the discard watermark to the scan position.
    ///
    /// On a seekable source the watermark holds back at an unresolved
    /// free-format frame, whose bytes the decoder may still re-read. A
    /// forward-only source can never serve such a frame again anyway (it
    /// fails at settlement), so there the watermark always advances and the
    /// window stays free to compact however far the next sync turns out to
    /// be.
    fn discard(&self, st: &ScanState) {
        let mut target = st.read_offset;
        if self.window.can_seek() {
            if let Some(free) = &st.last_free {
                if free.frame_length() == 0 {
                    target = target.min(free.offset());
                }
            }
        }
        self.window.discard_through(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ForwardSource, SeekSource};
    use std::io::Cursor;

    fn scanner_over(data: Vec<u8>) -> Scanner {
        let window = Arc::new(WindowBuffer::new(Box::new(
            SeekSource::new(Cursor::new(data)).unwrap(),
        )));
        Scanner::new(window, Arc::new(AtomicUsize::new(0)))
    }

    fn forward_scanner_over(data: Vec<u8>) -> Scanner {
        let window = Arc::new(WindowBuffer::new(Box::new(ForwardSource::new(
            Cursor::new(data),
        ))));
        Scanner::new(window, Arc::new(AtomicUsize::new(0)))
    }

    /// MPEG1 Layer III 128 kbps 44.1 kHz stereo frame: 417 bytes.
    fn cbr_frame() -> Vec<u8> {
        let mut f = vec![0xFF, 0xFB, 0x90, 0x00];
        f.extend(vec![0xAAu8; 413]);
        f
    }

    #[test]
    fn test_scan_emits_frames_in_order() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend(cbr_frame());
        }
        let scanner = scanner_over(data);
        let mut st = scanner.state.lock();

        for i in 0..3u64 {
            match scanner.find_next_frame(&mut st).unwrap() {
                Some(ScannedFrame::Mpeg(f)) => {
                    assert_eq!(f.number(), i);
                    assert_eq!(f.offset(), i * 417);
                    assert_eq!(f.sample_offset(), i * 1152);
                }
                _ => panic!("expected an MPEG frame"),
            }
        }
        assert!(scanner.find_next_frame(&mut st).unwrap().is_none());
        assert!(st.end_found);
    }

    #[test]
    fn test_resync_skips_garbage_prefix() {
        let mut data = vec![0x00u8; 1000];
        data.extend(cbr_frame());
        data.extend(cbr_frame());
        let scanner = scanner_over(data);
        let mut st = scanner.state.lock();

        match scanner.find_next_frame(&mut st).unwrap() {
            Some(ScannedFrame::Mpeg(f)) => assert_eq!(f.offset(), 1000),
            _ => panic!("expected an MPEG frame"),
        }
    }

    #[test]
    fn test_leading_id3v2_consumed_before_audio() {
        let mut data = vec![
            b'I', b'D', b'3', 0x04, 0x00, 0x00, 0x00, 0x00, 0x01, 0x03,
        ];
        data.extend(vec![0u8; 131]); // 0x0103 syncsafe = 131
        data.extend(cbr_frame());
        let scanner = scanner_over(data);
        let mut st = scanner.state.lock();

        match scanner.find_next_frame(&mut st).unwrap() {
            Some(ScannedFrame::Id3v2(tag)) => {
                assert_eq!(tag.offset(), 0);
                assert_eq!(tag.len(), 141);
            }
            _ => panic!("expected the ID3v2 tag"),
        }
        match scanner.find_next_frame(&mut st).unwrap() {
            Some(ScannedFrame::Mpeg(f)) => assert_eq!(f.offset(), 141),
            _ => panic!("expected an MPEG frame"),
        }
        assert!(st.id3.is_some());
    }

    #[test]
    fn test_free_format_lengths_settle_on_next_sync() {
        // three free-format frames of 200 bytes each
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend([0xFF, 0xFB, 0x00, 0x00]);
            data.extend(vec![0x11u8; 196]);
        }
        let scanner = scanner_over(data);
        let mut st = scanner.state.lock();

        let mut frames = Vec::new();
        while let Some(item) = scanner.find_next_frame(&mut st).unwrap() {
            if let ScannedFrame::Mpeg(f) = item {
                frames.push(f);
            }
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].frame_length(), 200);
        assert_eq!(frames[1].frame_length(), 200);
        // the stream's last frame runs to the final full sync window
        assert!(frames[2].frame_length() > 0);
        assert!(frames[2].is_free_format());
    }

    #[test]
    fn test_free_format_fails_on_forward_only() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend([0xFF, 0xFB, 0x00, 0x00]);
            data.extend(vec![0x11u8; 196]);
        }
        let scanner = forward_scanner_over(data);
        let mut st = scanner.state.lock();

        // the free-format frame itself is admitted...
        assert!(matches!(
            scanner.find_next_frame(&mut st).unwrap(),
            Some(ScannedFrame::Mpeg(_))
        ));
        // ...and the pass that settles its length fails
        let err = scanner.find_next_frame(&mut st).unwrap_err();
        assert!(matches!(err, MpaError::FreeFormatRequiresSeek { offset: 0 }));
    }

    #[test]
    fn test_free_format_wider_than_window_fails_on_forward_only() {
        // the payload runs far past the window's forward-only capacity
        // bound before the next sync, so the resync slide has to churn
        // through it; the failure must still be the free-format rejection,
        // not a buffer-capacity error
        let mut data = Vec::new();
        for _ in 0..2 {
            data.extend([0xFF, 0xFB, 0x00, 0x00]);
            data.extend(vec![0x11u8; 20_000 - 4]);
        }
        let scanner = forward_scanner_over(data);
        let mut st = scanner.state.lock();

        assert!(matches!(
            scanner.find_next_frame(&mut st).unwrap(),
            Some(ScannedFrame::Mpeg(_))
        ));
        let err = scanner.find_next_frame(&mut st).unwrap_err();
        assert!(matches!(err, MpaError::FreeFormatRequiresSeek { offset: 0 }));
    }

    #[test]
    fn test_format_guard_only_fires_inside_free_format() {
        // Layer II frame followed by a Layer III frame, no free format:
        // both must be admitted
        let mut data = vec![0xFF, 0xFD, 0x90, 0x00]; // MPEG1 Layer II 160k
        let l2_len = FrameHeader::parse(0xFFFD_9000).unwrap().frame_length().unwrap() as usize;
        data.extend(vec![0u8; l2_len - 4]);
        data.extend(cbr_frame());
        let scanner = scanner_over(data);
        let mut st = scanner.state.lock();

        let first = match scanner.find_next_frame(&mut st).unwrap() {
            Some(ScannedFrame::Mpeg(f)) => f,
            _ => panic!("expected a frame"),
        };
        assert_eq!(first.layer(), crate::header::MpegLayer::LayerII);
        let second = match scanner.find_next_frame(&mut st).unwrap() {
            Some(ScannedFrame::Mpeg(f)) => f,
            _ => panic!("expected a frame"),
        };
        assert_eq!(second.layer(), crate::header::MpegLayer::LayerIII);
        assert_eq!(second.number(), 1);
    }

    #[test]
    fn test_mid_stream_id3v1_accepted_after_audio() {
        let mut data = cbr_frame();
        data.extend(b"TAG");
        data.extend(vec![0u8; 125]);
        let scanner = scanner_over(data);
        let mut st = scanner.state.lock();

        assert!(matches!(
            scanner.find_next_frame(&mut st).unwrap(),
            Some(ScannedFrame::Mpeg(_))
        ));
        match scanner.find_next_frame(&mut st).unwrap() {
            Some(ScannedFrame::Id3v1(tag)) => assert_eq!(tag.offset(), 417),
            _ => panic!("expected the trailing ID3v1 tag"),
        }
        assert!(st.id3v1.is_some());
    }

    #[test]
    fn test_id3v1_prefix_is_skipped_as_garbage() {
        let mut data = b"TAG".to_vec();
        data.extend(vec![0u8; 125]);
        data.extend(cbr_frame());
        let scanner = scanner_over(data);
        let mut st = scanner.state.lock();

        // before any audio, "TAG" is not a recognized construct
        match scanner.find_next_frame(&mut st).unwrap() {
            Some(ScannedFrame::Mpeg(f)) => assert_eq!(f.offset(), 128),
            _ => panic!("expected the first audio frame"),
        }
        assert!(st.id3v1.is_none());
    }
}
