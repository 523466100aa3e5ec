//! Xing/Info/VBRI side-info headers.
//!
//! Variable-bit-rate streams open with a "silent" frame whose payload is a
//! table describing the whole stream instead of audio. When present, its
//! totals replace the catalog-derived stream metadata.

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use crate::buffer::WindowBuffer;
use crate::error::Result;
use crate::header::{ChannelMode, FrameHeader, MpegVersion};

/// Which side-info marker was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbrTag {
    /// "Xing": variable-bit-rate stream.
    Xing,
    /// "Info": LAME's marker for constant-bit-rate streams.
    Info,
    /// "VBRI": Fraunhofer variable-bit-rate header.
    Vbri,
}

/// Stream totals recovered from a side-info header.
#[derive(Debug, Clone, Copy)]
pub struct VbrInfo {
    /// Marker that produced this record.
    pub tag: VbrTag,
    /// Total samples per channel in the stream.
    pub total_samples: u64,
    /// Sample rate of the stream.
    pub sample_rate: u32,
    /// Channel count of the stream.
    pub channels: u32,
}

/// Xing flag: a frame-count field is present.
const XING_FLAG_FRAMES: u32 = 0x1;

/// Offset of the VBRI block from the end of the frame header.
const VBRI_OFFSET: u64 = 32;

impl VbrInfo {
    /// True for the "Info" marker, which tags CBR streams.
    pub fn is_cbr(&self) -> bool {
        self.tag == VbrTag::Info
    }

    /// Probe a candidate first frame for a side-info table.
    ///
    /// `offset` is the absolute position of the frame's sync word. Returns
    /// `Ok(None)` when the frame carries ordinary audio.
    pub(crate) fn parse(
        header: &FrameHeader,
        offset: u64,
        window: &WindowBuffer,
    ) -> Result<Option<VbrInfo>> {
        if let Some(info) = Self::parse_xing(header, offset, window)? {
            return Ok(Some(info));
        }
        Self::parse_vbri(header, offset, window)
    }

    fn parse_xing(
        header: &FrameHeader,
        offset: u64,
        window: &WindowBuffer,
    ) -> Result<Option<VbrInfo>> {
        // the marker sits right after the side-information block
        let side_info = match (header.version, header.channel_mode) {
            (MpegVersion::Mpeg1, ChannelMode::Mono) => 17,
            (MpegVersion::Mpeg1, _) => 32,
            (_, ChannelMode::Mono) => 9,
            (_, _) => 17,
        };

        let mut block = [0u8; 12];
        if window.read(offset + 4 + side_info, &mut block)? < block.len() {
            return Ok(None);
        }
        let tag = match &block[..4] {
            b"Xing" => VbrTag::Xing,
            b"Info" => VbrTag::Info,
            _ => return Ok(None),
        };

        let flags = BigEndian::read_u32(&block[4..8]);
        if flags & XING_FLAG_FRAMES == 0 {
            // without a frame count there is nothing here worth keeping
            return Ok(None);
        }
        let frames = u64::from(BigEndian::read_u32(&block[8..12]));

        debug!("{:?} header at offset {}: {} frames", tag, offset, frames);
        Ok(Some(VbrInfo {
            tag,
            total_samples: frames * u64::from(header.sample_count),
            sample_rate: header.sample_rate,
            channels: header.channel_mode.channels(),
        }))
    }

    fn parse_vbri(
        header: &FrameHeader,
        offset: u64,
        window: &WindowBuffer,
    ) -> Result<Option<VbrInfo>> {
        // VBRI: marker, version u16, delay u16, quality u16, bytes u32,
        // frames u32
        let mut block = [0u8; 18];
        if window.read(offset + 4 + VBRI_OFFSET, &mut block)? < block.len() {
            return Ok(None);
        }
        if &block[..4] != b"VBRI" {
            return Ok(None);
        }
        let frames = u64::from(BigEndian::read_u32(&block[14..18]));

        debug!("VBRI header at offset {}: {} frames", offset, frames);
        Ok(Some(VbrInfo {
            tag: VbrTag::Vbri,
            total_samples: frames * u64::from(header.sample_count),
            sample_rate: header.sample_rate,
            channels: header.channel_mode.channels(),
        }))
    }
}
