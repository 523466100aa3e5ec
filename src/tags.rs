//! ID3 and RIFF container framing.
//!
//! Only the framing contract matters here: recognize the construct, confirm
//! it is well-formed, and report how many bytes to skip. Interpreting tag
//! contents is the host's business; it can fetch the raw bytes through the
//! recorded offset and length.

use byteorder::{ByteOrder, LittleEndian};

use crate::buffer::{WindowBuffer, CAPACITY_LIMIT};
use crate::error::Result;
use crate::probe::FrameProbe;

/// ID3 tag generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Id3Version {
    /// 128-byte "TAG" block, normally at the end of the stream.
    Id3v1,
    /// "ID3" block with a syncsafe length, normally at the start.
    Id3v2,
}

/// An ID3 tag located in the stream.
///
/// The primary ID3v2 tag absorbs any later ID3v2 blocks; their positions are
/// kept so a tag parser can walk every block.
#[derive(Debug, Clone)]
pub struct Id3Tag {
    offset: u64,
    len: u64,
    version: Id3Version,
    merged: Vec<(u64, u64)>,
}

const ID3V2_SIGNATURE: u32 = 0x49_44_33; // "ID3"
const ID3V1_SIGNATURE: u32 = 0x54_41_47; // "TAG"
const ID3V1_LENGTH: u64 = 128;

/// ID3v2.4 footer flag in the header flags byte.
const ID3V2_FOOTER_FLAG: u8 = 0x10;

impl Id3Tag {
    /// Recognize either tag generation from a 4-byte sync window.
    pub(crate) fn try_sync(word: u32, offset: u64) -> Option<Id3Tag> {
        let version = match word >> 8 {
            ID3V2_SIGNATURE => Id3Version::Id3v2,
            ID3V1_SIGNATURE => Id3Version::Id3v1,
            _ => return None,
        };
        Some(Id3Tag {
            offset,
            len: 0,
            version,
            merged: Vec::new(),
        })
    }

    /// Recognize an ID3v2 tag only (the leading-tag classification path).
    pub(crate) fn try_sync_v2(word: u32, offset: u64) -> Option<Id3Tag> {
        Self::try_sync(word, offset).filter(|t| t.version == Id3Version::Id3v2)
    }

    pub fn version(&self) -> Id3Version {
        self.version
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Byte length of the tag block.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Positions of later ID3v2 blocks merged into this primary tag.
    pub fn merged_blocks(&self) -> &[(u64, u64)] {
        &self.merged
    }

    /// Absorb a later tag block found mid-stream.
    pub(crate) fn merge(&mut self, other: &Id3Tag) {
        self.merged.push((other.offset, other.len));
    }

    fn validate_v2(&mut self, window: &WindowBuffer) -> Result<bool> {
        let mut hdr = [0u8; 10];
        if window.read(self.offset, &mut hdr)? < 10 {
            return Ok(false);
        }
        // major version 0xFF and non-syncsafe size bytes are malformed
        if hdr[3] == 0xFF || hdr[6..10].iter().any(|&b| b & 0x80 != 0) {
            return Ok(false);
        }
        let size = (u64::from(hdr[6]) << 21)
            | (u64::from(hdr[7]) << 14)
            | (u64::from(hdr[8]) << 7)
            | u64::from(hdr[9]);
        let footer = if hdr[5] & ID3V2_FOOTER_FLAG != 0 { 10 } else { 0 };
        self.len = 10 + size + footer;
        Ok(true)
    }

    fn validate_v1(&mut self, window: &WindowBuffer) -> Result<bool> {
        // a v1 tag is exactly 128 bytes; a truncated trailer is not a tag
        let mut block = [0u8; ID3V1_LENGTH as usize];
        if window.read(self.offset, &mut block)? < block.len() {
            return Ok(false);
        }
        self.len = ID3V1_LENGTH;
        Ok(true)
    }
}

impl FrameProbe for Id3Tag {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn validate(&mut self, window: &WindowBuffer) -> Result<bool> {
        match self.version {
            Id3Version::Id3v2 => self.validate_v2(window),
            Id3Version::Id3v1 => self.validate_v1(window),
        }
    }
}

/// A RIFF/WAVE wrapper preceding the MPEG data.
///
/// The skip length runs from the "RIFF" fourcc through the `data` chunk
/// header, leaving the read position at the first payload byte.
#[derive(Debug, Clone)]
pub struct RiffHeader {
    offset: u64,
    len: u64,
}

const RIFF_SIGNATURE: u32 = 0x5249_4646; // "RIFF"
const WAVE_FOURCC: &[u8; 4] = b"WAVE";
const DATA_FOURCC: &[u8; 4] = b"data";

/// Upper bound on the chunk walk over seekable sources; a wrapper with
/// megabytes of pre-`data` chunks is not something this reader will chase.
/// Forward-only sources are bounded by the window capacity instead.
const MAX_RIFF_SCAN: u64 = 1 << 20;

impl RiffHeader {
    pub(crate) fn try_sync(word: u32, offset: u64) -> Option<RiffHeader> {
        if word != RIFF_SIGNATURE {
            return None;
        }
        Some(RiffHeader { offset, len: 0 })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes from the RIFF fourcc through the `data` chunk header.
    pub fn len(&self) -> u64 {
        self.len
    }
}

impl FrameProbe for RiffHeader {
    fn offset(&self) -> u64 {
        self.offset
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn validate(&mut self, window: &WindowBuffer) -> Result<bool> {
        let mut hdr = [0u8; 12];
        if window.read(self.offset, &mut hdr)? < 12 {
            return Ok(false);
        }
        if &hdr[8..12] != WAVE_FOURCC {
            return Ok(false);
        }

        // a forward-only window cannot hold more than its capacity bound at
        // once, and nothing behind the wrapper may be discarded until the
        // wrapper is accepted, so the walk has to give up before requesting
        // past that bound
        let scan_limit = if window.can_seek() {
            MAX_RIFF_SCAN
        } else {
            CAPACITY_LIMIT as u64
        };

        // walk chunks until the data chunk turns up
        let mut pos = self.offset + 12;
        loop {
            if pos - self.offset + 8 > scan_limit {
                return Ok(false);
            }
            let mut chunk = [0u8; 8];
            if window.read(pos, &mut chunk)? < 8 {
                return Ok(false);
            }
            let size = u64::from(LittleEndian::read_u32(&chunk[4..8]));
            if &chunk[..4] == DATA_FOURCC {
                self.len = pos + 8 - self.offset;
                return Ok(true);
            }
            // chunks are word-aligned
            pos += 8 + size + (size & 1);
        }
    }
}
