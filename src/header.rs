//! MPEG audio frame header decoding.
//!
//! A frame header is 32 bits, big-endian:
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//!
//! A = sync word (11 bits, all 1s)
//! B = version: 00=MPEG2.5, 01=reserved, 10=MPEG2, 11=MPEG1
//! C = layer:   00=reserved, 01=III, 10=II, 11=I
//! D = protection bit (0 = 16-bit CRC follows the header)
//! E = bit-rate index (0 = free format, 15 = invalid)
//! F = sample-rate index (3 = invalid)
//! G = padding bit
//! H = private bit
//! I = channel mode, J = mode extension
//! K = copyright, L = original, M = emphasis
//! ```

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    /// MPEG 1 (32/44.1/48 kHz).
    Mpeg1,
    /// MPEG 2 (16/22.05/24 kHz).
    Mpeg2,
    /// MPEG 2.5 (8/11.025/12 kHz, unofficial).
    Mpeg25,
}

impl std::fmt::Display for MpegVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MpegVersion::Mpeg1 => write!(f, "MPEG 1"),
            MpegVersion::Mpeg2 => write!(f, "MPEG 2"),
            MpegVersion::Mpeg25 => write!(f, "MPEG 2.5"),
        }
    }
}

/// MPEG audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegLayer {
    LayerI,
    LayerII,
    LayerIII,
}

impl std::fmt::Display for MpegLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MpegLayer::LayerI => write!(f, "Layer I"),
            MpegLayer::LayerII => write!(f, "Layer II"),
            MpegLayer::LayerIII => write!(f, "Layer III"),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    /// Number of output channels for this mode.
    pub fn channels(&self) -> u32 {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }
}

impl std::fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelMode::Stereo => write!(f, "Stereo"),
            ChannelMode::JointStereo => write!(f, "Joint Stereo"),
            ChannelMode::DualChannel => write!(f, "Dual Channel"),
            ChannelMode::Mono => write!(f, "Mono"),
        }
    }
}

// Bit-rate tables in kbps; index 0 = free format, index 15 = invalid.
const BIT_RATES_V1_L1: [u32; 16] =
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0];
const BIT_RATES_V1_L2: [u32; 16] =
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0];
const BIT_RATES_V1_L3: [u32; 16] =
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0];
const BIT_RATES_V2_L1: [u32; 16] =
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0];
const BIT_RATES_V2_L23: [u32; 16] =
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0];

// Sample-rate tables in Hz; index 3 is reserved.
const SAMPLE_RATES_V1: [u32; 3] = [44100, 48000, 32000];
const SAMPLE_RATES_V2: [u32; 3] = [22050, 24000, 16000];
const SAMPLE_RATES_V25: [u32; 3] = [11025, 12000, 8000];

/// Decoded MPEG audio frame header.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: MpegLayer,
    /// Raw 4-bit bit-rate index; 0 marks a free-format frame.
    pub bit_rate_index: u8,
    /// Bit rate in bits per second; 0 for free format.
    pub bit_rate: u32,
    pub sample_rate: u32,
    pub padding: bool,
    /// True when a 16-bit CRC word follows the header.
    pub has_crc: bool,
    pub channel_mode: ChannelMode,
    /// Samples per channel this frame decodes to.
    pub sample_count: u32,
}

impl FrameHeader {
    /// Decode a candidate 32-bit header word. Returns `None` when the sync
    /// word is absent or any field holds a reserved value.
    pub fn parse(word: u32) -> Option<FrameHeader> {
        if word >> 21 & 0x7FF != 0x7FF {
            return None;
        }

        let version = match word >> 19 & 0x3 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return None,
        };

        let layer = match word >> 17 & 0x3 {
            1 => MpegLayer::LayerIII,
            2 => MpegLayer::LayerII,
            3 => MpegLayer::LayerI,
            _ => return None,
        };

        let has_crc = word >> 16 & 0x1 == 0;

        let bit_rate_index = (word >> 12 & 0xF) as u8;
        if bit_rate_index == 15 {
            return None;
        }
        let kbps = match (version, layer) {
            (MpegVersion::Mpeg1, MpegLayer::LayerI) => BIT_RATES_V1_L1[bit_rate_index as usize],
            (MpegVersion::Mpeg1, MpegLayer::LayerII) => BIT_RATES_V1_L2[bit_rate_index as usize],
            (MpegVersion::Mpeg1, MpegLayer::LayerIII) => BIT_RATES_V1_L3[bit_rate_index as usize],
            (_, MpegLayer::LayerI) => BIT_RATES_V2_L1[bit_rate_index as usize],
            (_, _) => BIT_RATES_V2_L23[bit_rate_index as usize],
        };

        let sample_rate_index = (word >> 10 & 0x3) as usize;
        if sample_rate_index == 3 {
            return None;
        }
        let sample_rate = match version {
            MpegVersion::Mpeg1 => SAMPLE_RATES_V1[sample_rate_index],
            MpegVersion::Mpeg2 => SAMPLE_RATES_V2[sample_rate_index],
            MpegVersion::Mpeg25 => SAMPLE_RATES_V25[sample_rate_index],
        };

        let padding = word >> 9 & 0x1 != 0;

        let channel_mode = match word >> 6 & 0x3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        let sample_count = samples_per_frame(version, layer);

        Some(FrameHeader {
            version,
            layer,
            bit_rate_index,
            bit_rate: kbps * 1000,
            sample_rate,
            padding,
            has_crc,
            channel_mode,
            sample_count,
        })
    }

    /// Whether this header marks a free-format frame (length derivable only
    /// from the position of the next sync word).
    pub fn is_free_format(&self) -> bool {
        self.bit_rate_index == 0
    }

    /// Total frame length in bytes, sync word included. `None` for free
    /// format.
    pub fn frame_length(&self) -> Option<u32> {
        if self.is_free_format() {
            return None;
        }
        let pad = self.padding as u32;
        Some(match self.layer {
            MpegLayer::LayerI => (12 * self.bit_rate / self.sample_rate + pad) * 4,
            _ => self.sample_count / 8 * self.bit_rate / self.sample_rate + pad,
        })
    }
}

/// Samples per channel per frame for a version/layer pair.
pub fn samples_per_frame(version: MpegVersion, layer: MpegLayer) -> u32 {
    match (version, layer) {
        (_, MpegLayer::LayerI) => 384,
        (_, MpegLayer::LayerII) => 1152,
        (MpegVersion::Mpeg1, MpegLayer::LayerIII) => 1152,
        (_, MpegLayer::LayerIII) => 576,
    }
}
