//! # MPA Stream
//!
//! An MPEG audio bitstream reader: the front-end that turns a raw byte
//! stream into an ordered, indexable catalog of MPEG audio frames for a
//! downstream PCM decoder.
//!
//! ## Features
//!
//! - **Resync scanner**: byte-wise recovery that tells genuine MPEG sync
//!   words apart from random data, with a format guard for free-format
//!   payloads
//! - **Container wrappers**: ID3v2/ID3v1 tags and RIFF/WAVE headers are
//!   located and skipped transparently
//! - **VBR side info**: Xing/Info/VBRI header frames replace catalog-derived
//!   stream totals
//! - **Free format**: frame lengths recovered from the position of the next
//!   sync word
//! - **Forward-only sources**: bounded-memory operation over streams that
//!   cannot seek, with frame bytes carried by the frames themselves
//! - **Sample-accurate seeking**: random access by sample number over the
//!   frame catalog
//!
//! ## Example
//!
//! ```no_run
//! use mpa_stream::MpaReader;
//! use std::fs::File;
//!
//! let file = File::open("input.mp3").unwrap();
//! let reader = MpaReader::new(file).unwrap();
//!
//! println!(
//!     "{} Hz, {} channel(s), {} samples",
//!     reader.sample_rate(),
//!     reader.channels(),
//!     reader.sample_count().unwrap(),
//! );
//!
//! // jump to the frame holding sample 441000 (10 s at 44.1 kHz)
//! reader.seek_to(441_000).unwrap();
//!
//! // pull frames for the decoder
//! while let Some(frame) = reader.next_frame().unwrap() {
//!     let mut bytes = vec![0u8; frame.frame_length() as usize];
//!     frame.read(0, &mut bytes).unwrap();
//!     // hand `bytes` to the audio decoder
//! }
//! ```
//!
//! ## Frame header layout
//!
//! Each MPEG audio frame opens with a 32-bit big-endian header:
//!
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//! ```
//!
//! | Field | Bits | Meaning |
//! |-------|------|---------|
//! | A | 11 | Sync word, all 1s |
//! | B | 2  | Version: 00=MPEG2.5, 01=reserved, 10=MPEG2, 11=MPEG1 |
//! | C | 2  | Layer: 00=reserved, 01=III, 10=II, 11=I |
//! | D | 1  | Protection (0 = CRC word follows) |
//! | E | 4  | Bit-rate index (0 = free format, 15 = invalid) |
//! | F | 2  | Sample-rate index (3 = invalid) |
//! | G | 1  | Padding |
//! | H | 1  | Private |
//! | I | 2  | Channel mode |
//! | J | 2  | Mode extension |
//! | K | 1  | Copyright |
//! | L | 1  | Original |
//! | M | 2  | Emphasis |
//!
//! ## Threading
//!
//! The reader is `Send + Sync`. The scanner can be driven from one thread
//! (`read_to_end`) while a consumer pulls frames from another; on
//! forward-only sources the driver pauses when too many undrained frame
//! copies accumulate.

pub mod error;
pub mod source;
pub mod header;
pub mod tags;
pub mod vbr;
pub mod frame;
pub mod reader;

mod buffer;
mod probe;
mod scanner;

pub use error::{MpaError, Result};
pub use frame::MpaFrame;
pub use header::{ChannelMode, FrameHeader, MpegLayer, MpegVersion};
pub use reader::MpaReader;
pub use source::{ForwardSource, SeekSource, StreamSource};
pub use tags::{Id3Tag, Id3Version, RiffHeader};
pub use vbr::{VbrInfo, VbrTag};
