//! Synthetic MPEG audio stream builders shared by the integration tests.

#![allow(dead_code)]

/// MPEG1 Layer III, 128 kbps, 44.1 kHz, stereo: 417 bytes.
pub const HDR_128: u32 = 0xFFFB_9000;
/// Same, with the padding bit set: 418 bytes.
pub const HDR_128_PAD: u32 = 0xFFFB_9200;
/// MPEG1 Layer II, 160 kbps, 44.1 kHz, stereo.
pub const HDR_L2_160: u32 = 0xFFFD_9000;
/// Free-format MPEG1 Layer III, 44.1 kHz, stereo.
pub const HDR_FREE: u32 = 0xFFFB_0000;

/// Length in bytes of a frame built from `word`.
pub fn frame_len(word: u32) -> usize {
    mpa_stream::FrameHeader::parse(word)
        .expect("valid header word")
        .frame_length()
        .expect("not free format") as usize
}

/// One complete frame: header word plus zero payload.
pub fn frame(word: u32) -> Vec<u8> {
    let mut bytes = word.to_be_bytes().to_vec();
    bytes.resize(frame_len(word), 0);
    bytes
}

/// A CBR stream of identical frames.
pub fn cbr_stream(word: u32, frames: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for _ in 0..frames {
        data.extend(frame(word));
    }
    data
}

/// A CBR stream whose padding bit follows `padding[i]`.
pub fn padded_stream(padding: &[bool]) -> Vec<u8> {
    let mut data = Vec::new();
    for &pad in padding {
        data.extend(frame(if pad { HDR_128_PAD } else { HDR_128 }));
    }
    data
}

/// A free-format stream: `frames` frames of `total_len` bytes each.
pub fn free_format_stream(frames: usize, total_len: usize) -> Vec<u8> {
    assert!(total_len > 4);
    let mut data = Vec::new();
    for _ in 0..frames {
        data.extend(HDR_FREE.to_be_bytes());
        data.extend(vec![0u8; total_len - 4]);
    }
    data
}

/// An ID3v2 tag block with the given syncsafe content size.
pub fn id3v2_tag(size: u32) -> Vec<u8> {
    assert!(size < 1 << 28);
    let mut data = vec![
        b'I',
        b'D',
        b'3',
        0x04,
        0x00,
        0x00,
        (size >> 21 & 0x7F) as u8,
        (size >> 14 & 0x7F) as u8,
        (size >> 7 & 0x7F) as u8,
        (size & 0x7F) as u8,
    ];
    data.extend(vec![0u8; size as usize]);
    data
}

/// A 128-byte ID3v1 tag block.
pub fn id3v1_tag() -> Vec<u8> {
    let mut data = b"TAG".to_vec();
    data.resize(128, 0);
    data
}

/// A Xing side-info frame (stereo MPEG1 layout) declaring `frames` frames.
pub fn xing_frame(frames: u32) -> Vec<u8> {
    let mut data = HDR_128.to_be_bytes().to_vec();
    data.resize(4 + 32, 0);
    data.extend(b"Xing");
    data.extend(1u32.to_be_bytes()); // frames field present
    data.extend(frames.to_be_bytes());
    data.resize(frame_len(HDR_128), 0);
    data
}
