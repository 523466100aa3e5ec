//! Property tests for the frame catalog: numbering, sample accounting,
//! seek landing, frame byte fidelity, and seekable/forward-only parity.

mod common;

use common::*;
use mpa_stream::MpaReader;
use proptest::prelude::*;
use std::io::Cursor;
use std::sync::Arc;

fn collect(reader: &MpaReader) -> Vec<Arc<mpa_stream::MpaFrame>> {
    let mut frames = Vec::new();
    while let Some(frame) = reader.next_frame().unwrap() {
        frames.push(frame);
    }
    frames
}

/// Garbage bytes that can never complete a sync word or a tag signature
/// (no 0xFF, no ASCII letters).
fn garbage() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0u8..0x40, 0..64)
}

proptest! {
    /// Frames tile the byte stream: each ends exactly where the next one
    /// starts on a clean CBR stream.
    #[test]
    fn frames_tile_the_stream(padding in proptest::collection::vec(any::<bool>(), 2..40)) {
        let reader = MpaReader::new(Cursor::new(padded_stream(&padding))).unwrap();
        let frames = collect(&reader);

        prop_assert_eq!(frames.len(), padding.len());
        for pair in frames.windows(2) {
            prop_assert_eq!(pair[0].offset() + pair[0].frame_length(), pair[1].offset());
        }
    }

    /// Numbering and sample offsets chain exactly, garbage prefix or not.
    #[test]
    fn numbering_and_sample_offsets_chain(
        prefix in garbage(),
        padding in proptest::collection::vec(any::<bool>(), 2..40),
    ) {
        let mut data = prefix;
        data.extend(padded_stream(&padding));
        let reader = MpaReader::new(Cursor::new(data)).unwrap();
        let frames = collect(&reader);

        prop_assert_eq!(frames[0].number(), 0);
        prop_assert_eq!(frames[0].sample_offset(), 0);
        for pair in frames.windows(2) {
            prop_assert_eq!(pair[1].number(), pair[0].number() + 1);
            prop_assert_eq!(
                pair[1].sample_offset(),
                pair[0].sample_offset() + u64::from(pair[0].sample_count())
            );
        }
    }

    /// After a full scan, the stream total equals the last frame's edge.
    #[test]
    fn stream_total_matches_last_frame(count in 2usize..50) {
        let reader = MpaReader::new(Cursor::new(cbr_stream(HDR_128, count))).unwrap();
        reader.read_to_end().unwrap();

        prop_assert_eq!(reader.sample_count().unwrap(), (count as i64) * 1152);
    }

    /// A seek lands on the frame containing the requested sample, or
    /// reports EOF for samples past the stream.
    #[test]
    fn seek_lands_on_containing_frame(
        count in 2usize..40,
        sample in 0u64..60_000,
    ) {
        let reader = MpaReader::new(Cursor::new(cbr_stream(HDR_128, count))).unwrap();
        let total = count as u64 * 1152;

        let landed = reader.seek_to(sample).unwrap();
        if sample < total {
            let frame = reader.next_frame().unwrap().expect("frame at landing point");
            prop_assert_eq!(frame.sample_offset() as i64, landed);
            prop_assert!(frame.sample_offset() <= sample);
            prop_assert!(sample < frame.sample_offset() + u64::from(frame.sample_count()));
        } else {
            prop_assert_eq!(landed, -1);
        }
    }

    /// Frame bytes served by the reader are byte-identical to the source.
    #[test]
    fn frame_bytes_match_source(prefix in garbage(), count in 2usize..20) {
        let mut data = prefix;
        data.extend(cbr_stream(HDR_128, count));
        let reader = MpaReader::new(Cursor::new(data.clone())).unwrap();

        for frame in collect(&reader) {
            let start = frame.offset() as usize;
            let len = frame.frame_length() as usize;
            let mut bytes = vec![0u8; len];
            prop_assert_eq!(frame.read(0, &mut bytes).unwrap(), len);
            prop_assert_eq!(&bytes[..], &data[start..start + len]);
        }
    }

    /// Wrapping the same bytes seekable and forward-only yields catalogs
    /// with pairwise-identical frame tuples.
    #[test]
    fn forward_only_catalog_matches_seekable(
        prefix in garbage(),
        padding in proptest::collection::vec(any::<bool>(), 2..30),
    ) {
        let mut data = prefix;
        data.extend(padded_stream(&padding));

        let seekable = MpaReader::new(Cursor::new(data.clone())).unwrap();
        let forward = MpaReader::new_forward(Cursor::new(data)).unwrap();

        let a = collect(&seekable);
        let b = collect(&forward);
        prop_assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            prop_assert_eq!(x.offset(), y.offset());
            prop_assert_eq!(x.frame_length(), y.frame_length());
            prop_assert_eq!(x.sample_count(), y.sample_count());
            prop_assert_eq!(x.bit_rate(), y.bit_rate());
            prop_assert_eq!(x.sample_rate(), y.sample_rate());
            prop_assert_eq!(x.channels(), y.channels());
        }
    }
}
