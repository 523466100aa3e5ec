//! Scan throughput over synthetic CBR streams.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use mpa_stream::MpaReader;
use std::io::Cursor;

/// MPEG1 Layer III 128 kbps 44.1 kHz stereo frames.
fn cbr_stream(frames: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for _ in 0..frames {
        data.extend([0xFF, 0xFB, 0x90, 0x00]);
        data.extend(vec![0u8; 413]);
    }
    data
}

fn bench_full_scan(c: &mut Criterion) {
    let data = cbr_stream(5000);
    let mut group = c.benchmark_group("scan");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("read_to_end_5000_frames", |b| {
        b.iter(|| {
            let reader = MpaReader::new(Cursor::new(data.clone())).unwrap();
            reader.read_to_end().unwrap();
            black_box(reader.sample_count().unwrap())
        })
    });

    group.bench_function("drain_5000_frames", |b| {
        b.iter(|| {
            let reader = MpaReader::new(Cursor::new(data.clone())).unwrap();
            let mut frames = 0u64;
            while let Some(frame) = reader.next_frame().unwrap() {
                frames += black_box(frame.sample_count() as u64 > 0) as u64;
            }
            black_box(frames)
        })
    });

    group.finish();
}

fn bench_seek(c: &mut Criterion) {
    let data = cbr_stream(5000);

    c.bench_function("seek_random_samples", |b| {
        let reader = MpaReader::new(Cursor::new(data.clone())).unwrap();
        let mut sample = 0u64;
        b.iter(|| {
            // stride through the stream with a fixed pattern
            sample = (sample + 1_234_567) % (5000 * 1152);
            black_box(reader.seek_to(black_box(sample)).unwrap())
        })
    });
}

criterion_group!(benches, bench_full_scan, bench_seek);
criterion_main!(benches);
