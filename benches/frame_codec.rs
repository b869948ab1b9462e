use chat_relay_server::protocol::{Frame, FrameAssembler, DEFAULT_MAX_FRAME_SIZE};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn bench_frame_codec(c: &mut Criterion) {
    let frame = Frame::text("the quick brown fox jumps over the lazy dog", "alice");

    c.bench_function("frame_encode_text", |b| {
        b.iter(|| black_box(frame.encode()));
    });

    let encoded = frame.encode().expect("encodable frame");
    c.bench_function("frame_decode_text", |b| {
        b.iter(|| black_box(Frame::decode(black_box(&encoded))));
    });

    let mut stream = Vec::new();
    for _ in 0..256 {
        stream.extend_from_slice(&encoded);
    }
    c.bench_function("assembler_split_256_frames", |b| {
        b.iter(|| {
            let mut assembler = FrameAssembler::new(DEFAULT_MAX_FRAME_SIZE);
            let mut frames = 0usize;
            for chunk in stream.chunks(512) {
                assembler.feed(chunk);
                while let Ok(Some(raw)) = assembler.next_frame() {
                    black_box(raw);
                    frames += 1;
                }
            }
            frames
        });
    });
}

criterion_group!(frame_codec, bench_frame_codec);
criterion_main!(frame_codec);
