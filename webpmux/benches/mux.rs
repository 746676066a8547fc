use criterion::async_executor::FuturesExecutor;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use webpmux::{decode_container, decode_container_async, AnimationMuxer, Config, MemorySink};
use webpmux_test::{still_container, VP8L_1X1};

criterion_group!(benches, mux, decode);
criterion_main!(benches);

const FRAME_COUNT: usize = 100;

fn frames() -> Vec<Vec<u8>> {
    (0..FRAME_COUNT)
        .map(|index| {
            let mut bitstream = VP8L_1X1.to_vec();
            bitstream.resize(VP8L_1X1.len() + 64 * index, 0);
            still_container(b"VP8L", &bitstream)
        })
        .collect()
}

fn muxed() -> Vec<u8> {
    let mut muxer = AnimationMuxer::new(MemorySink::new());
    muxer.configure(1, 1, Some(0), 40).unwrap();
    for frame in frames() {
        muxer.submit_frame(&frame).unwrap();
    }
    muxer.close().unwrap();
    muxer.into_inner().into_bytes().to_vec()
}

pub fn mux(c: &mut Criterion) {
    let frames = frames();
    c.bench_function("mux", |b| {
        b.iter_batched(
            || AnimationMuxer::new(MemorySink::new()),
            |mut muxer| {
                muxer.configure(1, 1, Some(0), 40)?;
                for frame in &frames {
                    muxer.submit_frame(black_box(frame))?;
                }
                muxer.close()
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn decode(c: &mut Criterion) {
    let data = muxed();
    let mut decode = c.benchmark_group("decode");
    decode.bench_function("sync", |b| b.iter(|| decode_container(black_box(&data[..]))));
    decode.bench_function("async", |b| {
        b.to_async(FuturesExecutor)
            .iter(|| decode_container_async(black_box(&data[..]), Config::default()))
    });
}
