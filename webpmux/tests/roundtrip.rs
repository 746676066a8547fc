use std::fs;
use std::num::NonZeroU32;

use assert_matches::assert_matches;
use bytes::Bytes;
use webpmux::parse::{CodecError, ImageChunk};
use webpmux::{
    decode_container, encode_animation, encode_single_frame, AnimationMuxer, ChunkRecord, ContainerReader, Error,
    FileSink, MemorySink, MuxParams,
};
use webpmux_test::{init_logger, libwebp_assert_invalid, libwebp_assert_valid, still_container, VP8L_1X1};

#[test]
fn still_round_trip() {
    init_logger();
    let image = ChunkRecord::ImageLossless(ImageChunk::new(VP8L_1X1));
    let mut sink = MemorySink::new();
    encode_single_frame(&image, &mut sink).unwrap();
    assert_eq!(sink.as_slice(), still_container(b"VP8L", VP8L_1X1));
    libwebp_assert_valid(sink.as_slice(), 1);
}

#[test]
fn animation_valid_for_libwebp() {
    init_logger();
    let params = MuxParams::builder().width(1).height(1).loop_count(0).frame_duration_ms(50).build().unwrap();
    let frames = [VP8L_1X1; 4].map(|bitstream| still_container(b"VP8L", bitstream));
    let mut sink = MemorySink::new();
    let encoder = |frame: Vec<u8>| Ok::<_, Error>(Bytes::from(frame));
    let output = encode_animation(frames, encoder, params, &mut sink).unwrap();
    assert_eq!(output.frame_count, 4);
    libwebp_assert_valid(sink.as_slice(), 4);

    let frame_count = ContainerReader::new(sink.as_slice())
        .filter(|record| matches!(record, Ok(ChunkRecord::AnimationFrame(_))))
        .count();
    assert_eq!(frame_count, 4);
}

#[test]
fn file_sink() {
    init_logger();
    let path = std::env::temp_dir().join(format!("webpmux-roundtrip-{}.webp", std::process::id()));
    let mut muxer = AnimationMuxer::new(FileSink::create(&path).unwrap());
    muxer.configure(1, 1, Some(2), 100).unwrap();
    muxer.submit_frame(&still_container(b"VP8L", VP8L_1X1)).unwrap();
    muxer.submit_frame(&still_container(b"VP8L", VP8L_1X1)).unwrap();
    let output = muxer.close().unwrap();
    drop(muxer);

    let data = fs::read(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(data.len() as u64, output.bytes_written);
    assert_eq!(output.width, NonZeroU32::MIN);
    libwebp_assert_valid(&data, 2);

    let records = decode_container(&data[..]).unwrap();
    assert_matches!(&records[..], [
        ChunkRecord::ExtendedHeader(_),
        ChunkRecord::AnimationParameters(anim),
        ChunkRecord::AnimationFrame(_),
        ChunkRecord::AnimationFrame(_),
    ] => assert_eq!(anim.loop_count, 2));
}

#[test]
fn abandoned_animation_invalid() {
    init_logger();
    let mut muxer = AnimationMuxer::new(MemorySink::new());
    muxer.configure(1, 1, Some(0), 100).unwrap();
    muxer.submit_frame(&still_container(b"VP8L", VP8L_1X1)).unwrap();
    muxer.abandon().unwrap();
    assert_matches!(muxer.close(), Err(err) => assert_eq!(err.kind(), Some(&CodecError::EmptyAnimation)));

    let data = muxer.into_inner().into_bytes();
    assert_eq!(&data[4..8], [0; 4]);
    libwebp_assert_invalid(&data);
    assert_matches!(decode_container(&data[..]), Err(err) => {
        assert_eq!(err.kind(), Some(&CodecError::MalformedContainer));
    });
}
