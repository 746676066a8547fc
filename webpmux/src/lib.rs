#![warn(missing_docs)]

//! `webpmux` reads and writes WebP containers, and assembles single-frame WebP images into animations.
//!
//! The container is a RIFF file of chunks. `webpmux` understands the five chunk types needed for still images and
//! animations, treating the image bitstreams inside them as opaque bytes.
//!
//! # Usage
//!
//! [`decode_container`] reads all the chunks of a container, while [`ContainerReader`] reads them lazily:
//!
//! ```
//! let example_input = b"RIFF\x14\0\0\0WEBPVP8L\x08\0\0\0\x2f\0\0\0\0\x88\x88\x08";
//! let chunks = webpmux::decode_container(&example_input[..])?;
//! assert!(chunks[0].is_image());
//! # Ok::<(), webpmux::Error>(())
//! ```
//!
//! [`AnimationMuxer`] combines single-frame containers, such as those produced by an image encoder, into one animated
//! container written to a [`SeekableSink`]; [`encode_animation`] drives a muxer from an iterator of frames. The
//! lower-level [`ContainerWriter`] writes individual chunks.
//!
//! The [`parse`] module also contains a less stable API which can be used to encode and decode individual chunk
//! types.

pub mod parse;
mod mux;
mod reader;
mod record;
mod sink;
mod writer;

use std::io::Read;

use derive_builder::Builder;
use futures_util::AsyncRead;
use webpmux_common::{bail_attach, report_attach, ResultExt};

use crate::parse::CodecError;

//
// public types
//

/// Error type returned by `webpmux`.
pub type Error = webpmux_common::Error<CodecError>;

#[derive(Builder, Clone, Copy, Debug)]
#[builder(build_fn(name = "try_build"))]
/// Configuration for reading and writing containers.
pub struct Config {
    /// Whether chunks with odd-length data are followed by a zero padding byte.
    ///
    /// The RIFF format requires padding, but some writers omit it. A container must be read with the same setting it
    /// was written with.
    ///
    /// The default is `true`.
    #[builder(default = "true")]
    pub chunk_padding: bool,

    /// Whether the reader checks, at the end of the input, that the container length declared in its header matches
    /// the length of the input.
    ///
    /// The default is `true`.
    #[builder(default = "true")]
    pub check_file_len: bool,
}

pub use mux::{AnimationMuxer, FrameEncoder, MuxOutput, MuxParams, MuxParamsBuilder};
pub use reader::{AsyncContainerReader, ContainerReader};
pub use record::ChunkRecord;
pub use sink::{FileSink, MemorySink, SeekableSink};
pub use webpmux_common::{InputSpan, Report};
pub use writer::ContainerWriter;

/// Maximum file length as permitted by WebP.
pub const MAX_FILE_LEN: u32 = u32::MAX - 2;

/// The message to show users when preparing an image fails, whatever the cause.
pub const USER_ERROR_MESSAGE: &str = "failed to prepare sticker image";

//
// public functions
//

/// Read every chunk of a container.
///
/// # Errors
///
/// If the input cannot be decoded, or an IO error occurs, an [`Error`] is returned.
pub fn decode_container<R: Read + Unpin>(input: R) -> Result<Vec<ChunkRecord>, Error> {
    decode_container_with_config(input, Config::default())
}

/// Read every chunk of a container, with the given [`Config`].
///
/// # Errors
///
/// If the input cannot be decoded, or an IO error occurs, an [`Error`] is returned.
pub fn decode_container_with_config<R: Read + Unpin>(input: R, config: Config) -> Result<Vec<ChunkRecord>, Error> {
    ContainerReader::with_config(input, config).collect()
}

/// Read every chunk of a container from an [`AsyncRead`] input.
///
/// # Errors
///
/// If the input cannot be decoded, or an IO error occurs, an [`Error`] is returned.
pub async fn decode_container_async<R: AsyncRead + Unpin>(
    input: R,
    config: Config,
) -> Result<Vec<ChunkRecord>, Error> {
    let mut reader = AsyncContainerReader::with_config(input, config);
    let mut records = Vec::new();
    while let Some(record) = reader.next_chunk().await? {
        records.push(record);
    }
    Ok(records)
}

/// Write a still container holding the single image chunk `image` to `sink`, returning its length.
///
/// # Errors
///
/// Returns [`CodecError::InvalidInput`] if `image` is not a [`ChunkRecord::ImageLossy`] or
/// [`ChunkRecord::ImageLossless`], or an IO error from the sink.
pub fn encode_single_frame<S: SeekableSink>(image: &ChunkRecord, sink: S) -> Result<u64, Error> {
    let mut writer = ContainerWriter::new(sink);
    if !image.is_image() {
        writer.abandon()?;
        bail_attach!(CodecError::InvalidInput, format!("`{}` is not an image chunk", image.name()));
    }
    writer.write_header()?;
    writer.write_chunk(image)?;
    writer.close()
}

/// Encode each of `frames` with `encoder` and mux the results into a container written to `sink`.
///
/// Frames are encoded and written one at a time. If any step fails, the sink is closed without finishing the
/// container.
///
/// # Errors
///
/// - [`CodecError::FrameEncoding`] if `encoder` fails, other than with an IO error.
/// - [`CodecError::EmptyAnimation`] if `frames` is empty.
/// - Any error returned by [`AnimationMuxer`].
pub fn encode_animation<F, I, E, S>(frames: I, mut encoder: E, params: MuxParams, sink: S) -> Result<MuxOutput, Error>
where
    I: IntoIterator<Item = F>,
    E: FrameEncoder<F>,
    S: SeekableSink,
{
    let mut muxer = AnimationMuxer::new(sink);
    let result = mux_frames(&mut muxer, frames, &mut encoder, params);
    if result.is_err() {
        if let Err(err) = muxer.abandon() {
            log::warn!("error abandoning animation: {err}");
        }
    }
    result
}

//
// private functions
//

fn mux_frames<F, I, E, S>(
    muxer: &mut AnimationMuxer<S>,
    frames: I,
    encoder: &mut E,
    params: MuxParams,
) -> Result<MuxOutput, Error>
where
    I: IntoIterator<Item = F>,
    E: FrameEncoder<F>,
    S: SeekableSink,
{
    muxer.configure_with(params)?;
    for (index, frame) in frames.into_iter().enumerate() {
        let payload = encoder.encode_frame(frame).map_err(|err| match err {
            Error::Io(err) => Error::Io(err),
            Error::Codec(report) => Error::Codec(report_attach!(
                CodecError::FrameEncoding,
                format!("encoder failed: {report:?}"),
                format!("while encoding frame {index}"),
            )),
        })?;
        muxer
            .submit_frame(&payload)
            .attach_printable(format!("while muxing encoded frame {index}"))?;
    }
    muxer.close()
}

//
// Config impls
//

impl Config {
    /// Construct a builder for `Config`.
    ///
    /// See the documentation for [`ConfigBuilder`].
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

//
// ConfigBuilder impls
//

impl ConfigBuilder {
    /// Build a new [`Config`].
    pub fn build(&self) -> Config {
        self.try_build().unwrap()
    }
}

#[cfg(doctest)]
#[doc = include_str!("../README.md")]
pub mod readme {}

#[cfg(test)]
mod test {
    use std::io;
    use std::num::NonZeroU32;

    use super::*;

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use webpmux_common::sync::block_on;

    use crate::parse::{AnimationFrame, AnimationParameters, ExtendedHeader, FourCC, ImageChunk};
    use crate::util::test::{test_still_file, TEST_VP8L};

    fn assert_kind<T: std::fmt::Debug>(result: Result<T, Error>, kind: CodecError) {
        assert_matches!(result, Err(err) => assert_eq!(err.kind(), Some(&kind), "{err:?}"));
    }

    /// A single-frame container whose lossless payload is `len` bytes of filler.
    fn filler_frame(len: usize) -> Bytes {
        test_still_file(&vec![0xa5; len]).into()
    }

    fn pass_through(frame: Bytes) -> Result<Bytes, Error> {
        Ok(frame)
    }

    fn frame_record(len: u32, payload: &'static [u8]) -> ChunkRecord {
        let len = NonZeroU32::new(len).unwrap();
        ChunkRecord::AnimationFrame(AnimationFrame {
            x: 0,
            y: 0,
            width: len,
            height: len,
            duration_ms: 40,
            dispose_to_background: true,
            use_alpha_blending: true,
            is_lossless: false,
            payload: Bytes::from_static(payload),
        })
    }

    fn write_all(records: &[ChunkRecord], config: Config) -> Bytes {
        let mut writer = ContainerWriter::with_config(MemorySink::new(), config);
        writer.write_header().unwrap();
        for record in records {
            writer.write_chunk(record).unwrap();
        }
        writer.close().unwrap();
        writer.into_inner().into_bytes()
    }

    #[test]
    fn single_frame_round_trip() {
        let image = ChunkRecord::ImageLossless(ImageChunk::new(TEST_VP8L));
        let mut sink = MemorySink::new();
        let len = encode_single_frame(&image, &mut sink).unwrap();
        assert_eq!(len, sink.as_slice().len() as u64);
        assert_eq!(decode_container(sink.as_slice()).unwrap(), [image]);
    }

    #[test]
    fn single_frame_not_image() {
        let anim = ChunkRecord::from(AnimationParameters { background_color: 0, loop_count: 0 });
        let mut sink = MemorySink::new();
        assert_kind(encode_single_frame(&anim, &mut sink), CodecError::InvalidInput);
        assert!(sink.is_closed());
    }

    #[test]
    fn animation_round_trip() {
        let canvas = NonZeroU32::new(64).unwrap();
        let records = [
            ExtendedHeader::animated(canvas, canvas).into(),
            AnimationParameters { background_color: 0x11223344, loop_count: 7 }.into(),
            frame_record(64, b"first"),
            frame_record(32, b"second"),
            frame_record(16, b"third!"),
        ];
        let data = write_all(&records, Config::default());
        assert_eq!(decode_container(&data[..]).unwrap(), records);
    }

    #[test]
    fn size_field() {
        let records = [ChunkRecord::ImageLossy(ImageChunk::new(&b"abc"[..]))];
        for padding in [true, false] {
            let config = Config::builder().chunk_padding(padding).build();
            let data = write_all(&records, config);
            let len = u32::from_le_bytes(data[4..8].try_into().unwrap());
            assert_eq!(len as usize, data.len() - 8);
        }
    }

    #[test]
    fn unpadded_round_trip() {
        let canvas = NonZeroU32::new(8).unwrap();
        let records = [
            ExtendedHeader::animated(canvas, canvas).into(),
            AnimationParameters { background_color: 0, loop_count: 0 }.into(),
            frame_record(8, b"odd"),
            frame_record(8, b"even"),
        ];
        let config = Config::builder().chunk_padding(false).build();
        let data = write_all(&records, config);
        assert_eq!(decode_container_with_config(&data[..], config).unwrap(), records);
        assert!(decode_container(&data[..]).is_err());
    }

    #[test]
    fn width_boundaries() {
        for len in [1, 1 << 24] {
            let canvas = NonZeroU32::new(len).unwrap();
            let mut header = ExtendedHeader::animated(canvas, canvas);
            header.has_animation = false;
            let records = [header.into(), ChunkRecord::ImageLossless(ImageChunk::new(TEST_VP8L))];
            let data = write_all(&records, Config::default());
            assert_matches!(&decode_container(&data[..]).unwrap()[..], [ChunkRecord::ExtendedHeader(decoded), _] => {
                assert_eq!(decoded.width.get(), len);
                assert_eq!(decoded.height.get(), len);
            });
        }
    }

    #[test]
    fn bad_magic() {
        assert_kind(decode_container(&b"RIFX\x14\0\0\0WEBPVP8L"[..]), CodecError::MalformedContainer);
        assert_kind(decode_container(&b"RIFF\x14\0\0\0WAVEVP8L"[..]), CodecError::MalformedContainer);
    }

    #[test]
    fn truncated() {
        let data = test_still_file(TEST_VP8L);
        for len in 12..data.len() {
            assert_kind(decode_container(&data[..len]), CodecError::TruncatedChunk);
        }
    }

    #[test]
    fn unknown_tag() {
        let mut data = test_still_file(TEST_VP8L);
        data[12..16].copy_from_slice(b"ICCP");
        assert_kind(decode_container(&data[..]), CodecError::UnknownChunkTag(FourCC::from_str("ICCP")));
    }

    #[test]
    fn concrete_scenario() {
        let params = MuxParams::builder().width(512).height(512).loop_count(0).frame_duration_ms(90).build().unwrap();
        let payload_lens = [1000, 1200, 900];
        let frames = payload_lens.map(filler_frame);
        let mut sink = MemorySink::new();
        let output = encode_animation(frames, pass_through, params, &mut sink).unwrap();

        let expected_len = 12 + 18 + 14 + payload_lens.iter().map(|&len| 8 + 16 + 8 + len as u64).sum::<u64>();
        assert_eq!(output.bytes_written, expected_len);
        assert_eq!(sink.as_slice().len() as u64, expected_len);
        assert_eq!((output.width.get(), output.height.get(), output.frame_count), (512, 512, 3));

        let records = decode_container(sink.as_slice()).unwrap();
        let frame_lens: Vec<_> = records
            .iter()
            .filter_map(|record| match record {
                ChunkRecord::AnimationFrame(frame) => Some(frame.payload.len()),
                _ => None,
            })
            .collect();
        assert_eq!(frame_lens, [1000, 1200, 900]);
    }

    #[test]
    fn empty_animation() {
        let params = MuxParams::builder().width(1).height(1).loop_count(0).build().unwrap();
        let mut sink = MemorySink::new();
        let frames: [Bytes; 0] = [];
        let result = encode_animation(frames, pass_through, params, &mut sink);
        assert_kind(result, CodecError::EmptyAnimation);
        assert!(sink.is_closed());
        assert!(sink.as_slice().is_empty());
    }

    #[test]
    fn encoder_failure() {
        let params = MuxParams::builder().width(1).height(1).loop_count(0).build().unwrap();
        let mut sink = MemorySink::new();
        let encoder = |index: u32| -> Result<Bytes, Error> {
            match index {
                0 => Ok(filler_frame(4)),
                _ => Err(report_attach!(CodecError::InvalidInput, "bitmap too small").into()),
            }
        };
        assert_kind(encode_animation(0..3, encoder, params, &mut sink), CodecError::FrameEncoding);
        assert!(sink.is_closed());
        assert_eq!(&sink.as_slice()[4..8], [0; 4]);
    }

    #[test]
    fn encoder_io_failure() {
        let params = MuxParams::builder().width(1).height(1).build().unwrap();
        let encoder = |_: ()| -> Result<Bytes, Error> { Err(io::Error::from(io::ErrorKind::Interrupted).into()) };
        let err = encode_animation([()], encoder, params, MemorySink::new()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn async_decode() {
        let data = test_still_file(TEST_VP8L);
        let records = block_on(decode_container_async(&data[..], Config::default())).unwrap();
        assert_eq!(records, [ChunkRecord::ImageLossless(ImageChunk::new(TEST_VP8L))]);
    }
}
