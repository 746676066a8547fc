use std::num::NonZeroU32;

use bytes::Bytes;
use derive_builder::Builder;
use derive_more::Display;
use webpmux_common::{bail_attach, ensure_attach, ensure_matches_attach, report_attach, ResultExt};

use crate::parse::error::{while_parsing_chunk, MultipleChunks};
use crate::parse::{AnimationFrame, AnimationParameters, CodecError, ExtendedHeader, OneBasedU24, U24};
use crate::{ChunkRecord, Config, ContainerReader, ContainerWriter, Error, SeekableSink};

/// Parameters of an [`AnimationMuxer`].
///
/// ```
/// let params = webpmux::MuxParams::builder().width(512).height(512).loop_count(0).build()?;
/// assert!(params.is_animated());
/// # Ok::<(), webpmux::Error>(())
/// ```
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq)]
#[builder(build_fn(name = "try_build"))]
pub struct MuxParams {
    /// Canvas width in pixels, from 1 to 2^24.
    pub width: u32,

    /// Canvas height in pixels, from 1 to 2^24.
    pub height: u32,

    /// Number of times the animation repeats, with `0` meaning forever.
    ///
    /// [`None`] (the default) produces a still image of exactly one frame.
    #[builder(default, setter(strip_option))]
    pub loop_count: Option<u16>,

    /// Display duration of every frame, in milliseconds.
    ///
    /// The default is `100`.
    #[builder(default = "100")]
    pub frame_duration_ms: u32,

    /// Background color of the canvas, as `[blue, green, red, alpha]` bytes.
    ///
    /// The default is [`AnimationParameters::BACKGROUND_COLOR_UNSET`].
    #[builder(default = "AnimationParameters::BACKGROUND_COLOR_UNSET")]
    pub background_color: u32,

    /// Whether the frames contain transparent pixels.
    ///
    /// The default is `false`.
    #[builder(default)]
    pub has_alpha: bool,
}

/// A summary of a finished container, returned by [`AnimationMuxer::close`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MuxOutput {
    /// The total length of the container in bytes.
    pub bytes_written: u64,

    /// Canvas width in pixels.
    pub width: NonZeroU32,

    /// Canvas height in pixels.
    pub height: NonZeroU32,

    /// The number of frames written.
    pub frame_count: u32,
}

/// A source of single-frame containers, one per decoded frame.
///
/// This is implemented for any `FnMut(F) -> Result<Bytes, Error>`.
pub trait FrameEncoder<F> {
    /// Encode `frame` as a complete single-image WebP container.
    fn encode_frame(&mut self, frame: F) -> Result<Bytes, Error>;
}

/// Assembles single-frame containers into one animated (or still) container.
///
/// The muxer is [configured](Self::configure) once, then fed [single-frame containers](Self::submit_frame) one at a
/// time; each frame is written to the sink before the next is accepted. [`close`](Self::close) finishes the container.
///
/// ```
/// use webpmux::{AnimationMuxer, MemorySink};
///
/// let frame = b"RIFF\x14\0\0\0WEBPVP8L\x08\0\0\0\x2f\0\0\0\0\x88\x88\x08";
/// let mut muxer = AnimationMuxer::new(MemorySink::new());
/// muxer.configure(1, 1, Some(0), 90)?;
/// muxer.submit_frame(frame)?;
/// muxer.submit_frame(frame)?;
/// let output = muxer.close()?;
/// assert_eq!(output.frame_count, 2);
/// # Ok::<(), webpmux::Error>(())
/// ```
pub struct AnimationMuxer<S> {
    writer: ContainerWriter<S>,
    state: MuxState,
}

#[derive(Clone, Copy, Debug)]
enum MuxState {
    Fresh,
    Configured(Canvas),
    Writing { canvas: Canvas, frame_count: u32 },
    Closed { frame_count: u32 },
}

#[derive(Clone, Copy, Debug)]
struct Canvas {
    params: MuxParams,
    width: NonZeroU32,
    height: NonZeroU32,
}

#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "while muxing frame {_0}")]
struct WhileMuxingFrame(u32);

//
// MuxParams impls
//

impl MuxParams {
    /// Construct a builder for `MuxParams`.
    ///
    /// See the documentation for [`MuxParamsBuilder`].
    pub fn builder() -> MuxParamsBuilder {
        MuxParamsBuilder::default()
    }

    /// Whether the output is an animation, rather than a still image.
    pub fn is_animated(&self) -> bool {
        self.loop_count.is_some()
    }

    fn canvas(self) -> Result<Canvas, Error> {
        let dimension = |len: u32| NonZeroU32::new(len).filter(|&len| OneBasedU24::new(len).is_some());
        ensure_matches_attach!(
            dimension(self.width),
            Some(width),
            CodecError::InvalidInput,
            format!("canvas width {} not in 1..=2^24", self.width),
        );
        ensure_matches_attach!(
            dimension(self.height),
            Some(height),
            CodecError::InvalidInput,
            format!("canvas height {} not in 1..=2^24", self.height),
        );
        ensure_attach!(
            U24::new(self.frame_duration_ms).is_some(),
            CodecError::InvalidInput,
            format!("frame duration {} ms exceeds 2^24 - 1", self.frame_duration_ms),
        );
        Ok(Canvas { params: self, width, height })
    }
}

//
// MuxParamsBuilder impls
//

impl MuxParamsBuilder {
    /// Build new [`MuxParams`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidInput`] if the width or height were not set, or are out of range.
    pub fn build(&self) -> Result<MuxParams, Error> {
        let params = self
            .try_build()
            .map_err(|err| report_attach!(CodecError::InvalidInput, err.to_string()))?;
        params.canvas()?;
        Ok(params)
    }
}

//
// FrameEncoder impls
//

impl<F, T: FnMut(F) -> Result<Bytes, Error>> FrameEncoder<F> for T {
    fn encode_frame(&mut self, frame: F) -> Result<Bytes, Error> {
        self(frame)
    }
}

//
// AnimationMuxer impls
//

impl<S: SeekableSink> AnimationMuxer<S> {
    /// Construct a muxer writing to `sink`.
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, Config::default())
    }

    /// Construct a muxer writing to `sink` with the given [`Config`].
    ///
    /// The config affects only the output; frame payloads are always read with the default config.
    pub fn with_config(sink: S, config: Config) -> Self {
        Self { writer: ContainerWriter::with_config(sink, config), state: MuxState::Fresh }
    }

    /// Set the canvas size, loop count, and frame duration.
    ///
    /// A `loop_count` of [`None`] produces a still image; see [`MuxParams`].
    ///
    /// # Errors
    ///
    /// - [`CodecError::InvalidState`] unless the muxer is freshly constructed.
    /// - [`CodecError::InvalidInput`] if a dimension is not in `1..=2^24` or the duration is `2^24` or more.
    pub fn configure(
        &mut self,
        width: u32,
        height: u32,
        loop_count: Option<u16>,
        frame_duration_ms: u32,
    ) -> Result<(), Error> {
        self.configure_with(MuxParams {
            width,
            height,
            loop_count,
            frame_duration_ms,
            background_color: AnimationParameters::BACKGROUND_COLOR_UNSET,
            has_alpha: false,
        })
    }

    /// Set all muxing parameters.
    ///
    /// See [`configure`](Self::configure).
    pub fn configure_with(&mut self, params: MuxParams) -> Result<(), Error> {
        ensure_matches_attach!(
            self.state,
            MuxState::Fresh,
            CodecError::InvalidState,
            "muxer already configured",
        );
        let canvas = params.canvas()?;
        log::debug!(
            "muxing {width}x{height} canvas, loop count {loop_count:?}, {duration} ms per frame",
            width = canvas.width,
            height = canvas.height,
            loop_count = params.loop_count,
            duration = params.frame_duration_ms,
        );
        self.state = MuxState::Configured(canvas);
        Ok(())
    }

    /// Append one frame, given as a complete single-image container.
    ///
    /// The container's image chunk is extracted and written to the sink, wrapped in an animation frame covering the
    /// whole canvas if the muxer is animated. The first call also writes the container header.
    ///
    /// # Errors
    ///
    /// - [`CodecError::InvalidState`] if the muxer isn't configured or is closed, or if a still image already has
    ///   its frame.
    /// - Any error from reading `payload`, or [`CodecError::InvalidChunkLayout`] if it doesn't hold exactly one image.
    ///
    /// After an error other than [`CodecError::InvalidState`], the output should be [abandoned](Self::abandon).
    pub fn submit_frame(&mut self, payload: &[u8]) -> Result<(), Error> {
        let (canvas, frame_count) = match self.state {
            MuxState::Fresh => bail_attach!(CodecError::InvalidState, "muxer not configured"),
            MuxState::Configured(canvas) => {
                self.state = MuxState::Writing { canvas, frame_count: 0 };
                self.start(canvas)?;
                (canvas, 0)
            }
            MuxState::Writing { canvas, frame_count } => (canvas, frame_count),
            MuxState::Closed { .. } => bail_attach!(CodecError::InvalidState, "muxer already closed"),
        };
        ensure_attach!(
            canvas.params.is_animated() || frame_count == 0,
            CodecError::InvalidState,
            "a still image holds a single frame",
        );

        let image = extract_image(payload).attach_printable(WhileMuxingFrame(frame_count))?;
        let record = match canvas.params.is_animated() {
            true => ChunkRecord::AnimationFrame(AnimationFrame {
                x: 0,
                y: 0,
                width: canvas.width,
                height: canvas.height,
                duration_ms: canvas.params.frame_duration_ms,
                dispose_to_background: false,
                use_alpha_blending: false,
                is_lossless: matches!(image, ChunkRecord::ImageLossless(_)),
                payload: image.image_payload().cloned().unwrap_or_default(),
            }),
            false => image,
        };
        self.writer
            .write_chunk(&record)
            .attach_printable(WhileMuxingFrame(frame_count))?;

        self.state = MuxState::Writing { canvas, frame_count: frame_count + 1 };
        Ok(())
    }

    /// Finish the container.
    ///
    /// # Errors
    ///
    /// - [`CodecError::EmptyAnimation`] if no frame was submitted. The sink is closed, but the container is never
    ///   finished. Closing again returns the same error.
    /// - [`CodecError::InvalidState`] if the muxer was already closed after submitting frames.
    pub fn close(&mut self) -> Result<MuxOutput, Error> {
        match self.state {
            MuxState::Writing { canvas, frame_count } if frame_count > 0 => {
                self.state = MuxState::Closed { frame_count };
                let bytes_written = self.writer.close()?;
                log::debug!("muxed {frame_count} frames, {bytes_written} bytes");
                Ok(MuxOutput { bytes_written, width: canvas.width, height: canvas.height, frame_count })
            }
            MuxState::Fresh
            | MuxState::Configured(_)
            | MuxState::Writing { .. }
            | MuxState::Closed { frame_count: 0 } => {
                self.state = MuxState::Closed { frame_count: 0 };
                self.writer.abandon()?;
                bail_attach!(CodecError::EmptyAnimation);
            }
            MuxState::Closed { .. } => bail_attach!(CodecError::InvalidState, "muxer already closed"),
        }
    }

    /// Close the sink without finishing the container.
    ///
    /// Does nothing if the muxer is already closed.
    pub fn abandon(&mut self) -> Result<(), Error> {
        if let MuxState::Closed { .. } = self.state {
            return Ok(());
        }
        self.state = MuxState::Closed { frame_count: 0 };
        self.writer.abandon()
    }

    /// The number of frames written so far.
    pub fn frame_count(&self) -> u32 {
        match self.state {
            MuxState::Fresh | MuxState::Configured(_) => 0,
            MuxState::Writing { frame_count, .. } | MuxState::Closed { frame_count } => frame_count,
        }
    }

    /// Consume the muxer, returning the underlying sink.
    pub fn into_inner(self) -> S {
        self.writer.into_inner()
    }

    fn start(&mut self, canvas: Canvas) -> Result<(), Error> {
        self.writer.write_header()?;
        if let Some(loop_count) = canvas.params.loop_count {
            let header = ExtendedHeader {
                has_alpha: canvas.params.has_alpha,
                ..ExtendedHeader::animated(canvas.width, canvas.height)
            };
            self.writer.write_chunk(&header.into())?;
            let anim = AnimationParameters { background_color: canvas.params.background_color, loop_count };
            self.writer.write_chunk(&anim.into())?;
        }
        Ok(())
    }
}

/// Extract the image chunk of a single-image container.
fn extract_image(payload: &[u8]) -> Result<ChunkRecord, Error> {
    let mut image = None;
    for (index, record) in ContainerReader::new(payload).enumerate() {
        match record? {
            ChunkRecord::ExtendedHeader(ExtendedHeader { has_animation: false, .. }) if index == 0 => (),
            record if record.is_image() => {
                ensure_attach!(image.is_none(), CodecError::InvalidChunkLayout, MultipleChunks(record.name()));
                image = Some(record);
            }
            record => bail_attach!(
                CodecError::InvalidChunkLayout,
                "frame payload is not a single image",
                while_parsing_chunk(record.name()),
            ),
        }
    }
    ensure_matches_attach!(image, Some(image), CodecError::InvalidChunkLayout, "frame payload holds no image");
    Ok(image)
}

#[cfg(test)]
mod test {
    use super::*;

    use assert_matches::assert_matches;

    use crate::util::test::{finish_test_file, test_still_file, write_test_chunk, write_test_header, TEST_VP8L};
    use crate::{decode_container, MemorySink};

    fn assert_kind<T: std::fmt::Debug>(result: Result<T, Error>, kind: CodecError) {
        assert_matches!(result, Err(err) => assert_eq!(err.kind(), Some(&kind)));
    }

    fn animated_muxer() -> AnimationMuxer<MemorySink> {
        let mut muxer = AnimationMuxer::new(MemorySink::new());
        muxer.configure(4, 4, Some(0), 90).unwrap();
        muxer
    }

    #[test]
    fn params_builder() {
        let params = MuxParams::builder().width(3).height(5).build().unwrap();
        assert!(!params.is_animated());
        assert_eq!(params.frame_duration_ms, 100);
        assert_eq!(params.background_color, AnimationParameters::BACKGROUND_COLOR_UNSET);

        assert_kind(MuxParams::builder().width(3).build(), CodecError::InvalidInput);
        assert_kind(MuxParams::builder().width(0).height(5).build(), CodecError::InvalidInput);
        let long_frames = MuxParams::builder().width(1).height(1).frame_duration_ms(1 << 24).build();
        assert_kind(long_frames, CodecError::InvalidInput);
    }

    #[test]
    fn configure_dimension_limits() {
        let mut muxer = AnimationMuxer::new(MemorySink::new());
        assert_kind(muxer.configure((1 << 24) + 1, 1, None, 0), CodecError::InvalidInput);
        muxer.configure(1 << 24, 1, None, 0).unwrap();
        assert_kind(muxer.configure(1, 1, None, 0), CodecError::InvalidState);
    }

    #[test]
    fn unconfigured() {
        let mut muxer = AnimationMuxer::new(MemorySink::new());
        assert_kind(muxer.submit_frame(&test_still_file(TEST_VP8L)), CodecError::InvalidState);
    }

    #[test]
    fn configure_after_frame() {
        let mut muxer = animated_muxer();
        muxer.submit_frame(&test_still_file(TEST_VP8L)).unwrap();
        assert_kind(muxer.configure(4, 4, Some(0), 90), CodecError::InvalidState);
    }

    #[test]
    fn animated_layout() {
        let mut muxer = animated_muxer();
        muxer.submit_frame(&test_still_file(TEST_VP8L)).unwrap();
        muxer.submit_frame(&test_still_file(TEST_VP8L)).unwrap();
        let output = muxer.close().unwrap();
        assert_eq!(output.frame_count, 2);
        assert_eq!(output.width.get(), 4);

        let data = muxer.into_inner().into_bytes();
        assert_eq!(data.len() as u64, output.bytes_written);
        let records = decode_container(&data[..]).unwrap();
        assert_matches!(&records[..], [
            ChunkRecord::ExtendedHeader(header),
            ChunkRecord::AnimationParameters(anim),
            ChunkRecord::AnimationFrame(first),
            ChunkRecord::AnimationFrame(_),
        ] => {
            assert!(header.has_animation);
            assert_eq!(anim.loop_count, 0);
            assert_eq!((first.x, first.y, first.width.get(), first.height.get()), (0, 0, 4, 4));
            assert_eq!(first.duration_ms, 90);
            assert!(first.is_lossless);
            assert!(!first.dispose_to_background && !first.use_alpha_blending);
            assert_eq!(&first.payload[..], TEST_VP8L);
        });
    }

    #[test]
    fn still_output() {
        let mut muxer = AnimationMuxer::new(MemorySink::new());
        muxer.configure(1, 1, None, 0).unwrap();
        muxer.submit_frame(&test_still_file(TEST_VP8L)).unwrap();
        assert_kind(muxer.submit_frame(&test_still_file(TEST_VP8L)), CodecError::InvalidState);
        let output = muxer.close().unwrap();
        assert_eq!(output.bytes_written, 12 + 8 + TEST_VP8L.len() as u64);

        let data = muxer.into_inner().into_bytes();
        assert_eq!(data, test_still_file(TEST_VP8L));
    }

    #[test]
    fn extended_still_frame() {
        let mut frame = Vec::new();
        write_test_header(&mut frame);
        write_test_chunk(&mut frame, b"VP8X", &[0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0], true);
        write_test_chunk(&mut frame, b"VP8 ", b"lossy", true);
        finish_test_file(&mut frame);

        let mut muxer = animated_muxer();
        muxer.submit_frame(&frame).unwrap();
        muxer.close().unwrap();
        let records = decode_container(&muxer.into_inner().into_bytes()[..]).unwrap();
        assert_matches!(records.last(), Some(ChunkRecord::AnimationFrame(frame)) => {
            assert!(!frame.is_lossless);
            assert_eq!(&frame.payload[..], b"lossy");
        });
    }

    #[test]
    fn frame_with_two_images() {
        let mut frame = Vec::new();
        write_test_header(&mut frame);
        write_test_chunk(&mut frame, b"VP8L", TEST_VP8L, true);
        write_test_chunk(&mut frame, b"VP8L", TEST_VP8L, true);
        finish_test_file(&mut frame);
        assert_kind(animated_muxer().submit_frame(&frame), CodecError::InvalidChunkLayout);
    }

    #[test]
    fn frame_without_image() {
        let mut frame = Vec::new();
        write_test_header(&mut frame);
        finish_test_file(&mut frame);
        assert_kind(animated_muxer().submit_frame(&frame), CodecError::InvalidChunkLayout);
    }

    #[test]
    fn frame_not_webp() {
        assert_kind(animated_muxer().submit_frame(b"not a webp file"), CodecError::MalformedContainer);
    }

    #[test]
    fn empty_animation() {
        let mut muxer = animated_muxer();
        assert_kind(muxer.close(), CodecError::EmptyAnimation);
        assert_kind(muxer.close(), CodecError::EmptyAnimation);
        let sink = muxer.into_inner();
        assert!(sink.is_closed());
        assert!(sink.as_slice().is_empty());
    }

    #[test]
    fn close_twice() {
        let mut muxer = animated_muxer();
        muxer.submit_frame(&test_still_file(TEST_VP8L)).unwrap();
        muxer.close().unwrap();
        assert_kind(muxer.close(), CodecError::InvalidState);
        assert_kind(muxer.submit_frame(&test_still_file(TEST_VP8L)), CodecError::InvalidState);
    }

    #[test]
    fn background_and_alpha() {
        let params = MuxParams::builder()
            .width(2)
            .height(2)
            .loop_count(3)
            .background_color(0xff00ff00)
            .has_alpha(true)
            .build()
            .unwrap();
        let mut muxer = AnimationMuxer::new(MemorySink::new());
        muxer.configure_with(params).unwrap();
        muxer.submit_frame(&test_still_file(TEST_VP8L)).unwrap();
        muxer.close().unwrap();
        let records = decode_container(&muxer.into_inner().into_bytes()[..]).unwrap();
        assert_matches!(
            &records[..2],
            [ChunkRecord::ExtendedHeader(header), ChunkRecord::AnimationParameters(anim)] => {
                assert!(header.has_alpha);
                assert_eq!(anim.background_color, 0xff00ff00);
                assert_eq!(anim.loop_count, 3);
            }
        );
    }
}
