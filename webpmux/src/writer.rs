use std::num::NonZeroU32;

use bytes::{BufMut, BytesMut};
use derive_more::Display;
use webpmux_common::{bail_attach, ensure_attach};

use crate::parse::chunk_type::{ANIM, RIFF, VP8X};
use crate::parse::error::{while_writing_chunk, CodecResultExt, ExpectedChunk, MultipleChunks};
use crate::parse::{ChunkHeader, CodecError, ExtendedHeader, FileHeader, FourCC, RiffPrim};
use crate::{ChunkRecord, Config, Error, SeekableSink, MAX_FILE_LEN};

/// A writer of WebP containers to a [`SeekableSink`].
///
/// Chunks are streamed to the sink as they are written. The container's length field is written as a placeholder by
/// [`write_header`](Self::write_header), and patched by [`close`](Self::close).
///
/// The writer checks that chunks are written in a layout readers accept: an optional leading [`ExtendedHeader`], then
/// either a single image chunk, or (for an animated container) [`AnimationParameters`] followed by frames.
///
/// ```
/// use webpmux::{ChunkRecord, ContainerWriter, MemorySink};
/// use webpmux::parse::ImageChunk;
///
/// let mut writer = ContainerWriter::new(MemorySink::new());
/// writer.write_header()?;
/// writer.write_chunk(&ChunkRecord::ImageLossless(ImageChunk::new(&b"\x2f\0\0\0\0\x88\x88\x08"[..])))?;
/// assert_eq!(writer.close()?, 28);
/// # Ok::<(), webpmux::Error>(())
/// ```
///
/// [`AnimationParameters`]: crate::parse::AnimationParameters
pub struct ContainerWriter<S> {
    sink: S,
    config: Config,
    state: WriterState,
    base: u64,
    offset: u64,
}

#[derive(Clone, Copy, Debug)]
enum WriterState {
    Fresh,
    Writing(Layout),
    Closed,
}

/// What has been written so far, for layout checks.
#[derive(Clone, Copy, Debug, Default)]
struct Layout {
    extended: Option<ExtendedHeader>,
    last: Option<FourCC>,
    has_anim: bool,
    frame_count: u32,
    image_count: u32,
}

/// The largest chunk data length which fits the length field with room for padding.
const MAX_CHUNK_DATA_LEN: u64 = u32::MAX as u64 - 1;

#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "frame `{_0}`x`{_1}` at ({_2}, {_3}) exceeds canvas `{_4}`x`{_5}`")]
struct FrameOutsideCanvas(NonZeroU32, NonZeroU32, u32, u32, NonZeroU32, NonZeroU32);

//
// ContainerWriter impls
//

impl<S: SeekableSink> ContainerWriter<S> {
    /// Construct a writer to `sink` with the default [`Config`].
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, Config::default())
    }

    /// Construct a writer to `sink` with the given [`Config`].
    pub fn with_config(sink: S, config: Config) -> Self {
        Self { sink, config, state: WriterState::Fresh, base: 0, offset: 0 }
    }

    /// Write the container header, with a placeholder length.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidState`] unless this is the first call on the writer.
    pub fn write_header(&mut self) -> Result<(), Error> {
        let WriterState::Fresh = self.state else {
            bail_attach!(CodecError::InvalidState, "container header already written");
        };
        self.base = self.sink.position();

        let mut buf = BytesMut::with_capacity(FileHeader::ENCODED_LEN as usize);
        FileHeader { len: 0 }.put_buf(&mut buf);
        self.sink.write(&buf)?;
        self.offset = FileHeader::ENCODED_LEN.into();

        log::debug!("{RIFF} header written @ 0x{base:08x}", base = self.base);
        self.state = WriterState::Writing(Layout::default());
        Ok(())
    }

    /// Write one chunk: its header, its data, and a padding byte if enabled and the data has odd length.
    ///
    /// # Errors
    ///
    /// - [`CodecError::InvalidState`] if the header hasn't been written, or the writer is closed.
    /// - [`CodecError::InvalidInput`] if a field of `record` cannot be represented, or the container would grow past
    ///   [`MAX_FILE_LEN`].
    /// - [`CodecError::InvalidChunkLayout`] if `record` cannot appear at this point in the container.
    pub fn write_chunk(&mut self, record: &ChunkRecord) -> Result<(), Error> {
        let name = record.name();
        let layout = match &mut self.state {
            WriterState::Writing(layout) => layout,
            WriterState::Fresh => bail_attach!(
                CodecError::InvalidState,
                "container header not written",
                while_writing_chunk(name),
            ),
            WriterState::Closed => bail_attach!(
                CodecError::InvalidState,
                "container already closed",
                while_writing_chunk(name),
            ),
        };
        record.validate().while_writing_chunk(name)?;
        layout.check(record).while_writing_chunk(name)?;

        let padding = self.config.chunk_padding;
        let data_len = record.encoded_len(padding);
        ensure_attach!(
            data_len <= MAX_CHUNK_DATA_LEN,
            CodecError::InvalidInput,
            format!("chunk data of {data_len} bytes"),
            while_writing_chunk(name),
        );
        let header = ChunkHeader { name, len: data_len as u32 };
        let pad = padding && header.padded();
        let chunk_len = u64::from(ChunkHeader::ENCODED_LEN) + data_len + u64::from(pad);
        let file_len = self.offset + chunk_len - FileHeader::PREAMBLE_LEN;
        ensure_attach!(
            file_len <= MAX_FILE_LEN.into(),
            CodecError::InvalidInput,
            format!("container length {file_len} exceeds {MAX_FILE_LEN}"),
            while_writing_chunk(name),
        );

        let mut buf = BytesMut::with_capacity(chunk_len as usize);
        header.put_buf(&mut buf);
        record.put_buf(&mut buf, padding);
        if pad {
            buf.put_u8(0);
        }
        debug_assert_eq!(buf.len() as u64, chunk_len);
        self.sink.write(&buf)?;

        log::info!("{name} @ 0x{offset:08x}: {chunk_len} bytes", offset = self.offset);
        self.offset += chunk_len;
        layout.record(record);
        Ok(())
    }

    /// Finish the container: patch its length field and close the sink.
    ///
    /// Returns the total number of bytes in the container. The sink is closed even if an error is returned, in which
    /// case its contents are not a valid container.
    ///
    /// # Errors
    ///
    /// - [`CodecError::InvalidState`] if the header hasn't been written, or the writer is already closed.
    /// - [`CodecError::InvalidChunkLayout`] if the container holds no image data.
    pub fn close(&mut self) -> Result<u64, Error> {
        let layout = match self.state {
            WriterState::Writing(layout) => layout,
            WriterState::Fresh => bail_attach!(CodecError::InvalidState, "container header not written"),
            WriterState::Closed => bail_attach!(CodecError::InvalidState, "container already closed"),
        };
        self.state = WriterState::Closed;

        let result = self.finish(layout);
        let close_result = self.sink.close();
        let len = result?;
        close_result?;
        Ok(len)
    }

    /// Close the sink without finishing the container.
    ///
    /// Does nothing if the writer is already closed.
    pub fn abandon(&mut self) -> Result<(), Error> {
        if let WriterState::Closed = self.state {
            return Ok(());
        }
        self.state = WriterState::Closed;
        log::debug!("container abandoned after {} bytes", self.offset);
        self.sink.close()?;
        Ok(())
    }

    /// The number of bytes written so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether [`close`](Self::close) or [`abandon`](Self::abandon) has been called.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, WriterState::Closed)
    }

    /// A reference to the underlying sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the writer, returning the underlying sink.
    pub fn into_inner(self) -> S {
        self.sink
    }

    fn finish(&mut self, layout: Layout) -> Result<u64, Error> {
        layout.check_complete().while_writing_chunk(RIFF)?;

        let len = (self.offset - FileHeader::PREAMBLE_LEN) as u32;
        self.sink.seek(self.base + FileHeader::LEN_OFFSET)?;
        self.sink.write(&len.to_le_bytes())?;

        log::info!("{RIFF} @ 0x{base:08x}: {offset} bytes", base = self.base, offset = self.offset);
        Ok(self.offset)
    }
}

//
// Layout impls
//

impl Layout {
    fn animated(&self) -> bool {
        matches!(self.extended, Some(ExtendedHeader { has_animation: true, .. }))
    }

    fn check(&self, record: &ChunkRecord) -> webpmux_common::Result<(), CodecError> {
        match record {
            ChunkRecord::ExtendedHeader(_) => {
                ensure_attach!(
                    self.last.is_none(),
                    CodecError::InvalidChunkLayout,
                    "VP8X must be the first chunk",
                );
            }
            ChunkRecord::AnimationParameters(_) => {
                ensure_attach!(self.animated(), CodecError::InvalidChunkLayout, "container not animated");
                ensure_attach!(
                    self.last == Some(VP8X),
                    CodecError::InvalidChunkLayout,
                    ExpectedChunk(VP8X),
                );
            }
            ChunkRecord::AnimationFrame(frame) => {
                let Some(canvas) = self.extended.filter(|_| self.has_anim) else {
                    bail_attach!(CodecError::InvalidChunkLayout, ExpectedChunk(ANIM));
                };
                let fits = |offset: u32, len: NonZeroU32, canvas_len: NonZeroU32| {
                    u64::from(offset) + u64::from(len.get()) <= u64::from(canvas_len.get())
                };
                ensure_attach!(
                    fits(frame.x, frame.width, canvas.width) && fits(frame.y, frame.height, canvas.height),
                    CodecError::InvalidChunkLayout,
                    FrameOutsideCanvas(frame.width, frame.height, frame.x, frame.y, canvas.width, canvas.height),
                );
            }
            ChunkRecord::ImageLossy(_) | ChunkRecord::ImageLossless(_) => {
                ensure_attach!(
                    !self.animated(),
                    CodecError::InvalidChunkLayout,
                    "bare image chunk in animated container",
                );
                ensure_attach!(
                    self.image_count == 0,
                    CodecError::InvalidChunkLayout,
                    MultipleChunks(record.name()),
                );
            }
        }
        Ok(())
    }

    fn check_complete(&self) -> webpmux_common::Result<(), CodecError> {
        if self.animated() {
            ensure_attach!(self.has_anim, CodecError::InvalidChunkLayout, ExpectedChunk(ANIM));
            ensure_attach!(self.frame_count > 0, CodecError::InvalidChunkLayout, "no animation frames");
        } else {
            ensure_attach!(self.image_count > 0, CodecError::InvalidChunkLayout, "no image data");
        }
        Ok(())
    }

    fn record(&mut self, record: &ChunkRecord) {
        match record {
            ChunkRecord::ExtendedHeader(header) => self.extended = Some(*header),
            ChunkRecord::AnimationParameters(_) => self.has_anim = true,
            ChunkRecord::AnimationFrame(_) => self.frame_count += 1,
            ChunkRecord::ImageLossy(_) | ChunkRecord::ImageLossless(_) => self.image_count += 1,
        }
        self.last = Some(record.name());
    }
}
