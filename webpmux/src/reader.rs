use std::io::Read;
use std::num::NonZeroU32;
use std::pin::Pin;

use bytes::BytesMut;
use futures_util::io::BufReader;
use futures_util::{AsyncBufReadExt, AsyncRead, AsyncReadExt};
use pin_project::pin_project;
use webpmux_common::error::{ExtraUnparsedInput, TypeName, WhileCoding};
use webpmux_common::parse::FourCC;
use webpmux_common::sync::{block_on, AsyncInputAdapter};
use webpmux_common::util::IoResultExt;
use webpmux_common::{bail_attach, ensure_attach, ensure_matches_attach, report_attach, InputSpan};

use crate::parse::chunk_type::RIFF;
use crate::parse::error::{while_parsing_chunk, CodecResultExt};
use crate::parse::{ChunkHeader, CodecError, FileHeader, RiffPrim};
use crate::{ChunkRecord, Config, Error};

/// A lazy, blocking reader of the chunks in a WebP container.
///
/// Chunks are parsed one at a time as [`next_chunk`](Self::next_chunk) is called, or as the reader is iterated. After
/// the first error, or after the end of the input, no more chunks are returned.
///
/// ```
/// use webpmux::{ChunkRecord, ContainerReader};
///
/// let input = b"RIFF\x14\0\0\0WEBPVP8L\x08\0\0\0\x2f\0\0\0\0\x88\x88\x08";
/// let mut reader = ContainerReader::new(&input[..]);
/// let chunk = reader.next_chunk()?;
/// assert!(matches!(chunk, Some(ChunkRecord::ImageLossless(_))));
/// assert_eq!(reader.next_chunk()?, None);
/// # Ok::<(), webpmux::Error>(())
/// ```
pub struct ContainerReader<R> {
    inner: AsyncContainerReader<AsyncInputAdapter<R>>,
}

/// A lazy reader of the chunks in a WebP container, over an [`AsyncRead`] input.
///
/// This is the async counterpart of [`ContainerReader`].
pub struct AsyncContainerReader<R> {
    reader: ChunkReader<R>,
    config: Config,
    state: ReaderState,
}

#[pin_project]
pub(crate) struct ChunkReader<R> {
    state: State,
    padding: bool,
    position: u64,
    #[pin]
    inner: BufReader<R>,
}

#[derive(Clone, Copy)]
enum ReaderState {
    Fresh,
    Reading { file_header: FileHeader },
    Done,
}

#[derive(Clone, Copy)]
enum State<P = ()> {
    Idle { last: FourCC },
    ReadingBody { header: ChunkHeader, remaining: NonZeroU32 },
    ReadingPadding { header: ChunkHeader, token: P },
}

#[derive(Clone, Copy)]
enum PaddingReadToken {}

const READ_CHUNK_LEN: usize = 64 * 1024;

//
// ContainerReader impls
//

impl<R: Read + Unpin> ContainerReader<R> {
    /// Construct a reader over `input` with the default [`Config`].
    pub fn new(input: R) -> Self {
        Self::with_config(input, Config::default())
    }

    /// Construct a reader over `input` with the given [`Config`].
    pub fn with_config(input: R, config: Config) -> Self {
        Self { inner: AsyncContainerReader::with_config(AsyncInputAdapter::new(input), config) }
    }

    /// Read and validate the container header.
    ///
    /// This is called by the first [`next_chunk`](Self::next_chunk) if it wasn't called already.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedContainer`] if the input is not a WebP file, or [`CodecError::InvalidState`] if
    /// the header was already read.
    pub fn read_header(&mut self) -> Result<FileHeader, Error> {
        block_on(self.inner.read_header())
    }

    /// Read the next chunk, returning [`None`] at the end of the input.
    pub fn next_chunk(&mut self) -> Result<Option<ChunkRecord>, Error> {
        block_on(self.inner.next_chunk())
    }

    /// The number of bytes of input consumed so far.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }
}

impl<R: Read + Unpin> Iterator for ContainerReader<R> {
    type Item = Result<ChunkRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

//
// AsyncContainerReader impls
//

impl<R: AsyncRead + Unpin> AsyncContainerReader<R> {
    /// Construct a reader over `input` with the default [`Config`].
    pub fn new(input: R) -> Self {
        Self::with_config(input, Config::default())
    }

    /// Construct a reader over `input` with the given [`Config`].
    pub fn with_config(input: R, config: Config) -> Self {
        let reader = ChunkReader::new(input, config.chunk_padding);
        Self { reader, config, state: ReaderState::Fresh }
    }

    /// Read and validate the container header.
    ///
    /// See [`ContainerReader::read_header`].
    pub async fn read_header(&mut self) -> Result<FileHeader, Error> {
        ensure_matches_attach!(
            self.state,
            ReaderState::Fresh,
            CodecError::InvalidState,
            "container header already read",
        );
        let result = Pin::new(&mut self.reader).read_file_header().await;
        self.state = match result {
            Ok(file_header) => ReaderState::Reading { file_header },
            Err(_) => ReaderState::Done,
        };
        result
    }

    /// Read the next chunk, returning [`None`] at the end of the input.
    pub async fn next_chunk(&mut self) -> Result<Option<ChunkRecord>, Error> {
        let result = self.try_next_chunk().await;
        if !matches!(result, Ok(Some(_))) {
            self.state = ReaderState::Done;
        }
        result
    }

    /// The number of bytes of input consumed so far.
    pub fn position(&self) -> u64 {
        self.reader.position
    }

    async fn try_next_chunk(&mut self) -> Result<Option<ChunkRecord>, Error> {
        let file_header = match self.state {
            ReaderState::Fresh => self.read_header().await?,
            ReaderState::Reading { file_header } => file_header,
            ReaderState::Done => return Ok(None),
        };

        let mut reader = Pin::new(&mut self.reader);
        if !reader.has_remaining().await? {
            let position = reader.position;
            self.check_file_len(file_header, position)?;
            return Ok(None);
        }

        let (name, span) = reader.read_any_header().await?;
        ensure_attach!(
            ChunkRecord::is_known(name),
            CodecError::UnknownChunkTag(name),
            format!("at offset 0x{:08x}", span.offset),
        );
        let mut data = reader.read_body().await?;
        let record = ChunkRecord::parse(name, &mut data).while_parsing_chunk(name)?;
        log_record(&record, span);
        Ok(Some(record))
    }

    fn check_file_len(&self, file_header: FileHeader, position: u64) -> Result<(), Error> {
        if !self.config.check_file_len {
            return Ok(());
        }
        let read_len = position.saturating_sub(FileHeader::PREAMBLE_LEN);
        let declared_len = u64::from(file_header.len);
        ensure_attach!(
            read_len >= declared_len,
            CodecError::TruncatedChunk,
            format!("input ended after {read_len} of {declared_len} bytes"),
            while_parsing_chunk(RIFF),
        );
        ensure_attach!(
            read_len == declared_len,
            CodecError::MalformedContainer,
            ExtraUnparsedInput,
            while_parsing_chunk(RIFF),
        );
        Ok(())
    }
}

fn log_record(record: &ChunkRecord, InputSpan { offset, len }: InputSpan) {
    let name = record.name();
    match record {
        ChunkRecord::ImageLossy(_) | ChunkRecord::ImageLossless(_) => {
            log::info!("{name} @ 0x{offset:08x}: {len} bytes");
        }
        ChunkRecord::ExtendedHeader(header) => {
            let (width, height, flags) = (header.width, header.height, header.flags());
            log::info!("{name} @ 0x{offset:08x}: {width}x{height}, flags {flags:08b}");
        }
        ChunkRecord::AnimationParameters(anim) => {
            let (loop_count, background_color) = (anim.loop_count, anim.background_color);
            log::info!("{name} @ 0x{offset:08x}: loop count {loop_count}, background 0x{background_color:08x}");
        }
        ChunkRecord::AnimationFrame(frame) => {
            let (x, y, width, height, flags) = (frame.x, frame.y, frame.width, frame.height, frame.flags());
            log::info!(
                "{name} @ 0x{offset:08x}: {len} bytes, {width}x{height} @ ({x}, {y}), {duration} ms, flags {flags:08b}",
                duration = frame.duration_ms,
            );
        }
    }
}

//
// ChunkReader impls
//

impl<R: AsyncRead> ChunkReader<R> {
    pub fn new(input: R, padding: bool) -> Self {
        let inner = BufReader::with_capacity(ChunkHeader::ENCODED_LEN as usize, input);
        Self { state: State::Idle { last: RIFF }, padding, position: 0, inner }
    }

    /// Read the `RIFF` file header, which must be the first thing read.
    pub async fn read_file_header(self: &mut Pin<&mut Self>) -> Result<FileHeader, Error> {
        let mut buf = [0; FileHeader::ENCODED_LEN as usize];
        let (magic, rest) = buf.split_at_mut(FourCC::ENCODED_LEN as usize);
        self.as_mut().project().inner.read_exact(magic).await.map_eof(|_| {
            Error::Codec(report_attach!(
                CodecError::MalformedContainer,
                "input shorter than a RIFF header",
                WhileCoding::parsing(TypeName::of::<FileHeader>()),
            ))
        })?;
        // Check the magic before reading further, so that non-WebP input is rejected without consuming it.
        ensure_attach!(
            FourCC::parse(&magic[..]) == RIFF,
            CodecError::MalformedContainer,
            "not a RIFF file",
            WhileCoding::parsing(TypeName::of::<FileHeader>()),
        );
        self.as_mut().project().inner.read_exact(rest).await.map_eof(|_| {
            Error::Codec(report_attach!(
                CodecError::TruncatedChunk,
                WhileCoding::parsing(TypeName::of::<FileHeader>()),
            ))
        })?;
        *self.as_mut().project().position += u64::from(FileHeader::ENCODED_LEN);

        let file_header = FileHeader::parse(&buf[..])?;
        log::info!("{RIFF} @ 0x00000000: {len} bytes", len = u64::from(file_header.len) + FileHeader::PREAMBLE_LEN);
        Ok(file_header)
    }

    pub async fn has_remaining(self: &mut Pin<&mut Self>) -> Result<bool, Error> {
        match self.read_padding().await? {
            State::Idle { .. } => (),
            State::ReadingBody { .. } => return Ok(true),
            State::ReadingPadding { token, .. } => match token {},
        }
        Ok(!self.as_mut().project().inner.fill_buf().await?.is_empty())
    }

    /// Read a chunk header.
    pub async fn read_any_header(self: &mut Pin<&mut Self>) -> Result<(FourCC, InputSpan), Error> {
        match self.read_padding().await? {
            State::Idle { .. } => (),
            State::ReadingBody { header, .. } => bail_attach!(
                CodecError::TruncatedChunk,
                WhileCoding::parsing(TypeName::of::<ChunkHeader>()),
                ExtraUnparsedInput,
                while_parsing_chunk(header.name),
            ),
            State::ReadingPadding { token, .. } => match token {},
        }
        ensure_attach!(self.has_remaining().await?, CodecError::TruncatedChunk);

        let offset = self.position;
        let header = ChunkHeader::read(self.as_mut().project().inner).await.map_eof(|_| {
            Error::Codec(report_attach!(
                CodecError::TruncatedChunk,
                WhileCoding::parsing(TypeName::of::<ChunkHeader>()),
            ))
        })?;
        *self.as_mut().project().position += u64::from(ChunkHeader::ENCODED_LEN);

        *self.as_mut().project().state = match NonZeroU32::new(header.len) {
            Some(remaining) => State::ReadingBody { header, remaining },
            None => State::ReadingPadding { header, token: () },
        };

        let len = u64::from(header.len) + u64::from(ChunkHeader::ENCODED_LEN);
        Ok((header.name, InputSpan { offset, len }))
    }

    /// Read all of a chunk's data, assuming its header has already been read.
    pub async fn read_body(self: &mut Pin<&mut Self>) -> Result<BytesMut, Error> {
        let (header, remaining) = match self.read_padding().await? {
            State::Idle { .. } => return Ok(BytesMut::new()),
            State::ReadingBody { header, remaining } => (header, remaining),
            State::ReadingPadding { token, .. } => match token {},
        };

        // Grow the buffer as data arrives, so a bogus chunk length can't force a large allocation.
        let len = remaining.get() as usize;
        let mut data = BytesMut::with_capacity(len.min(READ_CHUNK_LEN));
        while data.len() < len {
            let start = data.len();
            data.resize(start + (len - start).min(READ_CHUNK_LEN), 0);
            self.as_mut().project().inner.read_exact(&mut data[start..]).await.map_eof(|_| {
                Error::Codec(report_attach!(
                    CodecError::TruncatedChunk,
                    while_parsing_chunk(header.name),
                ))
            })?;
        }
        *self.as_mut().project().position += u64::from(remaining.get());
        *self.as_mut().project().state = State::ReadingPadding { header, token: () };

        Ok(data)
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    async fn read_padding(self: &mut Pin<&mut Self>) -> Result<State<PaddingReadToken>, Error> {
        let header = match self.state {
            State::Idle { last } => return Ok(State::Idle { last }),
            State::ReadingBody { header, remaining } => return Ok(State::ReadingBody { header, remaining }),
            State::ReadingPadding { header, token: () } => header,
        };

        if self.padding && header.padded() {
            let mut pad = [0];
            self.as_mut().project().inner.read_exact(&mut pad).await.map_eof(|_| {
                Error::Codec(report_attach!(
                    CodecError::TruncatedChunk,
                    "missing padding byte",
                    while_parsing_chunk(header.name),
                ))
            })?;
            ensure_matches_attach!(
                pad,
                [0],
                CodecError::MalformedContainer,
                "non-zero padding byte",
                while_parsing_chunk(header.name),
            );
            *self.as_mut().project().position += 1;
        }

        *self.as_mut().project().state = State::Idle { last: header.name };

        Ok(State::Idle { last: header.name })
    }
}
