#![allow(missing_docs)]

use std::num::NonZeroU32;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use webpmux_common::parse::FourCC;
use webpmux_common::{bail_attach, ensure_attach, ensure_matches_attach, Result};

use super::chunk_type::{ANMF, VP8, VP8L};
use super::error::{while_parsing_chunk, CodecResultExt};
use super::{ChunkHeader, CodecError, ImageChunk, OneBasedU24, ParseChunk, ParsedChunk, RiffFlags, RiffPrim, U24};

/// The `ANMF` chunk: one frame of an animation, wrapping a nested `VP8 ` or `VP8L` chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimationFrame {
    pub x: u32,
    pub y: u32,
    pub width: NonZeroU32,
    pub height: NonZeroU32,
    pub duration_ms: u32,
    pub dispose_to_background: bool,
    pub use_alpha_blending: bool,
    /// Whether the nested chunk is `VP8L` rather than `VP8 `.
    pub is_lossless: bool,
    /// The data of the nested image chunk.
    pub payload: Bytes,
}

bitflags::bitflags! {
    /// The packed flag field of [`AnimationFrame`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct AnmfFlags: u8 {
        const ALPHA_BLENDING = 0b0000_0010;
        const DISPOSE_BACKGROUND = 0b0000_0001;
    }
}

/// The fixed-length fields of an [`AnimationFrame`], in their encoded representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FrameFields {
    x: U24,
    y: U24,
    width: OneBasedU24,
    height: OneBasedU24,
    duration: U24,
    flags: AnmfFlags,
}

//
// AnimationFrame impls
//

impl AnimationFrame {
    /// The encoded length of the fields preceding the nested image chunk.
    pub const FIELDS_LEN: u32 = U24::ENCODED_LEN
        + U24::ENCODED_LEN
        + OneBasedU24::ENCODED_LEN
        + OneBasedU24::ENCODED_LEN
        + U24::ENCODED_LEN
        + AnmfFlags::ENCODED_LEN;

    pub fn flags(&self) -> AnmfFlags {
        let mut flags = AnmfFlags::empty();
        flags.set(AnmfFlags::DISPOSE_BACKGROUND, self.dispose_to_background);
        flags.set(AnmfFlags::ALPHA_BLENDING, self.use_alpha_blending);
        flags
    }

    /// The tag of the nested image chunk.
    pub fn image_name(&self) -> FourCC {
        match self.is_lossless {
            true => VP8L,
            false => VP8,
        }
    }

    /// Returns the nested image chunk.
    pub fn image(&self) -> ImageChunk {
        ImageChunk::new(self.payload.clone())
    }

    fn fields(&self) -> Result<FrameFields, CodecError> {
        ensure_matches_attach!(U24::new(self.x), Some(x), CodecError::InvalidInput, "frame x offset exceeds 2^24 - 1");
        ensure_matches_attach!(U24::new(self.y), Some(y), CodecError::InvalidInput, "frame y offset exceeds 2^24 - 1");
        ensure_matches_attach!(
            OneBasedU24::new(self.width),
            Some(width),
            CodecError::InvalidInput,
            "frame width exceeds 2^24",
        );
        ensure_matches_attach!(
            OneBasedU24::new(self.height),
            Some(height),
            CodecError::InvalidInput,
            "frame height exceeds 2^24",
        );
        ensure_matches_attach!(
            U24::new(self.duration_ms),
            Some(duration),
            CodecError::InvalidInput,
            "frame duration exceeds 2^24 - 1",
        );
        Ok(FrameFields { x, y, width, height, duration, flags: self.flags() })
    }
}

impl ParseChunk for AnimationFrame {
    const NAME: FourCC = ANMF;

    fn parse(mut buf: &mut BytesMut) -> Result<Self, CodecError> {
        let x = U24::parse(&mut buf).while_parsing_field(Self::NAME, "x")?;
        let y = U24::parse(&mut buf).while_parsing_field(Self::NAME, "y")?;
        let width = OneBasedU24::parse(&mut buf).while_parsing_field(Self::NAME, "width")?;
        let height = OneBasedU24::parse(&mut buf).while_parsing_field(Self::NAME, "height")?;
        let duration = U24::parse(&mut buf).while_parsing_field(Self::NAME, "duration")?;
        let flags = AnmfFlags::parse(&mut buf).while_parsing_field(Self::NAME, "flags")?;

        let image_header = ChunkHeader::parse(&mut buf).while_parsing_chunk(Self::NAME)?;
        let is_lossless = match image_header.name {
            VP8 => false,
            VP8L => true,
            name => bail_attach!(CodecError::UnknownChunkTag(name), while_parsing_chunk(Self::NAME)),
        };
        ensure_attach!(
            buf.remaining() as u64 >= image_header.len.into(),
            CodecError::TruncatedChunk,
            while_parsing_chunk(image_header.name),
            while_parsing_chunk(Self::NAME),
        );
        let payload = buf.split_to(image_header.len as usize).freeze();

        // The nested chunk's padding byte is part of the frame data, whether or not the container is padded.
        if image_header.padded() && buf.remaining() == 1 {
            ensure_attach!(
                buf.get_u8() == 0,
                CodecError::MalformedContainer,
                "non-zero padding byte",
                while_parsing_chunk(image_header.name),
            );
        }
        ensure_attach!(
            !buf.has_remaining(),
            CodecError::TruncatedChunk,
            "frame length disagrees with image chunk length",
            while_parsing_chunk(Self::NAME),
        );

        Ok(Self {
            x: x.get(),
            y: y.get(),
            width: width.get(),
            height: height.get(),
            duration_ms: duration.get(),
            dispose_to_background: flags.contains(AnmfFlags::DISPOSE_BACKGROUND),
            use_alpha_blending: flags.contains(AnmfFlags::ALPHA_BLENDING),
            is_lossless,
            payload,
        })
    }
}

impl ParsedChunk for AnimationFrame {
    fn encoded_len(&self, padding: bool) -> u64 {
        let image_len = self.payload.len() as u64;
        let pad_len = (padding && image_len % 2 == 1) as u64;
        u64::from(Self::FIELDS_LEN) + u64::from(ChunkHeader::ENCODED_LEN) + image_len + pad_len
    }

    fn validate(&self) -> Result<(), CodecError> {
        self.fields()?;
        self.image().validate()
    }

    fn put_buf(&self, mut buf: &mut dyn BufMut, padding: bool) {
        let fields = self.fields().unwrap_or_else(|_| panic!("put_buf called on invalid {}", Self::NAME));
        let FrameFields { x, y, width, height, duration, flags } = fields;
        x.put_buf(&mut buf);
        y.put_buf(&mut buf);
        width.put_buf(&mut buf);
        height.put_buf(&mut buf);
        duration.put_buf(&mut buf);
        flags.put_buf(&mut buf);

        let image_header = ChunkHeader { name: self.image_name(), len: self.payload.len() as u32 };
        image_header.put_buf(&mut buf);
        buf.put_slice(&self.payload);
        if padding && image_header.padded() {
            buf.put_u8(0);
        }
    }
}

//
// AnmfFlags impls
//

impl RiffFlags for AnmfFlags {}
