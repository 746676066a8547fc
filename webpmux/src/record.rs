use bytes::{BufMut, Bytes, BytesMut};
use webpmux_common::parse::FourCC;
use webpmux_common::{bail_attach, Result};

use crate::parse::chunk_type::{ANIM, ANMF, VP8, VP8L, VP8X};
use crate::parse::error::while_parsing_chunk;
use crate::parse::{
    AnimationFrame, AnimationParameters, CodecError, ExtendedHeader, ImageChunk, ParseChunk, ParsedChunk,
};

/// A chunk of a WebP container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkRecord {
    /// A `VP8 ` chunk: a still image encoded with the lossy codec.
    ImageLossy(ImageChunk),

    /// A `VP8L` chunk: a still image encoded with the lossless codec.
    ImageLossless(ImageChunk),

    /// A `VP8X` chunk: canvas dimensions and feature flags.
    ExtendedHeader(ExtendedHeader),

    /// An `ANIM` chunk: global animation parameters.
    AnimationParameters(AnimationParameters),

    /// An `ANMF` chunk: one animation frame.
    AnimationFrame(AnimationFrame),
}

//
// ChunkRecord impls
//

impl ChunkRecord {
    /// Returns the chunk's tag.
    pub fn name(&self) -> FourCC {
        match self {
            Self::ImageLossy(_) => VP8,
            Self::ImageLossless(_) => VP8L,
            Self::ExtendedHeader(_) => VP8X,
            Self::AnimationParameters(_) => ANIM,
            Self::AnimationFrame(_) => ANMF,
        }
    }

    /// Whether `name` is the tag of one of the chunk types understood by the codec.
    pub fn is_known(name: FourCC) -> bool {
        matches!(name, VP8 | VP8L | VP8X | ANIM | ANMF)
    }

    /// Returns the image bitstream of an image or animation frame chunk.
    pub fn image_payload(&self) -> Option<&Bytes> {
        match self {
            Self::ImageLossy(image) | Self::ImageLossless(image) => Some(&image.payload),
            Self::AnimationFrame(frame) => Some(&frame.payload),
            Self::ExtendedHeader(_) | Self::AnimationParameters(_) => None,
        }
    }

    /// Whether this is a bare `VP8 ` or `VP8L` chunk.
    pub fn is_image(&self) -> bool {
        matches!(self, Self::ImageLossy(_) | Self::ImageLossless(_))
    }

    /// Parse the data of a chunk named `name`.
    pub(crate) fn parse(name: FourCC, buf: &mut BytesMut) -> Result<Self, CodecError> {
        let record = match name {
            VP8 => Self::ImageLossy(ImageChunk::parse(buf)?),
            VP8L => Self::ImageLossless(ImageChunk::parse(buf)?),
            VP8X => Self::ExtendedHeader(parse_exact(buf)?),
            ANIM => Self::AnimationParameters(parse_exact(buf)?),
            ANMF => Self::AnimationFrame(AnimationFrame::parse(buf)?),
            _ => bail_attach!(CodecError::UnknownChunkTag(name)),
        };
        Ok(record)
    }

    pub(crate) fn chunk(&self) -> &dyn ParsedChunk {
        match self {
            Self::ImageLossy(image) | Self::ImageLossless(image) => image,
            Self::ExtendedHeader(header) => header,
            Self::AnimationParameters(anim) => anim,
            Self::AnimationFrame(frame) => frame,
        }
    }

    pub(crate) fn encoded_len(&self, padding: bool) -> u64 {
        self.chunk().encoded_len(padding)
    }

    pub(crate) fn validate(&self) -> Result<(), CodecError> {
        self.chunk().validate()
    }

    pub(crate) fn put_buf(&self, buf: &mut dyn BufMut, padding: bool) {
        self.chunk().put_buf(buf, padding)
    }
}

impl From<ExtendedHeader> for ChunkRecord {
    fn from(header: ExtendedHeader) -> Self {
        Self::ExtendedHeader(header)
    }
}

impl From<AnimationParameters> for ChunkRecord {
    fn from(anim: AnimationParameters) -> Self {
        Self::AnimationParameters(anim)
    }
}

impl From<AnimationFrame> for ChunkRecord {
    fn from(frame: AnimationFrame) -> Self {
        Self::AnimationFrame(frame)
    }
}

/// Parse a fixed-length chunk, which must consume all of `buf`.
fn parse_exact<T: ParseChunk + ParsedChunk>(buf: &mut BytesMut) -> Result<T, CodecError> {
    let parsed = T::parse(buf)?;
    let expected_len = parsed.encoded_len(true);
    if !buf.is_empty() {
        bail_attach!(
            CodecError::TruncatedChunk,
            format!("{} bytes of data, expected {expected_len}", expected_len + buf.len() as u64),
            while_parsing_chunk(T::NAME),
        );
    }
    Ok(parsed)
}

#[cfg(test)]
mod test {
    use std::num::NonZeroU32;

    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn names() {
        let image = ImageChunk::new(&b"data"[..]);
        assert_eq!(ChunkRecord::ImageLossy(image.clone()).name(), VP8);
        assert_eq!(ChunkRecord::ImageLossless(image).name(), VP8L);
        assert!(ChunkRecord::is_known(ANMF));
        assert!(!ChunkRecord::is_known(FourCC::from_str("ALPH")));
    }

    #[test]
    fn parse_unknown() {
        let name = FourCC::from_str("EXIF");
        let err = ChunkRecord::parse(name, &mut BytesMut::new()).unwrap_err();
        assert_matches!(err.into_inner(), CodecError::UnknownChunkTag(tag) if tag == name);
    }

    #[test]
    fn parse_fixed_len_extra_data() {
        let anim = AnimationParameters { background_color: 0, loop_count: 3 };
        let mut buf = BytesMut::new();
        anim.put_buf(&mut buf, true);
        buf.extend_from_slice(&[0, 0]);
        let err = ChunkRecord::parse(ANIM, &mut buf).unwrap_err();
        assert_matches!(err.into_inner(), CodecError::TruncatedChunk);
    }

    #[test]
    fn parse_fixed_len_short() {
        let mut buf = BytesMut::from(&[0u8; 5][..]);
        let err = ChunkRecord::parse(ANIM, &mut buf).unwrap_err();
        assert_matches!(err.into_inner(), CodecError::TruncatedChunk);
    }

    #[test]
    fn image_payload() {
        let frame = AnimationFrame {
            x: 0,
            y: 0,
            width: NonZeroU32::MIN,
            height: NonZeroU32::MIN,
            duration_ms: 0,
            dispose_to_background: false,
            use_alpha_blending: false,
            is_lossless: false,
            payload: Bytes::from_static(b"frame"),
        };
        assert_eq!(ChunkRecord::from(frame).image_payload().map(|p| &p[..]), Some(&b"frame"[..]));
        let anim = AnimationParameters { background_color: 0, loop_count: 0 };
        assert_eq!(ChunkRecord::from(anim).image_payload(), None);
    }
}
