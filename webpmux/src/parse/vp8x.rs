#![allow(missing_docs)]

use std::num::NonZeroU32;

use bytes::{BufMut, BytesMut};
use webpmux_common::parse::FourCC;
use webpmux_common::{ensure_matches_attach, Result};

use super::chunk_type::VP8X;
use super::error::CodecResultExt;
use super::{CodecError, OneBasedU24, ParseChunk, ParsedChunk, RiffFlags, RiffPrim};

/// The `VP8X` chunk: canvas dimensions and the optional features present in the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
    pub has_animation: bool,
    pub has_alpha: bool,
    pub has_exif: bool,
    pub has_xmp: bool,
    pub has_icc_profile: bool,
}

bitflags::bitflags! {
    /// The packed flag field of [`ExtendedHeader`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
    pub struct Vp8xFlags: u32 {
        const HAS_ICCP_CHUNK = 0b0010_0000;
        const HAS_ALPH_CHUNK = 0b0001_0000;
        const HAS_EXIF_CHUNK = 0b0000_1000;
        const HAS_XMP_CHUNK = 0b0000_0100;
        const IS_ANIMATED = 0b0000_0010;
    }
}

//
// ExtendedHeader impls
//

impl ExtendedHeader {
    /// An extended header for an animation on a `width`x`height` canvas, with no other features.
    pub fn animated(width: NonZeroU32, height: NonZeroU32) -> Self {
        Self::from_flags(width, height, Vp8xFlags::IS_ANIMATED)
    }

    pub fn from_flags(width: NonZeroU32, height: NonZeroU32, flags: Vp8xFlags) -> Self {
        Self {
            width,
            height,
            has_animation: flags.contains(Vp8xFlags::IS_ANIMATED),
            has_alpha: flags.contains(Vp8xFlags::HAS_ALPH_CHUNK),
            has_exif: flags.contains(Vp8xFlags::HAS_EXIF_CHUNK),
            has_xmp: flags.contains(Vp8xFlags::HAS_XMP_CHUNK),
            has_icc_profile: flags.contains(Vp8xFlags::HAS_ICCP_CHUNK),
        }
    }

    pub fn flags(&self) -> Vp8xFlags {
        let mut flags = Vp8xFlags::empty();
        flags.set(Vp8xFlags::IS_ANIMATED, self.has_animation);
        flags.set(Vp8xFlags::HAS_ALPH_CHUNK, self.has_alpha);
        flags.set(Vp8xFlags::HAS_EXIF_CHUNK, self.has_exif);
        flags.set(Vp8xFlags::HAS_XMP_CHUNK, self.has_xmp);
        flags.set(Vp8xFlags::HAS_ICCP_CHUNK, self.has_icc_profile);
        flags
    }

    fn canvas(&self) -> Result<(OneBasedU24, OneBasedU24), CodecError> {
        ensure_matches_attach!(
            OneBasedU24::new(self.width),
            Some(width),
            CodecError::InvalidInput,
            "canvas width exceeds 2^24",
        );
        ensure_matches_attach!(
            OneBasedU24::new(self.height),
            Some(height),
            CodecError::InvalidInput,
            "canvas height exceeds 2^24",
        );
        Ok((width, height))
    }
}

impl ParseChunk for ExtendedHeader {
    const NAME: FourCC = VP8X;

    fn parse(mut buf: &mut BytesMut) -> Result<Self, CodecError> {
        let flags = Vp8xFlags::parse(&mut buf).while_parsing_field(Self::NAME, "flags")?;
        let width = OneBasedU24::parse(&mut buf).while_parsing_field(Self::NAME, "canvas_width")?;
        let height = OneBasedU24::parse(&mut buf).while_parsing_field(Self::NAME, "canvas_height")?;
        Ok(Self::from_flags(width.get(), height.get(), flags))
    }
}

impl ParsedChunk for ExtendedHeader {
    fn encoded_len(&self, _padding: bool) -> u64 {
        (Vp8xFlags::ENCODED_LEN + OneBasedU24::ENCODED_LEN + OneBasedU24::ENCODED_LEN).into()
    }

    fn validate(&self) -> Result<(), CodecError> {
        self.canvas().map(drop)
    }

    fn put_buf(&self, mut buf: &mut dyn BufMut, _padding: bool) {
        let (width, height) = self.canvas().unwrap_or_else(|_| panic!("put_buf called on invalid {}", Self::NAME));
        self.flags().put_buf(&mut buf);
        width.put_buf(&mut buf);
        height.put_buf(&mut buf);
    }
}

//
// Vp8xFlags impls
//

impl RiffFlags for Vp8xFlags {
    const REJECT_RESERVED: bool = false;
}
