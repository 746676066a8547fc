#![allow(missing_docs)]

use bytes::{BufMut, BytesMut};
use webpmux_common::parse::FourCC;
use webpmux_common::Result;

use super::chunk_type::ANIM;
use super::error::CodecResultExt;
use super::{CodecError, ParseChunk, ParsedChunk, RiffPrim};

/// The `ANIM` chunk: global animation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnimationParameters {
    /// The canvas background color, in `[blue, green, red, alpha]` byte order.
    pub background_color: u32,

    /// The number of times to loop the animation, with `0` meaning forever.
    pub loop_count: u16,
}

//
// AnimationParameters impls
//

impl AnimationParameters {
    /// Background color used when none is configured: transparent black.
    pub const BACKGROUND_COLOR_UNSET: u32 = 0;
}

impl ParseChunk for AnimationParameters {
    const NAME: FourCC = ANIM;

    fn parse(mut buf: &mut BytesMut) -> Result<Self, CodecError> {
        let background_color = u32::parse(&mut buf).while_parsing_field(Self::NAME, "background_color")?;
        let loop_count = u16::parse(&mut buf).while_parsing_field(Self::NAME, "loop_count")?;
        Ok(Self { background_color, loop_count })
    }
}

impl ParsedChunk for AnimationParameters {
    fn encoded_len(&self, _padding: bool) -> u64 {
        (u32::ENCODED_LEN + u16::ENCODED_LEN).into()
    }

    fn put_buf(&self, mut buf: &mut dyn BufMut, _padding: bool) {
        let Self { background_color, loop_count } = self;
        background_color.put_buf(&mut buf);
        loop_count.put_buf(&mut buf);
    }
}
