#![allow(missing_docs)]

use std::mem::size_of;
use std::num::NonZeroU32;

use bitflags::Flags;
use bytes::{Buf, BufMut};

use webpmux_common::error::{TypeName, WhileCoding};
use webpmux_common::parse::FourCC;
use webpmux_common::{ensure_attach, report_attach, Result, ResultExt};

use super::CodecError;

/// A fixed-width little-endian field of a chunk.
pub trait RiffPrim: Sized {
    const ENCODED_LEN: u32;
    fn parse<B: Buf>(buf: B) -> Result<Self, CodecError>;
    fn put_buf<B: BufMut>(&self, buf: B);
}

/// A [`bitflags`] type stored as a little-endian integer field, with all undefined bits reserved as zero.
pub trait RiffFlags: Flags {
    /// Whether a set reserved bit makes the field malformed. Otherwise reserved bits are dropped when parsing.
    const REJECT_RESERVED: bool = true;
}

/// A 24-bit unsigned integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct U24(u32);

/// A 24-bit unsigned integer in the range `1..=2^24`, stored as `value - 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct OneBasedU24(NonZeroU32);

//
// RiffPrim impls
//

macro_rules! riff_int {
    ($($ty:ty => ($get_fun:ident, $put_fun:ident)),+ $(,)?) => {
        $(impl RiffPrim for $ty {
            const ENCODED_LEN: u32 = size_of::<Self>() as u32;

            fn parse<B: Buf>(mut buf: B) -> Result<Self, CodecError> {
                ensure_attach!(
                    buf.remaining() >= Self::ENCODED_LEN as usize,
                    CodecError::TruncatedChunk,
                    WhileCoding::parsing(TypeName::of::<Self>()),
                );
                Ok(buf.$get_fun())
            }

            fn put_buf<B: BufMut>(&self, mut buf: B) {
                buf.$put_fun(*self)
            }
        })+
    };
}

riff_int! {
    u8 => (get_u8, put_u8),
    u16 => (get_u16_le, put_u16_le),
    u32 => (get_u32_le, put_u32_le),
}

impl RiffPrim for FourCC {
    const ENCODED_LEN: u32 = FourCC::ENCODED_LEN;

    fn parse<B: Buf>(buf: B) -> Result<Self, CodecError> {
        ensure_attach!(
            buf.remaining() >= Self::ENCODED_LEN as usize,
            CodecError::TruncatedChunk,
            WhileCoding::parsing(TypeName::of::<Self>()),
        );
        Ok(FourCC::parse(buf))
    }

    fn put_buf<B: BufMut>(&self, buf: B) {
        FourCC::put_buf(self, buf)
    }
}

//
// RiffFlags impls
//

impl<T: RiffFlags> RiffPrim for T
where
    T::Bits: TryFrom<u64> + Into<u64>,
{
    const ENCODED_LEN: u32 = size_of::<<Self as Flags>::Bits>() as u32;

    fn parse<B: Buf>(mut buf: B) -> Result<Self, CodecError> {
        ensure_attach!(
            buf.remaining() >= Self::ENCODED_LEN as usize,
            CodecError::TruncatedChunk,
            WhileCoding::parsing(TypeName::of::<Self>()),
        );
        let raw = buf.get_uint_le(Self::ENCODED_LEN as usize);
        let defined: u64 = Self::all().bits().into();
        let reserved = raw & !defined;
        if reserved != 0 && Self::REJECT_RESERVED {
            return Err(report_attach!(CodecError::MalformedContainer, format!("reserved bits {reserved:#x} set")))
                .while_parsing_type();
        }
        if reserved != 0 {
            log::debug!("ignoring reserved bits {reserved:#x} of {}", std::any::type_name::<Self>());
        }
        let value = raw.try_into().unwrap_or_else(|_| unreachable!());
        Ok(Self::from_bits_truncate(value))
    }

    fn put_buf<B: BufMut>(&self, mut buf: B) {
        buf.put_uint_le(self.bits().into(), Self::ENCODED_LEN as usize);
    }
}

//
// U24 impls
//

impl U24 {
    pub const MAX: u32 = (1 << 24) - 1;

    /// Returns [`None`] if `value` does not fit in 24 bits.
    pub fn new(value: u32) -> Option<Self> {
        (value <= Self::MAX).then_some(Self(value))
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl RiffPrim for U24 {
    const ENCODED_LEN: u32 = 3;

    fn parse<B: Buf>(mut buf: B) -> Result<Self, CodecError> {
        ensure_attach!(
            buf.remaining() >= Self::ENCODED_LEN as usize,
            CodecError::TruncatedChunk,
            WhileCoding::parsing(TypeName::of::<Self>()),
        );
        Ok(Self(buf.get_uint_le(Self::ENCODED_LEN as usize) as u32))
    }

    fn put_buf<B: BufMut>(&self, mut buf: B) {
        buf.put_uint_le(self.0.into(), Self::ENCODED_LEN as usize)
    }
}

//
// OneBasedU24 impls
//

impl OneBasedU24 {
    pub const MAX: u32 = 1 << 24;

    /// Returns [`None`] if `value` is greater than 2^24.
    pub fn new(value: NonZeroU32) -> Option<Self> {
        (value.get() <= Self::MAX).then_some(Self(value))
    }

    pub fn get(&self) -> NonZeroU32 {
        self.0
    }
}

impl RiffPrim for OneBasedU24 {
    const ENCODED_LEN: u32 = 3;

    fn parse<B: Buf>(mut buf: B) -> Result<Self, CodecError> {
        ensure_attach!(
            buf.remaining() >= Self::ENCODED_LEN as usize,
            CodecError::TruncatedChunk,
            WhileCoding::parsing(TypeName::of::<Self>()),
        );
        let value = NonZeroU32::MIN.saturating_add(buf.get_uint_le(Self::ENCODED_LEN as usize) as u32);
        Ok(Self(value))
    }

    fn put_buf<B: BufMut>(&self, mut buf: B) {
        buf.put_uint_le(u64::from(self.0.get()) - 1, Self::ENCODED_LEN as usize);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn u24_le() {
        let mut out = Vec::new();
        U24::new(0x01_02_03).unwrap().put_buf(&mut out);
        assert_eq!(out, [0x03, 0x02, 0x01]);
        assert_eq!(U24::parse(&out[..]).unwrap().get(), 0x01_02_03);
        assert_eq!(U24::new(U24::MAX + 1), None);
    }

    #[test]
    fn one_based_u24_min() {
        let mut out = Vec::new();
        OneBasedU24::new(NonZeroU32::MIN).unwrap().put_buf(&mut out);
        assert_eq!(out, [0, 0, 0]);
        assert_eq!(OneBasedU24::parse(&out[..]).unwrap().get(), NonZeroU32::MIN);
    }

    #[test]
    fn one_based_u24_max() {
        let max = NonZeroU32::new(1 << 24).unwrap();
        let mut out = Vec::new();
        OneBasedU24::new(max).unwrap().put_buf(&mut out);
        assert_eq!(out, [0xff, 0xff, 0xff]);
        assert_eq!(OneBasedU24::parse(&out[..]).unwrap().get(), max);
        assert_eq!(OneBasedU24::new(NonZeroU32::new((1 << 24) + 1).unwrap()), None);
    }

    #[test]
    fn truncated() {
        assert_matches!(U24::parse(&[0u8, 0][..]).unwrap_err().into_inner(), CodecError::TruncatedChunk);
        assert_matches!(u32::parse(&[0u8; 3][..]).unwrap_err().into_inner(), CodecError::TruncatedChunk);
    }
}
