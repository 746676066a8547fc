use std::io;

use bytes::{Buf, BufMut};
use futures_util::{AsyncRead, AsyncReadExt};
use webpmux_common::error::{TypeName, WhileCoding};
use webpmux_common::{ensure_attach, Result};

use super::chunk_type::RIFF;
use super::{CodecError, FourCC, RiffPrim};

/// The tag and length which prefix every chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub name: FourCC,
    pub len: u32,
}

/// The container header: `RIFF`, the length of the rest of the file, and the `WEBP` format tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileHeader {
    /// The number of bytes following the 8-byte `RIFF` preamble, including the `WEBP` format tag.
    pub len: u32,
}

macro_rules! chunk_type {
    ($($code:ident),+ $(,)?) => {
        #[allow(missing_docs)]
        pub mod chunk_type {
            use super::*;
            $(
                #[doc = concat!("The `", stringify!($code), "` chunk type.")]
                pub const $code: FourCC = FourCC::from_str(stringify!($code));
            )+
        }
    };
}

chunk_type!(ANIM, ANMF, RIFF, VP8, VP8L, VP8X);

//
// ChunkHeader impls
//

#[allow(missing_docs)]
impl ChunkHeader {
    /// Whether a padding byte follows the chunk's data when chunks are padded to an even length.
    pub fn padded(&self) -> bool {
        self.len % 2 == 1
    }

    pub(crate) async fn read<R: AsyncRead + Unpin>(mut input: R) -> io::Result<Self> {
        let mut buf = [0; Self::ENCODED_LEN as usize];
        input.read_exact(&mut buf).await?;
        let name = FourCC::parse(&buf[..4]);
        let len = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Ok(Self { name, len })
    }
}

impl RiffPrim for ChunkHeader {
    const ENCODED_LEN: u32 = 8;

    fn parse<B: Buf>(mut buf: B) -> Result<Self, CodecError> {
        ensure_attach!(
            buf.remaining() >= Self::ENCODED_LEN as usize,
            CodecError::TruncatedChunk,
            WhileCoding::parsing(TypeName::of::<Self>())
        );

        let name = FourCC::parse(&mut buf);
        let len = buf.get_u32_le();
        Ok(Self { name, len })
    }

    fn put_buf<B: BufMut>(&self, mut buf: B) {
        self.name.put_buf(&mut buf);
        buf.put_u32_le(self.len);
    }
}

//
// FileHeader impls
//

#[allow(missing_docs)]
impl FileHeader {
    pub const WEBP: FourCC = FourCC::from_str("WEBP");

    /// The offset of the length field from the start of the file.
    pub const LEN_OFFSET: u64 = 4;

    /// The number of bytes which precede the counted length: the `RIFF` tag and the length field itself.
    pub const PREAMBLE_LEN: u64 = 8;
}

impl RiffPrim for FileHeader {
    const ENCODED_LEN: u32 = 12;

    fn parse<B: Buf>(mut buf: B) -> Result<Self, CodecError> {
        ensure_attach!(
            buf.remaining() >= Self::ENCODED_LEN as usize,
            CodecError::TruncatedChunk,
            WhileCoding::parsing(TypeName::of::<Self>())
        );

        let magic = FourCC::parse(&mut buf);
        ensure_attach!(
            magic == RIFF,
            CodecError::MalformedContainer,
            "not a RIFF file",
            WhileCoding::parsing(TypeName::of::<Self>()),
        );
        let len = buf.get_u32_le();
        let format = FourCC::parse(&mut buf);
        ensure_attach!(
            format == Self::WEBP,
            CodecError::MalformedContainer,
            "not a WebP file",
            WhileCoding::parsing(TypeName::of::<Self>()),
        );
        Ok(Self { len })
    }

    fn put_buf<B: BufMut>(&self, mut buf: B) {
        RIFF.put_buf(&mut buf);
        buf.put_u32_le(self.len);
        Self::WEBP.put_buf(&mut buf);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn file_header() {
        let mut out = Vec::new();
        FileHeader { len: 0x1234 }.put_buf(&mut out);
        assert_eq!(out, b"RIFF\x34\x12\0\0WEBP");
        assert_eq!(FileHeader::parse(&out[..]).unwrap(), FileHeader { len: 0x1234 });
    }

    #[test]
    fn file_header_bad_magic() {
        let err = FileHeader::parse(&b"RIFX\0\0\0\0WEBP"[..]).unwrap_err();
        assert_matches!(err.into_inner(), CodecError::MalformedContainer);
    }

    #[test]
    fn file_header_bad_format() {
        let err = FileHeader::parse(&b"RIFF\0\0\0\0WAVE"[..]).unwrap_err();
        assert_matches!(err.into_inner(), CodecError::MalformedContainer);
    }

    #[test]
    fn chunk_header_padded() {
        assert!(ChunkHeader { name: chunk_type::VP8, len: 3 }.padded());
        assert!(!ChunkHeader { name: chunk_type::VP8, len: 4 }.padded());
    }
}
