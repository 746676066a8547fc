#![allow(missing_docs)]

use bytes::{BufMut, Bytes, BytesMut};
use webpmux_common::{ensure_attach, Result};

use super::{CodecError, ParsedChunk};

/// A `VP8 ` or `VP8L` chunk: one still image as an opaque, already-encoded bitstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageChunk {
    pub payload: Bytes,
}

//
// ImageChunk impls
//

impl ImageChunk {
    /// The largest payload whose chunk still fits in a file of length [`MAX_FILE_LEN`](crate::MAX_FILE_LEN).
    pub const MAX_PAYLOAD_LEN: u32 = crate::MAX_FILE_LEN - 4 - 8 - 1;

    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self { payload: payload.into() }
    }

    pub fn parse(buf: &mut BytesMut) -> Result<Self, CodecError> {
        let payload = buf.split().freeze();
        Ok(Self { payload })
    }
}

impl ParsedChunk for ImageChunk {
    fn encoded_len(&self, _padding: bool) -> u64 {
        self.payload.len() as u64
    }

    fn validate(&self) -> Result<(), CodecError> {
        ensure_attach!(
            self.payload.len() as u64 <= Self::MAX_PAYLOAD_LEN.into(),
            CodecError::InvalidInput,
            "image payload too large",
        );
        Ok(())
    }

    fn put_buf(&self, buf: &mut dyn BufMut, _padding: bool) {
        buf.put_slice(&self.payload);
    }
}
