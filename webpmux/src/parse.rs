//! Chunk types of the WebP container, and their encodings.
//!
//! Most users only need [`ChunkRecord`](crate::ChunkRecord) and the chunk structs re-exported here; the traits and
//! integer types are a less stable API for encoding and decoding individual chunks.

mod anim;
mod anmf;
pub mod error;
mod header;
mod image;
mod integers;
mod vp8x;

use bytes::{BufMut, BytesMut};
use webpmux_common::Result;

/// A chunk type which can be decoded from its data.
#[allow(missing_docs)]
pub trait ParseChunk: Sized {
    const NAME: FourCC;

    /// Parse the chunk from all of `buf`, the chunk's data excluding its header and trailing padding.
    fn parse(buf: &mut BytesMut) -> Result<Self, CodecError>;
}

/// A chunk type which can be encoded as chunk data.
pub trait ParsedChunk {
    /// The length of the encoded chunk data, excluding its header and trailing padding.
    ///
    /// `padding` controls whether chunks nested in this chunk are padded to an even length.
    fn encoded_len(&self, padding: bool) -> u64;

    /// Check that every field is representable in the encoding.
    fn validate(&self) -> Result<(), CodecError> {
        Ok(())
    }

    /// Encode the chunk data to `buf`.
    ///
    /// # Panics
    ///
    /// May panic if [`validate`](Self::validate) returns an error.
    fn put_buf(&self, buf: &mut dyn BufMut, padding: bool);
}

pub use anim::AnimationParameters;
pub use anmf::{AnimationFrame, AnmfFlags};
pub use error::CodecError;
pub use header::{chunk_type, ChunkHeader, FileHeader};
pub use image::ImageChunk;
pub use integers::{OneBasedU24, RiffFlags, RiffPrim, U24};
pub use vp8x::{ExtendedHeader, Vp8xFlags};

pub use webpmux_common::parse::FourCC;
