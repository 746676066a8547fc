//! Error types returned by the container codec.

use std::fmt::{Debug, Display};

use derive_more::Display;
use webpmux_common::error::{ReportableError, WhileCoding};
use webpmux_common::parse::FourCC;
use webpmux_common::{Result, ResultExt};

/// The kind of error returned by the container codec.
///
/// IO errors are reported separately, as [`Error::Io`](crate::Error::Io); every other failure carries one of these
/// kinds inside a [`Report`](webpmux_common::Report) whose [`Debug`] output includes the diagnostic trail.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The input does not start with a `RIFF` header of format `WEBP`, or contains data disallowed by the format.
    #[error("Malformed container")]
    MalformedContainer,

    /// The input contains a chunk tag the codec does not understand.
    ///
    /// Unknown chunks are never skipped, as their length cannot be trusted.
    #[error("Unknown chunk tag `{0}`")]
    UnknownChunkTag(FourCC),

    /// The input ended before the end of a chunk, or a chunk's length disagrees with its contents.
    #[error("Truncated chunk")]
    TruncatedChunk,

    /// Chunks were written in an order or configuration disallowed by the format.
    #[error("Invalid chunk layout")]
    InvalidChunkLayout,

    /// A value cannot be represented in the format, e.g. a canvas wider than 2^24 pixels.
    #[error("Invalid input")]
    InvalidInput,

    /// The API was used out of order, e.g. a chunk was written after the container was closed.
    #[error("Invalid state")]
    InvalidState,

    /// An animation was closed without any frames.
    #[error("Empty animation")]
    EmptyAnimation,

    /// The frame encoder collaborator failed to encode a frame.
    #[error("Frame encoding failed")]
    FrameEncoding,
}

pub(crate) trait CodecResultExt: ResultExt + Sized {
    fn while_parsing_chunk(self, chunk_type: FourCC) -> Self {
        self.while_parsing(ChunkName(chunk_type))
    }

    fn while_parsing_field<T>(self, chunk_type: FourCC, field_name: T) -> Self
    where
        T: Display + Debug + Send + Sync + 'static,
    {
        self.while_parsing(ChunkField(chunk_type, field_name))
    }

    fn while_writing_chunk(self, chunk_type: FourCC) -> Self {
        self.while_writing(ChunkName(chunk_type))
    }
}

#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "multiple `{}` chunks", _0)]
pub(crate) struct MultipleChunks(pub(crate) FourCC);

#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "expected `{}` chunk", _0)]
pub(crate) struct ExpectedChunk(pub(crate) FourCC);

/// A chunk, as the subject of a [`WhileCoding`] context message.
#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "`{}` chunk", _0)]
pub(crate) struct ChunkName(pub(crate) FourCC);

#[derive(Clone, Copy, Debug, Display)]
#[display(fmt = "`{}` chunk field `{}`", _0, _1)]
pub(crate) struct ChunkField<T>(pub(crate) FourCC, pub(crate) T);

pub(crate) fn while_parsing_chunk(chunk_type: FourCC) -> WhileCoding<ChunkName> {
    WhileCoding::parsing(ChunkName(chunk_type))
}

pub(crate) fn while_writing_chunk(chunk_type: FourCC) -> WhileCoding<ChunkName> {
    WhileCoding::writing(ChunkName(chunk_type))
}

//
// CodecError impls
//

impl CodecError {
    /// Whether this error is a violation of the API contract by the caller, rather than a problem with the data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::InvalidState | Self::EmptyAnimation)
    }
}

impl ReportableError for CodecError {
    #[cfg(feature = "error-detail")]
    type Trail = webpmux_common::error::DiagnosticTrail;
    #[cfg(not(feature = "error-detail"))]
    type Trail = webpmux_common::error::NoTrail;
}

impl<T> CodecResultExt for Result<T, CodecError> {}

impl<T> CodecResultExt for std::result::Result<T, crate::Error> {}
