#![warn(missing_docs)]

//! `webpmux-common` is a common library shared by the `webpmux` container codec crates.
//!
//! It contains the [`Report`]-based error machinery, the `*_attach!` macros built on it, the [`FourCC`] chunk tag type,
//! and an adapter to drive the codec's async parsing code from a blocking context.
//!
//! [`FourCC`]: parse::FourCC

#[macro_use]
pub mod macros;

pub mod error;
pub mod parse;
pub mod sync;
pub mod util;

//
// public types
//

pub use error::{Error, Report, Result, ResultExt};

/// A pointer to a span in the given input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputSpan {
    /// The offset from the beginning of the input where the span begins.
    pub offset: u64,

    /// The length of the span.
    pub len: u64,
}

//
// InputSpan impls
//

impl InputSpan {
    /// Returns the offset one past the end of the span.
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn input_span_end() {
        assert_eq!(InputSpan { offset: 12, len: 18 }.end(), 30);
        assert_eq!(InputSpan { offset: u64::MAX, len: 1 }.end(), u64::MAX);
    }
}
