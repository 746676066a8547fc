//! Parsing primitives shared by the `webpmux` crates.

mod fourcc;

pub use fourcc::FourCC;
