//! `webpmux` testing library.
//!
//! This crate is separate from `webpmux` to workaround cargo's inability to specify optional dev-dependencies (see
//! rust-lang/cargo#1596).

#[cfg(feature = "libwebp")]
pub mod libwebp;

//
// public constants
//

/// A lossless bitstream of a single transparent black pixel.
pub const VP8L_1X1: &[u8] = b"\x2f\0\0\0\0\x88\x88\x08";

//
// public functions
//

pub fn init_logger() {
    // Ignore errors initializing the logger if tests race to configure it
    let _ignore = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .is_test(true)
        .try_init();
}

/// A complete single-image container holding `bitstream` in a chunk named `name`, as an image encoder would emit it.
pub fn still_container(name: &[u8; 4], bitstream: &[u8]) -> Vec<u8> {
    let padded_len = bitstream.len() + bitstream.len() % 2;
    let mut out = Vec::with_capacity(20 + padded_len);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(12 + padded_len as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(name);
    out.extend_from_slice(&(bitstream.len() as u32).to_le_bytes());
    out.extend_from_slice(bitstream);
    out.resize(20 + padded_len, 0);
    out
}

/// Read `data` using `libwebp`, verifying that it cannot be decoded.
#[cfg_attr(not(feature = "libwebp"), allow(unused_variables))]
pub fn libwebp_assert_invalid(data: &[u8]) {
    #[cfg(not(feature = "libwebp"))]
    log::info!("not verifying container using libwebp; libwebp feature disabled");
    #[cfg(feature = "libwebp")]
    libwebp::decode_frames(data)
        .err()
        .unwrap_or_else(|| panic!("libwebp didn't return an error"));
}

/// Read `data` using `libwebp`, verifying that all `frame_count` of its frames can be decoded.
#[cfg_attr(not(feature = "libwebp"), allow(unused_variables))]
pub fn libwebp_assert_valid(data: &[u8], frame_count: u32) {
    #[cfg(not(feature = "libwebp"))]
    log::info!("not verifying container using libwebp; libwebp feature disabled");
    #[cfg(feature = "libwebp")]
    {
        let decoded = libwebp::decode_frames(data)
            .unwrap_or_else(|error| panic!("libwebp returned an error: {error}\n{error:?}"));
        assert_eq!(decoded, frame_count, "libwebp decoded {decoded} of {frame_count} frames");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn still_container_padding() {
        let data = still_container(b"VP8 ", b"odd");
        assert_eq!(&data[4..8], 16u32.to_le_bytes());
        assert_eq!(&data[20..], b"odd\0");
        assert_eq!(data.len(), 24);
    }

    #[test]
    fn still_container_vp8l() {
        let data = still_container(b"VP8L", VP8L_1X1);
        assert_eq!(&data[..], b"RIFF\x14\0\0\0WEBPVP8L\x08\0\0\0\x2f\0\0\0\0\x88\x88\x08");
    }
}
