use std::mem::MaybeUninit;
use std::ptr::{null_mut, NonNull};

use libwebp_sys::{
    VP8StatusCode, WebPBitstreamFeatures, WebPData, WebPDecode, WebPDecoderConfig, WebPDecoderOptions,
    WebPDemuxDelete, WebPDemuxGetFrame, WebPDemuxInternal, WebPDemuxNextFrame, WebPDemuxReleaseIterator, WebPDemuxer,
    WebPGetDemuxABIVersion, WebPGetFeatures, WebPIterator, WEBP_CSP_MODE,
};

#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    #[error("VP8 error: {0:?}")]
    VP8(VP8StatusCode),

    #[error("error demuxing")]
    Demux,

    #[error("frame {0} is {1}x{2}, outside the {3}x{4} canvas")]
    FrameOutsideCanvas(u32, i32, i32, i32, i32),
}

trait VP8StatusCodeExt {
    fn ok(self) -> Result<(), Error>;
}

/// Iterates the frames of an animated (or still) container.
struct FrameDemuxer<'a> {
    demuxer: NonNull<WebPDemuxer>,
    frame_iter: WebPIterator,
    done: bool,
    _data: &'a [u8],
}

/// Demux `data` and decode the top-left pixel of each frame, returning the number of frames decoded.
pub fn decode_frames(data: &[u8]) -> Result<u32, Error> {
    let mut out_buf = [0; 4];
    let mut config = pixel_decoder_config(&mut out_buf);

    unsafe { WebPGetFeatures(data.as_ptr(), data.len(), &mut config.input).ok()? };
    let WebPBitstreamFeatures { width: canvas_width, height: canvas_height, .. } = config.input;

    let mut frame_count = 0;
    for frame in FrameDemuxer::new(data)? {
        let frame = frame?;
        if frame.x_offset + frame.width > canvas_width || frame.y_offset + frame.height > canvas_height {
            return Err(Error::FrameOutsideCanvas(
                frame.frame_num as u32,
                frame.width,
                frame.height,
                canvas_width,
                canvas_height,
            ));
        }
        unsafe { WebPDecode(frame.fragment.bytes, frame.fragment.size, &mut config).ok()? };
        frame_count += 1;
    }
    log::info!("libwebp decoded {frame_count} frames of {canvas_width}x{canvas_height} canvas");
    Ok(frame_count)
}

/// A decoder config which decodes only the top-left pixel into `out_buf`.
fn pixel_decoder_config(out_buf: &mut [u8; 4]) -> WebPDecoderConfig {
    let mut config = WebPDecoderConfig::new().unwrap();
    config.options = WebPDecoderOptions {
        bypass_filtering: 1,
        no_fancy_upsampling: 1,
        use_cropping: 1,
        crop_left: 0,
        crop_top: 0,
        crop_width: 1,
        crop_height: 1,
        use_scaling: 0,
        scaled_width: 0,
        scaled_height: 0,
        use_threads: 0,
        dithering_strength: 0,
        flip: 0,
        alpha_dithering_strength: 0,
        pad: [0; 5],
    };
    config.output.colorspace = WEBP_CSP_MODE::MODE_ARGB;
    config.output.width = 1;
    config.output.height = 1;
    config.output.u.RGBA.rgba = out_buf.as_mut_ptr();
    config.output.u.RGBA.stride = 4;
    config.output.u.RGBA.size = 4;
    config.output.is_external_memory = 1;
    config
}

impl VP8StatusCodeExt for VP8StatusCode {
    fn ok(self) -> Result<(), Error> {
        match self {
            Self::VP8_STATUS_OK => Ok(()),
            _ => Err(Error::VP8(self)),
        }
    }
}

impl<'a> FrameDemuxer<'a> {
    fn new(data: &'a [u8]) -> Result<Self, Error> {
        unsafe {
            let webp_data = WebPData { bytes: data.as_ptr(), size: data.len() };

            let demuxer = WebPDemuxInternal(&webp_data, 0, null_mut(), WebPGetDemuxABIVersion());
            let demuxer = NonNull::new(demuxer).ok_or(Error::Demux)?;

            let mut frame_iter = MaybeUninit::uninit();
            if WebPDemuxGetFrame(demuxer.as_ptr(), 1, frame_iter.as_mut_ptr()) == 0 {
                WebPDemuxDelete(demuxer.as_ptr());
                return Err(Error::Demux);
            }

            Ok(Self { demuxer, frame_iter: frame_iter.assume_init(), done: false, _data: data })
        }
    }
}

impl Iterator for FrameDemuxer<'_> {
    type Item = Result<WebPIterator, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let frame = self.frame_iter;
        if frame.frame_num >= frame.num_frames {
            self.done = true;
        } else if unsafe { WebPDemuxNextFrame(&mut self.frame_iter) } == 0 {
            self.done = true;
            return Some(Err(Error::Demux));
        }
        Some(Ok(frame))
    }
}

impl Drop for FrameDemuxer<'_> {
    fn drop(&mut self) {
        unsafe {
            WebPDemuxReleaseIterator(&mut self.frame_iter);
            WebPDemuxDelete(self.demuxer.as_ptr());
        }
    }
}
