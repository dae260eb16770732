// crates/vidcast-media/src/helpers/rgb.rs
//
// Decoded frame → packed RGB24 conversion, shared by the probe's preview
// frame and the decode pipeline.
//
// The swscale context is kept between frames and rebuilt only when the
// source geometry or pixel format changes. Each conversion writes into a
// fresh destination frame that is dropped before the next call, so nothing
// per-frame outlives one iteration.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;

use vidcast_core::RgbImage;

struct Scaler {
    ctx:    SwsContext,
    format: Pixel,
    width:  u32,
    height: u32,
}

#[derive(Default)]
pub struct RgbConverter {
    scaler: Option<Scaler>,
}

impl RgbConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert(&mut self, frame: &VideoFrame) -> Result<RgbImage, ffmpeg::Error> {
        let (format, width, height) = (frame.format(), frame.width(), frame.height());

        let reusable = self.scaler.as_ref().is_some_and(|s| {
            s.format == format && s.width == width && s.height == height
        });
        if !reusable {
            let ctx = SwsContext::get(
                format, width, height,
                Pixel::RGB24, width, height,
                Flags::BICUBIC,
            )?;
            self.scaler = Some(Scaler { ctx, format, width, height });
        }
        let Some(scaler) = self.scaler.as_mut() else {
            return Err(ffmpeg::Error::Bug);
        };

        let mut rgb = VideoFrame::empty();
        scaler.ctx.run(frame, &mut rgb)?;
        Ok(destripe(&rgb, width, height))
    }
}

/// Copy only the visible pixels of an RGB24 frame, not the stride padding.
pub fn destripe(rgb: &VideoFrame, width: u32, height: u32) -> RgbImage {
    let stride    = rgb.stride(0);
    let raw       = rgb.data(0);
    let row_bytes = width as usize * 3;
    let data: Vec<u8> = (0..height as usize)
        .flat_map(|row| &raw[row * stride..row * stride + row_bytes])
        .copied()
        .collect();
    RgbImage::new(width, height, data)
}
