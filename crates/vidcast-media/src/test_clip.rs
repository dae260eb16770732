// crates/vidcast-media/src/test_clip.rs
//
// Synthetic clips for tests that need real container input. Frames are flat
// grey, getting brighter by a fixed step each frame, so decoded order can be
// checked by brightness. No B-frames: packet order equals display order.

use std::path::Path;
use std::sync::Once;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::{output as open_output, Pixel};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

pub const WIDTH:  u32 = 64;
pub const HEIGHT: u32 = 48;
pub const FPS:    i32 = 25;

/// Luma of frame `i`.
pub fn luma(i: u32) -> u8 {
    (16 + i * 16).min(235) as u8
}

static INIT: Once = Once::new();

/// Write `frames` frames at `FPS` to `path`; the container follows the
/// extension. H.264 when an encoder is built in, MPEG-4 part 2 otherwise.
pub fn write_clip(path: &Path, frames: u32) -> Result<(), ffmpeg::Error> {
    INIT.call_once(|| {
        let _ = crate::init();
    });

    let mut octx = open_output(path)?;
    let frame_tb = Rational::new(1, FPS);
    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

    let mut opened = None;
    for id in [CodecId::H264, CodecId::MPEG4] {
        let Some(codec) = encoder::find(id) else { continue };
        let mut enc = codec::context::Context::new_with_codec(codec).encoder().video()?;
        enc.set_width(WIDTH);
        enc.set_height(HEIGHT);
        enc.set_format(Pixel::YUV420P);
        enc.set_time_base(frame_tb);
        enc.set_frame_rate(Some(Rational::new(FPS, 1)));
        enc.set_gop(5);
        enc.set_max_b_frames(0);
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        if let Ok(video) = enc.open_as_with(codec, ffmpeg::Dictionary::new()) {
            opened = Some((codec, video));
            break;
        }
    }
    let (codec, mut video_encoder) = opened.ok_or(ffmpeg::Error::EncoderNotFound)?;

    let mut ost = octx.add_stream(codec)?;
    ost.set_time_base(frame_tb);

    unsafe {
        let par = (**(*octx.as_mut_ptr()).streams.add(0)).codecpar;
        let ret = ffmpeg::ffi::avcodec_parameters_from_context(
            par,
            video_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
        );
        if ret < 0 {
            return Err(ffmpeg::Error::from(ret));
        }
        (*par).codec_tag = 0;
    }

    octx.write_header()?;
    let ost_tb = octx.stream(0).map(|s| s.time_base()).ok_or(ffmpeg::Error::StreamNotFound)?;

    let drain = |enc: &mut ffmpeg::encoder::video::Video,
                     octx: &mut ffmpeg::format::context::Output|
     -> Result<(), ffmpeg::Error> {
        let mut pkt = Packet::empty();
        while enc.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(0);
            pkt.rescale_ts(frame_tb, ost_tb);
            pkt.write_interleaved(octx)?;
        }
        Ok(())
    };

    for i in 0..frames {
        let mut yuv = VideoFrame::new(Pixel::YUV420P, WIDTH, HEIGHT);
        yuv.data_mut(0).fill(luma(i));
        yuv.data_mut(1).fill(128);
        yuv.data_mut(2).fill(128);
        yuv.set_pts(Some(i64::from(i)));
        video_encoder.send_frame(&yuv)?;
        drain(&mut video_encoder, &mut octx)?;
    }
    video_encoder.send_eof()?;
    drain(&mut video_encoder, &mut octx)?;

    octx.write_trailer()
}
