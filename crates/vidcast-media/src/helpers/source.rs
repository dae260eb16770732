// crates/vidcast-media/src/helpers/source.rs
//
// Opening a source container and locating its video stream.
//
// Every path that reads a file (probe, decode pipeline, push worker) goes
// through `open_source`, so they all see the same stream selection and the
// same split between "could not open" and "could not read stream info";
// the push worker reports those as different result codes.
//
// Ownership: the raw AVFormatContext is wrapped into an `Input` as soon as
// avformat_open_input succeeds. From that point every early return drops the
// wrapper, which closes the context and its I/O handle.

use std::ffi::CString;
use std::path::Path;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::Id as CodecId;
use ffmpeg::ffi;
use ffmpeg::format::context::Input;
use ffmpeg::media::Type;
use thiserror::Error;

use vidcast_core::CodecKind;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("path cannot be handed to libav: {0}")]
    Path(String),
    #[error("{0}")]
    Open(ffmpeg::Error),
    #[error("{0}")]
    StreamInfo(ffmpeg::Error),
}

/// Byte string libav expects for a file name.
///
/// On Unix the OS bytes go through untouched. Elsewhere libav wants UTF-8, so
/// the path must be valid Unicode (non-ASCII names are fine, unpaired
/// surrogates are not). Interior NULs are rejected on every platform.
pub fn libav_path(path: &Path) -> Result<CString, SourceError> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = path
        .to_str()
        .ok_or_else(|| SourceError::Path(path.display().to_string()))?
        .as_bytes()
        .to_vec();

    CString::new(bytes).map_err(|_| SourceError::Path(path.display().to_string()))
}

/// Open `path` for demuxing and read its stream info.
pub fn open_source(path: &Path) -> Result<Input, SourceError> {
    let c_path = libav_path(path)?;
    let mut ptr: *mut ffi::AVFormatContext = std::ptr::null_mut();

    unsafe {
        let ret = ffi::avformat_open_input(
            &mut ptr,
            c_path.as_ptr(),
            std::ptr::null(),
            std::ptr::null_mut(),
        );
        if ret < 0 {
            return Err(SourceError::Open(ffmpeg::Error::from(ret)));
        }
        let ictx = Input::wrap(ptr);

        let ret = ffi::avformat_find_stream_info(ptr, std::ptr::null_mut());
        if ret < 0 {
            return Err(SourceError::StreamInfo(ffmpeg::Error::from(ret)));
        }
        Ok(ictx)
    }
}

/// What the container says about the selected video stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoStreamInfo {
    pub index:      usize,
    pub frame_rate: f64,
    pub width:      u32,
    pub height:     u32,
    pub codec:      CodecKind,
    /// Stream-reported duration in seconds, only when positive.
    pub duration:   Option<f64>,
}

/// First video stream in container order (not libav's "best" pick: the
/// push path and the probe must agree on the index).
pub fn find_video_stream(ictx: &Input) -> Option<VideoStreamInfo> {
    let stream = ictx
        .streams()
        .find(|s| s.parameters().medium() == Type::Video)?;

    let params = stream.parameters();
    let (width, height) = unsafe {
        let p = params.as_ptr();
        ((*p).width.max(0) as u32, (*p).height.max(0) as u32)
    };

    let rate = stream.avg_frame_rate();
    let frame_rate = if rate.numerator() > 0 && rate.denominator() > 0 {
        f64::from(rate)
    } else {
        0.0
    };

    let duration = if stream.duration() > 0 {
        Some(stream.duration() as f64 * f64::from(stream.time_base()))
    } else {
        None
    };

    Some(VideoStreamInfo {
        index: stream.index(),
        frame_rate,
        width,
        height,
        codec: classify_codec(params.id()),
        duration,
    })
}

pub fn classify_codec(id: CodecId) -> CodecKind {
    match id {
        CodecId::H264 => CodecKind::H264,
        CodecId::HEVC => CodecKind::Hevc,
        _             => CodecKind::Other,
    }
}

/// Build and open a decoder for stream `index` of `ictx`.
pub fn open_video_decoder(
    ictx:  &Input,
    index: usize,
) -> Result<ffmpeg::decoder::Video, ffmpeg::Error> {
    let stream  = ictx.stream(index).ok_or(ffmpeg::Error::StreamNotFound)?;
    let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
    context.decoder().video()
}
