// crates/vidcast-core/src/media_types.rs
//
// Types that flow between vidcast-media and whoever drives it (CLI, UI).
// No ffmpeg, just plain data.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

/// Sentinel stored in `MediaDescriptor::video_stream_index` when the file has
/// no usable video stream.
pub const NO_VIDEO_STREAM: i32 = -1;

/// The closed set of codecs the engine distinguishes. Anything that is not an
/// exact H.264 / HEVC match is `Other` and is refused for streaming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum CodecKind {
    H264,
    Hevc,
    #[default]
    Other,
}

impl CodecKind {
    /// Display label used in summaries and logs.
    pub fn label(self) -> &'static str {
        match self {
            CodecKind::H264  => "H.264",
            CodecKind::Hevc  => "H.265",
            CodecKind::Other => "Other",
        }
    }

    pub fn is_streamable(self) -> bool {
        matches!(self, CodecKind::H264 | CodecKind::Hevc)
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Packed RGB24 image: `data.len() == width * height * 3`, rows without padding.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RgbImage {
    pub width:  u32,
    pub height: u32,
    pub data:   Vec<u8>,
}

impl RgbImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self { width, height, data }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }
}

// Pixel dumps are useless in logs.
impl fmt::Debug for RgbImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Everything the probe learned about one file. Immutable once produced.
///
/// When `video_stream_index == NO_VIDEO_STREAM` every other field is at its
/// default and the descriptor must not be used for streaming or decoding.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MediaDescriptor {
    pub source_path:        PathBuf,
    pub byte_size:          u64,
    pub stream_count:       u32,
    pub video_stream_index: i32,
    /// Container-reported average frame rate (frames/second).
    pub frame_rate:         f64,
    pub width:              u32,
    pub height:             u32,
    pub duration_seconds:   f64,
    pub codec_kind:         CodecKind,
    #[serde(skip)]
    pub preview_frame:      Option<RgbImage>,
}

impl Default for MediaDescriptor {
    fn default() -> Self {
        Self {
            source_path:        PathBuf::new(),
            byte_size:          0,
            stream_count:       0,
            video_stream_index: NO_VIDEO_STREAM,
            frame_rate:         0.0,
            width:              0,
            height:             0,
            duration_seconds:   0.0,
            codec_kind:         CodecKind::Other,
            preview_frame:      None,
        }
    }
}

impl MediaDescriptor {
    /// Index of the selected video stream, or `None` for an unusable file.
    pub fn video_stream(&self) -> Option<usize> {
        usize::try_from(self.video_stream_index).ok()
    }

    pub fn is_usable(&self) -> bool {
        self.video_stream().is_some()
    }

    /// Multi-line human-readable summary (tooltip / `probe` output).
    pub fn summary(&self) -> String {
        format!(
            "video:    {}\n\
             size:     {:.2} MB\n\
             duration: {:.2} s\n\
             fps:      {:.3}\n\
             size px:  {}x{}\n\
             codec:    {}",
            self.source_path.display(),
            self.byte_size as f64 / 1024.0 / 1024.0,
            self.duration_seconds,
            self.frame_rate,
            self.width,
            self.height,
            self.codec_kind,
        )
    }
}

/// Progress callback: receives `frames_sent / (frame_rate * duration)`, where
/// `frames_sent` counts the whole session. Not clamped: with looping it passes
/// 1.0 after the first pass, so display code clamps.
pub type ProgressSink = Arc<dyn Fn(f64) + Send + Sync>;

/// Per-session push configuration.
#[derive(Clone)]
pub struct StreamTarget {
    /// Destination, e.g. `rtsp://127.0.0.1:8554/stream/1`.
    pub sink_url:    String,
    pub source_path: PathBuf,
    /// How many times the source is replayed end to end. 0 is treated as 1.
    pub loop_count:  u32,
    pub progress:    Option<ProgressSink>,
}

impl StreamTarget {
    pub fn new(sink_url: impl Into<String>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            sink_url:    sink_url.into(),
            source_path: source_path.into(),
            loop_count:  1,
            progress:    None,
        }
    }

    pub fn with_loops(mut self, loop_count: u32) -> Self {
        self.loop_count = loop_count;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn loops(&self) -> u32 {
        self.loop_count.max(1)
    }
}

impl fmt::Debug for StreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamTarget")
            .field("sink_url", &self.sink_url)
            .field("source_path", &self.source_path)
            .field("loop_count", &self.loop_count)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_descriptor_is_unusable() {
        let d = MediaDescriptor::default();
        assert_eq!(d.video_stream_index, NO_VIDEO_STREAM);
        assert_eq!(d.video_stream(), None);
        assert!(!d.is_usable());
        assert!(d.preview_frame.is_none());
        assert_eq!(d.byte_size, 0);
    }

    #[test]
    fn codec_labels() {
        assert_eq!(CodecKind::H264.to_string(), "H.264");
        assert_eq!(CodecKind::Hevc.to_string(), "H.265");
        assert!(!CodecKind::Other.is_streamable());
    }

    #[test]
    fn zero_loops_play_once() {
        let t = StreamTarget::new("rtsp://h:1/a", "a.ts").with_loops(0);
        assert_eq!(t.loops(), 1);
    }

    #[test]
    fn json_skips_preview_pixels() {
        let d = MediaDescriptor {
            preview_frame: Some(RgbImage::new(1, 1, vec![1, 2, 3])),
            ..MediaDescriptor::default()
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(!json.contains("preview_frame"));
        assert!(json.contains("\"video_stream_index\":-1"));
    }
}
