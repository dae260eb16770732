// crates/vidcast-media/src/probe.rs
//
// In-process FFmpeg probing: stream layout, frame rate, size, duration, codec
// and one preview frame.
//
// `probe` never fails. A missing, empty or unreadable file yields
// `MediaDescriptor::default()` (video_stream_index == -1). Every libav context
// opened here is owned by a local and released on all return paths.
//
// Cost: when the container carries no positive stream duration (raw .h264 /
// .h265 elementary streams, some .ts captures) the duration is derived by
// reading every packet of the file. That is O(file size) and can block for
// seconds, so callers must run `probe` off any latency-sensitive thread.

use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use tracing::{debug, info, warn};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::context::Input;
use ffmpeg::util::frame::video::Video as VideoFrame;

use vidcast_core::admission::{check_descriptor, check_extension};
use vidcast_core::{AdmitError, MediaDescriptor, RgbImage};

use crate::helpers::rgb::RgbConverter;
use crate::helpers::source::{find_video_stream, open_source, open_video_decoder};

/// The subset of a probe the push worker needs to pace and time-stamp packets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamTiming {
    pub index:      usize,
    pub frame_rate: f64,
    pub duration:   f64,
}

/// Probe `path`. Returns the default (unusable) descriptor on any failure.
pub fn probe(path: &Path) -> MediaDescriptor {
    match read_descriptor(path, true) {
        Ok(desc) => {
            info!(
                path = %path.display(),
                duration = desc.duration_seconds,
                fps = desc.frame_rate,
                width = desc.width,
                height = desc.height,
                codec = %desc.codec_kind,
                "probed",
            );
            desc
        }
        Err(e) => {
            debug!(path = %path.display(), "probe failed: {e:#}");
            MediaDescriptor::default()
        }
    }
}

/// Same stream selection and duration logic as `probe`, without decoding a
/// preview frame. `None` means the file has no usable video stream.
pub fn probe_timing(path: &Path) -> Option<StreamTiming> {
    match read_descriptor(path, false) {
        Ok(desc) => Some(StreamTiming {
            index:      desc.video_stream()?,
            frame_rate: desc.frame_rate,
            duration:   desc.duration_seconds,
        }),
        Err(e) => {
            debug!(path = %path.display(), "timing probe failed: {e:#}");
            None
        }
    }
}

/// Decide whether `path` may be pushed. The extension is checked before the
/// file is opened; only then is it probed and the codec gated.
pub fn admit(path: &Path) -> Result<MediaDescriptor, AdmitError> {
    let verdict = check_extension(path).and_then(|()| {
        let desc = probe(path);
        check_descriptor(path, &desc).map(|()| desc)
    });
    match &verdict {
        Ok(desc) => info!(path = %path.display(), codec = %desc.codec_kind, "admitted"),
        Err(e)   => warn!(path = %path.display(), "refused: {e}"),
    }
    verdict
}

fn read_descriptor(path: &Path, with_preview: bool) -> Result<MediaDescriptor> {
    let meta = std::fs::metadata(path).context("stat")?;
    if !meta.is_file() {
        return Err(anyhow!("not a regular file"));
    }

    let mut ictx = open_source(path)?;
    let stream_count = ictx.nb_streams();

    let info = find_video_stream(&ictx).ok_or_else(|| anyhow!("no video stream"))?;

    let mut scanned = false;
    let duration_seconds = match info.duration {
        Some(d) => d,
        None => {
            warn!(path = %path.display(), "no stream duration, counting packets");
            let packets = count_packets(&mut ictx, info.index);
            scanned = true;
            if info.frame_rate > 0.0 { packets as f64 / info.frame_rate } else { 0.0 }
        }
    };

    let preview_frame = if with_preview {
        // The packet scan left the demuxer at EOF; start over from a fresh open.
        if scanned {
            ictx = open_source(path)?;
        }
        match decode_preview(&mut ictx, info.index) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(path = %path.display(), "preview decode failed: {e:#}");
                None
            }
        }
    } else {
        None
    };

    Ok(MediaDescriptor {
        source_path:        path.to_path_buf(),
        byte_size:          meta.len(),
        stream_count,
        video_stream_index: info.index as i32,
        frame_rate:         info.frame_rate,
        width:              info.width,
        height:             info.height,
        duration_seconds,
        codec_kind:         info.codec,
        preview_frame,
    })
}

fn count_packets(ictx: &mut Input, index: usize) -> u64 {
    ictx.packets()
        .flatten()
        .filter(|(stream, _)| stream.index() == index)
        .count() as u64
}

/// Decode the first key frame of stream `index` to RGB. The rest of the file
/// is left unread.
fn decode_preview(ictx: &mut Input, index: usize) -> Result<Option<RgbImage>> {
    let mut decoder   = open_video_decoder(ictx, index)?;
    let mut converter = RgbConverter::new();
    let mut decoded   = VideoFrame::empty();
    let mut keyed     = false;

    for (stream, packet) in ictx.packets().flatten() {
        if stream.index() != index { continue; }
        if !keyed && !packet.is_key() { continue; }
        keyed = true;
        if decoder.send_packet(&packet).is_err() { continue; }
        if decoder.receive_frame(&mut decoded).is_ok() {
            return Ok(Some(converter.convert(&decoded)?));
        }
    }

    // Decoders with a reorder delay can hold the key frame until flushed.
    if keyed && decoder.send_eof().is_ok() && decoder.receive_frame(&mut decoded).is_ok() {
        return Ok(Some(converter.convert(&decoded)?));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let desc = probe(&dir.path().join("absent.mp4"));
        assert_eq!(desc, MediaDescriptor::default());
        assert_eq!(desc.video_stream_index, -1);
    }

    #[test]
    fn zero_byte_file_gives_default() {
        let file = tempfile::Builder::new().suffix(".ts").tempfile().unwrap();
        let desc = probe(file.path());
        assert_eq!(desc, MediaDescriptor::default());
        assert!(desc.preview_frame.is_none());
    }

    #[test]
    fn garbage_file_gives_default() {
        let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        file.write_all(&[0x13u8; 4096]).unwrap();
        file.flush().unwrap();
        assert_eq!(probe(file.path()).video_stream_index, -1);
        assert!(probe_timing(file.path()).is_none());
    }

    #[test]
    fn encoded_clip_is_usable() {
        use crate::test_clip::{write_clip, FPS, HEIGHT, WIDTH};

        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_clip(&path, 10).unwrap();

        let desc = probe(&path);
        assert_eq!(desc.video_stream_index, 0);
        assert_eq!(desc.stream_count, 1);
        assert!((desc.frame_rate - f64::from(FPS)).abs() < 0.01, "fps {}", desc.frame_rate);
        assert_eq!((desc.width, desc.height), (WIDTH, HEIGHT));
        assert!(desc.duration_seconds > 0.0);
        assert!(desc.byte_size > 0);

        let preview = desc.preview_frame.as_ref().expect("preview frame");
        assert_eq!((preview.width, preview.height), (WIDTH, HEIGHT));
        assert_eq!(preview.data.len(), (WIDTH * HEIGHT * 3) as usize);

        let timing = probe_timing(&path).unwrap();
        assert_eq!(timing.index, 0);
        assert_eq!(timing.frame_rate, desc.frame_rate);
    }

    #[test]
    fn unsupported_extension_refused_without_opening() {
        // The file does not exist: any open attempt would surface as a
        // missing-stream refusal instead of an extension refusal.
        let dir = tempfile::tempdir().unwrap();
        let err = admit(&dir.path().join("holiday.mov")).unwrap_err();
        assert_eq!(err, AdmitError::UnsupportedExtension("holiday.mov".into()));
    }

    #[test]
    fn unreadable_file_refused_as_no_video() {
        let file = tempfile::Builder::new().suffix(".ts").tempfile().unwrap();
        assert!(matches!(admit(file.path()), Err(AdmitError::NoVideoStream(_))));
    }

    #[test]
    fn directory_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(probe(dir.path()), MediaDescriptor::default());
    }
}
