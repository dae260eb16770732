// crates/vidcast-cli/src/report.rs
//
// Everything the binary prints or writes besides logs: PNG frames, outcome
// text and the throttled per-session progress lines.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{ensure, Context as _, Result};
use uuid::Uuid;

use vidcast_core::helpers::time::format_progress;
use vidcast_core::{PushOutcome, RgbImage};
use vidcast_media::{SessionEvent, SessionState};

/// Write a packed RGB24 image as an 8-bit PNG.
pub fn write_png(image: &RgbImage, dest: &Path) -> Result<()> {
    ensure!(!image.is_empty(), "empty image");
    ensure!(
        image.data.len() == image.width as usize * image.height as usize * 3,
        "image buffer does not match {}x{}",
        image.width,
        image.height,
    );

    let file = File::create(dest).with_context(|| format!("create {}", dest.display()))?;
    let w    = &mut BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, image.width, image.height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.data)?;
    Ok(())
}

/// `clip.png` for a probe thumbnail, `clip_00042.png` for preview frame 42.
pub fn thumbnail_name(source: &Path, index: Option<usize>) -> String {
    let stem = source
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();
    match index {
        Some(i) => format!("{stem}_{i:05}.png"),
        None    => format!("{stem}.png"),
    }
}

pub fn describe_outcome(outcome: &PushOutcome) -> String {
    match outcome {
        PushOutcome::Completed { frames } => format!("completed ({frames} frames)"),
        PushOutcome::Stopped { frames }   => format!("stopped ({frames} frames)"),
        PushOutcome::Failed(e)            => format!("failed [{}]: {e}", e.code()),
    }
}

pub fn describe_state(state: &SessionState) -> String {
    match state {
        SessionState::Idle         => "idle".into(),
        SessionState::Running      => "running".into(),
        SessionState::Finished(o)  => describe_outcome(o),
    }
}

struct Track {
    started:   Instant,
    last_line: Option<Instant>,
}

/// Turns session events into at most one progress line per session per
/// `interval`. Finished events always produce a line.
pub struct ProgressBoard {
    interval:  Duration,
    durations: HashMap<Uuid, f64>,
    tracks:    HashMap<Uuid, Track>,
}

impl ProgressBoard {
    pub fn new(interval: Duration) -> Self {
        Self { interval, durations: HashMap::new(), tracks: HashMap::new() }
    }

    /// Source duration used for the percentage precision.
    pub fn set_duration(&mut self, id: Uuid, seconds: f64) {
        self.durations.insert(id, seconds);
    }

    pub fn line(&mut self, label: &str, event: &SessionEvent, now: Instant) -> Option<String> {
        match event {
            SessionEvent::Progress { id, fraction } => {
                let track = self.tracks
                    .entry(*id)
                    .or_insert(Track { started: now, last_line: None });
                if track.last_line.is_some_and(|t| now.duration_since(t) < self.interval) {
                    return None;
                }
                track.last_line = Some(now);
                let duration = self.durations.get(id).copied().unwrap_or(0.0);
                let text = format_progress(now.duration_since(track.started), *fraction, duration);
                Some(format!("{label} {text}"))
            }
            SessionEvent::Finished { id, outcome } => {
                // A restart begins a new elapsed clock.
                self.tracks.remove(id);
                Some(format!("{label} {}", describe_outcome(outcome)))
            }
        }
    }
}
