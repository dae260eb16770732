// crates/vidcast-media/src/push.rs
//
// One push session: stream-copy the video of a local file into a network sink
// at real-time pace, looping the file `loop_count` times.
//
// Setup order, each step with its own failure code:
//   source exists (10) → timing probe (20) → open source (30/40) →
//   output context (50) → sink codec lookup (60) → output stream (70) →
//   parameter copy (80) → header (90)
// then the remux loop (`remux::pump`, 100 on reopen, 110 on write).
//
// Teardown is drop order. The sink is declared after the source, so it closes
// first; both close on every path, including early returns.
//
// The trailer is only attempted after a clean end or a stop. Its failure is
// logged and otherwise ignored: the session outcome is already decided.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::Id as CodecId;
use ffmpeg::encoder;
use ffmpeg::format::{output as open_output, output_as as open_output_as};
use ffmpeg::format::context::{Input, Output};
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use vidcast_core::helpers::url::sink_format;
use vidcast_core::{PushError, PushOutcome, StreamTarget};

use crate::helpers::source::{open_source, SourceError};
use crate::probe::probe_timing;
use crate::remux::{pump, PacketInput, PacketOutput, PumpResult, PushPlan};

// ── Source side ───────────────────────────────────────────────────────────────

/// Demuxer over the source file that yields only the selected video stream.
pub struct SourceReader {
    path:  PathBuf,
    index: usize,
    ictx:  Option<Input>,
}

impl SourceReader {
    pub fn open(path: &Path, index: usize) -> Result<Self, PushError> {
        let ictx = open_source(path).map_err(|e| match e {
            SourceError::StreamInfo(e) => PushError::StreamInfo(e.to_string()),
            other                      => PushError::OpenInput(other.to_string()),
        })?;
        Ok(Self { path: path.to_path_buf(), index, ictx: Some(ictx) })
    }

    fn input(&self) -> Result<&Input, PushError> {
        self.ictx
            .as_ref()
            .ok_or_else(|| PushError::OpenInput("source is closed".into()))
    }
}

impl PacketInput for SourceReader {
    fn next_video_packet(&mut self) -> Result<Option<Packet>, PushError> {
        let Some(ictx) = self.ictx.as_mut() else { return Ok(None) };
        loop {
            let mut packet = Packet::empty();
            match packet.read(ictx) {
                Ok(()) if packet.stream() == self.index => return Ok(Some(packet)),
                Ok(()) => continue,
                Err(ffmpeg::Error::Eof) => return Ok(None),
                Err(e) => {
                    // A damaged tail ends the pass like EOF would.
                    warn!(path = %self.path.display(), "read error, treating as end of file: {e}");
                    return Ok(None);
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<(), PushError> {
        // Close before reopening so only one handle is ever held.
        self.ictx = None;
        let ictx = open_source(&self.path).map_err(|e| PushError::Reopen(e.to_string()))?;
        self.ictx = Some(ictx);
        Ok(())
    }
}

// ── Sink side ─────────────────────────────────────────────────────────────────

/// Muxer with a single video stream whose parameters are copied from the source.
pub struct SinkWriter {
    url:       String,
    octx:      Output,
    time_base: Rational,
}

impl SinkWriter {
    pub fn open(url: &str, source: &Input, index: usize) -> Result<Self, PushError> {
        let mut octx = match sink_format(url) {
            Some(fmt) => open_output_as(url, fmt),
            None      => open_output(url),
        }
        .map_err(|e| PushError::OutputContext(e.to_string()))?;

        // The muxer's default video codec only has to exist; the stream's
        // parameters are overwritten with the source's below.
        let default_codec = unsafe { CodecId::from((*(*octx.as_ptr()).oformat).video_codec) };
        let codec = encoder::find(default_codec).ok_or(PushError::EncoderLookup)?;

        octx.add_stream(codec)
            .map_err(|e| PushError::StreamCreation(e.to_string()))?;

        let source_stream = source
            .stream(index)
            .ok_or_else(|| PushError::ParameterCopy(format!("source stream {index} vanished")))?;

        unsafe {
            let dst = (**(*octx.as_mut_ptr()).streams.add(0)).codecpar;
            let ret = ffmpeg::ffi::avcodec_parameters_copy(dst, source_stream.parameters().as_ptr());
            if ret < 0 {
                return Err(PushError::ParameterCopy(ffmpeg::Error::from(ret).to_string()));
            }
            // Let the muxer pick a tag valid for its container.
            (*dst).codec_tag = 0;
        }

        octx.write_header()
            .map_err(|e| PushError::HeaderWrite(e.to_string()))?;

        // Only valid after the header: muxers may replace the time base.
        let time_base = octx
            .stream(0)
            .map(|s| s.time_base())
            .ok_or_else(|| PushError::HeaderWrite("output stream missing after header".into()))?;

        debug!(url, ?time_base, "sink header written");
        Ok(Self { url: url.to_owned(), octx, time_base })
    }

    /// Best effort; the session result does not depend on it.
    pub fn finish(&mut self) {
        if let Err(e) = self.octx.write_trailer() {
            warn!(url = %self.url, "trailer write failed: {e}");
        }
    }
}

impl PacketOutput for SinkWriter {
    fn time_base(&self) -> Rational {
        self.time_base
    }

    fn write(&mut self, packet: &mut Packet) -> Result<(), PushError> {
        packet.set_stream(0);
        packet
            .write_interleaved(&mut self.octx)
            .map_err(|e| PushError::WritePacket(e.to_string()))
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        debug!(url = %self.url, "sink closed");
    }
}

// ── Session body ──────────────────────────────────────────────────────────────

/// Run one push session to completion on the calling thread.
pub fn run(target: &StreamTarget, stop: &AtomicBool) -> PushOutcome {
    let path = target.source_path.display().to_string();
    info!(url = %target.sink_url, path = %path, loops = target.loops(), "push starting");

    let outcome = match push(target, stop) {
        Ok(PumpResult { frames, stopped: true })  => PushOutcome::Stopped { frames },
        Ok(PumpResult { frames, stopped: false }) => PushOutcome::Completed { frames },
        Err(e) => PushOutcome::Failed(e),
    };

    match &outcome {
        PushOutcome::Failed(e) => warn!(url = %target.sink_url, path = %path, code = e.code(), "push failed: {e}"),
        other => info!(url = %target.sink_url, path = %path, code = other.code(), frames = other.frames(), "push ended"),
    }
    outcome
}

fn push(target: &StreamTarget, stop: &AtomicBool) -> Result<PumpResult, PushError> {
    let path = target.source_path.as_path();
    if !path.exists() {
        return Err(PushError::SourceMissing);
    }

    let timing = probe_timing(path)
        .filter(|t| t.frame_rate > 0.0)
        .ok_or(PushError::NoVideoStream)?;

    let mut source = SourceReader::open(path, timing.index)?;
    let mut sink   = SinkWriter::open(&target.sink_url, source.input()?, timing.index)?;

    let plan = PushPlan {
        frame_rate: timing.frame_rate,
        duration:   timing.duration,
        loops:      target.loops(),
    };
    debug!(?plan, interval_us = plan.pacing_interval().as_micros() as u64, "pacing");

    let result = pump(&mut source, &mut sink, &plan, stop, target.progress.as_ref())?;
    sink.finish();
    Ok(result)
}

// ── Session handle ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Finished(PushOutcome),
}

/// Owns at most one push worker thread.
///
/// `start` while a worker is alive stops and joins that worker first. Dropping
/// the handle stops and joins as well, so a worker never outlives its owner.
pub struct RemuxPushSession {
    stop:   Arc<AtomicBool>,
    worker: Option<JoinHandle<PushOutcome>>,
    last:   Option<PushOutcome>,
}

impl RemuxPushSession {
    pub fn new() -> Self {
        Self {
            stop:   Arc::new(AtomicBool::new(false)),
            worker: None,
            last:   None,
        }
    }

    pub fn start(&mut self, target: StreamTarget) -> io::Result<()> {
        self.start_with(move |stop| run(&target, stop))
    }

    /// Start an arbitrary session body. It must return promptly once the flag is set.
    pub fn start_with<F>(&mut self, job: F) -> io::Result<()>
    where
        F: FnOnce(&AtomicBool) -> PushOutcome + Send + 'static,
    {
        if self.worker.is_some() {
            self.stop();
        }
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("vidcast-push".into())
            .spawn(move || job(&flag))?;

        self.stop   = stop;
        self.worker = Some(handle);
        self.last   = None;
        Ok(())
    }

    /// Signal the worker and wait for it. Returns the outcome of the most
    /// recent worker, or `None` if none was ever started.
    pub fn stop(&mut self) -> Option<PushOutcome> {
        self.stop.store(true, Ordering::Release);
        self.collect();
        self.last.clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn state(&mut self) -> SessionState {
        if self.worker.as_ref().is_some_and(|h| h.is_finished()) {
            self.collect();
        }
        match (&self.worker, &self.last) {
            (Some(_), _)       => SessionState::Running,
            (None, Some(out))  => SessionState::Finished(out.clone()),
            (None, None)       => SessionState::Idle,
        }
    }

    fn collect(&mut self) {
        if let Some(handle) = self.worker.take() {
            let outcome = handle.join().unwrap_or_else(|_| {
                warn!("push worker panicked");
                PushOutcome::Failed(PushError::WorkerPanicked)
            });
            self.last = Some(outcome);
        }
    }
}

impl Default for RemuxPushSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RemuxPushSession {
    fn drop(&mut self) {
        self.stop();
    }
}
