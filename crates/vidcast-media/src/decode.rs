// crates/vidcast-media/src/decode.rs
//
// Preview decode pipeline: file → decoder → RGB24 → FrameQueue.
//
//   • `VideoFrameReader` owns one demuxer + decoder + converter. Each call to
//     `read_step` reads exactly one packet and yields every frame the decoder
//     produces for it (zero, one or several).
//   • `DecodePipeline` is the producer loop. Blocking `run()` meant for a
//     dedicated thread; `stop()` is idempotent and callable from anywhere.
//   • `DecodeWorker` spawns the pipeline on its own thread; its `stop()`
//     joins, so once it returns nothing will touch the queue again.
//
// Backpressure: a full queue delays the producer (bounded waits of
// POLL_INTERVAL, re-checking the stop flag between waits). Frames are never
// dropped while running; frames still in hand when a stop arrives are
// discarded instead of queued.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::context::Input;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::Packet;

use vidcast_core::RgbImage;

use crate::frame_queue::{FrameQueue, POLL_INTERVAL};
use crate::helpers::rgb::RgbConverter;
use crate::helpers::source::{find_video_stream, open_source, open_video_decoder};

// ── Frame sources ─────────────────────────────────────────────────────────────

/// Anything that can feed the decode pipeline one demux step at a time.
pub trait FrameSource {
    /// Process one packet, appending produced images to `out`.
    /// Returns `Ok(false)` once the source is exhausted.
    fn read_step(&mut self, out: &mut Vec<RgbImage>) -> Result<bool>;
}

pub struct VideoFrameReader {
    ictx:      Input,
    decoder:   ffmpeg::decoder::Video,
    video_idx: usize,
    converter: RgbConverter,
    flushed:   bool,
}

impl VideoFrameReader {
    pub fn open(path: &Path) -> Result<Self> {
        let ictx      = open_source(path)?;
        let video_idx = find_video_stream(&ictx)
            .ok_or_else(|| anyhow!("no video stream"))?
            .index;
        let decoder   = open_video_decoder(&ictx, video_idx)?;
        Ok(Self { ictx, decoder, video_idx, converter: RgbConverter::new(), flushed: false })
    }

    fn drain(&mut self, out: &mut Vec<RgbImage>) {
        let mut decoded = VideoFrame::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            match self.converter.convert(&decoded) {
                Ok(img) => out.push(img),
                Err(e)  => warn!("rgb conversion failed: {e}"),
            }
        }
    }
}

impl FrameSource for VideoFrameReader {
    fn read_step(&mut self, out: &mut Vec<RgbImage>) -> Result<bool> {
        if self.flushed {
            return Ok(false);
        }
        let mut packet = Packet::empty();
        match packet.read(&mut self.ictx) {
            Ok(()) => {
                if packet.stream() == self.video_idx && self.decoder.send_packet(&packet).is_ok() {
                    self.drain(out);
                }
                Ok(true)
            }
            Err(ffmpeg::Error::Eof) => {
                // Hand out the frames the decoder is still holding.
                self.flushed = true;
                if self.decoder.send_eof().is_ok() {
                    self.drain(out);
                }
                Ok(!out.is_empty())
            }
            Err(e) => Err(e.into()),
        }
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

pub struct DecodePipeline {
    path:  PathBuf,
    queue: Arc<FrameQueue>,
    stop:  AtomicBool,
}

impl DecodePipeline {
    pub fn new(path: impl Into<PathBuf>, queue: Arc<FrameQueue>) -> Self {
        Self { path: path.into(), queue, stop: AtomicBool::new(false) }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Decode until EOF or `stop()`. Returns the number of images queued.
    /// Failure to open the file or its decoder ends the run before anything
    /// is queued.
    pub fn run(&self) -> Result<u64> {
        let mut reader = VideoFrameReader::open(&self.path)?;
        info!(path = %self.path.display(), "decode pipeline started");
        let queued = self.pump(&mut reader)?;
        info!(path = %self.path.display(), queued, stopped = self.is_stopped(), "decode pipeline ended");
        Ok(queued)
    }

    /// Producer loop over any frame source.
    pub fn pump<S: FrameSource>(&self, source: &mut S) -> Result<u64> {
        let mut batch  = Vec::new();
        let mut queued = 0u64;

        while !self.is_stopped() {
            // Full queue: wait for the consumer instead of reading further ahead.
            if !self.queue.wait_for_room(POLL_INTERVAL) {
                continue;
            }

            batch.clear();
            let more = source.read_step(&mut batch)?;

            for mut image in batch.drain(..) {
                loop {
                    if self.is_stopped() {
                        return Ok(queued);
                    }
                    match self.queue.push_timeout(image, POLL_INTERVAL) {
                        Ok(()) => {
                            queued += 1;
                            break;
                        }
                        Err(back) => image = back,
                    }
                }
            }

            if !more {
                debug!(queued, "end of stream");
                break;
            }
        }
        Ok(queued)
    }
}

// ── Worker thread ─────────────────────────────────────────────────────────────

pub struct DecodeWorker {
    pipeline: Arc<DecodePipeline>,
    handle:   Option<JoinHandle<()>>,
}

impl DecodeWorker {
    pub fn spawn(path: impl Into<PathBuf>, queue: Arc<FrameQueue>) -> std::io::Result<Self> {
        let pipeline = Arc::new(DecodePipeline::new(path, queue));
        let worker   = Arc::clone(&pipeline);
        let handle   = thread::Builder::new()
            .name("vidcast-decode".into())
            .spawn(move || {
                if let Err(e) = worker.run() {
                    warn!(path = %worker.path.display(), "decode pipeline failed: {e:#}");
                }
            })?;
        Ok(Self { pipeline, handle: Some(handle) })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signal the pipeline and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.pipeline.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("decode worker panicked");
            }
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
