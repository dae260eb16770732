// crates/vidcast-media/src/lib.rs
//
// Everything that touches libav lives here. The front-end only sees the
// plain types from vidcast-core plus the handles re-exported below.
//
// Threads this crate may start:
//   vidcast-push    one per running push session (push.rs)
//   vidcast-decode  one per preview pipeline (decode.rs)

pub mod decode;
pub mod frame_queue;
pub mod helpers;
pub mod probe;
pub mod push;
pub mod registry;
pub mod remux;

#[cfg(test)]
mod test_clip;

pub use decode::{DecodePipeline, DecodeWorker};
pub use frame_queue::{FrameQueue, FRAME_QUEUE_CAPACITY};
pub use probe::{admit, probe, probe_timing, StreamTiming};
pub use push::{RemuxPushSession, SessionState};
pub use registry::{RegistryError, SessionEvent, SessionRegistry};

use ffmpeg_the_third as ffmpeg;

/// One-time libav setup. Call before any other function in this crate.
///
/// libav's own logging is lowered to errors; this crate reports through
/// `tracing` instead.
pub fn init() -> Result<(), ffmpeg::Error> {
    ffmpeg::init()?;
    ffmpeg::format::network::init();
    ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);
    Ok(())
}
