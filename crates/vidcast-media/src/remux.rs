// crates/vidcast-media/src/remux.rs
//
// The packet loop of a push session, independent of where packets come from
// and where they go.
//
// Timestamp strategy:
//   Source timestamps are discarded. Output PTS = DTS = the session-wide frame
//   counter `n`, rescaled from a frame-rate time base (1000 / round(fps·1000))
//   into the sink stream's time base with round-to-nearest. The counter is
//   never reset between loops, so timestamps keep rising across file restarts.
//   Rounding only happens in that single rescale, never cumulatively.
//
// Pacing:
//   Packet n is written no earlier than start + n·interval, where `interval` is
//   1e6 / fps rounded to whole microseconds and `start` is taken once before the
//   first packet. Deadlines are absolute, so a late packet does not push every
//   later packet back.
//
// Cancellation:
//   The stop flag is read before every packet. When set, the loop returns at
//   once with the frames sent so far; teardown is the caller's drop order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::{Packet, Rational, Rescale, Rounding};

use vidcast_core::{ProgressSink, PushError};

// ── Seams ─────────────────────────────────────────────────────────────────────

pub trait PacketInput {
    /// Next packet of the selected video stream, `Ok(None)` at end of file.
    fn next_video_packet(&mut self) -> Result<Option<Packet>, PushError>;

    /// Start over from the beginning of the file.
    fn rewind(&mut self) -> Result<(), PushError>;
}

pub trait PacketOutput {
    /// Time base of the outbound video stream (valid after the header is written).
    fn time_base(&self) -> Rational;

    fn write(&mut self, packet: &mut Packet) -> Result<(), PushError>;
}

// ── Plan ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PushPlan {
    pub frame_rate: f64,
    /// Source duration in seconds, only used for progress fractions.
    pub duration:   f64,
    pub loops:      u32,
}

impl PushPlan {
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_micros(pacing_interval_us(self.frame_rate))
    }

    /// `1000 / round(fps·1000)`. Rates below 0.0005 fps would round the
    /// denominator to zero, so it never drops below 1.
    pub fn source_time_base(&self) -> Rational {
        Rational::new(1000, ((self.frame_rate * 1000.0 + 0.5) as i32).max(1))
    }

    /// `frames / (fps × duration)` with the session-wide frame count, so it
    /// reaches about `n` at the end of loop `n`. Unclamped.
    pub fn progress(&self, frames: u64) -> f64 {
        let expected = self.frame_rate * self.duration;
        if expected > 0.0 { frames as f64 / expected } else { 0.0 }
    }
}

/// Whole microseconds between frames at `frame_rate`; 0 for a non-positive rate.
pub fn pacing_interval_us(frame_rate: f64) -> u64 {
    if frame_rate > 0.0 && frame_rate.is_finite() {
        (1_000_000.0 / frame_rate).round() as u64
    } else {
        0
    }
}

/// Output timestamp of frame `n`.
pub fn frame_timestamp(n: i64, source: Rational, sink: Rational) -> i64 {
    n.rescale_with(source, sink, Rounding::NearInfinity)
}

/// Absolute deadlines measured from one fixed start instant.
pub struct PacingClock {
    start:       Instant,
    interval_us: u64,
}

impl PacingClock {
    pub fn start(interval: Duration) -> Self {
        Self { start: Instant::now(), interval_us: interval.as_micros() as u64 }
    }

    pub fn deadline(&self, frame: u64) -> Instant {
        self.start + Duration::from_micros(self.interval_us.saturating_mul(frame))
    }

    /// Sleep until frame `frame` is due. Returns immediately when already late.
    pub fn wait_for(&self, frame: u64) {
        let wait = self.deadline(frame).saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            thread::sleep(wait);
        }
    }
}

// ── Loop ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PumpResult {
    pub frames:  u64,
    pub stopped: bool,
}

/// Send `plan.loops` passes of `input` to `output`.
pub fn pump<I, O>(
    input:    &mut I,
    output:   &mut O,
    plan:     &PushPlan,
    stop:     &AtomicBool,
    progress: Option<&ProgressSink>,
) -> Result<PumpResult, PushError>
where
    I: PacketInput,
    O: PacketOutput,
{
    let source_tb = plan.source_time_base();
    let sink_tb   = output.time_base();
    let clock     = PacingClock::start(plan.pacing_interval());
    let loops     = plan.loops.max(1);
    let mut frames: u64 = 0;

    for lap in 0..loops {
        loop {
            if stop.load(Ordering::Acquire) {
                debug!(frames, lap, "stop requested");
                return Ok(PumpResult { frames, stopped: true });
            }
            let Some(mut packet) = input.next_video_packet()? else { break };

            let ts = frame_timestamp(frames as i64, source_tb, sink_tb);
            packet.set_pts(Some(ts));
            packet.set_dts(Some(ts));
            packet.set_duration(0);
            packet.set_position(-1);

            clock.wait_for(frames);
            output.write(&mut packet)?;
            frames += 1;

            if let Some(sink) = progress {
                sink(plan.progress(frames));
            }
        }

        if lap + 1 < loops {
            debug!(frames, lap, "end of file, reopening source");
            input.rewind()?;
        }
    }
    Ok(PumpResult { frames, stopped: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU64;

    /// Serves `per_lap` packets, then EOF until rewound.
    struct FakeInput {
        per_lap:     u32,
        served:      u32,
        rewinds:     u32,
        fail_rewind: bool,
    }

    impl FakeInput {
        fn new(per_lap: u32) -> Self {
            Self { per_lap, served: 0, rewinds: 0, fail_rewind: false }
        }
    }

    impl PacketInput for FakeInput {
        fn next_video_packet(&mut self) -> Result<Option<Packet>, PushError> {
            if self.served >= self.per_lap {
                return Ok(None);
            }
            self.served += 1;
            let mut p = Packet::copy(&[0u8, 0, 0, 1, 0x65]);
            // Source timestamps must be overwritten.
            p.set_pts(Some(-7));
            p.set_dts(Some(-7));
            Ok(Some(p))
        }

        fn rewind(&mut self) -> Result<(), PushError> {
            if self.fail_rewind {
                return Err(PushError::Reopen("gone".into()));
            }
            self.rewinds += 1;
            self.served = 0;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeOutput {
        writes:   Vec<(i64, i64, Instant)>,
        fail_at:  Option<usize>,
    }

    impl PacketOutput for FakeOutput {
        fn time_base(&self) -> Rational {
            Rational::new(1, 90_000)
        }

        fn write(&mut self, packet: &mut Packet) -> Result<(), PushError> {
            if self.fail_at == Some(self.writes.len()) {
                return Err(PushError::WritePacket("broken pipe".into()));
            }
            assert_eq!(packet.duration(), 0);
            assert_eq!(packet.position(), -1);
            self.writes.push((
                packet.pts().unwrap_or(i64::MIN),
                packet.dts().unwrap_or(i64::MIN),
                Instant::now(),
            ));
            Ok(())
        }
    }

    fn fast_plan(loops: u32) -> PushPlan {
        // 1000 fps keeps the paced tests short.
        PushPlan { frame_rate: 1000.0, duration: 0.01, loops }
    }

    #[test]
    fn three_loops_of_ten_frames_write_thirty_rising_packets() {
        let mut input  = FakeInput::new(10);
        let mut output = FakeOutput::default();
        let stop       = AtomicBool::new(false);

        let res = pump(&mut input, &mut output, &fast_plan(3), &stop, None).unwrap();

        assert_eq!(res, PumpResult { frames: 30, stopped: false });
        assert_eq!(output.writes.len(), 30);
        assert_eq!(input.rewinds, 2);
        assert!(output.writes.iter().all(|(pts, dts, _)| pts == dts));
        assert!(output.writes.windows(2).all(|w| w[1].0 > w[0].0));
        assert_eq!(output.writes[0].0, 0);
    }

    #[test]
    fn writes_follow_the_frame_rate() {
        let mut input  = FakeInput::new(10);
        let mut output = FakeOutput::default();
        let stop       = AtomicBool::new(false);
        let plan       = PushPlan { frame_rate: 50.0, duration: 0.2, loops: 1 };

        let start = Instant::now();
        pump(&mut input, &mut output, &plan, &stop, None).unwrap();
        let total = start.elapsed();

        // Ten frames at 20 ms: the last one is due 180 ms after the first.
        let span = output.writes[9].2 - output.writes[0].2;
        assert!(span >= Duration::from_millis(175), "span {span:?}");
        assert!(span < Duration::from_millis(400), "span {span:?}");
        assert!(total < Duration::from_millis(450));
        for w in output.writes.windows(2) {
            assert!(w[1].2 - w[0].2 >= Duration::from_millis(10));
        }
    }

    #[test]
    fn stop_after_k_packets_ends_the_loop() {
        let stop   = Arc::new(AtomicBool::new(false));
        let calls  = Arc::new(AtomicU64::new(0));
        let sink: ProgressSink = {
            let (stop, calls) = (Arc::clone(&stop), Arc::clone(&calls));
            Arc::new(move |_| {
                if calls.fetch_add(1, Ordering::Relaxed) + 1 == 5 {
                    stop.store(true, Ordering::Release);
                }
            })
        };
        let mut input  = FakeInput::new(10);
        let mut output = FakeOutput::default();

        let res = pump(&mut input, &mut output, &fast_plan(100), &stop, Some(&sink)).unwrap();

        assert_eq!(res, PumpResult { frames: 5, stopped: true });
        assert_eq!(output.writes.len(), 5);
        assert_eq!(input.rewinds, 0);
    }

    #[test]
    fn progress_counts_the_whole_session() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let seen = Arc::clone(&seen);
            Arc::new(move |f| seen.lock().push(f))
        };
        let plan = PushPlan { frame_rate: 1000.0, duration: 0.004, loops: 2 };
        let stop = AtomicBool::new(false);

        pump(&mut FakeInput::new(4), &mut FakeOutput::default(), &plan, &stop, Some(&sink)).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 8);
        // One loop is 4 frames: the fraction passes 1.0 and keeps rising.
        assert!((seen[3] - 1.0).abs() < 1e-9);
        assert!((seen[4] - 1.25).abs() < 1e-9);
        assert!((seen[7] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn failed_reopen_is_terminal() {
        let mut input  = FakeInput::new(3);
        input.fail_rewind = true;
        let mut output = FakeOutput::default();
        let stop       = AtomicBool::new(false);

        let err = pump(&mut input, &mut output, &fast_plan(2), &stop, None).unwrap_err();
        assert_eq!(err.code(), 100);
        assert_eq!(output.writes.len(), 3);
    }

    #[test]
    fn write_failure_is_terminal() {
        let mut output = FakeOutput { fail_at: Some(2), ..FakeOutput::default() };
        let stop       = AtomicBool::new(false);
        let err = pump(&mut FakeInput::new(10), &mut output, &fast_plan(1), &stop, None).unwrap_err();
        assert!(matches!(err, PushError::WritePacket(_)));
        assert_eq!(output.writes.len(), 2);
    }

    #[test]
    fn pacing_interval_keeps_fractional_rates() {
        assert_eq!(pacing_interval_us(25.0), 40_000);
        assert_eq!(pacing_interval_us(30_000.0 / 1001.0), 33_367);
        assert_eq!(pacing_interval_us(0.0), 0);
    }

    #[test]
    fn timestamps_rescale_with_nearest_rounding() {
        let plan = PushPlan { frame_rate: 30_000.0 / 1001.0, duration: 0.0, loops: 1 };
        let src  = plan.source_time_base();
        let dst  = Rational::new(1, 90_000);
        assert_eq!(frame_timestamp(0, src, dst), 0);
        assert_eq!(frame_timestamp(1, src, dst), 3003);
        // Ten hours of frames lands exactly on the hour mark.
        assert_eq!(frame_timestamp(1_078_920, src, dst), 3_240_000_000);
    }

    #[test]
    fn tiny_frame_rates_keep_a_valid_time_base() {
        let plan = PushPlan { frame_rate: 0.0001, duration: 0.0, loops: 1 };
        let tb   = plan.source_time_base();
        assert_eq!((tb.numerator(), tb.denominator()), (1000, 1));
        let ts = frame_timestamp(2, tb, Rational::new(1, 90_000));
        assert_eq!(ts, 180_000_000);
    }

    #[test]
    fn clock_deadlines_are_absolute() {
        let clock = PacingClock::start(Duration::from_millis(40));
        assert_eq!(clock.deadline(25) - clock.deadline(0), Duration::from_secs(1));
    }
}
