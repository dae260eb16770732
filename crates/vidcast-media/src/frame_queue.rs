// crates/vidcast-media/src/frame_queue.rs
//
// Bounded FIFO hand-off of decoded RGB images from one decode worker to one
// renderer.
//
// Backpressure contract:
//   • The producer never drops a frame. When the queue holds FRAME_QUEUE_CAPACITY
//     images, `push_timeout` waits on the "not full" condvar for at most the given
//     interval and hands the image back if there is still no room, so the caller
//     can re-check its stop flag and retry.
//   • The consumer waits on "not empty" with a bounded timeout instead of spinning.
//   • len() never exceeds the capacity, even under concurrent push/pop.
//
// Shared between the two threads as Arc<FrameQueue>; all mutation goes through
// the internal lock.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use vidcast_core::RgbImage;

pub const FRAME_QUEUE_CAPACITY: usize = 16;

/// Default bounded wait used by the decode producer and preview consumers.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct FrameQueue {
    frames:    Mutex<VecDeque<RgbImage>>,
    capacity:  usize,
    not_full:  Condvar,
    not_empty: Condvar,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::with_capacity(FRAME_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames:    Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_full:  Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `image`, waiting up to `timeout` for room.
    /// Returns the image back if the queue stayed full.
    pub fn push_timeout(&self, image: RgbImage, timeout: Duration) -> Result<(), RgbImage> {
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            // Spurious wakeups just shorten the wait; the caller retries.
            self.not_full.wait_for(&mut frames, timeout);
            if frames.len() >= self.capacity {
                return Err(image);
            }
        }
        frames.push_back(image);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Wait up to `timeout` for a free slot. Returns true if one is free.
    pub fn wait_for_room(&self, timeout: Duration) -> bool {
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            self.not_full.wait_for(&mut frames, timeout);
        }
        frames.len() < self.capacity
    }

    /// Append without waiting. Returns the image back when full.
    pub fn try_push(&self, image: RgbImage) -> Result<(), RgbImage> {
        self.push_timeout(image, Duration::ZERO)
    }

    pub fn try_pop(&self) -> Option<RgbImage> {
        let image = self.frames.lock().pop_front();
        if image.is_some() {
            self.not_full.notify_one();
        }
        image
    }

    /// Pop the oldest image, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<RgbImage> {
        let mut frames = self.frames.lock();
        if frames.is_empty() {
            self.not_empty.wait_for(&mut frames, timeout);
        }
        let image = frames.pop_front();
        drop(frames);
        if image.is_some() {
            self.not_full.notify_one();
        }
        image
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.lock().len() >= self.capacity
    }

    /// Drop everything queued (e.g. when the preview window closes).
    pub fn clear(&self) {
        self.frames.lock().clear();
        self.not_full.notify_all();
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
