use std::time::{Duration, Instant};

const FLUSH_PERIOD: Duration = Duration::from_millis(1000);

/// Sent-frames-per-second sampler.
///
/// Counts every successfully sent frame; once at least a second has passed
/// since the last flush, the count becomes the displayed rate and restarts.
/// A sample, not a precise measurement.
#[derive(Clone, Debug)]
pub struct FpsCounter {
    frames: u32,
    last_flush: Instant,
    fps: u32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            last_flush: now,
            fps: 0,
        }
    }

    /// Records one sent frame. Returns the new rate when a flush happened.
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        self.frames += 1;
        if now.saturating_duration_since(self.last_flush) >= FLUSH_PERIOD {
            self.fps = self.frames;
            self.frames = 0;
            self.last_flush = now;
            return Some(self.fps);
        }
        None
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }
}
