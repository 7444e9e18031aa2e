//! Synthetic camera (`stub://`) for demos and tests.
//!
//! Mimics a real camera closely enough for the live pipeline: it reports no
//! usable frame for the first few polls (like a video element that has not
//! buffered yet), then produces a moving gradient at the configured size.

use anyhow::Result;

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Polls answered with "no frame yet" after connecting.
    pub warmup_polls: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            width: 640,
            height: 480,
            warmup_polls: 2,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    connected: bool,
    polls: u64,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            connected: false,
            polls: 0,
            frame_count: 0,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let w = self.config.width as usize;
        let h = self.config.height as usize;
        let shift = (self.frame_count * 4) as usize;
        let mut pixels = vec![0u8; w * h * 3];
        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let x = i % w;
            let y = i / w;
            px[0] = ((x + shift) % 256) as u8;
            px[1] = (y % 256) as u8;
            px[2] = ((x + y) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.polls = 0;
        log::info!("SyntheticSource: connected to {}", self.config.name);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Ok(None);
        }
        self.polls += 1;
        if self.polls <= self.config.warmup_polls as u64 {
            return Ok(None);
        }
        self.frame_count += 1;
        Ok(Some(Frame::new(
            self.generate_pixels(),
            self.config.width,
            self.config.height,
            self.frame_count,
        )))
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stop(&mut self) {
        if self.connected {
            log::info!("SyntheticSource: stopped {}", self.config.name);
        }
        self.connected = false;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig {
            name: "stub://test".to_string(),
            width: 16,
            height: 8,
            warmup_polls: 2,
        })
    }

    #[test]
    fn warms_up_before_producing_frames() -> Result<()> {
        let mut source = small();
        source.connect()?;
        assert!(source.next_frame()?.is_none());
        assert!(source.next_frame()?.is_none());

        let frame = source.next_frame()?.expect("frame after warm-up");
        assert_eq!((frame.width, frame.height), (16, 8));
        assert!(frame.is_ready());
        assert_eq!(source.stats().frames_captured, 1);
        Ok(())
    }

    #[test]
    fn stopped_source_yields_nothing() -> Result<()> {
        let mut source = small();
        source.connect()?;
        source.stop();
        assert!(!source.is_healthy());
        for _ in 0..5 {
            assert!(source.next_frame()?.is_none());
        }
        Ok(())
    }
}
