//! Camera sources for the live pipeline.
//!
//! This module provides different sources for frames:
//! - Synthetic source (`stub://name`), for demos and tests
//! - Image directories or single image files, replayed in a loop
//! - USB/V4L2 devices (feature: ingest-v4l2)
//!
//! A source may have nothing to show yet (camera still warming up, zero-sized
//! first buffers). `next_frame` reports that as `Ok(None)` and the caller
//! simply skips that tick.

pub mod dir;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use dir::ImageDirSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// Statistics for any frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

pub trait FrameSource {
    /// Human-readable source identifier.
    fn name(&self) -> &str;

    /// Acquire the device. Failing here means the camera is unavailable.
    fn connect(&mut self) -> Result<()>;

    /// Capture the current frame, or `None` when no usable frame exists yet.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn is_healthy(&self) -> bool;

    /// Release the device. Later `next_frame` calls return `Ok(None)`.
    fn stop(&mut self);

    fn stats(&self) -> SourceStats;
}

/// Opens the frame source named by `locator`.
///
/// - `stub://<name>`: synthetic frames
/// - `/dev/video*`: V4L2 camera (requires the ingest-v4l2 feature)
/// - a directory or an image file: replayed images
pub fn open_source(locator: &str) -> Result<Box<dyn FrameSource>> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(anyhow!("frame source must not be empty"));
    }
    if locator.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            name: locator.to_string(),
            ..SyntheticConfig::default()
        })));
    }
    if locator.starts_with("/dev/video") {
        #[cfg(feature = "ingest-v4l2")]
        {
            return Ok(Box::new(V4l2Source::new(V4l2Config {
                device: locator.to_string(),
                ..V4l2Config::default()
            })?));
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            return Err(anyhow!(
                "camera capture from {} requires the ingest-v4l2 feature",
                locator
            ));
        }
    }
    if locator.contains("://") {
        return Err(anyhow!("unsupported frame source '{}'", locator));
    }
    Ok(Box::new(ImageDirSource::new(Path::new(locator))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_locators_open_synthetic_sources() -> Result<()> {
        let source = open_source("stub://front")?;
        assert_eq!(source.name(), "stub://front");
        Ok(())
    }

    #[test]
    fn unknown_schemes_are_rejected() {
        assert!(open_source("rtsp://camera").is_err());
        assert!(open_source("  ").is_err());
    }
}
