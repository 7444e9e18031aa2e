//! V4L2 camera source.
//!
//! Opens a local device node (e.g. /dev/video0), asks for RGB at the
//! configured size and falls back to YUYV when the driver refuses. Frames
//! are converted to RGB8 in memory.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{to_rgb, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested capture rate.
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 15,
            width: 640,
            height: 480,
        }
    }
}

#[self_referencing]
struct CaptureState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<CaptureState>,
    format: PixelFormat,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Result<Self> {
        Ok(Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        })
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        &self.config.device
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open camera {}", self.config.device))?;
        let mut format = device.format().context("read camera format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: RGB capture refused on {}: {}; trying YUYV",
                    self.config.device,
                    err
                );
                format.fourcc = v4l::FourCC::new(b"YUYV");
                device
                    .set_format(&format)
                    .context("set camera format")?
            }
        };
        self.format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "camera {} delivers unsupported pixel format {}",
                self.config.device,
                format.fourcc
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = CaptureStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create camera buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);
        self.last_error = None;

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let raw = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture camera frame")
            })?;

        if raw.is_empty() || self.active_width == 0 || self.active_height == 0 {
            return Ok(None);
        }
        let rgb = to_rgb(&raw, self.active_width, self.active_height, self.format)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Ok(Some(Frame::new(
            rgb,
            self.active_width,
            self.active_height,
            self.frame_count,
        )))
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() || self.state.is_none() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stop(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Source: released {}", self.config.device);
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.config.device.clone(),
        }
    }
}
