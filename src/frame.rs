//! Captured video frames and their wire encoding.
//!
//! A `Frame` is an RGB8 snapshot of the camera at native resolution. The live
//! pipeline encodes it as a JPEG, wraps it in a data URL and sends it as
//! `{"image": "data:image/jpeg;base64,..."}`.

use std::io::Cursor;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbImage};
use serde::{Deserialize, Serialize};

use crate::overlay::Size;

pub const DATA_URL_JPEG_PREFIX: &str = "data:image/jpeg;base64,";

/// Default JPEG quality (0.6 on a 0..1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 60;

#[derive(Clone)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Per-source capture counter.
    pub sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn from_image(image: &DynamicImage, sequence: u64) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height, sequence)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed()
    }

    /// A frame is usable once it has real dimensions and a full RGB buffer.
    pub fn is_ready(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() as u64 == self.width as u64 * self.height as u64 * 3
    }

    pub fn to_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        if !self.is_ready() {
            return Err(anyhow!(
                "frame {} is not ready ({}x{}, {} bytes)",
                self.sequence,
                self.width,
                self.height,
                self.pixels.len()
            ));
        }
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .write_image(&self.pixels, self.width, self.height, ExtendedColorType::Rgb8)
            .context("encode frame as jpeg")?;
        Ok(out.into_inner())
    }

    pub fn to_data_url(&self, quality: u8) -> Result<String> {
        let jpeg = self.encode_jpeg(quality)?;
        Ok(format!(
            "{}{}",
            DATA_URL_JPEG_PREFIX,
            base64::engine::general_purpose::STANDARD.encode(jpeg)
        ))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Outbound socket message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMessage {
    pub image: String,
}

impl FrameMessage {
    pub fn from_frame(frame: &Frame, quality: u8) -> Result<Self> {
        Ok(Self {
            image: frame.to_data_url(quality)?,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("serialize frame message")
    }
}

/// Decodes a `data:<mime>;base64,<payload>` URL back to bytes.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let (_, payload) = url
        .split_once(',')
        .ok_or_else(|| anyhow!("data url has no payload separator"))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("decode data url payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let pixels = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        Frame::new(pixels, width, height, 1)
    }

    #[test]
    fn debug_output_skips_pixels() {
        let text = format!("{:?}", gradient(4, 2));
        assert!(text.starts_with("Frame {"));
        assert!(text.contains("width: 4"));
        assert!(!text.contains("pixels"));
    }

    #[test]
    fn data_url_round_trips_to_a_jpeg() -> Result<()> {
        let frame = gradient(32, 24);
        let url = frame.to_data_url(DEFAULT_JPEG_QUALITY)?;
        assert!(url.starts_with(DATA_URL_JPEG_PREFIX));

        let decoded = image::load_from_memory(&decode_data_url(&url)?)?;
        assert_eq!((decoded.width(), decoded.height()), (32, 24));
        Ok(())
    }

    #[test]
    fn empty_frames_are_not_ready() {
        let frame = Frame::new(Vec::new(), 0, 0, 0);
        assert!(!frame.is_ready());
        assert!(frame.encode_jpeg(60).is_err());

        let short = Frame::new(vec![0; 10], 4, 4, 0);
        assert!(!short.is_ready());
    }

    #[test]
    fn message_serializes_with_image_field() -> Result<()> {
        let msg = FrameMessage::from_frame(&gradient(8, 8), 60)?;
        let json: serde_json::Value = serde_json::from_str(&msg.to_json()?)?;
        assert!(json["image"].as_str().unwrap().starts_with("data:image/jpeg"));
        Ok(())
    }
}
