use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::geometry::{ApproxMeasure, DrawnBox, RectF, Size, TextMeasure, COLOR_TAG_TEXT};

/// Turns laid-out boxes into pixels.
///
/// Without a font, tags are still filled but carry no text, and text widths
/// fall back to [`ApproxMeasure`].
#[derive(Clone, Default)]
pub struct OverlayRenderer {
    font: Option<FontArc>,
}

impl OverlayRenderer {
    pub fn new(font: Option<FontArc>) -> Self {
        Self { font }
    }

    /// Loads a TTF/OTF font from disk when a path is given.
    pub fn from_font_path(path: Option<&Path>) -> Result<Self> {
        let font = match path {
            Some(path) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("read font {}", path.display()))?;
                Some(
                    FontArc::try_from_vec(bytes)
                        .with_context(|| format!("parse font {}", path.display()))?,
                )
            }
            None => None,
        };
        Ok(Self { font })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draws `boxes` onto a fully transparent canvas of the display size.
    pub fn draw(&self, display: Size, boxes: &[DrawnBox]) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(display.width, display.height, Rgba([0, 0, 0, 0]));
        for drawn in boxes {
            stroke_rect(&mut canvas, &drawn.rect, drawn.stroke_width, drawn.color);
            if let Some(tag) = &drawn.tag {
                if let Some(rect) = to_pixel_rect(&tag.rect) {
                    draw_filled_rect_mut(&mut canvas, rect, drawn.color);
                }
                if let Some(font) = &self.font {
                    draw_text_mut(
                        &mut canvas,
                        COLOR_TAG_TEXT,
                        tag.text_x.round() as i32,
                        tag.text_y.round() as i32,
                        PxScale::from(tag.font_px),
                        font,
                        &tag.text,
                    );
                }
            }
        }
        canvas
    }

    /// Scales `source` to the display size and draws the overlay on top.
    pub fn composite(&self, source: &DynamicImage, display: Size, boxes: &[DrawnBox]) -> RgbaImage {
        let mut base = if source.width() == display.width && source.height() == display.height {
            source.to_rgba8()
        } else {
            imageops::resize(
                &source.to_rgba8(),
                display.width,
                display.height,
                FilterType::Triangle,
            )
        };
        let overlay = self.draw(display, boxes);
        imageops::overlay(&mut base, &overlay, 0, 0);
        base
    }
}

impl TextMeasure for OverlayRenderer {
    fn text_width(&self, text: &str, font_px: f32) -> f64 {
        match &self.font {
            Some(font) => text_size(PxScale::from(font_px), font, text).0 as f64,
            None => ApproxMeasure.text_width(text, font_px),
        }
    }
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("font", &self.font.is_some())
            .finish()
    }
}

/// Strokes a rectangle `width` pixels wide, centred on its outline.
fn stroke_rect(canvas: &mut RgbaImage, rect: &RectF, width: u32, color: Rgba<u8>) {
    let width = width.max(1) as i32;
    let inner = width / 2;
    for offset in -inner..(width - inner) {
        let grown = RectF::new(
            rect.x - offset as f64,
            rect.y - offset as f64,
            rect.width + 2.0 * offset as f64,
            rect.height + 2.0 * offset as f64,
        );
        if let Some(r) = to_pixel_rect(&grown) {
            draw_hollow_rect_mut(canvas, r, color);
        }
    }
}

fn to_pixel_rect(rect: &RectF) -> Option<Rect> {
    let width = rect.width.round();
    let height = rect.height.round();
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(Rect::at(rect.x.round() as i32, rect.y.round() as i32).of_size(width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::MaskLabel;
    use crate::overlay::geometry::COLOR_WITHOUT_MASK;

    fn drawn(rect: RectF) -> DrawnBox {
        DrawnBox {
            rect,
            label: MaskLabel::WithoutMask,
            color: COLOR_WITHOUT_MASK,
            stroke_width: 1,
            tag: None,
        }
    }

    #[test]
    fn draws_outline_only() {
        let renderer = OverlayRenderer::default();
        let canvas = renderer.draw(
            Size::new(100, 100),
            &[drawn(RectF::new(20.0, 20.0, 40.0, 40.0))],
        );
        assert_eq!(canvas.dimensions(), (100, 100));
        assert_eq!(*canvas.get_pixel(20, 20), COLOR_WITHOUT_MASK);
        assert_eq!(*canvas.get_pixel(59, 40), COLOR_WITHOUT_MASK);
        assert_eq!(canvas.get_pixel(40, 40)[3], 0);
        assert_eq!(canvas.get_pixel(5, 5)[3], 0);
    }

    #[test]
    fn degenerate_boxes_are_skipped() {
        let renderer = OverlayRenderer::default();
        let canvas = renderer.draw(Size::new(10, 10), &[drawn(RectF::default())]);
        assert!(canvas.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn missing_font_path_is_an_error() {
        let err = OverlayRenderer::from_font_path(Some(Path::new("/nonexistent/font.ttf")));
        assert!(err.is_err());
        assert!(!OverlayRenderer::from_font_path(None).unwrap().has_font());
    }
}
