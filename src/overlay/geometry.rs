//! Pure overlay layout.
//!
//! Maps a [`DetectionSet`] from the source's natural pixel space (or
//! normalized space) into the displayed space of the element the overlay
//! sits on, and decides stroke colour, stroke width and label tag placement.
//! Nothing here touches pixels; see `raster` for that.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use image::Rgba;

use crate::detect::{Detection, DetectionSet, MaskLabel};

pub const COLOR_WITH_MASK: Rgba<u8> = Rgba([0x10, 0xb9, 0x81, 0xff]);
pub const COLOR_WITHOUT_MASK: Rgba<u8> = Rgba([0xef, 0x44, 0x44, 0xff]);
pub const COLOR_MASK_INCORRECT: Rgba<u8> = Rgba([0xf5, 0x9e, 0x0b, 0xff]);
pub const COLOR_TAG_TEXT: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);

/// Stroke colour for a label. Unknown labels share the `with_mask` green.
pub fn label_color(label: MaskLabel) -> Rgba<u8> {
    match label {
        MaskLabel::WithoutMask => COLOR_WITHOUT_MASK,
        MaskLabel::MaskWearedIncorrect => COLOR_MASK_INCORRECT,
        MaskLabel::WithMask | MaskLabel::Unknown => COLOR_WITH_MASK,
    }
}

/// Integer pixel size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Size {
    type Err = anyhow::Error;

    /// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| anyhow!("size must look like WIDTHxHEIGHT, got '{}'", s))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid width in '{}'", s))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid height in '{}'", s))?;
        Ok(Self::new(width, height))
    }
}

/// Floating-point rectangle in displayed pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectF {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Displayed size of the source element vs. its natural pixel size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OverlayGeometry {
    pub display: Size,
    pub natural: Size,
}

impl OverlayGeometry {
    pub fn new(display: Size, natural: Size) -> Self {
        Self { display, natural }
    }

    /// Natural size used for scaling. A source that has not reported its size
    /// yet is treated as being shown at 1:1.
    pub fn effective_natural(&self) -> Size {
        Size::new(
            if self.natural.width == 0 {
                self.display.width
            } else {
                self.natural.width
            },
            if self.natural.height == 0 {
                self.display.height
            } else {
                self.natural.height
            },
        )
    }

    /// `(display / natural)` per axis.
    pub fn scale(&self) -> (f64, f64) {
        let natural = self.effective_natural();
        if natural.is_empty() {
            return (1.0, 1.0);
        }
        (
            self.display.width as f64 / natural.width as f64,
            self.display.height as f64 / natural.height as f64,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StrokeWidth {
    Fixed(u32),
    /// `max(floor, round(min(display w, h) * factor))`.
    Proportional { factor: f64, floor: u32 },
}

impl StrokeWidth {
    pub fn resolve(&self, display: Size) -> u32 {
        match *self {
            StrokeWidth::Fixed(w) => w,
            StrokeWidth::Proportional { factor, floor } => {
                let shorter = display.width.min(display.height) as f64;
                ((shorter * factor).round() as u32).max(floor)
            }
        }
    }
}

/// How the tag text is built from label and confidence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelFormat {
    /// `"<label or Unknown> NN%"`, confidence defaulting to zero.
    Still,
    /// `"<label> NN%"`, `"<label>"`, `"NN%"`, or no tag at all.
    Live,
}

impl LabelFormat {
    pub fn text(&self, det: &Detection) -> Option<String> {
        let percent = |c: f64| format!("{}%", (c * 100.0).round() as i64);
        match self {
            LabelFormat::Still => Some(format!(
                "{} {}",
                det.label_name().unwrap_or("Unknown"),
                percent(det.confidence.unwrap_or(0.0))
            )),
            LabelFormat::Live => {
                let conf = det.confidence.filter(|c| *c != 0.0);
                match (det.label_name(), conf) {
                    (Some(label), Some(c)) => Some(format!("{} {}", label, percent(c))),
                    (Some(label), None) => Some(label.to_string()),
                    (None, Some(c)) => Some(percent(c)),
                    (None, None) => None,
                }
            }
        }
    }
}

/// Visual parameters for one overlay flavour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub stroke: StrokeWidth,
    pub label_format: LabelFormat,
    /// Label font size in pixels.
    pub font_px: f32,
    pub tag_height: f64,
    /// Distance from the box top edge up to the tag top edge.
    pub tag_rise: f64,
    pub tag_padding: f64,
}

impl OverlayStyle {
    /// Still-image result view.
    pub fn still() -> Self {
        Self {
            stroke: StrokeWidth::Fixed(4),
            label_format: LabelFormat::Still,
            font_px: 18.0,
            tag_height: 30.0,
            tag_rise: 30.0,
            tag_padding: 10.0,
        }
    }

    /// Live camera view.
    pub fn live() -> Self {
        Self {
            stroke: StrokeWidth::Proportional {
                factor: 0.003,
                floor: 3,
            },
            label_format: LabelFormat::Live,
            font_px: 16.0,
            tag_height: 22.0,
            tag_rise: 28.0,
            tag_padding: 8.0,
        }
    }
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self::still()
    }
}

/// Width of rendered text, in pixels.
pub trait TextMeasure {
    fn text_width(&self, text: &str, font_px: f32) -> f64;
}

/// Average-advance estimate used when no font is loaded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ApproxMeasure;

impl TextMeasure for ApproxMeasure {
    fn text_width(&self, text: &str, font_px: f32) -> f64 {
        text.chars().count() as f64 * font_px as f64 * 0.6
    }
}

/// Filled label tag drawn above a box.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelTag {
    pub rect: RectF,
    pub text: String,
    pub font_px: f32,
    /// Top-left of the text run.
    pub text_x: f64,
    pub text_y: f64,
}

/// One rectangle ready to be drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawnBox {
    pub rect: RectF,
    pub label: MaskLabel,
    pub color: Rgba<u8>,
    pub stroke_width: u32,
    pub tag: Option<LabelTag>,
}

/// Lays out every detection of `set` for `geometry`.
///
/// Normalized boxes are first mapped to natural pixels, then everything is
/// scaled into displayed pixels. Tags sit above the box, clamped to the
/// visible area's top and left edges.
pub fn layout(
    geometry: &OverlayGeometry,
    set: &DetectionSet,
    style: &OverlayStyle,
    measure: &dyn TextMeasure,
) -> Vec<DrawnBox> {
    let natural = geometry.effective_natural();
    let (scale_x, scale_y) = geometry.scale();
    let stroke_width = style.stroke.resolve(geometry.display);

    set.iter()
        .map(|det| {
            let bbox = if det.is_normalized() {
                det.bbox.scaled(natural.width as f64, natural.height as f64)
            } else {
                det.bbox
            };
            let rect = RectF::new(
                bbox.x1 * scale_x,
                bbox.y1 * scale_y,
                bbox.width() * scale_x,
                bbox.height() * scale_y,
            );
            let label = det.mask_label();
            let tag = style
                .label_format
                .text(det)
                .map(|text| place_tag(&rect, text, style, measure));
            DrawnBox {
                rect,
                label,
                color: label_color(label),
                stroke_width,
                tag,
            }
        })
        .collect()
}

fn place_tag(rect: &RectF, text: String, style: &OverlayStyle, measure: &dyn TextMeasure) -> LabelTag {
    let text_width = measure.text_width(&text, style.font_px);
    let left = rect.x.max(0.0);
    let top = (rect.y - style.tag_rise).max(0.0);
    let tag_rect = RectF::new(
        left,
        top,
        text_width + style.tag_padding * 2.0,
        style.tag_height,
    );
    let text_y = top + ((style.tag_height - style.font_px as f64) / 2.0).max(0.0);
    LabelTag {
        rect: tag_rect,
        text,
        font_px: style.font_px,
        text_x: left + style.tag_padding,
        text_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BBox;

    #[test]
    fn parses_display_sizes() {
        assert_eq!("640x480".parse::<Size>().unwrap(), Size::new(640, 480));
        assert_eq!(" 10X20 ".parse::<Size>().unwrap(), Size::new(10, 20));
        assert!("640".parse::<Size>().is_err());
        assert!("ax3".parse::<Size>().is_err());
    }

    #[test]
    fn proportional_stroke_has_floor() {
        let stroke = OverlayStyle::live().stroke;
        assert_eq!(stroke.resolve(Size::new(640, 480)), 3);
        assert_eq!(stroke.resolve(Size::new(3840, 2160)), 6);
    }

    #[test]
    fn zero_natural_size_falls_back_to_display() {
        let geometry = OverlayGeometry::new(Size::new(640, 480), Size::default());
        assert_eq!(geometry.scale(), (1.0, 1.0));
    }

    #[test]
    fn live_labels_skip_missing_parts() {
        let base = Detection::new(BBox::default());
        let fmt = LabelFormat::Live;
        assert_eq!(fmt.text(&base), None);
        assert_eq!(fmt.text(&base.clone().with_confidence(0.42)).as_deref(), Some("42%"));
        assert_eq!(
            fmt.text(&base.clone().with_label("with_mask")).as_deref(),
            Some("with_mask")
        );
        assert_eq!(
            fmt.text(&base.with_label("without_mask").with_confidence(0.876)).as_deref(),
            Some("without_mask 88%")
        );
    }

    #[test]
    fn still_labels_default_to_unknown() {
        let det = Detection::new(BBox::default());
        assert_eq!(LabelFormat::Still.text(&det).as_deref(), Some("Unknown 0%"));
    }
}
