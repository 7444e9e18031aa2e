use serde::{Deserialize, Serialize};

/// Class names produced by the mask classifier.
pub const LABEL_WITH_MASK: &str = "with_mask";
pub const LABEL_WITHOUT_MASK: &str = "without_mask";
pub const LABEL_MASK_WEARED_INCORRECT: &str = "mask_weared_incorrect";
pub const LABEL_UNKNOWN: &str = "unknown";

/// Known mask classes. Anything the service sends outside the three wire
/// names, or no label at all, is `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MaskLabel {
    WithMask,
    WithoutMask,
    MaskWearedIncorrect,
    Unknown,
}

impl MaskLabel {
    /// The three labels shown as fixed counters.
    pub const COUNTED: [MaskLabel; 3] = [
        MaskLabel::WithMask,
        MaskLabel::WithoutMask,
        MaskLabel::MaskWearedIncorrect,
    ];

    pub fn from_wire(label: Option<&str>) -> Self {
        match label {
            Some(LABEL_WITH_MASK) => MaskLabel::WithMask,
            Some(LABEL_WITHOUT_MASK) => MaskLabel::WithoutMask,
            Some(LABEL_MASK_WEARED_INCORRECT) => MaskLabel::MaskWearedIncorrect,
            _ => MaskLabel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MaskLabel::WithMask => LABEL_WITH_MASK,
            MaskLabel::WithoutMask => LABEL_WITHOUT_MASK,
            MaskLabel::MaskWearedIncorrect => LABEL_MASK_WEARED_INCORRECT,
            MaskLabel::Unknown => LABEL_UNKNOWN,
        }
    }
}

/// Bounding box as corners `[x1, y1, x2, y2]`.
///
/// Coordinates are either absolute pixels of the analysed image or
/// normalized `0..1` fractions of it. Which one is decided per detection,
/// see [`Detection::is_normalized`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Converts the `{x, y, w, h}` form into corners.
    pub fn from_xywh(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Heuristic used when the service does not say: all four values `<= 1`.
    pub fn looks_normalized(&self) -> bool {
        self.x1.max(self.y1).max(self.x2).max(self.y2) <= 1.0
    }

    /// Multiplies x coordinates by `width` and y coordinates by `height`.
    pub fn scaled(&self, width: f64, height: f64) -> Self {
        Self::new(
            self.x1 * width,
            self.y1 * height,
            self.x2 * width,
            self.y2 * height,
        )
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One detected face region.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Explicit coordinate space, when the service reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized: Option<bool>,
}

impl Detection {
    pub fn new(bbox: BBox) -> Self {
        Self {
            bbox,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = Some(normalized);
        self
    }

    /// Label text; an empty string counts as no label.
    pub fn label_name(&self) -> Option<&str> {
        self.label.as_deref().filter(|label| !label.is_empty())
    }

    pub fn mask_label(&self) -> MaskLabel {
        MaskLabel::from_wire(self.label_name())
    }

    /// An explicit `normalized` flag wins; otherwise fall back to the
    /// `max(coords) <= 1` heuristic.
    pub fn is_normalized(&self) -> bool {
        self.normalized
            .unwrap_or_else(|| self.bbox.looks_normalized())
    }
}

/// All detections for one analysed image or frame.
///
/// A new set always replaces the previous one; nothing is merged or tracked
/// across frames.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    pub fn into_inner(self) -> Vec<Detection> {
        self.detections
    }
}

impl FromIterator<Detection> for DetectionSet {
    fn from_iter<I: IntoIterator<Item = Detection>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}
