use image::{DynamicImage, RgbaImage};

use super::geometry::{layout, DrawnBox, OverlayGeometry, OverlayStyle, Size};
use super::raster::OverlayRenderer;
use crate::detect::DetectionSet;

/// Single source of truth for one overlay.
///
/// Holds the last detection set and the last known geometry. Every mutation
/// invalidates the view; [`OverlayView::render`] recomputes the layout only
/// when something changed, so repeated renders without changes are free and
/// always agree with each other.
#[derive(Debug)]
pub struct OverlayView {
    style: OverlayStyle,
    renderer: OverlayRenderer,
    geometry: OverlayGeometry,
    detections: DetectionSet,
    drawn: Vec<DrawnBox>,
    dirty: bool,
    layouts: u64,
}

impl OverlayView {
    pub fn new(style: OverlayStyle, renderer: OverlayRenderer, display: Size) -> Self {
        Self {
            style,
            renderer,
            geometry: OverlayGeometry::new(display, Size::default()),
            detections: DetectionSet::empty(),
            drawn: Vec::new(),
            dirty: true,
            layouts: 0,
        }
    }

    /// Replaces the detection set wholesale.
    pub fn set_detections(&mut self, detections: DetectionSet) {
        self.detections = detections;
        self.dirty = true;
    }

    /// New source (preview image or camera frame size).
    pub fn set_natural_size(&mut self, natural: Size) {
        if self.geometry.natural != natural {
            self.geometry.natural = natural;
            self.dirty = true;
        }
    }

    /// The displayed size of the source element changed.
    pub fn resize(&mut self, display: Size) {
        if self.geometry.display != display {
            self.geometry.display = display;
            self.dirty = true;
        }
    }

    /// Drops detections and source size; the next render draws nothing.
    pub fn clear(&mut self) {
        self.detections = DetectionSet::empty();
        self.geometry.natural = Size::default();
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn geometry(&self) -> OverlayGeometry {
        self.geometry
    }

    pub fn detections(&self) -> &DetectionSet {
        &self.detections
    }

    /// Number of times the layout was actually recomputed.
    pub fn layout_count(&self) -> u64 {
        self.layouts
    }

    pub fn render(&mut self) -> &[DrawnBox] {
        if self.dirty {
            self.drawn = layout(&self.geometry, &self.detections, &self.style, &self.renderer);
            self.dirty = false;
            self.layouts += 1;
        }
        &self.drawn
    }

    /// Transparent overlay the size of the displayed element.
    pub fn rasterize(&mut self) -> RgbaImage {
        let display = self.geometry.display;
        self.render();
        self.renderer.draw(display, &self.drawn)
    }

    /// `source` scaled to the displayed size with the overlay on top.
    pub fn composite(&mut self, source: &DynamicImage) -> RgbaImage {
        let display = self.geometry.display;
        self.render();
        self.renderer.composite(source, display, &self.drawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BBox, Detection};

    fn view() -> OverlayView {
        OverlayView::new(
            OverlayStyle::still(),
            OverlayRenderer::default(),
            Size::new(200, 200),
        )
    }

    #[test]
    fn renders_only_when_invalidated() {
        let mut view = view();
        view.set_natural_size(Size::new(100, 100));
        view.set_detections(DetectionSet::new(vec![Detection::new(BBox::new(
            10.0, 10.0, 50.0, 50.0,
        ))]));
        assert_eq!(view.render().len(), 1);
        view.render();
        assert_eq!(view.layout_count(), 1);

        // Same size again is not a change.
        view.resize(Size::new(200, 200));
        assert!(!view.is_dirty());

        view.resize(Size::new(400, 400));
        assert!(view.is_dirty());
        let rect = view.render()[0].rect;
        assert_eq!(rect.x, 40.0);
        assert_eq!(view.layout_count(), 2);
    }

    #[test]
    fn clear_empties_the_overlay() {
        let mut view = view();
        view.set_detections(DetectionSet::new(vec![Detection::new(BBox::new(
            1.0, 1.0, 5.0, 5.0,
        ))]));
        view.clear();
        assert!(view.render().is_empty());
        assert!(view.rasterize().pixels().all(|p| p[3] == 0));
    }
}
