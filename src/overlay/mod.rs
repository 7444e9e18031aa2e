//! Detection overlay: layout, invalidation and rasterization.

mod geometry;
mod raster;
mod view;

pub use geometry::{
    label_color, layout, ApproxMeasure, DrawnBox, LabelFormat, LabelTag, OverlayGeometry,
    OverlayStyle, RectF, Size, StrokeWidth, TextMeasure, COLOR_MASK_INCORRECT, COLOR_TAG_TEXT,
    COLOR_WITHOUT_MASK, COLOR_WITH_MASK,
};
pub use raster::OverlayRenderer;
pub use view::OverlayView;
