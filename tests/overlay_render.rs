use image::{DynamicImage, Rgba, RgbImage};

use maskwatch::detect::{parse_stream_message, BBox, Detection, DetectionSet};
use maskwatch::overlay::{
    layout, ApproxMeasure, OverlayGeometry, OverlayRenderer, OverlayStyle, OverlayView, RectF,
    Size, COLOR_MASK_INCORRECT, COLOR_WITHOUT_MASK, COLOR_WITH_MASK,
};

fn geometry(display: u32, natural: u32) -> OverlayGeometry {
    OverlayGeometry::new(Size::new(display, display), Size::new(natural, natural))
}

#[test]
fn pixel_boxes_scale_from_natural_to_display() {
    let set = DetectionSet::new(vec![Detection::new(BBox::new(10.0, 10.0, 50.0, 50.0))
        .with_label("with_mask")
        .with_confidence(0.9)]);
    let drawn = layout(&geometry(200, 100), &set, &OverlayStyle::still(), &ApproxMeasure);
    assert_eq!(drawn.len(), 1);
    assert_eq!(drawn[0].rect, RectF::new(20.0, 20.0, 80.0, 80.0));
    assert_eq!(drawn[0].stroke_width, 4);
    assert_eq!(drawn[0].tag.as_ref().map(|t| t.text.as_str()), Some("with_mask 90%"));
}

#[test]
fn normalized_boxes_land_on_the_same_pixels() {
    let pixels = layout(
        &geometry(200, 100),
        &DetectionSet::new(vec![Detection::new(BBox::new(10.0, 10.0, 50.0, 50.0))]),
        &OverlayStyle::live(),
        &ApproxMeasure,
    );
    let normalized = layout(
        &geometry(200, 100),
        &DetectionSet::new(vec![Detection::new(BBox::new(0.1, 0.1, 0.5, 0.5))]),
        &OverlayStyle::live(),
        &ApproxMeasure,
    );
    let (a, b) = (pixels[0].rect, normalized[0].rect);
    for (x, y) in [(a.x, b.x), (a.y, b.y), (a.width, b.width), (a.height, b.height)] {
        assert!((x - y).abs() < 1e-9, "{} != {}", x, y);
    }
}

#[test]
fn colors_follow_labels() {
    let payload = br#"{"detections":[
        {"bbox":[0,0,10,10],"label":"with_mask"},
        {"bbox":[0,0,10,10],"label":"without_mask"},
        {"bbox":[0,0,10,10],"label":"mask_weared_incorrect"},
        {"bbox":[0,0,10,10],"label":"scarf"},
        {"bbox":[0,0,10,10]}
    ]}"#;
    let set = parse_stream_message(payload).expect("valid message");
    let colors: Vec<Rgba<u8>> = layout(&geometry(100, 100), &set, &OverlayStyle::live(), &ApproxMeasure)
        .into_iter()
        .map(|d| d.color)
        .collect();
    assert_eq!(
        colors,
        vec![
            COLOR_WITH_MASK,
            COLOR_WITHOUT_MASK,
            COLOR_MASK_INCORRECT,
            COLOR_WITH_MASK,
            COLOR_WITH_MASK
        ]
    );
}

#[test]
fn tags_never_leave_the_top_left_edges() {
    let set = DetectionSet::new(vec![Detection::new(BBox::new(-5.0, 4.0, 30.0, 40.0))
        .with_label("without_mask")
        .with_confidence(0.5)]);
    for style in [OverlayStyle::still(), OverlayStyle::live()] {
        let drawn = layout(&geometry(100, 100), &set, &style, &ApproxMeasure);
        let tag = drawn[0].tag.as_ref().expect("tag");
        assert_eq!(tag.rect.x, 0.0);
        assert_eq!(tag.rect.y, 0.0);
    }
}

#[test]
fn live_stroke_scales_with_display() {
    let set = DetectionSet::new(vec![Detection::new(BBox::new(1.0, 1.0, 2.0, 2.0))]);
    let stroke = |w, h| {
        let geometry = OverlayGeometry::new(Size::new(w, h), Size::default());
        layout(&geometry, &set, &OverlayStyle::live(), &ApproxMeasure)[0].stroke_width
    };
    assert_eq!(stroke(640, 480), 3);
    assert_eq!(stroke(1920, 1080), 3);
    assert_eq!(stroke(2560, 2000), 6);
}

#[test]
fn live_tag_omitted_without_label_or_confidence() {
    let set = DetectionSet::new(vec![
        Detection::new(BBox::new(10.0, 40.0, 20.0, 60.0)),
        Detection::new(BBox::new(10.0, 40.0, 20.0, 60.0)).with_confidence(0.42),
    ]);
    let drawn = layout(&geometry(100, 100), &set, &OverlayStyle::live(), &ApproxMeasure);
    assert!(drawn[0].tag.is_none());
    assert_eq!(drawn[1].tag.as_ref().map(|t| t.text.as_str()), Some("42%"));
}

#[test]
fn empty_label_reads_as_missing() {
    let set = DetectionSet::new(vec![Detection::new(BBox::new(10.0, 40.0, 20.0, 60.0)).with_label("")]);
    let live = layout(&geometry(100, 100), &set, &OverlayStyle::live(), &ApproxMeasure);
    assert!(live[0].tag.is_none());
    let still = layout(&geometry(100, 100), &set, &OverlayStyle::still(), &ApproxMeasure);
    assert_eq!(still[0].tag.as_ref().map(|t| t.text.as_str()), Some("Unknown 0%"));
}

#[test]
fn view_rasterizes_only_the_outline() {
    let mut view = OverlayView::new(OverlayStyle::still(), OverlayRenderer::new(None), Size::new(200, 200));
    view.set_natural_size(Size::new(100, 100));
    view.set_detections(DetectionSet::new(vec![Detection::new(BBox::new(
        10.0, 10.0, 50.0, 50.0,
    ))
    .with_label("without_mask")]));

    let overlay = view.rasterize();
    assert_eq!(overlay.dimensions(), (200, 200));
    assert_eq!(*overlay.get_pixel(20, 60), COLOR_WITHOUT_MASK);
    assert_eq!(overlay.get_pixel(60, 60)[3], 0);
    // Tag is clamped to the top edge.
    assert_eq!(*overlay.get_pixel(25, 5), COLOR_WITHOUT_MASK);
}

#[test]
fn composite_resizes_source_to_display() {
    let mut view = OverlayView::new(OverlayStyle::live(), OverlayRenderer::new(None), Size::new(64, 48));
    let source = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, image::Rgb([0, 0, 255])));
    view.set_natural_size(Size::new(32, 24));
    let out = view.composite(&source);
    assert_eq!(out.dimensions(), (64, 48));
    assert_eq!(*out.get_pixel(30, 20), Rgba([0, 0, 255, 255]));
}

#[test]
fn unchanged_view_does_not_relayout() {
    let mut view = OverlayView::new(OverlayStyle::live(), OverlayRenderer::new(None), Size::new(100, 100));
    view.render();
    view.render();
    assert_eq!(view.layout_count(), 1);

    view.resize(Size::new(100, 100));
    view.render();
    assert_eq!(view.layout_count(), 1);

    view.resize(Size::new(120, 100));
    view.render();
    assert_eq!(view.layout_count(), 2);
}
