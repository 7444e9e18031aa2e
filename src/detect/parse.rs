//! Detection-service response parsing.
//!
//! The service is loose about its response shape: the still-image endpoint
//! answers with `predictions` (older deployments with `result_image`), and the
//! socket has been seen sending any of `result_image`, `detections`,
//! `predictions` or `results`. Entries come either as corner boxes or as
//! `{x, y, w, h}`. Everything is normalized here into a [`DetectionSet`].

use serde_json::{Map, Value};

use super::result::{BBox, Detection, DetectionSet};

/// Keys checked, in order, on a still-image response.
pub const UPLOAD_RESULT_KEYS: [&str; 2] = ["predictions", "result_image"];

/// Keys checked, in order, on a streamed message.
pub const STREAM_RESULT_KEYS: [&str; 4] = ["result_image", "detections", "predictions", "results"];

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Parses the body of `POST /detect`.
///
/// The first of [`UPLOAD_RESULT_KEYS`] holding an array wins; a response with
/// neither yields an empty set.
pub fn parse_upload_response(body: &[u8]) -> Result<DetectionSet, ParseError> {
    let root = parse_object(body)?;
    let entries = UPLOAD_RESULT_KEYS
        .iter()
        .find_map(|key| root.get(*key).and_then(Value::as_array));
    Ok(entries.map(|e| normalize_entries(e)).unwrap_or_default())
}

/// Parses one inbound socket message (text, or binary holding UTF-8 JSON).
///
/// The first of [`STREAM_RESULT_KEYS`] that is present and non-null is used;
/// if it is not an array the set is empty.
pub fn parse_stream_message(payload: &[u8]) -> Result<DetectionSet, ParseError> {
    let root = parse_object(payload)?;
    let selected = STREAM_RESULT_KEYS
        .iter()
        .find_map(|key| root.get(*key).filter(|v| !v.is_null()));
    Ok(selected
        .and_then(Value::as_array)
        .map(|e| normalize_entries(e))
        .unwrap_or_default())
}

fn parse_object(payload: &[u8]) -> Result<Map<String, Value>, ParseError> {
    let text = std::str::from_utf8(payload)?;
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::NotAnObject),
    }
}

fn normalize_entries(entries: &[Value]) -> DetectionSet {
    entries
        .iter()
        .filter_map(|entry| match entry.as_object() {
            Some(obj) => Some(normalize_entry(obj)),
            None => {
                log::debug!("skipping non-object detection entry: {}", entry);
                None
            }
        })
        .collect()
}

/// Normalizes one raw entry into corner form.
///
/// Accepted shapes, in order: `bbox: [x1, y1, x2, y2]`, then top-level
/// `x, y, w, h`. Anything else becomes a zero box so the label still counts.
pub fn normalize_entry(obj: &Map<String, Value>) -> Detection {
    let label = obj
        .get("label")
        .and_then(Value::as_str)
        .filter(|label| !label.is_empty())
        .map(str::to_string);
    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .or_else(|| obj.get("score").and_then(Value::as_f64));
    let normalized = obj.get("normalized").and_then(Value::as_bool);

    let bbox = corner_box(obj.get("bbox"))
        .or_else(|| xywh_box(obj))
        .unwrap_or_default();

    Detection {
        bbox,
        label,
        confidence,
        normalized,
    }
}

fn corner_box(value: Option<&Value>) -> Option<BBox> {
    let items = value?.as_array()?;
    if items.len() != 4 {
        return None;
    }
    let mut coords = [0.0; 4];
    for (slot, item) in coords.iter_mut().zip(items) {
        *slot = item.as_f64()?;
    }
    Some(BBox::from(coords))
}

fn xywh_box(obj: &Map<String, Value>) -> Option<BBox> {
    let field = |name: &str| obj.get(name).and_then(Value::as_f64);
    Some(BBox::from_xywh(
        field("x")?,
        field("y")?,
        field("w")?,
        field("h")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_prefers_predictions_over_result_image() {
        let body = br#"{
            "predictions": [{"bbox": [1, 2, 3, 4], "label": "with_mask", "confidence": 0.9}],
            "result_image": [{"bbox": [5, 6, 7, 8]}]
        }"#;
        let set = parse_upload_response(body).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].bbox, BBox::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(set.as_slice()[0].confidence, Some(0.9));
    }

    #[test]
    fn upload_falls_back_to_result_image() {
        let body = br#"{"result_image": [{"bbox": [5, 6, 7, 8], "label": "without_mask"}]}"#;
        let set = parse_upload_response(body).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].label.as_deref(), Some("without_mask"));
    }

    #[test]
    fn upload_without_arrays_is_empty() {
        let set = parse_upload_response(br#"{"predictions": "busy"}"#).unwrap();
        assert!(set.is_empty());
        let set = parse_upload_response(br#"{"message": "ok"}"#).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn stream_uses_first_present_key() {
        let msg = br#"{"detections": [{"bbox": [0.1, 0.1, 0.5, 0.5]}], "results": [{}, {}]}"#;
        let set = parse_stream_message(msg).unwrap();
        assert_eq!(set.len(), 1);

        // A present but non-array value does not fall through to later keys.
        let msg = br#"{"result_image": {"oops": true}, "predictions": [{}]}"#;
        assert!(parse_stream_message(msg).unwrap().is_empty());

        // null counts as absent.
        let msg = br#"{"result_image": null, "predictions": [{"bbox": [1, 1, 2, 2]}]}"#;
        assert_eq!(parse_stream_message(msg).unwrap().len(), 1);
    }

    #[test]
    fn xywh_entries_are_converted_to_corners() {
        let msg = br#"{"results": [{"x": 10, "y": 20, "w": 30, "h": 40, "score": 0.75, "label": "with_mask"}]}"#;
        let set = parse_stream_message(msg).unwrap();
        let det = &set.as_slice()[0];
        assert_eq!(det.bbox, BBox::new(10.0, 20.0, 40.0, 60.0));
        assert_eq!(det.confidence, Some(0.75));
    }

    #[test]
    fn unusable_boxes_become_zero_boxes() {
        let msg = br#"{"predictions": [{"bbox": [1, 2, 3], "label": "without_mask"}, 7]}"#;
        let set = parse_stream_message(msg).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].bbox, BBox::default());
        assert_eq!(set.as_slice()[0].label.as_deref(), Some("without_mask"));
    }

    #[test]
    fn empty_label_is_no_label() {
        let msg = br#"{"predictions": [{"bbox": [1, 1, 2, 2], "label": ""}]}"#;
        let set = parse_stream_message(msg).unwrap();
        assert_eq!(set.as_slice()[0].label, None);
    }

    #[test]
    fn explicit_normalized_flag_is_kept() {
        let msg = br#"{"predictions": [{"bbox": [0, 0, 1, 1], "normalized": false}]}"#;
        let set = parse_stream_message(msg).unwrap();
        assert!(!set.as_slice()[0].is_normalized());
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(
            parse_stream_message(b"not json"),
            Err(ParseError::Json(_))
        ));
        assert!(matches!(
            parse_stream_message(b"[1, 2]"),
            Err(ParseError::NotAnObject)
        ));
        assert!(matches!(
            parse_stream_message(&[0xff, 0xfe]),
            Err(ParseError::Utf8(_))
        ));
    }
}
