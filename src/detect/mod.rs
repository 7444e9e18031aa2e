mod parse;
mod result;
mod stats;

pub use parse::{
    normalize_entry, parse_stream_message, parse_upload_response, ParseError, STREAM_RESULT_KEYS,
    UPLOAD_RESULT_KEYS,
};
pub use result::{
    BBox, Detection, DetectionSet, MaskLabel, LABEL_MASK_WEARED_INCORRECT, LABEL_UNKNOWN,
    LABEL_WITHOUT_MASK, LABEL_WITH_MASK,
};
pub use stats::LabelStats;
