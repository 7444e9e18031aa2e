//! maskwatch: client for a remote face-mask detection service.
//!
//! Two pipelines share one overlay renderer:
//!
//! 1. **Still image**: a file is validated locally, posted once to
//!    `<api_url>/detect`, and the returned boxes are drawn over a preview.
//! 2. **Live stream**: frames from a camera source are JPEG-encoded at a fixed
//!    cadence and pushed over a WebSocket to `<ws_url>/ws`; detection messages
//!    arrive asynchronously and replace the overlay. The socket reconnects
//!    after a delay whenever it closes.
//!
//! Detections are never computed here. Malformed responses are logged and
//! treated as "no detections"; nothing in either pipeline is fatal.
//!
//! # Module Structure
//!
//! - `config`: layered client settings (defaults, TOML file, environment)
//! - `detect`: detection model, wire parsing, per-label counts
//! - `overlay`: coordinate mapping, label tags, render-on-invalidate view
//! - `frame`: captured frames and their JPEG data-URL encoding
//! - `ingest`: camera sources (synthetic, image directory, V4L2)
//! - `upload`: still-image validation, HTTP service, session state
//! - `stream`: socket transport, reconnect policy, live session loop

pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod stream;
pub mod upload;

pub use config::ClientConfig;
pub use detect::{
    parse_stream_message, parse_upload_response, BBox, Detection, DetectionSet, LabelStats,
    MaskLabel,
};
pub use frame::{Frame, FrameMessage};
pub use ingest::{open_source, FrameSource};
pub use overlay::{OverlayRenderer, OverlayStyle, OverlayView, Size};
pub use stream::{
    ConnectionState, ReconnectPolicy, SessionSettings, StreamEvent, StreamSession, StreamStatus,
    WsTransport,
};
pub use upload::{DetectService, HttpDetectService, UploadFile, UploadSession};
