//! Live-stream pipeline: camera → socket → detections → overlay.

mod fps;
mod session;
mod state;
mod transport;

pub use fps::FpsCounter;
pub use session::{
    SessionSettings, StreamEvent, StreamSession, StreamStatus, BANNER_CAMERA_UNAVAILABLE,
    BANNER_CONNECTION_ERROR, BANNER_RECONNECTING, MAX_QUEUED_EVENTS,
};
pub use state::{ConnectionState, ReconnectPolicy};
pub use transport::{Connection, Inbound, Poll, Transport, WsTransport};
