//! Live-stream session.
//!
//! One `StreamSession` owns everything the live view needs: the camera
//! source, the socket, the overlay and the status shown to the user. It runs
//! on a single cooperative loop; [`StreamSession::step`] performs one turn
//! (reconnect if due, drain inbound messages, send a frame if due) and never
//! blocks longer than the transport's poll window.
//!
//! Detection results are applied as they arrive, decoupled from the send
//! cadence, and always replace the previous set.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use super::fps::FpsCounter;
use super::state::{ConnectionState, ReconnectPolicy};
use super::transport::{Connection, Inbound, Poll, Transport};
use crate::config::ClientConfig;
use crate::detect::{parse_stream_message, DetectionSet, LabelStats};
use crate::frame::{Frame, FrameMessage};
use crate::ingest::FrameSource;
use crate::overlay::OverlayView;

/// Upper bound on messages handled per turn so sending keeps its cadence.
const MAX_MESSAGES_PER_STEP: usize = 32;
/// Longest idle sleep in [`StreamSession::run`], so shutdown stays responsive.
const MAX_IDLE_SLEEP: Duration = Duration::from_millis(50);
/// Undrained events beyond this drop the oldest first.
pub const MAX_QUEUED_EVENTS: usize = 256;

pub const BANNER_RECONNECTING: &str = "connection lost, reconnecting...";
pub const BANNER_CONNECTION_ERROR: &str = "connection error, reconnecting...";
pub const BANNER_CAMERA_UNAVAILABLE: &str = "camera unavailable, check the device and its permissions";

#[derive(Clone, Debug)]
pub struct SessionSettings {
    /// Full socket URL, including `/ws`.
    pub endpoint: String,
    pub frame_interval: Duration,
    pub jpeg_quality: u8,
    pub reconnect: ReconnectPolicy,
    /// Stop `run` after this many frames have been sent.
    pub max_frames: Option<u64>,
}

impl SessionSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.stream_endpoint(),
            frame_interval: config.stream.frame_interval,
            jpeg_quality: config.stream.jpeg_quality,
            reconnect: config.stream.reconnect,
            max_frames: None,
        }
    }
}

/// What the status bar shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamStatus {
    pub state: ConnectionState,
    pub connected: bool,
    /// Transient message such as "reconnecting".
    pub banner: Option<String>,
    pub fps: u32,
    /// Consecutive closes since the last successful open.
    pub failures: u32,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed,
            connected: false,
            banner: None,
            fps: 0,
            failures: 0,
        }
    }
}

/// Notifications for whatever presents the session.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    Status(StreamStatus),
    Detections {
        set: DetectionSet,
        stats: LabelStats,
    },
    FramesPerSecond(u32),
}

pub struct StreamSession {
    settings: SessionSettings,
    source: Box<dyn FrameSource>,
    transport: Box<dyn Transport>,
    connection: Option<Box<dyn Connection>>,
    overlay: OverlayView,
    status: StreamStatus,
    detections: DetectionSet,
    stats: LabelStats,
    fps: FpsCounter,
    last_frame: Option<Frame>,
    frames_sent: u64,
    /// Frame timer; armed only while the socket is open.
    next_frame_at: Option<Instant>,
    /// Pending reconnection.
    reconnect_at: Option<Instant>,
    mounted: bool,
    torn_down: bool,
    events: VecDeque<StreamEvent>,
}

impl StreamSession {
    pub fn new(
        settings: SessionSettings,
        source: Box<dyn FrameSource>,
        transport: Box<dyn Transport>,
        overlay: OverlayView,
    ) -> Self {
        Self {
            settings,
            source,
            transport,
            connection: None,
            overlay,
            status: StreamStatus::default(),
            detections: DetectionSet::empty(),
            stats: LabelStats::default(),
            fps: FpsCounter::new(Instant::now()),
            last_frame: None,
            frames_sent: 0,
            next_frame_at: None,
            reconnect_at: None,
            mounted: false,
            torn_down: false,
            events: VecDeque::new(),
        }
    }

    /// Acquires the camera, then opens the first connection.
    ///
    /// A camera failure is surfaced in the status and returned; no connection
    /// is attempted in that case.
    pub fn mount(&mut self, now: Instant) -> Result<()> {
        if self.mounted || self.torn_down {
            return Ok(());
        }
        if let Err(err) = self.source.connect() {
            log::error!("camera error: {:#}", err);
            self.status.banner = Some(BANNER_CAMERA_UNAVAILABLE.to_string());
            self.push_status();
            return Err(err).context("start camera");
        }
        self.mounted = true;
        self.fps.reset(now);
        self.open_connection(now);
        Ok(())
    }

    /// One loop turn. Events it raises queue up until [`Self::drain_events`]
    /// is called (`run` drains after every turn); callers that drive `step`
    /// directly must drain too, or only the newest [`MAX_QUEUED_EVENTS`]
    /// are kept.
    pub fn step(&mut self, now: Instant) {
        if !self.mounted {
            return;
        }
        if self.reconnect_at.is_some_and(|at| now >= at) {
            self.reconnect_at = None;
            self.open_connection(now);
        }
        if self.status.state == ConnectionState::Open {
            self.drain_inbound(now);
        }
        if self.status.state == ConnectionState::Open && self.next_frame_at.is_some_and(|at| now >= at) {
            self.next_frame_at = Some(now + self.settings.frame_interval);
            self.send_frame(now);
        }
    }

    /// Earliest instant at which `step` has timed work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.next_frame_at, self.reconnect_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Mounts, then loops until `shutdown` is raised, the frame limit is
    /// reached or the policy gives up, and finally tears down. Every event is
    /// handed to `observer` as soon as the turn that produced it ends.
    pub fn run<F>(&mut self, shutdown: &AtomicBool, mut observer: F) -> Result<()>
    where
        F: FnMut(&mut StreamSession, StreamEvent),
    {
        let mounted = self.mount(Instant::now());
        self.deliver(&mut observer);
        mounted?;
        while !shutdown.load(Ordering::SeqCst) {
            let now = Instant::now();
            self.step(now);
            self.deliver(&mut observer);
            if self.status.state == ConnectionState::GaveUp {
                break;
            }
            if self
                .settings
                .max_frames
                .is_some_and(|max| self.frames_sent >= max)
            {
                log::info!("frame limit of {} reached", self.frames_sent);
                break;
            }
            // While open, the transport's poll window paces the loop.
            if self.status.state != ConnectionState::Open {
                let wait = self
                    .next_deadline()
                    .map(|at| at.saturating_duration_since(Instant::now()))
                    .unwrap_or(MAX_IDLE_SLEEP)
                    .min(MAX_IDLE_SLEEP);
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
            }
        }
        self.teardown();
        self.deliver(&mut observer);
        Ok(())
    }

    fn deliver<F>(&mut self, observer: &mut F)
    where
        F: FnMut(&mut StreamSession, StreamEvent),
    {
        let events: Vec<_> = self.events.drain(..).collect();
        for event in events {
            observer(self, event);
        }
    }

    /// Clears the frame timer and any pending reconnect, closes the socket
    /// and stops the camera. Every later call on the session is a no-op.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.mounted = false;
        self.next_frame_at = None;
        self.reconnect_at = None;
        if let Some(mut conn) = self.connection.take() {
            conn.close();
        }
        self.source.stop();
        if self.status.state != ConnectionState::GaveUp {
            self.status.state = ConnectionState::Closed;
        }
        self.status.connected = false;
        self.push_status();
        log::info!(
            "stream session torn down after {} frames sent ({} captured from {})",
            self.frames_sent,
            self.source.stats().frames_captured,
            self.source.name()
        );
    }

    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state
    }

    pub fn detections(&self) -> &DetectionSet {
        &self.detections
    }

    pub fn stats(&self) -> &LabelStats {
        &self.stats
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn overlay(&self) -> &OverlayView {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlayView {
        &mut self.overlay
    }

    /// Most recent frame that was sent, for compositing.
    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<StreamEvent> {
        self.events.drain(..).collect()
    }

    fn open_connection(&mut self, now: Instant) {
        self.status.state = ConnectionState::Connecting;
        self.push_status();
        log::info!("connecting to {}", self.settings.endpoint);
        match self.transport.connect(&self.settings.endpoint) {
            Ok(conn) => self.on_open(now, conn),
            Err(err) => {
                log::warn!("websocket connect failed: {:#}", err);
                self.status.banner = Some(BANNER_CONNECTION_ERROR.to_string());
                self.on_closed(now);
            }
        }
    }

    fn on_open(&mut self, now: Instant, conn: Box<dyn Connection>) {
        self.connection = Some(conn);
        self.status.state = ConnectionState::Open;
        self.status.connected = true;
        self.status.banner = None;
        self.status.failures = 0;
        self.next_frame_at = Some(now + self.settings.frame_interval);
        log::info!("connected to {}", self.settings.endpoint);
        self.push_status();
    }

    fn on_closed(&mut self, now: Instant) {
        if let Some(mut conn) = self.connection.take() {
            conn.close();
        }
        self.next_frame_at = None;
        self.status.connected = false;
        self.status.failures = self.status.failures.saturating_add(1);
        match self.settings.reconnect.delay_for(self.status.failures) {
            Some(delay) => {
                self.status.state = ConnectionState::Closed;
                if self.status.banner.is_none() {
                    self.status.banner = Some(BANNER_RECONNECTING.to_string());
                }
                self.reconnect_at = Some(now + delay);
                log::warn!(
                    "connection closed; reconnecting in {} ms (attempt {})",
                    delay.as_millis(),
                    self.status.failures
                );
            }
            None => {
                self.status.state = ConnectionState::GaveUp;
                self.status.banner = Some(format!(
                    "could not reach the detection service after {} attempts",
                    self.status.failures
                ));
                self.reconnect_at = None;
                log::error!(
                    "giving up on {} after {} attempts",
                    self.settings.endpoint,
                    self.status.failures
                );
            }
        }
        self.push_status();
    }

    fn drain_inbound(&mut self, now: Instant) {
        for _ in 0..MAX_MESSAGES_PER_STEP {
            let Some(conn) = self.connection.as_mut() else {
                return;
            };
            match conn.poll() {
                Ok(Poll::Message(inbound)) => self.handle_message(&inbound),
                Ok(Poll::Idle) => return,
                Ok(Poll::Closed) => {
                    self.on_closed(now);
                    return;
                }
                Err(err) => {
                    log::warn!("websocket error: {:#}", err);
                    self.status.banner = Some(BANNER_CONNECTION_ERROR.to_string());
                    self.on_closed(now);
                    return;
                }
            }
        }
    }

    /// Applies one inbound message. Malformed payloads are logged and leave
    /// the current detections untouched.
    fn handle_message(&mut self, inbound: &Inbound) {
        match parse_stream_message(inbound.as_bytes()) {
            Ok(set) => {
                self.stats = LabelStats::tally(&set);
                self.detections = set.clone();
                self.overlay.set_detections(set.clone());
                let stats = self.stats.clone();
                self.queue(StreamEvent::Detections { set, stats });
            }
            Err(err) => log::warn!("stream message parse error: {}", err),
        }
    }

    /// Samples the camera and sends the frame. A closed socket or a camera
    /// with nothing to show skips this tick silently.
    fn send_frame(&mut self, now: Instant) {
        if self.status.state != ConnectionState::Open || self.connection.is_none() {
            return;
        }
        let frame = match self.source.next_frame() {
            Ok(Some(frame)) if frame.is_ready() => frame,
            Ok(_) => return,
            Err(err) => {
                log::debug!("frame capture skipped: {:#}", err);
                return;
            }
        };
        let payload = match FrameMessage::from_frame(&frame, self.settings.jpeg_quality)
            .and_then(|msg| msg.to_json())
        {
            Ok(payload) => payload,
            Err(err) => {
                log::warn!("frame encode error: {:#}", err);
                return;
            }
        };
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        if let Err(err) = conn.send_text(&payload) {
            log::warn!("send error: {:#}", err);
            return;
        }
        self.frames_sent += 1;
        self.overlay.set_natural_size(frame.size());
        self.last_frame = Some(frame);
        if let Some(fps) = self.fps.record(now) {
            self.status.fps = fps;
            self.queue(StreamEvent::FramesPerSecond(fps));
        }
    }

    fn push_status(&mut self) {
        self.queue(StreamEvent::Status(self.status.clone()));
    }

    fn queue(&mut self, event: StreamEvent) {
        if self.events.len() >= MAX_QUEUED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
