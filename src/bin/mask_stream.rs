//! mask_stream - Stream camera frames to the detection service.
//!
//! Sends a JPEG frame every `frame_interval` over `<ws_url>/ws`, applies
//! detection messages as they arrive and reconnects after the configured
//! delay whenever the socket closes. Runs until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use maskwatch::ingest::open_source;
use maskwatch::overlay::{OverlayRenderer, OverlayStyle, OverlayView, Size};
use maskwatch::stream::{SessionSettings, StreamEvent, StreamSession, WsTransport};
use maskwatch::ClientConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Stream camera frames to a remote mask detection service"
)]
struct Args {
    /// Frame source: stub://name, an image file or directory, or /dev/videoN.
    #[arg(long, env = "MASK_SOURCE", default_value = "stub://camera")]
    source: String,

    /// Rewrite this PNG with the latest frame and overlay on every new result.
    #[arg(long)]
    overlay_out: Option<PathBuf>,

    /// Displayed size for the overlay, e.g. 1280x720.
    #[arg(long, default_value = "640x480")]
    display: Size,

    /// Stop after sending this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Socket poll window in milliseconds.
    #[arg(long, env = "MASK_READ_TIMEOUT_MS", default_value = "20")]
    read_timeout_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = ClientConfig::load()?;
    let mut settings = SessionSettings::from_config(&cfg);
    settings.max_frames = args.max_frames;
    log::info!(
        "streaming {} to {} every {} ms",
        args.source,
        settings.endpoint,
        settings.frame_interval.as_millis()
    );

    let source = open_source(&args.source)?;
    let renderer = OverlayRenderer::from_font_path(cfg.font_path.as_deref())?;
    let overlay = OverlayView::new(OverlayStyle::live(), renderer, args.display);
    let transport = WsTransport::new(Duration::from_millis(args.read_timeout_ms.max(1)));
    let mut session = StreamSession::new(settings, source, Box::new(transport), overlay);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("install Ctrl-C handler")?;

    let overlay_out = args.overlay_out.clone();
    session.run(&shutdown, |session, event| match event {
        StreamEvent::Status(status) => match status.banner.as_deref() {
            Some(banner) => log::warn!("[{}] {}", status.state, banner),
            None => log::info!("[{}] connected={}", status.state, status.connected),
        },
        StreamEvent::Detections { set, stats } => {
            log::info!("{} detections: {}", set.len(), stats);
            if let Some(path) = overlay_out.as_deref() {
                if let Err(err) = write_overlay(session, path) {
                    log::warn!("overlay write failed: {:#}", err);
                }
            }
        }
        StreamEvent::FramesPerSecond(fps) => log::info!("{} fps", fps),
    })?;

    log::info!("mask_stream stopped after {} frames", session.frames_sent());
    Ok(())
}

fn write_overlay(session: &mut StreamSession, path: &Path) -> Result<()> {
    let Some(frame) = session.last_frame().and_then(|frame| frame.to_image()) else {
        return Ok(());
    };
    session
        .overlay_mut()
        .composite(&DynamicImage::ImageRgb8(frame))
        .save(path)
        .with_context(|| format!("write overlay to {}", path.display()))
}
