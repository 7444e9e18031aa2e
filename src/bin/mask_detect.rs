//! mask_detect - Run one still image through the detection service.
//!
//! Validates the file locally, posts it to `<api_url>/detect`, prints the
//! per-label counts and optionally writes the image with the overlay drawn
//! on top.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use maskwatch::overlay::{OverlayRenderer, OverlayStyle, OverlayView, Size};
use maskwatch::upload::{HttpDetectService, SubmitOutcome, UploadFile, UploadSession};
use maskwatch::ClientConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Detect face masks in a still image using a remote detection service"
)]
struct Args {
    /// Image file to analyse.
    image: PathBuf,

    /// Write the image with detection boxes drawn over it (PNG).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Displayed size for the overlay, e.g. 800x600. Defaults to the image size.
    #[arg(long)]
    display: Option<Size>,

    /// Print the detections as JSON.
    #[arg(long)]
    json: bool,

    /// Detection service base URL (overrides MASK_API_URL and the config file).
    #[arg(long)]
    api_url: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = ClientConfig::load()?;
    if let Some(api_url) = args.api_url.as_deref() {
        cfg.api_url = api_url.trim().trim_end_matches('/').to_string();
    }
    log::info!("detect endpoint: {}", cfg.detect_endpoint());

    let service = HttpDetectService::from_config(&cfg);
    let mut session = UploadSession::new(cfg.upload.max_bytes);
    let file = UploadFile::from_path(&args.image)?;

    match session.submit(file, &service) {
        SubmitOutcome::Rejected(rejection) => return Err(anyhow!(rejection)),
        SubmitOutcome::Failed => {
            return Err(anyhow!(session
                .error()
                .unwrap_or("detection request failed")
                .to_string()))
        }
        SubmitOutcome::Detected(n) => log::info!("{} detections", n),
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(session.detections())?);
    } else {
        for det in session.detections() {
            let b = det.bbox;
            println!(
                "{:<22} {:>4.0}%  [{:.0}, {:.0}, {:.0}, {:.0}]",
                det.mask_label().as_str(),
                det.confidence.unwrap_or(0.0) * 100.0,
                b.x1,
                b.y1,
                b.x2,
                b.y2
            );
        }
    }
    println!("{}", session.stats());

    if let Some(out) = args.out.as_deref() {
        let preview = session
            .preview()
            .ok_or_else(|| anyhow!("no preview available"))?;
        let image = preview
            .image
            .as_ref()
            .ok_or_else(|| anyhow!("{} could not be decoded for drawing", preview.name))?;
        let display = args.display.unwrap_or(preview.natural);
        let renderer = OverlayRenderer::from_font_path(cfg.font_path.as_deref())?;
        let mut view = OverlayView::new(OverlayStyle::still(), renderer, display);
        view.set_natural_size(preview.natural);
        view.set_detections(session.detections().clone());
        view.composite(image)
            .save(out)
            .with_context(|| format!("write overlay to {}", out.display()))?;
        log::info!("overlay written to {}", out.display());
    }

    Ok(())
}
