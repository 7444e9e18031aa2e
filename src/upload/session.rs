//! Still-image flow: pick a file, validate it, preview it, ask the service
//! for detections, keep everything around for the overlay until reset.

use image::{DynamicImage, GenericImageView};

use super::file::UploadFile;
use super::service::DetectService;
use super::validate::{validate_upload, UploadRejection};
use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::detect::{DetectionSet, LabelStats};
use crate::overlay::Size;

/// Local preview of the last accepted file.
#[derive(Clone, Debug)]
pub struct Preview {
    pub name: String,
    /// Zero when the bytes could not be decoded locally.
    pub natural: Size,
    pub image: Option<DynamicImage>,
}

impl Preview {
    fn from_file(file: &UploadFile) -> Self {
        match image::load_from_memory(&file.bytes) {
            Ok(image) => {
                let (width, height) = image.dimensions();
                Self {
                    name: file.name.clone(),
                    natural: Size::new(width, height),
                    image: Some(image),
                }
            }
            Err(err) => {
                log::debug!("preview decode failed for {}: {}", file.name, err);
                Self {
                    name: file.name.clone(),
                    natural: Size::default(),
                    image: None,
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Refused locally; no request was made.
    Rejected(UploadRejection),
    /// The request failed; the preview stays for a retry.
    Failed,
    /// Number of detections received.
    Detected(usize),
}

#[derive(Debug)]
pub struct UploadSession {
    max_bytes: u64,
    preview: Option<Preview>,
    detections: DetectionSet,
    error: Option<String>,
    loading: bool,
    input_cleared: bool,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl UploadSession {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            preview: None,
            detections: DetectionSet::empty(),
            error: None,
            loading: false,
            input_cleared: true,
        }
    }

    pub fn submit(&mut self, file: UploadFile, service: &dyn DetectService) -> SubmitOutcome {
        if let Err(rejection) = validate_upload(&file, self.max_bytes) {
            log::warn!("upload rejected: {}", rejection);
            self.error = Some(rejection.to_string());
            return SubmitOutcome::Rejected(rejection);
        }

        self.error = None;
        self.detections = DetectionSet::empty();
        self.input_cleared = false;
        self.preview = Some(Preview::from_file(&file));
        self.loading = true;

        let outcome = match service.detect(&file) {
            Ok(set) => {
                let n = set.len();
                log::info!("{}: {} detections", file.name, n);
                self.detections = set;
                SubmitOutcome::Detected(n)
            }
            Err(err) => {
                log::error!("upload error: {:#}", err);
                self.error = Some(format!("cannot reach the detection service: {:#}", err));
                SubmitOutcome::Failed
            }
        };
        self.loading = false;
        outcome
    }

    /// Clears preview, detections, error and file selection.
    pub fn reset(&mut self) {
        self.preview = None;
        self.detections = DetectionSet::empty();
        self.error = None;
        self.loading = false;
        self.input_cleared = true;
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn detections(&self) -> &DetectionSet {
        &self.detections
    }

    pub fn stats(&self) -> LabelStats {
        LabelStats::tally(&self.detections)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn input_cleared(&self) -> bool {
        self.input_cleared
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }
}
