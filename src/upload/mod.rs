//! Still-image upload pipeline.

mod file;
mod service;
mod session;
mod validate;

pub use file::{content_type_for, UploadFile};
pub use service::{DetectService, HttpDetectService, FORM_FIELD};
pub use session::{Preview, SubmitOutcome, UploadSession};
pub use validate::{validate_upload, UploadRejection};
