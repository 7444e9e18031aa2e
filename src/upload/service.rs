use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use super::file::UploadFile;
use crate::config::ClientConfig;
use crate::detect::{parse_upload_response, DetectionSet};

/// Name of the single multipart form field carrying the file.
pub const FORM_FIELD: &str = "file";

/// One-shot inference on a still image.
pub trait DetectService {
    fn detect(&self, file: &UploadFile) -> Result<DetectionSet>;
}

/// Posts the file as `multipart/form-data` to `<api_url>/detect`.
pub struct HttpDetectService {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpDetectService {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.detect_endpoint(), config.upload.timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl DetectService for HttpDetectService {
    fn detect(&self, file: &UploadFile) -> Result<DetectionSet> {
        let boundary = format!("------------------------maskwatch{:016x}", rand::random::<u64>());
        let body = multipart_body(&boundary, file);
        log::debug!("POST {} ({} bytes)", self.endpoint, body.len());

        let response = match self
            .agent
            .post(&self.endpoint)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                return Err(anyhow!("server error: {} {}", code, response.status_text()));
            }
            Err(err) => {
                return Err(anyhow::Error::new(err))
                    .with_context(|| format!("request to {}", self.endpoint));
            }
        };

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .context("read detection response")?;

        // A body that is not JSON counts as "no detections".
        match parse_upload_response(&bytes) {
            Ok(set) => Ok(set),
            Err(err) => {
                log::warn!("detection response parse error: {}", err);
                Ok(DetectionSet::empty())
            }
        }
    }
}

fn multipart_body(boundary: &str, file: &UploadFile) -> Vec<u8> {
    let filename = file.name.replace('"', "%22").replace(['\r', '\n'], " ");
    let mut body = Vec::with_capacity(file.bytes.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            FORM_FIELD, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
    body.extend_from_slice(&file.bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_body_has_single_file_field() {
        let file = UploadFile::new("my \"face\".png", "image/png", vec![0xde, 0xad]);
        let body = multipart_body("XYZ", &file);
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with("--XYZ\r\n"));
        assert!(text.contains("name=\"file\"; filename=\"my %22face%22.png\""));
        assert!(text.contains("Content-Type: image/png\r\n\r\n"));
        assert!(text.ends_with("\r\n--XYZ--\r\n"));
        assert_eq!(text.matches("Content-Disposition").count(), 1);
    }
}
