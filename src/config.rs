use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::stream::ReconnectPolicy;

pub const DEFAULT_API_URL: &str = "https://mask-face-detection.onrender.com";
const DEFAULT_FRAME_INTERVAL_MS: u64 = 200;
const DEFAULT_JPEG_QUALITY: u8 = crate::frame::DEFAULT_JPEG_QUALITY;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1_000;
const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;
const DEFAULT_BACKOFF_ATTEMPTS: u32 = 10;
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct ClientConfigFile {
    api_url: Option<String>,
    ws_url: Option<String>,
    font_path: Option<PathBuf>,
    upload: Option<UploadConfigFile>,
    stream: Option<StreamConfigFile>,
    reconnect: Option<ReconnectConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct UploadConfigFile {
    max_bytes: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    frame_interval_ms: Option<u64>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct ReconnectConfigFile {
    /// "fixed" (default) or "backoff".
    mode: Option<String>,
    #[serde(alias = "initial_ms")]
    delay_ms: Option<u64>,
    max_ms: Option<u64>,
    max_attempts: Option<u32>,
}

/// Client settings shared by both pipelines.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the detection service, without the `/detect` suffix.
    pub api_url: String,
    /// Base URL of the streaming socket, without the `/ws` suffix.
    pub ws_url: String,
    pub upload: UploadSettings,
    pub stream: StreamSettings,
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_bytes: u64,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub frame_interval: Duration,
    /// 1..=100
    pub jpeg_quality: u8,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        // An empty file layer always resolves.
        Self::from_file(ClientConfigFile::default())
    }
}

impl ClientConfig {
    /// Defaults, then the TOML file named by `MASK_CONFIG`, then environment
    /// overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("MASK_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ClientConfigFile) -> Self {
        let api_url = file
            .api_url
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let ws_url = file.ws_url.unwrap_or_else(|| derive_ws_url(&api_url));
        let upload = UploadSettings {
            max_bytes: file
                .upload
                .as_ref()
                .and_then(|upload| upload.max_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            timeout: Duration::from_secs(
                file.upload
                    .as_ref()
                    .and_then(|upload| upload.timeout_secs)
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        };
        let reconnect = reconnect_from_file(file.reconnect.unwrap_or_default());
        let stream = StreamSettings {
            frame_interval: Duration::from_millis(
                file.stream
                    .as_ref()
                    .and_then(|stream| stream.frame_interval_ms)
                    .unwrap_or(DEFAULT_FRAME_INTERVAL_MS),
            ),
            jpeg_quality: file
                .stream
                .as_ref()
                .and_then(|stream| stream.jpeg_quality)
                .unwrap_or(DEFAULT_JPEG_QUALITY),
            reconnect,
        };
        Self {
            api_url,
            ws_url,
            upload,
            stream,
            font_path: file.font_path,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        // NEXT_PUBLIC_API_URL is honoured for deployments that share an env
        // file with the web front end; MASK_API_URL wins when both are set.
        let api_override = env_non_empty("MASK_API_URL").or_else(|| env_non_empty("NEXT_PUBLIC_API_URL"));
        let ws_override = env_non_empty("MASK_WS_URL");
        if let Some(api) = api_override {
            if ws_override.is_none() && self.ws_url == derive_ws_url(&self.api_url) {
                self.ws_url = derive_ws_url(&api);
            }
            self.api_url = api;
        }
        if let Some(ws) = ws_override {
            self.ws_url = ws;
        }
        if let Some(path) = env_non_empty("MASK_FONT_PATH") {
            self.font_path = Some(PathBuf::from(path));
        }
        if let Some(ms) = env_non_empty("MASK_FRAME_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| anyhow!("MASK_FRAME_INTERVAL_MS must be an integer number of milliseconds"))?;
            self.stream.frame_interval = Duration::from_millis(ms);
        }
        if let Some(quality) = env_non_empty("MASK_JPEG_QUALITY") {
            self.stream.jpeg_quality = quality
                .parse()
                .map_err(|_| anyhow!("MASK_JPEG_QUALITY must be an integer between 1 and 100"))?;
        }
        if let Some(ms) = env_non_empty("MASK_RECONNECT_DELAY_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| anyhow!("MASK_RECONNECT_DELAY_MS must be an integer number of milliseconds"))?;
            self.stream.reconnect = self.stream.reconnect.with_delay(Duration::from_millis(ms));
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.api_url = trim_base(&self.api_url);
        self.ws_url = trim_base(&self.ws_url);
        check_url(&self.api_url, "api_url", &["http", "https"])?;
        check_url(&self.ws_url, "ws_url", &["ws", "wss"])?;
        if cfg!(not(feature = "ws-tls")) && self.ws_url.to_ascii_lowercase().starts_with("wss://") {
            return Err(anyhow!(
                "ws_url {} needs TLS, but this build lacks the ws-tls feature",
                self.ws_url
            ));
        }

        if self.stream.frame_interval.is_zero() {
            return Err(anyhow!("frame interval must be greater than zero"));
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(anyhow!(
                "jpeg quality must be between 1 and 100, got {}",
                self.stream.jpeg_quality
            ));
        }
        if self.upload.max_bytes == 0 {
            return Err(anyhow!("upload size limit must be greater than zero"));
        }
        if let ReconnectPolicy::Backoff { max_attempts: 0, .. } = self.stream.reconnect {
            return Err(anyhow!("reconnect max_attempts must be greater than zero"));
        }
        Ok(())
    }

    /// `POST` target for still images.
    pub fn detect_endpoint(&self) -> String {
        format!("{}/detect", trim_base(&self.api_url))
    }

    /// Socket target for the live stream.
    pub fn stream_endpoint(&self) -> String {
        format!("{}/ws", trim_base(&self.ws_url))
    }
}

/// `http(s)://host` → `ws(s)://host`; anything else is returned unchanged.
pub fn derive_ws_url(api_url: &str) -> String {
    let api_url = api_url.trim();
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        api_url.to_string()
    }
}

fn reconnect_from_file(file: ReconnectConfigFile) -> ReconnectPolicy {
    let delay = Duration::from_millis(file.delay_ms.unwrap_or(DEFAULT_RECONNECT_DELAY_MS));
    match file.mode.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("backoff") => ReconnectPolicy::Backoff {
            initial: delay,
            max: Duration::from_millis(file.max_ms.unwrap_or(DEFAULT_BACKOFF_MAX_MS)),
            max_attempts: file.max_attempts.unwrap_or(DEFAULT_BACKOFF_ATTEMPTS),
        },
        Some("fixed") | None => ReconnectPolicy::Fixed { delay },
        Some(other) => {
            log::warn!("unknown reconnect mode '{}', using fixed delay", other);
            ReconnectPolicy::Fixed { delay }
        }
    }
}

fn read_config_file(path: &Path) -> Result<ClientConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn trim_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn check_url(value: &str, field: &str, schemes: &[&str]) -> Result<()> {
    if value.is_empty() {
        return Err(anyhow!("{} must not be empty", field));
    }
    let url = Url::parse(value).with_context(|| format!("{} is not a valid URL: {}", field, value))?;
    if !schemes.contains(&url.scheme()) {
        return Err(anyhow!(
            "{} must use one of {:?}, got '{}'",
            field,
            schemes,
            url.scheme()
        ));
    }
    Ok(())
}
