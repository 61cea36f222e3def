//! The media service the client drives, and its HTTP implementation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, Url, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Result, SessionError};
use crate::model::{
    AUDIO_ONLY_LABEL, DownloadJob, DownloadProgress, DownloadRequest, QualityKind, QualityOption,
    VideoInfo, VideoQueryRequest,
};

pub const INFO_FAILED: &str = "Failed to fetch video information";
pub const START_FAILED: &str = "Failed to start download";
pub const PROGRESS_FAILED: &str = "Failed to get download progress";
pub const FILE_FAILED: &str = "Failed to download file";

#[async_trait]
pub trait MediaBackend: Send + Sync {
    async fn query_video_info(&self, url: &str) -> Result<VideoInfo>;
    async fn create_download_job(&self, url: &str, quality: &str) -> Result<DownloadJob>;
    async fn query_progress(&self, job_id: &str) -> Result<DownloadProgress>;
    /// Streams the finished file into `dest_dir` and returns where it landed.
    async fn retrieve_file(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Deserialize)]
struct InfoEnvelope {
    #[serde(default)]
    success: bool,
    video_info: Option<WireVideoInfo>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireVideoInfo {
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    thumbnail: Option<String>,
    #[serde(default)]
    available_qualities: Vec<WireQuality>,
}

#[derive(Debug, Deserialize)]
struct WireQuality {
    quality: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    #[serde(default)]
    success: bool,
    download_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl From<WireQuality> for QualityOption {
    fn from(wire: WireQuality) -> Self {
        let is_audio = wire.kind.as_deref() == Some("audio") || wire.quality == AUDIO_ONLY_LABEL;
        QualityOption {
            label: wire.quality,
            kind: if is_audio {
                QualityKind::Audio
            } else {
                QualityKind::Video
            },
        }
    }
}

impl From<WireVideoInfo> for VideoInfo {
    fn from(wire: WireVideoInfo) -> Self {
        VideoInfo {
            title: non_blank(wire.title).unwrap_or_else(|| "Unknown Title".to_string()),
            uploader: non_blank(wire.uploader).unwrap_or_else(|| "Unknown".to_string()),
            duration: wire
                .duration
                .filter(|d| d.is_finite() && *d >= 1.0)
                .map(|d| d as u64),
            view_count: wire.view_count.filter(|v| *v > 0),
            thumbnail_url: wire.thumbnail.unwrap_or_default(),
            available_qualities: wire
                .available_qualities
                .into_iter()
                .map(QualityOption::from)
                .collect(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn backend_error(message: Option<String>, fallback: &str) -> SessionError {
    SessionError::backend(non_blank(message).unwrap_or_else(|| fallback.to_string()))
}

/// Talks to the service over its JSON API.
pub struct HttpBackend {
    client: Client,
    base: Url,
    /// Whole-request limit for the JSON calls. The file transfer is exempt.
    json_timeout: Option<Duration>,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // No client-wide total timeout: it would also cap the file body.
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;
        let mut backend = Self::with_client(client, &config.backend_url)?;
        backend.json_timeout = Some(config.request_timeout());
        Ok(backend)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| SessionError::InvalidBackendUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(SessionError::InvalidBackendUrl(base_url.to_string()));
        }
        Ok(Self {
            client,
            base,
            json_timeout: None,
        })
    }

    fn json_request(&self, request: RequestBuilder) -> RequestBuilder {
        match self.json_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SessionError::InvalidBackendUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Decodes a JSON reply; a non-2xx status becomes a backend error carrying the body's `error`.
    async fn read_json<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.ok();
            warn!("backend replied status={} ({})", status.as_u16(), fallback);
            return Err(backend_error(body.and_then(|b| b.error), fallback));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MediaBackend for HttpBackend {
    async fn query_video_info(&self, url: &str) -> Result<VideoInfo> {
        let endpoint = self.endpoint(&["api", "video-info"])?;
        debug!("querying video info url={}", url);
        let request = self.client.post(endpoint).json(&VideoQueryRequest {
            url: url.to_string(),
        });
        let response = self.json_request(request).send().await?;

        let envelope: InfoEnvelope = Self::read_json(response, INFO_FAILED).await?;
        match envelope {
            InfoEnvelope {
                success: true,
                video_info: Some(info),
                ..
            } => Ok(info.into()),
            InfoEnvelope { error, .. } => Err(backend_error(error, INFO_FAILED)),
        }
    }

    async fn create_download_job(&self, url: &str, quality: &str) -> Result<DownloadJob> {
        let endpoint = self.endpoint(&["api", "download"])?;
        let request = self.client.post(endpoint).json(&DownloadRequest {
            url: url.to_string(),
            quality: quality.to_string(),
        });
        let response = self.json_request(request).send().await?;

        let envelope: JobEnvelope = Self::read_json(response, START_FAILED).await?;
        match envelope {
            JobEnvelope {
                success: true,
                download_id: Some(id),
                ..
            } if !id.is_empty() => {
                info!("download job created id={} quality={}", id, quality);
                Ok(DownloadJob {
                    id,
                    source_url: url.to_string(),
                    requested_quality: quality.to_string(),
                })
            }
            JobEnvelope { error, .. } => Err(backend_error(error, START_FAILED)),
        }
    }

    async fn query_progress(&self, job_id: &str) -> Result<DownloadProgress> {
        let endpoint = self.endpoint(&["api", "download-progress", job_id])?;
        let response = self.json_request(self.client.get(endpoint)).send().await?;
        Self::read_json(response, PROGRESS_FAILED).await
    }

    async fn retrieve_file(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        let endpoint = self.endpoint(&["api", "download-file", job_id])?;
        let mut response = self.client.get(endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.ok();
            warn!("file retrieval failed id={} status={}", job_id, status.as_u16());
            return Err(backend_error(body.and_then(|b| b.error), FILE_FAILED));
        }

        let headers = response.headers();
        let name = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .unwrap_or_else(|| {
                let content_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                format!("{}.{}", job_id, extension_for(content_type))
            });

        tokio::fs::create_dir_all(dest_dir).await?;
        // Declared before the file handle so the handle closes first on drop.
        let mut part = PartFile::new(unique_path(dest_dir, &format!("{}.part", name)));
        let mut file = tokio::fs::File::create(&part.path).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        let path = unique_path(dest_dir, &name);
        tokio::fs::rename(&part.path, &path).await?;
        part.keep();

        info!("saved job {} to {} ({} bytes)", job_id, path.display(), written);
        Ok(path)
    }
}

/// In-progress download. Removed on drop unless kept, so an error or an
/// aborted task never leaves a truncated file behind.
struct PartFile {
    path: PathBuf,
    kept: bool,
}

impl PartFile {
    fn new(path: PathBuf) -> Self {
        Self { path, kept: false }
    }

    fn keep(&mut self) {
        self.kept = true;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed partial download {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("could not remove {}: {}", self.path.display(), e),
        }
    }
}

static FILENAME_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:^|;)\s*filename\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^;]*))"#)
        .expect("content-disposition pattern compiles")
});

static QUOTED_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(.)").expect("quoted-pair pattern compiles"));

/// Plain `filename=` parameter of a Content-Disposition header, reduced to its last path component.
pub fn attachment_filename(disposition: &str) -> Option<String> {
    let caps = FILENAME_PARAM.captures(disposition)?;
    let raw = match (caps.get(1), caps.get(2)) {
        (Some(quoted), _) => QUOTED_PAIR.replace_all(quoted.as_str(), "$1"),
        (None, Some(token)) => token.as_str().into(),
        (None, None) => return None,
    };
    let name = raw.trim().rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime {
        "audio/mpeg" => "mp3",
        "audio/m4a" | "audio/mp4" => "m4a",
        _ => "mp4",
    }
}

/// `dir/name`, or `dir/stem (n).ext` when that already exists.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}
