use serde::{Deserialize, Serialize};

/// Label the backend uses for the audio-only variant.
pub const AUDIO_ONLY_LABEL: &str = "Audio Only";

/// Body of `POST /api/video-info`.
#[derive(Debug, Clone, Serialize)]
pub struct VideoQueryRequest {
    pub url: String,
}

/// Body of `POST /api/download`.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadRequest {
    pub url: String,
    pub quality: String,
}

/// Kind of output a quality option produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityKind {
    /// Muxed video (MP4)
    Video,
    /// Audio extracted to MP3
    Audio,
}

/// A selectable output variant for a video
#[derive(Debug, Clone, PartialEq)]
pub struct QualityOption {
    /// Label sent back to the backend, e.g. "720p" or "Audio Only"
    pub label: String,
    pub kind: QualityKind,
}

impl QualityOption {
    pub fn video(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: QualityKind::Video,
        }
    }

    pub fn audio(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: QualityKind::Audio,
        }
    }

    pub fn is_audio(&self) -> bool {
        self.kind == QualityKind::Audio
    }

    /// Button caption, e.g. "720p Video".
    pub fn caption(&self) -> String {
        let noun = if self.is_audio() { "Music" } else { "Video" };
        format!("{} {}", self.label, noun)
    }

    pub fn format_label(&self) -> &'static str {
        if self.is_audio() { "MP3 Format" } else { "MP4 Format" }
    }

    /// Offered when the backend lists no qualities.
    pub fn fallback_options() -> Vec<QualityOption> {
        vec![
            QualityOption::audio(AUDIO_ONLY_LABEL),
            QualityOption::video("360p"),
            QualityOption::video("480p"),
            QualityOption::video("720p"),
        ]
    }
}

/// Metadata for one source video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub title: String,
    pub uploader: String,
    /// Length in seconds, if known
    pub duration: Option<u64>,
    pub view_count: Option<u64>,
    pub thumbnail_url: String,
    pub available_qualities: Vec<QualityOption>,
}

impl VideoInfo {
    /// Options to render; never empty.
    pub fn quality_choices(&self) -> Vec<QualityOption> {
        if self.available_qualities.is_empty() {
            QualityOption::fallback_options()
        } else {
            self.available_qualities.clone()
        }
    }
}

/// A server-side download job, known by its id once created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub id: String,
    pub source_url: String,
    pub requested_quality: String,
}

/// Job status reported by the progress endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Registered but no bytes yet
    Starting,
    Downloading,
    Finished,
    Error,
    #[serde(other)]
    Unknown,
}

/// One progress report, as returned by `GET /api/download-progress/{id}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DownloadProgress {
    pub status: JobStatus,
    /// Free-form percentage, e.g. " 45.2%"
    #[serde(rename = "percent", default)]
    pub percent_text: String,
    #[serde(rename = "speed", default)]
    pub speed_text: Option<String>,
    #[serde(rename = "error", default)]
    pub error_message: Option<String>,
}

impl DownloadProgress {
    pub fn downloading(percent: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Downloading,
            percent_text: percent.into(),
            speed_text: None,
            error_message: None,
        }
    }

    pub fn finished() -> Self {
        Self {
            status: JobStatus::Finished,
            percent_text: "100%".to_string(),
            speed_text: None,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            percent_text: String::new(),
            speed_text: None,
            error_message: Some(message.into()),
        }
    }

    pub fn with_speed(mut self, speed: impl Into<String>) -> Self {
        self.speed_text = Some(speed.into());
        self
    }
}

/// Formats seconds as `H:MM:SS` or `M:SS`.
pub fn format_duration(seconds: Option<u64>) -> String {
    let Some(seconds) = seconds.filter(|s| *s > 0) else {
        return "Unknown".to_string();
    };
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Formats a view count as `1.2M views`, `3.4K views` or `57 views`.
pub fn format_views(views: Option<u64>) -> String {
    let Some(views) = views.filter(|v| *v > 0) else {
        return "Unknown".to_string();
    };
    if views >= 1_000_000 {
        format!("{:.1}M views", views as f64 / 1_000_000.0)
    } else if views >= 1_000 {
        format!("{:.1}K views", views as f64 / 1_000.0)
    } else {
        format!("{} views", views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formats() {
        assert_eq!(format_duration(None), "Unknown");
        assert_eq!(format_duration(Some(0)), "Unknown");
        assert_eq!(format_duration(Some(59)), "0:59");
        assert_eq!(format_duration(Some(212)), "3:32");
        assert_eq!(format_duration(Some(3725)), "1:02:05");
    }

    #[test]
    fn view_formats() {
        assert_eq!(format_views(None), "Unknown");
        assert_eq!(format_views(Some(999)), "999 views");
        assert_eq!(format_views(Some(1_500)), "1.5K views");
        assert_eq!(format_views(Some(2_340_000)), "2.3M views");
    }

    #[test]
    fn captions_distinguish_audio_from_video() {
        let audio = QualityOption::audio(AUDIO_ONLY_LABEL);
        assert_eq!(audio.caption(), "Audio Only Music");
        assert_eq!(audio.format_label(), "MP3 Format");

        let video = QualityOption::video("720p");
        assert_eq!(video.caption(), "720p Video");
        assert_eq!(video.format_label(), "MP4 Format");
    }

    #[test]
    fn empty_quality_list_falls_back_to_defaults() {
        let info = VideoInfo {
            title: "t".into(),
            uploader: "u".into(),
            duration: None,
            view_count: None,
            thumbnail_url: String::new(),
            available_qualities: vec![],
        };
        let labels: Vec<_> = info.quality_choices().into_iter().map(|q| q.label).collect();
        assert_eq!(labels, ["Audio Only", "360p", "480p", "720p"]);
    }

    #[test]
    fn progress_parses_backend_payloads() {
        let p: DownloadProgress =
            serde_json::from_str(r#"{"status":"downloading","percent":" 45.2%","speed":"1.2MiB/s"}"#)
                .unwrap();
        assert_eq!(p, DownloadProgress::downloading(" 45.2%").with_speed("1.2MiB/s"));

        let p: DownloadProgress =
            serde_json::from_str(r#"{"status":"finished","percent":"100%","filename":"/tmp/x.mp4"}"#)
                .unwrap();
        assert_eq!(p.status, JobStatus::Finished);

        let p: DownloadProgress =
            serde_json::from_str(r#"{"status":"error","error":"HTTP Error 403"}"#).unwrap();
        assert_eq!(p, DownloadProgress::failed("HTTP Error 403"));

        let p: DownloadProgress =
            serde_json::from_str(r#"{"status":"starting","percent":"0%","speed":"N/A"}"#).unwrap();
        assert_eq!(p.status, JobStatus::Starting);

        let p: DownloadProgress = serde_json::from_str(r#"{"status":"postprocessing"}"#).unwrap();
        assert_eq!(p.status, JobStatus::Unknown);
    }
}
