//! Session state machine, kept free of any rendering concerns.
//!
//! Exactly one phase is visible at a time because the session *is* a single
//! enum value; entering a phase replaces whatever was shown before.

use tracing::{debug, info};

use crate::error::GENERIC_ERROR_MESSAGE;
use crate::model::{DownloadProgress, JobStatus, VideoInfo};
use crate::progress::parse_percent;

pub const PREPARING_TEXT: &str = "Preparing download...";
pub const COMPLETED_TEXT: &str = "Download completed!";
pub const PREPARING_FILE_TEXT: &str = "Preparing file for download...";

/// Discriminant of [`SessionState`], handy for assertions and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    InfoDisplayed,
    Downloading,
    Error,
}

/// Progress panel contents while a job runs
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadView {
    /// URL the job was started for
    pub url: String,
    pub quality: String,
    /// Set once the backend has accepted the job
    pub job_id: Option<String>,
    /// Indicator value, 0..=100
    pub percent: f32,
    pub status_text: String,
    pub speed_text: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Loading {
        url: String,
    },
    InfoDisplayed {
        /// The URL that produced `info`; reused for the download call
        url: String,
        info: VideoInfo,
    },
    Downloading(DownloadView),
    Error {
        message: String,
    },
}

impl SessionState {
    pub fn phase(&self) -> Phase {
        match self {
            SessionState::Idle => Phase::Idle,
            SessionState::Loading { .. } => Phase::Loading,
            SessionState::InfoDisplayed { .. } => Phase::InfoDisplayed,
            SessionState::Downloading(_) => Phase::Downloading,
            SessionState::Error { .. } => Phase::Error,
        }
    }

    fn enter(&mut self, next: SessionState) {
        debug!("session {:?} -> {:?}", self.phase(), next.phase());
        *self = next;
    }

    pub fn begin_loading(&mut self, url: impl Into<String>) {
        self.enter(SessionState::Loading { url: url.into() });
    }

    /// Loading -> InfoDisplayed. Ignored (returns false) from any other phase.
    pub fn show_info(&mut self, info: VideoInfo) -> bool {
        let SessionState::Loading { url } = self else {
            return false;
        };
        let url = std::mem::take(url);
        info!("video info loaded: {}", info.title);
        self.enter(SessionState::InfoDisplayed { url, info });
        true
    }

    /// URL that produced the displayed info, if any.
    pub fn info_url(&self) -> Option<&str> {
        match self {
            SessionState::InfoDisplayed { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn begin_download(&mut self, url: impl Into<String>, quality: impl Into<String>) {
        self.enter(SessionState::Downloading(DownloadView {
            url: url.into(),
            quality: quality.into(),
            job_id: None,
            percent: 0.0,
            status_text: PREPARING_TEXT.to_string(),
            speed_text: String::new(),
        }));
    }

    pub fn job_started(&mut self, id: &str) -> bool {
        match self {
            SessionState::Downloading(view) => {
                view.job_id = Some(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Folds a progress report into the indicator. Only meaningful while downloading.
    pub fn apply_progress(&mut self, progress: &DownloadProgress) -> bool {
        let SessionState::Downloading(view) = self else {
            return false;
        };
        match progress.status {
            JobStatus::Downloading => {
                view.status_text = format!("Downloading... {}", progress.percent_text.trim());
                // Keep the previous value when the text has no number in it.
                if let Some(percent) = parse_percent(&progress.percent_text) {
                    view.percent = percent;
                }
                if let Some(speed) = progress.speed_text.as_deref() {
                    view.speed_text = format!("Speed: {}", speed);
                }
            }
            JobStatus::Finished => {
                view.percent = 100.0;
                view.status_text = COMPLETED_TEXT.to_string();
                view.speed_text = PREPARING_FILE_TEXT.to_string();
            }
            JobStatus::Starting | JobStatus::Unknown | JobStatus::Error => {}
        }
        true
    }

    /// Any phase -> Error.
    pub fn fail(&mut self, message: &str) {
        let message = if message.trim().is_empty() {
            GENERIC_ERROR_MESSAGE.to_string()
        } else {
            message.to_string()
        };
        self.enter(SessionState::Error { message });
    }

    /// Error -> Idle.
    pub fn dismiss(&mut self) -> bool {
        if self.phase() != Phase::Error {
            return false;
        }
        self.enter(SessionState::Idle);
        true
    }

    pub fn reset(&mut self) {
        self.enter(SessionState::Idle);
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            SessionState::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn download(&self) -> Option<&DownloadView> {
        match self {
            SessionState::Downloading(view) => Some(view),
            _ => None,
        }
    }
}
