#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use vidgrab::model::{DownloadJob, DownloadProgress, QualityOption, VideoInfo};
use vidgrab::{MediaBackend, Result, SessionError};

/// In-memory backend with canned replies and call counters.
#[derive(Default)]
pub struct ScriptedBackend {
    info_reply: Mutex<Option<std::result::Result<VideoInfo, String>>>,
    job_reply: Mutex<Option<std::result::Result<String, String>>>,
    progress: Mutex<VecDeque<std::result::Result<DownloadProgress, String>>>,
    retrieve_reply: Mutex<Option<String>>,
    pub info_calls: AtomicUsize,
    pub job_calls: AtomicUsize,
    pub progress_calls: AtomicUsize,
    pub retrieve_calls: AtomicUsize,
    /// Progress queries seen when the file was requested.
    pub progress_calls_at_retrieve: Mutex<Option<usize>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_info(self, info: VideoInfo) -> Self {
        *self.info_reply.lock().unwrap() = Some(Ok(info));
        self
    }

    pub fn with_info_error(self, message: &str) -> Self {
        *self.info_reply.lock().unwrap() = Some(Err(message.to_string()));
        self
    }

    pub fn with_job(self, id: &str) -> Self {
        *self.job_reply.lock().unwrap() = Some(Ok(id.to_string()));
        self
    }

    pub fn with_job_error(self, message: &str) -> Self {
        *self.job_reply.lock().unwrap() = Some(Err(message.to_string()));
        self
    }

    pub fn with_progress(self, replies: Vec<DownloadProgress>) -> Self {
        self.progress.lock().unwrap().extend(replies.into_iter().map(Ok));
        self
    }

    pub fn then_progress_error(self, message: &str) -> Self {
        self.progress
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn with_retrieve_error(self, message: &str) -> Self {
        *self.retrieve_reply.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn sample_info() -> VideoInfo {
    VideoInfo {
        title: "Never Gonna Give You Up".to_string(),
        uploader: "Rick Astley".to_string(),
        duration: Some(212),
        view_count: Some(1_500_000_000),
        thumbnail_url: String::new(),
        available_qualities: vec![
            QualityOption::audio("Audio Only"),
            QualityOption::video("360p"),
            QualityOption::video("720p"),
        ],
    }
}

pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

#[async_trait]
impl MediaBackend for ScriptedBackend {
    async fn query_video_info(&self, _url: &str) -> Result<VideoInfo> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        match self.info_reply.lock().unwrap().clone() {
            Some(Ok(info)) => Ok(info),
            Some(Err(message)) => Err(SessionError::backend(message)),
            None => Err(SessionError::backend("no info scripted")),
        }
    }

    async fn create_download_job(&self, url: &str, quality: &str) -> Result<DownloadJob> {
        self.job_calls.fetch_add(1, Ordering::SeqCst);
        match self.job_reply.lock().unwrap().clone() {
            Some(Ok(id)) => Ok(DownloadJob {
                id,
                source_url: url.to_string(),
                requested_quality: quality.to_string(),
            }),
            Some(Err(message)) => Err(SessionError::backend(message)),
            None => Err(SessionError::backend("no job scripted")),
        }
    }

    async fn query_progress(&self, _job_id: &str) -> Result<DownloadProgress> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        // An exhausted script keeps reporting an unfinished download.
        match self.progress.lock().unwrap().pop_front() {
            Some(Ok(progress)) => Ok(progress),
            Some(Err(message)) => Err(SessionError::backend(message)),
            None => Ok(DownloadProgress::downloading("50%")),
        }
    }

    async fn retrieve_file(&self, job_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        *self.progress_calls_at_retrieve.lock().unwrap() =
            Some(self.progress_calls.load(Ordering::SeqCst));
        match self.retrieve_reply.lock().unwrap().clone() {
            Some(message) => Err(SessionError::backend(message)),
            None => Ok(dest_dir.join(format!("{}.mp4", job_id))),
        }
    }
}
