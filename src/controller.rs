//! Drives one video-to-file download against a [`MediaBackend`].
//!
//! Backend calls run on the tokio runtime and report back as events over a
//! channel; the owner drains them on its own thread with [`pump`] (the GUI
//! does so every frame). Every event is stamped with the epoch that launched
//! it, and leaving a phase bumps the epoch, so a late reply for a state the
//! session already left is discarded instead of resurrecting it.
//!
//! [`pump`]: DownloadSessionController::pump

use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::MediaBackend;
use crate::config::ClientConfig;
use crate::error::{Result, SessionError};
use crate::model::{DownloadJob, DownloadProgress, VideoInfo};
use crate::poller::{PollHandle, PollOutcome, ProgressPoller};
use crate::session::{Phase, SessionState};
use crate::validate::validate_url;

pub const SUCCESS_NOTICE: &str = "Download completed successfully!";

#[derive(Debug)]
enum SessionEvent {
    InfoLoaded(VideoInfo),
    JobStarted(DownloadJob),
    Progress(DownloadProgress),
    JobFinished(String),
    FileSaved(PathBuf),
    Failed(String),
}

#[derive(Debug)]
struct Envelope {
    epoch: u64,
    event: SessionEvent,
}

/// Sends events stamped with the epoch that created it.
#[derive(Clone)]
struct Emitter {
    epoch: u64,
    tx: UnboundedSender<Envelope>,
}

impl Emitter {
    fn emit(&self, event: SessionEvent) {
        // The receiver only goes away with the controller itself.
        let _ = self.tx.send(Envelope {
            epoch: self.epoch,
            event,
        });
    }

    fn fail(&self, err: &SessionError) {
        self.emit(SessionEvent::Failed(err.user_message()));
    }
}

/// Transient success message
#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub until: Instant,
}

pub struct DownloadSessionController {
    backend: Arc<dyn MediaBackend>,
    config: ClientConfig,
    runtime: Handle,
    state: SessionState,
    epoch: u64,
    events_tx: UnboundedSender<Envelope>,
    events_rx: UnboundedReceiver<Envelope>,
    poller: Option<PollHandle>,
    task: Option<JoinHandle<()>>,
    retrieving: bool,
    notice: Option<Notice>,
    last_saved: Option<PathBuf>,
}

impl DownloadSessionController {
    pub fn new(backend: Arc<dyn MediaBackend>, config: ClientConfig, runtime: Handle) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            backend,
            config,
            runtime,
            state: SessionState::Idle,
            epoch: 0,
            events_tx,
            events_rx,
            poller: None,
            task: None,
            retrieving: false,
            notice: None,
            last_saved: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn download_folder(&self) -> &str {
        &self.config.download_folder
    }

    pub fn set_download_folder(&mut self, folder: impl Into<String>) {
        self.config.download_folder = folder.into();
    }

    pub fn last_saved(&self) -> Option<&PathBuf> {
        self.last_saved.as_ref()
    }

    /// The success notification, while it is still due to be shown.
    pub fn notice(&self) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| Instant::now() < n.until)
            .map(|n| n.text.as_str())
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_stopped())
    }

    /// Validates `input` and asks the backend for its metadata.
    ///
    /// An invalid URL never reaches the network: the session goes straight to
    /// Error and the validation error is returned.
    pub fn fetch_info(&mut self, input: &str) -> Result<()> {
        let url = match validate_url(input) {
            Ok(url) => url,
            Err(err) => {
                self.fail(&err.user_message());
                return Err(err);
            }
        };

        let emitter = self.next_epoch();
        self.state.begin_loading(url.clone());
        info!("fetching video info for {}", url);

        let backend = self.backend.clone();
        self.task = Some(self.runtime.spawn(async move {
            match backend.query_video_info(&url).await {
                Ok(info) => emitter.emit(SessionEvent::InfoLoaded(info)),
                Err(err) => {
                    warn!("video info failed for {}: {}", url, err);
                    emitter.fail(&err);
                }
            }
        }));
        Ok(())
    }

    /// Starts a job for the displayed video at `quality`.
    pub fn choose_quality(&mut self, quality: &str) -> Result<()> {
        let url = self
            .state
            .info_url()
            .map(str::to_owned)
            .ok_or_else(|| SessionError::NotReady("Fetch video information first".to_string()))?;
        self.start_download(&url, quality)
    }

    /// Asks the backend to create a job and polls it until it ends.
    pub fn start_download(&mut self, url: &str, quality: &str) -> Result<()> {
        if self.phase() != Phase::InfoDisplayed {
            return Err(SessionError::NotReady(
                "Fetch video information first".to_string(),
            ));
        }

        let emitter = self.next_epoch();
        self.state.begin_download(url, quality);
        info!("starting download url={} quality={}", url, quality);

        let poller = ProgressPoller::new(self.config.poll_interval());
        self.poller = Some(poller.handle());

        let backend = self.backend.clone();
        let url = url.to_string();
        let quality = quality.to_string();
        self.task = Some(self.runtime.spawn(async move {
            let job = match backend.create_download_job(&url, &quality).await {
                Ok(job) => job,
                Err(err) => {
                    warn!("could not start download: {}", err);
                    emitter.fail(&err);
                    return;
                }
            };
            emitter.emit(SessionEvent::JobStarted(job.clone()));

            let (progress_tx, mut progress_rx) = unbounded_channel();
            let run = {
                let backend = backend.clone();
                let job_id = job.id.clone();
                async move {
                    let outcome = poller.run(backend.as_ref(), &job_id, &progress_tx).await;
                    // Closing the channel lets the forwarder below finish.
                    drop(progress_tx);
                    outcome
                }
            };
            let forward = async {
                while let Some(progress) = progress_rx.recv().await {
                    emitter.emit(SessionEvent::Progress(progress));
                }
            };
            let (outcome, ()) = tokio::join!(run, forward);

            match outcome {
                PollOutcome::Finished => emitter.emit(SessionEvent::JobFinished(job.id)),
                PollOutcome::Failed(err) => emitter.fail(&err),
                PollOutcome::Cancelled => debug!("polling for {} cancelled", job.id),
            }
        }));
        Ok(())
    }

    /// Pulls the finished file into the download folder, then resets the
    /// session after the settle delay.
    pub fn retrieve_file(&mut self, job_id: &str) -> Result<()> {
        let current = self.state.download().and_then(|v| v.job_id.as_deref());
        if current != Some(job_id) {
            return Err(SessionError::NotReady(format!("no active job {}", job_id)));
        }
        if self.retrieving {
            debug!("retrieval of {} already under way", job_id);
            return Ok(());
        }

        self.stop_polling();
        self.retrieving = true;

        let emitter = Emitter {
            epoch: self.epoch,
            tx: self.events_tx.clone(),
        };
        let backend = self.backend.clone();
        let job_id = job_id.to_string();
        let folder = PathBuf::from(&self.config.download_folder);
        let settle = self.config.settle_delay();
        self.task = Some(self.runtime.spawn(async move {
            match backend.retrieve_file(&job_id, &folder).await {
                Ok(path) => {
                    tokio::time::sleep(settle).await;
                    emitter.emit(SessionEvent::FileSaved(path));
                }
                Err(err) => {
                    warn!("retrieving {} failed: {}", job_id, err);
                    emitter.fail(&err);
                }
            }
        }));
        Ok(())
    }

    /// Error -> Idle.
    pub fn dismiss_error(&mut self) {
        if self.phase() == Phase::Error {
            self.next_epoch();
            self.state.dismiss();
        }
    }

    /// Cancels polling and any in-flight request. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if self.poller.is_some() || self.task.is_some() {
            info!("shutting down download session");
        }
        self.next_epoch();
    }

    /// Applies every event that has arrived so far. Returns the saved path
    /// if a download completed during this call.
    pub fn pump(&mut self) -> Option<PathBuf> {
        let mut completed = None;
        while let Ok(envelope) = self.events_rx.try_recv() {
            if let Some(path) = self.apply(envelope) {
                completed = Some(path);
            }
        }
        completed
    }

    /// Waits for the next event and applies it.
    pub async fn next_event(&mut self) -> Phase {
        if let Some(envelope) = self.events_rx.recv().await {
            self.apply(envelope);
        }
        self.phase()
    }

    fn apply(&mut self, envelope: Envelope) -> Option<PathBuf> {
        if envelope.epoch != self.epoch {
            debug!(
                "dropping stale event from epoch {} (now {}): {:?}",
                envelope.epoch, self.epoch, envelope.event
            );
            return None;
        }

        match envelope.event {
            SessionEvent::InfoLoaded(info) => {
                self.state.show_info(info);
            }
            SessionEvent::JobStarted(job) => {
                self.state.job_started(&job.id);
            }
            SessionEvent::Progress(progress) => {
                self.state.apply_progress(&progress);
            }
            SessionEvent::JobFinished(job_id) => {
                if let Err(err) = self.retrieve_file(&job_id) {
                    warn!("cannot retrieve {}: {}", job_id, err);
                }
            }
            SessionEvent::FileSaved(path) => {
                self.next_epoch();
                self.state.reset();
                self.notice = Some(Notice {
                    text: SUCCESS_NOTICE.to_string(),
                    until: Instant::now() + self.config.notice_duration(),
                });
                self.last_saved = Some(path.clone());
                return Some(path);
            }
            SessionEvent::Failed(message) => self.fail(&message),
        }
        None
    }

    fn fail(&mut self, message: &str) {
        self.next_epoch();
        self.state.fail(message);
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = &self.poller {
            poller.stop();
        }
    }

    /// Leaves the current epoch: stops the poller, aborts outstanding work and
    /// returns an emitter for whatever starts next.
    fn next_epoch(&mut self) -> Emitter {
        self.stop_polling();
        self.poller = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.retrieving = false;
        self.epoch += 1;
        Emitter {
            epoch: self.epoch,
            tx: self.events_tx.clone(),
        }
    }
}

impl Drop for DownloadSessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
