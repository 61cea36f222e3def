mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::{Instant, sleep};

use common::ScriptedBackend;
use vidgrab::model::{DownloadJob, DownloadProgress, JobStatus, VideoInfo};
use vidgrab::poller::{PollOutcome, ProgressPoller};
use vidgrab::progress::parse_percent;
use vidgrab::{MediaBackend, Result, SessionError};

const PERIOD: Duration = Duration::from_secs(1);

#[tokio::test(start_paused = true)]
async fn reports_each_update_then_stops_on_finish() {
    let backend = ScriptedBackend::new().with_progress(vec![
        DownloadProgress::downloading("10%"),
        DownloadProgress::downloading("55.5%"),
        DownloadProgress::finished(),
    ]);
    let poller = ProgressPoller::new(PERIOD);
    let handle = poller.handle();
    let (tx, mut rx) = unbounded_channel();

    let started = Instant::now();
    let outcome = poller.run(&backend, "job-1", &tx).await;

    assert!(matches!(outcome, PollOutcome::Finished));
    assert!(handle.is_stopped());
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));

    let mut percents = Vec::new();
    while let Ok(progress) = rx.try_recv() {
        percents.extend(parse_percent(&progress.percent_text));
    }
    assert_eq!(percents, vec![10.0, 55.5, 100.0]);

    // Stopping again after the terminal transition changes nothing.
    handle.stop();
    handle.stop();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(ScriptedBackend::count(&backend.progress_calls), 3);
}

#[tokio::test(start_paused = true)]
async fn job_error_ends_the_run() {
    let backend = ScriptedBackend::new().with_progress(vec![
        DownloadProgress::downloading("3%"),
        DownloadProgress::failed("HTTP Error 403: Forbidden"),
        DownloadProgress::downloading("4%"),
    ]);
    let poller = ProgressPoller::new(PERIOD);
    let handle = poller.handle();
    let (tx, mut rx) = unbounded_channel();

    let outcome = poller.run(&backend, "job-1", &tx).await;
    match outcome {
        PollOutcome::Failed(SessionError::Job(message)) => {
            assert_eq!(message, "HTTP Error 403: Forbidden")
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(handle.is_stopped());
    assert_eq!(ScriptedBackend::count(&backend.progress_calls), 2);

    // The error report itself is not forwarded as progress.
    let forwarded: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert_eq!(forwarded.len(), 1);
    assert_eq!(forwarded[0].status, JobStatus::Downloading);
}

#[tokio::test(start_paused = true)]
async fn failed_query_ends_the_run() {
    let backend = ScriptedBackend::new().then_progress_error("Download not found");
    let poller = ProgressPoller::new(PERIOD);
    let (tx, _rx) = unbounded_channel();

    match poller.run(&backend, "gone", &tx).await {
        PollOutcome::Failed(SessionError::Backend { message }) => {
            assert_eq!(message, "Download not found")
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(ScriptedBackend::count(&backend.progress_calls), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_between_ticks() {
    let backend = Arc::new(ScriptedBackend::new());
    let poller = ProgressPoller::new(PERIOD);
    let handle = poller.handle();

    let task = {
        let backend = backend.clone();
        tokio::spawn(async move {
            let (tx, _rx) = unbounded_channel();
            poller.run(backend.as_ref(), "job-1", &tx).await
        })
    };

    sleep(Duration::from_millis(2500)).await;
    handle.stop();
    let outcome = task.await.unwrap();
    assert!(matches!(outcome, PollOutcome::Cancelled));
    assert_eq!(ScriptedBackend::count(&backend.progress_calls), 2);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(ScriptedBackend::count(&backend.progress_calls), 2);
}

#[tokio::test(start_paused = true)]
async fn stopped_before_start_never_queries() {
    let backend = ScriptedBackend::new();
    let poller = ProgressPoller::new(PERIOD);
    poller.handle().stop();
    let (tx, _rx) = unbounded_channel();

    assert!(matches!(
        poller.run(&backend, "job-1", &tx).await,
        PollOutcome::Cancelled
    ));
    assert_eq!(ScriptedBackend::count(&backend.progress_calls), 0);
}

/// Answers progress queries slower than the poll period.
#[derive(Default)]
struct SlowBackend {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl MediaBackend for SlowBackend {
    async fn query_video_info(&self, _url: &str) -> Result<VideoInfo> {
        Err(SessionError::backend("unused"))
    }

    async fn create_download_job(&self, _url: &str, _quality: &str) -> Result<DownloadJob> {
        Err(SessionError::backend("unused"))
    }

    async fn query_progress(&self, _job_id: &str) -> Result<DownloadProgress> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        sleep(Duration::from_millis(2500)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.calls.fetch_add(1, Ordering::SeqCst) < 3 {
            Ok(DownloadProgress::downloading("20%"))
        } else {
            Ok(DownloadProgress::finished())
        }
    }

    async fn retrieve_file(&self, _job_id: &str, _dest_dir: &Path) -> Result<PathBuf> {
        Err(SessionError::backend("unused"))
    }
}

#[tokio::test(start_paused = true)]
async fn slow_replies_never_overlap() {
    let backend = SlowBackend::default();
    let poller = ProgressPoller::new(PERIOD);
    let (tx, _rx) = unbounded_channel();

    let outcome = poller.run(&backend, "job-1", &tx).await;
    assert!(matches!(outcome, PollOutcome::Finished));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
}
