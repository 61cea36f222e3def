//! Progress polling for a single download job.
//!
//! One query per tick; the next tick is not awaited until the previous query
//! has resolved, so requests never overlap. The loop ends on the first
//! terminal outcome and cancels its own token on the way out, which makes any
//! later `stop()` a no-op.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::MediaBackend;
use crate::error::SessionError;
use crate::model::{DownloadProgress, JobStatus};

pub const JOB_FAILED: &str = "Download failed";

/// How a polling run ended
#[derive(Debug)]
pub enum PollOutcome {
    /// The job finished; the file can be retrieved.
    Finished,
    /// The job reported an error or a progress query failed.
    Failed(SessionError),
    /// Stopped from outside before reaching a terminal status.
    Cancelled,
}

/// Stops a poller. Cloneable; stopping more than once does nothing.
#[derive(Debug, Clone)]
pub struct PollHandle {
    token: CancellationToken,
}

impl PollHandle {
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            debug!("stopping progress poller");
            self.token.cancel();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct ProgressPoller {
    period: Duration,
    token: CancellationToken,
}

impl ProgressPoller {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            token: CancellationToken::new(),
        }
    }

    pub fn handle(&self) -> PollHandle {
        PollHandle {
            token: self.token.clone(),
        }
    }

    /// Polls `job_id` until a terminal status, forwarding every non-error report to `updates`.
    ///
    /// The `finished` report is forwarded before the run returns `Finished`.
    pub async fn run<B>(
        self,
        backend: &B,
        job_id: &str,
        updates: &UnboundedSender<DownloadProgress>,
    ) -> PollOutcome
    where
        B: MediaBackend + ?Sized,
    {
        // The first query waits one full period, like a browser interval timer.
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => return PollOutcome::Cancelled,
                _ = ticker.tick() => {}
            }
            ticks += 1;

            let reply = tokio::select! {
                biased;
                _ = self.token.cancelled() => return PollOutcome::Cancelled,
                reply = backend.query_progress(job_id) => reply,
            };

            let progress = match reply {
                Ok(progress) => progress,
                Err(err) => {
                    self.token.cancel();
                    warn!("progress query failed job={} tick={}: {}", job_id, ticks, err);
                    return PollOutcome::Failed(err);
                }
            };
            debug!(
                "job={} tick={} status={:?} percent={:?}",
                job_id, ticks, progress.status, progress.percent_text
            );

            match progress.status {
                JobStatus::Finished => {
                    self.token.cancel();
                    let _ = updates.send(progress);
                    info!("job {} finished after {} polls", job_id, ticks);
                    return PollOutcome::Finished;
                }
                JobStatus::Error => {
                    self.token.cancel();
                    let message = progress
                        .error_message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| JOB_FAILED.to_string());
                    warn!("job {} failed: {}", job_id, message);
                    return PollOutcome::Failed(SessionError::Job(message));
                }
                _ => {
                    let _ = updates.send(progress);
                }
            }
        }
    }
}
