//! Bounded-concurrency image retrieval.
//!
//! - [`plan`] - Page rows to [`ImageJob`]s for either on-disk layout
//!
//! [`AssetDownloader`] runs jobs through a pool of fixed width. Every job is isolated:
//! a failure is logged with its identifier and URL, counted, and never stops siblings.
//! Once the cancellation token fires no new job starts; jobs already in flight finish
//! (or hit their request timeout) and the rest are reported as skipped.

pub mod plan;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use plan::{DownloadPlan, ImageJob, plan_flat, plan_nested};

use crate::config::{DownloadConfig, RetryConfig};
use crate::error::DownloadError;
use crate::retry::retry_with_backoff;
use crate::source::HttpSource;
use crate::types::Event;
use crate::utils::write_atomic;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One failed image, as reported at the end of a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DownloadFailure {
    /// Hex identifier
    pub hex: String,
    /// Requested URL
    pub url: String,
    /// Error message
    pub error: String,
}

/// Outcome counts of a download pass
///
/// `attempted == succeeded + failed` always holds; skipped jobs were never started.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    /// Jobs that were started
    pub attempted: usize,
    /// Jobs whose image was written
    pub succeeded: usize,
    /// Jobs that failed
    pub failed: usize,
    /// Jobs not started because the run was cancelled
    pub skipped: usize,
    /// Details for each failed job
    pub failures: Vec<DownloadFailure>,
}

enum JobOutcome {
    Saved,
    Failed(DownloadFailure),
    Skipped,
}

/// Downloads image jobs with a bounded worker pool
#[derive(Clone)]
pub struct AssetDownloader {
    source: Arc<dyn HttpSource>,
    concurrency: usize,
    retry: RetryConfig,
    event_tx: Option<tokio::sync::broadcast::Sender<Event>>,
}

impl AssetDownloader {
    /// Create a downloader using the pool width and retry policy from `config`
    pub fn new(source: Arc<dyn HttpSource>, config: &DownloadConfig) -> Self {
        Self {
            source,
            concurrency: config.max_concurrent_downloads.max(1),
            retry: config.retry.clone(),
            event_tx: None,
        }
    }

    /// Publish per-image events on `event_tx`
    pub fn with_events(mut self, event_tx: tokio::sync::broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Pool width
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Retrieve one image and write it to its destination
    pub async fn download_one(&self, job: &ImageJob) -> Result<PathBuf, DownloadError> {
        retry_with_backoff(&self.retry, || async move {
            let bytes = self
                .source
                .get_bytes(&job.url)
                .await
                .map_err(|source| DownloadError::Transport {
                    hex: job.hex.clone(),
                    source,
                })?;

            write_atomic(&job.destination, &bytes)
                .await
                .map_err(|source| DownloadError::Write {
                    hex: job.hex.clone(),
                    path: job.destination.clone(),
                    source,
                })
        })
        .await?;

        Ok(job.destination.clone())
    }

    /// Run every job through the pool and tally the outcomes
    pub async fn download_all(
        &self,
        jobs: Vec<ImageJob>,
        cancel_token: &CancellationToken,
    ) -> DownloadSummary {
        let total = jobs.len();
        tracing::info!(
            jobs = total,
            concurrency = self.concurrency,
            "Starting image downloads"
        );

        let outcomes: Vec<JobOutcome> = stream::iter(jobs.iter())
            .map(|job| async move {
                if cancel_token.is_cancelled() {
                    return JobOutcome::Skipped;
                }
                self.run_job(job).await
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = DownloadSummary::default();
        for outcome in outcomes {
            match outcome {
                JobOutcome::Saved => {
                    summary.attempted += 1;
                    summary.succeeded += 1;
                }
                JobOutcome::Failed(failure) => {
                    summary.attempted += 1;
                    summary.failed += 1;
                    summary.failures.push(failure);
                }
                JobOutcome::Skipped => summary.skipped += 1,
            }
        }

        if summary.skipped > 0 {
            tracing::warn!(
                skipped = summary.skipped,
                "Download pass cancelled before all images were started"
            );
        }
        tracing::info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Image downloads finished"
        );

        summary
    }

    async fn run_job(&self, job: &ImageJob) -> JobOutcome {
        match self.download_one(job).await {
            Ok(path) => {
                tracing::debug!(hex = %job.hex, path = %path.display(), "Downloaded image");
                self.emit(Event::ImageSaved {
                    hex: job.hex.clone(),
                    path,
                });
                JobOutcome::Saved
            }
            Err(e) => {
                tracing::warn!(
                    hex = %job.hex,
                    url = %job.url,
                    page_id = %job.page_id,
                    error = %e,
                    "Failed to download image"
                );
                let failure = DownloadFailure {
                    hex: job.hex.clone(),
                    url: job.url.clone(),
                    error: e.to_string(),
                };
                self.emit(Event::ImageFailed {
                    hex: failure.hex.clone(),
                    url: failure.url.clone(),
                    error: failure.error.clone(),
                });
                JobOutcome::Failed(failure)
            }
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            // No subscribers is fine
            let _ = tx.send(event);
        }
    }
}
