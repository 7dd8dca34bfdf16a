//! Worker pool behaviour against an in-memory image server

use super::*;
use crate::error::RequestError;
use crate::types::NodeId;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// In-memory image server that records every request
#[derive(Default)]
struct MockImageSource {
    failing: HashSet<String>,
    /// Fail this many times per URL before succeeding
    transient_failures: usize,
    delay: Duration,
    requests: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockImageSource {
    fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().values().sum()
    }
}

#[async_trait::async_trait]
impl HttpSource for MockImageSource {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, RequestError> {
        Err(RequestError::Status {
            url: url.to_string(),
            status: 404,
        })
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, RequestError> {
        let attempt = {
            let mut requests = self.requests.lock().unwrap();
            let count = requests.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(url) {
            return Err(RequestError::Status {
                url: url.to_string(),
                status: 404,
            });
        }
        if attempt <= self.transient_failures {
            return Err(RequestError::Status {
                url: url.to_string(),
                status: 503,
            });
        }

        Ok(format!("jpeg:{url}").into_bytes())
    }
}

fn config(root: &std::path::Path, concurrency: usize) -> DownloadConfig {
    DownloadConfig {
        image_base_url: "http://img.test".to_string(),
        output_dir: root.to_path_buf(),
        max_concurrent_downloads: concurrency,
        ..Default::default()
    }
}

fn jobs(config: &DownloadConfig, count: usize) -> Vec<ImageJob> {
    (0..count)
        .map(|i| {
            let hex = format!("{:x}", 0x100 + i);
            ImageJob {
                page_id: NodeId::new(format!("page-{i}")),
                url: config.image_url(&hex),
                destination: config.output_dir.join("L").join("S").join(format!("{hex}.jpg")),
                hex,
            }
        })
        .collect()
}

#[tokio::test]
async fn download_one_writes_the_body() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 2);
    let source = Arc::new(MockImageSource::default());
    let downloader = AssetDownloader::new(source.clone(), &config);
    let single = jobs(&config, 1);
    let job = &single[0];

    let path = downloader.download_one(job).await.unwrap();

    assert_eq!(path, job.destination);
    assert_eq!(
        std::fs::read(&path).unwrap(),
        b"jpeg:http://img.test/100/working"
    );
}

#[tokio::test]
async fn failures_are_isolated_and_every_job_attempted_once() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 3);
    let all_jobs = jobs(&config, 12);
    let failing: HashSet<String> = all_jobs
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 4 == 0)
        .map(|(_, job)| job.url.clone())
        .collect();

    let source = Arc::new(MockImageSource {
        failing: failing.clone(),
        delay: Duration::from_millis(5),
        ..Default::default()
    });
    let downloader = AssetDownloader::new(source.clone(), &config);

    let summary = downloader
        .download_all(all_jobs.clone(), &CancellationToken::new())
        .await;

    assert_eq!(summary.attempted, 12);
    assert_eq!(summary.failed, 3);
    assert_eq!(summary.succeeded, 9);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.attempted, summary.succeeded + summary.failed);

    for job in &all_jobs {
        assert_eq!(source.requests_for(&job.url), 1, "{} requested once", job.url);
        assert_eq!(job.destination.exists(), !failing.contains(&job.url));
    }

    let failed_urls: HashSet<String> = summary.failures.iter().map(|f| f.url.clone()).collect();
    assert_eq!(failed_urls, failing);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pages_sharing_an_image_do_not_fail_each_other() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 8);
    let destination = config.output_dir.join("L").join("S").join("ff.jpg");
    let shared: Vec<ImageJob> = (0..8)
        .map(|i| ImageJob {
            page_id: NodeId::new(format!("page-{i}")),
            hex: "ff".to_string(),
            url: config.image_url("ff"),
            destination: destination.clone(),
        })
        .collect();
    let source = Arc::new(MockImageSource::default());
    let downloader = AssetDownloader::new(source.clone(), &config);

    for _ in 0..5 {
        let summary = downloader
            .download_all(shared.clone(), &CancellationToken::new())
            .await;
        assert_eq!(summary.succeeded, 8, "failures: {:?}", summary.failures);
        assert_eq!(summary.failed, 0);
    }

    assert_eq!(
        std::fs::read(&destination).unwrap(),
        b"jpeg:http://img.test/ff/working"
    );
    let leftovers = std::fs::read_dir(destination.parent().unwrap()).unwrap().count();
    assert_eq!(leftovers, 1, "no temporary files remain");
}

#[tokio::test]
async fn pool_width_bounds_in_flight_requests() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 4);
    let source = Arc::new(MockImageSource {
        delay: Duration::from_millis(10),
        ..Default::default()
    });
    let downloader = AssetDownloader::new(source.clone(), &config);

    let summary = downloader
        .download_all(jobs(&config, 20), &CancellationToken::new())
        .await;

    assert_eq!(summary.succeeded, 20);
    let max = source.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 4, "max in flight was {max}");
    assert!(max > 1, "downloads should overlap");
}

#[tokio::test]
async fn zero_concurrency_is_clamped_to_one() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 0);
    let source = Arc::new(MockImageSource::default());
    let downloader = AssetDownloader::new(source, &config);
    assert_eq!(downloader.concurrency(), 1);
}

#[tokio::test]
async fn cancelled_run_skips_unstarted_jobs() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 2);
    let source = Arc::new(MockImageSource::default());
    let downloader = AssetDownloader::new(source.clone(), &config);

    let token = CancellationToken::new();
    token.cancel();
    let summary = downloader.download_all(jobs(&config, 5), &token).await;

    assert_eq!(summary.skipped, 5);
    assert_eq!(summary.attempted, 0);
    assert_eq!(source.total_requests(), 0);
}

#[tokio::test]
async fn cancellation_mid_run_lets_in_flight_jobs_finish() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 2);
    let source = Arc::new(MockImageSource {
        delay: Duration::from_millis(50),
        ..Default::default()
    });
    let downloader = AssetDownloader::new(source.clone(), &config);

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let summary = downloader.download_all(jobs(&config, 10), &token).await;

    assert_eq!(summary.attempted + summary.skipped, 10);
    assert_eq!(summary.attempted, summary.succeeded);
    assert!(summary.attempted >= 2, "in-flight jobs complete");
    assert!(summary.skipped > 0);
    assert_eq!(source.total_requests(), summary.attempted);
}

#[tokio::test]
async fn transient_failures_are_retried_when_enabled() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = config(temp_dir.path(), 2);
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    let source = Arc::new(MockImageSource {
        transient_failures: 1,
        ..Default::default()
    });
    let downloader = AssetDownloader::new(source.clone(), &config);
    let all_jobs = jobs(&config, 3);

    let summary = downloader
        .download_all(all_jobs.clone(), &CancellationToken::new())
        .await;

    assert_eq!(summary.succeeded, 3);
    for job in &all_jobs {
        assert_eq!(source.requests_for(&job.url), 2);
    }
}

#[tokio::test]
async fn no_retry_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 2);
    let source = Arc::new(MockImageSource {
        transient_failures: 1,
        ..Default::default()
    });
    let downloader = AssetDownloader::new(source.clone(), &config);
    let all_jobs = jobs(&config, 2);

    let summary = downloader
        .download_all(all_jobs.clone(), &CancellationToken::new())
        .await;

    assert_eq!(summary.failed, 2);
    assert_eq!(source.total_requests(), 2);
}

#[tokio::test]
async fn write_failures_are_reported_per_image() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 2);
    // A file where the letter directory should be
    std::fs::write(temp_dir.path().join("L"), b"blocker").unwrap();

    let source = Arc::new(MockImageSource::default());
    let downloader = AssetDownloader::new(source, &config);
    let single = jobs(&config, 1);
    let job = &single[0];

    let err = downloader.download_one(job).await.unwrap_err();
    assert!(matches!(err, DownloadError::Write { .. }));
    assert_eq!(err.hex(), job.hex);
}

#[tokio::test]
async fn events_are_published_for_each_image() {
    let temp_dir = TempDir::new().unwrap();
    let config = config(temp_dir.path(), 2);
    let all_jobs = jobs(&config, 3);
    let source = Arc::new(MockImageSource {
        failing: HashSet::from([all_jobs[1].url.clone()]),
        ..Default::default()
    });
    let (tx, mut rx) = tokio::sync::broadcast::channel(16);
    let downloader = AssetDownloader::new(source, &config).with_events(tx);

    downloader
        .download_all(all_jobs, &CancellationToken::new())
        .await;

    let mut saved = 0;
    let mut failed = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            Event::ImageSaved { .. } => saved += 1,
            Event::ImageFailed { hex, .. } => {
                assert_eq!(hex, "101");
                failed += 1;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!((saved, failed), (2, 1));
}
