//! # catalog-harvest
//!
//! Rebuilds a four-level archive catalog (Person, Letter, Sheet, Page) from a node-graph
//! API that serves each level as an independent flat list linked only by parent ids,
//! then flattens it into a CSV export and downloads the scanned page images.
//!
//! ## Pipeline
//!
//! - [`catalog::NodeFetcher`] fetches the four level endpoints concurrently
//! - [`catalog::normalize_document`] turns raw records into [`Node`] values
//! - [`catalog::build_hierarchy`] links levels into Person-rooted trees, counting orphans
//! - [`export`] writes one row per reachable Page
//! - [`downloader::AssetDownloader`] retrieves images with a bounded worker pool
//!
//! Export and downloads read the same immutable hierarchy and run concurrently.
//!
//! ## Quick Start
//!
//! ```no_run
//! use catalog_harvest::{Config, Harvester, RunMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.max_concurrent_downloads = 4;
//!
//!     let harvester = Harvester::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = harvester.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = harvester.run(RunMode::Full).await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Catalog retrieval, normalization and hierarchy reconstruction
pub mod catalog;
/// Configuration types
pub mod config;
/// Bounded-concurrency image downloads
pub mod downloader;
/// Error types
pub mod error;
/// CSV export of flattened rows
pub mod export;
/// Run orchestration
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// HTTP source abstraction
pub mod source;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use catalog::{Catalog, Hierarchy, HierarchyStats, PageRow, build_hierarchy};
pub use config::{ApiConfig, Config, DownloadConfig, ExportConfig, RetryConfig};
pub use downloader::{AssetDownloader, DownloadFailure, DownloadSummary, ImageJob};
pub use error::{
    DownloadError, Error, FetchError, MalformedRecordError, OrphanReferenceError, RequestError,
    Result,
};
pub use pipeline::{Harvester, RunMode, RunReport};
pub use source::{HttpSource, ReqwestSource};
pub use types::{Event, HexCase, HierarchyNode, ImageLayout, InfoPair, Level, Node, NodeId};

/// Drive a run to completion with graceful signal handling.
///
/// On the first termination signal the harvester's `shutdown()` is called: no new
/// downloads are started, in-flight ones finish, and `run` still completes so its
/// report reflects how many images were skipped.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::{Config, Harvester, RunMode, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let harvester = Harvester::new(Config::default())?;
///     let report = run_with_shutdown(&harvester, harvester.run(RunMode::Full)).await?;
///     println!("{report}");
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown<F, T>(harvester: &Harvester, run: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::pin!(run);

    tokio::select! {
        output = &mut run => output,
        _ = wait_for_signal() => {
            harvester.shutdown();
            run.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
