//! Run orchestration: fetch, rebuild, then export and download.
//!
//! A [`Harvester`] owns the configuration, the HTTP source and the run-wide
//! cancellation token. Each run is stateless: the catalog is fetched, used and
//! dropped. Only a [`FetchError`](crate::error::FetchError) (or an unusable document)
//! fails a run; everything else is counted in the [`RunReport`].

use crate::catalog::{
    Catalog, Hierarchy, HierarchyStats, NodeFetcher, build_hierarchy, normalize_document,
    select_flat_pages,
};
use crate::config::Config;
use crate::downloader::{AssetDownloader, DownloadPlan, DownloadSummary, plan_flat, plan_nested};
use crate::error::{Error, Result};
use crate::export::{export_flat, export_hierarchy};
use crate::source::{HttpSource, ReqwestSource};
use crate::types::{Event, ImageLayout, Level};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which hierarchy consumers a run drives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Export only
    Combine,
    /// Downloads only
    Download,
    /// Export and downloads, concurrently
    Full,
}

impl RunMode {
    fn exports(self) -> bool {
        matches!(self, RunMode::Combine | RunMode::Full)
    }

    fn downloads(self) -> bool {
        matches!(self, RunMode::Download | RunMode::Full)
    }
}

/// Final summary of one run
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Records dropped during normalization
    pub records_skipped: usize,
    /// Nodes whose own parent reference did not resolve
    pub orphans: usize,
    /// Nodes lost because an ancestor was orphaned
    pub detached: usize,
    /// Export file, if one was written
    pub export_path: Option<PathBuf>,
    /// Data rows in the export
    pub rows_exported: usize,
    /// Pages skipped for download because they have no image id
    pub pages_without_image: usize,
    /// Pages skipped for download by the parent allow-list
    pub pages_out_of_scope: usize,
    /// Pages skipped for download because they have no parent (flat layout)
    pub pages_without_parent: usize,
    /// Pages skipped for download because a parent id is not a usable directory name
    pub pages_with_invalid_path: usize,
    /// Download outcomes
    pub downloads: DownloadSummary,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>, records_skipped: usize) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            records_skipped,
            orphans: 0,
            detached: 0,
            export_path: None,
            rows_exported: 0,
            pages_without_image: 0,
            pages_out_of_scope: 0,
            pages_without_parent: 0,
            pages_with_invalid_path: 0,
            downloads: DownloadSummary::default(),
        }
    }

    fn record_hierarchy(&mut self, stats: &HierarchyStats) {
        self.orphans = stats.orphaned;
        self.detached = stats.detached;
    }

    fn record_plan(&mut self, plan: &DownloadPlan) {
        self.pages_without_image = plan.without_image;
        self.pages_out_of_scope = plan.out_of_scope;
        self.pages_without_parent = plan.without_parent;
        self.pages_with_invalid_path = plan.invalid_path;
    }

    /// Every node left out of the tree
    pub fn nodes_dropped(&self) -> usize {
        self.orphans + self.detached
    }

    /// Emit the summary as one structured log line
    pub fn log(&self) {
        tracing::info!(
            records_skipped = self.records_skipped,
            orphans = self.orphans,
            detached = self.detached,
            rows_exported = self.rows_exported,
            pages_without_image = self.pages_without_image,
            images_succeeded = self.downloads.succeeded,
            images_failed = self.downloads.failed,
            images_skipped = self.downloads.skipped,
            elapsed_ms = (self.finished_at - self.started_at).num_milliseconds(),
            "Run finished"
        );
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "records skipped:     {}", self.records_skipped)?;
        writeln!(
            f,
            "nodes dropped:       {} ({} orphaned, {} detached)",
            self.nodes_dropped(),
            self.orphans,
            self.detached
        )?;
        match &self.export_path {
            Some(path) => writeln!(
                f,
                "rows exported:       {} -> {}",
                self.rows_exported,
                path.display()
            )?,
            None => writeln!(f, "rows exported:       -")?,
        }
        writeln!(f, "pages without image: {}", self.pages_without_image)?;
        if self.pages_out_of_scope > 0 {
            writeln!(f, "pages out of scope:  {}", self.pages_out_of_scope)?;
        }
        if self.pages_without_parent > 0 {
            writeln!(f, "pages without parent: {}", self.pages_without_parent)?;
        }
        if self.pages_with_invalid_path > 0 {
            writeln!(f, "pages with bad path: {}", self.pages_with_invalid_path)?;
        }
        write!(
            f,
            "images:              {} attempted, {} succeeded, {} failed, {} skipped",
            self.downloads.attempted,
            self.downloads.succeeded,
            self.downloads.failed,
            self.downloads.skipped
        )?;
        for failure in &self.downloads.failures {
            write!(f, "\n  failed {} ({}): {}", failure.hex, failure.url, failure.error)?;
        }
        Ok(())
    }
}

/// Entry point for harvest runs (cloneable, all fields are shared)
#[derive(Clone)]
pub struct Harvester {
    config: Arc<Config>,
    source: Arc<dyn HttpSource>,
    event_tx: tokio::sync::broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl Harvester {
    /// Validate `config` and build the production HTTP client
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = ReqwestSource::new(&config)?;
        Ok(Self::with_source(config, Arc::new(source)))
    }

    /// Use a custom HTTP source
    pub fn with_source(config: Config, source: Arc<dyn HttpSource>) -> Self {
        // Buffer events for slow subscribers
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        Self {
            config: Arc::new(config),
            source,
            event_tx,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The run configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that stops every current and future run from starting new downloads
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Stop issuing new downloads; in-flight ones finish or time out
    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested, no new downloads will be started");
        self.cancel_token.cancel();
    }

    fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    fn downloader(&self) -> AssetDownloader {
        AssetDownloader::new(self.source.clone(), &self.config.download)
            .with_events(self.event_tx.clone())
    }

    /// Child token for one run, cancelled by the configured deadline if there is one
    ///
    /// The returned guard cancels the run token (and with it the deadline timer) on drop.
    fn run_token(&self) -> (CancellationToken, tokio_util::sync::DropGuard) {
        let token = self.cancel_token.child_token();

        if let Some(deadline) = self.config.download.deadline {
            let timer_token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(deadline) => {
                        tracing::warn!(
                            deadline_secs = deadline.as_secs_f64(),
                            "Run deadline reached, no new downloads will be started"
                        );
                        timer_token.cancel();
                    }
                    _ = timer_token.cancelled() => {}
                }
            });
        }

        let guard = token.clone().drop_guard();
        (token, guard)
    }

    /// Fetch all four levels concurrently and normalize them
    ///
    /// Returns the catalog and the number of records skipped as malformed. Any endpoint
    /// failure aborts before normalization begins.
    pub async fn load_catalog(&self) -> Result<(Catalog, usize)> {
        let fetcher = NodeFetcher::new(self.source.as_ref(), &self.config);
        let documents = fetcher.fetch_all().await?;

        let mut catalog = Catalog::new();
        let mut records_skipped = 0;
        for (level, document) in documents {
            let normalized = normalize_document(level, &document)?;
            records_skipped += normalized.skipped.len();

            tracing::info!(
                level = %level,
                records = normalized.nodes.len(),
                skipped = normalized.skipped.len(),
                "Catalog level loaded"
            );
            self.emit_event(Event::LevelFetched {
                level,
                records: normalized.nodes.len(),
                skipped: normalized.skipped.len(),
            });
            catalog.set_level(level, normalized.nodes);
        }

        Ok((catalog, records_skipped))
    }

    /// Fetch and rebuild the hierarchy without exporting or downloading
    pub async fn load_hierarchy(&self) -> Result<(Hierarchy, usize)> {
        let (catalog, records_skipped) = self.load_catalog().await?;
        let hierarchy = build_hierarchy(catalog);

        self.emit_event(Event::HierarchyBuilt {
            roots: hierarchy.roots.len(),
            attached: hierarchy.stats.attached_nodes,
            orphaned: hierarchy.stats.orphan_count(),
        });

        Ok((hierarchy, records_skipped))
    }

    /// Hierarchy-driven run
    ///
    /// Export and downloads both read the same immutable hierarchy and run concurrently.
    /// Download failures never fail the run; an export failure does.
    pub async fn run(&self, mode: RunMode) -> Result<RunReport> {
        let started_at = Utc::now();
        let (run_token, _guard) = self.run_token();
        tracing::info!(?mode, "Starting harvest run");

        let (hierarchy, records_skipped) = self.load_hierarchy().await?;
        let hierarchy = Arc::new(hierarchy);

        let mut report = RunReport::new(started_at, records_skipped);
        report.record_hierarchy(&hierarchy.stats);

        let export = async {
            if mode.exports() {
                Some(self.export_combined(Arc::clone(&hierarchy)).await)
            } else {
                None
            }
        };

        let downloads = async {
            if !mode.downloads() {
                return None;
            }
            let mut plan = plan_nested(hierarchy.rows(), &self.config.download);
            tracing::info!(
                jobs = plan.jobs.len(),
                without_image = plan.without_image,
                out_of_scope = plan.out_of_scope,
                "Planned image downloads"
            );
            let jobs = std::mem::take(&mut plan.jobs);
            let summary = self.downloader().download_all(jobs, &run_token).await;
            Some((plan, summary))
        };

        let (export, downloads) = tokio::join!(export, downloads);

        if let Some((plan, summary)) = downloads {
            report.record_plan(&plan);
            report.downloads = summary;
        }
        if let Some((path, rows)) = export.transpose()? {
            report.export_path = Some(path);
            report.rows_exported = rows;
        }

        report.finished_at = Utc::now();
        report.log();
        Ok(report)
    }

    async fn export_combined(&self, hierarchy: Arc<Hierarchy>) -> Result<(PathBuf, usize)> {
        let path = self.config.export.output_file.clone();
        let case = self.config.download.hex_case_for(ImageLayout::Nested);
        let task_path = path.clone();

        let rows = tokio::task::spawn_blocking(move || {
            export_hierarchy(&task_path, &hierarchy, case)
        })
        .await
        .map_err(|e| Error::Other(format!("export task failed: {e}")))??;

        self.emit_event(Event::ExportWritten {
            path: path.clone(),
            rows,
        });
        Ok((path, rows))
    }

    /// Page-list run: no hierarchy, pages placed under `<output_dir>/<parent_id>/`
    ///
    /// Only the Page endpoint is fetched. The selected pages are sorted by
    /// `(parent, sig3)`, exported, then downloaded.
    pub async fn run_flat(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let (run_token, _guard) = self.run_token();
        tracing::info!("Starting flat harvest run");

        let fetcher = NodeFetcher::new(self.source.as_ref(), &self.config);
        let document = fetcher.fetch_level(Level::Page).await?;
        let normalized = normalize_document(Level::Page, &document)?;
        self.emit_event(Event::LevelFetched {
            level: Level::Page,
            records: normalized.nodes.len(),
            skipped: normalized.skipped.len(),
        });

        let mut report = RunReport::new(started_at, normalized.skipped.len());
        let pages = select_flat_pages(&normalized.nodes, &self.config.download);

        let path = self.config.export.flat_output_file.clone();
        let case = self.config.download.hex_case_for(ImageLayout::Flat);
        let rows = export_flat(&path, &pages, case)?;
        self.emit_event(Event::ExportWritten {
            path: path.clone(),
            rows,
        });
        report.export_path = Some(path);
        report.rows_exported = rows;

        let plan = plan_flat(pages.iter().copied(), &self.config.download);
        report.record_plan(&plan);
        report.downloads = self
            .downloader()
            .download_all(plan.jobs, &run_token)
            .await;

        report.finished_at = Utc::now();
        report.log();
        Ok(report)
    }
}
