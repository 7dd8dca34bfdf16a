//! Concurrent retrieval of the level endpoints.

use crate::config::Config;
use crate::error::FetchError;
use crate::retry::retry_with_backoff;
use crate::source::HttpSource;
use crate::types::Level;
use futures::future::try_join_all;

/// Fetches raw catalog documents, one per level
///
/// All requested levels are fetched concurrently. Any failure is fatal: the remaining
/// requests are dropped and the first error is returned.
pub struct NodeFetcher<'a> {
    source: &'a dyn HttpSource,
    config: &'a Config,
}

impl<'a> NodeFetcher<'a> {
    /// Create a fetcher over a shared source
    pub fn new(source: &'a dyn HttpSource, config: &'a Config) -> Self {
        Self { source, config }
    }

    /// Fetch one level's document
    pub async fn fetch_level(&self, level: Level) -> Result<serde_json::Value, FetchError> {
        let url = self.config.endpoint(level);
        tracing::debug!(level = %level, url = %url, "Fetching catalog level");

        let document = retry_with_backoff(&self.config.api.retry, || self.source.get_json(&url))
            .await
            .map_err(|cause| {
                tracing::error!(level = %level, error = %cause, "Catalog fetch failed");
                FetchError { level, cause }
            })?;

        Ok(document)
    }

    /// Fetch several levels concurrently, returning documents in request order
    pub async fn fetch_levels(
        &self,
        levels: &[Level],
    ) -> Result<Vec<(Level, serde_json::Value)>, FetchError> {
        try_join_all(levels.iter().map(|&level| async move {
            let document = self.fetch_level(level).await?;
            Ok::<_, FetchError>((level, document))
        }))
        .await
    }

    /// Fetch all four levels concurrently
    pub async fn fetch_all(&self) -> Result<Vec<(Level, serde_json::Value)>, FetchError> {
        self.fetch_levels(&Level::ALL).await
    }
}
