//! Error types for catalog-harvest
//!
//! The taxonomy mirrors how each failure affects a run:
//! - [`FetchError`] and [`Error::InvalidDocument`] are fatal: a partial catalog is unusable
//! - [`MalformedRecordError`] and [`OrphanReferenceError`] are recovered and counted
//! - [`DownloadError`] is recovered per image, logged and counted
//!
//! Only the fatal kinds ever surface through [`Result`]; the recoverable kinds are
//! collected into reports by the stage that produced them.

use crate::types::{Level, NodeId};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for catalog-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for catalog-harvest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.max_concurrent_downloads")
        key: Option<String>,
    },

    /// One of the four catalog endpoints could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A fetched catalog document did not have the expected shape
    #[error("invalid {level} document: {reason}")]
    InvalidDocument {
        /// Level whose document was rejected
        level: Level,
        /// What was wrong with it
        reason: String,
    },

    /// A single image download failed
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Tabular export failed
    #[error("export error: {0}")]
    Export(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or other network error outside a single request
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error aborts a run before any output is produced
    pub fn is_fatal_fetch(&self) -> bool {
        matches!(self, Error::Fetch(_) | Error::InvalidDocument { .. })
    }
}

/// Failure of a single HTTP exchange
#[derive(Debug, Error)]
pub enum RequestError {
    /// The request never produced a response (DNS, connect, timeout, body read)
    #[error("request to {url} failed: {source}")]
    Transport {
        /// Requested URL
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The body was not valid JSON
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        /// Requested URL
        url: String,
        /// Parser error
        #[source]
        source: serde_json::Error,
    },
}

impl RequestError {
    /// URL of the failed request
    pub fn url(&self) -> &str {
        match self {
            RequestError::Transport { url, .. }
            | RequestError::Status { url, .. }
            | RequestError::Decode { url, .. } => url,
        }
    }

    /// HTTP status if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            RequestError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            RequestError::Decode { .. } => None,
        }
    }
}

/// A catalog endpoint could not be retrieved; fatal to the run
#[derive(Debug, Error)]
#[error("failed to fetch {level} catalog: {cause}")]
pub struct FetchError {
    /// Level whose endpoint failed
    pub level: Level,
    /// What went wrong
    #[source]
    pub cause: RequestError,
}

/// Why a record was rejected during normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// The record has no usable `id`
    MissingId,
    /// Another record of the same level already used this id
    DuplicateId(NodeId),
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::MissingId => write!(f, "missing id"),
            MalformedReason::DuplicateId(id) => write!(f, "duplicate id {id}"),
        }
    }
}

/// A record skipped by the normalizer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("skipped {level} record #{position}: {reason}")]
pub struct MalformedRecordError {
    /// Level of the document the record came from
    pub level: Level,
    /// Zero-based position in the document's `result` array
    pub position: usize,
    /// Why it was skipped
    pub reason: MalformedReason,
}

/// A node whose parent reference does not resolve one level up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{level} {id} references missing parent {}", parent.as_ref().map(NodeId::as_str).unwrap_or("<none>"))]
pub struct OrphanReferenceError {
    /// Level of the orphaned node
    pub level: Level,
    /// Orphaned node
    pub id: NodeId,
    /// The unresolved parent reference, if the record carried one
    pub parent: Option<NodeId>,
}

/// Failure retrieving or persisting one image
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The image could not be retrieved
    #[error("image {hex}: {source}")]
    Transport {
        /// Hex identifier of the image
        hex: String,
        /// Request failure
        #[source]
        source: RequestError,
    },

    /// The image was retrieved but could not be written
    #[error("image {hex}: failed to write {}: {source}", path.display())]
    Write {
        /// Hex identifier of the image
        hex: String,
        /// Destination path
        path: PathBuf,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Hex identifier of the failed image
    pub fn hex(&self) -> &str {
        match self {
            DownloadError::Transport { hex, .. } | DownloadError::Write { hex, .. } => hex,
        }
    }
}
