//! Configuration types for catalog-harvest
//!
//! A [`Config`] is built once per run and passed by reference to every stage;
//! nothing in the crate reads ambient global state.

use crate::error::{Error, Result};
use crate::types::{HexCase, ImageLayout, Level};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Endpoint codes for the four catalog levels
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCodes {
    /// Person level (default: "at_bkw0")
    #[serde(default = "default_person_code")]
    pub person: String,
    /// Letter level (default: "at_bkw1")
    #[serde(default = "default_letter_code")]
    pub letter: String,
    /// Sheet level (default: "at_bkw2")
    #[serde(default = "default_sheet_code")]
    pub sheet: String,
    /// Page level (default: "at_bkw3")
    #[serde(default = "default_page_code")]
    pub page: String,
}

impl LevelCodes {
    /// Code for one level
    pub fn get(&self, level: Level) -> &str {
        match level {
            Level::Person => &self.person,
            Level::Letter => &self.letter,
            Level::Sheet => &self.sheet,
            Level::Page => &self.page,
        }
    }
}

impl Default for LevelCodes {
    fn default() -> Self {
        Self {
            person: default_person_code(),
            letter: default_letter_code(),
            sheet: default_sheet_code(),
            page: default_page_code(),
        }
    }
}

/// Catalog API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; endpoints are `<base_url>/nodes/<level-code>` (default: "https://api.wossidia.de")
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Endpoint code per level
    #[serde(default)]
    pub level_codes: LevelCodes,

    /// Timeout for one endpoint request (default: 60 seconds)
    #[serde(default = "default_api_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Retry policy for endpoint requests (default: no retries)
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            level_codes: LevelCodes::default(),
            request_timeout: default_api_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Image download settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Image server; images live at `<image_base_url>/<hex>/working` (default: "https://digipool.wossidia.de")
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,

    /// Root of the image tree (default: "images")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Width of the download worker pool (default: 10)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Hex case override; `None` keeps each layout's own convention
    #[serde(default)]
    pub hex_case: Option<HexCase>,

    /// Parent ids to restrict downloads to (empty = no restriction)
    #[serde(default)]
    pub parent_allow_list: Vec<String>,

    /// Timeout for one image request (default: 10 seconds)
    #[serde(default = "default_image_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Overall deadline after which no new downloads are started
    #[serde(default, with = "optional_duration_serde")]
    pub deadline: Option<Duration>,

    /// Retry policy for image requests (default: no retries)
    #[serde(default)]
    pub retry: RetryConfig,
}

impl DownloadConfig {
    /// Effective hex case for a layout
    pub fn hex_case_for(&self, layout: ImageLayout) -> HexCase {
        self.hex_case.unwrap_or_else(|| layout.default_hex_case())
    }

    /// Image URL for a hex identifier
    pub fn image_url(&self, hex: &str) -> String {
        format!("{}/{}/working", self.image_base_url.trim_end_matches('/'), hex)
    }

    /// Whether downloads for pages under `parent` are in scope
    pub fn allows_parent(&self, parent: &str) -> bool {
        self.parent_allow_list.is_empty() || self.parent_allow_list.iter().any(|p| p == parent)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            image_base_url: default_image_base_url(),
            output_dir: default_output_dir(),
            max_concurrent_downloads: default_max_concurrent(),
            hex_case: None,
            parent_allow_list: Vec::new(),
            request_timeout: default_image_timeout(),
            deadline: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Tabular export settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Combined hierarchy export (default: "combined_data.csv")
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Flat page export written by the flat download mode (default: "nodes_data_with_hex_sorted.csv")
    #[serde(default = "default_flat_output_file")]
    pub flat_output_file: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_file: default_output_file(),
            flat_output_file: default_flat_output_file(),
        }
    }
}

/// Retry configuration with exponential backoff
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try (default: 0, retries disabled)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl RetryConfig {
    /// Policy with `max_attempts` retries and otherwise default settings
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for a harvest run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Image download settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Tabular export settings
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Endpoint URL for one level
    pub fn endpoint(&self, level: Level) -> String {
        format!(
            "{}/nodes/{}",
            self.api.base_url.trim_end_matches('/'),
            self.api.level_codes.get(level)
        )
    }

    /// Reject settings no run could work with
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::config("api.base_url", "base URL must not be empty"));
        }
        url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("api.base_url", format!("invalid URL: {e}")))?;

        if self.download.image_base_url.trim().is_empty() {
            return Err(Error::config(
                "download.image_base_url",
                "image base URL must not be empty",
            ));
        }
        url::Url::parse(&self.download.image_base_url)
            .map_err(|e| Error::config("download.image_base_url", format!("invalid URL: {e}")))?;

        for level in Level::ALL {
            if self.api.level_codes.get(level).trim().is_empty() {
                return Err(Error::config(
                    format!("api.level_codes.{}", level.column_prefix()),
                    "level code must not be empty",
                ));
            }
        }

        if self.download.max_concurrent_downloads == 0 {
            return Err(Error::config(
                "download.max_concurrent_downloads",
                "download concurrency must be at least 1",
            ));
        }

        for (key, retry) in [("api.retry", &self.api.retry), ("download.retry", &self.download.retry)] {
            if retry.backoff_multiplier < 1.0 {
                return Err(Error::config(
                    format!("{key}.backoff_multiplier"),
                    "backoff multiplier must be at least 1.0",
                ));
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_person_code() -> String {
    "at_bkw0".to_string()
}

fn default_letter_code() -> String {
    "at_bkw1".to_string()
}

fn default_sheet_code() -> String {
    "at_bkw2".to_string()
}

fn default_page_code() -> String {
    "at_bkw3".to_string()
}

fn default_api_base_url() -> String {
    "https://api.wossidia.de".to_string()
}

fn default_image_base_url() -> String {
    "https://digipool.wossidia.de".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_output_file() -> PathBuf {
    PathBuf::from("combined_data.csv")
}

fn default_flat_output_file() -> PathBuf {
    PathBuf::from("nodes_data_with_hex_sorted.csv")
}

fn default_max_concurrent() -> usize {
    10
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_image_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    0
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_match_catalog_codes() {
        let config = Config::default();
        assert_eq!(
            config.endpoint(Level::Person),
            "https://api.wossidia.de/nodes/at_bkw0"
        );
        assert_eq!(
            config.endpoint(Level::Page),
            "https://api.wossidia.de/nodes/at_bkw3"
        );
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let mut config = Config::default();
        config.api.base_url = "http://127.0.0.1:9000/".to_string();
        assert_eq!(
            config.endpoint(Level::Sheet),
            "http://127.0.0.1:9000/nodes/at_bkw2"
        );
    }

    #[test]
    fn image_url_uses_working_suffix() {
        let download = DownloadConfig::default();
        assert_eq!(
            download.image_url("deadbeef"),
            "https://digipool.wossidia.de/deadbeef/working"
        );
    }

    #[test]
    fn hex_case_defaults_per_layout_and_override_wins() {
        let mut download = DownloadConfig::default();
        assert_eq!(download.hex_case_for(ImageLayout::Nested), HexCase::Lower);
        assert_eq!(download.hex_case_for(ImageLayout::Flat), HexCase::Upper);

        download.hex_case = Some(HexCase::Upper);
        assert_eq!(download.hex_case_for(ImageLayout::Nested), HexCase::Upper);
    }

    #[test]
    fn empty_allow_list_allows_everything() {
        let mut download = DownloadConfig::default();
        assert!(download.allows_parent("1120010863"));

        download.parent_allow_list = vec!["1120010863".to_string()];
        assert!(download.allows_parent("1120010863"));
        assert!(!download.allows_parent("1120010864"));
    }

    #[test]
    fn retries_are_disabled_by_default() {
        let config = Config::default();
        assert_eq!(config.api.retry.max_attempts, 0);
        assert_eq!(config.download.retry.max_attempts, 0);
    }

    #[test]
    fn validate_accepts_defaults() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.download.max_concurrent_downloads = 0;

        match config.validate().unwrap_err() {
            Error::Config { key, .. } => {
                assert_eq!(key.as_deref(), Some("download.max_concurrent_downloads"))
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_unparseable_url() {
        let mut config = Config::default();
        config.download.image_base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn validate_rejects_shrinking_backoff() {
        let mut config = Config::default();
        config.download.retry.backoff_multiplier = 0.5;
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{
            "download": { "max_concurrent_downloads": 4, "hex_case": "upper", "deadline": 90 }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.download.max_concurrent_downloads, 4);
        assert_eq!(config.download.hex_case, Some(HexCase::Upper));
        assert_eq!(config.download.deadline, Some(Duration::from_secs(90)));
        assert_eq!(config.download.output_dir, PathBuf::from("images"));
        assert_eq!(config.api.level_codes, LevelCodes::default());
        assert_eq!(config.export.output_file, PathBuf::from("combined_data.csv"));
    }

    #[test]
    fn config_default_survives_json_round_trip() {
        let original = Config::default();

        let json = serde_json::to_string(&original).expect("Config must serialize to JSON");
        let restored: Config =
            serde_json::from_str(&json).expect("Config must deserialize from its own JSON");

        assert_eq!(restored.api.base_url, original.api.base_url);
        assert_eq!(restored.api.request_timeout, original.api.request_timeout);
        assert_eq!(restored.download.output_dir, original.download.output_dir);
        assert_eq!(
            restored.download.max_concurrent_downloads,
            original.download.max_concurrent_downloads
        );
        assert_eq!(restored.download.deadline, None);
        assert_eq!(
            restored.download.retry.initial_delay,
            original.download.retry.initial_delay
        );
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.json");
        std::fs::write(&path, r#"{"api": {"base_url": "http://localhost:1234"}}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:1234");
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
