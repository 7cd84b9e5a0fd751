//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::retry::RetryPolicy;

/// Root application configuration.
///
/// Secrets are never read from here, see [`crate::config::Credentials`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Awards platform access and record schema
    #[serde(default)]
    pub api: ApiConfig,

    /// Messaging transport settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Backoff schedule shared by the API client and the notifier
    #[serde(default)]
    pub retry: RetryConfig,

    /// Where the baseline snapshot lives
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-chapter tally shown in the notification header
    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| AppError::config(format!("api.base_url is invalid: {e}")))?;
        url::Url::parse(&self.telegram.api_base)
            .map_err(|e| AppError::config(format!("telegram.api_base is invalid: {e}")))?;
        if self.api.timeout_secs == 0 {
            return Err(AppError::config("api.timeout_secs must be > 0"));
        }
        if self.api.per_page == 0 {
            return Err(AppError::config("api.per_page must be > 0"));
        }
        if self.api.max_pages == 0 {
            return Err(AppError::config("api.max_pages must be > 0"));
        }
        if self.api.max_concurrent == 0 {
            return Err(AppError::config("api.max_concurrent must be > 0"));
        }
        if self.api.id_field.trim().is_empty() {
            return Err(AppError::config("api.id_field is empty"));
        }
        if self.api.categories.is_empty() {
            return Err(AppError::config("No categories defined"));
        }
        for category in &self.api.categories {
            if category.key.trim().is_empty() || category.slug.trim().is_empty() {
                return Err(AppError::config("Category key and slug must be non-empty"));
            }
        }
        for field in &self.api.fields {
            if field.name == CATEGORY_FIELD {
                return Err(AppError::config(format!(
                    "Field name '{CATEGORY_FIELD}' is reserved for the category key"
                )));
            }
            if field.name.trim().is_empty() || field.path.trim().is_empty() {
                return Err(AppError::config("Field name and path must be non-empty"));
            }
        }
        if self.telegram.timeout_secs == 0 {
            return Err(AppError::config("telegram.timeout_secs must be > 0"));
        }
        if self.telegram.max_message_chars < 64 {
            return Err(AppError::config("telegram.max_message_chars must be >= 64"));
        }
        if !(-12..=14).contains(&self.telegram.utc_offset_hours) {
            return Err(AppError::config(
                "telegram.utc_offset_hours must be within -12..=14",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("retry.max_attempts must be >= 1"));
        }
        Ok(())
    }
}

/// Field name under which the category key is recorded on every entry.
pub const CATEGORY_FIELD: &str = "category";

/// Awards platform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Versioned media type sent as `Accept`
    #[serde(default = "defaults::accept")]
    pub accept: String,

    /// Language for `x-api-language` and localized values
    #[serde(default = "defaults::language")]
    pub language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::api_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "defaults::per_page")]
    pub per_page: u32,

    /// Upper bound on pages followed for a single listing
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Category listings fetched at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Dotted path of the stable entry identifier
    #[serde(default = "defaults::id_field")]
    pub id_field: String,

    #[serde(default = "defaults::categories")]
    pub categories: Vec<CategoryConfig>,

    /// Tracked fields; changes to anything else are ignored
    #[serde(default = "defaults::fields")]
    pub fields: Vec<FieldSpec>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            accept: defaults::accept(),
            language: defaults::language(),
            timeout_secs: defaults::api_timeout(),
            per_page: defaults::per_page(),
            max_pages: defaults::max_pages(),
            max_concurrent: defaults::max_concurrent(),
            id_field: defaults::id_field(),
            categories: defaults::categories(),
            fields: defaults::fields(),
        }
    }
}

/// An entry category to export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryConfig {
    /// Stable label stored on each record
    pub key: String,
    /// Platform category slug used in the query
    pub slug: String,
}

/// A tracked record field and where to find it in the entry payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub path: String,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "defaults::telegram_base")]
    pub api_base: String,

    #[serde(default = "defaults::telegram_timeout")]
    pub timeout_secs: u64,

    /// Maximum message length in UTF-16 code units
    #[serde(default = "defaults::max_message_chars")]
    pub max_message_chars: usize,

    /// Pause between consecutive parts of one notification
    #[serde(default = "defaults::part_delay")]
    pub part_delay_ms: u64,

    /// First line of every notification
    #[serde(default = "defaults::title")]
    pub title: String,

    /// Offset used for the report date in the header
    #[serde(default = "defaults::utc_offset")]
    pub utc_offset_hours: i32,
}

impl TelegramConfig {
    pub fn part_delay(&self) -> Duration {
        Duration::from_millis(self.part_delay_ms)
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::telegram_base(),
            timeout_secs: defaults::telegram_timeout(),
            max_message_chars: defaults::max_message_chars(),
            part_delay_ms: defaults::part_delay(),
            title: defaults::title(),
            utc_offset_hours: defaults::utc_offset(),
        }
    }
}

/// Bounded exponential backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    /// Cap for both computed and server-advised delays
    #[serde(default = "defaults::max_delay")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay(),
            max_delay_ms: defaults::max_delay(),
        }
    }
}

/// Baseline storage backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

/// Baseline storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Snapshot file for the local backend
    #[serde(default = "defaults::state_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub s3_bucket: Option<String>,

    #[serde(default = "defaults::s3_key")]
    pub s3_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: defaults::state_path(),
            s3_bucket: None,
            s3_key: defaults::s3_key(),
        }
    }
}

/// Chapter summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Record field holding the chapter slug
    #[serde(default = "defaults::chapter_field")]
    pub chapter_field: String,

    /// Record field holding the entry status
    #[serde(default = "defaults::status_field")]
    pub status_field: String,

    /// Status value counted as submitted; everything else is in progress
    #[serde(default = "defaults::submitted_status")]
    pub submitted_status: String,

    /// Region for chapters not listed anywhere
    #[serde(default = "defaults::fallback_region")]
    pub fallback_region: String,

    /// Exact chapter names (lowercase) mapped straight to a region
    #[serde(default = "defaults::chapter_overrides")]
    pub chapter_overrides: BTreeMap<String, String>,

    /// Region name to lowercase chapter (country) names
    #[serde(default = "defaults::regions")]
    pub regions: BTreeMap<String, Vec<String>>,
}

impl SummaryConfig {
    /// Map a chapter display name to its reporting region.
    pub fn region_for(&self, chapter_name: &str) -> String {
        let lc = chapter_name.trim().to_lowercase();
        if let Some(region) = self.chapter_overrides.get(&lc) {
            return region.clone();
        }
        self.regions
            .iter()
            .find(|(_, countries)| countries.iter().any(|c| c.to_lowercase() == lc))
            .map(|(region, _)| region.clone())
            .unwrap_or_else(|| self.fallback_region.clone())
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            chapter_field: defaults::chapter_field(),
            status_field: defaults::status_field(),
            submitted_status: defaults::submitted_status(),
            fallback_region: defaults::fallback_region(),
            chapter_overrides: defaults::chapter_overrides(),
            regions: defaults::regions(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::{CategoryConfig, FieldSpec};

    // API defaults
    pub fn base_url() -> String {
        "https://api.us.cr4ce.com".into()
    }
    pub fn accept() -> String {
        "application/vnd.Creative Force.v2.3+json".into()
    }
    pub fn language() -> String {
        "en_GB".into()
    }
    pub fn api_timeout() -> u64 {
        30
    }
    pub fn per_page() -> u32 {
        100
    }
    pub fn max_pages() -> usize {
        500
    }
    pub fn max_concurrent() -> usize {
        2
    }
    pub fn id_field() -> String {
        "slug".into()
    }
    pub fn categories() -> Vec<CategoryConfig> {
        vec![
            CategoryConfig {
                key: "13_17".into(),
                slug: "ZLgyzemp".into(),
            },
            CategoryConfig {
                key: "above18".into(),
                slug: "Kgwrlowa".into(),
            },
        ]
    }
    pub fn fields() -> Vec<FieldSpec> {
        [
            ("title", "title"),
            ("status", "status"),
            ("chapter", "chapter.slug"),
        ]
        .into_iter()
        .map(|(name, path)| FieldSpec {
            name: name.into(),
            path: path.into(),
        })
        .collect()
    }

    // Telegram defaults
    pub fn telegram_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn telegram_timeout() -> u64 {
        60
    }
    pub fn max_message_chars() -> usize {
        4096
    }
    pub fn part_delay() -> u64 {
        1000
    }
    pub fn title() -> String {
        "Award Force entries".into()
    }
    pub fn utc_offset() -> i32 {
        7
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay() -> u64 {
        1000
    }
    pub fn max_delay() -> u64 {
        30_000
    }

    // Storage defaults
    pub fn state_path() -> PathBuf {
        PathBuf::from("state/snapshot.json")
    }
    pub fn s3_key() -> String {
        "award-export/snapshot.json".into()
    }

    // Summary defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn chapter_field() -> String {
        "chapter".into()
    }
    pub fn status_field() -> String {
        "status".into()
    }
    pub fn submitted_status() -> String {
        "submitted".into()
    }
    pub fn fallback_region() -> String {
        "EMEA".into()
    }
    pub fn chapter_overrides() -> BTreeMap<String, String> {
        BTreeMap::from([("global festival".to_string(), "Other".to_string())])
    }
    pub fn regions() -> BTreeMap<String, Vec<String>> {
        let list = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        BTreeMap::from([
            (
                "AMR".to_string(),
                list(&[
                    "argentina",
                    "brazil",
                    "canada",
                    "costa rica",
                    "mexico",
                    "united states of america",
                ]),
            ),
            ("PRC".to_string(), list(&["china"])),
            (
                "APJ".to_string(),
                list(&[
                    "bangladesh",
                    "india",
                    "indonesia",
                    "japan",
                    "malaysia",
                    "singapore",
                    "south korea",
                    "taiwan",
                    "thailand",
                    "vietnam",
                    "australia",
                    "new zealand",
                ]),
            ),
        ])
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
