use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// A single normalized news item, the unit of data through the whole
/// pipeline. The `id` is a deterministic fingerprint of link + title, so
/// re-fetching the same story yields the same identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub source_title: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub ai_processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Persisted state for one category: fully replaced on every successful
/// ingestion run, items ordered newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub category: String,
    pub updated_at: DateTime<Utc>,
    pub item_count: usize,
    pub items: Vec<NewsItem>,
}

/// Per-category slice of `CacheStats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Aggregate view of the on-disk cache, used for status reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub categories: BTreeMap<String, CategoryStats>,
    pub daily_archives: usize,
    pub disk_bytes: u64,
}

/// Read-only snapshot of the scheduler's internal state.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub last_full_update: Option<DateTime<Utc>>,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub rotation_index: usize,
    pub total_categories: usize,
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    /// Items with a known publish date older than this are excluded.
    pub freshness_window_hours: i64,
    pub max_items_per_feed: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "newsroom/0.1".to_string(),
            timeout: Duration::from_secs(30),
            freshness_window_hours: 48,
            max_items_per_feed: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_retry_delay: Duration,
    pub batch_size: usize,
    pub item_delay: Duration,
    pub batch_delay: Duration,
    /// Bodies shorter than this skip the remote call entirely.
    pub short_content_threshold: usize,
    pub max_title_chars: usize,
    pub max_message_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.together.xyz/v1".to_string(),
            model: "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo".to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_retry_delay: Duration::from_secs(1),
            batch_size: 3,
            item_delay: Duration::from_millis(500),
            batch_delay: Duration::from_secs(2),
            short_content_threshold: 100,
            max_title_chars: 200,
            max_message_chars: 4096,
            max_tokens: 2000,
            temperature: 0.3,
            top_p: 0.9,
            repetition_penalty: 1.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub archive_dir: PathBuf,
    /// Category records and daily archives older than this are stale.
    pub max_age_hours: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            archive_dir: PathBuf::from("news_archive"),
            max_age_hours: 48,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Pause between categories in a full run, to space out remote load.
    pub inter_category_pause: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            inter_category_pause: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub full_update_interval: Duration,
    pub rotation_interval: Duration,
    pub cleanup_interval: Duration,
    pub report_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            full_update_interval: Duration::from_secs(3600),
            rotation_interval: Duration::from_secs(1800),
            cleanup_interval: Duration::from_secs(6 * 3600),
            report_interval: Duration::from_secs(2 * 3600),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation service error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NewsError>;
