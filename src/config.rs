//! Application configuration: component configs, the category → feed
//! table, and environment overrides.

use crate::types::{
    CoordinatorConfig, EditorConfig, FetcherConfig, Result, SchedulerConfig, StoreConfig,
};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub fetcher: FetcherConfig,
    pub editor: EditorConfig,
    pub store: StoreConfig,
    pub coordinator: CoordinatorConfig,
    pub scheduler: SchedulerConfig,
    pub feeds: BTreeMap<String, Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            editor: EditorConfig::default(),
            store: StoreConfig::default(),
            coordinator: CoordinatorConfig::default(),
            scheduler: SchedulerConfig::default(),
            feeds: default_feeds(),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with environment variables. Unset variables keep
    /// the default; unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(key) = env::var("TOGETHER_API_KEY") {
            config.editor.api_key = key;
        }
        if let Ok(model) = env::var("GENERATION_MODEL") {
            config.editor.model = model;
        }
        if let Some(n) = env_parse::<u32>("MAX_RETRIES") {
            config.editor.max_attempts = n;
        }
        if let Some(secs) = env_parse::<u64>("AI_TIMEOUT_SECONDS") {
            config.editor.timeout = Duration::from_secs(secs);
        }
        if let Some(n) = env_parse::<usize>("BATCH_SIZE") {
            config.editor.batch_size = n;
        }
        if let Ok(path) = env::var("NEWS_ARCHIVE_PATH") {
            config.store.archive_dir = PathBuf::from(path);
        }
        if let Some(hours) = env_parse::<i64>("NEWS_CACHE_HOURS") {
            config.store.max_age_hours = hours;
            config.fetcher.freshness_window_hours = hours;
        }
        if let Some(secs) = env_parse::<u64>("FULL_UPDATE_INTERVAL") {
            config.scheduler.full_update_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("CATEGORY_UPDATE_INTERVAL") {
            config.scheduler.rotation_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("CLEANUP_INTERVAL") {
            config.scheduler.cleanup_interval = Duration::from_secs(secs);
        }

        config
    }

    /// Replace the feed table with one read from a JSON file shaped as
    /// `{"category": ["url", ...], ...}`.
    pub fn load_feeds_from_file(&mut self, path: &Path) -> Result<()> {
        let raw = fs::read_to_string(path)?;
        self.feeds = serde_json::from_str(&raw)?;
        Ok(())
    }

    pub fn total_sources(&self) -> usize {
        self.feeds.values().map(|urls| urls.len()).sum()
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={}", key, raw);
            None
        }
    }
}

/// Built-in category table. Each category carries a handful of
/// well-known sources; deployments override this with a feeds file.
pub fn default_feeds() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 6] = [
        (
            "ai",
            &[
                "https://www.artificialintelligence-news.com/feed/",
                "https://venturebeat.com/ai/feed/",
                "https://www.technologyreview.com/feed/",
                "https://blogs.nvidia.com/feed/",
                "https://machinelearningmastery.com/feed/",
            ],
        ),
        (
            "technology",
            &[
                "https://techcrunch.com/feed/",
                "https://www.theverge.com/rss/index.xml",
                "https://arstechnica.com/feed/",
                "https://www.engadget.com/rss.xml",
                "https://www.wired.com/feed/",
            ],
        ),
        (
            "science",
            &[
                "https://www.nature.com/nature.rss",
                "https://phys.org/rss-feed/",
                "https://www.sciencedaily.com/rss/all.xml",
                "https://www.space.com/feeds/all",
                "https://www.livescience.com/feeds/all",
            ],
        ),
        (
            "gaming",
            &[
                "https://www.gamespot.com/feeds/news/",
                "https://www.polygon.com/rss/index.xml",
                "https://www.pcgamer.com/rss/",
                "https://www.rockpapershotgun.com/feed",
                "https://www.gamesindustry.biz/feed",
            ],
        ),
        (
            "crypto",
            &[
                "https://cointelegraph.com/rss",
                "https://decrypt.co/feed",
                "https://bitcoinmagazine.com/.rss/full/",
                "https://cryptonews.com/news/feed/",
                "https://u.today/rss",
            ],
        ),
        (
            "world",
            &[
                "https://www.theguardian.com/world/rss",
                "https://www.aljazeera.com/xml/rss/all.xml",
                "https://www.dw.com/en/rss/rss-en-world/rss.xml",
                "https://www.france24.com/en/rss",
                "https://www.npr.org/rss/rss.php?id=1004",
            ],
        ),
    ];

    table
        .into_iter()
        .map(|(category, urls)| {
            (
                category.to_string(),
                urls.iter().map(|u| u.to_string()).collect(),
            )
        })
        .collect()
}
