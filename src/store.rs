//! File-based per-category news store.
//!
//! Layout under the archive directory:
//!
//! ```text
//! {archive_dir}/
//! ├── science.json          one CategoryRecord per category
//! ├── technology.json
//! └── daily/
//!     ├── 2025-06-09.json   flat item list per calendar day
//!     └── 2025-06-10.json
//! ```
//!
//! Category records are replaced wholesale on save; daily archives only
//! grow within their day and never hold two items with the same id.

use crate::types::{CacheStats, CategoryRecord, CategoryStats, NewsItem, Result, StoreConfig};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct CategoryStore {
    root: PathBuf,
    daily_dir: PathBuf,
    max_age: Duration,
    /// Serializes save and cleanup so a sweep cannot interleave with a
    /// replace of the same category file.
    write_lock: Mutex<()>,
}

impl CategoryStore {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let root = config.archive_dir;
        let daily_dir = root.join("daily");
        fs::create_dir_all(&daily_dir)?;
        info!("News archive at {}", root.display());

        Ok(Self {
            root,
            daily_dir,
            max_age: Duration::hours(config.max_age_hours),
            write_lock: Mutex::new(()),
        })
    }

    fn category_path(&self, category: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_filename(category)))
    }

    fn daily_path(&self, date: NaiveDate) -> PathBuf {
        self.daily_dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Replace the category's record and mirror unseen items into today's
    /// archive. Failures are logged and reported as `false`, never raised.
    pub async fn save(&self, category: &str, items: &[NewsItem]) -> bool {
        let _guard = self.write_lock.lock().await;

        if let Err(e) = self.write_record(category, items) {
            error!("Failed to save category {}: {}", category, e);
            return false;
        }

        if let Err(e) = self.append_to_daily_archive(items) {
            // The record itself is intact; the archive is best-effort.
            warn!("Failed to update daily archive: {}", e);
        }

        info!("Saved {} items for category {}", items.len(), category);
        true
    }

    fn write_record(&self, category: &str, items: &[NewsItem]) -> Result<()> {
        let record = CategoryRecord {
            category: category.to_string(),
            updated_at: Utc::now(),
            item_count: items.len(),
            items: items.to_vec(),
        };
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(self.category_path(category), json)?;
        Ok(())
    }

    fn append_to_daily_archive(&self, items: &[NewsItem]) -> Result<()> {
        let path = self.daily_path(Utc::now().date_naive());

        let mut archived: Vec<NewsItem> = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Vec::new()
        };

        let existing: HashSet<String> = archived.iter().map(|i| i.id.clone()).collect();
        let fresh: Vec<NewsItem> = items
            .iter()
            .filter(|i| !existing.contains(&i.id))
            .cloned()
            .collect();

        if fresh.is_empty() {
            return Ok(());
        }

        let added = fresh.len();
        archived.extend(fresh);
        archived.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        fs::write(&path, serde_json::to_string_pretty(&archived)?)?;

        debug!("Archived {} new items for the day", added);
        Ok(())
    }

    /// Load a category's items, or `None` when the record is missing,
    /// unreadable, or older than the maximum cache age. Stale data is
    /// treated as absent, never returned.
    pub async fn load(&self, category: &str) -> Option<Vec<NewsItem>> {
        let path = self.category_path(category);
        if !path.exists() {
            debug!("No record for category {}", category);
            return None;
        }

        let record = match read_record(&path) {
            Ok(record) => record,
            Err(e) => {
                warn!("Failed to read record for {}: {}", category, e);
                return None;
            }
        };

        if Utc::now().signed_duration_since(record.updated_at) > self.max_age {
            warn!("Record for category {} is stale", category);
            return None;
        }

        Some(record.items)
    }

    /// Top `limit` items across every category record, newest first.
    pub async fn latest(&self, limit: usize) -> Vec<NewsItem> {
        let mut all = Vec::new();

        for path in self.category_files() {
            match read_record(&path) {
                Ok(record) => all.extend(record.items),
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        all.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        all.truncate(limit);
        all
    }

    /// Delete category records past their maximum age and daily archives
    /// whose date-stem is past the retention window. Best-effort per file;
    /// returns how many files were removed.
    pub async fn cleanup(&self) -> usize {
        let _guard = self.write_lock.lock().await;

        let cutoff = Utc::now() - self.max_age;
        let mut removed = 0usize;

        for path in self.category_files() {
            match read_record(&path) {
                Ok(record) if record.updated_at < cutoff => match fs::remove_file(&path) {
                    Ok(()) => {
                        info!("Removed stale record {}", path.display());
                        removed += 1;
                    }
                    Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                },
                Ok(_) => {}
                Err(e) => warn!("Skipping {} during cleanup: {}", path.display(), e),
            }
        }

        // Archive age comes from the date-named file, not file metadata;
        // an archive is stale once its day's midnight falls past the
        // cutoff instant.
        for path in self.daily_files() {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            match NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                Ok(date) if date.and_time(NaiveTime::MIN).and_utc() < cutoff => {
                    match fs::remove_file(&path) {
                        Ok(()) => {
                            info!("Removed old daily archive {}", path.display());
                            removed += 1;
                        }
                        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Unparsable archive name {}: {}", path.display(), e),
            }
        }

        info!("Cleanup removed {} files", removed);
        removed
    }

    /// Aggregate counts and on-disk size, for status reporting.
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();

        for path in self.category_files() {
            match read_record(&path) {
                Ok(record) => {
                    stats.total_items += record.item_count;
                    stats.categories.insert(
                        record.category,
                        CategoryStats {
                            count: record.item_count,
                            last_updated: record.updated_at,
                        },
                    );
                }
                Err(e) => warn!("Skipping {} in stats: {}", path.display(), e),
            }
        }

        stats.daily_archives = self.daily_files().len();

        for path in self.category_files().into_iter().chain(self.daily_files()) {
            if let Ok(meta) = fs::metadata(&path) {
                stats.disk_bytes += meta.len();
            }
        }

        stats
    }

    fn category_files(&self) -> Vec<PathBuf> {
        json_files(&self.root)
    }

    fn daily_files(&self) -> Vec<PathBuf> {
        json_files(&self.daily_dir)
    }
}

fn json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

fn read_record(path: &Path) -> Result<CategoryRecord> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

/// Category names become file names; strip anything a filesystem would
/// reject.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();
    cleaned.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn item(title: &str, link: &str, hour: u32) -> NewsItem {
        NewsItem {
            id: crate::text::fingerprint(link, title),
            title: title.to_string(),
            summary: "body".to_string(),
            content: "body".to_string(),
            link: link.to_string(),
            published_at: Utc.with_ymd_and_hms(2025, 6, 10, hour, 0, 0).unwrap(),
            source_title: "Test Wire".to_string(),
            image_url: None,
            category: "science".to_string(),
            ai_processed: false,
            error: None,
        }
    }

    fn store_at(dir: &Path) -> CategoryStore {
        CategoryStore::new(StoreConfig {
            archive_dir: dir.to_path_buf(),
            max_age_hours: 48,
        })
        .unwrap()
    }

    /// Rewrite a record on disk with a doctored `updated_at`.
    fn age_record(store: &CategoryStore, category: &str, hours: i64) {
        let path = store.category_path(category);
        let mut record = read_record(&path).unwrap();
        record.updated_at = Utc::now() - Duration::hours(hours);
        fs::write(&path, serde_json::to_string_pretty(&record).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path());

        let items = vec![item("A", "https://x/1", 9), item("B", "https://x/2", 8)];
        assert!(store.save("science", &items).await);

        let loaded = store.load("science").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, items[0].id);
    }

    #[tokio::test]
    async fn load_missing_category_is_absent() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path());
        assert!(store.load("nope").await.is_none());
    }

    #[tokio::test]
    async fn stale_record_loads_as_absent() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path());

        store.save("science", &[item("A", "https://x/1", 9)]).await;
        age_record(&store, "science", 100);

        assert!(store.load("science").await.is_none());
    }

    #[tokio::test]
    async fn cleanup_spares_fresh_and_removes_stale() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path());

        store
            .save("science", &[item("A", "https://x/1", 9), item("B", "https://x/2", 8)])
            .await;

        // Fresh record is untouched.
        assert_eq!(store.cleanup().await, 0);
        assert!(store.load("science").await.is_some());

        // Once past max age it is deleted and load reports absent.
        age_record(&store, "science", 100);
        assert_eq!(store.cleanup().await, 1);
        assert!(store.load("science").await.is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_daily_archives_past_the_cutoff() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path());

        let old = store.daily_path(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
        fs::write(&old, "[]").unwrap();
        // The archive dated exactly at the cutoff is already stale: its
        // midnight lies before the cutoff instant.
        let boundary = store.daily_path((Utc::now() - Duration::hours(48)).date_naive());
        fs::write(&boundary, "[]").unwrap();
        let today = store.daily_path(Utc::now().date_naive());
        fs::write(&today, "[]").unwrap();

        assert_eq!(store.cleanup().await, 2);
        assert!(!old.exists());
        assert!(!boundary.exists());
        assert!(today.exists());
    }

    #[tokio::test]
    async fn daily_archive_never_duplicates_ids() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path());

        let a = item("A", "https://x/1", 9);
        let b = item("B", "https://x/2", 8);
        store.save("science", &[a.clone()]).await;
        store.save("science", &[a.clone(), b.clone()]).await;

        let path = store.daily_path(Utc::now().date_naive());
        let archived: Vec<NewsItem> =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(archived.len(), 2);
        let ids: HashSet<&str> = archived.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn latest_spans_categories_newest_first() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path());

        store.save("science", &[item("Old", "https://x/1", 6)]).await;
        store.save("tech", &[item("New", "https://x/2", 11)]).await;

        let latest = store.latest(1).await;
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].title, "New");
    }

    #[tokio::test]
    async fn stats_counts_items_and_archives() {
        let dir = tempdir().unwrap();
        let store = store_at(dir.path());

        store
            .save("science", &[item("A", "https://x/1", 9), item("B", "https://x/2", 8)])
            .await;
        store.save("tech", &[item("C", "https://x/3", 7)]).await;

        let stats = store.stats().await;
        assert_eq!(stats.total_items, 3);
        assert_eq!(stats.categories.len(), 2);
        assert_eq!(stats.categories["science"].count, 2);
        assert_eq!(stats.daily_archives, 1);
        assert!(stats.disk_bytes > 0);
    }

    #[test]
    fn sanitize_filename_strips_separators() {
        assert_eq!(sanitize_filename("a/b:c"), "a_b_c");
    }
}
