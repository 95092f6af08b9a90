//! Orchestration of a single ingestion run: fetch every source of a
//! category concurrently, deduplicate, rewrite, persist.

use crate::dedup::dedupe;
use crate::editor::ContentEditor;
use crate::fetcher::FeedFetcher;
use crate::store::CategoryStore;
use crate::types::CoordinatorConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct IngestionCoordinator {
    fetcher: FeedFetcher,
    editor: ContentEditor,
    store: Arc<CategoryStore>,
    feeds: BTreeMap<String, Vec<String>>,
    /// One lock per category: concurrent runs of the same category
    /// serialize, while different categories may overlap.
    locks: BTreeMap<String, Mutex<()>>,
    config: CoordinatorConfig,
}

impl IngestionCoordinator {
    pub fn new(
        fetcher: FeedFetcher,
        editor: ContentEditor,
        store: Arc<CategoryStore>,
        feeds: BTreeMap<String, Vec<String>>,
        config: CoordinatorConfig,
    ) -> Self {
        let locks = feeds.keys().map(|c| (c.clone(), Mutex::new(()))).collect();
        Self {
            fetcher,
            editor,
            store,
            feeds,
            locks,
            config,
        }
    }

    /// Configured categories in stable (sorted) order. The scheduler's
    /// rotation indexes into this.
    pub fn categories(&self) -> Vec<String> {
        self.feeds.keys().cloned().collect()
    }

    /// Run the full pipeline for one category. Returns `true` only when
    /// fetching yielded at least one item and the save succeeded; every
    /// other outcome is logged and reported as `false`.
    pub async fn process_category(&self, category: &str) -> bool {
        let sources = match self.feeds.get(category) {
            Some(sources) => sources,
            None => {
                warn!("Unknown category: {}", category);
                return false;
            }
        };
        // Present whenever the category is: built from the same keys.
        let lock = match self.locks.get(category) {
            Some(lock) => lock,
            None => return false,
        };
        let _guard = lock.lock().await;

        info!(
            "Processing category {} ({} sources)",
            category,
            sources.len()
        );

        let fetched = self.fetcher.fetch_many(sources).await;
        if fetched.is_empty() {
            warn!("No items fetched for category {}", category);
            return false;
        }

        let mut items = dedupe(fetched);
        for item in &mut items {
            item.category = category.to_string();
        }
        info!("Category {}: {} items after dedup", category, items.len());

        let edited = self.editor.edit_all(items, category).await;
        let saved = self.store.save(category, &edited).await;
        if !saved {
            warn!("Save failed for category {}", category);
        }
        saved
    }

    /// Run every category sequentially with a pause in between. One
    /// category failing does not stop the others.
    pub async fn process_all_categories(&self) -> BTreeMap<String, bool> {
        let categories = self.categories();
        let mut results = BTreeMap::new();

        for (i, category) in categories.iter().enumerate() {
            let ok = self.process_category(category).await;
            results.insert(category.clone(), ok);

            if i + 1 < categories.len() {
                tokio::time::sleep(self.config.inter_category_pause).await;
            }
        }

        let succeeded = results.values().filter(|ok| **ok).count();
        info!(
            "Full run finished: {}/{} categories succeeded",
            succeeded,
            results.len()
        );
        results
    }
}
