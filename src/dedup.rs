//! Cross-source deduplication.
//!
//! Different feeds routinely republish the same story; one (lower-cased
//! trimmed title, link) pair survives, first seen wins.

use crate::types::NewsItem;
use std::collections::HashSet;
use tracing::debug;

/// Remove duplicates across the concatenated per-source results, then
/// re-sort newest first.
pub fn dedupe(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let total = items.len();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut unique = Vec::with_capacity(total);

    for item in items {
        let key = (item.title.trim().to_lowercase(), item.link.clone());
        if seen.insert(key) {
            unique.push(item);
        }
    }

    let removed = total - unique.len();
    if removed > 0 {
        debug!("Removed {} duplicate items", removed);
    }

    unique.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    unique
}
