use crate::text::{clean_html, fingerprint};
use crate::types::{FetcherConfig, NewsItem};
use chrono::{DateTime, Duration, Utc};
use feed_rs::parser;
use futures::future::join_all;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

/// Fetches and normalizes a single RSS/Atom source.
///
/// A failing source is never an error for the caller: network trouble, a
/// non-success status or a malformed payload all produce an empty list, so
/// one broken feed cannot abort a category run.
pub struct FeedFetcher {
    client: Client,
    config: FetcherConfig,
}

impl FeedFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    /// Fetch one source and return fresh items, newest first, capped at
    /// `max_items_per_feed`.
    pub async fn fetch(&self, url: &str) -> Vec<NewsItem> {
        debug!("Fetching feed: {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Feed {} returned HTTP {}", url, status);
            return Vec::new();
        }

        match response.text().await {
            Ok(body) => self.parse_payload(&body, url, Utc::now()),
            Err(e) => {
                warn!("Failed to read body from {}: {}", url, e);
                Vec::new()
            }
        }
    }

    /// Fetch every source of a category concurrently and concatenate the
    /// results. Sources that fail contribute nothing to the gather.
    pub async fn fetch_many(&self, urls: &[String]) -> Vec<NewsItem> {
        let fetches = urls.iter().map(|url| self.fetch(url));
        let results = join_all(fetches).await;

        let items: Vec<NewsItem> = results.into_iter().flatten().collect();
        info!("Fetched {} items from {} sources", items.len(), urls.len());
        items
    }

    /// Parse an already-fetched feed payload. Split out from `fetch` so the
    /// normalization pipeline can run against static payloads.
    pub fn parse_payload(&self, payload: &str, feed_url: &str, now: DateTime<Utc>) -> Vec<NewsItem> {
        let feed = match parser::parse(payload.as_bytes()) {
            Ok(feed) => feed,
            Err(e) => {
                warn!("Failed to parse feed {}: {}", feed_url, e);
                return Vec::new();
            }
        };

        let source_title = feed
            .title
            .map(|t| clean_html(&t.content))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Unknown source".to_string());

        let window = Duration::hours(self.config.freshness_window_hours);
        let mut items = Vec::new();

        for entry in feed.entries {
            let published = entry.published.or(entry.updated);

            // Entries with no determinable date are kept; the filter only
            // ever excludes on positive evidence of staleness.
            if let Some(ts) = published {
                if now.signed_duration_since(ts) > window {
                    continue;
                }
            }

            let title = entry
                .title
                .as_ref()
                .map(|t| clean_html(&t.content))
                .unwrap_or_default();

            let raw_body = entry
                .summary
                .as_ref()
                .map(|s| s.content.clone())
                .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
                .unwrap_or_default();
            let summary = clean_html(&raw_body);

            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default();

            if title.is_empty() || (summary.is_empty() && link.is_empty()) {
                continue;
            }

            let image_url = extract_image_url(&entry, &raw_body, feed_url);

            items.push(NewsItem {
                id: fingerprint(&link, &title),
                title,
                content: summary.clone(),
                summary,
                link,
                published_at: published.unwrap_or(now),
                source_title: source_title.clone(),
                image_url,
                category: String::new(),
                ai_processed: false,
                error: None,
            });
        }

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(self.config.max_items_per_feed);

        info!("Parsed {} fresh items from {}", items.len(), feed_url);
        items
    }
}

/// Best-effort image extraction: media content, then media thumbnails, then
/// enclosure links, then the first `<img>` tag in the body.
fn extract_image_url(entry: &feed_rs::model::Entry, raw_body: &str, feed_url: &str) -> Option<String> {
    for media in &entry.media {
        for content in &media.content {
            let is_image = content
                .content_type
                .as_ref()
                .map(|m| m.essence_str().starts_with("image/"))
                .unwrap_or(false);
            if is_image {
                if let Some(url) = &content.url {
                    return resolve_image_url(url.as_str(), feed_url);
                }
            }
        }
        if let Some(thumbnail) = media.thumbnails.first() {
            return resolve_image_url(&thumbnail.image.uri, feed_url);
        }
    }

    for link in &entry.links {
        if link.rel.as_deref() == Some("enclosure") {
            let is_image = link
                .media_type
                .as_deref()
                .map(|m| m.starts_with("image/"))
                .unwrap_or(false);
            if is_image {
                return resolve_image_url(&link.href, feed_url);
            }
        }
    }

    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re_img = RE_IMG.get_or_init(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).unwrap());
    if let Some(captures) = re_img.captures(raw_body) {
        return resolve_image_url(&captures[1], feed_url);
    }

    None
}

/// Resolve protocol-relative and root-relative image URLs against the
/// feed's own origin.
fn resolve_image_url(raw: &str, feed_url: &str) -> Option<String> {
    if raw.starts_with("//") {
        return Some(format!("https:{}", raw));
    }
    if raw.starts_with('/') {
        let base = Url::parse(feed_url).ok()?;
        return base.join(raw).ok().map(|u| u.to_string());
    }
    Some(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FetcherConfig;
    use chrono::TimeZone;

    fn fetcher() -> FeedFetcher {
        FeedFetcher::new(FetcherConfig {
            max_items_per_feed: 10,
            ..FetcherConfig::default()
        })
    }

    fn rss(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
<channel><title>Test Wire</title>{}</channel></rss>"#,
            items
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn freshness_filter_excludes_only_known_old_dates() {
        let payload = rss(
            r#"
            <item><title>Fresh</title><link>https://t/fresh</link>
              <description>body</description>
              <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>
            <item><title>Stale</title><link>https://t/stale</link>
              <description>body</description>
              <pubDate>Sat, 07 Jun 2025 09:00:00 GMT</pubDate></item>
            <item><title>Undated</title><link>https://t/undated</link>
              <description>body</description></item>
            "#,
        );

        let items = fetcher().parse_payload(&payload, "https://t/feed.xml", now());
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert!(titles.contains(&"Fresh"));
        assert!(titles.contains(&"Undated"));
        assert!(!titles.contains(&"Stale"));
    }

    #[test]
    fn entries_without_title_or_body_and_link_are_rejected() {
        let payload = rss(
            r#"
            <item><description>no title at all</description>
              <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>
            <item><title>Link only</title><link>https://t/1</link>
              <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>
            "#,
        );

        let items = fetcher().parse_payload(&payload, "https://t/feed.xml", now());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Link only");
    }

    #[test]
    fn items_are_sorted_newest_first_and_capped() {
        let payload = rss(
            r#"
            <item><title>Older</title><link>https://t/1</link><description>b</description>
              <pubDate>Tue, 10 Jun 2025 06:00:00 GMT</pubDate></item>
            <item><title>Newest</title><link>https://t/2</link><description>b</description>
              <pubDate>Tue, 10 Jun 2025 11:00:00 GMT</pubDate></item>
            <item><title>Middle</title><link>https://t/3</link><description>b</description>
              <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>
            "#,
        );

        let mut config = FetcherConfig::default();
        config.max_items_per_feed = 2;
        let items = FeedFetcher::new(config).parse_payload(&payload, "https://t/feed.xml", now());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Newest");
        assert_eq!(items[1].title, "Middle");
    }

    #[test]
    fn html_is_stripped_from_title_and_summary() {
        let payload = rss(
            r#"
            <item><title>Markets &amp; Tech</title><link>https://t/1</link>
              <description>&lt;p&gt;Stocks &lt;b&gt;rise&lt;/b&gt; again&lt;/p&gt;</description>
              <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>
            "#,
        );

        let items = fetcher().parse_payload(&payload, "https://t/feed.xml", now());
        assert_eq!(items[0].title, "Markets & Tech");
        assert_eq!(items[0].summary, "Stocks rise again");
    }

    #[test]
    fn fingerprint_is_stable_across_refetches() {
        let payload = rss(
            r#"
            <item><title>Example Headline</title><link>https://x/1</link>
              <description>body</description>
              <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>
            "#,
        );

        let f = fetcher();
        let first = f.parse_payload(&payload, "https://t/feed.xml", now());
        let second = f.parse_payload(&payload, "https://t/feed.xml", now());
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn image_from_media_thumbnail() {
        let payload = rss(
            r#"
            <item><title>Pic</title><link>https://t/1</link>
              <description>body</description>
              <media:thumbnail url="https://img.example.com/a.jpg"/>
              <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>
            "#,
        );

        let items = fetcher().parse_payload(&payload, "https://t/feed.xml", now());
        assert_eq!(
            items[0].image_url.as_deref(),
            Some("https://img.example.com/a.jpg")
        );
    }

    #[test]
    fn image_from_body_img_tag_resolves_relative_urls() {
        let payload = rss(
            r#"
            <item><title>Pic</title><link>https://t/1</link>
              <description>&lt;img src="/media/a.png"&gt; story text</description>
              <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>
            "#,
        );

        let items = fetcher().parse_payload(&payload, "https://news.example.com/feed.xml", now());
        assert_eq!(
            items[0].image_url.as_deref(),
            Some("https://news.example.com/media/a.png")
        );
    }

    #[test]
    fn protocol_relative_image_urls_get_https() {
        assert_eq!(
            resolve_image_url("//cdn.example.com/a.jpg", "https://t/feed.xml").as_deref(),
            Some("https://cdn.example.com/a.jpg")
        );
    }

    #[test]
    fn malformed_payload_yields_empty_list() {
        let items = fetcher().parse_payload("this is not xml", "https://t/feed.xml", now());
        assert!(items.is_empty());
    }
}
