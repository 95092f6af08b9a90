use crate::text::{smart_truncate, truncate_chars};
use crate::types::{EditorConfig, NewsError, NewsItem, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Seam over the remote text-generation call. The production implementation
/// speaks the chat-completions protocol; tests script replies directly.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one prompt and return the raw completion text.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Chat-completions backend with bearer authentication.
pub struct TogetherBackend {
    client: Client,
    config: EditorConfig,
}

impl TogetherBackend {
    pub fn new(config: EditorConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl GenerationBackend for TogetherBackend {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "repetition_penalty": self.config.repetition_penalty,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsError::Generation(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let reply: serde_json::Value = response.json().await?;
        reply["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| NewsError::Generation("reply carries no message content".to_string()))
    }
}

/// The structured result expected inside a generation reply. Fields are
/// optional; anything the model omitted falls back to the original text.
#[derive(Debug, Deserialize)]
struct EditedArticle {
    title: Option<String>,
    content: Option<String>,
    summary: Option<String>,
}

/// Rewrites news items in batches through a generation backend.
///
/// Items are never dropped: every failure mode degrades to passing the
/// original text through with `ai_processed = false`.
pub struct ContentEditor {
    backend: Arc<dyn GenerationBackend>,
    config: EditorConfig,
}

impl ContentEditor {
    pub fn new(config: EditorConfig) -> Self {
        let backend = Arc::new(TogetherBackend::new(config.clone()));
        Self { backend, config }
    }

    pub fn with_backend(config: EditorConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend, config }
    }

    /// Edit a full category run in sequential batches, pacing requests to
    /// respect the remote service's rate limits.
    pub async fn edit_all(&self, items: Vec<NewsItem>, category: &str) -> Vec<NewsItem> {
        let total = items.len();
        let batch_size = self.config.batch_size.max(1);
        let batch_count = total.div_ceil(batch_size);

        info!(
            "Editing {} items for category {} in {} batches",
            total, category, batch_count
        );

        let mut out = Vec::with_capacity(total);
        let mut iter = items.into_iter().peekable();
        let mut batch_no = 0usize;

        while iter.peek().is_some() {
            let batch: Vec<NewsItem> = iter.by_ref().take(batch_size).collect();
            batch_no += 1;
            debug!("Editing batch {}/{}", batch_no, batch_count);

            out.extend(self.edit_batch(batch, category).await);

            if iter.peek().is_some() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        let edited = out.iter().filter(|i| i.ai_processed).count();
        info!(
            "Edited {}/{} items for category {}",
            edited, total, category
        );
        out
    }

    /// Edit one batch sequentially with a short pause between items.
    /// Output length always equals input length.
    pub async fn edit_batch(&self, batch: Vec<NewsItem>, category: &str) -> Vec<NewsItem> {
        let mut out = Vec::with_capacity(batch.len());
        let last = batch.len().saturating_sub(1);

        for (index, item) in batch.into_iter().enumerate() {
            out.push(self.edit_item(item, category).await);
            if index < last {
                tokio::time::sleep(self.config.item_delay).await;
            }
        }

        out
    }

    async fn edit_item(&self, mut item: NewsItem, category: &str) -> NewsItem {
        let body = if item.content.is_empty() {
            item.summary.clone()
        } else {
            item.content.clone()
        };

        // Very short articles gain nothing from the model; derive the
        // digest by truncation and skip the round-trip.
        if body.chars().count() < self.config.short_content_threshold {
            item.summary = truncate_chars(&body, 200);
            item.ai_processed = false;
            return item;
        }

        let prompt = editor_prompt(category, &item.title, &body);
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: self.config.base_retry_delay,
            initial_interval: self.config.base_retry_delay,
            max_interval: self.config.base_retry_delay * 32,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            match self.backend.generate(&prompt, self.config.max_tokens).await {
                Ok(reply) => match extract_edited(&reply) {
                    Some(edited) => {
                        self.apply_edit(&mut item, edited, &body);
                        return item;
                    }
                    None => {
                        last_error = "no structured result in generation reply".to_string();
                        warn!(
                            "Attempt {}/{} for {}: {}",
                            attempt, self.config.max_attempts, item.id, last_error
                        );
                    }
                },
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, self.config.max_attempts, item.id, last_error
                    );
                }
            }

            if attempt < self.config.max_attempts {
                if let Some(delay) = backoff.next_backoff() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // Pass-through: an unedited item is strictly better than a
        // missing one.
        error!(
            "Giving up on {} after {} attempts",
            item.id, self.config.max_attempts
        );
        item.summary = truncate_chars(&body, 200);
        item.ai_processed = false;
        item.error = Some(last_error);
        item
    }

    fn apply_edit(&self, item: &mut NewsItem, edited: EditedArticle, original_body: &str) {
        let title = edited.title.unwrap_or_else(|| item.title.clone());
        item.title = truncate_chars(&title, self.config.max_title_chars);

        // Leave room for the title within the platform's message cap.
        let body_cap = self
            .config
            .max_message_chars
            .saturating_sub(self.config.max_title_chars);
        let content = edited.content.unwrap_or_else(|| original_body.to_string());
        item.content = smart_truncate(&content, body_cap);

        item.summary = edited
            .summary
            .unwrap_or_else(|| truncate_chars(&item.content, 200));
        item.ai_processed = true;
        item.error = None;
    }

    /// Connectivity check: one tiny prompt, true on any well-formed reply.
    pub async fn probe(&self) -> bool {
        match self.backend.generate("Reply with the single word: ok", 50).await {
            Ok(_) => {
                info!("Generation service reachable");
                true
            }
            Err(e) => {
                error!("Generation service probe failed: {}", e);
                false
            }
        }
    }
}

fn editor_prompt(category: &str, title: &str, content: &str) -> String {
    format!(
        "You are the editor of a {category} news channel. Edit the article \
below for publication.\n\
\n\
Rules:\n\
1. Do NOT translate; keep the original language.\n\
2. Do NOT add information or invent facts; work only with the given text.\n\
3. If the article is short, do NOT pad it.\n\
4. If the article is longer than 4000 characters, condense it while \
keeping the core meaning.\n\
5. Keep the news-article style; drop advertising inserts and filler.\n\
\n\
ARTICLE:\n\
Title: {title}\n\
Text: {content}\n\
\n\
Return the result as JSON:\n\
{{\n\
    \"title\": \"edited title\",\n\
    \"content\": \"edited article text\",\n\
    \"summary\": \"short digest (1-2 sentences)\"\n\
}}"
    )
}

/// Pull the structured result out of a generation reply: the slice from
/// the first `{` to the last `}`, tolerating prose around it. A reply
/// without a parsable block is a retryable failure.
fn extract_edited(reply: &str) -> Option<EditedArticle> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&reply[start..=end]).ok()
}
