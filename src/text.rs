//! Text normalization helpers shared by the fetcher and the editor.

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Strip HTML tags, decode entities and collapse whitespace.
pub fn clean_html(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }

    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

/// Deterministic identity of an item, derived from its link and title.
/// Equal (link, title) pairs always produce the same id.
pub fn fingerprint(link: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(link.as_bytes());
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Hard-truncate to `max_chars` characters (not bytes, so multibyte text
/// never splits), appending an ellipsis when something was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

/// Truncate preferring a sentence boundary when one falls late enough in
/// the allowed window.
pub fn smart_truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    if let Some(last_period) = head.rfind('.') {
        if last_period > max_chars * 4 / 5 {
            let mut out = head[..=last_period].to_string();
            out.push_str("...");
            return out;
        }
    }
    let mut out = head;
    out.push_str("...");
    out
}
