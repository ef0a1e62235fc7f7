//! # Fetched Items
//! Input boundary of the pipeline. The fetch step (a separate tool) writes
//! `fetched_content/content_*.json` as an array of raw records; this module
//! maps them into `RawItem`s, normalizes the text, and drops what cannot be
//! analyzed. Scraping itself is not our concern.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Where the content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Tweet,
    Article,
}

/// One fetched piece of content, immutable, consumed exactly once by the
/// classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawItem {
    /// Opaque identifier; unique within a batch.
    pub source_url: String,
    pub source_kind: SourceKind,
    pub raw_text: String,
    pub captured_at: DateTime<Utc>,
}

/// On-disk shape produced by the fetcher.
#[derive(Debug, Deserialize)]
struct FetchedRecord {
    source: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Longest text we hand to extraction; the classifier truncates further.
pub const MAX_TEXT_CHARS: usize = 8000;

/// Normalize text: decode HTML entities, strip tags, collapse whitespace,
/// cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Map a fetched record into a `RawItem`, or `None` if the text normalizes
/// to empty.
fn to_raw_item(rec: FetchedRecord, loaded_at: DateTime<Utc>) -> Option<RawItem> {
    let text = normalize_text(&rec.content);
    if text.is_empty() || rec.url.trim().is_empty() {
        return None;
    }
    let kind = if rec.source.eq_ignore_ascii_case("twitter") {
        SourceKind::Tweet
    } else {
        SourceKind::Article
    };
    Some(RawItem {
        source_url: rec.url,
        source_kind: kind,
        raw_text: text,
        captured_at: rec.timestamp.unwrap_or(loaded_at),
    })
}

/// Load a fetched-content JSON file into items ready for classification.
/// Empty items are dropped here; duplicate URLs are dropped defensively
/// even though the fetcher is expected to dedup.
pub fn load_items(path: &Path) -> Result<Vec<RawItem>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading fetched content from {}", path.display()))?;
    let records: Vec<FetchedRecord> = serde_json::from_str(&data)
        .with_context(|| format!("parsing fetched content from {}", path.display()))?;

    let loaded_at = Utc::now();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut items = Vec::with_capacity(records.len());
    let total = records.len();
    for rec in records {
        let Some(item) = to_raw_item(rec, loaded_at) else {
            continue;
        };
        if !seen_urls.insert(item.source_url.clone()) {
            tracing::debug!(url = %item.source_url, "duplicate url dropped");
            continue;
        }
        items.push(item);
    }
    tracing::info!(total, kept = items.len(), "loaded fetched content");
    Ok(items)
}
