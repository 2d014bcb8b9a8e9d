//! Observation ID handling: scraping IDs out of upstream search text,
//! de-duplicating ID lists, and the best-effort memory search shared by the
//! brief and graph builders.
//!
//! The worker's search endpoint returns human-oriented text rather than
//! structured IDs, so IDs are recovered with two patterns: `#123` and
//! `id: 123` / `id=123` / `ID 123`. Word boundaries are ASCII-only, so a
//! CJK or accented neighbour does not hide an ID.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

use crate::upstream::{paths, UpstreamClient};

static HASH_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([0-9]+)").expect("valid regex"));
static LABELLED_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?-u:\b)id[:=\s]+([0-9]+)(?-u:\b)").expect("valid regex"));

/// Collects the text fields of an upstream search body: `content[].text`,
/// a `raw` string, or the body itself when it is a string.
fn text_candidates(body: &Value) -> Vec<&str> {
    let mut texts = Vec::new();
    if let Some(items) = body.get("content").and_then(Value::as_array) {
        texts.extend(
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str)),
        );
    }
    if let Some(raw) = body.get("raw").and_then(Value::as_str) {
        texts.push(raw);
    }
    if let Some(text) = body.as_str() {
        texts.push(text);
    }
    texts
}

/// Extracts positive observation IDs from a search body, sorted ascending.
pub fn extract_observation_ids(body: &Value) -> Vec<u64> {
    let mut ids = BTreeSet::new();
    for text in text_candidates(body) {
        for re in [&*HASH_ID, &*LABELLED_ID] {
            for caps in re.captures_iter(text) {
                if let Ok(id) = caps[1].parse::<u64>() {
                    if id > 0 {
                        ids.insert(id);
                    }
                }
            }
        }
    }
    ids.into_iter().collect()
}

/// Keeps the first occurrence of each positive ID, up to `limit` entries.
pub fn dedupe_ids<I>(values: I, limit: usize) -> Vec<u64>
where
    I: IntoIterator<Item = u64>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in values {
        if out.len() >= limit {
            break;
        }
        if id == 0 || !seen.insert(id) {
            continue;
        }
        out.push(id);
    }
    out
}

/// Outcome of the best-effort upstream search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySearch {
    /// Upstream status code, `None` when the call never completed.
    pub status: Option<u16>,
    pub ids: Vec<u64>,
    /// Transport error message when the call never completed.
    pub error: Option<String>,
}

/// Queries the worker's search endpoint and scrapes observation IDs.
///
/// Failures degrade to an empty ID list; they never propagate.
pub async fn search_memory(upstream: &UpstreamClient, query: &str, limit: u32) -> MemorySearch {
    let params = [
        ("query".to_string(), query.to_string()),
        ("limit".to_string(), limit.to_string()),
    ];
    match upstream.get(paths::SEARCH, &params).await {
        Ok(resp) => {
            let ids = if resp.is_success() {
                extract_observation_ids(&resp.body)
            } else {
                tracing::debug!(status = resp.status, "memory search returned non-success");
                Vec::new()
            };
            MemorySearch {
                status: Some(resp.status),
                ids,
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "memory search failed, continuing with local results");
            MemorySearch {
                status: None,
                ids: Vec::new(),
                error: Some(e.to_string()),
            }
        }
    }
}
