//! Sidecar summarization.
//!
//! Each guide row points at a JSON sidecar with `risks`, `anchors`,
//! `observation_ids`, `total_lines` and `sha256`. Summaries read it fresh on
//! every call and cap every list. A missing or malformed sidecar is read as
//! an empty object, so summarizing never fails.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::models::{Anchor, GuideSummary, ScoredGuideRow};

/// Maximum anchor text length, in characters, including the ellipsis.
pub const ANCHOR_TEXT_MAX: usize = 180;

/// Per-call caps for a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryLimits {
    pub anchors: usize,
    pub risks: usize,
    pub observations: usize,
}

/// Trims `text` and, when it is longer than `max_len` characters, cuts it
/// to `max_len - 1` characters followed by `…`.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    let value = text.trim();
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let head: String = value.chars().take(max_len.saturating_sub(1)).collect();
    format!("{}…", head.trim())
}

/// Resolves a sidecar path against `root` unless it is already absolute.
pub fn resolve_local_path(root: &Path, maybe_path: &str) -> Option<PathBuf> {
    if maybe_path.is_empty() {
        return None;
    }
    let path = Path::new(maybe_path);
    if path.is_absolute() {
        Some(path.to_path_buf())
    } else {
        Some(root.join(path))
    }
}

async fn read_sidecar(root: &Path, guide_json: &str) -> Option<Map<String, Value>> {
    let path = resolve_local_path(root, guide_json)?;
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "sidecar unreadable");
            }
            return None;
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "sidecar is not valid JSON");
            None
        }
    }
}

/// Loads the sidecar for `hit` and builds a capped summary.
pub async fn summarize(root: &Path, hit: &ScoredGuideRow, limits: SummaryLimits) -> GuideSummary {
    let payload = read_sidecar(root, &hit.row.guide_json)
        .await
        .unwrap_or_default();
    summarize_payload(hit, &payload, limits)
}

/// Builds a summary from an already-parsed sidecar object.
pub fn summarize_payload(
    hit: &ScoredGuideRow,
    payload: &Map<String, Value>,
    limits: SummaryLimits,
) -> GuideSummary {
    let risks = array_field(payload, "risks")
        .iter()
        .take(limits.risks)
        .map(value_to_text)
        .collect();

    let anchors = array_field(payload, "anchors")
        .iter()
        .take(limits.anchors)
        .map(|anchor| Anchor {
            line: anchor.get("line").and_then(integer_of).unwrap_or(0),
            text: truncate_text(
                &anchor.get("text").map(value_to_text).unwrap_or_default(),
                ANCHOR_TEXT_MAX,
            ),
        })
        .collect();

    let observation_ids = array_field(payload, "observation_ids")
        .iter()
        .filter_map(positive_id)
        .take(limits.observations)
        .collect();

    GuideSummary {
        basename: hit.row.basename.clone(),
        source: hit.row.source.clone(),
        guide_md: hit.row.guide_md.clone(),
        guide_json: hit.row.guide_json.clone(),
        score: hit.score,
        total_lines: payload.get("total_lines").and_then(integer_of).unwrap_or(0),
        sha256: payload
            .get("sha256")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        risks,
        anchors,
        observation_ids,
    }
}

fn array_field<'a>(payload: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Renders a JSON value as display text. `null` becomes empty.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads an integer from a JSON number (truncated) or numeric string.
/// Numeric reading of a loosely-typed value: numbers, numeric strings
/// (`"9.0"`, `"1e1"`), and booleans as 1/0.
fn number_like(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn integer_of(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    number_like(value).map(|f| f.trunc() as i64)
}

/// Accepts positive whole numbers given as JSON numbers, numeric strings,
/// or `true`.
pub(crate) fn positive_id(value: &Value) -> Option<u64> {
    if let Some(id) = value.as_u64() {
        return (id > 0).then_some(id);
    }
    number_like(value)
        .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= u64::MAX as f64)
        .map(|f| f as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GuideIndexRow;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const LIMITS: SummaryLimits = SummaryLimits {
        anchors: 3,
        risks: 3,
        observations: 12,
    };

    fn hit(guide_json: &str) -> ScoredGuideRow {
        ScoredGuideRow {
            row: GuideIndexRow {
                basename: "foo.rs".to_string(),
                source: "src/foo.rs".to_string(),
                guide_md: "g/foo.md".to_string(),
                guide_json: guide_json.to_string(),
            },
            score: 9,
        }
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("  short  ", 10), "short");
        let long = "x".repeat(200);
        let out = truncate_text(&long, 180);
        assert_eq!(out.chars().count(), 180);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn test_summary_from_payload() {
        let payload = as_map(json!({
            "risks": ["a", "b", "c", "d"],
            "anchors": [{"line": 42, "text": "unsafe block"}, {"line": "7", "text": null}, {}],
            "observation_ids": [7, 0, -3, "9", 1.5, "x", 11],
            "total_lines": 120,
            "sha256": "abc"
        }));
        let s = summarize_payload(&hit("g/foo.json"), &payload, LIMITS);
        assert_eq!(s.risks, vec!["a", "b", "c"]);
        assert_eq!(
            s.anchors,
            vec![
                Anchor { line: 42, text: "unsafe block".to_string() },
                Anchor { line: 7, text: String::new() },
                Anchor { line: 0, text: String::new() },
            ]
        );
        assert_eq!(s.observation_ids, vec![7, 9, 11]);
        assert_eq!(s.total_lines, 120);
        assert_eq!(s.sha256.as_deref(), Some("abc"));
        assert_eq!(s.score, 9);
    }

    #[test]
    fn test_loose_numeric_coercion() {
        assert_eq!(positive_id(&json!("9.0")), Some(9));
        assert_eq!(positive_id(&json!("1e1")), Some(10));
        assert_eq!(positive_id(&json!(" 4 ")), Some(4));
        assert_eq!(positive_id(&json!(true)), Some(1));
        assert_eq!(positive_id(&json!(false)), None);
        assert_eq!(positive_id(&json!("")), None);
        assert_eq!(positive_id(&json!("2.5")), None);
        assert_eq!(positive_id(&json!(null)), None);

        assert_eq!(integer_of(&json!(true)), Some(1));
        assert_eq!(integer_of(&json!("12.9")), Some(12));
        assert_eq!(integer_of(&json!(-3)), Some(-3));
        assert_eq!(integer_of(&json!([1])), None);
    }

    #[test]
    fn test_observation_cap_applies_after_filtering() {
        let payload = as_map(json!({ "observation_ids": [0, 1, 2, 3, 4] }));
        let limits = SummaryLimits { observations: 2, ..LIMITS };
        let s = summarize_payload(&hit("g/foo.json"), &payload, limits);
        assert_eq!(s.observation_ids, vec![1, 2]);
    }

    #[test]
    fn test_long_anchor_text_truncated() {
        let payload = as_map(json!({ "anchors": [{"line": 1, "text": "y".repeat(500)}] }));
        let s = summarize_payload(&hit("g/foo.json"), &payload, LIMITS);
        assert_eq!(s.anchors[0].text.chars().count(), ANCHOR_TEXT_MAX);
    }

    #[tokio::test]
    async fn test_missing_sidecar_defaults() {
        let tmp = TempDir::new().unwrap();
        let s = summarize(tmp.path(), &hit("g/missing.json"), LIMITS).await;
        assert!(s.risks.is_empty());
        assert!(s.anchors.is_empty());
        assert!(s.observation_ids.is_empty());
        assert_eq!(s.total_lines, 0);
        assert!(s.sha256.is_none());
        assert_eq!(s.source, "src/foo.rs");
    }

    #[tokio::test]
    async fn test_malformed_sidecar_defaults() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("g")).unwrap();
        fs::write(tmp.path().join("g/foo.json"), "{not json").unwrap();
        let s = summarize(tmp.path(), &hit("g/foo.json"), LIMITS).await;
        assert!(s.risks.is_empty());

        fs::write(tmp.path().join("g/foo.json"), "[1, 2, 3]").unwrap();
        let s = summarize(tmp.path(), &hit("g/foo.json"), LIMITS).await;
        assert!(s.observation_ids.is_empty());
    }

    #[tokio::test]
    async fn test_relative_and_absolute_paths() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("g")).unwrap();
        let sidecar = tmp.path().join("g/foo.json");
        fs::write(&sidecar, r#"{"risks":["r1"],"total_lines":5}"#).unwrap();

        let relative = summarize(tmp.path(), &hit("g/foo.json"), LIMITS).await;
        assert_eq!(relative.risks, vec!["r1"]);

        let elsewhere = TempDir::new().unwrap();
        let absolute = summarize(elsewhere.path(), &hit(sidecar.to_str().unwrap()), LIMITS).await;
        assert_eq!(absolute.total_lines, 5);
    }

    #[test]
    fn test_resolve_empty_path() {
        assert!(resolve_local_path(Path::new("/tmp"), "").is_none());
    }
}
