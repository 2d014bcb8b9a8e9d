//! Core data models shared by search, summarization, and the builders.
//!
//! Field names on the serialized types match the gateway's JSON wire format
//! (`guide_md`, `total_lines`, `observation_ids`, ...).

use serde::Serialize;

/// One line of the guide index: a source file and its generated sidecars.
///
/// `source` is unique within a single load of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideIndexRow {
    pub basename: String,
    pub source: String,
    pub guide_md: String,
    pub guide_json: String,
}

/// A guide row that matched a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredGuideRow {
    pub row: GuideIndexRow,
    pub score: u32,
}

/// A line anchor inside a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub line: i64,
    pub text: String,
}

/// Capped view of one guide's sidecar JSON, computed per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuideSummary {
    pub basename: String,
    pub source: String,
    pub guide_md: String,
    pub guide_json: String,
    pub score: u32,
    pub total_lines: i64,
    pub sha256: Option<String>,
    pub risks: Vec<String>,
    pub anchors: Vec<Anchor>,
    pub observation_ids: Vec<u64>,
}

/// Status and parsed body of an upstream worker call.
///
/// Non-2xx responses are still `Ok`; only transport failures are errors.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
